use crate::ast::FuncDecl;
use crate::environment::Environment;
use crate::evaluator::RuntimeErrorKind;
use crate::lexer::TokenKind;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

/// Floats closer than this to a whole number print as `<int>.0`.
pub const FLOAT_EPSILON: f64 = 1e-10;

/// A runtime value. Values are immutable; operators always build new ones.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Nil,
    Function(Rc<Closure>),
    Native(NativeFunction),
}

/// The runtime classification of a value, checked against declared types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    String,
    Nil,
    Function,
}

impl TypeTag {
    /// The tag a type keyword demands. `void` demands that nothing was produced, i.e. Nil.
    pub fn from_keyword(kind: TokenKind) -> Option<TypeTag> {
        match kind {
            TokenKind::IntType => Some(TypeTag::Int),
            TokenKind::FloatType => Some(TypeTag::Float),
            TokenKind::BoolType => Some(TypeTag::Bool),
            TokenKind::StringType => Some(TypeTag::String),
            TokenKind::Lambda => Some(TypeTag::Function),
            TokenKind::Void => Some(TypeTag::Nil),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Bool => "bool",
            TypeTag::String => "string",
            TypeTag::Nil => "nil",
            TypeTag::Function => "lambda",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Integer(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Boolean(_) => TypeTag::Bool,
            Value::String(_) => TypeTag::String,
            Value::Nil => TypeTag::Nil,
            Value::Function(_) | Value::Native(_) => TypeTag::Function,
        }
    }

    /// The value a variable of the given type starts with when declared without an initializer.
    pub fn zero_for(kind: TokenKind) -> Option<Value> {
        match kind {
            TokenKind::IntType => Some(Value::Integer(0)),
            TokenKind::FloatType => Some(Value::Float(0.0)),
            TokenKind::BoolType => Some(Value::Boolean(false)),
            TokenKind::StringType => Some(Value::String(String::new())),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

// Stringification used by `print` and by the interactive echo
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.is_finite() && (n - n.round()).abs() < FLOAT_EPSILON {
                    write!(f, "{:.1}", n.round() + 0.0)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::String(s) => write!(f, "{}", s),
            Value::Nil => write!(f, "(nil)"),
            Value::Function(closure) => write!(f, "<fn {}>", closure.declaration.display_name()),
            Value::Native(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

// Functions compare by identity, everything else by payload.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// A user function paired with the scope it was declared in.
pub struct Closure {
    pub declaration: Rc<FuncDecl>,
    pub env: Rc<RefCell<Environment>>,
}

// The captured environment usually contains the closure itself, so it is left out.
impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Closure({})", self.declaration.display_name())
    }
}

pub type NativeFn = fn(&[Value]) -> Result<Value, RuntimeErrorKind>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.name)
    }
}
