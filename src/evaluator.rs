use crate::ast::{Expr, FuncDecl, Stmt};
use crate::environment::{EnvError, Environment};
use crate::lexer::{Token, TokenKind};
use crate::source::Span;
use crate::stack::ensure_sufficient_stack;
use crate::types::{Closure, TypeTag, Value};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;

/// Nested user calls deeper than this fail instead of exhausting the host stack.
pub const MAX_CALL_DEPTH: usize = 256;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    #[error(transparent)]
    Env(#[from] EnvError), // Errors from environment lookup and update
    #[error("Divide by zero error")]
    DivideByZero,
    #[error("Modulo by zero error")]
    ModuloByZero,
    #[error("Mismatched operands: '{left}' and '{right}'")]
    MismatchedOperands { left: TypeTag, right: TypeTag },
    #[error("Unsupported operation '{operator}' on values of type '{ty}'")]
    UnsupportedOperator { operator: TokenKind, ty: TypeTag },
    #[error("Operand of '{operator}' must be {expected}, got {found}")]
    InvalidOperand {
        operator: TokenKind,
        expected: &'static str,
        found: TypeTag,
    },
    #[error("Condition must be a bool, got {0}")]
    NonBooleanCondition(TypeTag),
    #[error("Cannot initialize {declared} variable '{name}' with {found} value")]
    DeclarationTypeMismatch {
        name: String,
        declared: TypeTag,
        found: TypeTag,
    },
    #[error("Function '{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Function '{name}' expects {expected} for parameter '{param}', got {found}")]
    ArgumentTypeMismatch {
        name: String,
        param: String,
        expected: TypeTag,
        found: TypeTag,
    },
    #[error("Function '{name}' must return {expected}, but returned {found}")]
    ReturnTypeMismatch {
        name: String,
        expected: String,
        found: TypeTag,
    },
    #[error("Can only call functions, got {0}")]
    NotCallable(TypeTag),
    #[error("Cannot return from top-level code")]
    TopLevelReturn,
    #[error("Stack overflow: more than {} nested calls", MAX_CALL_DEPTH)]
    StackOverflow,
    #[error("Cannot execute a statement that failed to parse: {0}")]
    UnparsedStatement(String),
    #[error("{0}")]
    Native(String),
    #[error("Unable to write output: {0}")]
    Output(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Runtime error [line {line}]: {kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: usize,
    pub span: Span,
}

impl RuntimeError {
    pub fn at(kind: impl Into<RuntimeErrorKind>, token: &Token) -> Self {
        RuntimeError {
            kind: kind.into(),
            line: token.line,
            span: token.span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, RuntimeError>;

/// How a statement finished. A `return` unwinds through enclosing blocks and loops
/// until the call that is executing the function body.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    out: W,
    call_depth: usize,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// An interpreter whose `print` output (and interactive echo) goes to `out`.
    pub fn with_output(out: W) -> Self {
        let globals = Environment::new_global_populated();
        Interpreter {
            environment: globals.clone(),
            globals,
            out,
            call_depth: 0,
        }
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Executes statements in order against the global environment, stopping at the
    /// first runtime error. Bindings made before the error persist for later calls.
    /// When `interactive`, the value of each top-level expression statement is echoed.
    pub fn interpret(&mut self, statements: &[Stmt], interactive: bool) -> EvalResult<()> {
        tracing::debug!(count = statements.len(), interactive, "interpreting");
        for stmt in statements {
            let result = match stmt {
                Stmt::Expr(expr) if interactive => self.echo(expr),
                _ => self.execute(stmt).map(|_| ()),
            };
            if let Err(error) = result {
                tracing::debug!(%error, "execution stopped");
                // a failure inside a call must not leave us in the callee's scope
                self.environment = self.globals.clone();
                self.call_depth = 0;
                return Err(error);
            }
        }
        Ok(())
    }

    fn echo(&mut self, expr: &Expr) -> EvalResult<()> {
        let value = self.evaluate(expr)?;
        if !value.is_nil() {
            self.write_line(&value, expr.token())?;
        }
        Ok(())
    }

    fn write_line(&mut self, value: &Value, token: &Token) -> EvalResult<()> {
        writeln!(self.out, "{}", value)
            .map_err(|e| RuntimeError::at(RuntimeErrorKind::Output(e.to_string()), token))
    }

    // --- Statements ---

    pub fn execute(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.write_line(&value, expr.token())?;
            }
            Stmt::VarDecl {
                ty,
                name,
                initializer,
            } => {
                let value = self.evaluate(initializer)?;
                let declared = TypeTag::from_keyword(ty.kind).unwrap_or(TypeTag::Nil);
                if value.type_tag() != declared {
                    return Err(RuntimeError::at(
                        RuntimeErrorKind::DeclarationTypeMismatch {
                            name: name.text.clone(),
                            declared,
                            found: value.type_tag(),
                        },
                        name,
                    ));
                }
                self.environment
                    .borrow_mut()
                    .define(&name.text, value)
                    .map_err(|e| RuntimeError::at(e, name))?;
            }
            Stmt::Block(statements) => {
                let env = Environment::new_enclosed(self.environment.clone());
                return self.execute_block(statements, env);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.condition(condition)? {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while self.condition(condition)? {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Function(decl) => {
                let closure = self.make_closure(decl);
                // a `fn` statement always carries its name
                if let Some(name) = &decl.name {
                    self.environment
                        .borrow_mut()
                        .define(&name.text, closure)
                        .map_err(|e| RuntimeError::at(e, name))?;
                }
            }
            Stmt::Return { keyword, value } => {
                if self.call_depth == 0 {
                    return Err(RuntimeError::at(RuntimeErrorKind::TopLevelReturn, keyword));
                }
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Error(message) => {
                return Err(RuntimeError {
                    kind: RuntimeErrorKind::UnparsedStatement(message.clone()),
                    line: 0,
                    span: Span::default(),
                });
            }
        }
        Ok(Flow::Normal)
    }

    /// Runs `statements` in `env`, then restores the previous environment on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> EvalResult<Flow> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn condition(&mut self, condition: &Expr) -> EvalResult<bool> {
        match self.evaluate(condition)? {
            Value::Boolean(b) => Ok(b),
            other => Err(RuntimeError::at(
                RuntimeErrorKind::NonBooleanCondition(other.type_tag()),
                condition.token(),
            )),
        }
    }

    fn make_closure(&self, decl: &Rc<FuncDecl>) -> Value {
        Value::Function(Rc::new(Closure {
            declaration: decl.clone(),
            env: self.environment.clone(),
        }))
    }

    // --- Expressions ---

    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(value, _) => Ok(value.clone()),
            Expr::Variable(name) => self
                .environment
                .borrow()
                .get(&name.text)
                .map_err(|e| RuntimeError::at(e, name)),
            Expr::Assign(name, value) => {
                let value = self.evaluate(value)?;
                self.environment
                    .borrow_mut()
                    .assign(&name.text, value)
                    .map_err(|e| RuntimeError::at(e, name))?;
                Ok(Value::Nil)
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary(operator, right) => {
                let right = self.evaluate(right)?;
                evaluate_unary(operator, right)
            }
            Expr::Binary(left, operator, right) => {
                // both sides are always evaluated, `and`/`or` included
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                evaluate_binary(left, operator, right)
            }
            Expr::Call(callee, paren, args) => {
                let callee = self.evaluate(callee)?;
                let mut evaluated_args = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated_args.push(self.evaluate(arg)?);
                }
                self.call(callee, evaluated_args, paren)
            }
            Expr::Lambda(decl) => Ok(self.make_closure(decl)),
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, paren: &Token) -> EvalResult {
        match callee {
            Value::Function(closure) => self.call_closure(&closure, args, paren),
            Value::Native(native) => {
                if args.len() != native.arity {
                    return Err(RuntimeError::at(
                        RuntimeErrorKind::ArityMismatch {
                            name: native.name.to_string(),
                            expected: native.arity,
                            found: args.len(),
                        },
                        paren,
                    ));
                }
                (native.func)(&args).map_err(|kind| RuntimeError::at(kind, paren))
            }
            other => Err(RuntimeError::at(
                RuntimeErrorKind::NotCallable(other.type_tag()),
                paren,
            )),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>, paren: &Token) -> EvalResult {
        let decl = &closure.declaration;
        let name = decl.display_name();
        tracing::trace!(function = name, args = args.len(), "call");

        if args.len() != decl.params.len() {
            return Err(RuntimeError::at(
                RuntimeErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: decl.params.len(),
                    found: args.len(),
                },
                paren,
            ));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::at(RuntimeErrorKind::StackOverflow, paren));
        }

        let env = Environment::new_enclosed(closure.env.clone());
        for (param, arg) in decl.params.iter().zip(args) {
            let expected = TypeTag::from_keyword(param.ty.kind).unwrap_or(TypeTag::Nil);
            if arg.type_tag() != expected {
                return Err(RuntimeError::at(
                    RuntimeErrorKind::ArgumentTypeMismatch {
                        name: name.to_string(),
                        param: param.name.text.clone(),
                        expected,
                        found: arg.type_tag(),
                    },
                    paren,
                ));
            }
            env.borrow_mut()
                .define(&param.name.text, arg)
                .map_err(|e| RuntimeError::at(e, &param.name))?;
        }

        // the body is a block of its own, so its locals may shadow parameters
        let body_env = Environment::new_enclosed(env);
        self.call_depth += 1;
        let flow = self.execute_block(&decl.body, body_env);
        self.call_depth -= 1;

        let value = match flow? {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };
        let expected = TypeTag::from_keyword(decl.return_type.kind).unwrap_or(TypeTag::Nil);
        if value.type_tag() != expected {
            return Err(RuntimeError::at(
                RuntimeErrorKind::ReturnTypeMismatch {
                    name: name.to_string(),
                    expected: decl.return_type.text.clone(),
                    found: value.type_tag(),
                },
                paren,
            ));
        }
        Ok(value)
    }
}

// --- Operators ---

fn evaluate_unary(operator: &Token, right: Value) -> EvalResult {
    match (operator.kind, right) {
        (TokenKind::Bang, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (TokenKind::Minus, Value::Integer(n)) => Ok(Value::Integer(n.wrapping_neg())),
        (TokenKind::Minus, Value::Float(n)) => Ok(Value::Float(-n)),
        (kind, other) => {
            let expected = if kind == TokenKind::Bang {
                "bool"
            } else {
                "int or float"
            };
            Err(RuntimeError::at(
                RuntimeErrorKind::InvalidOperand {
                    operator: kind,
                    expected,
                    found: other.type_tag(),
                },
                operator,
            ))
        }
    }
}

fn evaluate_binary(left: Value, operator: &Token, right: Value) -> EvalResult {
    let result = match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => integer_op(*l, operator.kind, *r),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            float_op(as_float(&left), operator.kind, as_float(&right))
        }
        (Value::Boolean(l), Value::Boolean(r)) => boolean_op(*l, operator.kind, *r),
        // the only implicit coercion: anything appended to a string is stringified
        (Value::String(l), _) => match operator.kind {
            TokenKind::Plus => Ok(Value::String(format!("{}{}", l, right))),
            kind => Err(RuntimeErrorKind::UnsupportedOperator {
                operator: kind,
                ty: TypeTag::String,
            }),
        },
        _ => Err(RuntimeErrorKind::MismatchedOperands {
            left: left.type_tag(),
            right: right.type_tag(),
        }),
    };
    result.map_err(|kind| RuntimeError::at(kind, operator))
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Integer(n) => *n as f64,
        Value::Float(n) => *n,
        _ => f64::NAN,
    }
}

// Integer arithmetic wraps like the fixed-width host arithmetic it models.
fn integer_op(l: i64, operator: TokenKind, r: i64) -> Result<Value, RuntimeErrorKind> {
    let value = match operator {
        TokenKind::Plus => Value::Integer(l.wrapping_add(r)),
        TokenKind::Minus => Value::Integer(l.wrapping_sub(r)),
        TokenKind::Star if l == 0 || r == 0 => Value::Integer(0),
        TokenKind::Star => Value::Integer(l.wrapping_mul(r)),
        TokenKind::Slash if r == 0 => return Err(RuntimeErrorKind::DivideByZero),
        TokenKind::Slash => Value::Integer(l.wrapping_div(r)),
        TokenKind::Percent if r == 0 => return Err(RuntimeErrorKind::ModuloByZero),
        TokenKind::Percent => Value::Integer(l.wrapping_rem(r)),
        // computed as a real power, then truncated back (saturating at the i64 bounds)
        TokenKind::StarStar => Value::Integer((l as f64).powf(r as f64) as i64),
        TokenKind::EqualEqual => Value::Boolean(l == r),
        TokenKind::BangEqual => Value::Boolean(l != r),
        TokenKind::Greater => Value::Boolean(l > r),
        TokenKind::GreaterEqual => Value::Boolean(l >= r),
        TokenKind::Less => Value::Boolean(l < r),
        TokenKind::LessEqual => Value::Boolean(l <= r),
        kind => {
            return Err(RuntimeErrorKind::UnsupportedOperator {
                operator: kind,
                ty: TypeTag::Int,
            });
        }
    };
    Ok(value)
}

fn float_op(l: f64, operator: TokenKind, r: f64) -> Result<Value, RuntimeErrorKind> {
    let value = match operator {
        TokenKind::Plus => Value::Float(l + r),
        TokenKind::Minus => Value::Float(l - r),
        TokenKind::Star if l == 0.0 || r == 0.0 => Value::Float(0.0),
        TokenKind::Star => Value::Float(l * r),
        TokenKind::Slash if r == 0.0 => return Err(RuntimeErrorKind::DivideByZero),
        TokenKind::Slash if l == 0.0 => Value::Float(0.0),
        TokenKind::Slash => Value::Float(l / r),
        TokenKind::Percent if r == 0.0 => return Err(RuntimeErrorKind::ModuloByZero),
        TokenKind::Percent => Value::Float(l % r),
        TokenKind::StarStar => Value::Float(l.powf(r)),
        TokenKind::EqualEqual => Value::Boolean(l == r),
        TokenKind::BangEqual => Value::Boolean(l != r),
        TokenKind::Greater => Value::Boolean(l > r),
        TokenKind::GreaterEqual => Value::Boolean(l >= r),
        TokenKind::Less => Value::Boolean(l < r),
        TokenKind::LessEqual => Value::Boolean(l <= r),
        kind => {
            return Err(RuntimeErrorKind::UnsupportedOperator {
                operator: kind,
                ty: TypeTag::Float,
            });
        }
    };
    Ok(value)
}

fn boolean_op(l: bool, operator: TokenKind, r: bool) -> Result<Value, RuntimeErrorKind> {
    match operator {
        TokenKind::And => Ok(Value::Boolean(l && r)),
        TokenKind::Or => Ok(Value::Boolean(l || r)),
        TokenKind::EqualEqual => Ok(Value::Boolean(l == r)),
        TokenKind::BangEqual => Ok(Value::Boolean(l != r)),
        kind => Err(RuntimeErrorKind::UnsupportedOperator {
            operator: kind,
            ty: TypeTag::Bool,
        }),
    }
}
