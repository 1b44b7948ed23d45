use std::fmt;
use std::rc::Rc;

use crate::lexer::Token;
use crate::types::Value;

/// Expression nodes. The token carried by each variant locates it for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value, Token),
    Variable(Token),
    Assign(Token, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    Unary(Token, Box<Expr>),
    Grouping(Box<Expr>),
    /// Callee, the closing parenthesis, arguments.
    Call(Box<Expr>, Token, Vec<Expr>),
    Lambda(Rc<FuncDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Print(Expr),
    VarDecl {
        ty: Token,
        name: Token,
        initializer: Expr,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function(Rc<FuncDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    /// Stands in for a statement that failed to parse.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Token,
    pub name: Token,
}

/// A function body shared between the declaring statement and every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    /// The `fn` or `lambda` keyword.
    pub keyword: Token,
    /// `None` for lambda literals.
    pub name: Option<Token>,
    pub params: Vec<Param>,
    pub return_type: Token,
    pub body: Vec<Stmt>,
}

impl FuncDecl {
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) => &name.text,
            None => "<lambda>",
        }
    }
}

impl Expr {
    /// The token an error in this expression is reported against.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Literal(_, token)
            | Expr::Variable(token)
            | Expr::Assign(token, _)
            | Expr::Binary(_, token, _)
            | Expr::Unary(token, _)
            | Expr::Call(_, token, _) => token,
            Expr::Grouping(inner) => inner.token(),
            Expr::Lambda(decl) => &decl.keyword,
        }
    }
}

// Prefix notation, handy for checking precedence and associativity in tests
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::String(s), _) => write!(f, "\"{}\"", s),
            Expr::Literal(value, _) => write!(f, "{}", value),
            Expr::Variable(name) => write!(f, "{}", name.text),
            Expr::Assign(name, value) => write!(f, "(:= {} {})", name.text, value),
            Expr::Binary(left, op, right) => write!(f, "({} {} {})", op.kind, left, right),
            Expr::Unary(op, right) => write!(f, "({} {})", op.kind, right),
            Expr::Grouping(inner) => write!(f, "(group {})", inner),
            Expr::Call(callee, _, args) => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Lambda(decl) => write!(f, "(lambda/{})", decl.params.len()),
        }
    }
}
