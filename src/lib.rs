// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod repl;
pub mod source;
pub mod stack;
pub mod types;

pub use ast::{Expr, Stmt};
pub use environment::{EnvError, Environment};
pub use error::{Error, run_source};
pub use evaluator::{EvalResult, Interpreter, RuntimeError, RuntimeErrorKind};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, ParseOutcome, Parser, parse, parse_str};
pub use source::Span;
pub use types::{TypeTag, Value};
