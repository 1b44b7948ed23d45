use crate::evaluator::{Interpreter, RuntimeError};
use crate::lexer::{LexerError, tokenize};
use crate::parser::{ParseError, parse};
use std::io::Write;
use thiserror::Error;

/// Any diagnostic a Butter program can produce, in the order the phases run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn line(&self) -> usize {
        match self {
            Error::Lex(e) => e.line,
            Error::Parse(e) => e.line(),
            Error::Runtime(e) => e.line,
        }
    }
}

/// Tokenizes, parses and runs `source` on `interpreter`.
///
/// Lexical errors stop before parsing and parse errors stop before execution; every
/// error of the failing phase is returned. A runtime error stops execution, keeping
/// the effects of the statements that ran before it.
pub fn run_source<W: Write>(
    interpreter: &mut Interpreter<W>,
    source: &str,
    interactive: bool,
) -> Result<(), Vec<Error>> {
    let tokens = tokenize(source)
        .map_err(|errors| errors.into_iter().map(Error::from).collect::<Vec<_>>())?;
    let statements = parse(tokens)
        .into_result()
        .map_err(|errors| errors.into_iter().map(Error::from).collect::<Vec<_>>())?;
    interpreter
        .interpret(&statements, interactive)
        .map_err(|e| vec![Error::from(e)])
}
