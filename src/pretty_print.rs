use crate::error::Error;
use crate::evaluator::{RuntimeError, RuntimeErrorKind};
use crate::lexer::{LexerError, LexerErrorKind};
use crate::parser::ParseError;
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

type Diagnostic<'a> = Report<'a, (&'a str, Range<usize>)>;

fn build<'a>(
    source_id: &'a str,
    range: Range<usize>,
    message: String,
    label: String,
) -> Diagnostic<'a> {
    Report::build(ReportKind::Error, (source_id, range.clone()))
        .with_message(message)
        .with_label(Label::new((source_id, range)).with_message(label))
        .finish()
}

fn eprint<'a>(report: Diagnostic<'a>, source_id: &'a str, input: &str) -> io::Result<()> {
    report.eprint((source_id, Source::from(input)))
}

impl LexerError {
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        let label = match &self.error {
            LexerErrorKind::UnterminatedString => "This string is never closed".to_string(),
            LexerErrorKind::UnterminatedComment => "This comment is never closed".to_string(),
            LexerErrorKind::InvalidCharacter(c) => format!("'{}' is not part of the language", c),
            LexerErrorKind::InvalidToken => "This input cannot be tokenized".to_string(),
        };
        let report = build(
            source_id,
            self.span.label_range(input.len()),
            self.to_string(),
            label,
        );
        eprint(report, source_id, input)
    }
}

impl ParseError {
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        let label = match self {
            ParseError::UnexpectedToken { expected, .. } => format!("Expected {}", expected),
            ParseError::InvalidLiteral { kind, .. } => format!("This {} is out of range", kind),
            ParseError::InvalidAssignmentTarget { .. } => {
                "Only a variable can appear left of ':='".to_string()
            }
            ParseError::MissingTerminator { .. } => {
                "Expected the statement to end here".to_string()
            }
            ParseError::UnterminatedBlock { .. } => "The block is still open here".to_string(),
            ParseError::MissingInitializer { .. } => {
                "This declaration needs ':=' and a value".to_string()
            }
            ParseError::TooDeep { .. } => "Nesting gives up here".to_string(),
        };
        let report = build(
            source_id,
            self.span().label_range(input.len()),
            self.to_string(),
            label,
        );
        eprint(report, source_id, input)
    }
}

impl RuntimeError {
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        let label = match &self.kind {
            RuntimeErrorKind::Env(_) => "While evaluating this name".to_string(),
            RuntimeErrorKind::DivideByZero | RuntimeErrorKind::ModuloByZero => {
                "The right operand is zero".to_string()
            }
            RuntimeErrorKind::MismatchedOperands { left, right } => {
                format!("Cannot combine {} with {}", left, right)
            }
            RuntimeErrorKind::ArityMismatch { .. }
            | RuntimeErrorKind::ArgumentTypeMismatch { .. }
            | RuntimeErrorKind::ReturnTypeMismatch { .. }
            | RuntimeErrorKind::NotCallable(_)
            | RuntimeErrorKind::StackOverflow
            | RuntimeErrorKind::Native(_) => "In this call".to_string(),
            _ => "Here".to_string(),
        };
        // statements that never parsed have no location
        if self.line == 0 {
            eprintln!("{}", self);
            return Ok(());
        }
        let report = build(
            source_id,
            self.span.label_range(input.len()),
            self.to_string(),
            label,
        );
        eprint(report, source_id, input)
    }
}

impl Error {
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        match self {
            Error::Lex(e) => e.pretty_print(source_id, input),
            Error::Parse(e) => e.pretty_print(source_id, input),
            Error::Runtime(e) => e.pretty_print(source_id, input),
        }
    }
}
