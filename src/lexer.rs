use logos::{FilterResult, Lexer, Logos};
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r]+")] // Skip whitespace, newlines are significant
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("\n")]
    Newline,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("**")]
    StarStar,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(":=")]
    Assign,
    #[token("=>")]
    Arrow,

    // Literals keep their text on the token, the parser does the conversion.
    #[regex("[0-9]+")]
    Int,
    #[regex(r"[0-9]+\.[0-9]+")]
    Float,
    #[regex(r#""[^"]*"?"#, string_literal)]
    String,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Type keywords
    #[token("int")]
    IntType,
    #[token("float")]
    FloatType,
    #[token("bool")]
    BoolType,
    #[token("string")]
    StringType,
    #[token("void")]
    Void,
    #[token("lambda")]
    Lambda,

    // Control keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("fn")]
    Fn,
    #[token("return")]
    Return,
    #[token("print")]
    Print,
    #[token("and")]
    And,
    #[token("or")]
    Or,

    #[regex("[a-zA-Z]+")]
    Identifier,

    // Never emitted: the callback either skips the comment or reports it as unterminated.
    #[token("/*", block_comment)]
    BlockComment,

    // Synthetic, appended by `tokenize`.
    Eof,
}

/// Reserved words, in the order the shell offers them as completions.
pub const KEYWORDS: &[&str] = &[
    "and", "bool", "else", "false", "float", "fn", "if", "int", "lambda", "or", "print", "return",
    "string", "true", "void", "while",
];

fn string_literal(lex: &mut Lexer<TokenKind>) -> Result<(), LexerErrorKind> {
    let slice = lex.slice();
    // make sure string was terminated
    if slice.len() < 2 || !slice.ends_with('"') {
        return Err(LexerErrorKind::UnterminatedString);
    }
    Ok(())
}

fn block_comment(lex: &mut Lexer<TokenKind>) -> FilterResult<(), LexerErrorKind> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(LexerErrorKind::UnterminatedComment)
        }
    }
}

impl TokenKind {
    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::IntType | TokenKind::FloatType | TokenKind::BoolType | TokenKind::StringType
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; string literals are stored without their quotes.
    pub text: String,
    pub line: usize,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, span: Span) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            span,
        }
    }

    /// How the token is named in error messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Newline | TokenKind::Eof => self.kind.to_string(),
            TokenKind::String => format!("\"{}\"", self.text),
            TokenKind::Int | TokenKind::Float | TokenKind::Identifier => {
                format!("'{}'", self.text)
            }
            kind => format!("'{}'", kind),
        }
    }
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Newline => "newline",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::EqualEqual => "==",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Assign => ":=",
            TokenKind::Arrow => "=>",
            TokenKind::Int => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::String => "string literal",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::IntType => "int",
            TokenKind::FloatType => "float",
            TokenKind::BoolType => "bool",
            TokenKind::StringType => "string",
            TokenKind::Void => "void",
            TokenKind::Lambda => "lambda",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::Print => "print",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Identifier => "identifier",
            TokenKind::BlockComment => "/*",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Unterminated multi-line comment")]
    UnterminatedComment,
    #[error("Invalid character encountered: '{0}'")]
    InvalidCharacter(char),
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexical error [line {line}]: {error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub line: usize,
    pub span: Span,
}

/// Maps byte offsets to 1-based line numbers. Offsets must be queried in increasing order.
struct LineCounter<'a> {
    input: &'a str,
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(input: &'a str) -> Self {
        LineCounter {
            input,
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> usize {
        if offset > self.offset {
            self.line += self.input.as_bytes()[self.offset..offset]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.offset = offset;
        }
        self.line
    }
}

/// Scans a whole source unit. Every lexical error in the unit is collected before returning,
/// so the caller can report them together. On success the last token is always `Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, Vec<LexerError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lines = LineCounter::new(input);
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        let line = lines.line_at(range.start);
        match result {
            Ok(TokenKind::String) => {
                let slice = lexer.slice();
                tokens.push(Token::new(
                    TokenKind::String,
                    &slice[1..slice.len() - 1],
                    line,
                    span,
                ));
            }
            Ok(kind) => tokens.push(Token::new(kind, lexer.slice(), line, span)),
            Err(LexerErrorKind::InvalidToken) => {
                let error = match lexer.slice().chars().next() {
                    Some(c) => LexerErrorKind::InvalidCharacter(c),
                    None => LexerErrorKind::InvalidToken,
                };
                errors.push(LexerError { error, line, span });
            }
            Err(error) => errors.push(LexerError { error, line, span }),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(count = errors.len(), "lexing failed");
        return Err(errors);
    }

    let end = input.len();
    tokens.push(Token::new(
        TokenKind::Eof,
        "",
        lines.line_at(end),
        Span::new(end, end),
    ));
    tracing::debug!(count = tokens.len(), "tokenized source unit");
    for token in &tokens {
        tracing::trace!(kind = ?token.kind, text = %token.text, line = token.line, "token");
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Helper to simplify testing token sequences, the trailing Eof is dropped
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let mut kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds.pop(), Some(TokenKind::Eof), "Input: '{}'", input);
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {:?}", input, e),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected_error_variant: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(errors) => {
                assert_eq!(
                    std::mem::discriminant(&errors[0].error),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    errors
                );
            }
        }
    }

    fn texts(input: &str) -> Vec<String> {
        tokenize(input)
            .expect("Should tokenize successfully")
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens[0].line, 1);
    }

    #[test]
    fn test_operators() {
        assert_tokens(
            "+ - * / % ** ! != == > >= < <= := =>",
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::StarStar,
                TokenKind::Bang,
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Assign,
                TokenKind::Arrow,
            ]
        );
    }

    #[test]
    fn test_two_char_operators_are_greedy() {
        assert_tokens("***", vec![TokenKind::StarStar, TokenKind::Star]);
        assert_tokens("=>>", vec![TokenKind::Arrow, TokenKind::Greater]);
        assert_tokens("!!=", vec![TokenKind::Bang, TokenKind::BangEqual]);
        // `<=` wins, leaving a lone `=` which is not a token
        assert_lexer_error("<==", LexerErrorKind::InvalidCharacter('='));
    }

    #[test]
    fn test_numbers() {
        assert_tokens("123", vec![TokenKind::Int]);
        assert_tokens("6.78", vec![TokenKind::Float]);
        assert_eq!(texts("6.78"), vec!["6.78", ""]);
        // a dot needs a digit after it to make a float
        assert_lexer_error("1.", LexerErrorKind::InvalidCharacter('.'));
        assert_tokens("12abc", vec![TokenKind::Int, TokenKind::Identifier]);
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_tokens(
            "int float bool string void lambda if else while fn return print and or true false",
            vec![
                TokenKind::IntType,
                TokenKind::FloatType,
                TokenKind::BoolType,
                TokenKind::StringType,
                TokenKind::Void,
                TokenKind::Lambda,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Fn,
                TokenKind::Return,
                TokenKind::Print,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::True,
                TokenKind::False,
            ],
        );
        // keywords are case sensitive and only match whole words
        assert_tokens(
            "Int integer printer",
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
            ],
        );
    }

    #[test]
    fn test_identifiers_have_no_digits_or_underscores() {
        assert_tokens("abc1", vec![TokenKind::Identifier, TokenKind::Int]);
        assert_lexer_error("my_var", LexerErrorKind::InvalidCharacter('_'));
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![TokenKind::String]);
        assert_eq!(texts(r#""with space""#), vec!["with space", ""]);
        // no escape processing
        assert_eq!(texts(r#""a\nb""#), vec![r"a\nb", ""]);
        assert_eq!(texts(r#""""#), vec!["", ""]);
    }

    #[test]
    fn test_newlines_are_tokens() {
        assert_tokens(
            "int x := 1\nprint x\n",
            vec![
                TokenKind::IntType,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Print,
                TokenKind::Identifier,
                TokenKind::Newline,
            ],
        );
    }

    #[test]
    fn test_comments() {
        let input = "print 1 // trailing comment\n// whole line\nprint 2";
        assert_tokens(
            input,
            vec![
                TokenKind::Print,
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Print,
                TokenKind::Int,
            ],
        );
        assert_tokens(
            "1 /* inline */ + 2",
            vec![TokenKind::Int, TokenKind::Plus, TokenKind::Int],
        );
        assert_tokens(
            "8 / 2",
            vec![TokenKind::Int, TokenKind::Slash, TokenKind::Int],
        );
    }

    #[test]
    fn test_line_numbers_count_comment_newlines() {
        let tokens = tokenize("/* one\ntwo\nthree */ x\ny").unwrap();
        let lines: Vec<(TokenKind, usize)> = tokens.iter().map(|t| (t.kind, t.line)).collect();
        assert_eq!(
            lines,
            vec![
                (TokenKind::Identifier, 3),
                (TokenKind::Newline, 3),
                (TokenKind::Identifier, 4),
                (TokenKind::Eof, 4),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_lexer_error(r#""hello"#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#"""#, LexerErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unterminated_comment() {
        assert_lexer_error("1 /* never closed", LexerErrorKind::UnterminatedComment);
    }

    #[test]
    fn test_invalid_character_reports_line() {
        let errors = tokenize("int x := 1\nx := 2 $ 3\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error, LexerErrorKind::InvalidCharacter('$'));
        assert_eq!(errors[0].line, 2);
        assert_eq!(
            errors[0].to_string(),
            "Lexical error [line 2]: Invalid character encountered: '$'"
        );
    }

    #[test]
    fn test_collects_every_error() {
        let errors = tokenize("@\n#\n").unwrap_err();
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2]);
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "x := 1";
        let tokens = tokenize(input).expect("Should tokenize successfully");

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(2, 4));
        assert_eq!(tokens[2].span, Span::new(5, 6));
        assert_eq!(tokens[3].kind, TokenKind::Eof);
        assert_eq!(tokens[3].span, Span::new(6, 6));
    }

    #[test]
    fn test_describe() {
        let tokens = tokenize("foo \"bar\" +\n").unwrap();
        let described: Vec<String> = tokens.iter().map(Token::describe).collect();
        assert_eq!(
            described,
            vec!["'foo'", "\"bar\"", "'+'", "newline", "end of input"]
        );
    }
}
