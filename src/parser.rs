use crate::Span;
use crate::ast::{Expr, FuncDecl, Param, Stmt};
use crate::lexer::{LexerError, Token, TokenKind};
use crate::stack::ensure_sufficient_stack;
use crate::types::Value;
use std::rc::Rc;
use thiserror::Error;

/// Blocks, statement bodies, parenthesized expressions and prefix operators may nest this deep.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse error [line {line}]: Unexpected token {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
        span: Span,
    },
    #[error("Parse error [line {line}]: Unable to parse {kind} '{text}'")]
    InvalidLiteral {
        kind: TokenKind,
        text: String,
        line: usize,
        span: Span,
    },
    #[error("Parse error [line {line}]: Invalid assignment target")]
    InvalidAssignmentTarget { line: usize, span: Span },
    #[error("Parse error [line {line}]: Expected new line after statement, found {found}")]
    MissingTerminator {
        found: String,
        line: usize,
        span: Span,
    },
    #[error("Parse error [line {line}]: Expect '}}' after block, found end of input")]
    UnterminatedBlock { line: usize, span: Span },
    #[error("Parse error [line {line}]: lambda variable '{name}' needs an initializer")]
    MissingInitializer {
        name: String,
        line: usize,
        span: Span,
    },
    #[error("Parse error [line {line}]: Nesting is deeper than {} levels", MAX_NESTING)]
    TooDeep { line: usize, span: Span },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::InvalidLiteral { line, .. }
            | ParseError::InvalidAssignmentTarget { line, .. }
            | ParseError::MissingTerminator { line, .. }
            | ParseError::UnterminatedBlock { line, .. }
            | ParseError::MissingInitializer { line, .. }
            | ParseError::TooDeep { line, .. } => *line,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::InvalidLiteral { span, .. }
            | ParseError::InvalidAssignmentTarget { span, .. }
            | ParseError::MissingTerminator { span, .. }
            | ParseError::UnterminatedBlock { span, .. }
            | ParseError::MissingInitializer { span, .. }
            | ParseError::TooDeep { span, .. } => *span,
        }
    }
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

/// Everything a parse produced: the statements that parsed, with `Stmt::Error` placeholders
/// where one failed, and every error found along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub statements: Vec<Stmt>,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn into_result(self) -> Result<Vec<Stmt>, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.statements)
        } else {
            Err(self.errors)
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, end) = tokens
                .last()
                .map(|t| (t.line, t.span.end))
                .unwrap_or((1, 0));
            tokens.push(Token::new(TokenKind::Eof, "", line, Span::new(end, end)));
        }
        Parser {
            tokens,
            current: 0,
            depth: 0,
        }
    }

    /// Parses the entire sequence of tokens. A statement that fails to parse is recorded,
    /// then the parser skips to the next line and carries on so later errors surface too.
    pub fn parse(mut self) -> ParseOutcome {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        self.skip_newlines();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    tracing::debug!(%error, "recovering from parse error");
                    statements.push(Stmt::Error(error.to_string()));
                    errors.push(error);
                    self.synchronize();
                }
            }
            self.skip_newlines();
        }

        tracing::debug!(
            statements = statements.len(),
            errors = errors.len(),
            "parsed source unit"
        );
        ParseOutcome { statements, errors }
    }

    // --- Statements ---

    fn declaration(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::declaration_kind)
    }

    fn declaration_kind(&mut self) -> ParseResult<Stmt> {
        if self.peek().kind.is_type_keyword()
            || (self.check(TokenKind::Lambda) && self.peek_next_is(TokenKind::Identifier))
        {
            let ty = self.advance();
            return self.var_declaration(ty);
        }
        if self.match_kind(TokenKind::Fn) {
            let keyword = self.previous().clone();
            let name = self.consume(TokenKind::Identifier, "a function name")?;
            return Ok(Stmt::Function(self.function_rest(keyword, Some(name))?));
        }
        if self.match_kind(TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.block(false)?));
        }
        if self.match_kind(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_kind(TokenKind::While) {
            return self.while_statement();
        }
        self.statement()
    }

    fn var_declaration(&mut self, ty: Token) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "a variable name")?;
        let initializer = if self.match_kind(TokenKind::Assign) {
            self.expression()?
        } else {
            // if there isn't an initializer, start from the zero value for that type
            match Value::zero_for(ty.kind) {
                Some(zero) => Expr::Literal(zero, name.clone()),
                None => {
                    return Err(ParseError::MissingInitializer {
                        name: name.text.clone(),
                        line: name.line,
                        span: name.span,
                    });
                }
            }
        };
        self.expect_terminator()?;
        Ok(Stmt::VarDecl {
            ty,
            name,
            initializer,
        })
    }

    /// Parses the statements of a block whose `{` was just consumed. Plain blocks need a
    /// newline after the brace; function bodies may start on the same line.
    fn block(&mut self, inline: bool) -> ParseResult<Vec<Stmt>> {
        if !inline {
            self.consume(TokenKind::Newline, "a new line after '{'")?;
        }
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
            self.skip_newlines();
        }
        if self.is_at_end() {
            let token = self.peek();
            return Err(ParseError::UnterminatedBlock {
                line: token.line,
                span: token.span,
            });
        }
        self.advance(); // '}'
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.expression()?;
        let then_branch = Box::new(self.declaration()?);
        // `else` may sit on a following line
        let checkpoint = self.current;
        self.skip_newlines();
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.declaration()?))
        } else {
            self.current = checkpoint;
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.expression()?;
        let body = Box::new(self.declaration()?);
        Ok(Stmt::While { condition, body })
    }

    /// `(type name, ...) => type { body }`, shared by `fn` declarations and lambda literals.
    fn function_rest(&mut self, keyword: Token, name: Option<Token>) -> ParseResult<Rc<FuncDecl>> {
        self.consume(TokenKind::LeftParen, "'(' before parameters")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let ty = self.consume_type(false, "a parameter type")?;
                let name = self.consume(TokenKind::Identifier, "a parameter name")?;
                params.push(Param { ty, name });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')' after parameters")?;
        self.consume(TokenKind::Arrow, "'=>' before the return type")?;
        let return_type = self.consume_type(true, "a return type")?;
        self.consume(TokenKind::LeftBrace, "'{' before the function body")?;
        let body = self.block(true)?;
        Ok(Rc::new(FuncDecl {
            keyword,
            name,
            params,
            return_type,
            body,
        }))
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_kind(TokenKind::Print) {
            let expr = self.expression()?;
            self.expect_terminator()?;
            return Ok(Stmt::Print(expr));
        }
        if self.match_kind(TokenKind::Return) {
            let keyword = self.previous().clone();
            let value = if self.at_terminator() {
                None
            } else {
                Some(self.expression()?)
            };
            self.expect_terminator()?;
            return Ok(Stmt::Return { keyword, value });
        }
        let expr = self.expression()?;
        self.expect_terminator()?;
        Ok(Stmt::Expr(expr))
    }

    // --- Expressions, lowest precedence first ---

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_kind(TokenKind::Assign) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return match expr {
                Expr::Variable(name) => Ok(Expr::Assign(name, Box::new(value))),
                _ => Err(ParseError::InvalidAssignmentTarget {
                    line: equals.line,
                    span: equals.span,
                }),
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        self.binary_left(&[TokenKind::Or], Self::and)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        self.binary_left(&[TokenKind::And], Self::equality)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_left(
            &[TokenKind::EqualEqual, TokenKind::BangEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_left(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::addition,
        )
    }

    fn addition(&mut self) -> ParseResult<Expr> {
        self.binary_left(&[TokenKind::Plus, TokenKind::Minus], Self::exponent)
    }

    // Left-associative: 2 ** 3 ** 2 is (2 ** 3) ** 2
    fn exponent(&mut self) -> ParseResult<Expr> {
        self.binary_left(&[TokenKind::StarStar], Self::multiplication)
    }

    fn multiplication(&mut self) -> ParseResult<Expr> {
        self.binary_left(
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
            Self::unary,
        )
    }

    /// One left-associative precedence level.
    fn binary_left(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut expr = operand(self)?;
        while operators.iter().any(|&kind| self.check(kind)) {
            let operator = self.advance();
            let right = operand(self)?;
            expr = Expr::Binary(Box::new(expr), operator, Box::new(right));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.check(TokenKind::Bang) || self.check(TokenKind::Minus) {
            let operator = self.advance();
            let right = self.nested(Self::unary)?;
            return Ok(Expr::Unary(operator, Box::new(right)));
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.match_kind(TokenKind::LeftParen) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.match_kind(TokenKind::Comma) {
                        break;
                    }
                }
            }
            let paren = self.consume(TokenKind::RightParen, "')' after arguments")?;
            expr = Expr::Call(Box::new(expr), paren, args);
        }
        Ok(expr)
    }

    /// Parses a literal, variable, grouping or lambda literal.
    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let literal = match token.kind {
            TokenKind::Int => Value::Integer(
                token
                    .text
                    .parse::<i64>()
                    .map_err(|_| invalid_literal(&token))?,
            ),
            TokenKind::Float => Value::Float(
                token
                    .text
                    .parse::<f64>()
                    .map_err(|_| invalid_literal(&token))?,
            ),
            TokenKind::String => Value::String(token.text.clone()),
            TokenKind::True => Value::Boolean(true),
            TokenKind::False => Value::Boolean(false),
            TokenKind::Identifier => {
                self.advance();
                return Ok(Expr::Variable(token));
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "')' after expression")?;
                return Ok(Expr::Grouping(Box::new(expr)));
            }
            TokenKind::Lambda => {
                self.advance();
                return Ok(Expr::Lambda(self.function_rest(token, None)?));
            }
            _ => return Err(unexpected(&token, "an expression")),
        };
        self.advance();
        Ok(Expr::Literal(literal, token))
    }

    /// Runs one level of recursive descent, failing once nesting passes `MAX_NESTING`.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            let token = self.peek();
            return Err(ParseError::TooDeep {
                line: token.line,
                span: token.span,
            });
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| parse(self));
        self.depth -= 1;
        result
    }

    // --- Token cursor ---

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next_is(&self, kind: TokenKind) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|t| t.kind == kind)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Consumes the current token. Never moves past `Eof`.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) && !self.is_at_end() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(unexpected(self.peek(), expected))
        }
    }

    fn consume_type(&mut self, allow_void: bool, expected: &str) -> ParseResult<Token> {
        let kind = self.peek().kind;
        let accepted = kind.is_type_keyword()
            || kind == TokenKind::Lambda
            || (allow_void && kind == TokenKind::Void);
        if accepted {
            Ok(self.advance())
        } else {
            Err(unexpected(self.peek(), expected))
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_kind(TokenKind::Newline) {}
    }

    fn at_terminator(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::RightBrace
        )
    }

    /// A simple statement ends at a newline or the end of input. A closing brace also ends
    /// it, but is left for the enclosing block to consume.
    fn expect_terminator(&mut self) -> ParseResult<()> {
        if self.match_kind(TokenKind::Newline) || self.at_terminator() {
            Ok(())
        } else {
            let token = self.peek();
            Err(ParseError::MissingTerminator {
                found: token.describe(),
                line: token.line,
                span: token.span,
            })
        }
    }

    /// Discards tokens up to and including the next newline.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.advance().kind == TokenKind::Newline {
                return;
            }
        }
    }
}

fn unexpected(token: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.describe(),
        expected: expected.to_string(),
        line: token.line,
        span: token.span,
    }
}

fn invalid_literal(token: &Token) -> ParseError {
    ParseError::InvalidLiteral {
        kind: token.kind,
        text: token.text.clone(),
        line: token.line,
        span: token.span,
    }
}

/// Parses an already tokenized source unit.
pub fn parse(tokens: Vec<Token>) -> ParseOutcome {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests)
pub fn parse_str(input: &str) -> Result<Vec<Stmt>, StrParseError> {
    let tokens = crate::lexer::tokenize(input).map_err(StrParseError::Lexer)?;
    parse(tokens).into_result().map_err(StrParseError::Parser)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrParseError {
    #[error("{}", join_lines(.0))]
    Lexer(Vec<LexerError>),
    #[error("{}", join_lines(.0))]
    Parser(Vec<ParseError>),
}

fn join_lines<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*; // Import items from parent module (Parser, ParseError, parse_str)
    use pretty_assertions::assert_eq;

    fn parse_ok(input: &str) -> Vec<Stmt> {
        match parse_str(input) {
            Ok(statements) => statements,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Parses a single expression statement and renders it in prefix form.
    fn assert_parsed_expr_string(input: &str, expected_output: &str) {
        let statements = parse_ok(input);
        match statements.as_slice() {
            [Stmt::Expr(expr)] => {
                assert_eq!(expr.to_string(), expected_output, "Input: '{}'", input)
            }
            other => panic!(
                "Expected one expression statement for '{}', got {:?}",
                input, other
            ),
        }
    }

    // Helper for asserting parse errors, comparing only the first error's variant
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(StrParseError::Parser(errors)) => {
                assert_eq!(
                    std::mem::discriminant(&errors[0]),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    errors
                );
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e),
        }
    }

    fn unexpected_token() -> ParseError {
        ParseError::UnexpectedToken {
            found: String::new(),
            expected: String::new(),
            line: 0,
            span: Span::default(),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_parsed_expr_string("123", "123");
        assert_parsed_expr_string("4.5", "4.5");
        assert_parsed_expr_string("true", "TRUE");
        assert_parsed_expr_string(r#""hi there""#, "\"hi there\"");
        assert_parsed_expr_string("name", "name");
    }

    #[test]
    fn test_parse_precedence() {
        assert_parsed_expr_string("1 + 2 * 3", "(+ 1 (* 2 3))");
        assert_parsed_expr_string("1 - 2 - 3", "(- (- 1 2) 3)");
        assert_parsed_expr_string("a < b == c > d", "(== (< a b) (> c d))");
        assert_parsed_expr_string("a or b and c", "(or a (and b c))");
        assert_parsed_expr_string("-a * !b", "(* (- a) (! b))");
        assert_parsed_expr_string("(1 + 2) * 3", "(* (group (+ 1 2)) 3)");
        assert_parsed_expr_string("10 % 3 / 2", "(/ (% 10 3) 2)");
    }

    #[test]
    fn test_parse_exponent_level_and_associativity() {
        // binds looser than '*', tighter than '+', and groups to the left
        assert_parsed_expr_string("2 * 3 ** 2", "(** (* 2 3) 2)");
        assert_parsed_expr_string("1 + 2 ** 2", "(+ 1 (** 2 2))");
        assert_parsed_expr_string("2 ** 3 ** 2", "(** (** 2 3) 2)");
    }

    #[test]
    fn test_parse_assignment_is_right_associative() {
        assert_parsed_expr_string("a := b := 3", "(:= a (:= b 3))");
    }

    #[test]
    fn test_parse_calls() {
        assert_parsed_expr_string("add(1, 2 + 3)", "(call add 1 (+ 2 3))");
        assert_parsed_expr_string("clock()", "(call clock)");
        assert_parsed_expr_string("make(1)(2)", "(call (call make 1) 2)");
    }

    #[test]
    fn test_parse_var_declarations() {
        let statements = parse_ok("int x := 5\nfloat y\n");
        match statements.as_slice() {
            [
                Stmt::VarDecl {
                    ty: t1,
                    name: n1,
                    initializer: i1,
                },
                Stmt::VarDecl {
                    ty: t2,
                    name: n2,
                    initializer: i2,
                },
            ] => {
                assert_eq!((t1.kind, n1.text.as_str()), (TokenKind::IntType, "x"));
                assert_eq!(i1.to_string(), "5");
                assert_eq!((t2.kind, n2.text.as_str()), (TokenKind::FloatType, "y"));
                assert!(matches!(i2, Expr::Literal(Value::Float(f), _) if *f == 0.0));
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn test_parse_zero_values() {
        for (source, zero) in [
            ("int a", Value::Integer(0)),
            ("bool b", Value::Boolean(false)),
            ("string s", Value::String(String::new())),
        ] {
            match parse_ok(source).as_slice() {
                [Stmt::VarDecl { initializer: Expr::Literal(value, _), .. }] => {
                    assert_eq!(value, &zero)
                }
                other => panic!("unexpected statements for '{}': {:?}", source, other),
            }
        }
    }

    #[test]
    fn test_parse_blocks_and_control_flow() {
        let statements = parse_ok(
            "\n\nint i := 0\nwhile i < 3 {\n  print i\n  i := i + 1\n}\nif i == 3 {\nprint 1\n}\nelse {\nprint 2\n}\n\n",
        );
        assert_eq!(statements.len(), 3);
        match &statements[1] {
            Stmt::While { condition, body } => {
                assert_eq!(condition.to_string(), "(< i 3)");
                assert!(matches!(body.as_ref(), Stmt::Block(inner) if inner.len() == 2));
            }
            other => panic!("expected while, got {:?}", other),
        }
        assert!(matches!(
            &statements[2],
            Stmt::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_if_without_else_keeps_following_statement() {
        let statements = parse_ok("if true print 1\n\nprint 2\n");
        assert_eq!(statements.len(), 2);
        assert!(matches!(&statements[0], Stmt::If { else_branch: None, .. }));
        assert!(matches!(&statements[1], Stmt::Print(_)));
    }

    #[test]
    fn test_parse_function_declaration() {
        let statements = parse_ok("fn add(int a, int b) => int { return a + b }\n");
        match statements.as_slice() {
            [Stmt::Function(decl)] => {
                assert_eq!(decl.display_name(), "add");
                let params: Vec<(&str, TokenKind)> = decl
                    .params
                    .iter()
                    .map(|p| (p.name.text.as_str(), p.ty.kind))
                    .collect();
                assert_eq!(
                    params,
                    vec![("a", TokenKind::IntType), ("b", TokenKind::IntType)]
                );
                assert_eq!(decl.return_type.kind, TokenKind::IntType);
                assert!(matches!(
                    decl.body.as_slice(),
                    [Stmt::Return { value: Some(_), .. }]
                ));
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn test_parse_multiline_void_function_and_lambda() {
        let statements = parse_ok(
            "fn greet(string who, lambda f) => void {\n  print who\n  return\n}\nlambda twice := lambda(int x) => int { return x * 2 }\n",
        );
        assert_eq!(statements.len(), 2);
        match &statements[1] {
            Stmt::VarDecl {
                ty,
                initializer: Expr::Lambda(decl),
                ..
            } => {
                assert_eq!(ty.kind, TokenKind::Lambda);
                assert_eq!(decl.display_name(), "<lambda>");
            }
            other => panic!("expected lambda declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_invalid_assignment_target() {
        assert_parse_error(
            "1 + 2 := 3\n",
            ParseError::InvalidAssignmentTarget {
                line: 0,
                span: Span::default(),
            },
        );
    }

    #[test]
    fn test_parse_error_missing_terminator() {
        assert_parse_error(
            "print 1 2\n",
            ParseError::MissingTerminator {
                found: String::new(),
                line: 0,
                span: Span::default(),
            },
        );
    }

    #[test]
    fn test_parse_error_unterminated_block() {
        assert_parse_error(
            "{\nprint 1\n",
            ParseError::UnterminatedBlock {
                line: 0,
                span: Span::default(),
            },
        );
    }

    #[test]
    fn test_parse_error_block_needs_newline() {
        assert_parse_error("{ print 1 }\n", unexpected_token());
    }

    #[test]
    fn test_parse_error_bad_literal() {
        assert_parse_error(
            "print 99999999999999999999\n",
            ParseError::InvalidLiteral {
                kind: TokenKind::Int,
                text: String::new(),
                line: 0,
                span: Span::default(),
            },
        );
    }

    #[test]
    fn test_parse_error_lambda_needs_initializer() {
        assert_parse_error(
            "lambda f\n",
            ParseError::MissingInitializer {
                name: String::new(),
                line: 0,
                span: Span::default(),
            },
        );
    }

    #[test]
    fn test_parse_error_unexpected_token() {
        assert_parse_error("print\n", unexpected_token());
        assert_parse_error("int := 4\n", unexpected_token());
        assert_parse_error("fn f(x) => int { return x }\n", unexpected_token());
    }

    #[test]
    fn test_synchronize_reports_every_error() {
        let tokens = crate::lexer::tokenize("print )\nint x := 1\nprint 1 2\nprint x\n").unwrap();
        let outcome = parse(tokens);

        let lines: Vec<usize> = outcome.errors.iter().map(ParseError::line).collect();
        assert_eq!(lines, vec![1, 3]);
        // the good statements survive, failed ones leave a placeholder
        assert_eq!(outcome.statements.len(), 4);
        assert!(matches!(outcome.statements[0], Stmt::Error(_)));
        assert!(matches!(outcome.statements[1], Stmt::VarDecl { .. }));
        assert!(matches!(outcome.statements[2], Stmt::Error(_)));
        assert!(matches!(outcome.statements[3], Stmt::Print(_)));
    }

    #[test]
    fn test_error_messages_name_the_line() {
        let err = parse_str("int x := 1\nprint (x\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error [line 2]: Unexpected token newline, expected ')' after expression"
        );
    }

    #[test]
    fn test_nesting_within_limit() {
        let depth = 200;
        let input = format!("print {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        let statements = parse_ok(&input);
        assert_eq!(statements.len(), 1);

        let blocks = format!("{}print 1\n{}", "{\n".repeat(depth), "}\n".repeat(depth));
        assert_eq!(parse_ok(&blocks).len(), 1);
    }

    #[test]
    fn test_nesting_too_deep() {
        let too_deep = ParseError::TooDeep {
            line: 0,
            span: Span::default(),
        };
        let depth = 1000;
        let parens = format!("print {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        assert_parse_error(&parens, too_deep.clone());
        assert_parse_error(&format!("print {}1\n", "-".repeat(depth)), too_deep.clone());

        let blocks = format!("{}print 1\n{}", "{\n".repeat(depth), "}\n".repeat(depth));
        let err = parse_str(&blocks).unwrap_err();
        match err {
            StrParseError::Parser(errors) => {
                assert_eq!(errors[0].line(), MAX_NESTING + 1);
                assert!(matches!(errors[0], ParseError::TooDeep { .. }));
            }
            other => panic!("Expected parse errors, got {:?}", other),
        }
    }

    #[test]
    fn test_parser_appends_missing_eof() {
        let outcome = parse(vec![]);
        assert!(outcome.statements.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
