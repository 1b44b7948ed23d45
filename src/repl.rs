use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

use crate::environment::Environment;
use crate::error::run_source;
use crate::evaluator::Interpreter;
use crate::lexer::{KEYWORDS, TokenKind, tokenize};

pub const HISTORY_FILE: &str = "butter_history.txt";
const PROMPT: &str = "butter> ";
const SOURCE_ID: &str = "REPL";

/// `{` minus `}`, ignoring braces inside string literals and line comments.
pub fn brace_balance(input: &str) -> i64 {
    let mut balance = 0;
    let mut in_string = false;
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            in_string = c != '"';
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            '/' if chars.peek() == Some(&'/') => {
                // skip to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    balance
}

/// Completions for the identifier being typed at the end of `line`, as the text still
/// missing after what was typed. Candidates are keywords and every name in `env`.
pub fn candidates(line: &str, env: &Environment) -> Vec<String> {
    let prefix = match tokenize(line) {
        Ok(tokens) => match tokens.iter().rev().find(|t| t.kind != TokenKind::Eof) {
            Some(t) if t.kind == TokenKind::Identifier && t.span.end == line.len() => {
                t.text.clone()
            }
            _ => return vec![],
        },
        Err(_) => return vec![],
    };

    let mut found: Vec<String> = env
        .get_identifiers()
        .into_iter()
        .chain(KEYWORDS.iter().map(|k| k.to_string()))
        .filter(|id| id.len() > prefix.len() && id.starts_with(&prefix))
        .map(|id| id[prefix.len()..].to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}

struct ButterCompleter {
    env: Rc<RefCell<Environment>>,
}

impl rustyline::completion::Completer for ButterCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok((pos, candidates(&line[..pos], &self.env.borrow())))
    }
}

struct ButterValidator;

impl Validator for ButterValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let balance = brace_balance(ctx.input());
        if balance < 0 {
            Ok(ValidationResult::Invalid(Some(
                "  - Unmatched '}'".to_string(),
            )))
        } else if balance > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct ButterHighlighter;

impl Highlighter for ButterHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut highlighted = String::with_capacity(line.len());
        let mut in_string = false;
        for c in line.chars() {
            if c == '"' {
                in_string = !in_string;
                highlighted.push_str("\x1b[32m\"\x1b[0m");
            } else if in_string {
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
            } else {
                highlighted.push(c);
            }
        }
        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputHelper {
    #[rustyline(Validator)]
    validator: ButterValidator,
    #[rustyline(Highlighter)]
    highlighter: ButterHighlighter,
    #[rustyline(Completer)]
    completer: ButterCompleter,
}

/// Runs the interactive prompt until `exit` or end of input. Definitions persist across
/// inputs; an error only abandons the input it occurred in.
pub fn run_prompt() -> rustyline::Result<()> {
    println!("Butter REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let mut interpreter = Interpreter::new();
    let helper = InputHelper {
        validator: ButterValidator,
        highlighter: ButterHighlighter,
        completer: ButterCompleter {
            env: interpreter.globals(),
        },
    };
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        tracing::debug!(file = HISTORY_FILE, "no previous history");
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input == "exit" {
                    break;
                }

                if let Err(errors) = run_source(&mut interpreter, &line, true) {
                    for error in errors {
                        if let Err(e) = error.pretty_print(SOURCE_ID, &line) {
                            eprintln!("{}", error);
                            tracing::warn!(%e, "unable to render diagnostic");
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_brace_balance() {
        assert_eq!(brace_balance("print 1"), 0);
        assert_eq!(brace_balance("fn f() => int {"), 1);
        assert_eq!(brace_balance("if x {\n{\n"), 2);
        assert_eq!(brace_balance("}"), -1);
        assert_eq!(brace_balance("while t {\n}\n"), 0);
    }

    #[test]
    fn test_brace_balance_ignores_strings_and_comments() {
        assert_eq!(brace_balance("print \"{{\""), 0);
        assert_eq!(brace_balance("print \"}\" + \"{\""), 0);
        assert_eq!(brace_balance("print 1 // {\n{"), 1);
        assert_eq!(brace_balance("print 8 / 2 {"), 1);
    }

    #[test]
    fn test_candidates() {
        let env = Environment::new_global_populated();
        env.borrow_mut().define("printer", Value::Integer(1)).unwrap();
        env.borrow_mut().define("total", Value::Integer(0)).unwrap();

        assert_eq!(candidates("pri", &env.borrow()), vec!["nt", "nter"]);
        assert_eq!(candidates("print to", &env.borrow()), vec!["tal"]);
        assert_eq!(candidates("int x := cl", &env.borrow()), vec!["ock"]);
        assert_eq!(candidates("wh", &env.borrow()), vec!["ile"]);
    }

    #[test]
    fn test_no_candidates_outside_identifiers() {
        let env = Environment::new_global_populated();
        assert!(candidates("print ", &env.borrow()).is_empty());
        assert!(candidates("1 + 2", &env.borrow()).is_empty());
        assert!(candidates("print \"cl", &env.borrow()).is_empty());
        assert!(candidates("", &env.borrow()).is_empty());
    }
}
