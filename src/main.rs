use std::process::ExitCode;
use std::sync::Once;

use butter::{Interpreter, repl, run_source};

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber, but only when `RUST_LOG` asks for one.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}

fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Unable to read '{}': {}", path, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(path, bytes = source.len(), "running script");

    let mut interpreter = Interpreter::new();
    match run_source(&mut interpreter, &source, false) {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            for error in &errors {
                if error.pretty_print(path, &source).is_err() {
                    eprintln!("{}", error);
                }
            }
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => match repl::run_prompt() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Readline Error: {}", e);
                ExitCode::FAILURE
            }
        },
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: butter [script]");
            ExitCode::from(64)
        }
    }
}
