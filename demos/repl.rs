use mclisp::meta::META_EVAL_SOURCE;
use mclisp::{Error, ParseErrorKind, Session, builtinops, parse};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=mclisp=debug shows definitions and top-level forms, =trace every apply
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_repl() {
        eprintln!("The REPL encountered an unexpected error and must exit.");
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run_repl() -> Result<(), ReadlineError> {
    println!("mclisp: McCarthy's LISP");
    println!("Enter S-expressions like: (cons 'a '(b c))");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    let mut session = Session::new();
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "mclisp> " } else { "   ...> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(command);

                    // Handle special commands
                    match command {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&session);
                            continue;
                        }
                        ":meta" => {
                            match session.run(META_EVAL_SOURCE) {
                                Ok(_) => println!("Loaded eval. and its helpers."),
                                Err(e) => println!("Error: {e}"),
                            }
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                } else {
                    let _ = rl.add_history_entry(line.trim());
                }

                pending.push_str(&line);
                pending.push('\n');

                // Keep reading while a list is still open
                if let Err(Error::Syntax(err)) = parse(&pending)
                    && err.kind == ParseErrorKind::Incomplete
                {
                    continue;
                }

                let source = std::mem::take(&mut pending);
                match session.run(&source) {
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Interrupted) => {
                if !pending.is_empty() {
                    pending.clear();
                    println!("(input discarded)");
                    continue;
                }
                println!("Goodbye!");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn print_help() {
    println!("McCarthy's LISP interpreter:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :meta      - Define eval. and its helpers in this session");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard a partial expression, or exit");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Keywords:");
    for op in builtinops::get_builtin_ops() {
        let kind = if op.is_special_form() {
            "special form"
        } else {
            "primitive"
        };
        println!("  {:<8} {kind}", op.id);
    }
    println!();
    println!("Top-level definitions:");
    println!("  (label name value)          binds name to value, unevaluated");
    println!("  (defun name (params) body)  binds name to (lambda (params) body)");
    println!();
    println!("Examples:");
    println!("  (car '(a b c))");
    println!("  (cond ((eq 'a 'b) 'first) ('t 'second))");
    println!("  ((lambda (x) (cons x '(b))) 'a)");
    println!("  (defun wrap (x) (cons x '()))");
    println!("  :meta");
    println!("  (eval. '(car (cons 'a 'b)) '())");
    println!();
}

fn print_environment(session: &Session) {
    let bindings = session.env().bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    for (name, value) in bindings {
        println!("  {name} = {value}");
    }
}
