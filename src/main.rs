use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use clap::Parser;
use owo_colors::OwoColorize;

use pal::ast::ExprIdGen;
use pal::cli::{self, AppConfig, Args, Commands};
use pal::diagnostic::{render_diagnostics, Diagnostics};
use pal::printer;
use pal::scanner::Scanner;
use pal::session::{RunOutcome, Session};

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        cli::generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);

    match args.script.clone() {
        Some(path) => run_file(&path, &args, &config),
        None => run_prompt(&args, &config),
    }
}

/// Runs a whole script. Exit codes follow the interpreter convention:
/// 65 when any static error was reported, 70 when execution aborted on
/// a runtime error.
fn run_file(path: &Path, args: &Args, config: &AppConfig) {
    verbose_log(config, &format!("Reading script from {}", path.display()));
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            error_message(config, &format!("Failed to read {}: {}", path.display(), e));
            process::exit(1);
        }
    };

    if args.ast {
        dump_ast(&source, config);
        return;
    }

    let mut stdout = io::stdout();
    let mut session = Session::new(&mut stdout);
    session.set_print_file(args.out.clone());

    verbose_log(config, "Executing script");
    match session.run(&source) {
        RunOutcome::Success => {}
        RunOutcome::StaticErrors(diagnostics) => {
            eprint!("{}", render_diagnostics(&diagnostics, config.color_enabled));
            process::exit(65);
        }
        RunOutcome::RuntimeError(error) => {
            error_message(config, &error.report());
            process::exit(70);
        }
    }
}

/// Parses only, then prints the parenthesized tree rendering.
fn dump_ast(source: &str, config: &AppConfig) {
    let mut diagnostics = Diagnostics::new();
    let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
    let mut ids = ExprIdGen::new();
    let statements = pal::parser::Parser::new(tokens, &mut ids, &mut diagnostics).parse();
    if diagnostics.had_error() {
        eprint!(
            "{}",
            render_diagnostics(diagnostics.as_slice(), config.color_enabled)
        );
        process::exit(65);
    }
    println!("{}", printer::print_program(&statements));
}

/// Line-at-a-time prompt. Errors are reported and the prompt keeps
/// going; globals and function definitions persist between lines.
fn run_prompt(args: &Args, config: &AppConfig) {
    println!("Pal {} interactive prompt", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to leave.");

    let mut session_out = io::stdout();
    let mut session = Session::new(&mut session_out);
    session.set_print_file(args.out.clone());

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                match session.run(&line) {
                    RunOutcome::Success => {}
                    RunOutcome::StaticErrors(diagnostics) => {
                        eprint!(
                            "{}",
                            render_diagnostics(&diagnostics, config.color_enabled)
                        );
                    }
                    RunOutcome::RuntimeError(error) => {
                        error_message(config, &error.report());
                    }
                }
            }
            Err(e) => {
                error_message(config, &format!("Error reading input: {e}"));
                break;
            }
        }
    }
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[pal:debug] {message}");
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{message}");
    }
}
