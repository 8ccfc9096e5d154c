use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};

use scsa::diagnostics::{Reporter, Stage};
use scsa::interpreter::Interpreter;
use scsa::{lexer, parser, printer};

fn usage() {
    println!("Usage: scsa [--debug-tokens] [--debug-parse] [script.scsa]");
    println!("Options:");
    println!("  --debug-tokens   Print token table after lexing");
    println!("  --debug-parse    Print AST after parsing");
    println!("If no script is provided, an interactive REPL is started.");
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        usage();
        return Ok(ExitCode::SUCCESS);
    }

    let mut debug_tokens = false;
    let mut debug_parse = false;
    let mut script: Option<String> = None;

    for arg in &args {
        match arg.as_str() {
            "--debug-tokens" => debug_tokens = true,
            "--debug-parse" => debug_parse = true,
            other => {
                // A script must carry the .scsa extension, and only one is
                // accepted.
                if !other.ends_with(".scsa") || script.is_some() {
                    usage();
                    return Ok(ExitCode::FAILURE);
                }
                script = Some(other.to_string());
            }
        }
    }

    match script {
        Some(path) => run_file(&path, debug_tokens, debug_parse),
        None => run_repl(debug_parse),
    }
}

/// Execute a script: lex, parse, interpret. The first error at any stage is
/// rendered with source context and the process exits 1.
fn run_file(path: &str, debug_tokens: bool, debug_parse: bool) -> Result<ExitCode> {
    let source =
        fs::read_to_string(path).with_context(|| format!("Could not open file: {path}"))?;

    let tokens = match lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(error) => {
            Reporter::new(&source, Some(path), Stage::Lexing).emit(&error.diagnostic());
            return Ok(ExitCode::FAILURE);
        }
    };
    if debug_tokens {
        print!("{}", printer::render_token_table(&tokens));
    }

    let program = match parser::parse_tokens(tokens) {
        Ok(program) => program,
        Err(error) => {
            Reporter::new(&source, Some(path), Stage::Parsing).emit(&error.diagnostic());
            return Ok(ExitCode::FAILURE);
        }
    };
    if debug_parse {
        print!("{}", printer::render_ast(&program));
    }

    let stdout = io::stdout();
    let mut output = stdout.lock();
    let mut interpreter = Interpreter::new(&mut output);
    if let Err(error) = interpreter.interpret(&program) {
        Reporter::new(&source, Some(path), Stage::Runtime).emit(&error.diagnostic());
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

/// Line-oriented REPL: each line is lexed and parsed, and its token table
/// printed. Errors are rendered but never terminate the loop; EOF quits.
fn run_repl(debug_parse: bool) -> Result<ExitCode> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    loop {
        output.write_all(b"> ").context("Writing prompt")?;
        output.flush().context("Flushing prompt")?;

        let mut line = String::new();
        let read = input.read_line(&mut line).context("Reading input line")?;
        if read == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let tokens = match lexer::tokenize(&line) {
            Ok(tokens) => tokens,
            Err(error) => {
                Reporter::new(&line, None, Stage::Lexing).emit(&error.diagnostic());
                continue;
            }
        };
        write!(output, "{}", printer::render_token_table(&tokens))
            .context("Writing token table")?;

        match parser::parse_tokens(tokens) {
            Ok(program) => {
                if debug_parse {
                    write!(output, "{}", printer::render_ast(&program)).context("Writing AST")?;
                }
            }
            Err(error) => {
                Reporter::new(&line, None, Stage::Parsing).emit(&error.diagnostic());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
