use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;

use nestc::diagnostics;
use nestc::driver::{self, CompileOptions, Verify};
use nestc::parser::lexer;
use nestc::CompileError;

#[derive(Parser)]
#[command(name = "nestc")]
#[command(about = "Single-pass compiler for a nested-procedure language", version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a source file to IR text
    Compile {
        /// Source file
        input: String,

        /// Output file, '-' for stdout (default: <input>.ll)
        #[arg(short, long)]
        output: Option<String>,

        /// Skip the structural check of the entry procedure
        #[arg(long, conflicts_with = "verify_all")]
        no_verify: bool,

        /// Check every procedure, not just the entry one
        #[arg(long)]
        verify_all: bool,
    },

    /// Parse and verify without writing anything
    Check {
        /// Source file
        input: String,
    },

    /// Print the token stream
    Tokens {
        /// Source file
        input: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn default_output(input: &str) -> PathBuf {
    Path::new(input).with_extension("ll")
}

fn write_output(output: Option<&str>, input: &str, text: &str) -> Result<(), CompileError> {
    match output {
        Some("-") => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .map_err(|source| CompileError::Io { path: PathBuf::from("<stdout>"), source })
        }
        _ => {
            let path = output.map_or_else(|| default_output(input), PathBuf::from);
            fs::write(&path, text).map_err(|source| CompileError::Io { path: path.clone(), source })?;
            eprintln!("Compiled to: {}", path.display());
            Ok(())
        }
    }
}

fn run(command: Commands) -> Result<(), (CompileError, Option<String>)> {
    match command {
        Commands::Compile { input, output, no_verify, verify_all } => {
            let verify = match (no_verify, verify_all) {
                (true, _) => Verify::None,
                (_, true) => Verify::All,
                _ => Verify::Outermost,
            };
            let options = CompileOptions { verify };

            let source = driver::read_source(&input).map_err(|e| (e, None))?;
            let module = driver::compile_source(&input, &source, &options)
                .map_err(|e| (e, Some(source.clone())))?;
            write_output(output.as_deref(), &input, &module.to_string()).map_err(|e| (e, None))
        }
        Commands::Check { input } => {
            let source = driver::read_source(&input).map_err(|e| (e, None))?;
            let options = CompileOptions { verify: Verify::All };
            let module = driver::compile_source(&input, &source, &options)
                .map_err(|e| (e, Some(source.clone())))?;
            println!(
                "{}: ok ({} procedures, {} variables)",
                input,
                module.functions.len(),
                module.globals.len()
            );
            Ok(())
        }
        Commands::Tokens { input } => {
            let source = driver::read_source(&input).map_err(|e| (e, None))?;
            let tokens = lexer::tokenize(&source, &input).map_err(|e| (e, Some(source.clone())))?;
            for t in &tokens {
                println!("{:>4}:{:<3} {}", t.span.line, t.span.column, t.token);
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err((error, source)) = run(cli.command) {
        diagnostics::fatal(&error, source.as_deref());
    }
}
