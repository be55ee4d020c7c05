// File: src/main.rs
//
// Main entry point for the Rill interpreter.
// With a script argument the file is compiled and run; without one an
// interactive REPL starts. Exit codes follow sysexits: 65 for compile
// errors, 70 for runtime errors, 74 when the script cannot be read.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use rill::repl::Repl;
use rill::vm::Vm;

#[derive(Parser)]
#[command(
    name = "rill",
    about = "Rill: a small scripting language",
    version = env!("CARGO_PKG_VERSION"),
    long_about = None
)]
struct Cli {
    /// Script to run; starts the interactive REPL when omitted
    script: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    match cli.script {
        Some(path) => run_file(&path),
        None => match Repl::new() {
            Ok(mut repl) => {
                if let Err(e) = repl.run() {
                    eprintln!("REPL error: {}", e);
                    process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("Failed to start REPL: {}", e);
                process::exit(1);
            }
        },
    }
}

fn run_file(path: &Path) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read {}: {}", path.display(), e);
            process::exit(74);
        }
    };

    let mut vm = Vm::new();
    if let Err(err) = vm.interpret(&source) {
        eprintln!("{}", err);
        process::exit(err.exit_code());
    }
}
