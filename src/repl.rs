// File: src/repl.rs
//
// Interactive REPL (Read-Eval-Print Loop) for Rill.
// One statement or declaration per submission, with:
// - Multi-line input while braces or parentheses stay unbalanced
// - Command history with up/down arrow navigation
// - Special commands (:help, :quit, :reset)
// - A single VM per session, so globals persist across lines
// - Errors are printed and the session continues

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::vm::Vm;

/// REPL session holding the VM state and the line editor.
pub struct Repl {
    vm: Vm,
    editor: DefaultEditor,
}

impl Repl {
    /// Creates a new REPL session with a fresh VM.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let editor = DefaultEditor::new()?;
        Ok(Repl { vm: Vm::new(), editor })
    }

    fn show_banner(&self) {
        println!("{}", format!("Rill {} - interactive shell", env!("CARGO_PKG_VERSION")).bright_cyan());
        println!(
            "  Type {} for commands, {} to leave.",
            ":help".bright_yellow(),
            ":quit".bright_yellow()
        );
        println!();
    }

    /// Starts the REPL loop.
    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.show_banner();

        let mut buffer = String::new();

        loop {
            let prompt = if buffer.is_empty() {
                "rill> ".bright_green().to_string()
            } else {
                "....> ".bright_blue().to_string()
            };

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());

                    if buffer.is_empty() && line.trim().starts_with(':') {
                        if self.handle_command(line.trim()) {
                            continue;
                        } else {
                            break;
                        }
                    }

                    buffer.push_str(&line);
                    buffer.push('\n');

                    if is_input_complete(&buffer) {
                        self.eval_input(&buffer);
                        buffer.clear();
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (:quit to exit)".bright_yellow());
                    buffer.clear();
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "Goodbye!".bright_cyan());
                    break;
                }
                Err(err) => {
                    eprintln!("{} {}", "Error:".bright_red(), err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handles special commands starting with ':'.
    /// Returns true to continue the session, false to quit.
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":help" | ":h" => {
                self.show_help();
                true
            }
            ":quit" | ":q" | ":exit" => {
                println!("{}", "Goodbye!".bright_cyan());
                false
            }
            ":reset" | ":r" => {
                self.vm = Vm::new();
                println!("{}", "Environment reset".bright_green());
                true
            }
            _ => {
                println!(
                    "{} Unknown command: {}. Type {} for available commands.",
                    "Error:".bright_red(),
                    cmd.bright_yellow(),
                    ":help".bright_yellow()
                );
                true
            }
        }
    }

    fn show_help(&self) {
        println!();
        println!("{}", "Commands:".bright_cyan().bold());
        println!("  {}  or :h   Display this help message", ":help".bright_yellow());
        println!("  {}  or :q   Exit the REPL", ":quit".bright_yellow());
        println!("  {} or :r   Reset globals to a fresh VM", ":reset".bright_yellow());
        println!();
        println!("{}", "Multi-line input:".bright_cyan().bold());
        println!("  Leave braces or parentheses unclosed to continue on the");
        println!("  next line; the input runs once they balance.");
        println!();
        println!("{}", "Example:".bright_cyan().bold());
        println!("  {}", "rill> fun greet(name) {".dimmed());
        println!("  {}", "....>   print \"Hello, \" + name;".dimmed());
        println!("  {}", "....> }".dimmed());
        println!("  {}", "rill> greet(\"World\");".dimmed());
        println!();
    }

    fn eval_input(&mut self, input: &str) {
        if input.trim().is_empty() {
            return;
        }
        if let Err(err) = self.vm.interpret(input) {
            eprintln!("{}", err.to_string().bright_red());
        }
    }
}

/// Whether every brace and parenthesis is balanced outside of strings and
/// line comments. Unterminated strings also hold the input open.
fn is_input_complete(input: &str) -> bool {
    let mut brace_count: i32 = 0;
    let mut paren_count: i32 = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut prev = '\0';

    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            prev = ch;
            continue;
        }
        match ch {
            '"' => in_string = !in_string,
            '/' if !in_string && prev == '/' => in_comment = true,
            '{' if !in_string => brace_count += 1,
            '}' if !in_string => brace_count -= 1,
            '(' if !in_string => paren_count += 1,
            ')' if !in_string => paren_count -= 1,
            _ => {}
        }
        prev = ch;
    }

    !in_string && brace_count <= 0 && paren_count <= 0
}
