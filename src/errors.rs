// File: src/errors.rs
//
// Error reporting for the Rill interpreter.
// Interpretation fails in one of two domains: compile diagnostics collected
// with panic-mode recovery, or a runtime error carrying a call-stack trace.
// The diagnostic text itself is stable and uncolored; callers that sit on a
// terminal (the REPL, the CLI) decorate it.

use std::fmt;

/// Why a call to `Vm::interpret` failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RillError {
    /// One pre-formatted `[line N] Error ...` diagnostic per compile error,
    /// in source order.
    Compile(Vec<String>),
    /// The runtime message plus one `[line N] in ...` trace line per live
    /// call frame, innermost first.
    Runtime { message: String, trace: Vec<String> },
}

impl RillError {
    /// Process exit code for this failure, sysexits-style: 65 for bad
    /// source, 70 for a runtime failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RillError::Compile(_) => 65,
            RillError::Runtime { .. } => 70,
        }
    }
}

impl fmt::Display for RillError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RillError::Compile(diagnostics) => {
                for (i, diagnostic) in diagnostics.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", diagnostic)?;
                }
                Ok(())
            }
            RillError::Runtime { message, trace } => {
                write!(f, "{}", message)?;
                for line in trace {
                    write!(f, "\n{}", line)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RillError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let compile = RillError::Compile(vec![]);
        let runtime = RillError::Runtime { message: String::new(), trace: vec![] };
        assert_eq!(compile.exit_code(), 65);
        assert_eq!(runtime.exit_code(), 70);
    }

    #[test]
    fn test_display_joins_lines() {
        let err = RillError::Compile(vec![
            "[line 1] Error at ';': Expect expression.".to_string(),
            "[line 2] Error at end: Expect ';' after value.".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "[line 1] Error at ';': Expect expression.\n[line 2] Error at end: Expect ';' after value."
        );

        let err = RillError::Runtime {
            message: "Undefined variable 'x'.".to_string(),
            trace: vec!["[line 3] in inner()".to_string(), "[line 9] in script".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Undefined variable 'x'.\n[line 3] in inner()\n[line 9] in script"
        );
    }
}
