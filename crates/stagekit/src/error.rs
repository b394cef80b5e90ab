//! Fatal abort channel.
//!
//! A step returns [`Abort`] when the whole run must stop. The runner never
//! catches it; it travels with `?` up to the process boundary where its
//! exit code becomes the process exit code.

use thiserror::Error;

/// Generic failure (missing file, failed command, declined prompt)
pub const EXIT_FAILURE: i32 = 2;
/// Invalid command-line input
pub const EXIT_VALIDATION: i32 = 3;
/// Unrecoverable environment problem
pub const EXIT_ENVIRONMENT: i32 = 10;
/// Operator interrupt during a safety-relevant prompt
pub const EXIT_INTERRUPTED: i32 = 130;

/// Request to terminate the whole run with an exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Abort {
    /// Process exit code
    pub code: i32,
    /// Already-localized reason, reported once at the top level
    pub message: String,
}

impl Abort {
    /// Abort with an arbitrary exit code.
    ///
    /// A zero or out-of-range code from a child process is mapped to
    /// [`EXIT_FAILURE`], so an abort never looks like success.
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        let code = if (1..=255).contains(&code) {
            code
        } else {
            EXIT_FAILURE
        };
        Self {
            code,
            message: message.into(),
        }
    }

    /// Generic failure, exit code 2
    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_code(EXIT_FAILURE, message)
    }

    /// Validation failure, exit code 3
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_code(EXIT_VALIDATION, message)
    }

    /// Environment failure, exit code 10
    pub fn environment(message: impl Into<String>) -> Self {
        Self::with_code(EXIT_ENVIRONMENT, message)
    }

    /// Operator interrupt, exit code 130
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::with_code(EXIT_INTERRUPTED, message)
    }

    /// Exit code narrowed for `std::process::ExitCode`
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.code).unwrap_or(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Abort::failure("x").code, 2);
        assert_eq!(Abort::validation("x").code, 3);
        assert_eq!(Abort::environment("x").code, 10);
        assert_eq!(Abort::interrupted("x").code, 130);
    }

    #[test]
    fn test_with_code_keeps_child_code() {
        let abort = Abort::with_code(100, "apt-get failed");
        assert_eq!(abort.code, 100);
        assert_eq!(abort.exit_code(), 100);
        assert_eq!(abort.to_string(), "apt-get failed");
    }

    #[test]
    fn test_with_code_never_zero() {
        assert_eq!(Abort::with_code(0, "x").code, EXIT_FAILURE);
        assert_eq!(Abort::with_code(-9, "x").code, EXIT_FAILURE);
        assert_eq!(Abort::with_code(300, "x").code, EXIT_FAILURE);
    }
}
