//! Error types for buildinfo.

use thiserror::Error;

/// buildinfo error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("build information not available: {0}")]
    NotAvailable(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("{program} exited with {}: {message}", describe_status(.code))]
    ExternalTool {
        program: String,
        code: Option<i32>,
        message: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code hint for command-line front ends.
    ///
    /// External tool failures propagate the tool's own exit status when it
    /// exited normally with a non-zero code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ExternalTool { code: Some(c), .. } if *c != 0 => *c,
            Error::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}

fn describe_status(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "signal".to_string(),
    }
}

/// Result type alias for buildinfo operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_hints() {
        let err = Error::ExternalTool {
            program: "git".into(),
            code: Some(128),
            message: "fatal: not a git repository".into(),
        };
        assert_eq!(err.exit_code(), 128);
        assert_eq!(
            err.to_string(),
            "git exited with status 128: fatal: not a git repository"
        );

        let killed = Error::ExternalTool {
            program: "git".into(),
            code: None,
            message: String::new(),
        };
        assert_eq!(killed.exit_code(), 1);
        assert!(killed.to_string().contains("signal"));

        assert_eq!(Error::InvalidArgument("x".into()).exit_code(), 2);
        assert_eq!(Error::Cancelled.exit_code(), 1);
    }
}
