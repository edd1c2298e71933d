use thiserror::Error;

/// Unified error type for every fallible operation in the crate.
///
/// Tool output is never discarded: when an invocation exits non-zero the
/// combined stdout/stderr text rides along in `CommandFailed`.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("`{program}` is unavailable: {reason}")]
    ToolUnavailable { program: String, reason: String },

    #[error("failed to launch `{program}`")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` failed ({}): {output}", exit_label(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("operation cancelled before completion")]
    Cancelled,

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl BridgeError {
    pub fn unavailable(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ToolUnavailable {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => String::from("terminated by signal"),
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
