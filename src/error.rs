//! # Error Handling
//!
//! Structured error taxonomy for the NeuroLint core. Every fallible operation in this
//! crate returns `error::Result<T>`; errors carry enough structured context to drive
//! the CLI's per-severity run summary without needing to re-parse a message string.
//!
//! @category error-handling
//! @safe program
//! @mvp core
//! @complexity high
//! @since 0.1.0

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the NeuroLint core.
///
/// Variants correspond to the error taxonomy in the specification: `Parse`,
/// `TransformRejected`, `Io`, `Integrity`, `Config`, and `Bounded`, plus
/// `Serialization` and `Encryption` for the ambient serde/crypto stack.
#[derive(Error, Debug)]
pub enum Error {
    /// Source did not parse. Local to one (file, stage); the orchestrator treats this
    /// as a stage failure, not a run failure.
    #[error("{file}:{line}:{column}: parse error: {message}")]
    Parse {
        file: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },

    /// The Validator rejected both the AST output and the regex fallback output.
    #[error("{file}: layer {layer_id} rejected: {reason}")]
    TransformRejected {
        file: PathBuf,
        layer_id: u32,
        reason: String,
    },

    /// Read/write failure. The current file is marked failed; the run continues.
    #[error("I/O error on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backup authentication-tag mismatch on restore, or any other tamper detection.
    /// Restore aborts with no writes.
    #[error("integrity check failed: {message}")]
    Integrity { message: String },

    /// Invalid user selection (unknown layer, unknown flag). Pre-flight failure.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
    },

    /// A signature or regex exceeded its time or length cap; degraded to a diagnostic
    /// finding rather than aborting the scan.
    #[error("bounded execution limit reached: {message}")]
    Bounded { message: String },

    /// JSON/YAML/TOML (de)serialization failure for persisted state.
    #[error("serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Key derivation or AEAD encrypt/decrypt failure in the Backup Manager.
    #[error("encryption error: {message}")]
    Encryption { message: String },
}

impl Error {
    #[must_use]
    pub fn parse(file: impl Into<PathBuf>, line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transform_rejected(file: impl Into<PathBuf>, layer_id: u32, reason: impl Into<String>) -> Self {
        Self::TransformRejected {
            file: file.into(),
            layer_id,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    #[must_use]
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity { message: message.into() }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    #[must_use]
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    #[must_use]
    pub fn bounded(message: impl Into<String>) -> Self {
        Self::Bounded { message: message.into() }
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// True for stage-local errors the orchestrator recovers from by reverting to the
    /// prior accepted source; false for errors that must abort the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Parse { .. } => true,
            Self::TransformRejected { .. } => true,
            Self::Io { .. } => true,
            Self::Integrity { .. } => false,
            Self::Config { .. } => false,
            Self::Bounded { .. } => true,
            Self::Serialization { .. } => false,
            Self::Encryption { .. } => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Parse { .. } => ErrorSeverity::Warning,
            Self::TransformRejected { .. } => ErrorSeverity::Warning,
            Self::Io { .. } => ErrorSeverity::Error,
            Self::Integrity { .. } => ErrorSeverity::Critical,
            Self::Config { .. } => ErrorSeverity::Error,
            Self::Bounded { .. } => ErrorSeverity::Info,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Encryption { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::TransformRejected { .. } => "transform_rejected",
            Self::Io { .. } => "io",
            Self::Integrity { .. } => "integrity",
            Self::Config { .. } => "config",
            Self::Bounded { .. } => "bounded",
            Self::Serialization { .. } => "serialization",
            Self::Encryption { .. } => "encryption",
        }
    }

    /// Actionable, non-technical message routed to stderr alongside the severity tag.
    pub fn user_message(&self) -> String {
        match self {
            Self::Parse { file, line, column, message } => {
                format!("{} did not parse at {}:{}: {}", file.display(), line, column, message)
            }
            Self::TransformRejected { file, layer_id, reason } => {
                format!("layer {} left {} unchanged: {}", layer_id, file.display(), reason)
            }
            Self::Io { path, .. } => format!("could not read or write '{}': check file permissions", path.display()),
            Self::Integrity { message } => format!("backup integrity check failed: {}. No files were restored.", message),
            Self::Config { message, field } => match field {
                Some(field) => format!("configuration error in '{}': {}", field, message),
                None => format!("configuration error: {}", message),
            },
            Self::Bounded { message } => format!("scan limit reached: {}; result degraded to a diagnostic", message),
            Self::Serialization { message, .. } => format!("could not read persisted state: {}", message),
            Self::Encryption { message } => format!("encryption error: {}", message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialization {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(source: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Self::Serialization {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias for NeuroLint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error severity levels, used for logging and the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_not_recoverable() {
        let err = Error::config("unknown layer 'nope'");
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn transform_rejected_is_recoverable() {
        let err = Error::transform_rejected("src/App.tsx", 3, "unbalanced braces");
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn integrity_error_is_critical_and_unrecoverable() {
        let err = Error::integrity("auth tag mismatch");
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
