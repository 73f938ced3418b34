use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// A persisted checkpoint exists but cannot be decoded.
    #[error("corrupt checkpoint for {collection}: {reason}")]
    CheckpointCorrupt { collection: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl QuarryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type QuarryResult<T> = Result<T, QuarryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = QuarryError::io(
            "data/checkpoints/HADOOP.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("data/checkpoints/HADOOP.json"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn serde_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: QuarryError = parse.into();
        assert!(matches!(err, QuarryError::Serialization(_)));
    }
}
