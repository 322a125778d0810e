use author_core::{CommandError, ProjectError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from saving or loading a project directory.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on '{}': {source}", path.display())]
    /// Reading or writing a file failed.
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", path.display())]
    /// A file is not valid JSON for its format.
    Json {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    #[error(transparent)]
    /// The project could not be built (unknown plugin or block type, bad settings).
    Project(#[from] ProjectError),

    #[error(transparent)]
    /// The loaded blocks could not be installed.
    Command(#[from] CommandError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_file() {
        let err = PersistenceError::Io {
            path: PathBuf::from("project/content.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "I/O error on 'project/content.json': gone");

        let source = serde_json::from_str::<u32>("{").unwrap_err();
        let expected = format!("invalid JSON in 'metadata.json': {source}");
        let err = PersistenceError::Json {
            path: PathBuf::from("metadata.json"),
            source,
        };
        assert_eq!(err.to_string(), expected);

        let err = PersistenceError::from(CommandError::LastBlock);
        assert_eq!(err.to_string(), CommandError::LastBlock.to_string());
    }
}
