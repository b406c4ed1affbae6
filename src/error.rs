use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot read statement {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl Error {
    /// Process exit status for a run that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnreadable { .. } => 2,
            Self::MalformedStatement(_) => 3,
            Self::StorageUnavailable(_) => 4,
            Self::UnknownAccount(_) | Self::Io(_) | Self::Settings(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
