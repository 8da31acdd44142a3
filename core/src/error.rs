use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PersistError>;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode snapshot error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
