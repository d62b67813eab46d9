use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiskError {
    #[error("Disk is full: no free blocks available")]
    DiskFull,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid selection: {index} (catalog holds {file_count} files)")]
    InvalidSelection { index: usize, file_count: usize },

    #[error("Cannot create a file with zero blocks")]
    EmptyFile,

    #[error("Corrupt chain for file '{file}': walk visited {visited} blocks without terminating")]
    CorruptChain { file: String, visited: usize },

    #[error("Arena inconsistency: {0}")]
    Inconsistency(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DiskError>;
