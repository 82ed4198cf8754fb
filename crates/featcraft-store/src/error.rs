use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("corrupt artifact: {0}")]
    Corrupt(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("csv error: {0}")]
    Csv(String),
}

impl From<featcraft_core::Error> for StoreError {
    fn from(e: featcraft_core::Error) -> Self {
        StoreError::Csv(e.to_string())
    }
}
