use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamChangeError {
    #[error("Invalid capacity: max_size must be at least 1, got {0}")]
    InvalidCapacity(usize),

    #[error("Invalid cache name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for StreamChangeError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line
        StreamChangeError::Config(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, StreamChangeError>;
