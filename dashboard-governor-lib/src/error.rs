use thiserror::Error;

/// Errors that can occur in the governor
#[derive(Error, Debug)]
pub enum GovernorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Memory probe error: {0}")]
    Memory(String),

    #[error("Connection pool error: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, GovernorError>;
