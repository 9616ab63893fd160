use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnigmaError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),
}

pub type EnResult<T> = Result<T, EnigmaError>;
