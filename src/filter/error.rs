use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Filter must be a JSON object, got: {0}")]
    NotAnObject(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
