use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid dose configuration: {0}")]
    InvalidDose(String),

    #[error("Invalid chain configuration: {0}")]
    InvalidChain(String),

    #[error("Unknown dose id: {0}")]
    UnknownDose(String),

    #[error("Input validation error: {0}")]
    Validation(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
