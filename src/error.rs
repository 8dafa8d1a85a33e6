use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowtimeError>;

#[derive(Debug, Error)]
pub enum FlowtimeError {
    #[error("Please enter a task name first!")]
    EmptyTask,
    #[error("cannot {action} while {mode}")]
    InvalidState { action: &'static str, mode: &'static str },
    #[error("asset `{0}` is not available")]
    AssetMissing(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
