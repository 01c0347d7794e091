use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Fallback response rejected: {0}")]
    FallbackRejected(String),
}

pub type Result<T> = std::result::Result<T, PlanError>;
