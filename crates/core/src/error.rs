use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid refresh policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("Failed to build check pool: {message}")]
    Pool { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
