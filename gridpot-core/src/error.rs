use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool not found: {0}")]
    PoolNotFound(Uuid),

    #[error("Pool is not open (status: {status})")]
    PoolNotOpen { status: String },

    #[error("Pool is locked")]
    PoolLocked,

    #[error("Pool is already locked")]
    AlreadyLocked,

    #[error("Grid is not locked yet")]
    GridNotLocked,

    #[error("Square ({row},{col}) is not available")]
    SquareUnavailable { row: u8, col: u8 },

    #[error("Square ({row},{col}) has no owner")]
    SquareNotOwned { row: u8, col: u8 },

    #[error("Square ({row},{col}) not found")]
    SquareNotFound { row: u8, col: u8 },

    #[error("Player already holds the maximum of {limit} squares")]
    CapacityExceeded { limit: u32 },

    // Broken permutation invariant. Not retryable; alert and investigate.
    #[error("Digit {digit} missing from locked {axis} digits")]
    InvalidDigitMapping { axis: &'static str, digit: u8 },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PoolError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
