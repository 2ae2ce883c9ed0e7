use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Insufficient stock for {product_name}. Available: {available}.")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        available: i32,
        requested: i32,
    },
    /// Transient lock contention; the whole operation may be retried.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}
