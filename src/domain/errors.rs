use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Product {0} not found")]
    ProductNotFound(Uuid),
    #[error("Order not found")]
    OrderNotFound,
    #[error("'{name}' is currently unavailable")]
    ProductUnavailable { name: String },
    #[error("Not enough stock for '{name}'. Available: {available}, requested: {requested}")]
    InsufficientStock {
        name: String,
        requested: i32,
        available: i32,
    },
    #[error("Order does not belong to the requesting user")]
    Forbidden,
    #[error("{0}")]
    InvalidState(String),
    #[error("Transient storage failure: {0}")]
    Transient(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
#[error("confirmation dispatch failed: {0}")]
pub struct NotifyError(pub String);
