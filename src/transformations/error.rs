//! Transformation error types.

use thiserror::Error;

use crate::db::DbError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Handler '{handler_name}' failed: {message}")]
    HandlerError {
        handler_name: String,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("RPC error: {0}")]
    RpcError(#[from] RpcError),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Channel send error: {0}")]
    ChannelError(String),
}

impl TransformationError {
    /// Create a handler error with context.
    pub fn handler(name: &str, message: impl Into<String>) -> Self {
        Self::HandlerError {
            handler_name: name.to_string(),
            message: message.into(),
        }
    }

    /// Whether redelivering the same event could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransformationError::RpcError(e) => e.is_retryable(),
            TransformationError::DatabaseError(DbError::PoolError(_))
            | TransformationError::DatabaseError(DbError::PostgresError(_)) => true,
            TransformationError::MissingData(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransformationError::from(RpcError::Transport("reset".to_string())).is_transient());
        assert!(!TransformationError::from(RpcError::reverted([0u8; 20], "getConfig")).is_transient());
        assert!(!TransformationError::DecodeError("bad name".to_string()).is_transient());
        assert!(!TransformationError::from(DbError::Overflow("total".to_string())).is_transient());
    }
}
