use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::sequence::SequenceError;

/// Failure categories every engine operation reports to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// A compare-and-set found the counter already moved by another writer.
    /// Reported as `Conflict`; the only conflict a fresh retry can resolve.
    #[error("{0}")]
    StaleCounter(String),
    #[error("{0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) | ServiceError::StaleCounter(_) => ErrorKind::Conflict,
            ServiceError::Internal(_) | ServiceError::Database(_) => ErrorKind::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_stale_counter(&self) -> bool {
        matches!(self, ServiceError::StaleCounter(_))
    }
}

impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::Conflict(format!("Duplicate key: {detail}"))
            }
            _ => ServiceError::Database(err),
        }
    }
}

impl From<SequenceError> for ServiceError {
    fn from(err: SequenceError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}
