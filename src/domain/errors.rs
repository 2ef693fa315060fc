//! Error taxonomy for the RepoMesh coordination engine.
//!
//! Service methods surface exactly four kinds of first-class error
//! (`NotFound`, `Conflict`, `Unauthorized`, `Validation`), plus an internal
//! `Database` variant for persistence failures that a transport layer would
//! map to 500. Each variant carries a stable `code` string and an HTTP
//! status, so an (out-of-scope) transport layer can translate it without
//! this crate depending on any HTTP types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Stable error code, matching the taxonomy documented for the transport layer.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status a transport layer would map this error to.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Unauthorized(_) => 401,
            Self::Validation(_) => 400,
            Self::Database(_) => 500,
        }
    }

    /// Persistence errors are the only kind a background-loop supervisor
    /// should record as `last_error` without treating the loop as broken;
    /// everything else is an expected, first-class outcome of a service call.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("serialization error: {err}"))
    }
}

impl From<chrono::ParseError> for DomainError {
    fn from(err: chrono::ParseError) -> Self {
        Self::Validation(format!("invalid timestamp: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(DomainError::NotFound("x".into()).status_code(), 404);
        assert_eq!(DomainError::Conflict("x".into()).status_code(), 409);
        assert_eq!(DomainError::Unauthorized("x".into()).status_code(), 401);
        assert_eq!(DomainError::Validation("x".into()).status_code(), 400);
        assert_eq!(DomainError::Database("x".into()).status_code(), 500);
    }

    #[test]
    fn only_database_errors_are_transient() {
        assert!(DomainError::Database("x".into()).is_transient());
        assert!(!DomainError::Conflict("x".into()).is_transient());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: DomainError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
