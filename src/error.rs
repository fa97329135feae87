//! Application error types.
//!
//! Every workflow returns `AppError`. The tagged variants are the domain
//! failures callers can act on; `Database` and `Internal` carry anything
//! the storage layer could not classify.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by workflows and storage gateways.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Referenced team, user or pull request does not exist.
    #[error("{resource} not found")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Team name is already taken.
    #[error("team already exists: {team_name}")]
    TeamExists { team_name: String },

    /// Pull request id is already taken.
    #[error("pull request with this ID already exists: {pr_id}")]
    PrExists { pr_id: String },

    /// Mutation attempted on a merged pull request.
    #[error("pull request is merged: {pr_id}")]
    PrMerged { pr_id: String },

    /// Reassignment target is not a current reviewer.
    #[error("reviewer {reviewer_id} is not assigned to pull request {pr_id}")]
    NotAssigned { pr_id: String, reviewer_id: String },

    /// No eligible replacement reviewer exists.
    #[error("no active candidate available for pull request {pr_id}")]
    NoCandidate { pr_id: String },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn team_exists(team_name: impl Into<String>) -> Self {
        Self::TeamExists {
            team_name: team_name.into(),
        }
    }

    pub fn pr_exists(pr_id: impl Into<String>) -> Self {
        Self::PrExists {
            pr_id: pr_id.into(),
        }
    }

    pub fn pr_merged(pr_id: impl Into<String>) -> Self {
        Self::PrMerged {
            pr_id: pr_id.into(),
        }
    }

    pub fn not_assigned(pr_id: impl Into<String>, reviewer_id: impl Into<String>) -> Self {
        Self::NotAssigned {
            pr_id: pr_id.into(),
            reviewer_id: reviewer_id.into(),
        }
    }

    pub fn no_candidate(pr_id: impl Into<String>) -> Self {
        Self::NoCandidate {
            pr_id: pr_id.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a database error with optional operation context.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the failing operation to an unclassified database error.
    ///
    /// Tagged domain errors pass through untouched, as does a database error
    /// that already names its operation.
    pub fn with_operation(self, operation: &str) -> Self {
        match self {
            Self::Database {
                message,
                operation: None,
            } => Self::database_with_op(message, operation),
            other => other,
        }
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TeamExists { .. } => "TEAM_EXISTS",
            Self::PrExists { .. } => "PR_EXISTS",
            Self::PrMerged { .. } => "PR_MERGED",
            Self::NotAssigned { .. } => "NOT_ASSIGNED",
            Self::NoCandidate { .. } => "NO_CANDIDATE",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::Database { .. } | Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether this is one of the tagged domain failures.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::Database { .. } | Self::Internal { .. })
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = AppError::database("connection failed");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"Database\""));
        assert!(json.contains("connection failed"));
    }

    #[test]
    fn test_not_found_with_id() {
        let err = AppError::not_found_with_id("PullRequest", "pr-1001");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"resource\":\"PullRequest\""));
        assert!(json.contains("\"id\":\"pr-1001\""));
    }

    #[test]
    fn test_optional_fields_not_serialized() {
        let err = AppError::database("error");
        let json = serde_json::to_string(&err).unwrap();
        // operation is None, so should not appear
        assert!(!json.contains("operation"));
    }

    #[test]
    fn test_with_operation_only_touches_unlabelled_database_errors() {
        let err = AppError::database("disk I/O error").with_operation("users.get_by_id");
        assert!(matches!(
            err,
            AppError::Database { operation: Some(ref op), .. } if op == "users.get_by_id"
        ));

        let err = AppError::database_with_op("locked", "teams.create").with_operation("other");
        assert!(matches!(
            err,
            AppError::Database { operation: Some(ref op), .. } if op == "teams.create"
        ));

        let err = AppError::pr_merged("pr-1").with_operation("prs.get_by_id");
        assert!(matches!(err, AppError::PrMerged { .. }));
    }

    #[test]
    fn test_codes() {
        assert_eq!(AppError::not_found("user").code(), "NOT_FOUND");
        assert_eq!(AppError::team_exists("backend").code(), "TEAM_EXISTS");
        assert_eq!(AppError::pr_exists("pr-1").code(), "PR_EXISTS");
        assert_eq!(AppError::pr_merged("pr-1").code(), "PR_MERGED");
        assert_eq!(AppError::not_assigned("pr-1", "u2").code(), "NOT_ASSIGNED");
        assert_eq!(AppError::no_candidate("pr-1").code(), "NO_CANDIDATE");
        assert_eq!(AppError::database("boom").code(), "INTERNAL_ERROR");
        assert!(!AppError::internal("boom").is_domain());
        assert!(AppError::no_candidate("pr-1").is_domain());
    }

    #[test]
    fn test_display_impl() {
        let err = AppError::not_found_with_id("author", "u9");
        assert_eq!(format!("{}", err), "author not found");
        let err = AppError::not_assigned("pr-1", "u2");
        assert_eq!(
            err.to_string(),
            "reviewer u2 is not assigned to pull request pr-1"
        );
    }
}
