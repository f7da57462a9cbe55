//! Error types for the admin integration

use http::StatusCode;
use thiserror::Error;

/// Admin integration error type
#[derive(Debug, Error)]
pub enum AdminError {
	/// Submitted data failed validation
	#[error("Validation error: {0}")]
	Validation(String),

	/// Requested content type or row does not exist
	#[error("Not found: {0}")]
	NotFound(String),

	/// Caller may not use the endpoint
	#[error("Permission denied: {0}")]
	PermissionDenied(String),

	/// Error raised by the query layers
	#[error("Database error: {0}")]
	Database(#[from] polyref_db::Error),
}

impl AdminError {
	/// HTTP status reported for this error
	pub fn status(&self) -> StatusCode {
		match self {
			AdminError::NotFound(_) => StatusCode::NOT_FOUND,
			AdminError::PermissionDenied(_) => StatusCode::FORBIDDEN,
			AdminError::Validation(_) => StatusCode::BAD_REQUEST,
			AdminError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Message safe to show to clients
	pub fn public_message(&self) -> String {
		match self {
			// Hide internal database error details from clients
			AdminError::Database(_) => "Database operation failed".to_string(),
			other => other.to_string(),
		}
	}
}

/// Result type for admin operations
pub type AdminResult<T> = Result<T, AdminError>;
