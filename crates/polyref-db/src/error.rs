//! Error types for the database layer

use thiserror::Error;

/// Raised while a model schema is being constructed.
///
/// Configuration errors are fatal: they surface from
/// [`ModelSchemaBuilder::build`](crate::orm::ModelSchemaBuilder::build) and
/// mean the model definition itself is wrong.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
	/// Only one of the two explicit column names was supplied
	#[error(
		"generic reference '{field}' must declare both type_column and id_column, or neither"
	)]
	IncompleteColumnPair { field: String },

	/// Auto-mode options were combined with explicit columns
	#[error(
		"generic reference '{field}' declares explicit columns; {options:?} must be set on those columns instead"
	)]
	ForbiddenOptions {
		field: String,
		options: Vec<&'static str>,
	},

	/// Explicit columns are not defined on the model
	#[error("generic reference '{field}' on '{model}' refers to missing column(s): {missing:?}")]
	MissingColumns {
		model: String,
		field: String,
		missing: Vec<String>,
	},

	/// A name is declared twice on the same model
	#[error("field '{field}' is declared more than once on '{model}'")]
	DuplicateField { model: String, field: String },

	/// Inheritance configuration is inconsistent
	#[error("invalid polymorphic configuration: {0}")]
	Polymorphic(String),
}

/// Database layer error type
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),

	/// A value has a shape that cannot be used where it was supplied
	#[error("value error: {0}")]
	Value(String),

	/// A referenced content type does not exist in the catalog
	#[error("not found: {0}")]
	NotFound(String),

	/// The lookup is not supported for generic reference fields
	#[error(
		"lookup '{lookup}' is not supported for generic reference '{field}'; supported: exact, in, isnull"
	)]
	NotImplemented { lookup: String, field: String },

	/// A keyword cannot be resolved into a column or lookup
	#[error("field error: {0}")]
	Field(String),

	/// `get` matched no row
	#[error("{model} matching query does not exist")]
	DoesNotExist { model: String },

	/// `get` matched more than one row
	#[error("get() returned more than one {model} -- it returned {count}")]
	MultipleObjectsReturned { model: String, count: usize },
}

impl Error {
	pub(crate) fn value(message: impl Into<String>) -> Self {
		Self::Value(message.into())
	}

	pub(crate) fn field(message: impl Into<String>) -> Self {
		Self::Field(message.into())
	}
}

/// Result type for database layer operations
pub type Result<T> = std::result::Result<T, Error>;
