//! Settings errors

/// Error raised while loading or validating settings
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	#[error("IO error reading {path}: {source}")]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error("Invalid environment variable '{key}': {message}")]
	Env { key: String, message: String },

	#[error("Cannot deserialize settings: {0}")]
	Deserialize(#[from] serde_json::Error),

	#[error("Invalid value for '{key}': {message}")]
	Validation { key: String, message: String },
}

impl SettingsError {
	pub(crate) fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Validation {
			key: key.into(),
			message: message.into(),
		}
	}
}

/// Result type for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;
