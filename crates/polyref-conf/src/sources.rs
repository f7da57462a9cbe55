//! Configuration sources for the layered settings system
//!
//! Each source yields a map of top-level keys to JSON values. Sources are
//! merged in priority order (environment variables > TOML > defaults).

use crate::error::{SettingsError, SettingsResult};
use crate::settings::Settings;
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Prefix of environment variables read by [`EnvSource`]
pub const ENV_PREFIX: &str = "POLYREF_";

/// Separator for nested keys in environment variable names
const NESTING_SEP: &str = "__";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> SettingsResult<IndexMap<String, Value>>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// Source holding the built-in defaults of [`Settings`]
	pub fn new() -> Self {
		let values = match serde_json::to_value(Settings::default()) {
			Ok(Value::Object(map)) => map.into_iter().collect(),
			_ => IndexMap::new(),
		};
		Self { values }
	}

	/// Source holding no values at all
	pub fn empty() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Override a top-level default
	///
	/// # Examples
	///
	/// ```
	/// use polyref_conf::{ConfigSource, DefaultSource};
	/// use serde_json::json;
	///
	/// let source = DefaultSource::empty().with_value("columns", json!({"type_suffix": "_kind"}));
	/// assert_eq!(source.load().unwrap()["columns"]["type_suffix"], "_kind");
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> SettingsResult<IndexMap<String, Value>> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0 // Lowest priority
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

fn toml_to_map(content: &str) -> SettingsResult<IndexMap<String, Value>> {
	let table: toml::Table = toml::from_str(content)?;
	let json = serde_json::to_value(table)?;
	Ok(match json {
		Value::Object(map) => map.into_iter().collect(),
		_ => IndexMap::new(),
	})
}

/// TOML file configuration source
///
/// A missing file contributes nothing.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> SettingsResult<IndexMap<String, Value>> {
		if !self.path.exists() {
			tracing::debug!(path = %self.path.display(), "settings file not found, skipping");
			return Ok(IndexMap::new());
		}
		let content = fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
			path: self.path.display().to_string(),
			source,
		})?;
		toml_to_map(&content)
	}

	fn priority(&self) -> u8 {
		50 // Medium priority
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Inline TOML configuration source
pub struct TomlSource {
	content: String,
}

impl TomlSource {
	pub fn new(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
		}
	}
}

impl ConfigSource for TomlSource {
	fn load(&self) -> SettingsResult<IndexMap<String, Value>> {
		toml_to_map(&self.content)
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		"TOML string".to_string()
	}
}

/// Environment variable configuration source
///
/// Reads variables starting with the prefix (default [`ENV_PREFIX`]).
/// The remainder is lowercased and split at `__` into nested keys.
pub struct EnvSource {
	prefix: String,
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	pub fn new() -> Self {
		Self {
			prefix: ENV_PREFIX.to_string(),
			vars: None,
		}
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Read from the given variables instead of the process environment
	///
	/// # Examples
	///
	/// ```
	/// use polyref_conf::{ConfigSource, EnvSource};
	///
	/// let source = EnvSource::new().with_vars([("POLYREF_AUTOCOMPLETE__PAGE_SIZE", "50")]);
	/// let values = source.load().unwrap();
	/// assert_eq!(values["autocomplete"]["page_size"], 50);
	/// ```
	pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.vars = Some(
			vars.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	fn variables(&self) -> Vec<(String, String)> {
		match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

/// Parse an environment value into the closest JSON shape
fn parse_env_value(key: &str, raw: &str) -> SettingsResult<Value> {
	let trimmed = raw.trim();
	if trimmed.starts_with('[') {
		return serde_json::from_str(trimmed).map_err(|e| SettingsError::Env {
			key: key.to_string(),
			message: e.to_string(),
		});
	}
	Ok(match trimmed.to_lowercase().as_str() {
		"true" => Value::Bool(true),
		"false" => Value::Bool(false),
		_ => match trimmed.parse::<i64>() {
			Ok(num) => Value::Number(num.into()),
			Err(_) => Value::String(raw.to_string()),
		},
	})
}

/// Insert `value` at the nested `path`, creating objects on the way
fn insert_nested(
	map: &mut IndexMap<String, Value>,
	key: &str,
	path: &[&str],
	value: Value,
) -> SettingsResult<()> {
	let Some((first, rest)) = path.split_first() else {
		return Ok(());
	};
	if rest.is_empty() {
		map.insert(first.to_string(), value);
		return Ok(());
	}
	let entry = map
		.entry(first.to_string())
		.or_insert_with(|| Value::Object(serde_json::Map::new()));
	let mut current = entry;
	for (i, segment) in rest.iter().enumerate() {
		let Value::Object(object) = current else {
			return Err(SettingsError::Env {
				key: key.to_string(),
				message: format!("'{}' is not a table", path[..=i].join(".")),
			});
		};
		if i + 1 == rest.len() {
			object.insert(segment.to_string(), value);
			return Ok(());
		}
		current = object
			.entry(segment.to_string())
			.or_insert_with(|| Value::Object(serde_json::Map::new()));
	}
	Ok(())
}

impl ConfigSource for EnvSource {
	fn load(&self) -> SettingsResult<IndexMap<String, Value>> {
		let mut config = IndexMap::new();
		for (key, raw) in self.variables() {
			let Some(stripped) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let lower = stripped.to_lowercase();
			let path: Vec<&str> = lower.split(NESTING_SEP).collect();
			if path.iter().any(|segment| segment.is_empty()) {
				return Err(SettingsError::Env {
					key,
					message: "empty key segment".to_string(),
				});
			}
			let value = parse_env_value(&key, &raw)?;
			insert_nested(&mut config, &key, &path, value)?;
		}
		Ok(config)
	}

	fn priority(&self) -> u8 {
		100 // Highest priority
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}
