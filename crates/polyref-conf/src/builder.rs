//! Builder assembling [`Settings`] from layered sources

use crate::error::SettingsResult;
use crate::settings::Settings;
use crate::sources::{ConfigSource, DefaultSource, EnvSource, TomlFileSource, TomlSource};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;

/// Layered settings builder
///
/// Sources are merged by priority; sources of equal priority apply in the
/// order they were added, later ones winning. Tables merge key by key.
///
/// # Examples
///
/// ```
/// use polyref_conf::{EnvSource, SettingsBuilder};
///
/// let settings = SettingsBuilder::new()
///     .toml_str("[columns]\ntype_suffix = \"_kind\"")
///     .add_source(EnvSource::new().with_vars([("POLYREF_COLUMNS__ID_SUFFIX", "_pk")]))
///     .build()
///     .unwrap();
/// assert_eq!(settings.columns.type_suffix, "_kind");
/// assert_eq!(settings.columns.id_suffix, "_pk");
/// ```
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	/// Start from the built-in defaults
	pub fn new() -> Self {
		Self {
			sources: vec![Box::new(DefaultSource::new())],
		}
	}

	/// Defaults, `path` if it exists, then the process environment
	pub fn standard(path: impl Into<PathBuf>) -> Self {
		Self::new().toml_file(path).env()
	}

	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	pub fn toml_file(self, path: impl Into<PathBuf>) -> Self {
		self.add_source(TomlFileSource::new(path))
	}

	pub fn toml_str(self, content: impl Into<String>) -> Self {
		self.add_source(TomlSource::new(content))
	}

	/// Read `POLYREF_*` variables from the process environment
	pub fn env(self) -> Self {
		self.add_source(EnvSource::new())
	}

	/// Merge every source without deserializing
	pub fn merged(&self) -> SettingsResult<IndexMap<String, Value>> {
		let mut ordered: Vec<&dyn ConfigSource> = self.sources.iter().map(|s| s.as_ref()).collect();
		ordered.sort_by_key(|source| source.priority());

		let mut merged = IndexMap::new();
		for source in ordered {
			let values = source.load()?;
			tracing::debug!(
				source = %source.description(),
				keys = values.len(),
				"loaded settings source"
			);
			for (key, value) in values {
				match merged.get_mut(&key) {
					Some(existing) => merge_value(existing, value),
					None => {
						merged.insert(key, value);
					}
				}
			}
		}
		Ok(merged)
	}

	/// Merge, deserialize and validate
	pub fn build(self) -> SettingsResult<Settings> {
		let merged = self.merged()?;
		let object: serde_json::Map<String, Value> = merged.into_iter().collect();
		let settings: Settings = serde_json::from_value(Value::Object(object))?;
		settings.validate()?;
		tracing::info!(
			type_suffix = %settings.columns.type_suffix,
			id_suffix = %settings.columns.id_suffix,
			page_size = settings.autocomplete.page_size,
			"settings loaded"
		);
		Ok(settings)
	}
}

impl Default for SettingsBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Deep-merge `overlay` into `base`; non-table values replace
fn merge_value(base: &mut Value, overlay: Value) {
	match overlay {
		Value::Object(overlay) => match base {
			Value::Object(base) => {
				for (key, value) in overlay {
					match base.get_mut(&key) {
						Some(existing) => merge_value(existing, value),
						None => {
							base.insert(key, value);
						}
					}
				}
			}
			base => *base = Value::Object(overlay),
		},
		overlay => *base = overlay,
	}
}
