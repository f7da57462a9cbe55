//! Settings structures and their validation

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Suffixes for the columns auto-created by a generic reference
///
/// A reference named `owner` gets the columns `owner<type_suffix>` and
/// `owner<id_suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
	pub type_suffix: String,
	pub id_suffix: String,
}

impl Default for ColumnSettings {
	fn default() -> Self {
		Self {
			type_suffix: "_type".to_string(),
			id_suffix: "_id".to_string(),
		}
	}
}

/// Admin form and inline behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
	/// Label content type choices `app_label | model` instead of by verbose name
	pub show_app_label: bool,
	/// Also expose references declared natively on a model
	pub include_native_references: bool,
	/// Appended to a reference name to form its form field name
	pub surrogate_suffix: String,
}

impl Default for AdminSettings {
	fn default() -> Self {
		Self {
			show_app_label: true,
			include_native_references: true,
			surrogate_suffix: "__ref".to_string(),
		}
	}
}

/// Autocomplete endpoint behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocompleteSettings {
	pub url: String,
	pub page_size: usize,
	/// Candidate fields searched and used for labels, in priority order
	#[serde(deserialize_with = "string_or_list")]
	pub search_fields: Vec<String>,
}

impl Default for AutocompleteSettings {
	fn default() -> Self {
		Self {
			url: "/admin/polyref/autocomplete/".to_string(),
			page_size: 30,
			search_fields: ["name", "title", "username", "email", "slug", "id"]
				.into_iter()
				.map(String::from)
				.collect(),
		}
	}
}

/// All polyref settings
///
/// # Examples
///
/// ```
/// use polyref_conf::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.columns.id_suffix, "_id");
/// assert_eq!(settings.admin.surrogate_suffix, "__ref");
/// assert_eq!(settings.autocomplete.page_size, 30);
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub columns: ColumnSettings,
	pub admin: AdminSettings,
	pub autocomplete: AutocompleteSettings,
}

impl Settings {
	/// Check cross-field constraints
	pub fn validate(&self) -> SettingsResult<()> {
		let columns = &self.columns;
		if columns.type_suffix.is_empty() {
			return Err(SettingsError::validation(
				"columns.type_suffix",
				"must not be empty",
			));
		}
		if columns.id_suffix.is_empty() {
			return Err(SettingsError::validation(
				"columns.id_suffix",
				"must not be empty",
			));
		}
		if columns.type_suffix == columns.id_suffix {
			return Err(SettingsError::validation(
				"columns",
				format!(
					"type_suffix and id_suffix must differ, both are '{}'",
					columns.type_suffix
				),
			));
		}
		if self.admin.surrogate_suffix.is_empty() {
			return Err(SettingsError::validation(
				"admin.surrogate_suffix",
				"must not be empty",
			));
		}
		if self.autocomplete.page_size == 0 {
			return Err(SettingsError::validation(
				"autocomplete.page_size",
				"must be at least 1",
			));
		}
		Ok(())
	}
}

/// Accept `["a", "b"]` or the comma-separated form `"a,b"`
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum StringOrList {
		String(String),
		List(Vec<String>),
	}

	Ok(match StringOrList::deserialize(deserializer)? {
		StringOrList::List(items) => items,
		StringOrList::String(joined) => joined
			.split(',')
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(String::from)
			.collect(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case::empty_type("", "_id", "columns.type_suffix")]
	#[case::empty_id("_type", "", "columns.id_suffix")]
	#[case::same("_ref", "_ref", "columns")]
	fn test_invalid_suffixes(#[case] type_suffix: &str, #[case] id_suffix: &str, #[case] key: &str) {
		let mut settings = Settings::default();
		settings.columns = ColumnSettings {
			type_suffix: type_suffix.to_string(),
			id_suffix: id_suffix.to_string(),
		};
		match settings.validate() {
			Err(SettingsError::Validation { key: found, .. }) => assert_eq!(found, key),
			other => panic!("expected a validation error, got {:?}", other),
		}
	}

	#[rstest]
	fn test_zero_page_size() {
		let mut settings = Settings::default();
		settings.autocomplete.page_size = 0;
		assert!(matches!(
			settings.validate(),
			Err(SettingsError::Validation { .. })
		));
	}

	#[rstest]
	#[case::list(r#"{"search_fields": ["title", "slug"]}"#)]
	#[case::joined(r#"{"search_fields": "title, slug"}"#)]
	fn test_search_fields_shapes(#[case] json: &str) {
		let settings: AutocompleteSettings = serde_json::from_str(json).unwrap();
		assert_eq!(settings.search_fields, vec!["title", "slug"]);
		assert_eq!(settings.page_size, 30);
	}

	#[rstest]
	fn test_partial_sections_keep_defaults() {
		let settings: Settings =
			serde_json::from_str(r#"{"admin": {"show_app_label": false}}"#).unwrap();
		assert!(!settings.admin.show_app_label);
		assert_eq!(settings.admin.surrogate_suffix, "__ref");
		assert_eq!(settings.columns, ColumnSettings::default());
	}
}
