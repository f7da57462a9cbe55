//! Generic reference field descriptor
//!
//! A [`GenericReferenceField`] declares a logical reference on a model. When
//! the model schema is built it either creates the `<name>_type` /
//! `<name>_id` column pair (auto mode) or validates that explicitly named
//! columns exist (custom mode), then records a [`FieldSpec`].

use super::contenttypes::LimitChoicesTo;
use super::registry::{FieldSpec, SpecSource};
use crate::error::ConfigurationError;
use crate::orm::{Column, ColumnNaming, ForeignKeyOptions, OnDelete};
use indexmap::IndexMap;
use serde::Serialize;

/// Humanize a field name: `owner_ref` becomes `Owner Ref`
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::fields::humanize;
///
/// assert_eq!(humanize("owner_ref"), "Owner Ref");
/// assert_eq!(humanize("content_OBJECT"), "Content Object");
/// ```
pub fn humanize(name: &str) -> String {
	name.split('_')
		.map(|word| {
			let mut chars = word.chars();
			match chars.next() {
				Some(first) => first
					.to_uppercase()
					.chain(chars.flat_map(char::to_lowercase))
					.collect(),
				None => String::new(),
			}
		})
		.collect::<Vec<String>>()
		.join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttachedColumns {
	type_column: String,
	id_column: String,
}

/// Logical reference descriptor
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::GenericReferenceField;
/// use polyref_db::orm::{Column, ModelSchemaBuilder};
///
/// // Custom mode: columns must already be declared.
/// let schema = ModelSchemaBuilder::new("blog", "Comment")
///     .column(Column::content_type("target_ct", Default::default()))
///     .column(Column::positive_integer("target_pk"))
///     .generic_reference(GenericReferenceField::new("target").columns("target_ct", "target_pk"))
///     .build()
///     .unwrap();
/// assert_eq!(schema.specs().get("target").unwrap().id_column, "target_pk");
/// ```
#[derive(Debug, Clone)]
pub struct GenericReferenceField {
	name: String,
	type_column: Option<String>,
	id_column: Option<String>,
	null: Option<bool>,
	blank: Option<bool>,
	limit_choices_to: Option<LimitChoicesTo>,
	related_name: Option<String>,
	on_delete: Option<OnDelete>,
	label: Option<String>,
	attached: Option<AttachedColumns>,
}

impl GenericReferenceField {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			type_column: None,
			id_column: None,
			null: None,
			blank: None,
			limit_choices_to: None,
			related_name: None,
			on_delete: None,
			label: None,
			attached: None,
		}
	}

	/// Use existing columns instead of auto-created ones
	pub fn columns(mut self, type_column: impl Into<String>, id_column: impl Into<String>) -> Self {
		self.type_column = Some(type_column.into());
		self.id_column = Some(id_column.into());
		self
	}

	pub fn type_column(mut self, type_column: impl Into<String>) -> Self {
		self.type_column = Some(type_column.into());
		self
	}

	pub fn id_column(mut self, id_column: impl Into<String>) -> Self {
		self.id_column = Some(id_column.into());
		self
	}

	pub fn null(mut self, null: bool) -> Self {
		self.null = Some(null);
		self
	}

	pub fn blank(mut self, blank: bool) -> Self {
		self.blank = Some(blank);
		self
	}

	pub fn limit_choices_to(mut self, limit: impl Into<LimitChoicesTo>) -> Self {
		self.limit_choices_to = Some(limit.into());
		self
	}

	pub fn related_name(mut self, related_name: impl Into<String>) -> Self {
		self.related_name = Some(related_name.into());
		self
	}

	pub fn on_delete(mut self, on_delete: OnDelete) -> Self {
		self.on_delete = Some(on_delete);
		self
	}

	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn is_null(&self) -> bool {
		self.null.unwrap_or(false)
	}

	pub fn is_blank(&self) -> bool {
		self.blank.unwrap_or(false)
	}

	/// Whether explicit columns were given
	pub fn is_custom(&self) -> bool {
		self.type_column.is_some() || self.id_column.is_some()
	}

	/// Column names once attached to a schema
	pub fn attached_columns(&self) -> Option<(&str, &str)> {
		self.attached
			.as_ref()
			.map(|a| (a.type_column.as_str(), a.id_column.as_str()))
	}

	/// Check option combinations without touching any schema
	pub fn validate(&self) -> Result<(), ConfigurationError> {
		match (&self.type_column, &self.id_column) {
			(Some(_), None) | (None, Some(_)) => Err(ConfigurationError::IncompleteColumnPair {
				field: self.name.clone(),
			}),
			(Some(_), Some(_)) => {
				let forbidden: Vec<&'static str> = [
					("limit_choices_to", self.limit_choices_to.is_some()),
					("related_name", self.related_name.is_some()),
					("on_delete", self.on_delete.is_some()),
					("null", self.null.is_some()),
					("blank", self.blank.is_some()),
				]
				.into_iter()
				.filter_map(|(option, set)| set.then_some(option))
				.collect();
				if forbidden.is_empty() {
					Ok(())
				} else {
					Err(ConfigurationError::ForbiddenOptions {
						field: self.name.clone(),
						options: forbidden,
					})
				}
			}
			(None, None) => Ok(()),
		}
	}

	/// Attach to a schema under construction
	///
	/// Auto mode inserts any missing column of the pair; custom mode requires
	/// both columns to be present. Returns the field spec to register.
	pub(crate) fn contribute_to_schema(
		&mut self,
		model: &str,
		columns: &mut IndexMap<String, Column>,
		naming: &ColumnNaming,
	) -> Result<FieldSpec, ConfigurationError> {
		self.validate()?;

		let (type_column, id_column) = match (&self.type_column, &self.id_column) {
			(Some(type_column), Some(id_column)) => {
				let missing: Vec<String> = [type_column, id_column]
					.into_iter()
					.filter(|name| !columns.contains_key(name.as_str()))
					.cloned()
					.collect();
				if !missing.is_empty() {
					return Err(ConfigurationError::MissingColumns {
						model: model.to_string(),
						field: self.name.clone(),
						missing,
					});
				}
				(type_column.clone(), id_column.clone())
			}
			_ => {
				let type_column = naming.type_column(&self.name);
				let id_column = naming.id_column(&self.name);
				if !columns.contains_key(&type_column) {
					let options = ForeignKeyOptions {
						on_delete: self.on_delete.unwrap_or_default(),
						related_name: self.related_name.clone(),
						limit_choices_to: self.limit_choices_to.clone(),
					};
					let column = Column::content_type(&type_column, options)
						.null(self.is_null())
						.blank(self.is_blank());
					columns.insert(type_column.clone(), column);
				}
				if !columns.contains_key(&id_column) {
					let column = Column::positive_integer(&id_column)
						.null(self.is_null())
						.blank(self.is_blank())
						.db_index(true);
					columns.insert(id_column.clone(), column);
				}
				(type_column, id_column)
			}
		};

		let limit_choices_to = self.limit_choices_to.clone().or_else(|| {
			columns
				.get(&type_column)
				.and_then(|c| c.limit_choices_to().cloned())
		});

		tracing::debug!(
			model,
			field = %self.name,
			type_column = %type_column,
			id_column = %id_column,
			"attached generic reference"
		);

		self.attached = Some(AttachedColumns {
			type_column: type_column.clone(),
			id_column: id_column.clone(),
		});

		Ok(FieldSpec {
			name: self.name.clone(),
			label: self
				.label
				.clone()
				.unwrap_or_else(|| humanize(&self.name)),
			type_column,
			id_column,
			limit_choices_to,
			source: SpecSource::Declared,
		})
	}

	/// Non-default options, for schema serialization
	///
	/// Column names are reported only when they differ from names derived
	/// from the field name.
	pub fn deconstruct(&self) -> FieldDeconstruction {
		let mut options = IndexMap::new();
		let (type_column, id_column) = match &self.attached {
			Some(attached) => (
				Some(attached.type_column.clone()),
				Some(attached.id_column.clone()),
			),
			None => (self.type_column.clone(), self.id_column.clone()),
		};
		let explicit = |column: Option<String>| -> serde_json::Value {
			match column {
				Some(name) if !name.starts_with(&self.name) => serde_json::Value::String(name),
				_ => serde_json::Value::Null,
			}
		};
		options.insert("type_column".to_string(), explicit(type_column));
		options.insert("id_column".to_string(), explicit(id_column));
		options.insert("null".to_string(), self.is_null().into());
		options.insert("blank".to_string(), self.is_blank().into());
		if let Some(limit) = &self.limit_choices_to {
			options.insert("limit_choices_to".to_string(), describe_limit(limit));
		}
		if let Some(related_name) = &self.related_name {
			options.insert("related_name".to_string(), related_name.clone().into());
		}
		if let Some(on_delete) = self.on_delete {
			options.insert("on_delete".to_string(), on_delete.to_string().into());
		}
		if let Some(label) = &self.label {
			options.insert("label".to_string(), label.clone().into());
		}
		FieldDeconstruction {
			name: self.name.clone(),
			path: "polyref_db::contenttypes::GenericReferenceField".to_string(),
			options,
		}
	}
}

fn describe_limit(limit: &LimitChoicesTo) -> serde_json::Value {
	match limit {
		LimitChoicesTo::Lookups(kwargs) => {
			serde_json::to_value(kwargs).unwrap_or(serde_json::Value::Null)
		}
		LimitChoicesTo::Condition(q) => serde_json::Value::String(q.to_string()),
		LimitChoicesTo::Callable(_) => serde_json::Value::String("<callable>".to_string()),
		LimitChoicesTo::All(items) => {
			serde_json::Value::Array(items.iter().map(describe_limit).collect())
		}
	}
}

/// Serializable description of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDeconstruction {
	pub name: String,
	pub path: String,
	pub options: IndexMap<String, serde_json::Value>,
}
