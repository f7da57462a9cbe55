//! Model schemas: columns, reference specs and their construction
//!
//! A [`ModelSchema`] is built once by a [`ModelSchemaBuilder`] and is
//! immutable afterwards. Building runs every attached generic reference
//! descriptor, which adds (or validates) the physical column pair and records
//! a field spec under the logical name.

use super::filter::LookupResolver;
use super::query::{Filter, FilterOperator, split_lookup};
use crate::contenttypes::fields::GenericReferenceField;
use crate::contenttypes::registry::{FieldSpec, FieldSpecs, SpecSource};
use crate::contenttypes::LimitChoicesTo;
use crate::error::{ConfigurationError, Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use polyref_conf::ColumnSettings;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column holding the concrete content type of a polymorphic row
pub const POLYMORPHIC_CTYPE_COLUMN: &str = "polymorphic_ctype";

/// Deletion policy of a foreign key column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnDelete {
	#[default]
	Cascade,
	Protect,
	SetNull,
	SetDefault,
	DoNothing,
}

impl fmt::Display for OnDelete {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			OnDelete::Cascade => "CASCADE",
			OnDelete::Protect => "PROTECT",
			OnDelete::SetNull => "SET_NULL",
			OnDelete::SetDefault => "SET_DEFAULT",
			OnDelete::DoNothing => "DO_NOTHING",
		};
		f.write_str(name)
	}
}

/// Options of a foreign key to the content type catalog
#[derive(Debug, Clone, Default)]
pub struct ForeignKeyOptions {
	pub on_delete: OnDelete,
	pub related_name: Option<String>,
	pub limit_choices_to: Option<LimitChoicesTo>,
}

/// Storage kind of a column
#[derive(Debug, Clone)]
pub enum ColumnKind {
	/// Auto-incrementing primary key
	AutoId,
	Integer,
	/// Integer that must be zero or greater
	PositiveInteger,
	Text { max_length: Option<usize> },
	Boolean,
	Float,
	/// Foreign key to the content type catalog, stored as the type's id
	ContentTypeForeignKey(ForeignKeyOptions),
}

/// A physical column of a model
#[derive(Debug, Clone)]
pub struct Column {
	pub name: String,
	pub kind: ColumnKind,
	pub null: bool,
	pub blank: bool,
	pub db_index: bool,
	pub editable: bool,
	pub default: Option<Value>,
	pub verbose_name: Option<String>,
}

impl Column {
	pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
		Self {
			name: name.into(),
			kind,
			null: false,
			blank: false,
			db_index: false,
			editable: true,
			default: None,
			verbose_name: None,
		}
	}

	pub fn auto(name: impl Into<String>) -> Self {
		let mut column = Self::new(name, ColumnKind::AutoId);
		column.editable = false;
		column.blank = true;
		column
	}

	pub fn integer(name: impl Into<String>) -> Self {
		Self::new(name, ColumnKind::Integer)
	}

	pub fn positive_integer(name: impl Into<String>) -> Self {
		Self::new(name, ColumnKind::PositiveInteger)
	}

	pub fn text(name: impl Into<String>) -> Self {
		Self::new(name, ColumnKind::Text { max_length: None })
	}

	pub fn boolean(name: impl Into<String>) -> Self {
		Self::new(name, ColumnKind::Boolean)
	}

	pub fn float(name: impl Into<String>) -> Self {
		Self::new(name, ColumnKind::Float)
	}

	pub fn content_type(name: impl Into<String>, options: ForeignKeyOptions) -> Self {
		Self::new(name, ColumnKind::ContentTypeForeignKey(options))
	}

	pub fn null(mut self, null: bool) -> Self {
		self.null = null;
		self
	}

	pub fn blank(mut self, blank: bool) -> Self {
		self.blank = blank;
		self
	}

	pub fn db_index(mut self, db_index: bool) -> Self {
		self.db_index = db_index;
		self
	}

	pub fn editable(mut self, editable: bool) -> Self {
		self.editable = editable;
		self
	}

	pub fn max_length(mut self, max_length: usize) -> Self {
		if let ColumnKind::Text { max_length: slot } = &mut self.kind {
			*slot = Some(max_length);
		}
		self
	}

	pub fn default_value(mut self, default: impl Into<Value>) -> Self {
		self.default = Some(default.into());
		self
	}

	pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
		self.verbose_name = Some(verbose_name.into());
		self
	}

	pub fn is_content_type(&self) -> bool {
		matches!(self.kind, ColumnKind::ContentTypeForeignKey(_))
	}

	/// Catalog restriction declared on a content type column
	pub fn limit_choices_to(&self) -> Option<&LimitChoicesTo> {
		match &self.kind {
			ColumnKind::ContentTypeForeignKey(options) => options.limit_choices_to.as_ref(),
			_ => None,
		}
	}

	/// Value stored when a write does not mention the column
	pub fn initial_value(&self) -> Value {
		match (&self.default, &self.kind) {
			(Some(default), _) => default.clone(),
			(None, ColumnKind::Text { .. }) if !self.null => Value::String(String::new()),
			_ => Value::Null,
		}
	}

	/// Coerce a value to the column's storage shape
	///
	/// Content types and row instances collapse to their ids; digit strings
	/// are accepted for integer columns.
	pub fn coerce(&self, value: &Value) -> Result<Value> {
		if value.is_null() {
			return Ok(Value::Null);
		}
		let coerced = match (&self.kind, value) {
			(ColumnKind::ContentTypeForeignKey(_), Value::ContentType(ct)) => match ct.id {
				Some(id) => Value::Int(id),
				None => {
					return Err(Error::value(format!(
						"content type '{}' assigned to '{}' has not been saved",
						ct.qualified_name(),
						self.name
					)));
				}
			},
			(
				ColumnKind::AutoId
				| ColumnKind::Integer
				| ColumnKind::PositiveInteger
				| ColumnKind::ContentTypeForeignKey(_),
				other,
			) => match other {
				Value::Instance(instance) if !self.is_content_type() => match instance.pk {
					Some(pk) => Value::Int(pk),
					None => return Err(self.mismatch(value)),
				},
				other => other
					.as_int()
					.map(Value::Int)
					.ok_or_else(|| self.mismatch(value))?,
			},
			(ColumnKind::Float, Value::Int(i)) => Value::Float(*i as f64),
			(ColumnKind::Float, Value::Float(f)) => Value::Float(*f),
			(ColumnKind::Text { .. }, Value::String(s)) => Value::String(s.clone()),
			(ColumnKind::Text { .. }, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
				Value::String(value.to_string())
			}
			(ColumnKind::Boolean, Value::Bool(b)) => Value::Bool(*b),
			(ColumnKind::Boolean, Value::Int(i)) if *i == 0 || *i == 1 => Value::Bool(*i == 1),
			_ => return Err(self.mismatch(value)),
		};
		Ok(coerced)
	}

	/// Coerce and validate a value about to be stored
	pub fn clean(&self, value: &Value) -> Result<Value> {
		let value = self.coerce(value)?;
		match (&self.kind, &value) {
			(ColumnKind::AutoId, _) => {}
			(_, Value::Null) if !self.null => {
				return Err(Error::value(format!(
					"null value in column '{}' violates not-null constraint",
					self.name
				)));
			}
			(ColumnKind::PositiveInteger, Value::Int(i)) if *i < 0 => {
				return Err(Error::value(format!(
					"column '{}' only accepts non-negative integers, got {}",
					self.name, i
				)));
			}
			(ColumnKind::Text { max_length: Some(max) }, Value::String(s))
				if s.chars().count() > *max =>
			{
				return Err(Error::value(format!(
					"value for '{}' exceeds {} characters",
					self.name, max
				)));
			}
			_ => {}
		}
		Ok(value)
	}

	fn mismatch(&self, value: &Value) -> Error {
		Error::value(format!(
			"column '{}' cannot store a {} value ({})",
			self.name,
			value.kind(),
			value
		))
	}
}

/// Suffixes used for auto-created reference columns
///
/// # Examples
///
/// ```
/// use polyref_db::orm::ColumnNaming;
///
/// let naming = ColumnNaming::default();
/// assert_eq!(naming.type_column("owner"), "owner_type");
/// assert_eq!(naming.id_column("owner"), "owner_id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNaming {
	pub type_suffix: String,
	pub id_suffix: String,
}

impl Default for ColumnNaming {
	fn default() -> Self {
		Self::from_settings(&ColumnSettings::default())
	}
}

impl ColumnNaming {
	pub fn new(type_suffix: impl Into<String>, id_suffix: impl Into<String>) -> Self {
		Self {
			type_suffix: type_suffix.into(),
			id_suffix: id_suffix.into(),
		}
	}

	pub fn from_settings(settings: &ColumnSettings) -> Self {
		Self::new(&settings.type_suffix, &settings.id_suffix)
	}

	pub fn type_column(&self, field: &str) -> String {
		format!("{}{}", field, self.type_suffix)
	}

	pub fn id_column(&self, field: &str) -> String {
		format!("{}{}", field, self.id_suffix)
	}
}

/// A reference declared natively on the model: the columns already exist
/// and are only mapped, never created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeReference {
	pub name: String,
	pub type_column: String,
	pub id_column: String,
}

/// Immutable description of a model
#[derive(Debug, Clone)]
pub struct ModelSchema {
	app_label: String,
	object_name: String,
	model_name: String,
	table_name: String,
	pk_field: String,
	columns: IndexMap<String, Column>,
	generic_references: IndexMap<String, GenericReferenceField>,
	specs: FieldSpecs,
	ordering: Vec<String>,
	verbose_name: String,
	polymorphic: bool,
}

impl ModelSchema {
	pub fn builder(app_label: impl Into<String>, object_name: impl Into<String>) -> ModelSchemaBuilder {
		ModelSchemaBuilder::new(app_label, object_name)
	}

	pub fn app_label(&self) -> &str {
		&self.app_label
	}

	/// Model name as declared (`Credential`)
	pub fn object_name(&self) -> &str {
		&self.object_name
	}

	/// Lowercased model name, the catalog's `model` (`credential`)
	pub fn model_name(&self) -> &str {
		&self.model_name
	}

	/// `app_label.model_name`
	pub fn label(&self) -> String {
		format!("{}.{}", self.app_label, self.model_name)
	}

	pub fn table_name(&self) -> &str {
		&self.table_name
	}

	pub fn pk_field(&self) -> &str {
		&self.pk_field
	}

	pub fn verbose_name(&self) -> &str {
		&self.verbose_name
	}

	pub fn ordering(&self) -> &[String] {
		&self.ordering
	}

	pub fn is_polymorphic(&self) -> bool {
		self.polymorphic
	}

	pub fn columns(&self) -> impl Iterator<Item = &Column> {
		self.columns.values()
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.get(name)
	}

	pub fn has_column(&self, name: &str) -> bool {
		self.columns.contains_key(name)
	}

	/// Resolve `pk` to the primary key column
	pub fn column_for(&self, field: &str) -> Option<&Column> {
		if field == "pk" {
			return self.columns.get(&self.pk_field);
		}
		self.columns.get(field)
	}

	/// Field specs of every generic reference on the model
	pub fn specs(&self) -> &FieldSpecs {
		&self.specs
	}

	/// Descriptors attached during construction
	pub fn generic_references(&self) -> impl Iterator<Item = &GenericReferenceField> {
		self.generic_references.values()
	}

	pub fn generic_reference(&self, name: &str) -> Option<&GenericReferenceField> {
		self.generic_references.get(name)
	}

	pub(crate) fn field_choices(&self) -> String {
		let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
		names.push("pk");
		names.sort_unstable();
		names.join(", ")
	}

	pub(crate) fn unknown_field(&self, field: &str) -> Error {
		Error::field(format!(
			"Cannot resolve keyword '{}' into field. Choices are: {}",
			field,
			self.field_choices()
		))
	}
}

impl LookupResolver for ModelSchema {
	fn resolve_lookup(&self, key: &str, value: &Value) -> Result<Filter> {
		let (field, lookup) = split_lookup(key);
		let column = self.column_for(field).ok_or_else(|| self.unknown_field(field))?;
		let operator = FilterOperator::from_lookup(lookup).ok_or_else(|| {
			Error::field(format!(
				"Unsupported lookup '{}' for field '{}'. Supported: {}",
				lookup,
				field,
				FilterOperator::LOOKUPS.join(", ")
			))
		})?;

		let value = match operator {
			FilterOperator::IsNull => Value::Bool(value.is_truthy()),
			FilterOperator::In => match value {
				Value::List(items) | Value::Tuple(items) => Value::List(
					items
						.iter()
						.map(|item| column.coerce(item))
						.collect::<Result<Vec<_>>>()?,
				),
				other => {
					return Err(Error::value(format!(
						"'in' lookup on '{}' expects an iterable, got {}",
						field,
						other.kind()
					)));
				}
			},
			FilterOperator::IExact
			| FilterOperator::Contains
			| FilterOperator::IContains
			| FilterOperator::StartsWith
			| FilterOperator::IStartsWith
			| FilterOperator::EndsWith => match value {
				Value::String(_) => value.clone(),
				other => Value::String(other.to_string()),
			},
			FilterOperator::Eq
			| FilterOperator::Gt
			| FilterOperator::Gte
			| FilterOperator::Lt
			| FilterOperator::Lte => column.coerce(value)?,
		};

		Ok(Filter::new(column.name.clone(), operator, value))
	}
}

/// Builder performing the one-time registration step of a model
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::{GenericReferenceField, LimitChoicesTo};
/// use polyref_db::orm::{Column, ModelSchemaBuilder};
///
/// let schema = ModelSchemaBuilder::new("vault", "Credential")
///     .column(Column::text("label"))
///     .generic_reference(
///         GenericReferenceField::new("owner")
///             .limit_choices_to(LimitChoicesTo::models(&["auth.user"])),
///     )
///     .build()
///     .unwrap();
///
/// assert!(schema.has_column("owner_type"));
/// assert!(schema.has_column("owner_id"));
/// assert_eq!(schema.specs().get("owner").unwrap().label, "Owner");
/// ```
#[derive(Debug, Clone)]
pub struct ModelSchemaBuilder {
	app_label: String,
	object_name: String,
	table_name: Option<String>,
	pk_field: String,
	columns: Vec<Column>,
	generic_references: Vec<GenericReferenceField>,
	native_references: Vec<NativeReference>,
	ordering: Vec<String>,
	verbose_name: Option<String>,
	polymorphic: bool,
	naming: ColumnNaming,
}

impl ModelSchemaBuilder {
	pub fn new(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
		Self {
			app_label: app_label.into(),
			object_name: object_name.into(),
			table_name: None,
			pk_field: "id".to_string(),
			columns: Vec::new(),
			generic_references: Vec::new(),
			native_references: Vec::new(),
			ordering: Vec::new(),
			verbose_name: None,
			polymorphic: false,
			naming: ColumnNaming::default(),
		}
	}

	pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
		self.table_name = Some(table_name.into());
		self
	}

	pub fn pk_field(mut self, pk_field: impl Into<String>) -> Self {
		self.pk_field = pk_field.into();
		self
	}

	pub fn column(mut self, column: Column) -> Self {
		self.columns.push(column);
		self
	}

	pub fn generic_reference(mut self, field: GenericReferenceField) -> Self {
		self.generic_references.push(field);
		self
	}

	pub fn native_reference(
		mut self,
		name: impl Into<String>,
		type_column: impl Into<String>,
		id_column: impl Into<String>,
	) -> Self {
		self.native_references.push(NativeReference {
			name: name.into(),
			type_column: type_column.into(),
			id_column: id_column.into(),
		});
		self
	}

	/// Default ordering; a leading `-` sorts descending
	pub fn ordering(mut self, ordering: &[&str]) -> Self {
		self.ordering = ordering.iter().map(|s| s.to_string()).collect();
		self
	}

	pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
		self.verbose_name = Some(verbose_name.into());
		self
	}

	/// Mark the model as the root of a single-table inheritance hierarchy
	pub fn polymorphic(mut self) -> Self {
		self.polymorphic = true;
		self
	}

	pub fn column_naming(mut self, naming: ColumnNaming) -> Self {
		self.naming = naming;
		self
	}

	pub fn build(self) -> std::result::Result<ModelSchema, ConfigurationError> {
		let model_name = self.object_name.to_lowercase();
		let table_name = self
			.table_name
			.unwrap_or_else(|| format!("{}_{}", self.app_label, model_name));

		let mut columns: IndexMap<String, Column> = IndexMap::new();
		if !self.columns.iter().any(|c| c.name == self.pk_field) {
			columns.insert(self.pk_field.clone(), Column::auto(&self.pk_field));
		}
		for column in self.columns {
			if columns.contains_key(&column.name) {
				return Err(ConfigurationError::DuplicateField {
					model: self.object_name.clone(),
					field: column.name,
				});
			}
			columns.insert(column.name.clone(), column);
		}

		if self.polymorphic && !columns.contains_key(POLYMORPHIC_CTYPE_COLUMN) {
			let column = Column::content_type(
				POLYMORPHIC_CTYPE_COLUMN,
				ForeignKeyOptions {
					related_name: Some(format!("polymorphic_{}_set+", model_name)),
					..ForeignKeyOptions::default()
				},
			)
			.null(true)
			.editable(false);
			columns.insert(POLYMORPHIC_CTYPE_COLUMN.to_string(), column);
		}

		let mut specs = FieldSpecs::new();
		let mut generic_references = IndexMap::new();
		for mut field in self.generic_references {
			if columns.contains_key(field.name()) || specs.contains(field.name()) {
				return Err(ConfigurationError::DuplicateField {
					model: self.object_name.clone(),
					field: field.name().to_string(),
				});
			}
			let spec = field.contribute_to_schema(&self.object_name, &mut columns, &self.naming)?;
			specs.insert_declared(spec);
			generic_references.insert(field.name().to_string(), field);
		}

		for native in self.native_references {
			let missing: Vec<String> = [&native.type_column, &native.id_column]
				.into_iter()
				.filter(|name| !columns.contains_key(name.as_str()))
				.cloned()
				.collect();
			if !missing.is_empty() {
				return Err(ConfigurationError::MissingColumns {
					model: self.object_name.clone(),
					field: native.name,
					missing,
				});
			}
			let limit_choices_to = columns
				.get(&native.type_column)
				.and_then(|c| c.limit_choices_to().cloned());
			specs.merge_native(FieldSpec {
				label: crate::contenttypes::fields::humanize(&native.name),
				name: native.name,
				type_column: native.type_column,
				id_column: native.id_column,
				limit_choices_to,
				source: SpecSource::Native,
			});
		}

		let verbose_name = self.verbose_name.unwrap_or_else(|| model_name.clone());
		tracing::info!(
			model = %format!("{}.{}", self.app_label, model_name),
			columns = columns.len(),
			references = specs.len(),
			"built model schema"
		);

		Ok(ModelSchema {
			app_label: self.app_label,
			object_name: self.object_name,
			model_name,
			table_name,
			pk_field: self.pk_field,
			columns,
			generic_references,
			specs,
			ordering: self.ordering,
			verbose_name,
			polymorphic: self.polymorphic,
		})
	}
}
