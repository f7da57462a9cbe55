//! Mapping between reference form values and physical columns
//!
//! Forms carry one surrogate field per reference, named
//! `<reference><surrogate_suffix>`. The adapter fills surrogates from a
//! record, validates submitted values and writes them back to the two
//! physical columns.

use crate::choices::apply_limit_choices;
use crate::error::{AdminError, AdminResult};
use crate::fields::{PARTIAL_MESSAGE, REQUIRED_MESSAGE, ReferenceFormField};
use crate::widgets::ReferenceWidget;
use indexmap::IndexMap;
use polyref_conf::{AdminSettings, AutocompleteSettings};
use polyref_db::Value;
use polyref_db::contenttypes::{ContentTypeRegistry, FieldSpec, Normalizer, SpecSource};
use polyref_db::orm::{Kwargs, ModelSchema, Record};
use std::sync::Arc;

/// Per-field validation messages keyed by surrogate name
pub type FormErrors = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct ReferenceFormAdapter {
	schema: Arc<ModelSchema>,
	catalog: Arc<ContentTypeRegistry>,
	specs: Vec<FieldSpec>,
	surrogate_suffix: String,
}

impl ReferenceFormAdapter {
	/// Adapter for every reference of `schema`
	///
	/// Natively declared references are included only when
	/// `include_native_references` is set.
	pub fn new(schema: Arc<ModelSchema>, catalog: Arc<ContentTypeRegistry>, settings: &AdminSettings) -> Self {
		let specs = schema
			.specs()
			.iter()
			.filter(|spec| settings.include_native_references || spec.source == SpecSource::Declared)
			.cloned()
			.collect();
		Self {
			schema,
			catalog,
			specs,
			surrogate_suffix: settings.surrogate_suffix.clone(),
		}
	}

	pub fn schema(&self) -> &Arc<ModelSchema> {
		&self.schema
	}

	pub fn specs(&self) -> &[FieldSpec] {
		&self.specs
	}

	/// Form field name standing in for the reference `name`
	pub fn surrogate(&self, name: &str) -> String {
		format!("{}{}", name, self.surrogate_suffix)
	}

	/// Surrogate names, in spec order
	pub fn surrogates(&self) -> Vec<String> {
		self.specs.iter().map(|spec| self.surrogate(&spec.name)).collect()
	}

	/// A pair is required when either column is neither nullable nor blank
	pub fn is_required(&self, spec: &FieldSpec) -> bool {
		spec.columns().iter().any(|name| {
			self.schema
				.column(name)
				.is_some_and(|column| !column.null && !column.blank)
		})
	}

	/// Form field for `spec`, offering the content types it allows
	pub fn form_field(&self, spec: &FieldSpec) -> AdminResult<ReferenceFormField> {
		let choices = apply_limit_choices(&self.catalog, spec.limit_choices_to.as_ref())?;
		Ok(ReferenceFormField::new(self.surrogate(&spec.name), choices)
			.label(spec.label.clone())
			.required(self.is_required(spec)))
	}

	pub fn widget(
		&self,
		spec: &FieldSpec,
		admin: &AdminSettings,
		autocomplete: &AutocompleteSettings,
	) -> AdminResult<ReferenceWidget> {
		let choices = apply_limit_choices(&self.catalog, spec.limit_choices_to.as_ref())?;
		Ok(ReferenceWidget::new(choices, admin, autocomplete))
	}

	/// Initial surrogate values: the stored `(content type, object id)` pairs
	pub fn initial(&self, record: &Record) -> Kwargs {
		self.specs
			.iter()
			.map(|spec| {
				let value = Value::pair(
					record.get(&spec.type_column).clone(),
					record.get(&spec.id_column).clone(),
				);
				(self.surrogate(&spec.name), value)
			})
			.collect()
	}

	/// Check partial and missing required references in cleaned form data
	///
	/// # Examples
	///
	/// ```
	/// use polyref_admin::{PARTIAL_MESSAGE, ReferenceFormAdapter};
	/// use polyref_conf::AdminSettings;
	/// use polyref_db::contenttypes::GenericReferenceField;
	/// use polyref_db::orm::{Database, ModelSchemaBuilder};
	/// use polyref_db::{Value, kwargs};
	///
	/// let db = Database::new();
	/// let schema = db.register(
	///     ModelSchemaBuilder::new("vault", "Credential")
	///         .generic_reference(GenericReferenceField::new("owner").null(true).blank(true))
	///         .build()
	///         .unwrap(),
	/// );
	/// let adapter = ReferenceFormAdapter::new(schema, db.catalog().clone(), &AdminSettings::default());
	///
	/// assert!(adapter.validate(&kwargs! { "owner__ref" => Value::Null }).is_ok());
	/// let errors = adapter
	///     .validate(&kwargs! { "owner__ref" => Value::structure(1i64, Value::Null) })
	///     .unwrap_err();
	/// assert_eq!(errors["owner__ref"], vec![PARTIAL_MESSAGE.to_string()]);
	/// ```
	pub fn validate(&self, cleaned: &Kwargs) -> Result<(), FormErrors> {
		let mut errors = FormErrors::new();
		for spec in &self.specs {
			let surrogate = self.surrogate(&spec.name);
			let (content_type, object_id) = parts(cleaned.get(&surrogate));
			let message = match (is_set(&content_type), is_set(&object_id)) {
				(true, false) | (false, true) => Some(PARTIAL_MESSAGE),
				(false, false) if self.is_required(spec) => Some(REQUIRED_MESSAGE),
				_ => None,
			};
			if let Some(message) = message {
				errors.entry(surrogate).or_default().push(message.to_string());
			}
		}
		if errors.is_empty() { Ok(()) } else { Err(errors) }
	}

	/// Write cleaned surrogate values to the physical columns of `record`
	///
	/// A missing or empty surrogate clears both columns. Every surrogate is
	/// resolved before any column is written, so on error `record` is left
	/// untouched.
	pub fn apply(&self, record: &mut Record, cleaned: &Kwargs) -> AdminResult<()> {
		let normalizer = Normalizer::new(&self.catalog);
		let mut resolved = Vec::with_capacity(self.specs.len());
		for spec in &self.specs {
			let (content_type, object_id) = parts(cleaned.get(&self.surrogate(&spec.name)));
			let columns = match (is_set(&content_type), is_set(&object_id)) {
				(false, false) => (Value::Null, Value::Null),
				(true, true) => normalizer.to_columns(&Value::pair(content_type, object_id))?,
				_ => return Err(AdminError::Validation(PARTIAL_MESSAGE.to_string())),
			};
			resolved.push((spec, columns));
		}
		for (spec, (type_value, id_value)) in resolved {
			tracing::debug!(
				model = %self.schema.label(),
				field = %spec.name,
				"applied reference form value"
			);
			record.set(spec.type_column.clone(), type_value);
			record.set(spec.id_column.clone(), id_value);
		}
		Ok(())
	}
}

fn parts(value: Option<&Value>) -> (Value, Value) {
	value.map(ReferenceWidget::decompress).unwrap_or((Value::Null, Value::Null))
}

fn is_set(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::String(s) => !s.trim().is_empty(),
		_ => true,
	}
}
