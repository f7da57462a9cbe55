//! Field spec registry: logical reference names mapped to physical columns

use super::contenttypes::LimitChoicesTo;
use crate::orm::ModelSchema;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// Where a spec entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecSource {
	/// Attached through a [`GenericReferenceField`](super::GenericReferenceField)
	Declared,
	/// Discovered from a native reference declaration
	Native,
}

/// Logical reference name mapped to its type and id columns
#[derive(Debug, Clone)]
pub struct FieldSpec {
	pub name: String,
	pub type_column: String,
	pub id_column: String,
	pub label: String,
	pub limit_choices_to: Option<LimitChoicesTo>,
	pub source: SpecSource,
}

impl FieldSpec {
	/// Both physical columns, type column first
	pub fn columns(&self) -> [&str; 2] {
		[&self.type_column, &self.id_column]
	}
}

/// Ordered per-model collection of [`FieldSpec`]s
///
/// Declared entries are inserted during schema construction. Native entries
/// are merged additively and never replace a declared entry.
#[derive(Debug, Clone, Default)]
pub struct FieldSpecs {
	entries: IndexMap<String, FieldSpec>,
}

impl FieldSpecs {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn insert_declared(&mut self, spec: FieldSpec) {
		self.entries.insert(spec.name.clone(), spec);
	}

	/// Add a natively declared reference; returns `false` when the name is
	/// already taken
	pub(crate) fn merge_native(&mut self, spec: FieldSpec) -> bool {
		if self.entries.contains_key(&spec.name) {
			tracing::debug!(field = %spec.name, "native reference shadowed by declared field");
			return false;
		}
		self.entries.insert(spec.name.clone(), spec);
		true
	}

	pub fn get(&self, name: &str) -> Option<&FieldSpec> {
		self.entries.get(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
		self.entries.values()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Entries of one source, in declaration order
	pub fn by_source(&self, source: SpecSource) -> impl Iterator<Item = &FieldSpec> {
		self.entries.values().filter(move |spec| spec.source == source)
	}

	/// Every physical column backing some reference
	pub fn physical_columns(&self) -> Vec<&str> {
		self.entries
			.values()
			.flat_map(|spec| spec.columns())
			.collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl<'a> IntoIterator for &'a FieldSpecs {
	type Item = &'a FieldSpec;
	type IntoIter = indexmap::map::Values<'a, String, FieldSpec>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.values()
	}
}

/// Read interface consumed by admin integration and autocomplete
pub fn get_specs(schema: &ModelSchema) -> FieldSpecs {
	schema.specs().clone()
}

/// Registry of built model schemas, keyed by `app_label.model_name`
#[derive(Debug, Default)]
pub struct ModelRegistry {
	models: RwLock<IndexMap<String, Arc<ModelSchema>>>,
}

impl ModelRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a schema, replacing any previous schema under the same label
	pub fn register(&self, schema: ModelSchema) -> Arc<ModelSchema> {
		let schema = Arc::new(schema);
		tracing::info!(model = %schema.label(), "registered model");
		self.models.write().insert(schema.label(), Arc::clone(&schema));
		schema
	}

	pub fn get(&self, label: &str) -> Option<Arc<ModelSchema>> {
		self.models.read().get(&label.to_lowercase()).cloned()
	}

	/// Specs of the model registered under `label`, or `None`
	pub fn get_specs(&self, label: &str) -> Option<FieldSpecs> {
		self.get(label).map(|schema| get_specs(&schema))
	}

	pub fn all(&self) -> Vec<Arc<ModelSchema>> {
		self.models.read().values().cloned().collect()
	}

	pub fn clear(&self) {
		self.models.write().clear();
	}
}

/// Process-wide model registry
pub static MODEL_REGISTRY: Lazy<ModelRegistry> = Lazy::new(ModelRegistry::new);
