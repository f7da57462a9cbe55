//! Rows returned by and passed to the query layers

use crate::value::{InstanceRef, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One row of a model: column name to value
///
/// `app_label` and `model` name the row's concrete model. Polymorphic layers
/// relabel rows with the model of their stored content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	pub app_label: String,
	pub model: String,
	pub pk_field: String,
	pub values: IndexMap<String, Value>,
}

impl Record {
	pub fn new(
		app_label: impl Into<String>,
		model: impl Into<String>,
		pk_field: impl Into<String>,
		values: IndexMap<String, Value>,
	) -> Self {
		Self {
			app_label: app_label.into(),
			model: model.into(),
			pk_field: pk_field.into(),
			values,
		}
	}

	/// Column value; missing columns read as null
	pub fn get(&self, column: &str) -> &Value {
		const NULL: &Value = &Value::Null;
		self.values.get(column).unwrap_or(NULL)
	}

	pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
		self.values.insert(column.into(), value.into());
	}

	pub fn pk(&self) -> Option<i64> {
		self.get(&self.pk_field).as_int()
	}

	pub fn is_saved(&self) -> bool {
		self.pk().is_some()
	}

	/// `app_label.model`
	pub fn label(&self) -> String {
		format!("{}.{}", self.app_label, self.model)
	}

	pub fn instance_ref(&self) -> InstanceRef {
		InstanceRef::new(&self.app_label, &self.model, self.pk())
	}
}

impl From<&Record> for Value {
	fn from(record: &Record) -> Self {
		Value::Instance(record.instance_ref())
	}
}

impl From<Record> for Value {
	fn from(record: Record) -> Self {
		Value::from(&record)
	}
}
