//! Dynamic values passed through lookups and write payloads

use crate::contenttypes::ContentType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a persisted row of some model
///
/// This is the "instance" shape accepted wherever a generic reference value
/// is expected. It carries just enough to resolve the row's content type and
/// primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceRef {
	pub app_label: String,
	pub model: String,
	pub pk: Option<i64>,
}

impl InstanceRef {
	pub fn new(app_label: impl Into<String>, model: impl Into<String>, pk: Option<i64>) -> Self {
		Self {
			app_label: app_label.into(),
			model: model.into(),
			pk,
		}
	}
}

/// Values used in lookups, payloads and stored records
///
/// `Tuple` is the fixed pair shape `(content type, object id)`, while `List`
/// is the iterable shape consumed by `in` lookups. `Map` is the structure
/// shape `{content_type, object_id}` produced by admin forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	List(Vec<Value>),
	Tuple(Vec<Value>),
	Map(IndexMap<String, Value>),
	ContentType(ContentType),
	Instance(InstanceRef),
}

impl Value {
	/// Build the pair shape `(content_type, object_id)`
	pub fn pair(content_type: impl Into<Value>, object_id: impl Into<Value>) -> Self {
		Value::Tuple(vec![content_type.into(), object_id.into()])
	}

	/// Build the structure shape `{content_type, object_id}`
	pub fn structure(content_type: impl Into<Value>, object_id: impl Into<Value>) -> Self {
		let mut map = IndexMap::new();
		map.insert("content_type".to_string(), content_type.into());
		map.insert("object_id".to_string(), object_id.into());
		Value::Map(map)
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Truthiness as used by `isnull` lookups
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Int(i) => *i != 0,
			Value::Float(f) => *f != 0.0,
			Value::String(s) => !s.is_empty(),
			Value::List(items) | Value::Tuple(items) => !items.is_empty(),
			Value::Map(map) => !map.is_empty(),
			Value::ContentType(_) | Value::Instance(_) => true,
		}
	}

	/// Integer view of the value; digit strings are accepted
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	/// Name of the value's shape, used in error messages
	pub fn kind(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::String(_) => "string",
			Value::List(_) => "list",
			Value::Tuple(_) => "tuple",
			Value::Map(_) => "map",
			Value::ContentType(_) => "content type",
			Value::Instance(_) => "instance",
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "None"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Int(i) => write!(f, "{}", i),
			Value::Float(x) => write!(f, "{}", x),
			Value::String(s) => write!(f, "{}", s),
			Value::List(items) | Value::Tuple(items) => {
				let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
				write!(f, "[{}]", parts.join(", "))
			}
			Value::Map(map) => {
				let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
				write!(f, "{{{}}}", parts.join(", "))
			}
			Value::ContentType(ct) => write!(f, "{}", ct),
			Value::Instance(instance) => match instance.pk {
				Some(pk) => write!(f, "{}.{} #{}", instance.app_label, instance.model, pk),
				None => write!(f, "{}.{} (unsaved)", instance.app_label, instance.model),
			},
		}
	}
}

impl From<()> for Value {
	fn from(_: ()) -> Self {
		Value::Null
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<i32> for Value {
	fn from(i: i32) -> Self {
		Value::Int(i as i64)
	}
}

impl From<u32> for Value {
	fn from(i: u32) -> Self {
		Value::Int(i as i64)
	}
}

impl From<f64> for Value {
	fn from(f: f64) -> Self {
		Value::Float(f)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<ContentType> for Value {
	fn from(ct: ContentType) -> Self {
		Value::ContentType(ct)
	}
}

impl From<&ContentType> for Value {
	fn from(ct: &ContentType) -> Self {
		Value::ContentType(ct.clone())
	}
}

impl From<InstanceRef> for Value {
	fn from(instance: InstanceRef) -> Self {
		Value::Instance(instance)
	}
}

impl From<IndexMap<String, Value>> for Value {
	fn from(map: IndexMap<String, Value>) -> Self {
		Value::Map(map)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(Value::Null)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::List(items.into_iter().map(Into::into).collect())
	}
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
	fn from((a, b): (A, B)) -> Self {
		Value::pair(a, b)
	}
}
