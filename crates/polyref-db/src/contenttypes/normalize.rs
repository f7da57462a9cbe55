//! Normalization of the accepted reference value shapes
//!
//! A generic reference may be supplied as a row instance, a
//! `(content_type, object_id)` pair, a `{content_type, object_id}`
//! structure, or null. [`Normalizer::normalize`] reduces each of them to a
//! canonical [`GenericRef`] or to "empty" (`None`).

use super::contenttypes::{ContentType, ContentTypeRegistry};
use crate::error::{Error, Result};
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// Canonical reference: a catalog entry plus a row id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GenericRef {
	content_type: ContentType,
	content_type_id: i64,
	object_id: i64,
}

impl GenericRef {
	fn new(content_type: ContentType, object_id: i64) -> Result<Self> {
		let content_type_id = content_type.id.ok_or_else(|| {
			Error::value(format!(
				"content type '{}' has not been saved",
				content_type.qualified_name()
			))
		})?;
		Ok(Self {
			content_type,
			content_type_id,
			object_id,
		})
	}

	pub fn content_type(&self) -> &ContentType {
		&self.content_type
	}

	pub fn content_type_id(&self) -> i64 {
		self.content_type_id
	}

	pub fn object_id(&self) -> i64 {
		self.object_id
	}

	/// Pair shape `(ct_id, object_id)`
	pub fn to_pair(&self) -> Value {
		Value::pair(self.content_type_id, self.object_id)
	}

	/// Structure shape `{content_type, object_id}`
	pub fn to_structure(&self) -> Value {
		Value::structure(self.content_type_id, self.object_id)
	}
}

impl fmt::Display for GenericRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} #{}", self.content_type.qualified_name(), self.object_id)
	}
}

/// Resolves reference values against a content type catalog
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
	catalog: &'a ContentTypeRegistry,
}

impl<'a> Normalizer<'a> {
	pub fn new(catalog: &'a ContentTypeRegistry) -> Self {
		Self { catalog }
	}

	/// Reduce `value` to a canonical reference, or `None` for empty
	///
	/// # Examples
	///
	/// ```
	/// use polyref_db::contenttypes::{ContentTypeRegistry, Normalizer};
	/// use polyref_db::{InstanceRef, Value};
	///
	/// let catalog = ContentTypeRegistry::new();
	/// let normalizer = Normalizer::new(&catalog);
	///
	/// let user = Value::from(InstanceRef::new("auth", "user", Some(7)));
	/// let reference = normalizer.normalize(&user).unwrap().unwrap();
	/// assert_eq!(reference.object_id(), 7);
	/// assert_eq!(reference.content_type().qualified_name(), "auth.user");
	///
	/// let same = normalizer.normalize(&reference.to_pair()).unwrap();
	/// assert_eq!(same, Some(reference));
	/// assert_eq!(normalizer.normalize(&Value::Null).unwrap(), None);
	/// ```
	pub fn normalize(&self, value: &Value) -> Result<Option<GenericRef>> {
		match value {
			Value::Null => Ok(None),
			Value::Instance(instance) => {
				let pk = instance.pk.ok_or_else(|| {
					Error::value(format!(
						"cannot reference an unsaved {}.{} instance",
						instance.app_label, instance.model
					))
				})?;
				let content_type = self
					.catalog
					.get_or_create(&instance.app_label, &instance.model);
				GenericRef::new(content_type, object_id(&Value::Int(pk))?).map(Some)
			}
			Value::Tuple(items) if items.len() == 2 => self.resolve_members(&items[0], &items[1]),
			Value::Map(map) => {
				let (Some(content_type), Some(object_id)) =
					(map.get("content_type"), map.get("object_id"))
				else {
					return Err(Error::value(
						"a generic reference structure must contain 'content_type' and 'object_id'",
					));
				};
				self.resolve_members(content_type, object_id)
			}
			other => Err(Error::value(format!(
				"unsupported value for a generic reference: {} ({})",
				other.kind(),
				other
			))),
		}
	}

	/// Normalize into the two column values; empty becomes a null pair
	pub fn to_columns(&self, value: &Value) -> Result<(Value, Value)> {
		Ok(match self.normalize(value)? {
			Some(reference) => (
				Value::Int(reference.content_type_id()),
				Value::Int(reference.object_id()),
			),
			None => (Value::Null, Value::Null),
		})
	}

	fn resolve_members(&self, content_type: &Value, id: &Value) -> Result<Option<GenericRef>> {
		match (content_type.is_null(), id.is_null()) {
			(true, true) => return Ok(None),
			(true, false) | (false, true) => {
				return Err(Error::value(
					"a generic reference needs both content type and object id, or neither",
				));
			}
			(false, false) => {}
		}
		let content_type = self.resolve_content_type(content_type)?;
		GenericRef::new(content_type, object_id(id)?).map(Some)
	}

	/// Resolve a content type value or id against the catalog
	pub fn resolve_content_type(&self, value: &Value) -> Result<ContentType> {
		match value {
			Value::ContentType(ct) => self.catalog.resolve(ct),
			other => match other.as_int() {
				Some(id) => self.catalog.require(id),
				None => Err(Error::value(format!(
					"content type must be a content type or its id, got {} ({})",
					other.kind(),
					other
				))),
			},
		}
	}
}

fn object_id(value: &Value) -> Result<i64> {
	match value.as_int() {
		Some(id) if id >= 0 => Ok(id),
		_ => Err(Error::value(format!(
			"object id must be a non-negative integer, got {} ({})",
			value.kind(),
			value
		))),
	}
}
