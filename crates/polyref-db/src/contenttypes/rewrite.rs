//! Rewriting of logical reference lookups into physical column conditions
//!
//! Callers filter and write using a reference's logical name (`owner`,
//! `owner__in`, `owner__isnull`). The [`Rewriter`] consults the model's field
//! specs and replaces every such lookup with conditions on the type and id
//! columns. Lookups on other names pass through unchanged.
//!
//! Each logical leaf becomes a self-contained AND node, so the pair stays
//! atomic whatever connective the surrounding tree uses:
//!
//! ```text
//! Q(owner=user) | Q(label="x")
//!   => (owner_type = t AND owner_id = 7) OR label = 'x'
//! ```

use super::contenttypes::ContentTypeRegistry;
use super::normalize::{GenericRef, Normalizer};
use super::registry::{FieldSpec, FieldSpecs};
use crate::error::{Error, Result};
use crate::orm::{Connector, Kwargs, ModelSchema, Q, QChild, split_lookup};
use crate::value::Value;
use indexmap::IndexMap;

/// Separator between an inheritance model prefix and a lookup
pub const INHERITANCE_SEP: &str = "___";

/// Split `Model___lookup` into its prefix and the lookup
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::rewrite::split_inheritance_prefix;
///
/// assert_eq!(split_inheritance_prefix("ArtProject___owner"), (Some("ArtProject"), "owner"));
/// assert_eq!(split_inheritance_prefix("owner__in"), (None, "owner__in"));
/// ```
pub fn split_inheritance_prefix(key: &str) -> (Option<&str>, &str) {
	match key.split_once(INHERITANCE_SEP) {
		Some((prefix, rest)) if !prefix.is_empty() => (Some(prefix), rest),
		_ => (None, key),
	}
}

/// Rewrites lookups and payloads for one model
#[derive(Debug, Clone, Copy)]
pub struct Rewriter<'a> {
	specs: &'a FieldSpecs,
	normalizer: Normalizer<'a>,
	model: &'a str,
}

impl<'a> Rewriter<'a> {
	pub fn new(schema: &'a ModelSchema, catalog: &'a ContentTypeRegistry) -> Self {
		Self {
			specs: schema.specs(),
			normalizer: Normalizer::new(catalog),
			model: schema.object_name(),
		}
	}

	/// Whether `key` names a logical reference, with or without a lookup
	pub fn is_logical(&self, key: &str) -> bool {
		let (_, rest) = split_inheritance_prefix(key);
		self.specs.contains(split_lookup(rest).0)
	}

	/// Split keyword conditions into a rewritten expression and the rest
	///
	/// The expression ANDs one node per logical lookup; it is empty when no
	/// key names a logical reference.
	pub fn rewrite_filters(&self, kwargs: Kwargs) -> Result<(Q, Kwargs)> {
		let mut q = Q::new();
		let mut rest = Kwargs::new();
		for (key, value) in kwargs {
			match self.rewrite_lookup(&key, &value)? {
				Some(node) => q.push_node(node),
				None => {
					rest.insert(key, value);
				}
			}
		}
		Ok((q, rest))
	}

	/// Rewrite every logical leaf of `q`, preserving its shape
	pub fn rewrite_expression(&self, q: &Q) -> Result<Q> {
		let mut children = Vec::with_capacity(q.children().len());
		for child in q.children() {
			match child {
				QChild::Leaf(key, value) => match self.rewrite_lookup(key, value)? {
					Some(node) => children.push(QChild::Node(node)),
					None => children.push(child.clone()),
				},
				QChild::Node(node) => children.push(QChild::Node(self.rewrite_expression(node)?)),
			}
		}
		Ok(Q::from_parts(q.connector(), q.is_negated(), children))
	}

	/// Rewrite positional expressions and keyword conditions together
	///
	/// The kwargs-derived expression is appended to the rewritten positional
	/// arguments when it is not empty.
	pub fn rewrite_arguments(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<(Vec<Q>, Kwargs)> {
		let (from_kwargs, rest) = self.rewrite_filters(kwargs)?;
		let mut rewritten = args
			.iter()
			.map(|q| self.rewrite_expression(q))
			.collect::<Result<Vec<_>>>()?;
		if !from_kwargs.is_empty() {
			rewritten.push(from_kwargs);
		}
		Ok((rewritten, rest))
	}

	/// Replace every logical key of a write payload by its two columns
	pub fn rewrite_payload(&self, payload: Kwargs) -> Result<Kwargs> {
		let mut rewritten = Kwargs::with_capacity(payload.len() + self.specs.len());
		for (key, value) in payload {
			match self.specs.get(&key) {
				Some(spec) => {
					let (type_value, id_value) = self.normalizer.to_columns(&value)?;
					tracing::debug!(
						model = self.model,
						field = %spec.name,
						"rewrote payload assignment"
					);
					rewritten.insert(spec.type_column.clone(), type_value);
					rewritten.insert(spec.id_column.clone(), id_value);
				}
				None => {
					rewritten.insert(key, value);
				}
			}
		}
		Ok(rewritten)
	}

	/// Column assignments implied by logical `exact` lookups
	///
	/// Used by get-or-create style calls so a created row carries the
	/// reference it was looked up by.
	pub fn exact_assignments(&self, kwargs: &Kwargs) -> Result<Kwargs> {
		let mut assignments = Kwargs::new();
		for (key, value) in kwargs {
			if split_inheritance_prefix(key).0.is_some() {
				continue;
			}
			let (field, lookup) = split_lookup(key);
			if lookup != "exact" {
				continue;
			}
			if let Some(spec) = self.specs.get(field) {
				let (type_value, id_value) = self.normalizer.to_columns(value)?;
				assignments.insert(spec.type_column.clone(), type_value);
				assignments.insert(spec.id_column.clone(), id_value);
			}
		}
		Ok(assignments)
	}

	/// Rewrite one lookup; `None` when it does not name a logical reference
	fn rewrite_lookup(&self, key: &str, value: &Value) -> Result<Option<Q>> {
		let (prefix, rest) = split_inheritance_prefix(key);
		let (field, lookup) = split_lookup(rest);
		let Some(spec) = self.specs.get(field) else {
			return Ok(None);
		};
		let columns = PhysicalColumns::new(spec, prefix);

		let rewritten = match lookup {
			"exact" => columns.equals(self.normalizer.normalize(value)?.as_ref()),
			"in" => {
				let items = match value {
					Value::List(items) | Value::Tuple(items) => items,
					other => {
						return Err(Error::value(format!(
							"'in' lookup on generic reference '{}' expects an iterable, got {}",
							field,
							other.kind()
						)));
					}
				};
				if items.is_empty() {
					Q::leaf("pk__in", Value::List(Vec::new()))
				} else {
					let mut any = Q::with_connector(Connector::Or);
					for item in items {
						any.push_node(columns.equals(self.normalizer.normalize(item)?.as_ref()));
					}
					any
				}
			}
			"isnull" => columns.null_test(value.is_truthy()),
			other => {
				return Err(Error::NotImplemented {
					lookup: other.to_string(),
					field: field.to_string(),
				});
			}
		};

		tracing::debug!(
			model = self.model,
			key,
			rewritten = %rewritten,
			"rewrote generic reference lookup"
		);
		Ok(Some(rewritten))
	}
}

/// The column pair of a spec, optionally behind an inheritance prefix
struct PhysicalColumns {
	type_column: String,
	id_column: String,
}

impl PhysicalColumns {
	fn new(spec: &FieldSpec, prefix: Option<&str>) -> Self {
		let qualify = |column: &str| match prefix {
			Some(prefix) => format!("{}{}{}", prefix, INHERITANCE_SEP, column),
			None => column.to_string(),
		};
		Self {
			type_column: qualify(&spec.type_column),
			id_column: qualify(&spec.id_column),
		}
	}

	fn equals(&self, reference: Option<&GenericRef>) -> Q {
		match reference {
			Some(reference) => {
				let mut q = Q::new();
				q.push_leaf(self.type_column.clone(), reference.content_type_id());
				q.push_leaf(self.id_column.clone(), reference.object_id());
				q
			}
			None => self.null_test(true),
		}
	}

	fn null_test(&self, is_null: bool) -> Q {
		let mut q = Q::new();
		q.push_leaf(format!("{}__isnull", self.type_column), is_null);
		q.push_leaf(format!("{}__isnull", self.id_column), is_null);
		q
	}
}

/// Null both columns of any pair where exactly one is set
///
/// Returns the logical names that were repaired.
pub fn enforce_pair_consistency(
	specs: &FieldSpecs,
	values: &mut IndexMap<String, Value>,
) -> Vec<String> {
	let mut repaired = Vec::new();
	for spec in specs {
		let type_null = values.get(&spec.type_column).is_none_or(Value::is_null);
		let id_null = values.get(&spec.id_column).is_none_or(Value::is_null);
		if type_null != id_null {
			tracing::warn!(
				field = %spec.name,
				type_column = %spec.type_column,
				id_column = %spec.id_column,
				"partial generic reference pair cleared before save"
			);
			values.insert(spec.type_column.clone(), Value::Null);
			values.insert(spec.id_column.clone(), Value::Null);
			repaired.push(spec.name.clone());
		}
	}
	repaired
}
