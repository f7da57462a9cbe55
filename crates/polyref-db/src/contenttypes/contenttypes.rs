//! Content types and the catalog that assigns their ids

use crate::error::{Error, Result};
use crate::orm::filter::{LookupResolver, compile, evaluate};
use crate::orm::{Filter, FilterOperator, Kwargs, Q, split_lookup};
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A row type known to the catalog, identified by `(app_label, model)`
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::ContentType;
///
/// let ct = ContentType::new("auth", "user");
/// assert_eq!(ct.id, None);
/// assert_eq!(ct.qualified_name(), "auth.user");
/// assert_eq!(ct.to_string(), "auth | user");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentType {
	pub id: Option<i64>,
	pub app_label: String,
	pub model: String,
}

impl ContentType {
	pub fn new(app_label: impl Into<String>, model: impl Into<String>) -> Self {
		Self {
			id: None,
			app_label: app_label.into(),
			model: model.into(),
		}
	}

	pub fn with_id(mut self, id: i64) -> Self {
		self.id = Some(id);
		self
	}

	/// `(app_label, model)`
	pub fn natural_key(&self) -> (&str, &str) {
		(&self.app_label, &self.model)
	}

	/// `app_label.model`
	pub fn qualified_name(&self) -> String {
		format!("{}.{}", self.app_label, self.model)
	}

	fn field_value(&self, field: &str) -> Value {
		match field {
			"id" => self.id.into(),
			"app_label" => self.app_label.as_str().into(),
			"model" => self.model.as_str().into(),
			_ => Value::Null,
		}
	}
}

impl fmt::Display for ContentType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} | {}", self.app_label, self.model)
	}
}

/// Restriction on which content types a reference may point to
///
/// The predicate is opaque: it is applied verbatim to the catalog and never
/// rewritten. Lookups may name `id` (or `pk`), `app_label` and `model`.
#[derive(Clone)]
pub enum LimitChoicesTo {
	/// Flat mapping, ANDed together (`{"app_label": "auth", "model": "user"}`)
	Lookups(Kwargs),
	/// Arbitrary boolean expression
	Condition(Q),
	/// Evaluated each time the predicate is applied
	Callable(Arc<dyn Fn() -> LimitChoicesTo + Send + Sync>),
	/// Every predicate must hold
	All(Vec<LimitChoicesTo>),
}

impl LimitChoicesTo {
	/// Restrict to an explicit set of `app_label.model` names
	///
	/// # Examples
	///
	/// ```
	/// use polyref_db::contenttypes::{ContentType, ContentTypeRegistry, LimitChoicesTo};
	///
	/// let registry = ContentTypeRegistry::new();
	/// registry.register(ContentType::new("auth", "user"));
	/// registry.register(ContentType::new("auth", "group"));
	///
	/// let limit = LimitChoicesTo::models(&["auth.user"]);
	/// let allowed = registry.filter(&limit).unwrap();
	/// assert_eq!(allowed.len(), 1);
	/// assert_eq!(allowed[0].model, "user");
	/// ```
	pub fn models(names: &[&str]) -> Self {
		let mut q = Q::with_connector(crate::orm::Connector::Or);
		for name in names {
			if let Some((app_label, model)) = name.split_once('.') {
				q.push_node(Q::leaf("app_label", app_label) & Q::leaf("model", model));
			}
		}
		Self::Condition(q)
	}

	pub fn callable(f: impl Fn() -> LimitChoicesTo + Send + Sync + 'static) -> Self {
		Self::Callable(Arc::new(f))
	}

	/// Flatten into a single expression over catalog fields
	pub fn to_q(&self) -> Q {
		match self {
			Self::Lookups(kwargs) => Q::from_kwargs(kwargs.clone()),
			Self::Condition(q) => q.clone(),
			Self::Callable(f) => f().to_q(),
			Self::All(items) => items
				.iter()
				.fold(Q::new(), |acc, item| acc & item.to_q()),
		}
	}
}

impl fmt::Debug for LimitChoicesTo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Lookups(kwargs) => f.debug_tuple("Lookups").field(kwargs).finish(),
			Self::Condition(q) => f.debug_tuple("Condition").field(q).finish(),
			Self::Callable(_) => f.write_str("Callable(<fn>)"),
			Self::All(items) => f.debug_tuple("All").field(items).finish(),
		}
	}
}

impl From<Kwargs> for LimitChoicesTo {
	fn from(kwargs: Kwargs) -> Self {
		Self::Lookups(kwargs)
	}
}

impl From<Q> for LimitChoicesTo {
	fn from(q: Q) -> Self {
		Self::Condition(q)
	}
}

#[derive(Debug, Default)]
struct CatalogState {
	by_key: IndexMap<(String, String), ContentType>,
	next_id: i64,
}

/// Catalog of content types
///
/// Ids are assigned on registration, starting at 1. All methods take `&self`;
/// the catalog can be shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
	state: RwLock<CatalogState>,
}

impl ContentTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a content type, returning the stored entry
	///
	/// Registering an existing natural key returns the existing entry. A
	/// caller-supplied id is kept.
	pub fn register(&self, content_type: ContentType) -> ContentType {
		let mut state = self.state.write();
		let key = (content_type.app_label.clone(), content_type.model.clone());
		if let Some(existing) = state.by_key.get(&key) {
			return existing.clone();
		}

		let id = match content_type.id {
			Some(id) => {
				state.next_id = state.next_id.max(id);
				id
			}
			None => {
				state.next_id += 1;
				state.next_id
			}
		};
		let stored = content_type.with_id(id);
		tracing::info!(
			content_type = %stored.qualified_name(),
			id,
			"registered content type"
		);
		state.by_key.insert(key, stored.clone());
		stored
	}

	pub fn get(&self, app_label: &str, model: &str) -> Option<ContentType> {
		self.state
			.read()
			.by_key
			.get(&(app_label.to_string(), model.to_string()))
			.cloned()
	}

	pub fn get_by_id(&self, id: i64) -> Option<ContentType> {
		self.state
			.read()
			.by_key
			.values()
			.find(|ct| ct.id == Some(id))
			.cloned()
	}

	pub fn get_or_create(&self, app_label: &str, model: &str) -> ContentType {
		match self.get(app_label, model) {
			Some(ct) => ct,
			None => self.register(ContentType::new(app_label, model)),
		}
	}

	/// Look up a content type by id, failing with a not-found error
	pub fn require(&self, id: i64) -> Result<ContentType> {
		self.get_by_id(id)
			.ok_or_else(|| Error::NotFound(format!("content type with id {} does not exist", id)))
	}

	/// Re-resolve a content type value against the catalog
	///
	/// Entries carrying an id are looked up by id; entries without one by
	/// natural key.
	pub fn resolve(&self, content_type: &ContentType) -> Result<ContentType> {
		match content_type.id {
			Some(id) => self.require(id),
			None => self
				.get(&content_type.app_label, &content_type.model)
				.ok_or_else(|| {
					Error::NotFound(format!(
						"content type '{}' does not exist",
						content_type.qualified_name()
					))
				}),
		}
	}

	/// All entries in registration order
	pub fn all(&self) -> Vec<ContentType> {
		self.state.read().by_key.values().cloned().collect()
	}

	/// Entries matching `limit`, in registration order
	pub fn filter(&self, limit: &LimitChoicesTo) -> Result<Vec<ContentType>> {
		let condition = match compile(&limit.to_q(), self)? {
			Some(condition) => condition,
			None => return Ok(self.all()),
		};
		Ok(self
			.all()
			.into_iter()
			.filter(|ct| {
				let row: IndexMap<String, Value> = ["id", "app_label", "model"]
					.iter()
					.map(|field| (field.to_string(), ct.field_value(field)))
					.collect();
				evaluate(&condition, &row)
			})
			.collect())
	}

	pub fn len(&self) -> usize {
		self.state.read().by_key.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		let mut state = self.state.write();
		state.by_key.clear();
		state.next_id = 0;
	}
}

impl LookupResolver for ContentTypeRegistry {
	fn resolve_lookup(&self, key: &str, value: &Value) -> Result<Filter> {
		let (field, lookup) = split_lookup(key);
		let field = match field {
			"pk" => "id",
			"id" | "app_label" | "model" => field,
			other => {
				return Err(Error::field(format!(
					"Cannot resolve keyword '{}' into field. Choices are: app_label, id, model",
					other
				)));
			}
		};
		let operator = FilterOperator::from_lookup(lookup).ok_or_else(|| {
			Error::field(format!(
				"Unsupported lookup '{}' for field '{}'",
				lookup, field
			))
		})?;
		let value = match (field, value) {
			("id", Value::ContentType(ct)) => ct.id.into(),
			("id", Value::List(items)) => Value::List(
				items
					.iter()
					.map(|item| match item {
						Value::ContentType(ct) => ct.id.into(),
						other => other.as_int().map(Value::Int).unwrap_or_else(|| other.clone()),
					})
					.collect(),
			),
			("id", other) if operator != FilterOperator::IsNull => {
				other.as_int().map(Value::Int).unwrap_or_else(|| other.clone())
			}
			_ => value.clone(),
		};
		Ok(Filter::new(field, operator, value))
	}
}

/// Process-wide content type catalog
pub static CONTENT_TYPE_REGISTRY: Lazy<Arc<ContentTypeRegistry>> =
	Lazy::new(|| Arc::new(ContentTypeRegistry::new()));
