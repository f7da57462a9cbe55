//! Keyword lookups, boolean expression trees and their compiled form
//!
//! A [`Q`] is the caller-facing boolean tree whose leaves are keyword lookups
//! such as `name__icontains`. Query layers compile it against a model schema
//! into a [`FilterCondition`] over physical columns.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

/// Separator between a field name and its lookup
pub const LOOKUP_SEP: &str = "__";

/// Keyword arguments: insertion-ordered `key -> value` pairs
///
/// Used both for keyword-style filter conditions and for write payloads.
pub type Kwargs = IndexMap<String, Value>;

/// Build a [`Kwargs`] map from `key => value` pairs
///
/// # Examples
///
/// ```
/// use polyref_db::kwargs;
/// use polyref_db::Value;
///
/// let kwargs = kwargs! { "label" => "x", "owner__isnull" => true };
/// assert_eq!(kwargs.len(), 2);
/// assert_eq!(kwargs["owner__isnull"], Value::Bool(true));
/// ```
#[macro_export]
macro_rules! kwargs {
	() => {
		$crate::orm::Kwargs::new()
	};
	($($key:expr => $value:expr),+ $(,)?) => {{
		let mut kwargs = $crate::orm::Kwargs::new();
		$(
			kwargs.insert(::std::string::String::from($key), $crate::Value::from($value));
		)+
		kwargs
	}};
}

/// Split a lookup key into `(field, lookup)` at the first separator
///
/// The lookup defaults to `exact` when the key carries no suffix.
///
/// # Examples
///
/// ```
/// use polyref_db::orm::split_lookup;
///
/// assert_eq!(split_lookup("owner"), ("owner", "exact"));
/// assert_eq!(split_lookup("owner__in"), ("owner", "in"));
/// assert_eq!(split_lookup("owner__type__exact"), ("owner", "type__exact"));
/// ```
pub fn split_lookup(key: &str) -> (&str, &str) {
	match key.split_once(LOOKUP_SEP) {
		Some((field, lookup)) => (field, lookup),
		None => (key, "exact"),
	}
}

/// Boolean connective of a [`Q`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
	And,
	Or,
}

impl fmt::Display for Connector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Connector::And => write!(f, "AND"),
			Connector::Or => write!(f, "OR"),
		}
	}
}

/// A child of a [`Q`] node: either a keyword lookup or a nested tree
#[derive(Debug, Clone, PartialEq)]
pub enum QChild {
	Leaf(String, Value),
	Node(Q),
}

/// Boolean expression tree over keyword lookups
///
/// Mirrors Django's `Q` object. Trees combine with `&`, `|` and `!`; an
/// empty tree means "no filter".
///
/// # Examples
///
/// ```
/// use polyref_db::orm::{Connector, Q};
///
/// let q = Q::leaf("label", "a") | Q::leaf("label", "b");
/// assert_eq!(q.connector(), Connector::Or);
/// assert_eq!(q.children().len(), 2);
///
/// let negated = !Q::leaf("label", "a");
/// assert!(negated.is_negated());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Q {
	connector: Connector,
	negated: bool,
	children: Vec<QChild>,
}

impl Default for Q {
	fn default() -> Self {
		Self::new()
	}
}

impl Q {
	/// Create an empty AND node
	pub fn new() -> Self {
		Self::with_connector(Connector::And)
	}

	/// Create an empty node with the given connective
	pub fn with_connector(connector: Connector) -> Self {
		Self {
			connector,
			negated: false,
			children: Vec::new(),
		}
	}

	/// Create a node holding a single keyword lookup
	pub fn leaf(key: impl Into<String>, value: impl Into<Value>) -> Self {
		let mut q = Self::new();
		q.push_leaf(key, value);
		q
	}

	/// AND of every keyword lookup in `kwargs`, in insertion order
	pub fn from_kwargs(kwargs: Kwargs) -> Self {
		let mut q = Self::new();
		for (key, value) in kwargs {
			q.push_leaf(key, value);
		}
		q
	}

	/// Rebuild a node from its parts
	pub fn from_parts(connector: Connector, negated: bool, children: Vec<QChild>) -> Self {
		Self {
			connector,
			negated,
			children,
		}
	}

	pub fn connector(&self) -> Connector {
		self.connector
	}

	pub fn is_negated(&self) -> bool {
		self.negated
	}

	pub fn children(&self) -> &[QChild] {
		&self.children
	}

	pub fn into_children(self) -> Vec<QChild> {
		self.children
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	pub fn push_leaf(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.children.push(QChild::Leaf(key.into(), value.into()));
	}

	pub fn push_node(&mut self, node: Q) {
		self.children.push(QChild::Node(node));
	}

	/// Combine two trees under `connector`
	///
	/// An empty operand yields the other one unchanged.
	pub fn combine(self, other: Q, connector: Connector) -> Q {
		if other.is_empty() {
			return self;
		}
		if self.is_empty() {
			return other;
		}
		let mut combined = Q::with_connector(connector);
		combined.push_node(self);
		combined.push_node(other);
		combined
	}

	/// Visit every leaf key in the tree, depth first
	pub fn leaf_keys(&self) -> Vec<&str> {
		let mut keys = Vec::new();
		self.collect_keys(&mut keys);
		keys
	}

	fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
		for child in &self.children {
			match child {
				QChild::Leaf(key, _) => keys.push(key),
				QChild::Node(node) => node.collect_keys(keys),
			}
		}
	}
}

impl BitAnd for Q {
	type Output = Q;

	fn bitand(self, rhs: Q) -> Q {
		self.combine(rhs, Connector::And)
	}
}

impl BitOr for Q {
	type Output = Q;

	fn bitor(self, rhs: Q) -> Q {
		self.combine(rhs, Connector::Or)
	}
}

impl Not for Q {
	type Output = Q;

	fn not(self) -> Q {
		if self.is_empty() {
			return self;
		}
		let mut negated = Q::new();
		negated.negated = true;
		negated.push_node(self);
		negated
	}
}

impl fmt::Display for Q {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.children
			.iter()
			.map(|child| match child {
				QChild::Leaf(key, value) => format!("{}={}", key, value),
				QChild::Node(node) => node.to_string(),
			})
			.collect();
		let body = format!("({}: {})", self.connector, parts.join(", "));
		if self.negated {
			write!(f, "NOT {}", body)
		} else {
			write!(f, "{}", body)
		}
	}
}

/// Column-level operators understood by the query layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	IExact,
	Contains,
	IContains,
	StartsWith,
	IStartsWith,
	EndsWith,
	Gt,
	Gte,
	Lt,
	Lte,
	In,
	IsNull,
}

impl FilterOperator {
	/// Every lookup name accepted on a physical column
	pub const LOOKUPS: &'static [&'static str] = &[
		"exact",
		"iexact",
		"contains",
		"icontains",
		"startswith",
		"istartswith",
		"endswith",
		"gt",
		"gte",
		"lt",
		"lte",
		"in",
		"isnull",
	];

	/// Parse a lookup suffix
	pub fn from_lookup(lookup: &str) -> Option<Self> {
		Some(match lookup {
			"exact" => Self::Eq,
			"iexact" => Self::IExact,
			"contains" => Self::Contains,
			"icontains" => Self::IContains,
			"startswith" => Self::StartsWith,
			"istartswith" => Self::IStartsWith,
			"endswith" => Self::EndsWith,
			"gt" => Self::Gt,
			"gte" => Self::Gte,
			"lt" => Self::Lt,
			"lte" => Self::Lte,
			"in" => Self::In,
			"isnull" => Self::IsNull,
			_ => return None,
		})
	}

	pub fn as_lookup(&self) -> &'static str {
		match self {
			Self::Eq => "exact",
			Self::IExact => "iexact",
			Self::Contains => "contains",
			Self::IContains => "icontains",
			Self::StartsWith => "startswith",
			Self::IStartsWith => "istartswith",
			Self::EndsWith => "endswith",
			Self::Gt => "gt",
			Self::Gte => "gte",
			Self::Lt => "lt",
			Self::Lte => "lte",
			Self::In => "in",
			Self::IsNull => "isnull",
		}
	}
}

/// A single column comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: Value,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
		}
	}
}

/// Composite filter condition supporting AND/OR/NOT logic
///
/// This is the compiled form of a [`Q`]: every field is a physical column
/// and every value has been coerced to the column's storage shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
	/// A single filter expression
	Single(Filter),
	/// All conditions must match (AND logic)
	And(Vec<FilterCondition>),
	/// Any condition must match (OR logic)
	Or(Vec<FilterCondition>),
	/// Negates the inner condition (NOT logic)
	Not(Box<FilterCondition>),
}

impl FilterCondition {
	pub fn single(filter: Filter) -> Self {
		Self::Single(filter)
	}

	pub fn and(conditions: Vec<FilterCondition>) -> Self {
		Self::And(conditions)
	}

	pub fn or(conditions: Vec<FilterCondition>) -> Self {
		Self::Or(conditions)
	}

	// Named after Django's `~Q`; this builds a variant rather than negating a bool.
	#[allow(clippy::should_implement_trait)]
	pub fn not(condition: FilterCondition) -> Self {
		Self::Not(Box::new(condition))
	}

	/// AND `other` onto an optional accumulated condition
	pub fn conjoin(current: Option<FilterCondition>, other: FilterCondition) -> FilterCondition {
		match current {
			None => other,
			Some(FilterCondition::And(mut conditions)) => {
				conditions.push(other);
				FilterCondition::And(conditions)
			}
			Some(existing) => FilterCondition::And(vec![existing, other]),
		}
	}
}
