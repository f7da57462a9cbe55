//! Compiling [`Q`] trees into column conditions and evaluating them in memory

use super::query::{Connector, Filter, FilterCondition, FilterOperator, Q, QChild};
use crate::error::Result;
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;

/// Maximum nesting accepted when compiling or evaluating a tree
pub const MAX_FILTER_DEPTH: usize = 100;

/// Resolves one keyword lookup into a column-level [`Filter`]
///
/// Implemented by model schemas and by the content type catalog. The resolver
/// owns the knowledge of which names are columns and how values are coerced.
pub trait LookupResolver {
	fn resolve_lookup(&self, key: &str, value: &Value) -> Result<Filter>;
}

/// Compile a [`Q`] tree against `resolver`
///
/// Returns `None` for an empty tree ("no filter"). Connectives and negation
/// are preserved; single-child nodes collapse into their child.
pub fn compile<R: LookupResolver + ?Sized>(q: &Q, resolver: &R) -> Result<Option<FilterCondition>> {
	compile_with_depth(q, resolver, 0)
}

fn compile_with_depth<R: LookupResolver + ?Sized>(
	q: &Q,
	resolver: &R,
	depth: usize,
) -> Result<Option<FilterCondition>> {
	if depth >= MAX_FILTER_DEPTH {
		return Err(crate::Error::field(format!(
			"filter expression nested deeper than {} levels",
			MAX_FILTER_DEPTH
		)));
	}

	let mut conditions = Vec::with_capacity(q.children().len());
	for child in q.children() {
		match child {
			QChild::Leaf(key, value) => {
				conditions.push(FilterCondition::single(resolver.resolve_lookup(key, value)?));
			}
			QChild::Node(node) => {
				if let Some(condition) = compile_with_depth(node, resolver, depth + 1)? {
					conditions.push(condition);
				}
			}
		}
	}

	if conditions.is_empty() {
		return Ok(None);
	}
	let combined = if conditions.len() == 1 {
		conditions.remove(0)
	} else {
		match q.connector() {
			Connector::And => FilterCondition::and(conditions),
			Connector::Or => FilterCondition::or(conditions),
		}
	};

	Ok(Some(if q.is_negated() {
		FilterCondition::not(combined)
	} else {
		combined
	}))
}

/// Evaluate a condition against one stored row
///
/// Comparisons against a null column are false; `NOT` simply inverts the
/// inner result.
pub fn evaluate(condition: &FilterCondition, row: &IndexMap<String, Value>) -> bool {
	match condition {
		FilterCondition::Single(filter) => matches_filter(filter, row),
		FilterCondition::And(conditions) => conditions.iter().all(|c| evaluate(c, row)),
		FilterCondition::Or(conditions) => conditions.iter().any(|c| evaluate(c, row)),
		FilterCondition::Not(inner) => !evaluate(inner, row),
	}
}

fn matches_filter(filter: &Filter, row: &IndexMap<String, Value>) -> bool {
	let current = row.get(&filter.field).unwrap_or(&Value::Null);

	match filter.operator {
		FilterOperator::IsNull => current.is_null() == filter.value.is_truthy(),
		FilterOperator::Eq if filter.value.is_null() => current.is_null(),
		_ if current.is_null() => false,
		FilterOperator::Eq => values_equal(current, &filter.value),
		FilterOperator::In => match &filter.value {
			Value::List(items) | Value::Tuple(items) => items
				.iter()
				.any(|item| !item.is_null() && values_equal(current, item)),
			_ => false,
		},
		FilterOperator::Gt => compare(current, &filter.value) == Some(Ordering::Greater),
		FilterOperator::Gte => matches!(
			compare(current, &filter.value),
			Some(Ordering::Greater | Ordering::Equal)
		),
		FilterOperator::Lt => compare(current, &filter.value) == Some(Ordering::Less),
		FilterOperator::Lte => matches!(
			compare(current, &filter.value),
			Some(Ordering::Less | Ordering::Equal)
		),
		FilterOperator::IExact => text_match(current, &filter.value, true, |a, b| a == b),
		FilterOperator::Contains => text_match(current, &filter.value, false, |a, b| a.contains(b)),
		FilterOperator::IContains => text_match(current, &filter.value, true, |a, b| a.contains(b)),
		FilterOperator::StartsWith => {
			text_match(current, &filter.value, false, |a, b| a.starts_with(b))
		}
		FilterOperator::IStartsWith => {
			text_match(current, &filter.value, true, |a, b| a.starts_with(b))
		}
		FilterOperator::EndsWith => text_match(current, &filter.value, false, |a, b| a.ends_with(b)),
	}
}

/// Equality with integer/float widening
pub fn values_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
		_ => a == b,
	}
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
	match (a, b) {
		(Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
		(Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
		(Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
		(Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
		(Value::String(x), Value::String(y)) => Some(x.cmp(y)),
		(Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
		_ => None,
	}
}

fn as_text(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Int(_) | Value::Float(_) | Value::Bool(_) => Some(value.to_string()),
		_ => None,
	}
}

fn text_match(
	current: &Value,
	pattern: &Value,
	case_insensitive: bool,
	op: impl Fn(&str, &str) -> bool,
) -> bool {
	let (Some(mut haystack), Some(mut needle)) = (as_text(current), as_text(pattern)) else {
		return false;
	};
	if case_insensitive {
		haystack = haystack.to_lowercase();
		needle = needle.to_lowercase();
	}
	op(&haystack, &needle)
}

/// Stable ordering used by `order_by`: nulls sort first
pub fn order_values(a: &Value, b: &Value) -> Ordering {
	match (a.is_null(), b.is_null()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Less,
		(false, true) => Ordering::Greater,
		(false, false) => compare(a, b).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;
	use rstest::rstest;

	struct Plain;

	impl LookupResolver for Plain {
		fn resolve_lookup(&self, key: &str, value: &Value) -> Result<Filter> {
			let (field, lookup) = crate::orm::split_lookup(key);
			let operator = FilterOperator::from_lookup(lookup)
				.ok_or_else(|| Error::field(format!("unsupported lookup '{}'", lookup)))?;
			Ok(Filter::new(field, operator, value.clone()))
		}
	}

	fn row(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.clone()))
			.collect()
	}

	#[test]
	fn test_compile_empty_is_none() {
		assert_eq!(compile(&Q::new(), &Plain).unwrap(), None);
	}

	#[test]
	fn test_compile_collapses_single_child() {
		let condition = compile(&Q::leaf("a", 1i64), &Plain).unwrap().unwrap();
		assert_eq!(
			condition,
			FilterCondition::single(Filter::new("a", FilterOperator::Eq, 1i64))
		);
	}

	#[test]
	fn test_compile_preserves_negation_and_or() {
		let q = !(Q::leaf("a", 1i64) | Q::leaf("b", 2i64));
		let condition = compile(&q, &Plain).unwrap().unwrap();
		match condition {
			FilterCondition::Not(inner) => assert!(matches!(*inner, FilterCondition::Or(_))),
			other => panic!("expected NOT, got {:?}", other),
		}
	}

	#[test]
	fn test_compile_propagates_resolver_error() {
		let result = compile(&Q::leaf("a__bogus", 1i64), &Plain);
		assert!(matches!(result, Err(Error::Field(_))));
	}

	#[rstest]
	#[case(Filter::new("n", FilterOperator::Eq, 3i64), true)]
	#[case(Filter::new("n", FilterOperator::Gt, 2i64), true)]
	#[case(Filter::new("n", FilterOperator::Lte, 2i64), false)]
	#[case(Filter::new("n", FilterOperator::In, vec![1i64, 3]), true)]
	#[case(Filter::new("n", FilterOperator::In, Vec::<i64>::new()), false)]
	#[case(Filter::new("s", FilterOperator::IContains, "ELL"), true)]
	#[case(Filter::new("s", FilterOperator::StartsWith, "he"), true)]
	#[case(Filter::new("s", FilterOperator::EndsWith, "x"), false)]
	#[case(Filter::new("s", FilterOperator::IExact, "HELLO"), true)]
	#[case(Filter::new("z", FilterOperator::IsNull, true), true)]
	#[case(Filter::new("z", FilterOperator::Eq, Value::Null), true)]
	#[case(Filter::new("z", FilterOperator::Gt, 0i64), false)]
	fn test_evaluate_single(#[case] filter: Filter, #[case] expected: bool) {
		let row = row(&[
			("n", Value::Int(3)),
			("s", Value::from("hello")),
			("z", Value::Null),
		]);
		assert_eq!(evaluate(&FilterCondition::single(filter), &row), expected);
	}

	#[test]
	fn test_in_ignores_null_items() {
		let row = row(&[("z", Value::Null)]);
		let filter = Filter::new("z", FilterOperator::In, Value::List(vec![Value::Null]));
		assert!(!evaluate(&FilterCondition::single(filter), &row));
	}

	#[test]
	fn test_not_inverts() {
		let row = row(&[("n", Value::Int(1))]);
		let condition =
			FilterCondition::not(FilterCondition::single(Filter::new("n", FilterOperator::Eq, 1i64)));
		assert!(!evaluate(&condition, &row));
	}

	#[test]
	fn test_order_values_nulls_first() {
		assert_eq!(order_values(&Value::Null, &Value::Int(1)), Ordering::Less);
		assert_eq!(order_values(&Value::Int(2), &Value::Int(1)), Ordering::Greater);
	}
}
