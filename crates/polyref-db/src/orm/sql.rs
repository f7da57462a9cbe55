//! SQL rendering of compiled conditions through sea-query

use super::query::{Filter, FilterCondition, FilterOperator};
use super::schema::ModelSchema;
use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use sea_query::{
	Alias, Asterisk, Condition, Expr, ExprTrait, Func, MysqlQueryBuilder, Order,
	PostgresQueryBuilder, Query, SqliteQueryBuilder,
};

/// Target SQL dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
	#[default]
	Postgres,
	MySql,
	Sqlite,
}

/// Convert a stored value to a sea-query value
///
/// Content types and instances collapse to their ids; containers are
/// rendered as JSON text.
fn to_sea_value(value: &Value) -> sea_query::Value {
	match value {
		Value::Null => sea_query::Value::Int(None),
		Value::Bool(b) => sea_query::Value::Bool(Some(*b)),
		Value::Int(i) => sea_query::Value::BigInt(Some(*i)),
		Value::Float(f) => sea_query::Value::Double(Some(*f)),
		Value::String(s) => sea_query::Value::String(Some(s.clone())),
		Value::ContentType(ct) => sea_query::Value::BigInt(ct.id),
		Value::Instance(instance) => sea_query::Value::BigInt(instance.pk),
		Value::List(_) | Value::Tuple(_) | Value::Map(_) => {
			sea_query::Value::String(serde_json::to_string(value).ok())
		}
	}
}

fn text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Build an expression from a single filter
fn build_single_filter_expr(filter: &Filter) -> sea_query::SimpleExpr {
	let col = Expr::col(Alias::new(&filter.field));
	let lower_col = || Expr::expr(Func::lower(Expr::col(Alias::new(&filter.field))));

	match (&filter.operator, &filter.value) {
		(FilterOperator::Eq, Value::Null) => col.is_null(),
		(FilterOperator::Eq, v) => col.eq(to_sea_value(v)),
		(FilterOperator::Gt, v) => col.gt(to_sea_value(v)),
		(FilterOperator::Gte, v) => col.gte(to_sea_value(v)),
		(FilterOperator::Lt, v) => col.lt(to_sea_value(v)),
		(FilterOperator::Lte, v) => col.lte(to_sea_value(v)),
		(FilterOperator::IExact, v) => lower_col().eq(text(v).to_lowercase()),
		(FilterOperator::Contains, v) => col.like(format!("%{}%", text(v))),
		(FilterOperator::IContains, v) => {
			lower_col().like(format!("%{}%", text(v).to_lowercase()))
		}
		(FilterOperator::StartsWith, v) => col.like(format!("{}%", text(v))),
		(FilterOperator::IStartsWith, v) => lower_col().like(format!("{}%", text(v).to_lowercase())),
		(FilterOperator::EndsWith, v) => col.like(format!("%{}", text(v))),
		(FilterOperator::In, Value::List(items) | Value::Tuple(items)) => {
			let values: Vec<sea_query::Value> = items
				.iter()
				.filter(|item| !item.is_null())
				.map(to_sea_value)
				.collect();
			if values.is_empty() {
				Expr::cust("1 = 0")
			} else {
				col.is_in(values)
			}
		}
		(FilterOperator::In, v) => col.is_in(vec![to_sea_value(v)]),
		(FilterOperator::IsNull, v) if v.is_truthy() => col.is_null(),
		(FilterOperator::IsNull, _) => col.is_not_null(),
	}
}

/// Build a sea-query [`Condition`] from a compiled condition tree
pub fn build_condition(condition: &FilterCondition) -> Condition {
	match condition {
		FilterCondition::Single(filter) => Condition::all().add(build_single_filter_expr(filter)),
		FilterCondition::And(conditions) => conditions
			.iter()
			.fold(Condition::all(), |acc, c| acc.add(build_condition(c))),
		FilterCondition::Or(conditions) => conditions
			.iter()
			.fold(Condition::any(), |acc, c| acc.add(build_condition(c))),
		FilterCondition::Not(inner) => build_condition(inner).not(),
	}
}

fn order_column<'a>(schema: &'a ModelSchema, field: &'a str) -> (&'a str, Order) {
	let (name, order) = match field.strip_prefix('-') {
		Some(stripped) => (stripped, Order::Desc),
		None => (field, Order::Asc),
	};
	let name = if name == "pk" { schema.pk_field() } else { name };
	(name, order)
}

/// Render `SELECT *` for a model with an optional condition and ordering
///
/// # Examples
///
/// ```
/// use polyref_db::orm::{Column, Dialect, FilterCondition, Filter, FilterOperator, ModelSchemaBuilder, select_sql};
///
/// let schema = ModelSchemaBuilder::new("vault", "Credential")
///     .column(Column::text("label"))
///     .build()
///     .unwrap();
/// let condition = FilterCondition::single(Filter::new("label", FilterOperator::Eq, "x"));
/// let sql = select_sql(&schema, Some(&condition), &["-pk".to_string()], Dialect::Postgres);
/// assert!(sql.starts_with(r#"SELECT * FROM "vault_credential""#));
/// assert!(sql.contains(r#""label" = 'x'"#));
/// assert!(sql.contains(r#"ORDER BY "id" DESC"#));
/// ```
pub fn select_sql(
	schema: &ModelSchema,
	condition: Option<&FilterCondition>,
	ordering: &[String],
	dialect: Dialect,
) -> String {
	let mut query = Query::select()
		.column(Asterisk)
		.from(Alias::new(schema.table_name()))
		.to_owned();

	if let Some(condition) = condition {
		query.cond_where(build_condition(condition));
	}
	for field in ordering {
		let (name, order) = order_column(schema, field);
		query.order_by(Alias::new(name), order);
	}

	match dialect {
		Dialect::Postgres => query.to_string(PostgresQueryBuilder),
		Dialect::MySql => query.to_string(MysqlQueryBuilder),
		Dialect::Sqlite => query.to_string(SqliteQueryBuilder),
	}
}

/// Render an INSERT of one row
pub fn insert_sql(
	schema: &ModelSchema,
	values: &IndexMap<String, Value>,
	dialect: Dialect,
) -> Result<String> {
	let mut query = Query::insert()
		.into_table(Alias::new(schema.table_name()))
		.to_owned();

	let columns: Vec<Alias> = values.keys().map(Alias::new).collect();
	let exprs: Vec<sea_query::SimpleExpr> = values.values().map(|v| to_sea_value(v).into()).collect();
	query.columns(columns);
	query
		.values(exprs)
		.map_err(|e| Error::value(format!("cannot render insert: {}", e)))?;

	Ok(match dialect {
		Dialect::Postgres => query.to_string(PostgresQueryBuilder),
		Dialect::MySql => query.to_string(MysqlQueryBuilder),
		Dialect::Sqlite => query.to_string(SqliteQueryBuilder),
	})
}

/// Render an UPDATE of the rows matching `condition`
pub fn update_sql(
	schema: &ModelSchema,
	assignments: &IndexMap<String, Value>,
	condition: Option<&FilterCondition>,
	dialect: Dialect,
) -> String {
	let mut query = Query::update()
		.table(Alias::new(schema.table_name()))
		.to_owned();

	for (column, value) in assignments {
		query.value(Alias::new(column), to_sea_value(value));
	}
	if let Some(condition) = condition {
		query.cond_where(build_condition(condition));
	}

	match dialect {
		Dialect::Postgres => query.to_string(PostgresQueryBuilder),
		Dialect::MySql => query.to_string(MysqlQueryBuilder),
		Dialect::Sqlite => query.to_string(SqliteQueryBuilder),
	}
}
