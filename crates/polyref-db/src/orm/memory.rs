//! In-memory storage and the innermost query layer
//!
//! [`Database`] keeps one [`MemoryTable`] per registered schema together with
//! the content type catalog the schemas' references resolve against.
//! [`MemoryQuerySet`] evaluates compiled conditions row by row.

use super::filter::{compile, evaluate, order_values};
use super::layer::{QueryLayer, RowLister, creation_params};
use super::query::{FilterCondition, Kwargs, LOOKUP_SEP, Q};
use super::record::Record;
use super::schema::{Column, ModelSchema};
use super::sql::{Dialect, select_sql};
use crate::contenttypes::{
	CONTENT_TYPE_REGISTRY, ContentType, ContentTypeRegistry, enforce_pair_consistency,
};
use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

type Row = IndexMap<String, Value>;

#[derive(Debug, Default)]
struct TableState {
	rows: Vec<Row>,
	next_id: i64,
}

/// Rows of one model, in insertion order
#[derive(Debug)]
pub struct MemoryTable {
	schema: Arc<ModelSchema>,
	state: RwLock<TableState>,
}

impl MemoryTable {
	pub fn new(schema: Arc<ModelSchema>) -> Self {
		Self {
			schema,
			state: RwLock::new(TableState::default()),
		}
	}

	pub fn schema(&self) -> &Arc<ModelSchema> {
		&self.schema
	}

	pub fn len(&self) -> usize {
		self.state.read().rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Remove every row and reset the id sequence
	pub fn truncate(&self) {
		let mut state = self.state.write();
		state.rows.clear();
		state.next_id = 0;
	}

	fn matching(&self, condition: Option<&FilterCondition>) -> Vec<Row> {
		self.state
			.read()
			.rows
			.iter()
			.filter(|row| condition.is_none_or(|c| evaluate(c, row)))
			.cloned()
			.collect()
	}
}

/// Registered tables plus the content type catalog
///
/// # Examples
///
/// ```
/// use polyref_db::kwargs;
/// use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
///
/// let db = Database::new();
/// db.register(
///     ModelSchemaBuilder::new("auth", "User")
///         .column(Column::text("username"))
///         .build()
///         .unwrap(),
/// );
///
/// let users = db.objects("auth.user").unwrap();
/// let alice = users.create(kwargs! { "username" => "alice" }).unwrap();
/// assert_eq!(alice.pk(), Some(1));
/// assert_eq!(users.count().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct Database {
	catalog: Arc<ContentTypeRegistry>,
	tables: RwLock<IndexMap<String, Arc<MemoryTable>>>,
}

impl Default for Database {
	fn default() -> Self {
		Self::new()
	}
}

impl Database {
	/// A database with its own empty catalog
	pub fn new() -> Self {
		Self::with_catalog(Arc::new(ContentTypeRegistry::new()))
	}

	pub fn with_catalog(catalog: Arc<ContentTypeRegistry>) -> Self {
		Self {
			catalog,
			tables: RwLock::new(IndexMap::new()),
		}
	}

	/// A database resolving against the process-wide catalog
	pub fn global() -> Self {
		Self::with_catalog(Arc::clone(&CONTENT_TYPE_REGISTRY))
	}

	pub fn catalog(&self) -> &Arc<ContentTypeRegistry> {
		&self.catalog
	}

	/// Create the table for `schema` and register its content type
	pub fn register(&self, schema: ModelSchema) -> Arc<ModelSchema> {
		let schema = Arc::new(schema);
		let content_type = self
			.catalog
			.get_or_create(schema.app_label(), schema.model_name());
		tracing::info!(
			model = %schema.label(),
			table = schema.table_name(),
			content_type_id = ?content_type.id,
			"registered table"
		);
		self.tables.write().insert(
			schema.label(),
			Arc::new(MemoryTable::new(Arc::clone(&schema))),
		);
		schema
	}

	pub fn table(&self, label: &str) -> Option<Arc<MemoryTable>> {
		self.tables.read().get(&label.to_lowercase()).cloned()
	}

	pub fn schema(&self, label: &str) -> Option<Arc<ModelSchema>> {
		self.table(label).map(|table| Arc::clone(table.schema()))
	}

	pub fn schemas(&self) -> Vec<Arc<ModelSchema>> {
		self.tables
			.read()
			.values()
			.map(|table| Arc::clone(table.schema()))
			.collect()
	}

	/// Queryset over every row of the model registered as `label`
	pub fn objects(&self, label: &str) -> Result<MemoryQuerySet> {
		let table = self
			.table(label)
			.ok_or_else(|| Error::NotFound(format!("no table registered for '{}'", label)))?;
		Ok(MemoryQuerySet::new(table, Arc::clone(&self.catalog)))
	}

	/// Queryset over the table storing rows of `content_type`
	pub fn objects_for(&self, content_type: &ContentType) -> Result<MemoryQuerySet> {
		self.objects(&content_type.qualified_name())
	}
}

impl RowLister for Database {
	fn schema_for(&self, content_type: &ContentType) -> Option<Arc<ModelSchema>> {
		self.schema(&content_type.qualified_name())
	}

	fn list_rows(
		&self,
		content_type: &ContentType,
		q: Q,
		ordering: &[String],
		offset: usize,
		limit: usize,
	) -> Result<Vec<Record>> {
		let fields: Vec<&str> = ordering.iter().map(String::as_str).collect();
		self.objects_for(content_type)?
			.filter_q(q)?
			.order_by(&fields)?
			.page(offset, limit)
	}

	fn count_rows(&self, content_type: &ContentType, q: Q) -> Result<usize> {
		self.objects_for(content_type)?.filter_q(q)?.count()
	}
}

/// Innermost query layer: physical columns only
#[derive(Debug, Clone)]
pub struct MemoryQuerySet {
	table: Arc<MemoryTable>,
	catalog: Arc<ContentTypeRegistry>,
	condition: Option<FilterCondition>,
	ordering: Option<Vec<String>>,
}

impl MemoryQuerySet {
	pub fn new(table: Arc<MemoryTable>, catalog: Arc<ContentTypeRegistry>) -> Self {
		Self {
			table,
			catalog,
			condition: None,
			ordering: None,
		}
	}

	/// The accumulated condition, `None` when unfiltered
	pub fn condition(&self) -> Option<&FilterCondition> {
		self.condition.as_ref()
	}

	/// Explicit ordering, else the schema's
	pub fn ordering(&self) -> Vec<String> {
		match &self.ordering {
			Some(ordering) => ordering.clone(),
			None => self.table.schema().ordering().to_vec(),
		}
	}

	/// Up to `limit` records starting at `offset`
	pub fn page(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
		Ok(self.all()?.into_iter().skip(offset).take(limit).collect())
	}

	/// Render the equivalent UPDATE statement
	pub fn update_sql(&self, kwargs: &Kwargs, dialect: Dialect) -> Result<String> {
		let assignments = self.assignments(kwargs.clone())?;
		Ok(super::sql::update_sql(
			self.table.schema(),
			&assignments,
			self.condition.as_ref(),
			dialect,
		))
	}

	fn compile_arguments(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Option<FilterCondition>> {
		let q = args
			.into_iter()
			.fold(Q::new(), |acc, q| acc & q)
			& Q::from_kwargs(kwargs);
		compile(&q, self.table.schema().as_ref())
	}

	fn with_condition(&self, condition: Option<FilterCondition>) -> Self {
		let mut next = self.clone();
		if let Some(condition) = condition {
			next.condition = Some(FilterCondition::conjoin(next.condition.take(), condition));
		}
		next
	}

	fn assignment_column(&self, key: &str) -> Result<&Column> {
		let schema = self.table.schema();
		let column = if key.contains(LOOKUP_SEP) {
			None
		} else {
			schema.column_for(key)
		};
		column.ok_or_else(|| {
			Error::field(format!(
				"{}() got an unexpected keyword argument '{}'",
				schema.object_name(),
				key
			))
		})
	}

	/// Resolve and clean column assignments
	fn assignments(&self, kwargs: Kwargs) -> Result<Row> {
		let mut assignments = Row::with_capacity(kwargs.len());
		for (key, value) in kwargs {
			let column = self.assignment_column(&key)?;
			assignments.insert(column.name.clone(), column.clean(&value)?);
		}
		Ok(assignments)
	}

	fn rows(&self) -> Vec<Row> {
		let mut rows = self.table.matching(self.condition.as_ref());
		let schema = self.table.schema();
		let ordering = self.ordering();
		if !ordering.is_empty() {
			rows.sort_by(|a, b| {
				for field in &ordering {
					let (name, descending) = match field.strip_prefix('-') {
						Some(name) => (name, true),
						None => (field.as_str(), false),
					};
					let name = if name == "pk" { schema.pk_field() } else { name };
					let null = Value::Null;
					let cmp = order_values(a.get(name).unwrap_or(&null), b.get(name).unwrap_or(&null));
					let cmp = if descending { cmp.reverse() } else { cmp };
					if cmp.is_ne() {
						return cmp;
					}
				}
				std::cmp::Ordering::Equal
			});
		}
		rows
	}

	fn to_record(&self, row: Row) -> Record {
		let schema = self.table.schema();
		Record::new(schema.app_label(), schema.model_name(), schema.pk_field(), row)
	}
}

impl QueryLayer for MemoryQuerySet {
	fn schema(&self) -> &Arc<ModelSchema> {
		self.table.schema()
	}

	fn content_types(&self) -> &Arc<ContentTypeRegistry> {
		&self.catalog
	}

	fn filter(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let condition = self.compile_arguments(args, kwargs)?;
		Ok(self.with_condition(condition))
	}

	fn exclude(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let condition = self.compile_arguments(args, kwargs)?;
		Ok(self.with_condition(condition.map(FilterCondition::not)))
	}

	fn get(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Record> {
		let mut rows = self.filter(args, kwargs)?.rows();
		let model = self.table.schema().object_name().to_string();
		match rows.len() {
			0 => Err(Error::DoesNotExist { model }),
			1 => Ok(self.to_record(rows.remove(0))),
			count => Err(Error::MultipleObjectsReturned { model, count }),
		}
	}

	fn build(&self, kwargs: Kwargs) -> Result<Record> {
		let schema = self.table.schema();
		let mut values: Row = schema
			.columns()
			.map(|column| (column.name.clone(), column.initial_value()))
			.collect();
		for (key, value) in kwargs {
			let column = self.assignment_column(&key)?;
			values.insert(column.name.clone(), column.coerce(&value)?);
		}
		Ok(self.to_record(values))
	}

	fn save(&self, record: &mut Record) -> Result<()> {
		let schema = self.table.schema();
		let pk_field = schema.pk_field();
		let mut cleaned = Row::with_capacity(record.values.len());
		for column in schema.columns() {
			cleaned.insert(column.name.clone(), column.clean(record.get(&column.name))?);
		}
		enforce_pair_consistency(schema.specs(), &mut cleaned);

		let mut state = self.table.state.write();
		match cleaned.get(pk_field).and_then(Value::as_int) {
			None => {
				state.next_id += 1;
				let id = state.next_id;
				cleaned.insert(pk_field.to_string(), Value::Int(id));
				state.rows.push(cleaned.clone());
				tracing::debug!(model = %schema.label(), pk = id, "inserted row");
			}
			Some(pk) => {
				state.next_id = state.next_id.max(pk);
				let existing = state
					.rows
					.iter_mut()
					.find(|row| row.get(pk_field).and_then(Value::as_int) == Some(pk));
				match existing {
					Some(row) => *row = cleaned.clone(),
					None => state.rows.push(cleaned.clone()),
				}
				tracing::debug!(model = %schema.label(), pk, "saved row");
			}
		}
		record.values = cleaned;
		Ok(())
	}

	fn update(&self, kwargs: Kwargs) -> Result<usize> {
		let assignments = self.assignments(kwargs)?;
		let mut state = self.table.state.write();
		let mut count = 0;
		for row in state.rows.iter_mut() {
			if self.condition.as_ref().is_none_or(|c| evaluate(c, row)) {
				for (column, value) in &assignments {
					row.insert(column.clone(), value.clone());
				}
				count += 1;
			}
		}
		tracing::debug!(model = %self.table.schema().label(), count, "updated rows");
		Ok(count)
	}

	fn get_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		match self.get(Vec::new(), kwargs.clone()) {
			Ok(record) => Ok((record, false)),
			Err(Error::DoesNotExist { .. }) => {
				let record = self.create(creation_params(&kwargs, defaults))?;
				Ok((record, true))
			}
			Err(e) => Err(e),
		}
	}

	fn update_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		match self.get(Vec::new(), kwargs.clone()) {
			Ok(mut record) => {
				for (key, value) in defaults {
					let column = self.assignment_column(&key)?;
					record.set(column.name.clone(), value);
				}
				self.save(&mut record)?;
				Ok((record, false))
			}
			Err(Error::DoesNotExist { .. }) => {
				let record = self.create(creation_params(&kwargs, defaults))?;
				Ok((record, true))
			}
			Err(e) => Err(e),
		}
	}

	fn order_by(&self, fields: &[&str]) -> Result<Self> {
		let schema = self.table.schema();
		for field in fields {
			let name = field.strip_prefix('-').unwrap_or(field);
			if schema.column_for(name).is_none() {
				return Err(schema.unknown_field(name));
			}
		}
		let mut next = self.clone();
		next.ordering = Some(fields.iter().map(|f| f.to_string()).collect());
		Ok(next)
	}

	fn all(&self) -> Result<Vec<Record>> {
		Ok(self.rows().into_iter().map(|row| self.to_record(row)).collect())
	}

	fn count(&self) -> Result<usize> {
		Ok(self.table.matching(self.condition.as_ref()).len())
	}

	fn to_sql(&self, dialect: Dialect) -> String {
		select_sql(
			self.table.schema(),
			self.condition.as_ref(),
			&self.ordering(),
			dialect,
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::kwargs;
	use crate::orm::ModelSchemaBuilder;
	use rstest::{fixture, rstest};

	#[fixture]
	fn db() -> Database {
		let db = Database::new();
		db.register(
			ModelSchemaBuilder::new("blog", "Post")
				.column(Column::text("title").max_length(20))
				.column(Column::positive_integer("rank").null(true))
				.ordering(&["title"])
				.build()
				.unwrap(),
		);
		db
	}

	fn titles(records: &[Record]) -> Vec<String> {
		records
			.iter()
			.map(|r| r.get("title").to_string())
			.collect()
	}

	#[rstest]
	fn test_create_assigns_ids_and_content_type(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		let a = posts.create(kwargs! { "title" => "b" }).unwrap();
		let b = posts.create(kwargs! { "title" => "a" }).unwrap();
		assert_eq!((a.pk(), b.pk()), (Some(1), Some(2)));
		assert!(db.catalog().get("blog", "post").is_some());
		assert_eq!(titles(&posts.all().unwrap()), vec!["a", "b"]);
	}

	#[rstest]
	fn test_unknown_keyword_is_field_error(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		assert!(matches!(
			posts.create(kwargs! { "nope" => 1i64 }),
			Err(Error::Field(_))
		));
		assert!(matches!(
			posts.filter_kwargs(kwargs! { "nope" => 1i64 }),
			Err(Error::Field(_))
		));
	}

	#[rstest]
	fn test_clean_rejects_invalid_values(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		assert!(matches!(
			posts.create(kwargs! { "title" => "x", "rank" => -1i64 }),
			Err(Error::Value(_))
		));
		assert!(matches!(
			posts.create(kwargs! { "title" => "x".repeat(21) }),
			Err(Error::Value(_))
		));
		assert_eq!(posts.count().unwrap(), 0);
	}

	#[rstest]
	fn test_get_errors(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		assert!(matches!(
			posts.get(vec![], kwargs! { "title" => "x" }),
			Err(Error::DoesNotExist { .. })
		));
		posts.create(kwargs! { "title" => "x" }).unwrap();
		posts.create(kwargs! { "title" => "x" }).unwrap();
		assert_eq!(
			posts.get(vec![], kwargs! { "title" => "x" }).unwrap_err(),
			Error::MultipleObjectsReturned {
				model: "Post".into(),
				count: 2,
			}
		);
	}

	#[rstest]
	fn test_filter_exclude_and_null_semantics(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		posts.create(kwargs! { "title" => "a", "rank" => 1i64 }).unwrap();
		posts.create(kwargs! { "title" => "b" }).unwrap();

		let ranked = posts.filter_kwargs(kwargs! { "rank__gte" => 1i64 }).unwrap();
		assert_eq!(titles(&ranked.all().unwrap()), vec!["a"]);

		let excluded = posts.exclude(vec![], kwargs! { "rank" => 1i64 }).unwrap();
		assert_eq!(titles(&excluded.all().unwrap()), vec!["b"]);

		let either = posts
			.filter_q(Q::leaf("title", "a") | Q::leaf("rank__isnull", true))
			.unwrap();
		assert_eq!(either.count().unwrap(), 2);
	}

	#[rstest]
	fn test_get_or_create_and_update_or_create(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		let (first, created) = posts
			.get_or_create(kwargs! { "title" => "a" }, kwargs! { "rank" => 3i64 })
			.unwrap();
		assert!(created);
		assert_eq!(first.get("rank"), &Value::Int(3));

		let (again, created) = posts
			.get_or_create(kwargs! { "title" => "a" }, kwargs! { "rank" => 9i64 })
			.unwrap();
		assert!(!created);
		assert_eq!(again.pk(), first.pk());

		let (updated, created) = posts
			.update_or_create(kwargs! { "title" => "a" }, kwargs! { "rank" => 9i64 })
			.unwrap();
		assert!(!created);
		assert_eq!(updated.get("rank"), &Value::Int(9));
		assert_eq!(posts.count().unwrap(), 1);
	}

	#[rstest]
	fn test_update_and_ordering(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		for title in ["c", "a", "b"] {
			posts.create(kwargs! { "title" => title }).unwrap();
		}
		let count = posts
			.filter_kwargs(kwargs! { "title__in" => vec!["a", "b"] })
			.unwrap()
			.update(kwargs! { "rank" => 5i64 })
			.unwrap();
		assert_eq!(count, 2);

		let ordered = posts.order_by(&["-pk"]).unwrap().all().unwrap();
		assert_eq!(titles(&ordered), vec!["b", "a", "c"]);
		assert_eq!(titles(&posts.page(1, 5).unwrap()), vec!["b", "c"]);
		assert!(posts.order_by(&["missing"]).is_err());
	}

	#[rstest]
	fn test_save_updates_existing_row(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		let mut record = posts.create(kwargs! { "title" => "a" }).unwrap();
		record.set("title", "z");
		posts.save(&mut record).unwrap();
		assert_eq!(posts.count().unwrap(), 1);
		assert_eq!(titles(&posts.all().unwrap()), vec!["z"]);
	}

	#[rstest]
	fn test_truncate_resets_id_sequence(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		posts.create(kwargs! { "title" => "a" }).unwrap();
		posts.create(kwargs! { "title" => "b" }).unwrap();
		let table = db.table("blog.post").unwrap();
		assert_eq!(table.len(), 2);

		table.truncate();

		assert!(table.is_empty());
		let again = posts.create(kwargs! { "title" => "c" }).unwrap();
		assert_eq!(again.pk(), Some(1));
	}

	#[rstest]
	fn test_row_listing(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		for title in ["alpha", "beta", "alphabet"] {
			posts.create(kwargs! { "title" => title }).unwrap();
		}
		let content_type = db.catalog().get("blog", "post").unwrap();
		let rows = db
			.list_rows(
				&content_type,
				Q::leaf("title__icontains", "ALPHA"),
				&["-title".to_string()],
				0,
				10,
			)
			.unwrap();
		assert_eq!(titles(&rows), vec!["alphabet", "alpha"]);
		assert!(db.schema_for(&ContentType::new("shop", "order")).is_none());
	}

	#[rstest]
	fn test_to_sql(db: Database) {
		let posts = db.objects("blog.post").unwrap();
		let sql = posts
			.filter_kwargs(kwargs! { "title" => "a" })
			.unwrap()
			.to_sql(Dialect::Postgres);
		assert!(sql.contains(r#"FROM "blog_post""#));
		assert!(sql.contains(r#"ORDER BY "title" ASC"#));
	}
}
