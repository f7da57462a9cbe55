//! The rewriting query layer
//!
//! [`RewritingQuerySet`] is the outermost layer of a queryset stack. It turns
//! every logical reference lookup and assignment into physical column
//! conditions with a [`Rewriter`] and delegates the result to the layer it
//! wraps, typically a
//! [`PolymorphicQuerySet`](crate::orm::PolymorphicQuerySet) over a
//! [`MemoryQuerySet`](crate::orm::MemoryQuerySet).

use super::contenttypes::ContentTypeRegistry;
use super::rewrite::{Rewriter, enforce_pair_consistency};
use crate::error::Result;
use crate::orm::{Dialect, Kwargs, ModelSchema, PolymorphicQuerySet, Q, QueryLayer, Record};
use std::sync::Arc;

/// Query layer accepting logical generic reference names
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::{GenericReferenceField, RewritingQuerySet};
/// use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
/// use polyref_db::{Value, kwargs};
///
/// let db = Database::new();
/// db.register(ModelSchemaBuilder::new("auth", "User").build().unwrap());
/// db.register(
///     ModelSchemaBuilder::new("vault", "Credential")
///         .column(Column::text("label"))
///         .generic_reference(GenericReferenceField::new("owner").null(true))
///         .build()
///         .unwrap(),
/// );
///
/// let user = db.objects("auth.user").unwrap().create(kwargs! {}).unwrap();
/// let credentials = RewritingQuerySet::new(db.objects("vault.credential").unwrap());
/// let created = credentials
///     .create(kwargs! { "label" => "ssh", "owner" => &user })
///     .unwrap();
/// assert_eq!(created.get("owner_id"), &Value::Int(1));
///
/// let found = credentials.get(vec![], kwargs! { "owner" => &user }).unwrap();
/// assert_eq!(found.pk(), created.pk());
/// ```
#[derive(Debug, Clone)]
pub struct RewritingQuerySet<L> {
	inner: L,
}

impl<L: QueryLayer> RewritingQuerySet<L> {
	pub fn new(inner: L) -> Self {
		Self { inner }
	}

	pub fn inner(&self) -> &L {
		&self.inner
	}

	pub fn into_inner(self) -> L {
		self.inner
	}

	fn rewriter(&self) -> Rewriter<'_> {
		Rewriter::new(self.inner.schema(), self.inner.content_types())
	}

	fn wrap(&self, inner: L) -> Self {
		Self { inner }
	}

	fn narrowed(&self, q: Q) -> Result<L> {
		if q.is_empty() {
			Ok(self.inner.clone())
		} else {
			self.inner.filter_q(q)
		}
	}

	/// Lookup expression, remaining kwargs and creation assignments
	fn split_lookup_arguments(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Q, Kwargs, Kwargs)> {
		let rewriter = self.rewriter();
		let mut assignments = rewriter.exact_assignments(&kwargs)?;
		let (q, rest) = rewriter.rewrite_filters(kwargs)?;
		assignments.extend(rewriter.rewrite_payload(defaults)?);
		Ok((q, rest, assignments))
	}
}

impl<I: QueryLayer> RewritingQuerySet<PolymorphicQuerySet<I>> {
	/// Rows whose type is one of `models` or below them
	pub fn instance_of(&self, models: &[&str]) -> Result<Self> {
		Ok(self.wrap(self.inner.instance_of(models)?))
	}

	/// Rows whose type is none of `models` nor below them
	pub fn not_instance_of(&self, models: &[&str]) -> Result<Self> {
		Ok(self.wrap(self.inner.not_instance_of(models)?))
	}
}

impl<L: QueryLayer> QueryLayer for RewritingQuerySet<L> {
	fn schema(&self) -> &Arc<ModelSchema> {
		self.inner.schema()
	}

	fn content_types(&self) -> &Arc<ContentTypeRegistry> {
		self.inner.content_types()
	}

	fn filter(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let (args, rest) = self.rewriter().rewrite_arguments(args, kwargs)?;
		tracing::debug!(model = %self.schema().label(), "delegating filter");
		Ok(self.wrap(self.inner.filter(args, rest)?))
	}

	fn exclude(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let (args, rest) = self.rewriter().rewrite_arguments(args, kwargs)?;
		tracing::debug!(model = %self.schema().label(), "delegating exclude");
		Ok(self.wrap(self.inner.exclude(args, rest)?))
	}

	fn get(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Record> {
		let (args, rest) = self.rewriter().rewrite_arguments(args, kwargs)?;
		self.inner.get(args, rest)
	}

	fn build(&self, kwargs: Kwargs) -> Result<Record> {
		let payload = self.rewriter().rewrite_payload(kwargs)?;
		self.inner.build(payload)
	}

	fn save(&self, record: &mut Record) -> Result<()> {
		enforce_pair_consistency(self.schema().specs(), &mut record.values);
		self.inner.save(record)
	}

	fn update(&self, kwargs: Kwargs) -> Result<usize> {
		let payload = self.rewriter().rewrite_payload(kwargs)?;
		tracing::debug!(model = %self.schema().label(), "delegating update");
		self.inner.update(payload)
	}

	fn get_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		let (q, rest, assignments) = self.split_lookup_arguments(kwargs, defaults)?;
		tracing::debug!(model = %self.schema().label(), "delegating get_or_create");
		self.narrowed(q)?.get_or_create(rest, assignments)
	}

	fn update_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		let (q, rest, assignments) = self.split_lookup_arguments(kwargs, defaults)?;
		tracing::debug!(model = %self.schema().label(), "delegating update_or_create");
		self.narrowed(q)?.update_or_create(rest, assignments)
	}

	fn order_by(&self, fields: &[&str]) -> Result<Self> {
		Ok(self.wrap(self.inner.order_by(fields)?))
	}

	fn all(&self) -> Result<Vec<Record>> {
		self.inner.all()
	}

	fn count(&self) -> Result<usize> {
		self.inner.count()
	}

	fn first(&self) -> Result<Option<Record>> {
		self.inner.first()
	}

	fn exists(&self) -> Result<bool> {
		self.inner.exists()
	}

	fn to_sql(&self, dialect: Dialect) -> String {
		self.inner.to_sql(dialect)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contenttypes::GenericReferenceField;
	use crate::error::Error;
	use crate::kwargs;
	use crate::orm::{Column, Database, MemoryQuerySet, ModelSchemaBuilder};
	use crate::value::Value;
	use rstest::{fixture, rstest};

	struct Vault {
		db: Database,
		user: Record,
		group: Record,
	}

	impl Vault {
		fn credentials(&self) -> RewritingQuerySet<MemoryQuerySet> {
			RewritingQuerySet::new(self.db.objects("vault.credential").unwrap())
		}
	}

	#[fixture]
	fn vault() -> Vault {
		let db = Database::new();
		db.register(ModelSchemaBuilder::new("auth", "User").build().unwrap());
		db.register(ModelSchemaBuilder::new("auth", "Group").build().unwrap());
		db.register(
			ModelSchemaBuilder::new("vault", "Credential")
				.column(Column::text("label"))
				.generic_reference(GenericReferenceField::new("owner").null(true))
				.build()
				.unwrap(),
		);
		let user = db.objects("auth.user").unwrap().create(kwargs! {}).unwrap();
		let group = db.objects("auth.group").unwrap().create(kwargs! {}).unwrap();
		Vault { db, user, group }
	}

	#[rstest]
	fn test_create_writes_both_columns(vault: Vault) {
		let created = vault
			.credentials()
			.create(kwargs! { "label" => "a", "owner" => &vault.user })
			.unwrap();
		assert_eq!(created.get("owner_type"), &Value::Int(1));
		assert_eq!(created.get("owner_id"), &Value::Int(1));
		assert!(!created.values.contains_key("owner"));
	}

	#[rstest]
	fn test_filter_by_logical_name(vault: Vault) {
		let credentials = vault.credentials();
		credentials
			.create(kwargs! { "label" => "user", "owner" => &vault.user })
			.unwrap();
		credentials
			.create(kwargs! { "label" => "group", "owner" => &vault.group })
			.unwrap();
		credentials.create(kwargs! { "label" => "nobody" }).unwrap();

		let mine = credentials
			.filter_kwargs(kwargs! { "owner" => &vault.user })
			.unwrap();
		assert_eq!(mine.count().unwrap(), 1);

		let some = credentials
			.filter_kwargs(kwargs! { "owner__in" => vec![Value::from(&vault.group), Value::Null] })
			.unwrap()
			.all()
			.unwrap();
		let labels: Vec<String> = some.iter().map(|r| r.get("label").to_string()).collect();
		assert_eq!(labels, vec!["group", "nobody"]);

		let orphans = credentials
			.exclude(vec![], kwargs! { "owner__isnull" => true })
			.unwrap();
		assert_eq!(orphans.count().unwrap(), 2);

		let none = credentials
			.filter_kwargs(kwargs! { "owner__in" => Vec::<Value>::new() })
			.unwrap();
		assert!(!none.exists().unwrap());
	}

	#[rstest]
	fn test_expression_arguments(vault: Vault) {
		let credentials = vault.credentials();
		credentials
			.create(kwargs! { "label" => "a", "owner" => &vault.user })
			.unwrap();
		credentials
			.create(kwargs! { "label" => "b", "owner" => &vault.group })
			.unwrap();
		let either = credentials
			.filter(
				vec![Q::leaf("owner", &vault.group) | Q::leaf("label", "a")],
				Kwargs::new(),
			)
			.unwrap();
		assert_eq!(either.count().unwrap(), 2);
	}

	#[rstest]
	fn test_get_or_create_carries_reference(vault: Vault) {
		let credentials = vault.credentials();
		let (created, is_new) = credentials
			.get_or_create(
				kwargs! { "owner" => &vault.user, "label" => "ssh" },
				Kwargs::new(),
			)
			.unwrap();
		assert!(is_new);
		assert_eq!(created.get("owner_id"), &Value::Int(1));
		assert_eq!(created.get("label"), &Value::from("ssh"));

		let (found, is_new) = credentials
			.get_or_create(kwargs! { "owner" => &vault.user, "label" => "ssh" }, Kwargs::new())
			.unwrap();
		assert!(!is_new);
		assert_eq!(found.pk(), created.pk());
	}

	#[rstest]
	fn test_update_or_create_reassigns(vault: Vault) {
		let credentials = vault.credentials();
		credentials
			.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
			.unwrap();
		let (updated, created) = credentials
			.update_or_create(kwargs! { "label" => "ssh" }, kwargs! { "owner" => &vault.group })
			.unwrap();
		assert!(!created);
		assert_eq!(updated.get("owner_type"), &Value::Int(2));
		assert_eq!(
			credentials
				.filter_kwargs(kwargs! { "owner" => &vault.group })
				.unwrap()
				.count()
				.unwrap(),
			1
		);
	}

	#[rstest]
	fn test_update_with_logical_name(vault: Vault) {
		let credentials = vault.credentials();
		credentials
			.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
			.unwrap();
		let count = credentials
			.filter_kwargs(kwargs! { "owner" => &vault.user })
			.unwrap()
			.update(kwargs! { "owner" => Value::Null })
			.unwrap();
		assert_eq!(count, 1);
		assert!(
			credentials
				.filter_kwargs(kwargs! { "owner__isnull" => true })
				.unwrap()
				.exists()
				.unwrap()
		);
	}

	#[rstest]
	fn test_save_repairs_partial_pair(vault: Vault) {
		let credentials = vault.credentials();
		let mut record = credentials
			.create(kwargs! { "label" => "ssh", "owner" => &vault.user })
			.unwrap();
		record.set("owner_id", Value::Null);
		credentials.save(&mut record).unwrap();
		assert_eq!(record.get("owner_type"), &Value::Null);
		assert_eq!(record.get("owner_id"), &Value::Null);
	}

	#[rstest]
	fn test_get_or_create_repairs_partial_defaults(vault: Vault) {
		let credentials = vault.credentials();

		let (created, was_created) = credentials
			.get_or_create(kwargs! { "label" => "x" }, kwargs! { "owner_id" => 5i64 })
			.unwrap();

		assert!(was_created);
		assert_eq!(created.get("owner_type"), &Value::Null);
		assert_eq!(created.get("owner_id"), &Value::Null);
		let stored = credentials.into_inner().get(vec![], kwargs! { "label" => "x" }).unwrap();
		assert_eq!(stored.get("owner_id"), &Value::Null);
	}

	#[rstest]
	fn test_update_or_create_repairs_partial_defaults(vault: Vault) {
		let credentials = vault.credentials();
		credentials
			.create(kwargs! { "label" => "y", "owner" => &vault.user })
			.unwrap();

		let (updated, was_created) = credentials
			.update_or_create(kwargs! { "label" => "y" }, kwargs! { "owner_id" => Value::Null })
			.unwrap();

		assert!(!was_created);
		assert_eq!(updated.get("owner_type"), &Value::Null);
		let stored = credentials.get(vec![], kwargs! { "label" => "y" }).unwrap();
		assert_eq!(stored.get("owner_type"), &Value::Null);
		assert_eq!(stored.get("owner_id"), &Value::Null);
	}

	#[rstest]
	fn test_errors_surface(vault: Vault) {
		let credentials = vault.credentials();
		assert!(matches!(
			credentials.filter_kwargs(kwargs! { "owner__startswith" => "x" }),
			Err(Error::NotImplemented { .. })
		));
		assert!(matches!(
			credentials.create(kwargs! { "owner" => Value::pair(1i64, Value::Null) }),
			Err(Error::Value(_))
		));
		assert!(matches!(
			credentials.filter_kwargs(kwargs! { "owner" => Value::pair(99i64, 1i64) }),
			Err(Error::NotFound(_))
		));
	}

	#[rstest]
	fn test_to_sql_uses_physical_columns(vault: Vault) {
		let sql = vault
			.credentials()
			.filter_kwargs(kwargs! { "owner" => &vault.user })
			.unwrap()
			.to_sql(Dialect::Postgres);
		assert!(sql.contains(r#""owner_type" = 1"#));
		assert!(sql.contains(r#""owner_id" = 1"#));
		assert!(!sql.contains(r#""owner""#));
	}
}
