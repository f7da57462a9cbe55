//! # Inheritance polymorphism
//!
//! Single-table inheritance in the style of django-polymorphic: every row of
//! a hierarchy lives in the base model's table and records its concrete type
//! in the `polymorphic_ctype` column.
//!
//! [`PolymorphicQuerySet`] wraps another [`QueryLayer`] and
//!
//! - translates `Child___field` lookups into `field` plus a restriction to
//!   rows whose type is `Child` or one of its descendants,
//! - offers [`instance_of`](PolymorphicQuerySet::instance_of) and
//!   [`not_instance_of`](PolymorphicQuerySet::not_instance_of),
//! - stamps created rows with its own content type,
//! - downcasts results: each record is relabelled with its stored type.

use super::layer::{QueryLayer, creation_params};
use super::query::{Kwargs, Q, QChild, split_lookup};
use super::record::Record;
use super::schema::{ModelSchema, POLYMORPHIC_CTYPE_COLUMN};
use super::sql::Dialect;
use crate::contenttypes::rewrite::{INHERITANCE_SEP, Rewriter, split_inheritance_prefix};
use crate::contenttypes::{ContentType, ContentTypeRegistry};
use crate::error::{ConfigurationError, Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// One model of an inheritance hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicIdentity {
	/// Model name as used in `Model___field` lookups
	object_name: String,

	/// Stored content type; carries an id once registered
	content_type: ContentType,

	/// Object name of the parent model, `None` for the base
	parent: Option<String>,
}

impl PolymorphicIdentity {
	/// Create a new polymorphic identity
	///
	/// # Examples
	///
	/// ```
	/// use polyref_db::contenttypes::ContentType;
	/// use polyref_db::orm::polymorphic::PolymorphicIdentity;
	///
	/// let identity = PolymorphicIdentity::new("ArtProject", ContentType::new("projects", "artproject").with_id(3))
	///     .with_parent("Project");
	/// assert_eq!(identity.object_name(), "ArtProject");
	/// assert_eq!(identity.parent(), Some("Project"));
	/// assert_eq!(identity.content_type_id(), Some(3));
	/// ```
	pub fn new(object_name: impl Into<String>, content_type: ContentType) -> Self {
		Self {
			object_name: object_name.into(),
			content_type,
			parent: None,
		}
	}

	pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	pub fn object_name(&self) -> &str {
		&self.object_name
	}

	pub fn content_type(&self) -> &ContentType {
		&self.content_type
	}

	pub fn content_type_id(&self) -> Option<i64> {
		self.content_type.id
	}

	pub fn parent(&self) -> Option<&str> {
		self.parent.as_deref()
	}
}

/// The models of one hierarchy, keyed by object name
#[derive(Debug, Default)]
pub struct PolymorphicRegistry {
	identities: IndexMap<String, PolymorphicIdentity>,
}

impl PolymorphicRegistry {
	/// Create a new registry
	///
	/// # Examples
	///
	/// ```
	/// use polyref_db::orm::polymorphic::PolymorphicRegistry;
	///
	/// let registry = PolymorphicRegistry::new();
	/// assert_eq!(registry.count(), 0);
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Register an identity
	///
	/// The content type must carry an id and the parent, if any, must already
	/// be registered.
	pub fn register(
		&mut self,
		identity: PolymorphicIdentity,
	) -> std::result::Result<(), ConfigurationError> {
		if identity.content_type_id().is_none() {
			return Err(ConfigurationError::Polymorphic(format!(
				"content type of '{}' has not been saved",
				identity.object_name()
			)));
		}
		if let Some(parent) = identity.parent()
			&& !self.identities.contains_key(parent)
		{
			return Err(ConfigurationError::Polymorphic(format!(
				"parent '{}' of '{}' is not registered",
				parent,
				identity.object_name()
			)));
		}
		tracing::debug!(
			model = identity.object_name(),
			parent = ?identity.parent(),
			"registered polymorphic identity"
		);
		self.identities
			.insert(identity.object_name().to_string(), identity);
		Ok(())
	}

	/// Register a model, creating its content type in `catalog`
	///
	/// # Examples
	///
	/// ```
	/// use polyref_db::contenttypes::ContentTypeRegistry;
	/// use polyref_db::orm::polymorphic::PolymorphicRegistry;
	///
	/// let catalog = ContentTypeRegistry::new();
	/// let mut registry = PolymorphicRegistry::new();
	/// registry.register_model(&catalog, "projects", "Project", None).unwrap();
	/// registry.register_model(&catalog, "projects", "ArtProject", Some("Project")).unwrap();
	///
	/// let ids = registry.descendant_ids("Project").unwrap();
	/// assert_eq!(ids.len(), 2);
	/// ```
	pub fn register_model(
		&mut self,
		catalog: &ContentTypeRegistry,
		app_label: &str,
		object_name: &str,
		parent: Option<&str>,
	) -> std::result::Result<ContentType, ConfigurationError> {
		let content_type = catalog.get_or_create(app_label, &object_name.to_lowercase());
		let mut identity = PolymorphicIdentity::new(object_name, content_type.clone());
		if let Some(parent) = parent {
			identity = identity.with_parent(parent);
		}
		self.register(identity)?;
		Ok(content_type)
	}

	pub fn get(&self, object_name: &str) -> Option<&PolymorphicIdentity> {
		self.identities.get(object_name)
	}

	/// Content type ids of `object_name` and every model below it
	pub fn descendant_ids(&self, object_name: &str) -> Option<Vec<i64>> {
		let root = self.get(object_name)?;
		let mut ids = Vec::new();
		let mut pending = vec![root.object_name()];
		while let Some(current) = pending.pop() {
			if let Some(id) = self.get(current).and_then(PolymorphicIdentity::content_type_id) {
				ids.push(id);
			}
			pending.extend(
				self.identities
					.values()
					.filter(|identity| identity.parent() == Some(current))
					.map(PolymorphicIdentity::object_name),
			);
		}
		ids.sort_unstable();
		Some(ids)
	}

	/// Get all registered object names
	pub fn object_names(&self) -> Vec<&str> {
		self.identities.keys().map(String::as_str).collect()
	}

	pub fn count(&self) -> usize {
		self.identities.len()
	}

	pub fn clear(&mut self) {
		self.identities.clear();
	}
}

/// Query layer for one model of a hierarchy
///
/// # Examples
///
/// ```
/// use polyref_db::kwargs;
/// use polyref_db::orm::polymorphic::{PolymorphicQuerySet, PolymorphicRegistry};
/// use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
/// use std::sync::Arc;
///
/// let db = Database::new();
/// db.register(
///     ModelSchemaBuilder::new("projects", "Project")
///         .column(Column::text("topic"))
///         .column(Column::text("artist").null(true))
///         .polymorphic()
///         .build()
///         .unwrap(),
/// );
/// let mut registry = PolymorphicRegistry::new();
/// registry.register_model(db.catalog(), "projects", "Project", None).unwrap();
/// registry.register_model(db.catalog(), "projects", "ArtProject", Some("Project")).unwrap();
/// let registry = Arc::new(registry);
///
/// let base = db.objects("projects.project").unwrap();
/// let art = PolymorphicQuerySet::new(base.clone(), Arc::clone(&registry), "ArtProject").unwrap();
/// art.create(kwargs! { "topic" => "Painting", "artist" => "T. Turner" }).unwrap();
///
/// let projects = PolymorphicQuerySet::new(base, registry, "Project").unwrap();
/// projects.create(kwargs! { "topic" => "Plain" }).unwrap();
///
/// let found = projects
///     .filter_kwargs(kwargs! { "ArtProject___artist" => "T. Turner" })
///     .unwrap()
///     .all()
///     .unwrap();
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].model, "artproject");
/// ```
#[derive(Debug, Clone)]
pub struct PolymorphicQuerySet<L> {
	inner: L,
	registry: Arc<PolymorphicRegistry>,
	identity: PolymorphicIdentity,
}

impl<L: QueryLayer> PolymorphicQuerySet<L> {
	/// Wrap `inner` as the queryset of `object_name`
	///
	/// A model below the base sees only rows of its own type and its
	/// descendants.
	pub fn new(inner: L, registry: Arc<PolymorphicRegistry>, object_name: &str) -> Result<Self> {
		if !inner.schema().is_polymorphic() {
			return Err(ConfigurationError::Polymorphic(format!(
				"'{}' is not declared polymorphic",
				inner.schema().label()
			))
			.into());
		}
		let identity = registry.get(object_name).cloned().ok_or_else(|| {
			ConfigurationError::Polymorphic(format!("'{}' is not registered", object_name))
		})?;
		let inner = match identity.parent() {
			Some(_) => inner.filter_q(type_restriction(&registry, object_name)?)?,
			None => inner,
		};
		Ok(Self {
			inner,
			registry,
			identity,
		})
	}

	pub fn identity(&self) -> &PolymorphicIdentity {
		&self.identity
	}

	pub fn inner(&self) -> &L {
		&self.inner
	}

	/// Rows whose type is one of `models` or below them
	pub fn instance_of(&self, models: &[&str]) -> Result<Self> {
		let q = self.instance_condition(models)?;
		Ok(self.wrap(self.inner.filter_q(q)?))
	}

	/// Rows whose type is none of `models` nor below them
	pub fn not_instance_of(&self, models: &[&str]) -> Result<Self> {
		let q = self.instance_condition(models)?;
		Ok(self.wrap(self.inner.exclude(vec![q], Kwargs::new())?))
	}

	fn instance_condition(&self, models: &[&str]) -> Result<Q> {
		let mut ids = Vec::new();
		for model in models {
			ids.extend(self.descendants(model)?);
		}
		ids.sort_unstable();
		ids.dedup();
		Ok(Q::leaf(format!("{}__in", POLYMORPHIC_CTYPE_COLUMN), ids))
	}

	fn descendants(&self, model: &str) -> Result<Vec<i64>> {
		self.registry
			.descendant_ids(model)
			.ok_or_else(|| Error::field(format!("Cannot resolve model '{}' in the hierarchy", model)))
	}

	fn wrap(&self, inner: L) -> Self {
		Self {
			inner,
			registry: Arc::clone(&self.registry),
			identity: self.identity.clone(),
		}
	}

	/// Translate one lookup key into a condition on the base table
	fn translate_leaf(&self, key: &str, value: &Value) -> Result<Q> {
		match split_inheritance_prefix(key) {
			(Some(model), rest) => {
				let field = split_lookup(rest).0;
				self.require_column(field)?;
				Ok(Q::leaf(rest, value.clone()) & type_restriction(&self.registry, model)?)
			}
			(None, _) => {
				self.require_column(split_lookup(key).0)?;
				Ok(Q::leaf(key, value.clone()))
			}
		}
	}

	/// Columns and logical reference names pass; the latter are left to an
	/// inner rewriting layer
	fn require_column(&self, field: &str) -> Result<()> {
		let schema = self.inner.schema();
		let rewriter = Rewriter::new(schema, self.inner.content_types());
		if schema.column_for(field).is_some() || rewriter.is_logical(field) {
			Ok(())
		} else {
			Err(schema.unknown_field(field))
		}
	}

	fn translate_q(&self, q: &Q) -> Result<Q> {
		let mut children = Vec::with_capacity(q.children().len());
		for child in q.children() {
			children.push(match child {
				QChild::Leaf(key, value) => {
					let translated = self.translate_leaf(key, value)?;
					if key.contains(INHERITANCE_SEP) {
						QChild::Node(translated)
					} else {
						child.clone()
					}
				}
				QChild::Node(node) => QChild::Node(self.translate_q(node)?),
			});
		}
		Ok(Q::from_parts(q.connector(), q.is_negated(), children))
	}

	fn translate(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Vec<Q>> {
		let mut translated = args
			.iter()
			.map(|q| self.translate_q(q))
			.collect::<Result<Vec<_>>>()?;
		let from_kwargs = self.translate_q(&Q::from_kwargs(kwargs))?;
		if !from_kwargs.is_empty() {
			translated.push(from_kwargs);
		}
		Ok(translated)
	}

	/// Relabel a record with the model of its stored content type
	fn downcast(&self, mut record: Record) -> Result<Record> {
		if let Some(id) = record.get(POLYMORPHIC_CTYPE_COLUMN).as_int() {
			let content_type = self.inner.content_types().require(id)?;
			record.app_label = content_type.app_label;
			record.model = content_type.model;
		}
		Ok(record)
	}

	fn stamp(&self, record: &mut Record) {
		if record.get(POLYMORPHIC_CTYPE_COLUMN).is_null()
			&& let Some(id) = self.identity.content_type_id()
		{
			record.set(POLYMORPHIC_CTYPE_COLUMN, id);
		}
	}

	fn stamped(&self, mut defaults: Kwargs) -> Kwargs {
		if let Some(id) = self.identity.content_type_id() {
			defaults
				.entry(POLYMORPHIC_CTYPE_COLUMN.to_string())
				.or_insert(Value::Int(id));
		}
		defaults
	}
}

fn type_restriction(registry: &PolymorphicRegistry, model: &str) -> Result<Q> {
	let ids = registry
		.descendant_ids(model)
		.ok_or_else(|| Error::field(format!("Cannot resolve model '{}' in the hierarchy", model)))?;
	Ok(Q::leaf(format!("{}__in", POLYMORPHIC_CTYPE_COLUMN), ids))
}

impl<L: QueryLayer> QueryLayer for PolymorphicQuerySet<L> {
	fn schema(&self) -> &Arc<ModelSchema> {
		self.inner.schema()
	}

	fn content_types(&self) -> &Arc<ContentTypeRegistry> {
		self.inner.content_types()
	}

	fn filter(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let args = self.translate(args, kwargs)?;
		Ok(self.wrap(self.inner.filter(args, Kwargs::new())?))
	}

	fn exclude(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Self> {
		let args = self.translate(args, kwargs)?;
		Ok(self.wrap(self.inner.exclude(args, Kwargs::new())?))
	}

	fn get(&self, args: Vec<Q>, kwargs: Kwargs) -> Result<Record> {
		let args = self.translate(args, kwargs)?;
		self.downcast(self.inner.get(args, Kwargs::new())?)
	}

	fn build(&self, kwargs: Kwargs) -> Result<Record> {
		let mut record = self.inner.build(kwargs)?;
		self.stamp(&mut record);
		record.app_label = self.identity.content_type().app_label.clone();
		record.model = self.identity.content_type().model.clone();
		Ok(record)
	}

	fn save(&self, record: &mut Record) -> Result<()> {
		self.stamp(record);
		self.inner.save(record)
	}

	fn update(&self, kwargs: Kwargs) -> Result<usize> {
		self.inner.update(kwargs)
	}

	fn get_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		let narrowed = self.inner.filter(self.translate(Vec::new(), kwargs.clone())?, Kwargs::new())?;
		let params = self.stamped(creation_params(&kwargs, defaults));
		let (record, created) = narrowed.get_or_create(Kwargs::new(), params)?;
		Ok((self.downcast(record)?, created))
	}

	fn update_or_create(&self, kwargs: Kwargs, defaults: Kwargs) -> Result<(Record, bool)> {
		let narrowed = self.inner.filter(self.translate(Vec::new(), kwargs.clone())?, Kwargs::new())?;
		match narrowed.get(Vec::new(), Kwargs::new()) {
			Ok(mut record) => {
				let schema = self.inner.schema();
				let assignments =
					Rewriter::new(schema, self.inner.content_types()).rewrite_payload(defaults)?;
				for (key, value) in assignments {
					let column = schema.column_for(&key).ok_or_else(|| schema.unknown_field(&key))?;
					record.set(column.name.clone(), value);
				}
				self.save(&mut record)?;
				Ok((self.downcast(record)?, false))
			}
			Err(Error::DoesNotExist { .. }) => {
				let record = self.create(creation_params(&kwargs, defaults))?;
				Ok((record, true))
			}
			Err(e) => Err(e),
		}
	}

	fn order_by(&self, fields: &[&str]) -> Result<Self> {
		Ok(self.wrap(self.inner.order_by(fields)?))
	}

	fn all(&self) -> Result<Vec<Record>> {
		self.inner
			.all()?
			.into_iter()
			.map(|record| self.downcast(record))
			.collect()
	}

	fn count(&self) -> Result<usize> {
		self.inner.count()
	}

	fn to_sql(&self, dialect: Dialect) -> String {
		self.inner.to_sql(dialect)
	}
}
