//! Shared fixtures for polyref-db integration tests

#![allow(dead_code)]

use polyref_db::contenttypes::{GenericReferenceField, LimitChoicesTo, RewritingQuerySet};
use polyref_db::kwargs;
use polyref_db::orm::{
	Column, Database, MemoryQuerySet, ModelSchema, ModelSchemaBuilder, PolymorphicQuerySet,
	PolymorphicRegistry, QueryLayer, Record,
};
use rstest::fixture;
use std::sync::Arc;

/// Users, groups and credentials owned by either
pub struct Vault {
	pub db: Database,
	pub credential: Arc<ModelSchema>,
	pub user: Record,
	pub group: Record,
}

impl Vault {
	pub fn credentials(&self) -> RewritingQuerySet<MemoryQuerySet> {
		RewritingQuerySet::new(self.db.objects("vault.credential").unwrap())
	}

	pub fn user_type_id(&self) -> i64 {
		self.db.catalog().get("auth", "user").unwrap().id.unwrap()
	}
}

/// A fresh vault where `Credential.owner` is limited to users
///
/// The user row is created after a few throwaway rows so its id is 7.
#[fixture]
pub fn vault() -> Vault {
	let db = Database::new();
	db.register(
		ModelSchemaBuilder::new("auth", "User")
			.column(Column::text("username"))
			.build()
			.unwrap(),
	);
	db.register(
		ModelSchemaBuilder::new("auth", "Group")
			.column(Column::text("name"))
			.build()
			.unwrap(),
	);
	let credential = db.register(
		ModelSchemaBuilder::new("vault", "Credential")
			.column(Column::text("label"))
			.generic_reference(
				GenericReferenceField::new("owner")
					.null(true)
					.limit_choices_to(LimitChoicesTo::models(&["auth.user"])),
			)
			.ordering(&["label"])
			.build()
			.unwrap(),
	);

	let users = db.objects("auth.user").unwrap();
	for name in ["ann", "bob", "cid", "dee", "eve", "fay"] {
		users.create(kwargs! { "username" => name }).unwrap();
	}
	let user = users.create(kwargs! { "username" => "gus" }).unwrap();
	let group = db
		.objects("auth.group")
		.unwrap()
		.create(kwargs! { "name" => "admins" })
		.unwrap();

	Vault {
		db,
		credential,
		user,
		group,
	}
}

/// Single-table project hierarchy whose rows carry an `owner` reference
///
/// `Project` is the base, `ArtProject` and `ResearchProject` derive from it
/// and `Thesis` derives from `ResearchProject`.
pub struct Studio {
	pub db: Database,
	pub registry: Arc<PolymorphicRegistry>,
	pub user: Record,
	pub group: Record,
}

impl Studio {
	pub fn projects(&self, model: &str) -> RewritingQuerySet<PolymorphicQuerySet<MemoryQuerySet>> {
		let base = self.db.objects("studio.project").unwrap();
		let layer = PolymorphicQuerySet::new(base, Arc::clone(&self.registry), model).unwrap();
		RewritingQuerySet::new(layer)
	}

	/// The same stack with the inheritance layer outermost
	pub fn inherited(&self, model: &str) -> PolymorphicQuerySet<RewritingQuerySet<MemoryQuerySet>> {
		let base = RewritingQuerySet::new(self.db.objects("studio.project").unwrap());
		PolymorphicQuerySet::new(base, Arc::clone(&self.registry), model).unwrap()
	}
}

#[fixture]
pub fn studio() -> Studio {
	let db = Database::new();
	db.register(
		ModelSchemaBuilder::new("auth", "User")
			.column(Column::text("username"))
			.build()
			.unwrap(),
	);
	db.register(
		ModelSchemaBuilder::new("auth", "Group")
			.column(Column::text("name"))
			.build()
			.unwrap(),
	);
	db.register(
		ModelSchemaBuilder::new("studio", "Project")
			.column(Column::text("topic"))
			.column(Column::text("artist").null(true))
			.column(Column::text("supervisor").null(true))
			.generic_reference(GenericReferenceField::new("owner").null(true))
			.ordering(&["topic"])
			.polymorphic()
			.build()
			.unwrap(),
	);

	let mut registry = PolymorphicRegistry::new();
	registry
		.register_model(db.catalog(), "studio", "Project", None)
		.unwrap();
	registry
		.register_model(db.catalog(), "studio", "ArtProject", Some("Project"))
		.unwrap();
	registry
		.register_model(db.catalog(), "studio", "ResearchProject", Some("Project"))
		.unwrap();
	registry
		.register_model(db.catalog(), "studio", "Thesis", Some("ResearchProject"))
		.unwrap();

	let user = db
		.objects("auth.user")
		.unwrap()
		.create(kwargs! { "username" => "tim" })
		.unwrap();
	let group = db
		.objects("auth.group")
		.unwrap()
		.create(kwargs! { "name" => "lab" })
		.unwrap();

	Studio {
		db,
		registry: Arc::new(registry),
		user,
		group,
	}
}
