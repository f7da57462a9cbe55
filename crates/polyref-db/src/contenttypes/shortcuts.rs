//! Resolving stored references back to rows

use super::normalize::{GenericRef, Normalizer};
use crate::error::{Error, Result};
use crate::kwargs;
use crate::orm::{Database, ModelSchema, QueryLayer, Record};
use crate::value::Value;

/// The reference stored in `record` under the logical name `field`
///
/// Returns `None` when either column is null.
pub fn stored_reference(
	db: &Database,
	schema: &ModelSchema,
	record: &Record,
	field: &str,
) -> Result<Option<GenericRef>> {
	let spec = schema
		.specs()
		.get(field)
		.ok_or_else(|| schema.unknown_field(field))?;
	let type_value = record.get(&spec.type_column);
	let id_value = record.get(&spec.id_column);
	if type_value.is_null() || id_value.is_null() {
		return Ok(None);
	}
	Normalizer::new(db.catalog()).normalize(&Value::pair(type_value.clone(), id_value.clone()))
}

/// Load the row referenced by `record` through `field`
///
/// A dangling reference, one whose target row no longer exists, yields
/// `None` like an empty one.
///
/// # Examples
///
/// ```
/// use polyref_db::contenttypes::{GenericReferenceField, RewritingQuerySet, fetch_reference};
/// use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
/// use polyref_db::kwargs;
///
/// let db = Database::new();
/// db.register(
///     ModelSchemaBuilder::new("auth", "User")
///         .column(Column::text("username"))
///         .build()
///         .unwrap(),
/// );
/// let schema = db.register(
///     ModelSchemaBuilder::new("vault", "Credential")
///         .generic_reference(GenericReferenceField::new("owner").null(true))
///         .build()
///         .unwrap(),
/// );
///
/// let alice = db.objects("auth.user").unwrap().create(kwargs! { "username" => "alice" }).unwrap();
/// let credential = RewritingQuerySet::new(db.objects("vault.credential").unwrap())
///     .create(kwargs! { "owner" => &alice })
///     .unwrap();
///
/// let owner = fetch_reference(&db, &schema, &credential, "owner").unwrap().unwrap();
/// assert_eq!(owner.get("username").to_string(), "alice");
/// ```
pub fn fetch_reference(
	db: &Database,
	schema: &ModelSchema,
	record: &Record,
	field: &str,
) -> Result<Option<Record>> {
	let Some(reference) = stored_reference(db, schema, record, field)? else {
		return Ok(None);
	};
	let target = db.objects_for(reference.content_type())?;
	match target.get(Vec::new(), kwargs! { "pk" => reference.object_id() }) {
		Ok(found) => Ok(Some(found)),
		Err(Error::DoesNotExist { .. }) => {
			tracing::debug!(reference = %reference, "dangling generic reference");
			Ok(None)
		}
		Err(e) => Err(e),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contenttypes::{GenericReferenceField, RewritingQuerySet};
	use crate::orm::{Column, ModelSchemaBuilder};
	use std::sync::Arc;

	fn setup() -> (Database, Arc<ModelSchema>) {
		let db = Database::new();
		db.register(
			ModelSchemaBuilder::new("auth", "User")
				.column(Column::text("username"))
				.build()
				.unwrap(),
		);
		let schema = db.register(
			ModelSchemaBuilder::new("vault", "Credential")
				.generic_reference(GenericReferenceField::new("owner").null(true))
				.build()
				.unwrap(),
		);
		(db, schema)
	}

	#[test]
	fn test_empty_and_dangling_references() {
		let (db, schema) = setup();
		let credentials = RewritingQuerySet::new(db.objects("vault.credential").unwrap());

		let empty = credentials.create(kwargs! {}).unwrap();
		assert_eq!(fetch_reference(&db, &schema, &empty, "owner").unwrap(), None);

		let dangling = credentials
			.create(kwargs! { "owner" => Value::pair(1i64, 42i64) })
			.unwrap();
		assert_eq!(fetch_reference(&db, &schema, &dangling, "owner").unwrap(), None);
		let reference = stored_reference(&db, &schema, &dangling, "owner")
			.unwrap()
			.unwrap();
		assert_eq!(reference.object_id(), 42);
	}

	#[test]
	fn test_unknown_field() {
		let (db, schema) = setup();
		let record = Record::new("vault", "credential", "id", kwargs! {});
		assert!(matches!(
			fetch_reference(&db, &schema, &record, "label"),
			Err(Error::Field(_))
		));
	}
}
