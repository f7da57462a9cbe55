//! # polyref
//!
//! Generic (polymorphic) references for model schemas: one logical field
//! backed by a content type column and an object id column, usable in
//! filters, creates and updates as if it were a single column.
//!
//! ## Feature Flags
//!
//! - `admin` - form fields, widgets, inline layouts and the autocomplete endpoint
//! - `conf` - layered settings from defaults, TOML files and environment variables
//! - `full` (default) - everything above
//!
//! The database layer is always included.
//!
//! ## Quick Example
//!
//! ```
//! use polyref::db::contenttypes::{GenericReferenceField, RewritingQuerySet};
//! use polyref::db::orm::{Database, ModelSchemaBuilder, QueryLayer};
//! use polyref::db::kwargs;
//!
//! let db = Database::new();
//! db.register(ModelSchemaBuilder::new("auth", "Group").build().unwrap());
//! db.register(
//!     ModelSchemaBuilder::new("vault", "Credential")
//!         .generic_reference(GenericReferenceField::new("owner").null(true))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let admins = db.objects("auth.group").unwrap().create(kwargs! {}).unwrap();
//! let credentials = RewritingQuerySet::new(db.objects("vault.credential").unwrap());
//! let credential = credentials.create(kwargs! { "owner" => &admins }).unwrap();
//! assert_eq!(credential.get("owner_id").as_int(), admins.pk());
//! ```

pub mod db;

#[cfg(feature = "admin")]
pub mod admin;
#[cfg(feature = "conf")]
pub mod conf;

pub use db::{Error, Result, Value};
