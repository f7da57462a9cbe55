//! # polyref database layer
//!
//! Generic references (a content type column plus an object id column)
//! addressable through a single logical field name.
//!
//! - [`contenttypes`]: content type catalog, reference field descriptor,
//!   field spec registry, value normalizer and the query rewriting layer
//! - [`orm`]: model schemas, `Q` expressions, the in-memory query builder,
//!   the inheritance-polymorphism layer and SQL rendering
//!
//! ## Quick Start
//!
//! ```
//! use polyref_db::contenttypes::{GenericReferenceField, LimitChoicesTo, RewritingQuerySet};
//! use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
//! use polyref_db::{Value, kwargs};
//!
//! let db = Database::new();
//! db.register(ModelSchemaBuilder::new("auth", "User").build().unwrap());
//! db.register(
//!     ModelSchemaBuilder::new("vault", "Credential")
//!         .column(Column::text("label"))
//!         .generic_reference(
//!             GenericReferenceField::new("owner")
//!                 .null(true)
//!                 .limit_choices_to(LimitChoicesTo::models(&["auth.user"])),
//!         )
//!         .build()
//!         .unwrap(),
//! );
//!
//! let user = db.objects("auth.user").unwrap().create(kwargs! {}).unwrap();
//! let credentials = RewritingQuerySet::new(db.objects("vault.credential").unwrap());
//! credentials.create(kwargs! { "label" => "ssh", "owner" => &user }).unwrap();
//! credentials.create(kwargs! { "label" => "spare" }).unwrap();
//!
//! let owned = credentials.filter_kwargs(kwargs! { "owner" => &user }).unwrap();
//! assert_eq!(owned.count().unwrap(), 1);
//! let orphans = credentials
//!     .filter_kwargs(kwargs! { "owner__in" => vec![Value::Null] })
//!     .unwrap();
//! assert_eq!(orphans.count().unwrap(), 1);
//! ```

pub mod contenttypes;
pub mod error;
pub mod orm;
pub mod value;

pub use error::{ConfigurationError, Error, Result};
pub use value::{InstanceRef, Value};
