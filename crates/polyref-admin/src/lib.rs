//! # polyref admin integration
//!
//! Form and widget support for editing generic references, plus the
//! autocomplete endpoint the widget queries for object choices.
//!
//! - [`ReferenceFormField`]: the two-part form field and its validation
//! - [`ReferenceWidget`]: content type select plus object picker context
//! - [`ReferenceFormAdapter`] and [`InlineLayout`]: surrogate form fields
//!   standing in for the physical columns
//! - [`Autocomplete`]: paginated, searchable object listing over HTTP
//!
//! ## Quick Start
//!
//! ```
//! use http::Request;
//! use polyref_admin::{AdminUser, Autocomplete, AutocompleteResponse};
//! use polyref_conf::AutocompleteSettings;
//! use polyref_db::kwargs;
//! use polyref_db::orm::{Column, Database, ModelSchemaBuilder, QueryLayer};
//!
//! let db = Database::new();
//! db.register(
//!     ModelSchemaBuilder::new("auth", "User")
//!         .column(Column::text("username"))
//!         .build()
//!         .unwrap(),
//! );
//! let users = db.objects("auth.user").unwrap();
//! users.create(kwargs! { "username" => "alice" }).unwrap();
//! users.create(kwargs! { "username" => "bob" }).unwrap();
//!
//! let settings = AutocompleteSettings::default();
//! let view = Autocomplete::new(&db, db.catalog(), &settings);
//! let request = Request::get("/admin/polyref/autocomplete/?ct=1&q=ali")
//!     .extension(AdminUser::staff())
//!     .body(())
//!     .unwrap();
//!
//! let response = view.handle(&request);
//! assert_eq!(response.status(), 200);
//! let body: AutocompleteResponse = serde_json::from_str(response.body()).unwrap();
//! assert_eq!(body.results[0].text, "alice");
//! assert!(!body.more);
//! ```

pub mod adapter;
pub mod autocomplete;
pub mod choices;
pub mod error;
pub mod fields;
pub mod layout;
pub mod widgets;

pub use adapter::{FormErrors, ReferenceFormAdapter};
pub use autocomplete::{
	AdminUser, Autocomplete, AutocompleteItem, AutocompleteQuery, AutocompleteResponse, object_label,
};
pub use choices::{apply_limit_choices, content_type_label};
pub use error::{AdminError, AdminResult};
pub use fields::{
	INVALID_CHOICE_MESSAGE, INVALID_ID_MESSAGE, PARTIAL_MESSAGE, REQUIRED_MESSAGE, ReferenceFormField,
};
pub use layout::{Fieldset, InlineLayout};
pub use widgets::{EMPTY_LABEL, ReferenceWidget, SelectOption, WidgetContext};
