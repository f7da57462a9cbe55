//! # polyref settings
//!
//! Settings for generic reference columns, the admin integration and the
//! autocomplete endpoint.
//!
//! Settings are assembled from layered sources. Later layers win over earlier
//! ones: built-in defaults, then TOML files or strings, then environment
//! variables prefixed with `POLYREF_`. Nested keys are separated by `__`
//! in variable names, so `POLYREF_AUTOCOMPLETE__PAGE_SIZE=50` sets
//! `autocomplete.page_size`.
//!
//! ## Quick Start
//!
//! ```rust
//! use polyref_conf::SettingsBuilder;
//!
//! let settings = SettingsBuilder::new()
//!     .toml_str("[autocomplete]\npage_size = 10")
//!     .build()
//!     .unwrap();
//! assert_eq!(settings.autocomplete.page_size, 10);
//! assert_eq!(settings.columns.type_suffix, "_type");
//! ```

pub mod builder;
pub mod error;
pub mod settings;
pub mod sources;

pub use builder::SettingsBuilder;
pub use error::{SettingsError, SettingsResult};
pub use settings::{AdminSettings, AutocompleteSettings, ColumnSettings, Settings};
pub use sources::{ConfigSource, DefaultSource, ENV_PREFIX, EnvSource, TomlFileSource, TomlSource};
