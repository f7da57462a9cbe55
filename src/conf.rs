//! Layered settings
//!
//! ```rust,no_run
//! use polyref::conf::SettingsBuilder;
//!
//! let settings = SettingsBuilder::standard("polyref.toml").build().unwrap();
//! println!("autocomplete at {}", settings.autocomplete.url);
//! ```

pub use polyref_conf::*;
