//! Admin integration
//!
//! ## Example
//!
//! ```rust
//! use polyref::admin::{AdminUser, AutocompleteQuery};
//!
//! assert!(AdminUser::staff().can_use_admin());
//! assert!(!AdminUser::anonymous().can_use_admin());
//! let query = AutocompleteQuery::parse(Some("ct=2&page=3")).unwrap();
//! assert_eq!(query.page.as_deref(), Some("3"));
//! ```

pub use polyref_admin::*;
