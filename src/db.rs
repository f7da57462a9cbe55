//! Schemas, reference fields and the query layer stack
//!
//! Re-exports `polyref-db` under `polyref::db`.

pub use polyref_db::*;
