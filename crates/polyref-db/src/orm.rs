//! Model schemas, query expressions and the query layer stack
//!
//! The stack is built from [`QueryLayer`] implementations wrapping each
//! other. [`MemoryQuerySet`] is the innermost layer and stores rows;
//! [`PolymorphicQuerySet`](polymorphic::PolymorphicQuerySet) adds single-table
//! inheritance on top of it.

pub mod filter;
pub mod layer;
pub mod memory;
pub mod polymorphic;
pub mod query;
pub mod record;
pub mod schema;
pub mod sql;

pub use filter::{LookupResolver, compile, evaluate};
pub use layer::{QueryLayer, RowLister};
pub use memory::{Database, MemoryQuerySet, MemoryTable};
pub use polymorphic::{PolymorphicIdentity, PolymorphicQuerySet, PolymorphicRegistry};
pub use query::{
	Connector, Filter, FilterCondition, FilterOperator, Kwargs, LOOKUP_SEP, Q, QChild, split_lookup,
};
pub use record::Record;
pub use schema::{
	Column, ColumnKind, ColumnNaming, ForeignKeyOptions, ModelSchema, ModelSchemaBuilder,
	NativeReference, OnDelete, POLYMORPHIC_CTYPE_COLUMN,
};
pub use sql::{Dialect, build_condition, insert_sql, select_sql, update_sql};
