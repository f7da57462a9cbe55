//! # Generic references
//!
//! Django-style content types and generic foreign keys whose two physical
//! columns can be queried and assigned through one logical name.
//!
//! ## Features
//!
//! - **Content type catalog**: ids assigned on registration, lookups by id
//!   and natural key, filtering by a choice predicate
//! - **Reference field descriptor**: auto-created or explicitly named
//!   type/id columns ([`GenericReferenceField`])
//! - **Field spec registry**: per-model mapping of logical names to columns,
//!   including natively declared references ([`FieldSpecs`])
//! - **Value normalization**: instances, pairs and structures reduced to one
//!   canonical reference ([`Normalizer`])
//! - **Query rewriting**: `exact`, `in` and `isnull` lookups on logical names
//!   turned into column conditions ([`Rewriter`], [`RewritingQuerySet`])

// Re-exported below as `polyref_db::contenttypes::ContentType`
#[allow(clippy::module_inception)]
pub mod contenttypes;
pub mod fields;
pub mod normalize;
pub mod queryset;
pub mod registry;
pub mod rewrite;
pub mod shortcuts;

pub use contenttypes::{CONTENT_TYPE_REGISTRY, ContentType, ContentTypeRegistry, LimitChoicesTo};
pub use fields::{FieldDeconstruction, GenericReferenceField, humanize};
pub use normalize::{GenericRef, Normalizer};
pub use queryset::RewritingQuerySet;
pub use registry::{FieldSpec, FieldSpecs, MODEL_REGISTRY, ModelRegistry, SpecSource, get_specs};
pub use rewrite::{INHERITANCE_SEP, Rewriter, enforce_pair_consistency, split_inheritance_prefix};
pub use shortcuts::{fetch_reference, stored_reference};
