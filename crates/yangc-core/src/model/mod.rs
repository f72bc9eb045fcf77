//! The compiled schema model.
//!
//! This is the output side of the pipeline:
//!
//! ```text
//! Parsed modules -> Compiler -> [Schema]
//! ```
//!
//! The schema is an arena: records are addressed by `NonZeroU32` ids, parent
//! and module links are non-owning back-references, and one string
//! dictionary serves the whole context. After a successful compile the
//! schema is frozen; it is only read until its context is dropped.

mod feature;
mod identity;
mod ids;
mod interner;
mod module;
mod node;
mod schema;
mod types;

pub use feature::{CompiledFeature, FeatureState, IfFeature};
pub use identity::CompiledIdentity;
pub use ids::{ExtensionId, FeatureId, IdentityId, ModuleId, NodeId, StrId, TypeId};
pub use interner::StringInterner;
pub use module::{CompiledExtensionDef, CompiledModule, Revision, YangVersion};
pub use node::{
    CompiledNode, ExtInstance, MustSpec, NodeFlags, NodeKind, NodeTag, NodeTagMask, UniqueSpec,
    WhenSpec,
};
pub use schema::{CapacityError, Schema, SchemaParts, Walk};
pub use types::{
    BaseType, BitItem, CompiledPattern, CompiledType, EnumItem, Intervals, LeafrefSpec, Status,
};
