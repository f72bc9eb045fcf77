//! Compiled identities.

use super::ids::{IdentityId, ModuleId, StrId};
use super::types::Status;

/// A compiled identity: a named value in the multiple-inheritance lattice.
///
/// `derived` is the computed transitive closure of identities derived from
/// this one; it is the value domain of an `identityref` based here.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledIdentity {
    /// Identity identifier.
    pub id: IdentityId,
    /// Identity name.
    pub name: StrId,
    /// Declaring module.
    pub module: ModuleId,
    /// Direct `base` identities (more than one allowed in YANG 1.1).
    pub bases: Vec<IdentityId>,
    /// Transitive derived closure, excluding `self`.
    pub derived: Vec<IdentityId>,
    /// Definition status.
    pub status: Status,
}

impl CompiledIdentity {
    /// Create an identity with no bases resolved yet.
    #[must_use]
    pub fn new(id: IdentityId, name: StrId, module: ModuleId) -> Self {
        Self {
            id,
            name,
            module,
            bases: Vec::new(),
            derived: Vec::new(),
            status: Status::Current,
        }
    }

    /// Whether `other` is in this identity's derived closure.
    #[must_use]
    pub fn is_derived(&self, other: IdentityId) -> bool {
        self.derived.contains(&other)
    }
}
