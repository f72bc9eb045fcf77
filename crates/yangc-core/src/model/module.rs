//! Compiled module records.

use super::ids::{ExtensionId, FeatureId, IdentityId, ModuleId, NodeId, StrId, TypeId};
use super::node::ExtInstance;

/// YANG language version of a module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum YangVersion {
    /// RFC 6020.
    #[default]
    V1,
    /// RFC 7950.
    V1_1,
}

impl YangVersion {
    /// The `yang-version` argument string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V1_1 => "1.1",
        }
    }
}

/// A revision entry, newest first in the module's revision list.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Revision {
    /// `YYYY-MM-DD` revision date.
    pub date: StrId,
    /// Revision description.
    pub description: Option<StrId>,
}

/// An extension definition (`extension` statement).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledExtensionDef {
    /// Definition identifier.
    pub id: ExtensionId,
    /// Extension name.
    pub name: StrId,
    /// Defining module.
    pub module: ModuleId,
    /// Argument name, if the extension takes an argument.
    pub argument_name: Option<StrId>,
}

/// A compiled module.
///
/// Identified by `(name, namespace, revision)`. Within a context at most one
/// revision of a module is implemented; only implemented modules contribute
/// data nodes, augments and deviations.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledModule {
    /// Module identifier.
    pub id: ModuleId,
    /// Module name.
    pub name: StrId,
    /// XML namespace.
    pub namespace: StrId,
    /// The module's own prefix.
    pub prefix: StrId,
    /// Newest revision date, if any revision was given.
    pub revision: Option<StrId>,
    /// All revisions, newest first.
    pub revisions: Vec<Revision>,
    /// Language version.
    pub version: YangVersion,
    /// Whether the module is implemented (vs. imported for types only).
    pub implemented: bool,
    /// Whether this is the latest loaded revision of the name.
    pub latest_revision: bool,
    /// Import prefix -> imported module.
    pub imports: Vec<(StrId, ModuleId)>,
    /// Names of included submodules.
    pub includes: Vec<StrId>,
    /// Declared features.
    pub features: Vec<FeatureId>,
    /// Declared identities.
    pub identities: Vec<IdentityId>,
    /// Compiled top-level typedefs by name, shared by referrers.
    pub typedefs: Vec<(StrId, TypeId)>,
    /// Extension definitions.
    pub extensions: Vec<ExtensionId>,
    /// Top-level data nodes in declaration order.
    pub data: Vec<NodeId>,
    /// RPCs.
    pub rpcs: Vec<NodeId>,
    /// Top-level notifications.
    pub notifications: Vec<NodeId>,
    /// Extension instances on the module statement itself.
    pub exts: Vec<ExtInstance>,
    /// `organization` text.
    pub organization: Option<StrId>,
    /// `contact` text.
    pub contact: Option<StrId>,
    /// `description` text.
    pub description: Option<StrId>,
}

impl CompiledModule {
    /// Create an empty module record.
    #[must_use]
    pub fn new(id: ModuleId, name: StrId, namespace: StrId, prefix: StrId) -> Self {
        Self {
            id,
            name,
            namespace,
            prefix,
            revision: None,
            revisions: Vec::new(),
            version: YangVersion::default(),
            implemented: false,
            latest_revision: false,
            imports: Vec::new(),
            includes: Vec::new(),
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            extensions: Vec::new(),
            data: Vec::new(),
            rpcs: Vec::new(),
            notifications: Vec::new(),
            exts: Vec::new(),
            organization: None,
            contact: None,
            description: None,
        }
    }

    /// Find the module imported under `prefix`; the module's own prefix
    /// resolves to itself.
    #[must_use]
    pub fn module_for_prefix(&self, prefix: StrId) -> Option<ModuleId> {
        if prefix == self.prefix {
            return Some(self.id);
        }
        self.imports
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, m)| *m)
    }

    /// Find a compiled top-level typedef by name.
    #[must_use]
    pub fn typedef(&self, name: StrId) -> Option<TypeId> {
        self.typedefs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
    }
}
