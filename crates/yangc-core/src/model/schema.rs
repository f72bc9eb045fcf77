//! The compiled schema arena.
//!
//! All compiled records of a context live here: modules, nodes, types,
//! identities, features and extension definitions, with one shared string
//! dictionary. Records are addressed by stable index ids; parent and module
//! back-references are non-owning ids, ownership runs strictly
//! parent -> child and module -> top level.

use std::collections::HashMap;

use super::feature::CompiledFeature;
use super::identity::CompiledIdentity;
use super::ids::{ExtensionId, FeatureId, IdentityId, ModuleId, NodeId, StrId, TypeId};
use super::interner::StringInterner;
use super::module::{CompiledExtensionDef, CompiledModule};
use super::node::{CompiledNode, NodeKind};
use super::types::{BaseType, CompiledType};

/// Error returned when an arena exceeds its id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityError {
    /// Name of the storage that overflowed.
    pub arena: &'static str,
}

impl core::fmt::Display for CapacityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "schema capacity exceeded: too many {}", self.arena)
    }
}

impl std::error::Error for CapacityError {}

/// Visitor verdict for [`Schema::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    /// Visit this node's children.
    Descend,
    /// Skip this node's subtree, continue with siblings.
    Skip,
    /// Abort the whole walk.
    Stop,
}

/// Decomposed schema for serialization. Lookup indices are not carried;
/// they are rebuilt on load.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaParts {
    /// Interner data (concatenated strings).
    pub strings_data: String,
    /// Interner offsets.
    pub strings_offsets: Vec<u32>,
    /// All compiled modules.
    pub modules: Vec<CompiledModule>,
    /// All compiled nodes.
    pub nodes: Vec<CompiledNode>,
    /// All compiled types.
    pub types: Vec<CompiledType>,
    /// All compiled identities.
    pub identities: Vec<CompiledIdentity>,
    /// All compiled features.
    pub features: Vec<CompiledFeature>,
    /// All extension definitions.
    pub extensions: Vec<CompiledExtensionDef>,
    /// Built-in type registrations.
    pub builtins: Vec<(BaseType, TypeId)>,
}

/// The compiled schema of a context.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    strings: StringInterner,
    modules: Vec<CompiledModule>,
    nodes: Vec<CompiledNode>,
    types: Vec<CompiledType>,
    identities: Vec<CompiledIdentity>,
    features: Vec<CompiledFeature>,
    extensions: Vec<CompiledExtensionDef>,

    /// Module name -> all loaded revisions.
    by_name: HashMap<StrId, Vec<ModuleId>>,
    /// Namespace -> all loaded revisions.
    by_namespace: HashMap<StrId, Vec<ModuleId>>,
    /// Built-in base type records, seeded at context creation.
    builtins: Vec<(BaseType, TypeId)>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Dictionary ===

    /// Intern a string.
    pub fn intern(&mut self, s: &str) -> StrId {
        self.strings.intern(s)
    }

    /// Resolve an interned string.
    #[must_use]
    pub fn str(&self, id: StrId) -> &str {
        self.strings.get(id)
    }

    /// Find an already-interned string.
    #[must_use]
    pub fn find_str(&self, s: &str) -> Option<StrId> {
        self.strings.find(s)
    }

    /// The string dictionary.
    #[must_use]
    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }

    // === Modules ===

    /// Add a module; its id is assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_module(&mut self, mut module: CompiledModule) -> Result<ModuleId, CapacityError> {
        let id = ModuleId::from_index(self.modules.len()).ok_or(CapacityError { arena: "modules" })?;
        module.id = id;
        self.by_name.entry(module.name).or_default().push(id);
        self.by_namespace.entry(module.namespace).or_default().push(id);
        self.modules.push(module);
        Ok(id)
    }

    /// Get a module by id.
    #[must_use]
    pub fn module(&self, id: ModuleId) -> &CompiledModule {
        &self.modules[id.to_index()]
    }

    /// Get a mutable module by id.
    pub fn module_mut(&mut self, id: ModuleId) -> &mut CompiledModule {
        &mut self.modules[id.to_index()]
    }

    /// All revisions loaded under a module name.
    #[must_use]
    pub fn modules_by_name(&self, name: &str) -> &[ModuleId] {
        self.strings
            .find(name)
            .and_then(|id| self.by_name.get(&id))
            .map_or(&[], Vec::as_slice)
    }

    /// Find a module by name and optional revision. Without a revision the
    /// latest loaded revision wins.
    #[must_use]
    pub fn find_module(&self, name: &str, revision: Option<&str>) -> Option<&CompiledModule> {
        let candidates = self.modules_by_name(name);
        match revision {
            Some(rev) => candidates
                .iter()
                .map(|&id| self.module(id))
                .find(|m| m.revision.is_some_and(|r| self.str(r) == rev)),
            None => candidates
                .iter()
                .map(|&id| self.module(id))
                .find(|m| m.latest_revision)
                .or_else(|| candidates.first().map(|&id| self.module(id))),
        }
    }

    /// Find a module by namespace.
    #[must_use]
    pub fn find_module_by_namespace(&self, namespace: &str) -> Option<&CompiledModule> {
        let ns = self.strings.find(namespace)?;
        let candidates = self.by_namespace.get(&ns)?;
        candidates
            .iter()
            .map(|&id| self.module(id))
            .find(|m| m.latest_revision)
            .or_else(|| candidates.first().map(|&id| self.module(id)))
    }

    /// Iterate over all modules.
    pub fn modules(&self) -> impl Iterator<Item = &CompiledModule> {
        self.modules.iter()
    }

    /// Number of modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // === Nodes ===

    /// Add a node; the caller links it into its parent.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_node(&mut self, node: CompiledNode) -> Result<NodeId, CapacityError> {
        let id = NodeId::from_index(self.nodes.len()).ok_or(CapacityError { arena: "nodes" })?;
        self.nodes.push(node);
        Ok(id)
    }

    /// Get a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &CompiledNode {
        &self.nodes[id.to_index()]
    }

    /// Get a mutable node by id.
    pub fn node_mut(&mut self, id: NodeId) -> &mut CompiledNode {
        &mut self.nodes[id.to_index()]
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All structural children of a node: data children plus the
    /// operation/notification children of containers and lists and the
    /// input/output of operations.
    #[must_use]
    pub fn structural_children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut out: Vec<NodeId> = node.children().to_vec();
        match &node.kind {
            NodeKind::Container {
                actions,
                notifications,
                ..
            }
            | NodeKind::List {
                actions,
                notifications,
                ..
            } => {
                out.extend_from_slice(actions);
                out.extend_from_slice(notifications);
            }
            NodeKind::Rpc { input, output } | NodeKind::Action { input, output } => {
                out.push(*input);
                out.push(*output);
            }
            _ => {}
        }
        out
    }

    /// Depth-first walk from `start` (inclusive). Returns `false` when the
    /// visitor aborted with [`Walk::Stop`].
    pub fn walk<F>(&self, start: NodeId, visitor: &mut F) -> bool
    where
        F: FnMut(NodeId, &CompiledNode) -> Walk,
    {
        match visitor(start, self.node(start)) {
            Walk::Stop => return false,
            Walk::Skip => return true,
            Walk::Descend => {}
        }
        for child in self.structural_children(start) {
            if !self.walk(child, visitor) {
                return false;
            }
        }
        true
    }

    /// Render the schema path of a node, `/module:name/name` style; the
    /// module name is repeated only where it changes along the path.
    #[must_use]
    pub fn node_path(&self, id: NodeId) -> String {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            chain.push(cur);
            cursor = self.node(cur).parent;
        }
        chain.reverse();

        let mut out = String::new();
        let mut prev_module = None;
        for nid in chain {
            let node = self.node(nid);
            out.push('/');
            if prev_module != Some(node.module) {
                out.push_str(self.str(self.module(node.module).name));
                out.push(':');
                prev_module = Some(node.module);
            }
            out.push_str(self.str(node.name));
        }
        out
    }

    // === Types ===

    /// Add a type; its id is assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_type(&mut self, mut typ: CompiledType) -> Result<TypeId, CapacityError> {
        let id = TypeId::from_index(self.types.len()).ok_or(CapacityError { arena: "types" })?;
        typ.id = id;
        self.types.push(typ);
        Ok(id)
    }

    /// Get a type by id.
    #[must_use]
    pub fn typ(&self, id: TypeId) -> &CompiledType {
        &self.types[id.to_index()]
    }

    /// Get a mutable type by id.
    pub fn typ_mut(&mut self, id: TypeId) -> &mut CompiledType {
        &mut self.types[id.to_index()]
    }

    /// Number of types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Record the compiled form of a built-in base type.
    pub fn register_builtin(&mut self, base: BaseType, id: TypeId) {
        self.builtins.push((base, id));
    }

    /// The compiled record of a built-in base type.
    ///
    /// # Panics
    ///
    /// Panics when the built-ins were not seeded; contexts seed them at
    /// creation.
    #[must_use]
    pub fn builtin_type(&self, base: BaseType) -> TypeId {
        self.builtins
            .iter()
            .find(|(b, _)| *b == base)
            .map(|(_, id)| *id)
            .expect("built-in types not seeded")
    }

    /// The typedef derivation chain of a type, starting at `id`.
    #[must_use]
    pub fn type_chain(&self, id: TypeId) -> Vec<&CompiledType> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let typ = self.typ(cur);
            chain.push(typ);
            cursor = typ.parent;
        }
        chain
    }

    // === Identities ===

    /// Add an identity; its id is assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_identity(&mut self, mut ident: CompiledIdentity) -> Result<IdentityId, CapacityError> {
        let id = IdentityId::from_index(self.identities.len())
            .ok_or(CapacityError { arena: "identities" })?;
        ident.id = id;
        self.identities.push(ident);
        Ok(id)
    }

    /// Get an identity by id.
    #[must_use]
    pub fn identity(&self, id: IdentityId) -> &CompiledIdentity {
        &self.identities[id.to_index()]
    }

    /// Get a mutable identity by id.
    pub fn identity_mut(&mut self, id: IdentityId) -> &mut CompiledIdentity {
        &mut self.identities[id.to_index()]
    }

    /// Find an identity declared by a module.
    #[must_use]
    pub fn find_identity(&self, module: ModuleId, name: StrId) -> Option<IdentityId> {
        self.module(module)
            .identities
            .iter()
            .copied()
            .find(|&id| self.identity(id).name == name)
    }

    // === Features ===

    /// Add a feature; its id is assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_feature(&mut self, mut feature: CompiledFeature) -> Result<FeatureId, CapacityError> {
        let id =
            FeatureId::from_index(self.features.len()).ok_or(CapacityError { arena: "features" })?;
        feature.id = id;
        self.features.push(feature);
        Ok(id)
    }

    /// Get a feature by id.
    #[must_use]
    pub fn feature(&self, id: FeatureId) -> &CompiledFeature {
        &self.features[id.to_index()]
    }

    /// Get a mutable feature by id.
    pub fn feature_mut(&mut self, id: FeatureId) -> &mut CompiledFeature {
        &mut self.features[id.to_index()]
    }

    /// Find a feature declared by a module.
    #[must_use]
    pub fn find_feature(&self, module: ModuleId, name: StrId) -> Option<FeatureId> {
        self.module(module)
            .features
            .iter()
            .copied()
            .find(|&id| self.feature(id).name == name)
    }

    // === Extension definitions ===

    /// Add an extension definition; its id is assigned here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] on id-space exhaustion.
    pub fn add_extension(
        &mut self,
        mut def: CompiledExtensionDef,
    ) -> Result<ExtensionId, CapacityError> {
        let id = ExtensionId::from_index(self.extensions.len())
            .ok_or(CapacityError { arena: "extensions" })?;
        def.id = id;
        self.extensions.push(def);
        Ok(id)
    }

    /// Get an extension definition by id.
    #[must_use]
    pub fn extension(&self, id: ExtensionId) -> &CompiledExtensionDef {
        &self.extensions[id.to_index()]
    }

    /// Find an extension definition declared by a module.
    #[must_use]
    pub fn find_extension(&self, module: ModuleId, name: StrId) -> Option<ExtensionId> {
        self.module(module)
            .extensions
            .iter()
            .copied()
            .find(|&id| self.extension(id).name == name)
    }

    // === Serialization ===

    /// Decompose into raw parts; lookup indices are dropped and rebuilt
    /// on load.
    #[must_use]
    pub fn into_parts(self) -> SchemaParts {
        let (strings_data, strings_offsets) = self.strings.into_parts();
        SchemaParts {
            strings_data,
            strings_offsets,
            modules: self.modules,
            nodes: self.nodes,
            types: self.types,
            identities: self.identities,
            features: self.features,
            extensions: self.extensions,
            builtins: self.builtins,
        }
    }

    /// Reconstruct a schema from raw parts, rebuilding the name and
    /// namespace indices.
    #[must_use]
    pub fn from_parts(parts: SchemaParts) -> Self {
        let mut schema = Self {
            strings: StringInterner::from_parts(parts.strings_data, parts.strings_offsets),
            modules: parts.modules,
            nodes: parts.nodes,
            types: parts.types,
            identities: parts.identities,
            features: parts.features,
            extensions: parts.extensions,
            by_name: HashMap::new(),
            by_namespace: HashMap::new(),
            builtins: parts.builtins,
        };
        for idx in 0..schema.modules.len() {
            let Some(id) = ModuleId::from_index(idx) else { break };
            let module = &schema.modules[idx];
            schema.by_name.entry(module.name).or_default().push(id);
            schema
                .by_namespace
                .entry(module.namespace)
                .or_default()
                .push(id);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;

    fn schema_with_module() -> (Schema, ModuleId) {
        let mut schema = Schema::new();
        let name = schema.intern("test-mod");
        let ns = schema.intern("urn:test:mod");
        let prefix = schema.intern("tm");
        let mut module = CompiledModule::new(ModuleId::from_raw(1).unwrap(), name, ns, prefix);
        module.latest_revision = true;
        let id = schema.add_module(module).unwrap();
        (schema, id)
    }

    #[test]
    fn test_find_module() {
        let (schema, id) = schema_with_module();
        assert_eq!(schema.find_module("test-mod", None).map(|m| m.id), Some(id));
        assert!(schema.find_module("other", None).is_none());
        assert_eq!(
            schema
                .find_module_by_namespace("urn:test:mod")
                .map(|m| m.id),
            Some(id)
        );
    }

    #[test]
    fn test_walk_skip() {
        let (mut schema, module) = schema_with_module();
        let top_name = schema.intern("top");
        let kid_name = schema.intern("kid");
        let leaf_name = schema.intern("lf");

        let top = schema
            .add_node(CompiledNode::new(
                top_name,
                module,
                None,
                NodeKind::Container {
                    presence: None,
                    children: Vec::new(),
                    actions: Vec::new(),
                    notifications: Vec::new(),
                },
            ))
            .unwrap();
        let kid = schema
            .add_node(CompiledNode::new(
                kid_name,
                module,
                Some(top),
                NodeKind::Container {
                    presence: None,
                    children: Vec::new(),
                    actions: Vec::new(),
                    notifications: Vec::new(),
                },
            ))
            .unwrap();
        let leaf = schema
            .add_node(CompiledNode::new(
                leaf_name,
                module,
                Some(kid),
                NodeKind::AnyData,
            ))
            .unwrap();
        schema.node_mut(top).children_mut().unwrap().push(kid);
        schema.node_mut(kid).children_mut().unwrap().push(leaf);

        let mut seen = Vec::new();
        schema.walk(top, &mut |id, _| {
            seen.push(id);
            Walk::Descend
        });
        assert_eq!(seen, vec![top, kid, leaf]);

        let mut seen = Vec::new();
        schema.walk(top, &mut |id, _| {
            seen.push(id);
            if id == kid {
                Walk::Skip
            } else {
                Walk::Descend
            }
        });
        assert_eq!(seen, vec![top, kid]);
    }

    #[test]
    fn test_node_path() {
        let (mut schema, module) = schema_with_module();
        let cont = schema.intern("cont");
        let lf = schema.intern("lf");
        let top = schema
            .add_node(CompiledNode::new(
                cont,
                module,
                None,
                NodeKind::Container {
                    presence: None,
                    children: Vec::new(),
                    actions: Vec::new(),
                    notifications: Vec::new(),
                },
            ))
            .unwrap();
        let leaf = schema
            .add_node(CompiledNode::new(lf, module, Some(top), NodeKind::AnyData))
            .unwrap();
        assert_eq!(schema.node_path(leaf), "/test-mod:cont/lf");
    }
}
