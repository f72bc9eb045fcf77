//! Compiled schema nodes.
//!
//! Every node is a common header (name, module, parent, flags, `when`,
//! `must`s, extensions) plus a tagged [`NodeKind`] payload. Groupings and
//! `uses` never appear here; choice cases are explicit and RPC/action
//! input/output are always materialized.

use std::any::Any;
use std::sync::Arc;

use super::ids::{ExtensionId, ModuleId, NodeId, StrId, TypeId};
use crate::xpath::CompiledXPath;

/// Discriminant of a compiled node, usable in accept masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeTag {
    /// `container`
    Container,
    /// `leaf`
    Leaf,
    /// `leaf-list`
    LeafList,
    /// `list`
    List,
    /// `choice`
    Choice,
    /// `case`
    Case,
    /// `anydata`
    AnyData,
    /// `anyxml`
    AnyXml,
    /// `rpc`
    Rpc,
    /// `action`
    Action,
    /// RPC/action `input`
    Input,
    /// RPC/action `output`
    Output,
    /// `notification`
    Notification,
}

impl NodeTag {
    /// The YANG statement keyword.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Leaf => "leaf",
            Self::LeafList => "leaf-list",
            Self::List => "list",
            Self::Choice => "choice",
            Self::Case => "case",
            Self::AnyData => "anydata",
            Self::AnyXml => "anyxml",
            Self::Rpc => "rpc",
            Self::Action => "action",
            Self::Input => "input",
            Self::Output => "output",
            Self::Notification => "notification",
        }
    }

    /// Single-bit mask value.
    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Whether the node can carry child data nodes.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !matches!(self, Self::Leaf | Self::LeafList | Self::AnyData | Self::AnyXml)
    }

    /// Whether the node is a data node (carried in a data tree).
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            Self::Container | Self::Leaf | Self::LeafList | Self::List | Self::AnyData | Self::AnyXml
        )
    }
}

impl core::fmt::Display for NodeTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask over [`NodeTag`] values, used as the accepted-result filter of
/// schema node-id resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeTagMask(pub u16);

impl NodeTagMask {
    /// Mask accepting every node type.
    pub const ANY: Self = Self(u16::MAX);

    /// Build a mask from a list of tags.
    #[must_use]
    pub fn of(tags: &[NodeTag]) -> Self {
        Self(tags.iter().fold(0, |acc, t| acc | t.bit()))
    }

    /// Whether the mask accepts the tag.
    #[must_use]
    pub fn accepts(&self, tag: NodeTag) -> bool {
        self.0 & tag.bit() != 0
    }
}

/// A compiled `must` constraint.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MustSpec {
    /// XPath expression text.
    pub expr: StrId,
    /// `error-message` substatement.
    pub error_message: Option<StrId>,
    /// `error-app-tag` substatement.
    pub error_app_tag: Option<StrId>,
    /// Expression compiled by the XPath collaborator in the final sweep.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub compiled: Option<CompiledXPath>,
}

/// A compiled `when` condition. The context node of the expression is the
/// parent of the guarded node; on data nodes a false `when` toggles node
/// existence.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhenSpec {
    /// XPath expression text.
    pub expr: StrId,
    /// Expression compiled by the XPath collaborator in the final sweep.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub compiled: Option<CompiledXPath>,
}

/// A compiled extension instance attached to a node, module or type.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtInstance {
    /// The extension definition being instantiated.
    pub def: ExtensionId,
    /// Argument string, if the extension takes one.
    pub argument: Option<StrId>,
    /// Opaque state attached by the plugin's compile hook.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Option<Arc<dyn Any + Send + Sync>>,
}

impl core::fmt::Debug for ExtInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtInstance")
            .field("def", &self.def)
            .field("argument", &self.argument)
            .field("data", &self.data.as_ref().map(|_| "<plugin>"))
            .finish()
    }
}

impl ExtInstance {
    /// Create an instance without plugin data.
    #[must_use]
    pub fn new(def: ExtensionId, argument: Option<StrId>) -> Self {
        Self {
            def,
            argument,
            data: None,
        }
    }
}

/// One `unique` constraint of a list: a tuple of descendant leaves.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UniqueSpec {
    /// The descendant schema node-ids as written.
    pub tags: Vec<StrId>,
    /// Resolved leaf pointers, set by the validation pass; index-parallel
    /// with `tags`.
    pub leaves: Vec<NodeId>,
}

/// Common node flags, resolved top-down during compilation.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeFlags {
    /// `config true` (read-write) or `config false` (read-only state).
    pub config: bool,
    /// Definition status.
    pub status: super::types::Status,
    /// `mandatory true`; implied on list keys.
    pub mandatory: bool,
    /// `ordered-by user` on lists and leaf-lists.
    pub ordered_by_user: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            config: true,
            status: super::types::Status::Current,
            mandatory: false,
            ordered_by_user: false,
        }
    }
}

/// Per-kind payload of a compiled node.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Data container.
    Container {
        /// Presence container marker (the `presence` argument).
        presence: Option<StrId>,
        /// Child data nodes.
        children: Vec<NodeId>,
        /// `action` children (YANG 1.1).
        actions: Vec<NodeId>,
        /// `notification` children (YANG 1.1).
        notifications: Vec<NodeId>,
    },
    /// Scalar leaf.
    Leaf {
        /// Compiled value type.
        typ: TypeId,
        /// `units`, own or inherited from the typedef chain.
        units: Option<StrId>,
        /// Effective default value.
        default: Option<StrId>,
        /// Whether this leaf is a key of its parent list.
        is_key: bool,
    },
    /// Sequence of scalar values.
    LeafList {
        /// Compiled value type.
        typ: TypeId,
        /// `units`, own or inherited from the typedef chain.
        units: Option<StrId>,
        /// Ordered default sequence.
        defaults: Vec<StrId>,
        /// `min-elements`.
        min_elements: u32,
        /// `max-elements`; `None` is unbounded.
        max_elements: Option<u32>,
    },
    /// Keyed or keyless list.
    List {
        /// Key leaves in declaration order; direct children.
        keys: Vec<NodeId>,
        /// `unique` constraints.
        uniques: Vec<UniqueSpec>,
        /// Child data nodes.
        children: Vec<NodeId>,
        /// `action` children (YANG 1.1).
        actions: Vec<NodeId>,
        /// `notification` children (YANG 1.1).
        notifications: Vec<NodeId>,
        /// `min-elements`.
        min_elements: u32,
        /// `max-elements`; `None` is unbounded.
        max_elements: Option<u32>,
    },
    /// Choice of alternatives.
    Choice {
        /// Case children (shorthand children get implicit cases).
        cases: Vec<NodeId>,
        /// The default case, if any.
        default_case: Option<NodeId>,
    },
    /// One alternative of a choice.
    Case {
        /// Child data nodes.
        children: Vec<NodeId>,
    },
    /// Opaque data subtree (YANG 1.1).
    AnyData,
    /// Opaque XML subtree.
    AnyXml,
    /// Top-level operation; input and output are always present.
    Rpc {
        /// The materialized `input` node.
        input: NodeId,
        /// The materialized `output` node.
        output: NodeId,
    },
    /// Node-bound operation (YANG 1.1); input and output are always present.
    Action {
        /// The materialized `input` node.
        input: NodeId,
        /// The materialized `output` node.
        output: NodeId,
    },
    /// Operation input; `config false` subtree.
    Input {
        /// Child data nodes.
        children: Vec<NodeId>,
    },
    /// Operation output; `config false` subtree.
    Output {
        /// Child data nodes.
        children: Vec<NodeId>,
    },
    /// Notification; `config false` subtree.
    Notification {
        /// Child data nodes.
        children: Vec<NodeId>,
    },
}

impl NodeKind {
    /// The discriminant tag.
    #[must_use]
    pub fn tag(&self) -> NodeTag {
        match self {
            Self::Container { .. } => NodeTag::Container,
            Self::Leaf { .. } => NodeTag::Leaf,
            Self::LeafList { .. } => NodeTag::LeafList,
            Self::List { .. } => NodeTag::List,
            Self::Choice { .. } => NodeTag::Choice,
            Self::Case { .. } => NodeTag::Case,
            Self::AnyData => NodeTag::AnyData,
            Self::AnyXml => NodeTag::AnyXml,
            Self::Rpc { .. } => NodeTag::Rpc,
            Self::Action { .. } => NodeTag::Action,
            Self::Input { .. } => NodeTag::Input,
            Self::Output { .. } => NodeTag::Output,
            Self::Notification { .. } => NodeTag::Notification,
        }
    }
}

/// A compiled schema node.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledNode {
    /// Node name.
    pub name: StrId,
    /// Effective module: the augmenting module for augment-added nodes,
    /// otherwise the defining module.
    pub module: ModuleId,
    /// Owning parent; `None` for module top-level nodes.
    pub parent: Option<NodeId>,
    /// Resolved flags.
    pub flags: NodeFlags,
    /// `when` conditions; a `uses` or `augment` may stack one on top of
    /// the node's own.
    pub whens: Vec<WhenSpec>,
    /// `must` constraints.
    pub musts: Vec<MustSpec>,
    /// Extension instances.
    pub exts: Vec<ExtInstance>,
    /// Kind payload.
    pub kind: NodeKind,
}

impl CompiledNode {
    /// Create a node with default flags.
    #[must_use]
    pub fn new(name: StrId, module: ModuleId, parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            name,
            module,
            parent,
            flags: NodeFlags::default(),
            whens: Vec::new(),
            musts: Vec::new(),
            exts: Vec::new(),
            kind,
        }
    }

    /// The node's discriminant tag.
    #[must_use]
    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Child data-node list of this node, if its kind has one. RPC/action
    /// children (input/output) are not included; use [`NodeKind::Rpc`]
    /// payload directly.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Container { children, .. }
            | NodeKind::List { children, .. }
            | NodeKind::Case { children }
            | NodeKind::Input { children }
            | NodeKind::Output { children }
            | NodeKind::Notification { children } => children,
            NodeKind::Choice { cases, .. } => cases,
            _ => &[],
        }
    }

    /// Mutable child data-node list, if the kind has one.
    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Container { children, .. }
            | NodeKind::List { children, .. }
            | NodeKind::Case { children }
            | NodeKind::Input { children }
            | NodeKind::Output { children }
            | NodeKind::Notification { children } => Some(children),
            NodeKind::Choice { cases, .. } => Some(cases),
            _ => None,
        }
    }

    /// The leaf/leaf-list value type, if any.
    #[must_use]
    pub fn value_type(&self) -> Option<TypeId> {
        match &self.kind {
            NodeKind::Leaf { typ, .. } | NodeKind::LeafList { typ, .. } => Some(*typ),
            _ => None,
        }
    }
}
