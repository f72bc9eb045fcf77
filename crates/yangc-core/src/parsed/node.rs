//! Parsed schema-tree statements.
//!
//! The P-tree mirrors the YANG source shape: `uses` and choice shorthands
//! are still present, RPC input/output may be absent, and groupings are
//! uninstantiated templates. The compiler normalizes all of this away.

use super::types::{ParsedType, ParsedTypedef};

/// A `must` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedMust {
    /// XPath expression.
    pub expr: String,
    /// `error-message`.
    pub error_message: Option<String>,
    /// `error-app-tag`.
    pub error_app_tag: Option<String>,
}

impl ParsedMust {
    /// A bare must constraint.
    #[must_use]
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            ..Self::default()
        }
    }
}

/// An extension instance, `prefix:name [argument]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedExtInstance {
    /// Prefixed extension name.
    pub name: String,
    /// Argument string, if any.
    pub argument: Option<String>,
}

impl ParsedExtInstance {
    /// An instance without an argument.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: None,
        }
    }
}

/// Statement properties shared by every schema-tree statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCommon {
    /// Statement argument (node name).
    pub name: String,
    /// `when` condition.
    pub when: Option<String>,
    /// `if-feature` guards; all must hold.
    pub if_features: Vec<String>,
    /// Explicit `config`, inherited when absent.
    pub config: Option<bool>,
    /// `status` keyword, inherited/current when absent.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
    /// Extension instances on the statement.
    pub exts: Vec<ParsedExtInstance>,
}

impl ParsedCommon {
    /// Common properties carrying only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A `container` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedContainer {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// `presence` argument.
    pub presence: Option<String>,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Local groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// Child statements.
    pub children: Vec<ParsedNode>,
    /// `action` statements (YANG 1.1).
    pub actions: Vec<ParsedOperation>,
    /// `notification` statements (YANG 1.1).
    pub notifications: Vec<ParsedNotification>,
}

/// A `leaf` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedLeaf {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// The value type.
    pub typ: ParsedType,
    /// `units`.
    pub units: Option<String>,
    /// `default`.
    pub default: Option<String>,
    /// `mandatory`.
    pub mandatory: Option<bool>,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
}

impl ParsedLeaf {
    /// A leaf with just a name and type.
    #[must_use]
    pub fn new(name: impl Into<String>, typ: ParsedType) -> Self {
        Self {
            common: ParsedCommon::named(name),
            typ,
            ..Self::default()
        }
    }
}

/// A `leaf-list` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedLeafList {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// The value type.
    pub typ: ParsedType,
    /// `units`.
    pub units: Option<String>,
    /// `default` values in order (YANG 1.1).
    pub defaults: Vec<String>,
    /// `min-elements`.
    pub min_elements: Option<u32>,
    /// `max-elements`.
    pub max_elements: Option<u32>,
    /// `ordered-by user`.
    pub ordered_by_user: bool,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
}

impl ParsedLeafList {
    /// A leaf-list with just a name and type.
    #[must_use]
    pub fn new(name: impl Into<String>, typ: ParsedType) -> Self {
        Self {
            common: ParsedCommon::named(name),
            typ,
            ..Self::default()
        }
    }
}

/// A `list` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedList {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// `key` argument: space-separated names of direct child leaves,
    /// order significant.
    pub key: Option<String>,
    /// `unique` arguments, each a space-separated tag tuple.
    pub uniques: Vec<String>,
    /// `min-elements`.
    pub min_elements: Option<u32>,
    /// `max-elements`.
    pub max_elements: Option<u32>,
    /// `ordered-by user`.
    pub ordered_by_user: bool,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Local groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// Child statements.
    pub children: Vec<ParsedNode>,
    /// `action` statements (YANG 1.1).
    pub actions: Vec<ParsedOperation>,
    /// `notification` statements (YANG 1.1).
    pub notifications: Vec<ParsedNotification>,
}

impl ParsedList {
    /// A list with the given key and children.
    #[must_use]
    pub fn new(name: impl Into<String>, key: Option<&str>, children: Vec<ParsedNode>) -> Self {
        Self {
            common: ParsedCommon::named(name),
            key: key.map(str::to_owned),
            children,
            ..Self::default()
        }
    }
}

/// A `choice` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedChoice {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// `default` case name.
    pub default_case: Option<String>,
    /// `mandatory`.
    pub mandatory: Option<bool>,
    /// Case statements or shorthand children.
    pub children: Vec<ParsedNode>,
}

/// A `case` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCase {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// Child statements.
    pub children: Vec<ParsedNode>,
}

/// An `anydata` or `anyxml` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedAny {
    /// Shared statement properties.
    pub common: ParsedCommon,
    /// `mandatory`.
    pub mandatory: Option<bool>,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
}

/// A `refine` overlay inside `uses`, targeting a descendant of the
/// inlined grouping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedRefine {
    /// Descendant schema node-id of the refine target.
    pub target: String,
    /// Replacement `default` values (one for leaf/choice, several for
    /// leaf-list).
    pub defaults: Vec<String>,
    /// Replacement `description`.
    pub description: Option<String>,
    /// Replacement `config`.
    pub config: Option<bool>,
    /// Added `presence`.
    pub presence: Option<String>,
    /// Replacement `mandatory`.
    pub mandatory: Option<bool>,
    /// Replacement `min-elements`.
    pub min_elements: Option<u32>,
    /// Replacement `max-elements`.
    pub max_elements: Option<u32>,
    /// Added `must` constraints.
    pub musts: Vec<ParsedMust>,
    /// Added `if-feature` guards.
    pub if_features: Vec<String>,
}

impl ParsedRefine {
    /// A refine overlay for the given target.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }
}

/// A `uses` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedUses {
    /// Referenced grouping name, possibly prefixed.
    pub name: String,
    /// `when` condition.
    pub when: Option<String>,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
    /// `refine` overlays.
    pub refines: Vec<ParsedRefine>,
    /// `augment` statements into the inlined subtree (descendant targets).
    pub augments: Vec<ParsedAugment>,
    /// Extension instances.
    pub exts: Vec<ParsedExtInstance>,
}

impl ParsedUses {
    /// A bare uses of the named grouping.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A `grouping` statement: an uninstantiated template.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedGrouping {
    /// Grouping name.
    pub name: String,
    /// `status` keyword.
    pub status: Option<String>,
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Nested groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// Template children.
    pub children: Vec<ParsedNode>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedGrouping {
    /// A grouping with the given children.
    #[must_use]
    pub fn new(name: impl Into<String>, children: Vec<ParsedNode>) -> Self {
        Self {
            name: name.into(),
            children,
            ..Self::default()
        }
    }
}

/// An `input` or `output` body of an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedInOut {
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Local groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// `must` constraints.
    pub musts: Vec<ParsedMust>,
    /// Child statements.
    pub children: Vec<ParsedNode>,
}

/// An `rpc` or `action` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedOperation {
    /// Operation name.
    pub name: String,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
    /// `status` keyword.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Local groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// `input` body; materialized empty when absent.
    pub input: Option<ParsedInOut>,
    /// `output` body; materialized empty when absent.
    pub output: Option<ParsedInOut>,
    /// Extension instances.
    pub exts: Vec<ParsedExtInstance>,
}

impl ParsedOperation {
    /// An operation without bodies.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A `notification` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedNotification {
    /// Notification name.
    pub name: String,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
    /// `status` keyword.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
    /// Local typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Local groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// `must` constraints (YANG 1.1).
    pub musts: Vec<ParsedMust>,
    /// Child statements.
    pub children: Vec<ParsedNode>,
    /// Extension instances.
    pub exts: Vec<ParsedExtInstance>,
}

impl ParsedNotification {
    /// A notification with the given children.
    #[must_use]
    pub fn new(name: impl Into<String>, children: Vec<ParsedNode>) -> Self {
        Self {
            name: name.into(),
            children,
            ..Self::default()
        }
    }
}

/// An `augment` statement. At module top level the target is an absolute
/// schema node-id; inside `uses` it is a descendant one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedAugment {
    /// Target schema node-id.
    pub target: String,
    /// `when` condition.
    pub when: Option<String>,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
    /// `status` keyword.
    pub status: Option<String>,
    /// Added child statements.
    pub children: Vec<ParsedNode>,
    /// Added `case`-level operations (augmenting a container/list).
    pub actions: Vec<ParsedOperation>,
    /// Added notifications.
    pub notifications: Vec<ParsedNotification>,
}

impl ParsedAugment {
    /// An augment adding the given children at `target`.
    #[must_use]
    pub fn new(target: impl Into<String>, children: Vec<ParsedNode>) -> Self {
        Self {
            target: target.into(),
            children,
            ..Self::default()
        }
    }
}

/// A schema-tree statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedNode {
    /// `container`
    Container(ParsedContainer),
    /// `leaf`
    Leaf(ParsedLeaf),
    /// `leaf-list`
    LeafList(ParsedLeafList),
    /// `list`
    List(ParsedList),
    /// `choice`
    Choice(ParsedChoice),
    /// `case`
    Case(ParsedCase),
    /// `anydata` (YANG 1.1)
    AnyData(ParsedAny),
    /// `anyxml`
    AnyXml(ParsedAny),
    /// `uses`
    Uses(ParsedUses),
}

impl ParsedNode {
    /// The statement argument (node or grouping name).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Container(n) => &n.common.name,
            Self::Leaf(n) => &n.common.name,
            Self::LeafList(n) => &n.common.name,
            Self::List(n) => &n.common.name,
            Self::Choice(n) => &n.common.name,
            Self::Case(n) => &n.common.name,
            Self::AnyData(n) | Self::AnyXml(n) => &n.common.name,
            Self::Uses(n) => &n.name,
        }
    }

    /// Shared statement properties, absent on `uses`.
    #[must_use]
    pub fn common(&self) -> Option<&ParsedCommon> {
        match self {
            Self::Container(n) => Some(&n.common),
            Self::Leaf(n) => Some(&n.common),
            Self::LeafList(n) => Some(&n.common),
            Self::List(n) => Some(&n.common),
            Self::Choice(n) => Some(&n.common),
            Self::Case(n) => Some(&n.common),
            Self::AnyData(n) | Self::AnyXml(n) => Some(&n.common),
            Self::Uses(_) => None,
        }
    }
}
