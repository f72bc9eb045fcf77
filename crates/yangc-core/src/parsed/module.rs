//! Parsed module and submodule statements.

use super::node::{
    ParsedAugment, ParsedExtInstance, ParsedGrouping, ParsedNode, ParsedNotification,
    ParsedOperation,
};
use super::types::{ParsedType, ParsedTypedef};

/// An `import` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedImport {
    /// Imported module name.
    pub module: String,
    /// Prefix bound to the import.
    pub prefix: String,
    /// `revision-date`, if pinned.
    pub revision: Option<String>,
}

impl ParsedImport {
    /// An import without a pinned revision.
    #[must_use]
    pub fn new(module: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            prefix: prefix.into(),
            revision: None,
        }
    }
}

/// An `include` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedInclude {
    /// Included submodule name.
    pub submodule: String,
    /// `revision-date`, if pinned.
    pub revision: Option<String>,
}

/// A `revision` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedRevision {
    /// `YYYY-MM-DD` date.
    pub date: String,
    /// Revision description.
    pub description: Option<String>,
}

impl ParsedRevision {
    /// A revision entry with just a date.
    #[must_use]
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            description: None,
        }
    }
}

/// A `feature` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedFeature {
    /// Feature name.
    pub name: String,
    /// `if-feature` guards over other features.
    pub if_features: Vec<String>,
    /// `status` keyword.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedFeature {
    /// A feature without guards.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// An `identity` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedIdentity {
    /// Identity name.
    pub name: String,
    /// `base` identities, possibly prefixed; several allowed in YANG 1.1.
    pub bases: Vec<String>,
    /// `status` keyword.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedIdentity {
    /// An identity with the given bases.
    #[must_use]
    pub fn new(name: impl Into<String>, bases: &[&str]) -> Self {
        Self {
            name: name.into(),
            bases: bases.iter().map(|s| (*s).to_owned()).collect(),
            ..Self::default()
        }
    }
}

/// An `extension` statement (definition, not instance).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedExtensionDef {
    /// Extension name.
    pub name: String,
    /// `argument` name, if the extension takes one.
    pub argument: Option<String>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedExtensionDef {
    /// An extension definition without an argument.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// One `deviate` substatement of a deviation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedDeviate {
    /// `deviate not-supported`: remove the target.
    NotSupported,
    /// `deviate add`: add properties that must not be present yet.
    Add(DeviateProperties),
    /// `deviate replace`: replace properties that must be present.
    Replace(DeviateProperties),
    /// `deviate delete`: remove properties matching the given values.
    Delete(DeviateProperties),
}

/// Properties carried by `deviate add`/`replace`/`delete`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviateProperties {
    /// `type` (replace only).
    pub typ: Option<ParsedType>,
    /// `units`.
    pub units: Option<String>,
    /// `default` values.
    pub defaults: Vec<String>,
    /// `config`.
    pub config: Option<bool>,
    /// `mandatory`.
    pub mandatory: Option<bool>,
    /// `min-elements`.
    pub min_elements: Option<u32>,
    /// `max-elements`.
    pub max_elements: Option<u32>,
    /// `must` expressions.
    pub musts: Vec<String>,
    /// `unique` tags.
    pub uniques: Vec<String>,
}

/// A `deviation` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDeviation {
    /// Absolute schema node-id of the target.
    pub target: String,
    /// `description`.
    pub description: Option<String>,
    /// The `deviate` substatements in order.
    pub deviates: Vec<ParsedDeviate>,
}

impl Default for ParsedDeviate {
    fn default() -> Self {
        Self::NotSupported
    }
}

/// A parsed module or submodule, as delivered by the YANG/YIN parser.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedModule {
    /// Module or submodule name.
    pub name: String,
    /// XML namespace; `None` on submodules.
    pub namespace: Option<String>,
    /// The module's own prefix.
    pub prefix: String,
    /// `yang-version` argument, `"1"` when absent.
    pub yang_version: Option<String>,
    /// `belongs-to` parent module; `Some` iff this is a submodule.
    pub belongs_to: Option<String>,
    /// `import` statements.
    pub imports: Vec<ParsedImport>,
    /// `include` statements.
    pub includes: Vec<ParsedInclude>,
    /// `revision` statements, any order.
    pub revisions: Vec<ParsedRevision>,
    /// `feature` statements.
    pub features: Vec<ParsedFeature>,
    /// `identity` statements.
    pub identities: Vec<ParsedIdentity>,
    /// `extension` statements.
    pub extensions: Vec<ParsedExtensionDef>,
    /// Top-level typedefs.
    pub typedefs: Vec<ParsedTypedef>,
    /// Top-level groupings.
    pub groupings: Vec<ParsedGrouping>,
    /// Top-level data statements.
    pub data: Vec<ParsedNode>,
    /// `rpc` statements.
    pub rpcs: Vec<ParsedOperation>,
    /// Top-level `notification` statements.
    pub notifications: Vec<ParsedNotification>,
    /// Top-level `augment` statements (absolute targets).
    pub augments: Vec<ParsedAugment>,
    /// `deviation` statements.
    pub deviations: Vec<ParsedDeviation>,
    /// Extension instances on the module statement.
    pub exts: Vec<ParsedExtInstance>,
    /// `organization`.
    pub organization: Option<String>,
    /// `contact`.
    pub contact: Option<String>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedModule {
    /// A module skeleton with name, namespace and prefix.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// A submodule skeleton belonging to `parent`.
    #[must_use]
    pub fn submodule(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            belongs_to: Some(parent.into()),
            ..Self::default()
        }
    }

    /// Whether this is a submodule.
    #[must_use]
    pub fn is_submodule(&self) -> bool {
        self.belongs_to.is_some()
    }

    /// The newest revision date, if any revision is present.
    #[must_use]
    pub fn latest_revision_date(&self) -> Option<&str> {
        self.revisions
            .iter()
            .map(|r| r.date.as_str())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_revision_date() {
        let mut module = ParsedModule::new("m", "urn:m", "m");
        assert_eq!(module.latest_revision_date(), None);
        module.revisions.push(ParsedRevision::new("2023-01-15"));
        module.revisions.push(ParsedRevision::new("2024-06-30"));
        module.revisions.push(ParsedRevision::new("2022-12-01"));
        assert_eq!(module.latest_revision_date(), Some("2024-06-30"));
    }

    #[test]
    fn test_submodule() {
        let sub = ParsedModule::submodule("m-types", "m");
        assert!(sub.is_submodule());
        assert_eq!(sub.belongs_to.as_deref(), Some("m"));
        assert!(sub.namespace.is_none());
    }
}
