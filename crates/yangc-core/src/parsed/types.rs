//! Parsed type references and their restrictions.

/// A `pattern` statement with its modifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedPattern {
    /// Regular expression text.
    pub expr: String,
    /// `modifier invert-match`.
    pub invert: bool,
}

impl ParsedPattern {
    /// A plain (non-inverted) pattern.
    #[must_use]
    pub fn new(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            invert: false,
        }
    }
}

/// An `enum` statement inside an enumeration type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedEnum {
    /// Assigned name.
    pub name: String,
    /// Explicit `value`, if given.
    pub value: Option<i64>,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
}

impl ParsedEnum {
    /// An enum without an explicit value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// An enum with an explicit value.
    #[must_use]
    pub fn with_value(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            if_features: Vec::new(),
        }
    }
}

/// A `bit` statement inside a bits type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedBit {
    /// Assigned name.
    pub name: String,
    /// Explicit `position`, if given.
    pub position: Option<u32>,
    /// `if-feature` guards.
    pub if_features: Vec<String>,
}

impl ParsedBit {
    /// A bit without an explicit position.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A parsed `type` statement: the referenced name plus any restrictions
/// added at this site. The name may be prefixed or a built-in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedType {
    /// Referenced type name, possibly `prefix:name`.
    pub name: String,
    /// `range` expression, e.g. `"-100..100"` or `"2..10|15"`.
    pub range: Option<String>,
    /// `length` expression.
    pub length: Option<String>,
    /// `pattern` statements.
    pub patterns: Vec<ParsedPattern>,
    /// `enum` statements (base `enumeration`).
    pub enums: Vec<ParsedEnum>,
    /// `bit` statements (base `bits`).
    pub bits: Vec<ParsedBit>,
    /// `fraction-digits` (base `decimal64`).
    pub fraction_digits: Option<u8>,
    /// `path` (base `leafref`).
    pub path: Option<String>,
    /// `require-instance` (leafref, instance-identifier).
    pub require_instance: Option<bool>,
    /// `base` identities (base `identityref`), possibly prefixed.
    pub bases: Vec<String>,
    /// Member types (base `union`).
    pub union_types: Vec<ParsedType>,
}

impl ParsedType {
    /// A bare type reference without restrictions.
    #[must_use]
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A type reference with a `range` restriction.
    #[must_use]
    pub fn ranged(name: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: Some(range.into()),
            ..Self::default()
        }
    }

    /// A leafref with the given path.
    #[must_use]
    pub fn leafref(path: impl Into<String>) -> Self {
        Self {
            name: "leafref".into(),
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// A union over the given member types.
    #[must_use]
    pub fn union(members: Vec<ParsedType>) -> Self {
        Self {
            name: "union".into(),
            union_types: members,
            ..Self::default()
        }
    }

    /// Whether this reference adds any restriction of its own.
    #[must_use]
    pub fn has_restrictions(&self) -> bool {
        self.range.is_some()
            || self.length.is_some()
            || !self.patterns.is_empty()
            || !self.enums.is_empty()
            || !self.bits.is_empty()
            || self.fraction_digits.is_some()
            || self.path.is_some()
            || self.require_instance.is_some()
            || !self.bases.is_empty()
            || !self.union_types.is_empty()
    }
}

/// A `typedef` statement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedTypedef {
    /// Typedef name.
    pub name: String,
    /// The referenced type with restrictions.
    pub typ: ParsedType,
    /// `units`.
    pub units: Option<String>,
    /// `default`.
    pub default: Option<String>,
    /// `status` keyword, `current` when absent.
    pub status: Option<String>,
    /// `description`.
    pub description: Option<String>,
}

impl ParsedTypedef {
    /// A typedef without metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, typ: ParsedType) -> Self {
        Self {
            name: name.into(),
            typ,
            ..Self::default()
        }
    }
}
