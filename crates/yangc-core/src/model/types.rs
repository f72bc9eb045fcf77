//! Compiled types.
//!
//! A [`CompiledType`] is the frozen, fully-composed representation of a YANG
//! type at a given use site: the base-type tag of the eventual built-in base
//! plus the intersection of all restrictions along the typedef chain.
//! Compiled typedefs are shared; a use site only allocates a fresh record
//! when it adds restrictions of its own.

use super::ids::{IdentityId, ModuleId, NodeId, StrId, TypeId};
use crate::path::ParsedPath;

/// YANG built-in base type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaseType {
    /// Any binary data (base64 on the wire).
    Binary,
    /// A set of named bits.
    Bits,
    /// "true" or "false".
    Boolean,
    /// 64-bit signed decimal number.
    Decimal64,
    /// A leaf that carries no value.
    Empty,
    /// One of a set of named values.
    Enumeration,
    /// A reference into the identity lattice.
    Identityref,
    /// A reference to a data-tree instance.
    InstanceIdentifier,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// A reference to another leaf's value.
    Leafref,
    /// Human-readable string.
    String,
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
    /// 64-bit unsigned integer.
    Uint64,
    /// Choice of member types.
    Union,
}

impl BaseType {
    /// Recognize a built-in type name. Built-ins never go through the
    /// reference resolver.
    #[must_use]
    pub fn from_ident(name: &str) -> Option<Self> {
        Some(match name {
            "binary" => Self::Binary,
            "bits" => Self::Bits,
            "boolean" => Self::Boolean,
            "decimal64" => Self::Decimal64,
            "empty" => Self::Empty,
            "enumeration" => Self::Enumeration,
            "identityref" => Self::Identityref,
            "instance-identifier" => Self::InstanceIdentifier,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "leafref" => Self::Leafref,
            "string" => Self::String,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "union" => Self::Union,
            _ => return None,
        })
    }

    /// The YANG name of the base type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Bits => "bits",
            Self::Boolean => "boolean",
            Self::Decimal64 => "decimal64",
            Self::Empty => "empty",
            Self::Enumeration => "enumeration",
            Self::Identityref => "identityref",
            Self::InstanceIdentifier => "instance-identifier",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Leafref => "leafref",
            Self::String => "string",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Union => "union",
        }
    }

    /// Whether `range` applies to this base.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
                | Self::Decimal64
        )
    }

    /// Whether `length` applies to this base.
    #[must_use]
    pub fn has_length(&self) -> bool {
        matches!(self, Self::String | Self::Binary)
    }

    /// Inclusive value bounds of an integer base, scaled bounds for
    /// decimal64. `None` for non-numeric bases.
    #[must_use]
    pub fn value_bounds(&self) -> Option<(i128, i128)> {
        Some(match self {
            Self::Int8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::Int16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::Int32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::Int64 | Self::Decimal64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::Uint8 => (0, i128::from(u8::MAX)),
            Self::Uint16 => (0, i128::from(u16::MAX)),
            Self::Uint32 => (0, i128::from(u32::MAX)),
            Self::Uint64 => (0, i128::from(u64::MAX)),
            _ => return None,
        })
    }
}

impl core::fmt::Display for BaseType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition status.
///
/// Ordered: `current` < `deprecated` < `obsolete`. A definition may only
/// reference definitions of equal or lower status within the same module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Currently in use.
    #[default]
    Current,
    /// Being phased out.
    Deprecated,
    /// No longer in use.
    Obsolete,
}

impl Status {
    /// The YANG keyword for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Deprecated => "deprecated",
            Self::Obsolete => "obsolete",
        }
    }
}

/// A sorted union of closed intervals over the numeric or length domain.
///
/// Range and length restrictions are normalized into this shape; subset
/// verification between a derived type and its base is interval containment.
/// Decimal64 values are scaled by `10^fraction-digits` before storage.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Intervals {
    /// Sorted, non-overlapping `(lo, hi)` pairs, both inclusive.
    pub parts: Vec<(i128, i128)>,
}

impl Intervals {
    /// Create from already-sorted, non-overlapping parts.
    #[must_use]
    pub fn new(parts: Vec<(i128, i128)>) -> Self {
        debug_assert!(parts.windows(2).all(|w| w[0].1 < w[1].0));
        Self { parts }
    }

    /// Whether a value falls inside any interval.
    #[must_use]
    pub fn contains(&self, value: i128) -> bool {
        self.parts.iter().any(|&(lo, hi)| lo <= value && value <= hi)
    }

    /// Whether every interval of `self` is covered by some interval of
    /// `other`. Intervals never span a gap of the parent, so per-part
    /// containment is sufficient.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.parts
            .iter()
            .all(|&(lo, hi)| other.parts.iter().any(|&(plo, phi)| plo <= lo && hi <= phi))
    }

    /// Smallest allowed value.
    #[must_use]
    pub fn min(&self) -> Option<i128> {
        self.parts.first().map(|&(lo, _)| lo)
    }

    /// Largest allowed value.
    #[must_use]
    pub fn max(&self) -> Option<i128> {
        self.parts.last().map(|&(_, hi)| hi)
    }
}

/// A compiled `pattern` restriction.
///
/// Patterns accumulate along the typedef chain; a value satisfies the type
/// iff it matches every non-inverted pattern and no inverted pattern. The
/// expression is validated with the `regex` crate at compile time and kept
/// as text; matching anchors the whole value per XSD semantics.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledPattern {
    /// The regular expression text.
    pub expr: StrId,
    /// `invert-match` modifier.
    pub invert: bool,
}

/// One value of a compiled enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnumItem {
    /// Assigned name.
    pub name: StrId,
    /// Assigned or auto-allocated value.
    pub value: i32,
}

/// One bit of a compiled bits type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BitItem {
    /// Assigned name.
    pub name: StrId,
    /// Assigned or auto-allocated position.
    pub position: u32,
}

/// Leafref payload. The path is parsed at type-compile time and resolved
/// during the final validation sweep.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafrefSpec {
    /// Original path text.
    pub path_text: StrId,
    /// Parsed but unresolved path.
    pub path: ParsedPath,
    /// Whether a target instance must exist in the data tree.
    pub require_instance: bool,
    /// Resolved target node, set by the validation pass.
    pub target: Option<NodeId>,
    /// The target's compiled type, set by the validation pass.
    pub realtype: Option<TypeId>,
}

/// A compiled type record.
///
/// Flat layout: the base tag plus optional restriction payloads. Fields not
/// applicable to the base stay `None`/empty.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledType {
    /// Type identifier.
    pub id: TypeId,
    /// Typedef name; `None` for anonymous use-site compositions.
    pub name: Option<StrId>,
    /// Defining module; `None` for built-ins.
    pub module: Option<ModuleId>,
    /// Base-type tag inherited from the eventual built-in base.
    pub base: BaseType,
    /// Preceding typedef in the derivation chain.
    pub parent: Option<TypeId>,
    /// Definition status.
    pub status: Status,
    /// `units`, inherited along the chain.
    pub units: Option<StrId>,
    /// Typedef-level default value.
    pub default: Option<StrId>,
    /// Composed `range` restriction.
    pub range: Option<Intervals>,
    /// Composed `length` restriction.
    pub length: Option<Intervals>,
    /// Accumulated patterns, outermost last.
    pub patterns: Vec<CompiledPattern>,
    /// Enumeration values (base `enumeration`).
    pub enums: Vec<EnumItem>,
    /// Bit definitions (base `bits`).
    pub bits: Vec<BitItem>,
    /// Fraction digits (base `decimal64`), fixed where first specified.
    pub fraction_digits: Option<u8>,
    /// Leafref payload (base `leafref`).
    pub leafref: Option<LeafrefSpec>,
    /// Resolved `base` identities (base `identityref`).
    pub bases: Vec<IdentityId>,
    /// Member types (base `union`), nested unions flattened.
    pub members: Vec<TypeId>,
    /// `require-instance` (base `instance-identifier`).
    pub require_instance: Option<bool>,
}

impl CompiledType {
    /// Create a bare record for the given base.
    #[must_use]
    pub fn new(id: TypeId, base: BaseType) -> Self {
        Self {
            id,
            name: None,
            module: None,
            base,
            parent: None,
            status: Status::Current,
            units: None,
            default: None,
            range: None,
            length: None,
            patterns: Vec::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            fraction_digits: None,
            leafref: None,
            bases: Vec::new(),
            members: Vec::new(),
            require_instance: None,
        }
    }

    /// Whether the record carries any restriction payload beyond the base.
    #[must_use]
    pub fn has_restrictions(&self) -> bool {
        self.range.is_some()
            || self.length.is_some()
            || !self.patterns.is_empty()
            || !self.enums.is_empty()
            || !self.bits.is_empty()
            || self.fraction_digits.is_some()
            || self.leafref.is_some()
            || !self.bases.is_empty()
            || !self.members.is_empty()
            || self.require_instance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_recognition() {
        assert_eq!(BaseType::from_ident("int32"), Some(BaseType::Int32));
        assert_eq!(BaseType::from_ident("leafref"), Some(BaseType::Leafref));
        assert_eq!(
            BaseType::from_ident("instance-identifier"),
            Some(BaseType::InstanceIdentifier)
        );
        assert_eq!(BaseType::from_ident("my-type"), None);
        assert_eq!(BaseType::from_ident("Int32"), None);
    }

    #[test]
    fn test_all_builtins_round_trip() {
        for name in [
            "binary",
            "bits",
            "boolean",
            "decimal64",
            "empty",
            "enumeration",
            "identityref",
            "instance-identifier",
            "int8",
            "int16",
            "int32",
            "int64",
            "leafref",
            "string",
            "uint8",
            "uint16",
            "uint32",
            "uint64",
            "union",
        ] {
            let base = BaseType::from_ident(name).unwrap();
            assert_eq!(base.as_str(), name);
        }
    }

    #[test]
    fn test_status_ordering() {
        assert!(Status::Current < Status::Deprecated);
        assert!(Status::Deprecated < Status::Obsolete);
    }

    #[test]
    fn test_intervals_contains() {
        let iv = Intervals::new(vec![(2, 10), (15, 15)]);
        assert!(iv.contains(2));
        assert!(iv.contains(10));
        assert!(iv.contains(15));
        assert!(!iv.contains(11));
        assert!(!iv.contains(1));
    }

    #[test]
    fn test_intervals_subset() {
        let parent = Intervals::new(vec![(-100, 100)]);
        let inside = Intervals::new(vec![(-25, 50)]);
        let outside = Intervals::new(vec![(-25, 50), (100, 200)]);
        assert!(inside.is_subset_of(&parent));
        assert!(!outside.is_subset_of(&parent));
        assert!(parent.is_subset_of(&parent));
    }

    #[test]
    fn test_value_bounds() {
        assert_eq!(BaseType::Uint8.value_bounds(), Some((0, 255)));
        assert_eq!(
            BaseType::Int64.value_bounds(),
            Some((i128::from(i64::MIN), i128::from(i64::MAX)))
        );
        assert_eq!(BaseType::String.value_bounds(), None);
    }
}
