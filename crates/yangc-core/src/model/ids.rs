//! Index types for schema storage.
//!
//! All arena references are `NonZeroU32` wrappers so that `Option<Id>` costs
//! no extra space. Ids are stable for the lifetime of their owning context.

use core::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create from a raw 1-based value.
            #[must_use]
            pub const fn from_raw(raw: u32) -> Option<Self> {
                match NonZeroU32::new(raw) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// Create from a 0-based arena index.
            #[must_use]
            pub fn from_index(index: usize) -> Option<Self> {
                u32::try_from(index + 1).ok().and_then(Self::from_raw)
            }

            /// Raw 1-based value.
            #[must_use]
            pub const fn to_raw(self) -> u32 {
                self.0.get()
            }

            /// 0-based arena index.
            #[must_use]
            pub const fn to_index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }
    };
}

define_id!(
    /// Interned string identifier.
    StrId
);

define_id!(
    /// Compiled module identifier.
    ModuleId
);

define_id!(
    /// Compiled schema node identifier.
    NodeId
);

define_id!(
    /// Compiled type identifier.
    TypeId
);

define_id!(
    /// Compiled identity identifier.
    IdentityId
);

define_id!(
    /// Compiled feature identifier.
    FeatureId
);

define_id!(
    /// Extension definition identifier.
    ExtensionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_invalid() {
        assert!(NodeId::from_raw(0).is_none());
    }

    #[test]
    fn test_index_round_trip() {
        let id = TypeId::from_index(41).unwrap();
        assert_eq!(id.to_raw(), 42);
        assert_eq!(id.to_index(), 41);
    }

    #[test]
    fn test_option_is_niche_optimized() {
        assert_eq!(
            core::mem::size_of::<Option<NodeId>>(),
            core::mem::size_of::<NodeId>()
        );
    }
}
