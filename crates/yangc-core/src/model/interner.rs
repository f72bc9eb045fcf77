//! Dictionary of interned strings.
//!
//! All identifiers, prefixes and string arguments of a context live in one
//! dictionary; equal strings receive equal [`StrId`]s, so name comparison is
//! id comparison. The dictionary is append-only during a compile.

use std::collections::HashMap;

use super::ids::StrId;

/// Strings at least this long skip deduplication. Long strings are
/// descriptions and pattern bodies, which are almost always unique.
const DEDUP_THRESHOLD: usize = 64;

/// Fast non-cryptographic string hash (FxHash-style).
#[inline]
fn hash_str(s: &str) -> u64 {
    const K: u64 = 0x517c_c1b7_2722_0a95;
    let mut hash = 0u64;
    for byte in s.bytes() {
        hash = hash.rotate_left(5) ^ u64::from(byte);
        hash = hash.wrapping_mul(K);
    }
    hash
}

/// Interned-string dictionary with hash-and-verify deduplication.
///
/// Storage is a single concatenated buffer plus an offsets table; the dedup
/// map stores candidate ids per hash and verifies against the actual bytes,
/// so hash collisions cannot alias two different strings.
#[derive(Clone, Debug)]
pub struct StringInterner {
    /// Concatenated string data.
    data: String,
    /// `offsets[i]` is the byte offset where string `i` starts; the final
    /// entry is the end of the buffer.
    offsets: Vec<u32>,
    /// hash -> candidate ids, verified on lookup.
    dedup: HashMap<u64, Vec<StrId>>,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl StringInterner {
    /// Create an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: String::new(),
            offsets: vec![0],
            dedup: HashMap::new(),
        }
    }

    /// Intern a string and return its id.
    #[allow(clippy::cast_possible_truncation)] // buffer bounded well below u32::MAX in practice
    pub fn intern(&mut self, s: &str) -> StrId {
        if s.len() < DEDUP_THRESHOLD {
            if let Some(candidates) = self.dedup.get(&hash_str(s)) {
                for &id in candidates {
                    if self.get(id) == s {
                        return id;
                    }
                }
            }
        }

        self.data.push_str(s);
        self.offsets.push(self.data.len() as u32);
        let id = StrId::from_index(self.offsets.len() - 2).expect("dictionary overflow");

        if s.len() < DEDUP_THRESHOLD {
            self.dedup.entry(hash_str(s)).or_default().push(id);
        }
        id
    }

    /// Get a string by id. An id from another dictionary yields an empty
    /// string in release builds and asserts in debug builds.
    #[must_use]
    pub fn get(&self, id: StrId) -> &str {
        let idx = id.to_index();
        debug_assert!(idx + 1 < self.offsets.len(), "foreign StrId {idx}");
        let start = self.offsets.get(idx).map_or(0, |&v| v as usize);
        let end = self.offsets.get(idx + 1).map_or(start, |&v| v as usize);
        self.data.get(start..end).unwrap_or("")
    }

    /// Find an already-interned string without inserting it.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<StrId> {
        if s.len() < DEDUP_THRESHOLD {
            let candidates = self.dedup.get(&hash_str(s))?;
            return candidates.iter().copied().find(|&id| self.get(id) == s);
        }
        // Long strings are not in the dedup map; scan the offsets table.
        self.offsets.windows(2).enumerate().find_map(|(idx, w)| {
            (self.data.get(w[0] as usize..w[1] as usize) == Some(s))
                .then(|| StrId::from_index(idx))
                .flatten()
        })
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decompose into raw parts for serialization.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<u32>) {
        (self.data, self.offsets)
    }

    /// Rebuild from raw parts, restoring the dedup map.
    #[must_use]
    pub fn from_parts(data: String, offsets: Vec<u32>) -> Self {
        debug_assert!(!offsets.is_empty(), "offsets table must hold the initial 0");
        debug_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));

        let mut interner = Self {
            data,
            offsets,
            dedup: HashMap::new(),
        };
        for idx in 0..interner.len() {
            let Some(id) = StrId::from_index(idx) else { break };
            let s = interner.get(id);
            if s.len() < DEDUP_THRESHOLD {
                let hash = hash_str(s);
                interner.dedup.entry(hash).or_default().push(id);
            }
        }
        interner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_get() {
        let mut dict = StringInterner::new();
        let id = dict.intern("interface");
        assert_eq!(dict.get(id), "interface");
    }

    #[test]
    fn test_equal_strings_equal_ids() {
        let mut dict = StringInterner::new();
        let a = dict.intern("mtu");
        let b = dict.intern("mtu");
        assert_eq!(a, b);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_distinct_strings_distinct_ids() {
        let mut dict = StringInterner::new();
        let a = dict.intern("name");
        let b = dict.intern("type");
        assert_ne!(a, b);
        assert_eq!(dict.get(a), "name");
        assert_eq!(dict.get(b), "type");
    }

    #[test]
    fn test_empty_string() {
        let mut dict = StringInterner::new();
        let id = dict.intern("");
        assert_eq!(dict.get(id), "");
    }

    #[test]
    fn test_find() {
        let mut dict = StringInterner::new();
        let id = dict.intern("enabled");
        assert_eq!(dict.find("enabled"), Some(id));
        assert_eq!(dict.find("disabled"), None);
    }

    #[test]
    fn test_long_strings_stored_but_not_deduped() {
        let mut dict = StringInterner::new();
        let long = "d".repeat(100);
        let a = dict.intern(&long);
        let b = dict.intern(&long);
        assert_ne!(a, b);
        assert_eq!(dict.get(a), long);
        assert_eq!(dict.find(&long), Some(a));
    }

    #[test]
    fn test_parts_round_trip() {
        let mut dict = StringInterner::new();
        let a = dict.intern("config");
        let b = dict.intern("state");
        let (data, offsets) = dict.into_parts();
        let mut restored = StringInterner::from_parts(data, offsets);
        assert_eq!(restored.get(a), "config");
        assert_eq!(restored.get(b), "state");
        // Dedup map is rebuilt, so re-interning still dedups.
        assert_eq!(restored.intern("config"), a);
    }
}
