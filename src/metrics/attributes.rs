//! Attribute sets: the identity of a time series within one metric.
//!
//! Updates arrive with attribute pairs in arbitrary order; identity must
//! not depend on that order. Canonicalization sorts by key, keeps the
//! last value for duplicate keys, and drops keys outside the configured
//! interesting set before identity is computed.

use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A hashable attribute value.
#[derive(Debug, Clone)]
pub enum AttrValue {
    /// UTF-8 string value
    Str(Arc<str>),
    /// Signed 64-bit integer value
    Long(i64),
    /// 64-bit float value, compared and hashed by bit pattern
    Double(f64),
    /// Boolean value
    Bool(bool),
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Str(a), AttrValue::Str(b)) => a == b,
            (AttrValue::Long(a), AttrValue::Long(b)) => a == b,
            (AttrValue::Double(a), AttrValue::Double(b)) => a.to_bits() == b.to_bits(),
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttrValue {}

impl Hash for AttrValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            AttrValue::Str(s) => {
                state.write_u8(0);
                s.hash(state);
            },
            AttrValue::Long(v) => {
                state.write_u8(1);
                v.hash(state);
            },
            AttrValue::Double(v) => {
                state.write_u8(2);
                v.to_bits().hash(state);
            },
            AttrValue::Bool(v) => {
                state.write_u8(3);
                v.hash(state);
            },
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(Arc::from(s))
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(Arc::from(s))
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Long(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Double(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// One attribute pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue {
    /// Attribute key
    pub key: Arc<str>,
    /// Attribute value
    pub value: AttrValue,
}

impl KeyValue {
    /// Creates an attribute pair.
    pub fn new(key: impl Into<Arc<str>>, value: impl Into<AttrValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A canonicalized attribute set: sorted keys, unique keys, stable
/// identity regardless of input order. Cloning is cheap (shared slice).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSet {
    pairs: Arc<[KeyValue]>,
}

impl AttributeSet {
    /// The empty attribute set.
    pub fn empty() -> Self {
        Self {
            pairs: Arc::from(Vec::new()),
        }
    }

    /// Canonicalizes raw attribute pairs. When `interesting` is set, keys
    /// outside it are dropped before identity is computed.
    pub fn from_kvs(kvs: &[KeyValue], interesting: Option<&[Arc<str>]>) -> Self {
        let mut scratch: SmallVec<[KeyValue; 8]> = kvs
            .iter()
            .filter(|kv| match interesting {
                Some(keys) => keys.iter().any(|k| *k == kv.key),
                None => true,
            })
            .cloned()
            .collect();

        // Stable sort keeps input order within equal keys, so dedup can
        // keep the last-written value.
        scratch.sort_by(|a, b| a.key.cmp(&b.key));
        let mut scratch = scratch.into_vec();
        scratch.dedup_by(|later, earlier| {
            if later.key == earlier.key {
                earlier.value = later.value.clone();
                true
            } else {
                false
            }
        });

        Self {
            pairs: scratch.into(),
        }
    }

    /// The canonical pairs, sorted by key.
    pub fn pairs(&self) -> &[KeyValue] {
        &self.pairs
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pairs survived canonicalization.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
