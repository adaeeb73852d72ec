//! Sparse property storage shared by every stored object
//!
//! Every persisted node and edge carries an ordered flat list of
//! (key, value) pairs. The key namespace is closed: anything outside
//! [`PropertyKey`] cannot be stored, and the compact serialization path
//! rejects payloads carrying an unknown tag.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use thiserror::Error;

/// Errors raised at the property and compact-serialization boundary
#[derive(Error, Debug)]
pub enum PropertyError {
    /// Textual key outside the closed namespace
    #[error("Unknown property key: {0}")]
    UnknownKey(String),

    /// Compact tag outside the closed namespace
    #[error("Unknown property tag: {0}")]
    UnknownTag(u8),

    /// Compact payload failed to encode or decode
    #[error("Compact codec failure: {0}")]
    Codec(#[from] bincode::Error),
}

pub type PropertyResult<T> = Result<T, PropertyError>;

/// The closed property key namespace.
///
/// Each key maps to a stable one-byte tag used by the compact
/// serialization path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Creation time, Unix milliseconds
    CreationDate,
    /// Textual identifier of the creating node (non-owning lookup key)
    Creator,
    /// Ancestor tag
    AncestorId,
    /// Predecessor tag
    PredecessorId,
    /// Marks an object that should not survive a flush
    Ephemeral,
    /// Namespace grouping tag
    Namespace,
    /// Bulk-import origin tag
    Import,
    /// Contextual grouping a fact belongs to
    Context,
    /// Module-specific tag prefix
    ModuleTag,
    /// Provenance of the assertion
    Provenance,
}

impl PropertyKey {
    pub const ALL: [PropertyKey; 10] = [
        PropertyKey::CreationDate,
        PropertyKey::Creator,
        PropertyKey::AncestorId,
        PropertyKey::PredecessorId,
        PropertyKey::Ephemeral,
        PropertyKey::Namespace,
        PropertyKey::Import,
        PropertyKey::Context,
        PropertyKey::ModuleTag,
        PropertyKey::Provenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::CreationDate => "creationDate",
            PropertyKey::Creator => "creator",
            PropertyKey::AncestorId => "ancestor",
            PropertyKey::PredecessorId => "predecessor",
            PropertyKey::Ephemeral => "ephemeral",
            PropertyKey::Namespace => "namespace",
            PropertyKey::Import => "import",
            PropertyKey::Context => "context",
            PropertyKey::ModuleTag => "module",
            PropertyKey::Provenance => "provenance",
        }
    }

    /// Resolve a textual key. Unknown keys are rejected, never stored.
    pub fn parse(name: &str) -> PropertyResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| PropertyError::UnknownKey(name.to_string()))
    }

    /// One-byte tag used by the compact serialization path.
    pub fn tag(&self) -> u8 {
        match self {
            PropertyKey::CreationDate => 0,
            PropertyKey::Creator => 1,
            PropertyKey::AncestorId => 2,
            PropertyKey::PredecessorId => 3,
            PropertyKey::Ephemeral => 4,
            PropertyKey::Namespace => 5,
            PropertyKey::Import => 6,
            PropertyKey::Context => 7,
            PropertyKey::ModuleTag => 8,
            PropertyKey::Provenance => 9,
        }
    }

    pub fn from_tag(tag: u8) -> PropertyResult<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(PropertyError::UnknownTag(tag))
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered flat property list with a per-object mutual-exclusion scope.
///
/// Writers to the same object serialize on the internal mutex; writers
/// to different objects never contend. Reads hand out copies, so a
/// caller can never mutate stored state through a returned value.
#[derive(Debug, Default)]
pub struct Properties {
    pairs: Mutex<Vec<(PropertyKey, String)>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the list with creation metadata: the creator's textual
    /// identifier (when known) followed by the creation date in Unix
    /// milliseconds.
    pub fn with_creation(creator: Option<String>) -> Self {
        let mut pairs = Vec::with_capacity(2);
        if let Some(creator) = creator {
            pairs.push((PropertyKey::Creator, creator));
        }
        pairs.push((PropertyKey::CreationDate, Utc::now().timestamp_millis().to_string()));
        Self {
            pairs: Mutex::new(pairs),
        }
    }

    /// Linear-scan lookup. Absence is a normal result.
    pub fn get(&self, key: PropertyKey) -> Option<String> {
        self.pairs
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
    }

    /// Upsert: overwrite in place when the key exists, append otherwise.
    pub fn put(&self, key: PropertyKey, value: impl Into<String>) {
        let value = value.into();
        let mut pairs = self.pairs.lock().unwrap();
        if let Some(slot) = pairs.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            pairs.push((key, value));
        }
    }

    /// Compacting delete. Removing an absent key is a no-op.
    pub fn remove(&self, key: PropertyKey) {
        self.pairs.lock().unwrap().retain(|(k, _)| *k != key);
    }

    /// Defensive copy of the whole list, in storage order.
    pub fn snapshot(&self) -> Vec<(PropertyKey, String)> {
        self.pairs.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.pairs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.lock().unwrap().is_empty()
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.get(PropertyKey::CreationDate)
            .and_then(|millis| millis.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }

    pub fn creator(&self) -> Option<String> {
        self.get(PropertyKey::Creator)
    }

    /// Map the list to (tag, value) pairs for the compact path.
    pub fn to_tagged(&self) -> Vec<(u8, String)> {
        self.pairs
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.tag(), v.clone()))
            .collect()
    }

    /// Rebuild from (tag, value) pairs. Any tag outside the closed
    /// namespace fails the whole payload.
    pub fn from_tagged(tagged: Vec<(u8, String)>) -> PropertyResult<Self> {
        let mut pairs = Vec::with_capacity(tagged.len());
        for (tag, value) in tagged {
            pairs.push((PropertyKey::from_tag(tag)?, value));
        }
        Ok(Self {
            pairs: Mutex::new(pairs),
        })
    }
}

impl Clone for Properties {
    fn clone(&self) -> Self {
        Self {
            pairs: Mutex::new(self.snapshot()),
        }
    }
}
