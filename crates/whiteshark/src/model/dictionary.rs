//! First-occurrence dictionaries for class and property names.
//!
//! Encoder and decoder build their dictionaries independently, in the same
//! depth-first order, so index `i` denotes the same entry on both sides.
//! Indices are never derived from hashing or sorting.

use std::borrow::Borrow;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::limits::MAX_DICT_SIZE;
use crate::model::TypeRef;

/// Outcome of resolving a key against a dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// True when the key was not seen before and has just been recorded.
    pub first: bool,
    /// Index of the key.
    pub index: u16,
}

/// Reasons a dictionary refuses an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryError {
    /// All 65536 indices are taken.
    Full,
    /// The key is already recorded at `index`.
    Duplicate { index: u16 },
}

/// Append-only dictionary assigning sequential indices by first occurrence.
///
/// Uses FxHashMap for the reverse lookup.
#[derive(Debug, Clone)]
pub struct Dictionary<K> {
    entries: Vec<K>,
    indices: FxHashMap<K, u16>,
}

impl<K> Default for Dictionary<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            indices: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash + Clone> Dictionary<K> {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `key`, recording it first if it is new.
    pub fn resolve<Q>(&mut self, key: &Q) -> Result<Resolved, DictionaryError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(&index) = self.indices.get(key) {
            return Ok(Resolved {
                first: false,
                index,
            });
        }
        let index = self.push(key.to_owned())?;
        Ok(Resolved { first: true, index })
    }

    /// Records a key that must not be present yet.
    ///
    /// This is the decoder side: a full name on the wire always denotes a
    /// first occurrence.
    pub fn append(&mut self, key: K) -> Result<u16, DictionaryError> {
        if let Some(&index) = self.indices.get(&key) {
            return Err(DictionaryError::Duplicate { index });
        }
        self.push(key)
    }

    fn push(&mut self, key: K) -> Result<u16, DictionaryError> {
        if self.entries.len() >= MAX_DICT_SIZE {
            return Err(DictionaryError::Full);
        }
        let index = self.entries.len() as u16;
        self.indices.insert(key.clone(), index);
        self.entries.push(key);
        Ok(index)
    }

    /// Looks up an entry by index.
    pub fn get(&self, index: u16) -> Option<&K> {
        self.entries.get(usize::from(index))
    }

    /// Returns the index of a recorded key.
    pub fn index_of<Q>(&self, key: &Q) -> Option<u16>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.indices.get(key).copied()
    }

    /// Returns the entries in index order.
    pub fn entries(&self) -> &[K] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.indices.clear();
    }
}

/// Class and property dictionaries of one encode or decode call.
///
/// A value of this type is owned by exactly one in-flight call and dropped
/// with it.
#[derive(Debug, Clone, Default)]
pub struct Dictionaries {
    /// Classes and array element types.
    pub classes: Dictionary<TypeRef>,
    /// Property names.
    pub properties: Dictionary<String>,
}

impl Dictionaries {
    /// Creates empty dictionaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets every entry of both dictionaries.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.properties.clear();
    }
}
