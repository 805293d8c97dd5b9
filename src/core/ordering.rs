//! Variable ordering.
//!
//! The ordering decides how tangent increments are laid out in the linear system
//! (and therefore the fill-in of the factorization). It is always supplied by the
//! caller; nothing in this crate computes one.

use crate::core::CoreError;
use crate::core::key::Key;

/// A total order over the keys of a problem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    keys: Vec<Key>,
}

impl Ordering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an ordering, rejecting repeated keys.
    pub fn from_keys<I>(keys: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = Key>,
    {
        let mut ordering = Ordering::new();
        for key in keys {
            ordering.push(key)?;
        }
        Ok(ordering)
    }

    /// Append a key at the end of the ordering.
    pub fn push(&mut self, key: Key) -> Result<(), CoreError> {
        if self.keys.contains(&key) {
            return Err(CoreError::DuplicateKey(key));
        }
        self.keys.push(key);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
