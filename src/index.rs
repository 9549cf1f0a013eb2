//! # Batch Index
//!
//! Ordered set of unique item keys. An index is never mutated: contracting a
//! batch builds a new index, so anyone still holding the previous one keeps a
//! consistent snapshot. Internals are reference counted, making clones cheap.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{BatchError, BatchResult};

/// Bounds every item key must satisfy
pub trait BatchKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> BatchKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

#[derive(Debug, Clone)]
pub struct BatchIndex<K: BatchKey> {
    keys: Arc<[K]>,
    positions: Arc<HashMap<K, usize>>,
    /// Per-item source paths when the index natively encodes them
    paths: Option<Arc<[PathBuf]>>,
}

impl<K: BatchKey> BatchIndex<K> {
    /// Build an index from keys, rejecting duplicates
    pub fn new(keys: Vec<K>) -> BatchResult<Self> {
        let positions = Self::positions_of(&keys)?;
        Ok(Self {
            keys: keys.into(),
            positions: Arc::new(positions),
            paths: None,
        })
    }

    /// Build an index whose keys each carry a source path
    pub fn with_paths(entries: Vec<(K, PathBuf)>) -> BatchResult<Self> {
        let (keys, paths): (Vec<K>, Vec<PathBuf>) = entries.into_iter().unzip();
        let positions = Self::positions_of(&keys)?;
        Ok(Self {
            keys: keys.into(),
            positions: Arc::new(positions),
            paths: Some(paths.into()),
        })
    }

    fn positions_of(keys: &[K]) -> BatchResult<HashMap<K, usize>> {
        let mut positions = HashMap::with_capacity(keys.len());
        for (position, key) in keys.iter().enumerate() {
            if positions.insert(key.clone(), position).is_some() {
                return Err(BatchError::DuplicateKey(format!("{key:?}")));
            }
        }
        Ok(positions)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn iter(&self) -> std::slice::Iter<'_, K> {
        self.keys.iter()
    }

    pub fn get(&self, position: usize) -> Option<&K> {
        self.keys.get(position)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.contains_key(key)
    }

    pub fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(key).copied()
    }

    /// Position of `key`, or `KeyNotFound`
    pub fn get_pos<Q>(&self, key: &Q) -> BatchResult<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.position(key)
            .ok_or_else(|| BatchError::KeyNotFound(format!("{key:?}")))
    }

    pub fn has_paths(&self) -> bool {
        self.paths.is_some()
    }

    /// Source path stored for `key`, when the index encodes paths
    pub fn path<Q>(&self, key: &Q) -> Option<&Path>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let position = self.position(key)?;
        self.paths
            .as_ref()
            .and_then(|paths| paths.get(position))
            .map(PathBuf::as_path)
    }

    /// Keep the keys whose mask entry is true, preserving relative order
    pub fn subset(&self, mask: &[bool]) -> BatchResult<Self> {
        if mask.len() != self.len() {
            return Err(BatchError::contract(format!(
                "subset mask has {} entries but the index has {} keys",
                mask.len(),
                self.len()
            )));
        }
        let kept = mask.iter().enumerate().filter(|(_, keep)| **keep);
        let positions: Vec<usize> = kept.map(|(position, _)| position).collect();
        Ok(self.select(&positions))
    }

    /// Build an index from a list of keys that all belong to this index.
    /// The order of `keys` is the order of the new index.
    pub fn create_subset(&self, keys: &[K]) -> BatchResult<Self> {
        let positions = keys
            .iter()
            .map(|key| self.get_pos(key))
            .collect::<BatchResult<Vec<_>>>()?;
        let subset = self.select(&positions);
        if subset.positions.len() != subset.keys.len() {
            return Err(BatchError::DuplicateKey(
                "subset keys must be unique".to_string(),
            ));
        }
        Ok(subset)
    }

    fn select(&self, positions: &[usize]) -> Self {
        let keys: Vec<K> = positions.iter().map(|&p| self.keys[p].clone()).collect();
        let lookup = keys
            .iter()
            .enumerate()
            .map(|(position, key)| (key.clone(), position))
            .collect();
        let paths = self
            .paths
            .as_ref()
            .map(|paths| positions.iter().map(|&p| paths[p].clone()).collect());
        Self {
            keys: keys.into(),
            positions: Arc::new(lookup),
            paths,
        }
    }
}

impl<'a, K: BatchKey> IntoIterator for &'a BatchIndex<K> {
    type Item = &'a K;
    type IntoIter = std::slice::Iter<'a, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(keys: &[&str]) -> BatchIndex<String> {
        BatchIndex::new(keys.iter().map(|k| k.to_string()).collect()).unwrap()
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = BatchIndex::new(vec![1, 2, 1]);
        assert!(matches!(result, Err(BatchError::DuplicateKey(_))));
    }

    #[test]
    fn test_positions_are_stable() {
        let idx = index(&["a", "b", "c"]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.get_pos(&"c".to_string()).unwrap(), 2);
        assert!(matches!(
            idx.get_pos(&"z".to_string()),
            Err(BatchError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_subset_preserves_order() {
        let idx = index(&["a", "b", "c", "d"]);
        let sub = idx.subset(&[true, false, true, true]).unwrap();
        assert_eq!(sub.keys(), &["a", "c", "d"]);
        assert_eq!(sub.get_pos(&"d".to_string()).unwrap(), 2);
        // the original snapshot is untouched
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn test_subset_mask_length_mismatch() {
        let idx = index(&["a", "b"]);
        assert!(matches!(
            idx.subset(&[true]),
            Err(BatchError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_create_subset_checks_membership() {
        let idx = index(&["a", "b", "c"]);
        let sub = idx.create_subset(&["c".to_string(), "a".to_string()]).unwrap();
        assert_eq!(sub.keys(), &["c", "a"]);
        assert!(idx.create_subset(&["x".to_string()]).is_err());
        assert!(matches!(
            idx.create_subset(&["a".to_string(), "a".to_string()]),
            Err(BatchError::DuplicateKey(_))
        ));
    }

    #[test]
    fn test_paths_follow_subset() {
        let idx = BatchIndex::with_paths(vec![
            ("w1".to_string(), PathBuf::from("/data/w1.las")),
            ("w2".to_string(), PathBuf::from("/data/w2.las")),
        ])
        .unwrap();
        assert!(idx.has_paths());
        let sub = idx.subset(&[false, true]).unwrap();
        assert_eq!(
            sub.path(&"w2".to_string()),
            Some(Path::new("/data/w2.las"))
        );
        assert_eq!(sub.path(&"w1".to_string()), None);
    }
}
