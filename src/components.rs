//! # Component Store
//!
//! Named, position-aligned columns of per-item values. Columns are typed
//! `Vec<T>` behind a type-erased [`Column`] so one store can hold workers,
//! images and labels side by side; typed access goes through a checked
//! downcast. Column values are `Clone` so a whole store can be staged.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BatchError, BatchResult};

/// Type-erased column operations the store needs without knowing `T`
pub trait Column: Any + Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep the entries whose mask value is true
    fn retain_mask(&mut self, mask: &[bool]);

    fn value_type(&self) -> &'static str;

    fn clone_box(&self) -> Box<dyn Column>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + Send + Sync + 'static> Column for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn retain_mask(&mut self, mask: &[bool]) {
        let mut keep = mask.iter();
        self.retain(|_| keep.next().copied().unwrap_or(false));
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn clone_box(&self) -> Box<dyn Column> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
pub struct ComponentStore {
    columns: BTreeMap<String, Box<dyn Column>>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when preparing preloaded data
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, name: &str, values: Vec<T>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of values held by a column
    pub fn column_len(&self, name: &str) -> Option<usize> {
        self.columns.get(name).map(|column| column.len())
    }

    pub fn value_type(&self, name: &str) -> Option<&'static str> {
        self.columns.get(name).map(|column| column.value_type())
    }

    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> BatchResult<&[T]> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| BatchError::ComponentNotFound(name.to_string()))?;
        column
            .as_any()
            .downcast_ref::<Vec<T>>()
            .map(Vec::as_slice)
            .ok_or_else(|| BatchError::ComponentTypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self, name: &str) -> BatchResult<&mut Vec<T>> {
        let column = self
            .columns
            .get_mut(name)
            .ok_or_else(|| BatchError::ComponentNotFound(name.to_string()))?;
        column
            .as_any_mut()
            .downcast_mut::<Vec<T>>()
            .ok_or_else(|| BatchError::ComponentTypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Insert or wholesale-replace a column. Alignment is the caller's concern;
    /// batches check it before calling.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, name: &str, values: Vec<T>) {
        self.columns.insert(name.to_string(), Box::new(values));
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Column>> {
        self.columns.remove(name)
    }

    /// Apply a keep-mask to every column
    pub fn retain_mask(&mut self, mask: &[bool]) {
        for column in self.columns.values_mut() {
            column.retain_mask(mask);
        }
    }

    /// Check every column holds exactly `expected` values
    pub fn check_aligned(&self, expected: usize) -> BatchResult<()> {
        match self.columns.iter().find(|(_, column)| column.len() != expected) {
            Some((name, column)) => Err(BatchError::contract(format!(
                "component '{name}' has {} values but the index has {expected} keys",
                column.len()
            ))),
            None => Ok(()),
        }
    }

    /// Swap the values at two positions of a typed column
    pub fn swap<T>(&mut self, name: &str, a: usize, b: usize) -> BatchResult<()>
    where
        T: Send + Sync + 'static,
    {
        let column = self.get_mut::<T>(name)?;
        if a >= column.len() || b >= column.len() {
            return Err(BatchError::contract(format!(
                "swap positions ({a}, {b}) out of range for component '{name}' of length {}",
                column.len()
            )));
        }
        column.swap(a, b);
        Ok(())
    }
}

impl Clone for ComponentStore {
    fn clone(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.clone_box()))
            .collect();
        Self { columns }
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, column) in &self.columns {
            map.entry(name, &format_args!("{}[{}]", column.value_type(), column.len()));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let store = ComponentStore::new()
            .with("labels", vec![0.0_f32, 1.0])
            .with("names", vec!["a".to_string(), "b".to_string()]);

        assert_eq!(store.get::<f32>("labels").unwrap(), &[0.0, 1.0]);
        assert!(matches!(
            store.get::<u8>("labels"),
            Err(BatchError::ComponentTypeMismatch { .. })
        ));
        assert!(matches!(
            store.get::<f32>("missing"),
            Err(BatchError::ComponentNotFound(_))
        ));
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["labels", "names"]);
    }

    #[test]
    fn test_retain_mask_applies_to_all_columns() {
        let mut store = ComponentStore::new()
            .with("a", vec![1, 2, 3])
            .with("b", vec!['x', 'y', 'z']);
        store.retain_mask(&[true, false, true]);

        assert_eq!(store.get::<i32>("a").unwrap(), &[1, 3]);
        assert_eq!(store.get::<char>("b").unwrap(), &['x', 'z']);
        assert!(store.check_aligned(2).is_ok());
        assert_eq!(store.column_len("b"), Some(2));
        assert_eq!(store.column_len("missing"), None);
    }

    #[test]
    fn test_check_aligned_reports_column() {
        let store = ComponentStore::new().with("a", vec![1, 2]).with("b", vec![1]);
        let err = store.check_aligned(2).unwrap_err();
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_swap_bounds() {
        let mut store = ComponentStore::new().with("a", vec![1, 2, 3]);
        store.swap::<i32>("a", 0, 2).unwrap();
        assert_eq!(store.get::<i32>("a").unwrap(), &[3, 2, 1]);
        assert!(store.swap::<i32>("a", 0, 3).is_err());
    }

    #[test]
    fn test_debug_lists_columns() {
        let store = ComponentStore::new().with("labels", vec![1_u8]);
        assert_eq!(format!("{store:?}"), "{\"labels\": u8[1]}");
    }
}
