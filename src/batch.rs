//! # Batch
//!
//! A batch owns one index and one component store and shares a dispatcher.
//! Operations run in two phases: dispatch (items read the batch concurrently)
//! then assembly (the batch is mutated once, after every item reported).
//! The borrow checker enforces the split: dispatch borrows `&self`, assembly
//! needs `&mut self`.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tracing::debug;

use crate::assembly::{Assembler, Assembly, BatchStatus, ComponentTuple};
use crate::components::ComponentStore;
use crate::constants::ExecutionMode;
use crate::error::{BatchError, BatchResult};
use crate::execution::Dispatcher;
use crate::index::{BatchIndex, BatchKey};
use crate::outcome::ItemOutcome;

#[derive(Debug)]
pub struct Batch<K: BatchKey> {
    index: BatchIndex<K>,
    components: ComponentStore,
    dispatcher: Arc<Dispatcher>,
}

impl<K: BatchKey> Batch<K> {
    /// Batch built from scratch: components are populated by dispatch
    pub fn new(index: BatchIndex<K>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            index,
            components: ComponentStore::new(),
            dispatcher,
        }
    }

    /// Batch built from already-computed component values
    pub fn from_preloaded(
        index: BatchIndex<K>,
        components: ComponentStore,
        dispatcher: Arc<Dispatcher>,
    ) -> BatchResult<Self> {
        components.check_aligned(index.len())?;
        Ok(Self {
            index,
            components,
            dispatcher,
        })
    }

    pub fn index(&self) -> &BatchIndex<K> {
        &self.index
    }

    pub fn keys(&self) -> &[K] {
        self.index.keys()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn get_pos<Q>(&self, key: &Q) -> BatchResult<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        self.index.get_pos(key)
    }

    pub fn component<T: Send + Sync + 'static>(&self, name: &str) -> BatchResult<&[T]> {
        self.components.get(name)
    }

    /// Value of component `name` for item `key`
    pub fn item<T: Send + Sync + 'static>(&self, name: &str, key: &K) -> BatchResult<&T> {
        self.item_at(name, self.get_pos(key)?)
    }

    /// Value of component `name` at index position `position`
    pub fn item_at<T>(&self, name: &str, position: usize) -> BatchResult<&T>
    where
        T: Send + Sync + 'static,
    {
        self.component::<T>(name)?.get(position).ok_or_else(|| {
            BatchError::contract(format!("component '{name}' is shorter than the index"))
        })
    }

    /// Insert or replace a whole component; its length must match the index
    pub fn set_component<T>(&mut self, name: &str, values: Vec<T>) -> BatchResult<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        if values.len() != self.len() {
            return Err(BatchError::contract(format!(
                "component '{name}' given {} values for {} items",
                values.len(),
                self.len()
            )));
        }
        self.components.insert(name, values);
        Ok(())
    }

    /// Run `op` for every item and return the ordered outcomes without
    /// touching the batch
    pub fn dispatch<T, F>(&self, mode: ExecutionMode, op: F) -> BatchResult<Vec<ItemOutcome<T>>>
    where
        T: Send,
        F: Fn(&Self, &K) -> ItemOutcome<T> + Sync,
    {
        self.dispatcher.dispatch(self.index.keys(), mode, |key| op(self, key))
    }

    /// Write pre-computed results with the given strategy
    pub fn assemble<R: ComponentTuple>(
        &mut self,
        strategy: Assembly,
        results: Vec<ItemOutcome<R>>,
        dst: &[&str],
    ) -> BatchResult<BatchStatus> {
        let dst = Assembler::validate_targets(dst, R::ARITY)?;
        Assembler::assemble(strategy, &mut self.index, &mut self.components, results, &dst)
    }

    /// Per-item value written into a single component
    pub fn apply_single<T, F>(
        &mut self,
        dst: &str,
        mode: ExecutionMode,
        op: F,
    ) -> BatchResult<BatchStatus>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Self, &K) -> ItemOutcome<T> + Sync,
    {
        self.apply(Assembly::Single, &[dst], mode, |batch, key| {
            op(batch, key).map(|value| (value,))
        })
    }

    /// Per-item tuple split across `dst` components
    pub fn apply_tuple<R, F>(
        &mut self,
        dst: &[&str],
        mode: ExecutionMode,
        op: F,
    ) -> BatchResult<BatchStatus>
    where
        R: ComponentTuple,
        F: Fn(&Self, &K) -> ItemOutcome<R> + Sync,
    {
        self.apply(Assembly::Tuple, dst, mode, op)
    }

    /// Per-item tuple with skip filtering; the batch may shrink
    pub fn apply_filtered<R, F>(
        &mut self,
        dst: &[&str],
        mode: ExecutionMode,
        op: F,
    ) -> BatchResult<BatchStatus>
    where
        R: ComponentTuple,
        F: Fn(&Self, &K) -> ItemOutcome<R> + Sync,
    {
        self.apply(Assembly::Filtering, dst, mode, op)
    }

    fn apply<R, F>(
        &mut self,
        strategy: Assembly,
        dst: &[&str],
        mode: ExecutionMode,
        op: F,
    ) -> BatchResult<BatchStatus>
    where
        R: ComponentTuple,
        F: Fn(&Self, &K) -> ItemOutcome<R> + Sync,
    {
        let dst = Assembler::validate_targets(dst, R::ARITY)?;
        debug!(
            strategy = strategy.as_str(),
            targets = ?dst,
            mode = %mode,
            items = self.len(),
            "Applying batch operation"
        );
        let results = self.dispatch(mode, op)?;
        Assembler::assemble(strategy, &mut self.index, &mut self.components, results, &dst)
    }

    /// Batch-wide transform with exclusive access to the component store.
    /// For operations that are not per-item independent (e.g. swapping values
    /// between items). `f` works on a staged copy of the store, which
    /// replaces the live one only if `f` succeeds and every column still
    /// matches the index length.
    pub fn transform_components<F>(&mut self, f: F) -> BatchResult<()>
    where
        F: FnOnce(&BatchIndex<K>, &mut ComponentStore) -> BatchResult<()>,
    {
        let mut staged = self.components.clone();
        f(&self.index, &mut staged)?;
        staged.check_aligned(self.index.len())?;
        self.components = staged;
        Ok(())
    }

    pub fn into_parts(self) -> (BatchIndex<K>, ComponentStore) {
        (self.index, self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(keys: &[&'static str]) -> Batch<&'static str> {
        let dispatcher = Arc::new(Dispatcher::with_max_concurrency(2).unwrap());
        Batch::new(BatchIndex::new(keys.to_vec()).unwrap(), dispatcher)
    }

    #[test]
    fn test_apply_single_reads_other_components() {
        let mut batch = batch(&["a", "bb", "ccc"]);
        batch
            .set_component("width", vec![1_usize, 2, 3])
            .unwrap();
        let status = batch
            .apply_single("area", ExecutionMode::Threads, |b, key| {
                let width = *b.item::<usize>("width", key).unwrap();
                ItemOutcome::Success(width * key.len())
            })
            .unwrap();
        assert_eq!(status, BatchStatus::Assembled { kept: 3, dropped: 0 });
        assert_eq!(batch.component::<usize>("area").unwrap(), &[1, 4, 9]);
    }

    #[test]
    fn test_apply_tuple_validates_targets_before_dispatch() {
        let mut batch = batch(&["a"]);
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let result = batch.apply_tuple(&["only_one"], ExecutionMode::Sequential, |_, _| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ItemOutcome::Success((1, 2))
        });
        assert!(matches!(result, Err(BatchError::ContractViolation(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preloaded_must_be_aligned() {
        let dispatcher = Arc::new(Dispatcher::with_max_concurrency(1).unwrap());
        let index = BatchIndex::new(vec![1, 2]).unwrap();
        let store = ComponentStore::new().with("x", vec![1]);
        assert!(Batch::from_preloaded(index, store, dispatcher).is_err());
    }

    #[test]
    fn test_transform_components_rechecks_alignment() {
        let mut batch = batch(&["a", "b"]);
        batch.set_component("x", vec![1, 2]).unwrap();
        let err = batch.transform_components(|_, store| {
            store.get_mut::<i32>("x")?.push(3);
            Ok(())
        });
        assert!(err.is_err());
        assert_eq!(batch.component::<i32>("x").unwrap(), &[1, 2]);
        assert!(batch.components().check_aligned(batch.len()).is_ok());
    }

    #[test]
    fn test_failed_transform_discards_partial_writes() {
        let mut batch = batch(&["a", "b"]);
        batch.set_component("x", vec![1, 2]).unwrap();
        let result = batch.transform_components(|_, store| {
            store.swap::<i32>("x", 0, 1)?;
            store.get::<f32>("missing")?;
            Ok(())
        });
        assert!(matches!(result, Err(BatchError::ComponentNotFound(_))));
        assert_eq!(batch.component::<i32>("x").unwrap(), &[1, 2]);

        batch
            .transform_components(|_, store| store.swap::<i32>("x", 0, 1))
            .unwrap();
        assert_eq!(batch.component::<i32>("x").unwrap(), &[2, 1]);
    }
}
