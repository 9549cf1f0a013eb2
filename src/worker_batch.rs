//! # Worker Batch
//!
//! A batch whose items each own a worker object, stored as `Arc<W>` in the
//! `workers` component. Construction runs one filtering dispatch that opens
//! every worker; items whose source is malformed are dropped. Named
//! operations resolve through the batch type's [`DelegationTable`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::assembly::{Assembler, Assembly, BatchStatus};
use crate::batch::Batch;
use crate::components::ComponentStore;
use crate::constants::{components::WORKERS, ExecutionMode};
use crate::delegation::{Binding, DelegationTable, OpArgs, Worker, WorkerFn};
use crate::error::{BatchError, BatchResult, ItemFailure};
use crate::execution::Dispatcher;
use crate::index::{BatchIndex, BatchKey};
use crate::outcome::ItemOutcome;

/// Where worker constructors find each item's source
#[derive(Debug, Clone)]
pub enum WorkerSource<K: BatchKey> {
    /// Explicit per-item locators
    Locators(HashMap<K, PathBuf>),
    /// Paths encoded by the index itself
    Index,
}

pub struct WorkerBatch<K: BatchKey, W: Worker> {
    batch: Batch<K>,
    table: Arc<DelegationTable<K, W>>,
}

impl<K: BatchKey, W: Worker> WorkerBatch<K, W> {
    /// Open one worker per item. Returns `BatchStatus::Empty` when no worker
    /// could be opened, in which case the batch keeps its full index and has
    /// no `workers` component.
    pub fn build(
        index: BatchIndex<K>,
        dispatcher: Arc<Dispatcher>,
        table: Arc<DelegationTable<K, W>>,
        source: WorkerSource<K>,
        options: &OpArgs,
    ) -> BatchResult<(Self, BatchStatus)> {
        if matches!(source, WorkerSource::Index) && !index.has_paths() {
            return Err(BatchError::contract("Source path is not specified"));
        }

        let mut batch = Batch::new(index, dispatcher);
        let status = batch.apply_filtered(&[WORKERS], ExecutionMode::Threads, |batch, key| {
            let locator = match &source {
                WorkerSource::Locators(locators) => locators.get(key).map(PathBuf::as_path),
                WorkerSource::Index => batch.index().path(key),
            };
            match locator {
                Some(locator) => W::open(locator, options).map(|worker| (Arc::new(worker),)),
                None => ItemOutcome::failure(format!("no source locator for item {key:?}")),
            }
        })?;

        info!(
            batch_type = table.batch_type(),
            kept = status.kept(),
            dropped = status.dropped(),
            empty = status.is_empty(),
            "Workers initialized"
        );
        Ok((Self { batch, table }, status))
    }

    /// Rebuild a batch from previously opened workers, in index order
    pub fn from_preloaded(
        index: BatchIndex<K>,
        dispatcher: Arc<Dispatcher>,
        table: Arc<DelegationTable<K, W>>,
        workers: &HashMap<K, Arc<W>>,
    ) -> BatchResult<Self> {
        let column = index
            .iter()
            .map(|key| {
                workers
                    .get(key)
                    .cloned()
                    .ok_or_else(|| BatchError::KeyNotFound(format!("{key:?}")))
            })
            .collect::<BatchResult<Vec<Arc<W>>>>()?;
        let store = ComponentStore::new().with(WORKERS, column);
        let batch = Batch::from_preloaded(index, store, dispatcher)?;
        Ok(Self { batch, table })
    }

    pub fn batch(&self) -> &Batch<K> {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut Batch<K> {
        &mut self.batch
    }

    pub fn into_batch(self) -> Batch<K> {
        self.batch
    }

    pub fn table(&self) -> &DelegationTable<K, W> {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn keys(&self) -> &[K] {
        self.batch.keys()
    }

    pub fn workers(&self) -> BatchResult<&[Arc<W>]> {
        self.batch.component(WORKERS)
    }

    pub fn worker(&self, key: &K) -> BatchResult<&Arc<W>> {
        self.batch.item(WORKERS, key)
    }

    /// Run the named operation on the whole batch.
    ///
    /// Overridden names run the batch type's own implementation. Delegated
    /// names call the worker operation for every item and replace the
    /// workers through filtering assembly, so a worker returning `Skip`
    /// drops its item.
    pub fn call(&mut self, name: &str, args: &OpArgs) -> BatchResult<BatchStatus> {
        match self.binding(name)? {
            Binding::Override(operation) => {
                debug!(operation = name, "Running batch override");
                operation(self, args)
            }
            Binding::Delegated { call, mode } => {
                let results: Vec<ItemOutcome<(Arc<W>,)>> = self
                    .run_delegated(call, mode, args)?
                    .into_iter()
                    .map(|outcome| outcome.map(|worker| (worker,)))
                    .collect();
                self.batch.assemble(Assembly::Filtering, results, &[WORKERS])
            }
        }
    }

    /// Per-item results of a delegated operation, in index order, without
    /// modifying the batch
    pub fn dispatch_delegated(
        &self,
        name: &str,
        args: &OpArgs,
    ) -> BatchResult<Vec<ItemOutcome<Arc<W>>>> {
        match self.binding(name)? {
            Binding::Delegated { call, mode } => self.run_delegated(call, mode, args),
            Binding::Override(_) => Err(BatchError::contract(format!(
                "operation '{name}' is implemented by {} and has no per-item form",
                self.table.batch_type()
            ))),
        }
    }

    fn binding(&self, name: &str) -> BatchResult<Binding<K, W>> {
        self.table.get(name).ok_or_else(|| {
            BatchError::UnknownOperation(format!(
                "'{name}' is not defined for {}",
                self.table.batch_type()
            ))
        })
    }

    fn run_delegated(
        &self,
        call: WorkerFn<W>,
        mode: ExecutionMode,
        args: &OpArgs,
    ) -> BatchResult<Vec<ItemOutcome<Arc<W>>>> {
        let workers = self.workers()?;

        match mode {
            ExecutionMode::Sequential | ExecutionMode::Threads => {
                self.batch.dispatch(mode, |batch, key| {
                    let position = match batch.get_pos(key) {
                        Ok(position) => position,
                        Err(error) => return ItemOutcome::Failure(ItemFailure::from_error(&error)),
                    };
                    match workers.get(position) {
                        Some(worker) => call(worker, args).map(Arc::new),
                        None => ItemOutcome::failure(format!("no worker for item {key:?}")),
                    }
                })
            }
            ExecutionMode::Tasks => {
                let workers: Arc<Vec<Arc<W>>> = Arc::new(workers.to_vec());
                let index = self.batch.index().clone();
                let args = Arc::new(args.clone());
                self.batch
                    .dispatcher()
                    .dispatch_blocking(self.batch.keys(), move |key| {
                        match index.position(key).and_then(|position| workers.get(position)) {
                            Some(worker) => call(worker, &args).map(Arc::new),
                            None => ItemOutcome::failure(format!("no worker for item {key:?}")),
                        }
                    })
            }
        }
    }

    /// Collect segment attributes from every worker. Component `dst[j]` gets,
    /// per item, the values of attribute `src[j]` for each of the worker's
    /// segments. Items run sequentially.
    pub fn get_crops(&mut self, src: &[&str], dst: &[&str]) -> BatchResult<BatchStatus> {
        if src.len() != dst.len() {
            return Err(BatchError::contract(format!(
                "{} source attribute(s) but {} destination component(s)",
                src.len(),
                dst.len()
            )));
        }
        let dst = Assembler::validate_targets(dst, src.len())?;
        self.workers()?;

        let results = self.batch.dispatch(ExecutionMode::Sequential, |batch, key| {
            let worker = match batch.item::<Arc<W>>(WORKERS, key) {
                Ok(worker) => worker,
                Err(error) => return ItemOutcome::Failure(ItemFailure::from_error(&error)),
            };
            let row = src
                .iter()
                .map(|attribute| worker.segment_attribute(attribute))
                .collect::<Result<Vec<Vec<W::Attribute>>, ItemFailure>>();
            ItemOutcome::from(row)
        })?;

        let mut failures = Vec::new();
        let mut columns: Vec<Vec<Vec<W::Attribute>>> =
            dst.iter().map(|_| Vec::with_capacity(results.len())).collect();
        for (position, outcome) in results.into_iter().enumerate() {
            match outcome {
                ItemOutcome::Success(row) => {
                    for (column, values) in columns.iter_mut().zip(row) {
                        column.push(values);
                    }
                }
                ItemOutcome::Skip(reason) => failures.push(
                    ItemFailure::error(format!("crop collection cannot skip items ({reason})"))
                        .locate(position, &self.batch.keys()[position]),
                ),
                ItemOutcome::Failure(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            return Err(BatchError::AssemblyFailed { failures });
        }

        let kept = self.len();
        for (name, column) in dst.iter().zip(columns) {
            self.batch.set_component(name, column)?;
        }
        Ok(BatchStatus::Assembled { kept, dropped: 0 })
    }
}

impl<K: BatchKey, W: Worker> std::fmt::Debug for WorkerBatch<K, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerBatch")
            .field("batch_type", &self.table.batch_type())
            .field("batch", &self.batch)
            .finish()
    }
}
