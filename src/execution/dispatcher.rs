//! # Dispatcher
//!
//! Applies a per-item operation to every key of a batch with bounded
//! parallelism and returns the outcomes in key order.
//!
//! ## Execution modes
//!
//! ```text
//! Sequential  caller thread, one item after another
//! Threads     scoped worker threads (per dispatch) pulling positions from a shared cursor
//! Tasks       tokio tasks on the dispatcher's runtime, one semaphore permit per running item
//! ```
//!
//! ## Error handling
//!
//! Every item runs to completion. The dispatcher catches:
//! - operation failures (kept as-is, tagged with the item's position and key)
//! - panics (converted to `FailureKind::Panic`)
//! - tasks that never report back (converted to `FailureKind::Cancelled`)
//!
//! Nothing is written into batch components here; the assembler does that once
//! every item has reported.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::constants::{defaults, ExecutionMode};
use crate::error::{BatchError, BatchResult, ItemFailure};
use crate::index::BatchKey;
use crate::logging::log_dispatch_operation;
use crate::outcome::{ItemOutcome, OutcomeCounts};

/// Executes per-item operations across a batch.
///
/// The thread pool used by `Threads` mode is created per dispatch call and
/// bounded by `max_concurrency`. The async runtime used by `Tasks` mode is
/// owned by the dispatcher, built on first use and released by [`shutdown`].
///
/// `Tasks` dispatches block the calling thread until every task reports, so
/// they must not be issued from inside an async context.
///
/// [`shutdown`]: Dispatcher::shutdown
pub struct Dispatcher {
    max_concurrency: usize,
    shutdown_timeout: Duration,
    runtime: Mutex<Option<Runtime>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_concurrency", &self.max_concurrency)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("runtime_started", &self.runtime.lock().is_some())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(config: &EngineConfig) -> BatchResult<Self> {
        config.validate()?;
        Ok(Self {
            max_concurrency: config.max_concurrency,
            shutdown_timeout: config.shutdown_timeout(),
            runtime: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Dispatcher bounded to `max_concurrency` items, other settings default
    pub fn with_max_concurrency(max_concurrency: usize) -> BatchResult<Self> {
        Self::new(&EngineConfig {
            max_concurrency,
            ..EngineConfig::default()
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Apply a borrowed operation to every key.
    ///
    /// Supports `Sequential` and `Threads`. `Tasks` needs owned work and is
    /// rejected here; see [`dispatch_blocking`](Self::dispatch_blocking) and
    /// [`dispatch_tasks`](Self::dispatch_tasks).
    pub fn dispatch<K, T, F>(
        &self,
        keys: &[K],
        mode: ExecutionMode,
        op: F,
    ) -> BatchResult<Vec<ItemOutcome<T>>>
    where
        K: BatchKey,
        T: Send,
        F: Fn(&K) -> ItemOutcome<T> + Sync,
    {
        let dispatch_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        debug!(
            dispatch_id = %dispatch_id,
            mode = %mode,
            items = keys.len(),
            "Dispatching operation"
        );

        let results: Vec<ItemOutcome<T>> = match mode {
            ExecutionMode::Sequential => keys
                .iter()
                .enumerate()
                .map(|(position, key)| run_item(position, key, &op))
                .collect(),
            ExecutionMode::Threads => self.run_threads(keys, &op)?,
            ExecutionMode::Tasks => {
                return Err(BatchError::contract(
                    "tasks mode needs an owned operation (dispatch_blocking or dispatch_tasks)",
                ))
            }
        };

        Self::report(&dispatch_id, mode, &results, started);
        Ok(results)
    }

    /// Apply an owned synchronous operation to every key on the runtime's
    /// blocking pool, at most `max_concurrency` at a time.
    pub fn dispatch_blocking<K, T, F>(&self, keys: &[K], op: F) -> BatchResult<Vec<ItemOutcome<T>>>
    where
        K: BatchKey,
        T: Send + 'static,
        F: Fn(&K) -> ItemOutcome<T> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        self.dispatch_tasks(keys, move |key: K| {
            let op = Arc::clone(&op);
            async move {
                let failed_key = key.clone();
                match tokio::task::spawn_blocking(move || op(&key)).await {
                    Ok(outcome) => outcome,
                    Err(join_error) => join_failure(join_error, &failed_key),
                }
            }
        })
    }

    /// Apply an owned asynchronous operation to every key as runtime tasks,
    /// at most `max_concurrency` running at a time.
    pub fn dispatch_tasks<K, T, F, Fut>(
        &self,
        keys: &[K],
        op: F,
    ) -> BatchResult<Vec<ItemOutcome<T>>>
    where
        K: BatchKey,
        T: Send + 'static,
        F: Fn(K) -> Fut,
        Fut: Future<Output = ItemOutcome<T>> + Send + 'static,
    {
        let dispatch_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let handle = self.runtime_handle()?;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        debug!(
            dispatch_id = %dispatch_id,
            mode = %ExecutionMode::Tasks,
            items = keys.len(),
            "Dispatching operation"
        );

        let tasks: Vec<_> = keys
            .iter()
            .map(|key| {
                let semaphore = Arc::clone(&semaphore);
                let work = op(key.clone());
                handle.spawn(async move {
                    // Acquire semaphore permit (bounds concurrency)
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return ItemOutcome::Failure(ItemFailure::cancelled(
                                "semaphore closed before the item could run",
                            ))
                        }
                    };
                    work.await
                })
            })
            .collect();

        // Awaiting handles in spawn order keeps results aligned with `keys`
        let joined = handle.block_on(futures::future::join_all(tasks));
        let results = joined
            .into_iter()
            .zip(keys)
            .enumerate()
            .map(|(position, (joined, key))| {
                let outcome = joined.unwrap_or_else(|join_error| join_failure(join_error, key));
                locate(outcome, position, key)
            })
            .collect::<Vec<_>>();

        Self::report(&dispatch_id, ExecutionMode::Tasks, &results, started);
        Ok(results)
    }

    /// Shut the async runtime down. Idempotent; `Sequential` and `Threads`
    /// dispatches keep working afterwards.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            info!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Shutting down dispatch runtime"
            );
            runtime.shutdown_timeout(self.shutdown_timeout);
        }
    }

    fn runtime_handle(&self) -> BatchResult<Handle> {
        if self.is_shut_down() {
            return Err(BatchError::ExecutionError(
                "dispatcher has been shut down".to_string(),
            ));
        }
        let mut runtime = self.runtime.lock();
        if let Some(runtime) = runtime.as_ref() {
            return Ok(runtime.handle().clone());
        }
        let built = Builder::new_multi_thread()
            .worker_threads(self.max_concurrency)
            .thread_name(defaults::RUNTIME_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| BatchError::ExecutionError(format!("failed to build runtime: {e}")))?;
        info!(
            worker_threads = self.max_concurrency,
            "Dispatch runtime started"
        );
        let handle = built.handle().clone();
        *runtime = Some(built);
        Ok(handle)
    }

    fn run_threads<K, T, F>(&self, keys: &[K], op: &F) -> BatchResult<Vec<ItemOutcome<T>>>
    where
        K: BatchKey,
        T: Send,
        F: Fn(&K) -> ItemOutcome<T> + Sync,
    {
        let worker_count = self.max_concurrency.min(keys.len());
        if worker_count == 0 {
            return Ok(Vec::new());
        }

        let cursor = AtomicUsize::new(0);
        let (sender, receiver) = crossbeam::channel::unbounded::<(usize, ItemOutcome<T>)>();

        crossbeam::thread::scope(|scope| {
            for _ in 0..worker_count {
                let sender = sender.clone();
                let cursor = &cursor;
                scope.spawn(move |_| loop {
                    let position = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(key) = keys.get(position) else {
                        break;
                    };
                    if sender.send((position, run_item(position, key, op))).is_err() {
                        break;
                    }
                });
            }
        })
        .map_err(|_| BatchError::ExecutionError("dispatch worker thread panicked".to_string()))?;
        drop(sender);

        let mut slots: Vec<Option<ItemOutcome<T>>> = std::iter::repeat_with(|| None)
            .take(keys.len())
            .collect();
        for (position, outcome) in receiver.iter() {
            slots[position] = Some(outcome);
        }

        Ok(slots
            .into_iter()
            .zip(keys)
            .enumerate()
            .map(|(position, (slot, key))| {
                slot.unwrap_or_else(|| {
                    ItemOutcome::Failure(
                        ItemFailure::cancelled("item produced no result").locate(position, key),
                    )
                })
            })
            .collect())
    }

    fn report<T>(
        dispatch_id: &str,
        mode: ExecutionMode,
        results: &[ItemOutcome<T>],
        started: Instant,
    ) {
        let counts = OutcomeCounts::of(results);
        if counts.failed > 0 {
            warn!(
                dispatch_id = %dispatch_id,
                failed = counts.failed,
                items = results.len(),
                "Dispatch finished with failed items"
            );
        }
        log_dispatch_operation(
            dispatch_id,
            mode.as_str(),
            results.len(),
            counts.skipped,
            counts.failed,
            started.elapsed().as_millis() as u64,
        );
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            // Dropping a runtime blocks; background shutdown never does
            runtime.shutdown_background();
        }
    }
}

/// Run one item, converting a panic into a failure
fn run_item<K, T, F>(position: usize, key: &K, op: &F) -> ItemOutcome<T>
where
    K: BatchKey,
    F: Fn(&K) -> ItemOutcome<T>,
{
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| op(key))) {
        Ok(outcome) => outcome,
        Err(payload) => ItemOutcome::Failure(ItemFailure::from_panic(payload)),
    };
    locate(outcome, position, key)
}

fn locate<K: BatchKey, T>(outcome: ItemOutcome<T>, position: usize, key: &K) -> ItemOutcome<T> {
    match outcome {
        ItemOutcome::Failure(failure) => ItemOutcome::Failure(failure.locate(position, key)),
        other => other,
    }
}

fn join_failure<K: BatchKey, T>(join_error: tokio::task::JoinError, key: &K) -> ItemOutcome<T> {
    if join_error.is_panic() {
        ItemOutcome::Failure(ItemFailure::from_panic(join_error.into_panic()))
    } else {
        ItemOutcome::Failure(ItemFailure::cancelled(format!(
            "task for {key:?} was cancelled: {join_error}"
        )))
    }
}
