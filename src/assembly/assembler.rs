use tracing::{debug, error, warn};

use super::{Assembly, BatchStatus, ComponentTuple};
use crate::components::ComponentStore;
use crate::error::{BatchError, BatchResult, ItemFailure};
use crate::index::{BatchIndex, BatchKey};
use crate::logging::{log_assembly_operation, log_error};
use crate::outcome::ItemOutcome;

/// Assembly strategies over a batch's index and component store
pub struct Assembler;

impl Assembler {
    /// Check target component names for a value of arity `arity`.
    /// Called before dispatch so a bad call never runs any item.
    pub fn validate_targets(dst: &[&str], arity: usize) -> BatchResult<Vec<String>> {
        if dst.len() != arity {
            return Err(BatchError::contract(format!(
                "operation produces {arity} value(s) per item but got {} target(s)",
                dst.len()
            )));
        }
        for (i, name) in dst.iter().enumerate() {
            if name.is_empty() {
                return Err(BatchError::contract("target component names must not be empty"));
            }
            if dst[..i].contains(name) {
                return Err(BatchError::contract(format!(
                    "target component '{name}' listed more than once"
                )));
            }
        }
        Ok(dst.iter().map(|name| name.to_string()).collect())
    }

    /// Dispatch strategy entry point
    pub fn assemble<K, R>(
        strategy: Assembly,
        index: &mut BatchIndex<K>,
        store: &mut ComponentStore,
        results: Vec<ItemOutcome<R>>,
        dst: &[String],
    ) -> BatchResult<BatchStatus>
    where
        K: BatchKey,
        R: ComponentTuple,
    {
        match strategy {
            Assembly::Single if R::ARITY != 1 => Err(BatchError::contract(format!(
                "single-component assembly needs one value per item, got {}",
                R::ARITY
            ))),
            Assembly::Single | Assembly::Tuple => Self::tuple(strategy, index, store, results, dst),
            Assembly::Filtering => Self::filtering(index, store, results, dst),
        }
    }

    /// Single- and tuple-component assembly: every item must have succeeded
    pub fn tuple<K, R>(
        strategy: Assembly,
        index: &BatchIndex<K>,
        store: &mut ComponentStore,
        results: Vec<ItemOutcome<R>>,
        dst: &[String],
    ) -> BatchResult<BatchStatus>
    where
        K: BatchKey,
        R: ComponentTuple,
    {
        Self::check_shape::<K, R>(index, &results, dst)?;

        let failures: Vec<ItemFailure> = results
            .iter()
            .enumerate()
            .filter_map(|(position, outcome)| match outcome {
                ItemOutcome::Success(_) => None,
                ItemOutcome::Failure(failure) => Some(failure.clone()),
                ItemOutcome::Skip(reason) => Some(
                    ItemFailure::error(format!(
                        "item skipped ({reason}) in a {} assembly, which cannot drop items",
                        strategy.as_str()
                    ))
                    .locate(position, &index.keys()[position]),
                ),
            })
            .collect();
        if !failures.is_empty() {
            return Err(Self::fatal(strategy, dst, failures));
        }

        let rows: Vec<R> = results.into_iter().filter_map(ItemOutcome::success).collect();
        let kept = rows.len();
        R::write_columns(rows, dst, store);

        log_assembly_operation(strategy.as_str(), dst, kept, 0, "assembled");
        Ok(BatchStatus::Assembled { kept, dropped: 0 })
    }

    /// Filtering assembly: skipped items are dropped from the index and from
    /// every component; any failure among the rest is fatal.
    pub fn filtering<K, R>(
        index: &mut BatchIndex<K>,
        store: &mut ComponentStore,
        results: Vec<ItemOutcome<R>>,
        dst: &[String],
    ) -> BatchResult<BatchStatus>
    where
        K: BatchKey,
        R: ComponentTuple,
    {
        Self::check_shape::<K, R>(index, &results, dst)?;

        let keep_mask: Vec<bool> = results.iter().map(|outcome| !outcome.is_skip()).collect();
        let kept = keep_mask.iter().filter(|keep| **keep).count();
        let dropped = results.len() - kept;

        if kept == 0 {
            warn!(
                targets = ?dst,
                items = results.len(),
                "Every item skipped - batch is empty"
            );
            log_assembly_operation(Assembly::Filtering.as_str(), dst, 0, dropped, "empty");
            return Ok(BatchStatus::Empty);
        }

        let failures: Vec<ItemFailure> = results
            .iter()
            .filter_map(|outcome| outcome.as_failure().cloned())
            .collect();
        if !failures.is_empty() {
            return Err(Self::fatal(Assembly::Filtering, dst, failures));
        }

        let contracted = index.subset(&keep_mask)?;
        let rows: Vec<R> = results.into_iter().filter_map(ItemOutcome::success).collect();

        if dropped > 0 {
            debug!(dropped = dropped, kept = kept, "Contracting batch after skipped items");
            store.retain_mask(&keep_mask);
        }
        R::write_columns(rows, dst, store);
        *index = contracted;

        log_assembly_operation(Assembly::Filtering.as_str(), dst, kept, dropped, "assembled");
        Ok(BatchStatus::Assembled { kept, dropped })
    }

    fn check_shape<K, R>(
        index: &BatchIndex<K>,
        results: &[ItemOutcome<R>],
        dst: &[String],
    ) -> BatchResult<()>
    where
        K: BatchKey,
        R: ComponentTuple,
    {
        if results.len() != index.len() {
            return Err(BatchError::contract(format!(
                "got {} results for an index of {} keys",
                results.len(),
                index.len()
            )));
        }
        if dst.len() != R::ARITY {
            return Err(BatchError::contract(format!(
                "{} target component(s) for values of arity {}",
                dst.len(),
                R::ARITY
            )));
        }
        Ok(())
    }

    fn fatal(strategy: Assembly, dst: &[String], failures: Vec<ItemFailure>) -> BatchError {
        for failure in &failures {
            error!(strategy = strategy.as_str(), targets = ?dst, failure = %failure, "Item failed");
            if failure.has_backtrace() {
                debug!(failure = %failure, backtrace = %failure.backtrace(), "Item failure origin");
            }
        }
        let error = BatchError::AssemblyFailed { failures };
        log_error(
            "assembler",
            strategy.as_str(),
            &error.to_string(),
            Some(&format!("targets: {dst:?}")),
        );
        error
    }
}
