//! # Delegation Binder
//!
//! Builds the adapter table a `WorkerBatch` resolves operation names against.
//!
//! ```text
//! Worker::capabilities() ──┐
//!                          ├──→ DelegationBinder::bind() ──→ DelegationTable
//! batch overrides ─────────┘        (override wins)               │
//!                                          ┌──────────────────────┤
//!                                          ├─→ Binding::Override  (batch's own fn)
//!                                          └─→ Binding::Delegated (dispatch + filtering)
//! ```
//!
//! Binding happens once per batch type. Adding a method to a worker's
//! capability list makes it callable on every batch of that worker without
//! touching the batch type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::{debug, info};

use super::contract::{OpArgs, Worker, WorkerFn};
use crate::assembly::BatchStatus;
use crate::config::EngineConfig;
use crate::constants::ExecutionMode;
use crate::error::BatchResult;
use crate::index::BatchKey;
use crate::worker_batch::WorkerBatch;

/// Batch-level implementation of an operation, used instead of delegation
pub type OverrideFn<K, W> = fn(&mut WorkerBatch<K, W>, &OpArgs) -> BatchResult<BatchStatus>;

/// How a batch resolves one operation name
pub enum Binding<K: BatchKey, W: Worker> {
    /// The batch type implements the operation itself
    Override(OverrideFn<K, W>),
    /// Synthesized adapter: call the worker's operation for every item
    Delegated { call: WorkerFn<W>, mode: ExecutionMode },
}

impl<K: BatchKey, W: Worker> Clone for Binding<K, W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: BatchKey, W: Worker> Copy for Binding<K, W> {}

impl<K: BatchKey, W: Worker> fmt::Debug for Binding<K, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Override(_) => f.write_str("Override"),
            Binding::Delegated { mode, .. } => write!(f, "Delegated({mode})"),
        }
    }
}

pub struct DelegationBinder<K: BatchKey, W: Worker> {
    batch_type: String,
    mode: ExecutionMode,
    overrides: HashMap<String, OverrideFn<K, W>>,
}

impl<K: BatchKey, W: Worker> DelegationBinder<K, W> {
    /// Binder for `batch_type`, delegating in `Threads` mode unless configured
    pub fn new(batch_type: &str) -> Self {
        Self {
            batch_type: batch_type.to_string(),
            mode: ExecutionMode::default(),
            overrides: HashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use the mode configured for this batch type
    pub fn with_mode_from(self, config: &EngineConfig) -> Self {
        let mode = config.mode_for(&self.batch_type);
        self.with_mode(mode)
    }

    /// Register a batch-level implementation for `name`
    pub fn override_operation(mut self, name: &str, operation: OverrideFn<K, W>) -> Self {
        self.overrides.insert(name.to_string(), operation);
        self
    }

    pub fn bind(self) -> DelegationTable<K, W> {
        let mut bindings = BTreeMap::new();

        for capability in W::capabilities() {
            if self.overrides.contains_key(capability.name()) {
                debug!(
                    batch_type = %self.batch_type,
                    operation = capability.name(),
                    "Operation overridden by batch type, not delegating"
                );
                continue;
            }
            bindings.insert(
                capability.name().to_string(),
                Binding::Delegated {
                    call: capability.call(),
                    mode: self.mode,
                },
            );
        }
        let delegated = bindings.len();

        for (name, operation) in self.overrides {
            bindings.insert(name, Binding::Override(operation));
        }

        info!(
            batch_type = %self.batch_type,
            mode = %self.mode,
            delegated = delegated,
            overridden = bindings.len() - delegated,
            "Delegation table bound"
        );

        DelegationTable {
            batch_type: self.batch_type,
            bindings,
        }
    }
}

/// Operation name → binding for one batch type
pub struct DelegationTable<K: BatchKey, W: Worker> {
    batch_type: String,
    bindings: BTreeMap<String, Binding<K, W>>,
}

impl<K: BatchKey, W: Worker> DelegationTable<K, W> {
    pub fn batch_type(&self) -> &str {
        &self.batch_type
    }

    pub fn get(&self, name: &str) -> Option<Binding<K, W>> {
        self.bindings.get(name).copied()
    }

    pub fn is_delegated(&self, name: &str) -> bool {
        matches!(self.bindings.get(name), Some(Binding::Delegated { .. }))
    }

    pub fn is_overridden(&self, name: &str) -> bool {
        matches!(self.bindings.get(name), Some(Binding::Override(_)))
    }

    /// Bound operation names in sorted order
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn mode_of(&self, name: &str) -> Option<ExecutionMode> {
        match self.bindings.get(name)? {
            Binding::Delegated { mode, .. } => Some(*mode),
            Binding::Override(_) => None,
        }
    }
}

impl<K: BatchKey, W: Worker> fmt::Debug for DelegationTable<K, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegationTable")
            .field("batch_type", &self.batch_type)
            .field("bindings", &self.bindings)
            .finish()
    }
}
