#![allow(clippy::doc_markdown)] // Allow technical terms like DL, UV in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Well Batch Core
//!
//! Parallel dispatch and assembly engine for batches of well and core-sample
//! data.
//!
//! ## Overview
//!
//! A batch is an ordered [`BatchIndex`] of item keys plus a [`ComponentStore`]
//! of named, index-aligned columns. Operations run in two phases:
//!
//! ```text
//! caller ──→ Dispatcher ──→ per-item op (direct, or delegated to the item's worker)
//!                │                      │
//!                │           Success(values) / Skip / Failure
//!                ▼                      │
//!            ordered results ◄──────────┘
//!                │
//!                ▼
//!            Assembler ──→ components written, index contracted on skips
//! ```
//!
//! Items never write into shared storage; the assembler mutates the batch once,
//! after every item reported. A failure among kept items aborts the operation
//! and leaves the batch untouched. When every item skips, the operation returns
//! [`BatchStatus::Empty`] so a pipeline stage can short-circuit.
//!
//! ## Module Organization
//!
//! - [`index`] - Ordered unique keys, subsets
//! - [`components`] - Type-erased aligned columns
//! - [`outcome`] - Per-item `Success` / `Skip` / `Failure`
//! - [`execution`] - The [`Dispatcher`] and its execution modes
//! - [`assembly`] - Single, tuple and filtering assembly
//! - [`batch`] - [`Batch`], tying the above together
//! - [`delegation`] - Worker contract and delegation tables
//! - [`worker_batch`] - Batches of per-item workers
//! - [`transforms`] - Crop window arithmetic
//! - [`core_images`] - Core photograph batches
//! - [`config`] - Engine configuration
//! - [`logging`] - Structured logging
//! - [`error`] - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wellbatch_core::{Batch, BatchIndex, Dispatcher, EngineConfig, ExecutionMode, ItemOutcome};
//!
//! # fn example() -> wellbatch_core::BatchResult<()> {
//! let config = EngineConfig::from_env()?;
//! let dispatcher = Arc::new(Dispatcher::new(&config)?);
//! let index = BatchIndex::new(vec!["w1".to_string(), "w2".to_string()])?;
//! let mut batch = Batch::new(index, dispatcher);
//!
//! let status = batch.apply_filtered(&["depth"], ExecutionMode::Threads, |_, key| {
//!     if key == "w2" {
//!         ItemOutcome::skip("no depth log")
//!     } else {
//!         ItemOutcome::Success((1200.5_f64,))
//!     }
//! })?;
//! assert_eq!(status.kept(), 1);
//! # Ok(())
//! # }
//! ```

pub mod assembly;
pub mod batch;
pub mod components;
pub mod config;
pub mod constants;
pub mod core_images;
pub mod delegation;
pub mod error;
pub mod execution;
pub mod index;
pub mod logging;
pub mod outcome;
pub mod transforms;
pub mod worker_batch;

pub use assembly::{Assembler, Assembly, BatchStatus, ComponentTuple};
pub use batch::Batch;
pub use components::{Column, ComponentStore};
pub use config::EngineConfig;
pub use constants::ExecutionMode;
pub use core_images::{CoreBatch, CoreImage, ImageLoader};
pub use delegation::{
    Binding, Capability, DelegationBinder, DelegationTable, OpArgs, OverrideFn, Worker, WorkerFn,
};
pub use error::{BatchError, BatchResult, FailureKind, ItemFailure, ItemOrigin};
pub use execution::Dispatcher;
pub use index::{BatchIndex, BatchKey};
pub use logging::init_structured_logging;
pub use outcome::{ItemOutcome, OutcomeCounts};
pub use worker_batch::{WorkerBatch, WorkerSource};
