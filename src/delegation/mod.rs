//! # Delegation
//!
//! Lets a batch expose every operation of its per-item worker as a parallel
//! batch operation. Workers declare a capability list (see [`capabilities!`]);
//! a [`DelegationBinder`] turns it into a [`DelegationTable`] once per batch
//! type, keeping any operation the batch type overrides.
//!
//! [`capabilities!`]: crate::capabilities

pub mod binder;
pub mod contract;

pub use binder::{Binding, DelegationBinder, DelegationTable, OverrideFn};
pub use contract::{Capability, OpArgs, Worker, WorkerFn};
