//! # Execution
//!
//! Concurrent per-item dispatch. See [`Dispatcher`].

pub mod dispatcher;

pub use crate::constants::ExecutionMode;
pub use dispatcher::Dispatcher;
