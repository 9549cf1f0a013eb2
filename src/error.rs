//! Error types for the batch engine.
//!
//! Two levels exist: [`ItemFailure`] describes one item's failure and travels
//! inside an [`ItemOutcome`](crate::outcome::ItemOutcome); [`BatchError`] is what
//! a batch operation returns to its caller.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a per-item operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation returned a failure
    Error,
    /// The operation panicked
    Panic,
    /// The task never reported back (runtime shut down or task aborted)
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => write!(f, "error"),
            FailureKind::Panic => write!(f, "panic"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Position and key of the item a failure came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOrigin {
    pub position: usize,
    pub key: String,
}

/// A captured per-item failure.
///
/// The backtrace is taken where the failure is constructed, which for an
/// operation returning `ItemOutcome::failure(..)` is the worker thread that ran
/// it. Capture honours `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    kind: FailureKind,
    message: String,
    origin: Option<ItemOrigin>,
    backtrace: Arc<Backtrace>,
}

impl ItemFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: None,
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Error, message)
    }

    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::error(error.to_string())
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, message)
    }

    /// Build a failure from a panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::new(FailureKind::Panic, format!("operation panicked: {panic_msg}"))
    }

    /// Attach the item the failure belongs to. An origin already set is kept.
    pub fn locate(mut self, position: usize, key: &impl fmt::Debug) -> Self {
        if self.origin.is_none() {
            self.origin = Some(ItemOrigin {
                position,
                key: format!("{key:?}"),
            });
        }
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> Option<&ItemOrigin> {
        self.origin.as_ref()
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn has_backtrace(&self) -> bool {
        self.backtrace.status() == BacktraceStatus::Captured
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(
                f,
                "item {} (position {}) {}: {}",
                origin.key, origin.position, self.kind, self.message
            ),
            None => write!(f, "item {}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ItemFailure {}

impl PartialEq for ItemFailure {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message && self.origin == other.origin
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Contract violation: {0}")]
    ContractViolation(String),
    #[error("Could not assemble the batch: {}", summarize_failures(.failures))]
    AssemblyFailed { failures: Vec<ItemFailure> },
    #[error("Component not found: {0}")]
    ComponentNotFound(String),
    #[error("Component '{name}' does not hold values of type {expected}")]
    ComponentTypeMismatch { name: String, expected: &'static str },
    #[error("Key not found in index: {0}")]
    KeyNotFound(String),
    #[error("Duplicate key in index: {0}")]
    DuplicateKey(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl BatchError {
    pub fn contract(message: impl Into<String>) -> Self {
        BatchError::ContractViolation(message.into())
    }

    /// Item failures aggregated into this error, if any
    pub fn failures(&self) -> &[ItemFailure] {
        match self {
            BatchError::AssemblyFailed { failures } => failures,
            _ => &[],
        }
    }
}

fn summarize_failures(failures: &[ItemFailure]) -> String {
    match failures {
        [] => "no item failures recorded".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl From<config::ConfigError> for BatchError {
    fn from(error: config::ConfigError) -> Self {
        BatchError::ConfigurationError(error.to_string())
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(error: serde_json::Error) -> Self {
        BatchError::ContractViolation(format!("JSON serialization error: {error}"))
    }
}

pub type BatchResult<T> = Result<T, BatchError>;
