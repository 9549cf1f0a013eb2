//! # Worker Contract
//!
//! The per-item worker interface a `WorkerBatch` delegates to. Each worker
//! exposes a capability set: named operations of the uniform shape
//! `fn(&self, &OpArgs) -> ItemOutcome<Self>`. A delegated call replaces the
//! item's worker with the returned one, or drops the item on `Skip`.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BatchError, BatchResult, ItemFailure};
use crate::outcome::ItemOutcome;

/// Keyword arguments forwarded unchanged to every item's worker operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpArgs(Map<String, Value>);

impl OpArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    /// Arguments from a JSON object
    pub fn from_value(value: Value) -> BatchResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(BatchError::contract(format!(
                "operation arguments must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> BatchResult<T> {
        self.get_opt(name)?.ok_or_else(|| BatchError::InvalidArgument {
            name: name.to_string(),
            reason: "missing required argument".to_string(),
        })
    }

    pub fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> BatchResult<T> {
        Ok(self.get_opt(name)?.unwrap_or(default))
    }

    pub fn get_opt<T: DeserializeOwned>(&self, name: &str) -> BatchResult<Option<T>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                BatchError::InvalidArgument {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

/// Signature shared by every delegable worker operation
pub type WorkerFn<W> = fn(&W, &OpArgs) -> ItemOutcome<W>;

/// One named entry of a worker's capability set
pub struct Capability<W> {
    name: &'static str,
    call: WorkerFn<W>,
}

impl<W> Capability<W> {
    pub const fn new(name: &'static str, call: WorkerFn<W>) -> Self {
        Self { name, call }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self) -> WorkerFn<W> {
        self.call
    }
}

impl<W> Clone for Capability<W> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W> Copy for Capability<W> {}

impl<W> fmt::Debug for Capability<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).finish()
    }
}

/// Per-item processing context held in a batch's `workers` component
pub trait Worker: Sized + Send + Sync + 'static {
    /// Value type collected by `WorkerBatch::get_crops`
    type Attribute: Clone + Send + Sync + 'static;

    /// Build a worker from its source locator. Malformed sources should
    /// return `Skip` so the batch shrinks instead of failing.
    fn open(locator: &Path, options: &OpArgs) -> ItemOutcome<Self>;

    /// Operations a batch may delegate to this worker
    fn capabilities() -> Vec<Capability<Self>>;

    /// Values of `attribute` for each segment of the worker, in order
    fn segment_attribute(&self, attribute: &str) -> Result<Vec<Self::Attribute>, ItemFailure>;
}

/// Build a capability list from method names of a [`Worker`]. Each method
/// must have the signature `fn(&self, &OpArgs) -> ItemOutcome<Self>`.
///
/// ```ignore
/// fn capabilities() -> Vec<Capability<Self>> {
///     capabilities!(Well { drop_nans, score })
/// }
/// ```
#[macro_export]
macro_rules! capabilities {
    ($worker:ty { $($name:ident),* $(,)? }) => {
        vec![$($crate::delegation::Capability::<$worker>::new(
            stringify!($name),
            <$worker>::$name,
        )),*]
    };
}
