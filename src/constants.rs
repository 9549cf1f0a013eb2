//! # Engine Constants
//!
//! Component names, environment variables and defaults shared across the
//! engine, plus the execution mode enum used by configuration and dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known component names
pub mod components {
    /// Per-item worker objects of a `WorkerBatch`
    pub const WORKERS: &str = "workers";

    // Core image batches
    pub const DL: &str = "dl";
    pub const UV: &str = "uv";
    pub const LABELS: &str = "labels";

    /// Default image pair components, in order
    pub const IMAGES: [&str; 2] = [DL, UV];
    /// Default flip/shuffle targets, in order
    pub const UV_LABELS: [&str; 2] = [UV, LABELS];
    pub const ALL_CORE: [&str; 3] = [DL, UV, LABELS];
}

/// Environment variables read by configuration and logging
pub mod env {
    pub const CONFIG_PREFIX: &str = "WELLBATCH";
    pub const CONFIG_SEPARATOR: &str = "__";
    pub const ENVIRONMENT: &str = "WELLBATCH_ENV";
    pub const LOG_FORMAT: &str = "WELLBATCH_LOG_FORMAT";
}

pub mod defaults {
    pub const FALLBACK_CONCURRENCY: usize = 4;
    pub const SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
    pub const RUNTIME_THREAD_NAME: &str = "wellbatch-dispatch";
    /// Label written when an augmentation marks a pair as defective
    pub const POSITIVE_LABEL: f32 = 1.0;
    pub const NEGATIVE_LABEL: f32 = 0.0;
    /// Directory holding daylight samples inside a well directory
    pub const DL_SAMPLES_DIR: &str = "samples_dl";
    pub const SAMPLE_EXTENSION: &str = "png";
}

/// Concurrency strategy for a dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run items one after another in the calling thread
    Sequential,
    /// Run items on a bounded pool of OS threads
    #[default]
    Threads,
    /// Run items as tasks on the dispatcher's async runtime (owned work only)
    Tasks,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Threads => "threads",
            ExecutionMode::Tasks => "tasks",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "for" => Ok(ExecutionMode::Sequential),
            "threads" => Ok(ExecutionMode::Threads),
            "tasks" | "async" => Ok(ExecutionMode::Tasks),
            other => Err(format!("Unknown execution mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("threads".parse::<ExecutionMode>(), Ok(ExecutionMode::Threads));
        assert_eq!("FOR".parse::<ExecutionMode>(), Ok(ExecutionMode::Sequential));
        assert_eq!("async".parse::<ExecutionMode>(), Ok(ExecutionMode::Tasks));
        assert!("mpc".parse::<ExecutionMode>().is_err());
        assert_eq!(ExecutionMode::default(), ExecutionMode::Threads);
    }

    #[test]
    fn test_execution_mode_serde() {
        let json = serde_json::to_string(&ExecutionMode::Sequential).unwrap();
        assert_eq!(json, "\"sequential\"");
        let mode: ExecutionMode = serde_json::from_str("\"tasks\"").unwrap();
        assert_eq!(mode, ExecutionMode::Tasks);
    }
}
