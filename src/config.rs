use crate::constants::{defaults, env, ExecutionMode};
use crate::error::{BatchError, BatchResult};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on items executing at once in one dispatch
    pub max_concurrency: usize,
    /// Mode used for batch types without an entry in `targets`
    pub default_mode: ExecutionMode,
    /// Execution mode per batch type name
    pub targets: HashMap<String, ExecutionMode>,
    pub shutdown_timeout_ms: u64,
    /// Seed for random augmentations; unseeded when absent
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(defaults::FALLBACK_CONCURRENCY),
            default_mode: ExecutionMode::Threads,
            targets: HashMap::new(),
            shutdown_timeout_ms: defaults::SHUTDOWN_TIMEOUT_MS,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Layer defaults, an optional config file and `WELLBATCH__*` env vars
    pub fn load(path: Option<&Path>) -> BatchResult<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading engine configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(env::CONFIG_PREFIX).separator(env::CONFIG_SEPARATOR),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> BatchResult<Self> {
        Self::load(None)
    }

    pub fn validate(&self) -> BatchResult<()> {
        if self.max_concurrency == 0 {
            return Err(BatchError::ConfigurationError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(BatchError::ConfigurationError(
                "shutdown_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Execution mode configured for a batch type. Names match
    /// case-insensitively since the `config` layer may lowercase keys.
    pub fn mode_for(&self, batch_type: &str) -> ExecutionMode {
        self.targets
            .get(batch_type)
            .or_else(|| {
                self.targets
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(batch_type))
                    .map(|(_, mode)| mode)
            })
            .copied()
            .unwrap_or(self.default_mode)
    }

    pub fn with_target(mut self, batch_type: &str, mode: ExecutionMode) -> Self {
        self.targets.insert(batch_type.to_string(), mode);
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}
