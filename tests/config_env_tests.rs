//! Environment layering for `EngineConfig`.
//!
//! Kept as a single test in its own binary: environment variables are
//! process-wide and would leak into parallel tests.

use std::env;
use std::io::Write;

use wellbatch_core::{BatchError, EngineConfig, ExecutionMode};

const MAX_CONCURRENCY: &str = "WELLBATCH__MAX_CONCURRENCY";
const CORE_TARGET: &str = "WELLBATCH__TARGETS__COREBATCH";
const SEED: &str = "WELLBATCH__SEED";

fn clear() {
    for name in [MAX_CONCURRENCY, CORE_TARGET, SEED] {
        env::remove_var(name);
    }
}

#[test]
fn test_environment_overrides_file_and_defaults() {
    clear();

    env::set_var(MAX_CONCURRENCY, "5");
    env::set_var(SEED, "21");
    let config = EngineConfig::from_env().unwrap();
    assert_eq!(config.max_concurrency, 5);
    assert_eq!(config.seed, Some(21));
    assert_eq!(config.default_mode, ExecutionMode::Threads);

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "max_concurrency = 3\n\n[targets]\nWellBatch = \"tasks\"\n").unwrap();
    env::set_var(CORE_TARGET, "sequential");

    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.max_concurrency, 5);
    assert_eq!(config.mode_for("CoreBatch"), ExecutionMode::Sequential);
    assert_eq!(config.mode_for("WellBatch"), ExecutionMode::Tasks);

    env::set_var(MAX_CONCURRENCY, "0");
    assert!(matches!(
        EngineConfig::load(Some(file.path())),
        Err(BatchError::ConfigurationError(_))
    ));

    clear();
    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.max_concurrency, 3);
    assert_eq!(config.seed, None);
    assert_eq!(config.mode_for("CoreBatch"), ExecutionMode::Threads);
}
