//! Shared fixtures: a well-log worker backed by plain text files and an
//! in-memory image loader.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use wellbatch_core::{
    capabilities, BatchIndex, BatchResult, BatchStatus, Capability, CoreImage, DelegationBinder,
    DelegationTable, Dispatcher, ExecutionMode, ImageLoader, ItemFailure, ItemOutcome, OpArgs,
    Worker, WorkerBatch, WorkerSource,
};

pub const WELL_BATCH: &str = "WellBatch";

/// Well log with one depth reading per line
#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    pub name: String,
    pub depths: Vec<f64>,
    pub score: Option<f64>,
}

impl Well {
    /// Share of readings at or below `threshold`
    pub fn score(&self, args: &OpArgs) -> ItemOutcome<Self> {
        let threshold: f64 = match args.get("threshold") {
            Ok(threshold) => threshold,
            Err(error) => return ItemOutcome::Failure(ItemFailure::from_error(&error)),
        };
        let below = self.depths.iter().filter(|d| **d <= threshold).count();
        ItemOutcome::Success(Well {
            score: Some(below as f64 / self.depths.len().max(1) as f64),
            ..self.clone()
        })
    }

    pub fn drop_short(&self, args: &OpArgs) -> ItemOutcome<Self> {
        let min_len: usize = args.get_or("min_len", 2).unwrap_or(2);
        if self.depths.len() < min_len {
            ItemOutcome::skip(format!("{} has {} readings", self.name, self.depths.len()))
        } else {
            ItemOutcome::Success(self.clone())
        }
    }

    pub fn explode(&self, _args: &OpArgs) -> ItemOutcome<Self> {
        if self.name.ends_with('2') {
            panic!("corrupted segment in {}", self.name);
        }
        ItemOutcome::Success(self.clone())
    }
}

impl Worker for Well {
    type Attribute = f64;

    fn open(locator: &Path, _options: &OpArgs) -> ItemOutcome<Self> {
        let Ok(content) = std::fs::read_to_string(locator) else {
            return ItemOutcome::skip(format!("cannot read {}", locator.display()));
        };
        let depths: Result<Vec<f64>, _> = content.lines().map(str::parse::<f64>).collect();
        match depths {
            Ok(depths) => ItemOutcome::Success(Well {
                name: locator
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                depths,
                score: None,
            }),
            Err(_) => ItemOutcome::skip(format!("malformed log {}", locator.display())),
        }
    }

    fn capabilities() -> Vec<Capability<Self>> {
        capabilities!(Well { score, drop_short, explode })
    }

    fn segment_attribute(&self, attribute: &str) -> Result<Vec<f64>, ItemFailure> {
        match attribute {
            "top" => Ok(self.depths.first().copied().into_iter().collect()),
            "bottom" => Ok(self.depths.last().copied().into_iter().collect()),
            other => Err(ItemFailure::error(format!("{} has no attribute {other}", self.name))),
        }
    }
}

pub fn dispatcher(max_concurrency: usize) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::with_max_concurrency(max_concurrency).expect("valid concurrency"))
}

pub fn well_table(mode: ExecutionMode) -> Arc<DelegationTable<String, Well>> {
    Arc::new(DelegationBinder::new(WELL_BATCH).with_mode(mode).bind())
}

/// Write one log file per `(name, content)` and return the directory with a
/// path-encoding index over the files
pub fn write_wells(wells: &[(&str, &str)]) -> (TempDir, BatchIndex<String>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let entries = wells
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(format!("{name}.las"));
            std::fs::write(&path, content).expect("write log");
            (name.to_string(), path)
        })
        .collect();
    (dir, BatchIndex::with_paths(entries).expect("unique names"))
}

pub fn well_batch(
    wells: &[(&str, &str)],
    mode: ExecutionMode,
) -> BatchResult<(TempDir, WorkerBatch<String, Well>, BatchStatus)> {
    let (dir, index) = write_wells(wells);
    let (batch, status) = WorkerBatch::build(
        index,
        dispatcher(4),
        well_table(mode),
        WorkerSource::Index,
        &OpArgs::new(),
    )?;
    Ok((dir, batch, status))
}

/// Image loader serving pre-built images by path
#[derive(Debug, Default)]
pub struct MemoryLoader {
    images: HashMap<PathBuf, CoreImage>,
}

impl MemoryLoader {
    pub fn with(mut self, path: impl Into<PathBuf>, image: CoreImage) -> Self {
        self.images.insert(path.into(), image);
        self
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, path: &Path, grayscale: bool) -> Result<CoreImage, ItemFailure> {
        let image = self
            .images
            .get(path)
            .ok_or_else(|| ItemFailure::error(format!("no image at {}", path.display())))?;
        if grayscale && image.channels() != 1 {
            return Err(ItemFailure::error(
                "only single-channel fixtures can be loaded as grayscale",
            ));
        }
        Ok(image.clone())
    }
}
