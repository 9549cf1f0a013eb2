//! Core sample discovery and keys.
//!
//! Samples live at `<root>/<well>/samples_dl/<file>.png`; the paired UV
//! photograph sits in the sibling directory whose name ends in `uv`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::defaults::{DL_SAMPLES_DIR, SAMPLE_EXTENSION};
use crate::error::{BatchError, BatchResult};
use crate::index::BatchIndex;

/// Key of a sample: `<well>_<file name>`, optionally without the extension.
/// A leading dot is not treated as an extension separator.
pub fn build_core_key(path: &Path, no_ext: bool) -> BatchResult<String> {
    let mut names = path
        .components()
        .rev()
        .filter_map(|component| component.as_os_str().to_str());
    let (Some(file), Some(_samples_dir), Some(well)) = (names.next(), names.next(), names.next())
    else {
        return Err(BatchError::contract(format!(
            "sample path {} must look like <well>/<samples dir>/<file>",
            path.display()
        )));
    };

    let key = format!("{well}_{file}");
    if !no_ext {
        return Ok(key);
    }
    match key.rfind('.') {
        Some(dot) if dot > 0 => Ok(key[..dot].to_string()),
        _ => Ok(key),
    }
}

/// UV counterpart of a daylight sample path
pub fn uv_path(dl_path: &Path) -> PathBuf {
    let file = dl_path.file_name().unwrap_or_default();
    let parent = dl_path.parent().unwrap_or_else(|| Path::new(""));
    let dir = parent.to_string_lossy();
    let cut = dir
        .char_indices()
        .rev()
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    PathBuf::from(format!("{}uv", &dir[..cut])).join(file)
}

/// Every `<root>/*/samples_dl/*.png`, sorted
pub fn discover_core_samples(root: &Path) -> BatchResult<Vec<PathBuf>> {
    let read_dir = |dir: &Path| {
        std::fs::read_dir(dir).map_err(|e| {
            BatchError::ExecutionError(format!("cannot read {}: {e}", dir.display()))
        })
    };

    let mut samples = Vec::new();
    for well in read_dir(root)? {
        let well = well.map_err(|e| BatchError::ExecutionError(e.to_string()))?;
        let samples_dir = well.path().join(DL_SAMPLES_DIR);
        if !samples_dir.is_dir() {
            continue;
        }
        for entry in read_dir(&samples_dir)? {
            let path = entry
                .map_err(|e| BatchError::ExecutionError(e.to_string()))?
                .path();
            let is_sample = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(SAMPLE_EXTENSION);
            if is_sample {
                samples.push(path);
            }
        }
    }
    samples.sort();

    debug!(root = %root.display(), samples = samples.len(), "Discovered core samples");
    Ok(samples)
}

/// Path-encoding index over sample paths
pub fn core_index(paths: Vec<PathBuf>, no_ext: bool) -> BatchResult<BatchIndex<String>> {
    let entries = paths
        .into_iter()
        .map(|path| Ok((build_core_key(&path, no_ext)?, path)))
        .collect::<BatchResult<Vec<_>>>()?;
    BatchIndex::with_paths(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_core_key() {
        let path = Path::new("/data/well_7/samples_dl/12.5.png");
        assert_eq!(build_core_key(path, false).unwrap(), "well_7_12.5.png");
        assert_eq!(build_core_key(path, true).unwrap(), "well_7_12.5");
        assert!(build_core_key(Path::new("12.png"), true).is_err());
    }

    #[test]
    fn test_uv_path() {
        assert_eq!(
            uv_path(Path::new("/data/well_7/samples_dl/1.png")),
            PathBuf::from("/data/well_7/samples_uv/1.png")
        );
    }

    #[test]
    fn test_discover_and_index() {
        let root = tempfile::tempdir().unwrap();
        for (well, file) in [("w2", "b.png"), ("w1", "a.png"), ("w1", "notes.txt")] {
            let dir = root.path().join(well).join(DL_SAMPLES_DIR);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(file), b"").unwrap();
        }
        std::fs::create_dir_all(root.path().join("w3").join("samples_uv")).unwrap();

        let samples = discover_core_samples(root.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].ends_with("w1/samples_dl/a.png"));

        let index = core_index(samples, true).unwrap();
        assert_eq!(index.keys(), &["w1_a", "w2_b"]);
        assert!(index.path(&"w2_b".to_string()).unwrap().ends_with("b.png"));
    }
}
