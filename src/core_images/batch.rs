use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::image::CoreImage;
use super::index::uv_path;
use crate::assembly::BatchStatus;
use crate::batch::Batch;
use crate::components::ComponentStore;
use crate::config::EngineConfig;
use crate::constants::components::{ALL_CORE, IMAGES, LABELS, UV_LABELS};
use crate::constants::defaults::{NEGATIVE_LABEL, POSITIVE_LABEL};
use crate::constants::ExecutionMode;
use crate::error::{BatchError, BatchResult, ItemFailure};
use crate::execution::Dispatcher;
use crate::index::BatchIndex;
use crate::outcome::ItemOutcome;
use crate::transforms::{item_seeds, random_offsets, strided_offsets};

/// Decodes sample files. Implemented outside the engine.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path, grayscale: bool) -> Result<CoreImage, ItemFailure>;
}

/// Batch of daylight/ultraviolet core photograph pairs with a label per pair
/// (1 when the pair shows a defect). Components: `dl`, `uv`, `labels`.
#[derive(Debug)]
pub struct CoreBatch {
    batch: Batch<String>,
    mode: ExecutionMode,
}

impl CoreBatch {
    pub const BATCH_TYPE: &'static str = "CoreBatch";

    pub fn new(index: BatchIndex<String>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            batch: Batch::new(index, dispatcher),
            mode: ExecutionMode::Threads,
        }
    }

    pub fn from_preloaded(
        index: BatchIndex<String>,
        components: ComponentStore,
        dispatcher: Arc<Dispatcher>,
    ) -> BatchResult<Self> {
        Ok(Self {
            batch: Batch::from_preloaded(index, components, dispatcher)?,
            mode: ExecutionMode::Threads,
        })
    }

    /// Per-item actions run borrowed closures, so `Tasks` is not accepted
    pub fn with_mode(mut self, mode: ExecutionMode) -> BatchResult<Self> {
        if mode == ExecutionMode::Tasks {
            return Err(BatchError::contract(format!(
                "{} actions run in sequential or threads mode",
                Self::BATCH_TYPE
            )));
        }
        self.mode = mode;
        Ok(self)
    }

    pub fn with_mode_from(self, config: &EngineConfig) -> BatchResult<Self> {
        let mode = config.mode_for(Self::BATCH_TYPE);
        self.with_mode(mode)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn batch(&self) -> &Batch<String> {
        &self.batch
    }

    pub fn into_batch(self) -> Batch<String> {
        self.batch
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        self.batch.keys()
    }

    pub fn images(&self, name: &str) -> BatchResult<&[CoreImage]> {
        self.batch.component(name)
    }

    pub fn crops(&self, name: &str) -> BatchResult<&[Vec<CoreImage>]> {
        self.batch.component(name)
    }

    pub fn labels(&self) -> BatchResult<&[f32]> {
        self.batch.component(LABELS)
    }

    /// Load every DL image and its UV pair. Default `dst`: `dl`, `uv`.
    pub fn load<L: ImageLoader>(
        &mut self,
        loader: &L,
        grayscale: bool,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus> {
        let dst = dst.unwrap_or(IMAGES);
        self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            let Some(dl_path) = batch.index().path(key) else {
                return ItemOutcome::failure(format!("no sample path for {key}"));
            };
            let loaded = loader
                .load(dl_path, grayscale)
                .and_then(|dl| Ok((dl, loader.load(&uv_path(dl_path), grayscale)?)));
            ItemOutcome::<(CoreImage, CoreImage)>::from(loaded)
        })
    }

    /// Labels from a mapping keyed like the index, or 0 for every item when
    /// no mapping is given. Default `dst`: `labels`.
    pub fn create_labels(
        &mut self,
        labels: Option<&HashMap<String, f32>>,
        dst: Option<&str>,
    ) -> BatchResult<BatchStatus> {
        let dst = dst.unwrap_or(LABELS);
        self.batch.apply_single(dst, self.mode, |_, key| match labels {
            None => ItemOutcome::Success(NEGATIVE_LABEL),
            Some(labels) => match labels.get(key) {
                Some(label) => ItemOutcome::Success(*label),
                None => ItemOutcome::failure(format!("no label for {key}")),
            },
        })
    }

    /// Apply an external per-image transform (padding, histogram
    /// equalisation, ..) to both images of every pair
    pub fn map_images<F>(
        &mut self,
        f: F,
        src: Option<[&str; 2]>,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus>
    where
        F: Fn(&CoreImage) -> Result<CoreImage, ItemFailure> + Sync,
    {
        let src = src.unwrap_or(IMAGES);
        let dst = dst.unwrap_or(IMAGES);
        self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            ItemOutcome::from_result(image_pair(batch, src, key)).and_then(|(a, b)| {
                let mapped: Result<(CoreImage, CoreImage), ItemFailure> =
                    f(a).and_then(|a| Ok((a, f(b)?)));
                ItemOutcome::from(mapped)
            })
        })
    }

    /// Crop both images of a pair to their common size
    pub fn fix_shape(
        &mut self,
        src: Option<[&str; 2]>,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus> {
        let src = src.unwrap_or(IMAGES);
        let dst = dst.unwrap_or(IMAGES);
        self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            ItemOutcome::from_result(image_pair(batch, src, key)).map(|(a, b)| {
                let rows = a.rows().min(b.rows());
                let cols = a.cols().min(b.cols());
                (a.truncated(rows, cols), b.truncated(rows, cols))
            })
        })
    }

    /// Flip each UV image with probability `proba`; flipped pairs get the
    /// positive label. Default `src`/`dst`: `uv`, `labels`.
    pub fn flip_uv(
        &mut self,
        proba: f64,
        rng: &mut fastrand::Rng,
        src: Option<[&str; 2]>,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus> {
        check_probability(proba)?;
        let src = src.unwrap_or(UV_LABELS);
        let dst = dst.unwrap_or(UV_LABELS);
        let seeds = item_seeds(rng, self.len());

        self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            ItemOutcome::from_result(image_label(batch, src, key)).map(|(position, image, label)| {
                if fastrand::Rng::with_seed(seeds[position]).f64() < proba {
                    (image.flipped_vertically(), POSITIVE_LABEL)
                } else {
                    (image.clone(), label)
                }
            })
        })
    }

    /// Swap UV images between random pairs of items; swapped pairs get the
    /// positive label. `ceil(len * proba / 2)` leading items are each paired
    /// with a distinct randomly chosen item. `src` is copied to `dst` first
    /// when they differ. Default `src`/`dst`: `dl`, `uv`, `labels`.
    pub fn shuffle_images(
        &mut self,
        proba: f64,
        rng: &mut fastrand::Rng,
        src: Option<[&str; 3]>,
        dst: Option<[&str; 3]>,
    ) -> BatchResult<()> {
        check_probability(proba)?;
        let src = src.unwrap_or(ALL_CORE);
        let dst = dst.unwrap_or(ALL_CORE);
        let items = self.len();
        let permutations = ((items as f64 * proba / 2.0).ceil() as usize).min(items);

        let mut partners = rng.choose_multiple(0..items, permutations);
        rng.shuffle(&mut partners);

        self.batch.transform_components(|_, store| {
            store.get::<CoreImage>(src[0])?;
            store.get::<CoreImage>(src[1])?;
            store.get::<f32>(src[2])?;

            for (from, to) in src.iter().zip(dst.iter()).take(2) {
                if from != to {
                    let images = store.get::<CoreImage>(from)?.to_vec();
                    store.insert(to, images);
                }
            }
            if src[2] != dst[2] {
                let labels = store.get::<f32>(src[2])?.to_vec();
                store.insert(dst[2], labels);
            }

            let mut swapped = 0;
            for (i, j) in (0..permutations).zip(partners) {
                if i == j {
                    continue;
                }
                store.swap::<CoreImage>(dst[1], i, j)?;
                let labels = store.get_mut::<f32>(dst[2])?;
                labels[i] = POSITIVE_LABEL;
                labels[j] = POSITIVE_LABEL;
                swapped += 1;
            }
            debug!(items = items, swapped = swapped, "Shuffled UV images");
            Ok(())
        })
    }

    /// `n_crops` random windows of `length` rows from both images of every
    /// pair, at the same offsets for both. Default `src`/`dst`: `dl`, `uv`.
    pub fn random_crop(
        &mut self,
        length: usize,
        n_crops: usize,
        rng: &mut fastrand::Rng,
        src: Option<[&str; 2]>,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus> {
        let src = src.unwrap_or(IMAGES);
        let dst = dst.unwrap_or(IMAGES);
        let seeds = item_seeds(rng, self.len());

        self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            let crops = || -> BatchResult<(Vec<CoreImage>, Vec<CoreImage>)> {
                let position = batch.get_pos(key)?;
                let (a, b) = image_pair(batch, src, key)?;
                let mut item_rng = fastrand::Rng::with_seed(seeds[position]);
                let item_length = a.rows().min(b.rows());
                let offsets = random_offsets(&mut item_rng, item_length, length, n_crops)?;
                Ok((windows(a, &offsets, length)?, windows(b, &offsets, length)?))
            };
            ItemOutcome::from_result(crops())
        })
    }

    /// Windows of `length` rows every `step` rows from both images of every
    /// pair. Default `src`/`dst`: `dl`, `uv`.
    pub fn crop(
        &mut self,
        length: usize,
        step: usize,
        src: Option<[&str; 2]>,
        dst: Option<[&str; 2]>,
    ) -> BatchResult<BatchStatus> {
        if step == 0 {
            return Err(BatchError::InvalidArgument {
                name: "step".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let src = src.unwrap_or(IMAGES);
        let dst = dst.unwrap_or(IMAGES);

        let status = self.batch.apply_tuple(&dst, self.mode, |batch, key| {
            let crops = || -> BatchResult<(Vec<CoreImage>, Vec<CoreImage>)> {
                let (a, b) = image_pair(batch, src, key)?;
                let offsets = strided_offsets(a.rows().min(b.rows()), length, step)?;
                Ok((windows(a, &offsets, length)?, windows(b, &offsets, length)?))
            };
            ItemOutcome::from_result(crops())
        })?;
        info!(length = length, step = step, items = status.kept(), "Cropped core images");
        Ok(status)
    }
}

fn check_probability(proba: f64) -> BatchResult<()> {
    if (0.0..=1.0).contains(&proba) {
        Ok(())
    } else {
        Err(BatchError::InvalidArgument {
            name: "proba".to_string(),
            reason: format!("{proba} is not a probability"),
        })
    }
}

fn image_pair<'a>(
    batch: &'a Batch<String>,
    src: [&str; 2],
    key: &str,
) -> BatchResult<(&'a CoreImage, &'a CoreImage)> {
    let position = batch.get_pos(key)?;
    Ok((batch.item_at(src[0], position)?, batch.item_at(src[1], position)?))
}

fn image_label<'a>(
    batch: &'a Batch<String>,
    src: [&str; 2],
    key: &str,
) -> BatchResult<(usize, &'a CoreImage, f32)> {
    let position = batch.get_pos(key)?;
    Ok((
        position,
        batch.item_at(src[0], position)?,
        *batch.item_at::<f32>(src[1], position)?,
    ))
}

fn windows(image: &CoreImage, offsets: &[usize], length: usize) -> BatchResult<Vec<CoreImage>> {
    offsets
        .iter()
        .map(|offset| image.rows_window(*offset, length))
        .collect()
}
