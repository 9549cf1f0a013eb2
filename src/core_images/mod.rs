//! # Core Images
//!
//! Batches of core-sample photograph pairs: a daylight (DL) image, its
//! ultraviolet (UV) counterpart and a defect label. Every action is a
//! dispatch plus assembly over the `dl`, `uv` and `labels` components,
//! except [`CoreBatch::shuffle_images`], which swaps values across items
//! and therefore runs as a single-writer transform.
//!
//! Image decoding stays outside the engine behind [`ImageLoader`].

pub mod batch;
pub mod image;
pub mod index;

pub use batch::{CoreBatch, ImageLoader};
pub use image::CoreImage;
pub use index::{build_core_key, core_index, discover_core_samples, uv_path};
