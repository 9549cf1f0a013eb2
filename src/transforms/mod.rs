//! # Transforms
//!
//! Shared arithmetic for component transforms.

pub mod windows;

pub use windows::{item_seeds, random_offsets, strided_offsets};
