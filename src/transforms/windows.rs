//! Window offset arithmetic for fixed-length crops.
//!
//! An offset `o` is valid for an item of length `n` and a window of length
//! `w` when `0 <= o <= n - w`.

use crate::error::{BatchError, BatchResult};

/// Offsets `0, step, 2 * step, ..` up to `item_length - window_length`
/// inclusive. Empty when the window does not fit.
pub fn strided_offsets(
    item_length: usize,
    window_length: usize,
    step: usize,
) -> BatchResult<Vec<usize>> {
    if step == 0 {
        return Err(BatchError::InvalidArgument {
            name: "step".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if window_length > item_length {
        return Ok(Vec::new());
    }
    Ok((0..=item_length - window_length).step_by(step).collect())
}

/// `count` offsets drawn uniformly from the valid range
pub fn random_offsets(
    rng: &mut fastrand::Rng,
    item_length: usize,
    window_length: usize,
    count: usize,
) -> BatchResult<Vec<usize>> {
    if window_length > item_length {
        return Err(BatchError::InvalidArgument {
            name: "window_length".to_string(),
            reason: format!("window of {window_length} does not fit an item of {item_length}"),
        });
    }
    let last = item_length - window_length;
    Ok((0..count).map(|_| rng.usize(0..=last)).collect())
}

/// One seed per item, drawn up front so per-item randomness does not depend
/// on the order in which a dispatch schedules items
pub fn item_seeds(rng: &mut fastrand::Rng, items: usize) -> Vec<u64> {
    (0..items).map(|_| rng.u64(..)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strided_includes_last_valid_offset() {
        assert_eq!(strided_offsets(10, 4, 3).unwrap(), vec![0, 3, 6]);
        assert_eq!(strided_offsets(10, 4, 2).unwrap(), vec![0, 2, 4, 6]);
        assert_eq!(strided_offsets(4, 4, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_strided_window_too_long() {
        assert!(strided_offsets(3, 4, 1).unwrap().is_empty());
        assert!(strided_offsets(10, 4, 0).is_err());
    }

    #[test]
    fn test_random_offsets_in_range() {
        let mut rng = fastrand::Rng::with_seed(7);
        let offsets = random_offsets(&mut rng, 12, 5, 50).unwrap();
        assert_eq!(offsets.len(), 50);
        assert!(offsets.iter().all(|o| *o <= 7));
        assert_eq!(random_offsets(&mut rng, 5, 5, 3).unwrap(), vec![0, 0, 0]);
        assert!(random_offsets(&mut rng, 4, 5, 1).is_err());
    }

    #[test]
    fn test_item_seeds_are_reproducible() {
        let a = item_seeds(&mut fastrand::Rng::with_seed(1), 4);
        let b = item_seeds(&mut fastrand::Rng::with_seed(1), 4);
        assert_eq!(a, b);
    }
}
