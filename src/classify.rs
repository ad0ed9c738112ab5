//! Per-block sample classification

use crate::sample::samples;

/// What a block looked like to the classifier
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Classification {
    /// Sum of every sample magnitude in the block, wide enough that it can't wrap
    pub magnitude_sum: u64,
    /// Samples whose magnitude is strictly over the sample threshold
    pub over_threshold: u32,
    /// Whole samples in the block
    pub samples: u32,
}

impl Classification {
    /// Mean magnitude, zero for an empty block
    pub fn mean_magnitude(&self) -> u32 {
        if self.samples == 0 {
            0
        } else {
            // A mean of u8 magnitudes fits
            (self.magnitude_sum / self.samples as u64) as u32
        }
    }
}

/// Count the samples in `block` (raw IQ bytes) that exceed `sample_threshold`
pub fn classify(block: &[u8], sample_threshold: u8) -> Classification {
    samples(block).fold(Classification::default(), |mut acc, s| {
        let mag = s.magnitude();
        if mag > sample_threshold {
            acc.over_threshold += 1;
        }
        acc.magnitude_sum += mag as u64;
        acc.samples += 1;
        acc
    })
}

/// The over-threshold count a block of `samples` must exceed to count as signal
pub fn block_threshold(samples: usize, percent: u8) -> u64 {
    samples as u64 * percent as u64 / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: &[(u8, u8)]) -> Vec<u8> {
        pairs.iter().flat_map(|&(i, q)| [i, q]).collect()
    }

    #[test]
    fn test_count_bounded_by_size() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let c = classify(&raw, 0);
        assert!(c.over_threshold <= c.samples);
        assert_eq!(128, c.samples);
    }

    #[test]
    fn test_midscale_never_counts() {
        let raw = block(&[(128, 128); 64]);
        let c = classify(&raw, 0);
        assert_eq!(0, c.over_threshold);
        assert_eq!(0, c.magnitude_sum);
    }

    #[test]
    fn test_strictly_over() {
        // Magnitude 10 exactly does not count at threshold 10
        let raw = block(&[(133, 133), (134, 133)]);
        let c = classify(&raw, 10);
        assert_eq!(1, c.over_threshold);
        assert_eq!(21, c.magnitude_sum);
        assert_eq!(10, c.mean_magnitude());
    }

    #[test]
    fn test_half_high_block() {
        let raw = block(&[(128, 128), (128, 128), (200, 200), (200, 200)]);
        let c = classify(&raw, 10);
        assert_eq!(2, c.over_threshold);
        assert_eq!(288, c.magnitude_sum);
        assert_eq!(2, block_threshold(4, 50));
    }

    #[test]
    fn test_full_scale_sum_does_not_wrap() {
        // 255 * 17M is past u32::MAX
        let samples = 17_000_000usize;
        let raw = vec![0u8; samples * 2];
        let c = classify(&raw, 10);
        assert_eq!(255 * samples as u64, c.magnitude_sum);
        assert_eq!(samples as u32, c.over_threshold);
        assert_eq!(255, c.mean_magnitude());
    }

    #[test]
    fn test_block_threshold_truncates() {
        assert_eq!(511, block_threshold(1023, 50));
        assert_eq!(0, block_threshold(1, 99));
        assert_eq!(1024, block_threshold(1024, 100));
    }
}
