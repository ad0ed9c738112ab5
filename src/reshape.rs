//! De-interleaving of multiplexed channel data.
//!
//! A multi-channel transport carries N channels sample-interleaved:
//! `[s0c0 s0c1 .. s0cN s1c0 ..]`, each entry one IQ pair. Classification needs
//! channel 0 contiguous, so blocks are transposed to channel-major order
//! `[c0s0 c0s1 .. c1s0 ..]`.

use crate::sample::{NULL_BYTE, SAMPLE_BYTES};

/// Layout of emitted multi-channel blocks
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputOrder {
    /// Channel-major, each channel contiguous
    Column,
    /// Sample-major, as received
    Row,
}

#[derive(Clone, Copy, Debug)]
pub struct ChannelReshaper {
    channels: usize,
}

impl ChannelReshaper {
    pub fn new(channels: usize) -> Self {
        assert!(channels > 0, "Channel count must be at least one");
        Self { channels }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes in one time-aligned row of samples across all channels
    pub fn stride(&self) -> usize {
        self.channels * SAMPLE_BYTES
    }

    /// Samples per channel in an aligned region of `len` bytes
    pub fn samples_per_channel(&self, len: usize) -> usize {
        len / self.stride()
    }

    /// Sample-major `rows` into channel-major `out`
    pub fn transpose(&self, rows: &[u8], out: &mut Vec<u8>) {
        let per_channel = self.samples_per_channel(rows.len());
        out.clear();
        out.resize(per_channel * self.stride(), 0);
        for (s, row) in rows.chunks_exact(self.stride()).enumerate() {
            for (c, pair) in row.chunks_exact(SAMPLE_BYTES).enumerate() {
                let dst = (c * per_channel + s) * SAMPLE_BYTES;
                out[dst..dst + SAMPLE_BYTES].copy_from_slice(pair);
            }
        }
    }

    /// Channel-major `columns` back into sample-major `out`
    pub fn interleave(&self, columns: &[u8], out: &mut Vec<u8>) {
        let per_channel = self.samples_per_channel(columns.len());
        out.clear();
        out.resize(per_channel * self.stride(), 0);
        if per_channel == 0 {
            return;
        }
        for (c, column) in columns.chunks_exact(per_channel * SAMPLE_BYTES).enumerate() {
            for (s, pair) in column.chunks_exact(SAMPLE_BYTES).enumerate() {
                let dst = s * self.stride() + c * SAMPLE_BYTES;
                out[dst..dst + SAMPLE_BYTES].copy_from_slice(pair);
            }
        }
    }

    /// Channel 0 of a channel-major block, the one that drives classification
    pub fn reference<'a>(&self, columns: &'a [u8]) -> &'a [u8] {
        &columns[..self.samples_per_channel(columns.len()) * SAMPLE_BYTES]
    }

    /// Lay out a received block for emission
    pub fn arrange(&self, rows: &[u8], order: OutputOrder, out: &mut Vec<u8>) {
        match order {
            OutputOrder::Column if self.channels > 1 => self.transpose(rows, out),
            _ => {
                out.clear();
                out.extend_from_slice(rows);
            }
        }
    }
}

/// Fill `out` with `samples` null pairs
pub fn null_block(samples: usize, out: &mut Vec<u8>) {
    out.clear();
    out.resize(samples * SAMPLE_BYTES, NULL_BYTE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn test_transpose_layout() {
        let r = ChannelReshaper::new(2);
        // two rows of two channels
        let rows = [0u8, 1, 10, 11, 2, 3, 12, 13];
        let mut cols = Vec::new();
        r.transpose(&rows, &mut cols);
        assert_eq!(vec![0, 1, 2, 3, 10, 11, 12, 13], cols);
        assert_eq!(&[0u8, 1, 2, 3][..], r.reference(&cols));
    }

    #[test]
    fn test_reinterleave_restores_frame() {
        let mut rng = rand::thread_rng();
        let mut cols = Vec::new();
        let mut back = Vec::new();
        for channels in 1..=8 {
            let r = ChannelReshaper::new(channels);
            for samples in [0, 1, 2, rng.gen_range(3..200)] {
                let mut rows = vec![0u8; samples * r.stride()];
                rng.fill(&mut rows[..]);
                r.transpose(&rows, &mut cols);
                assert_eq!(rows.len(), cols.len());
                r.interleave(&cols, &mut back);
                assert_eq!(rows, back, "{} channels, {} samples", channels, samples);
            }
        }
    }

    #[test]
    fn test_single_channel_is_identity() {
        let r = ChannelReshaper::new(1);
        let rows = [9u8, 8, 7, 6];
        let mut out = Vec::new();
        r.transpose(&rows, &mut out);
        assert_eq!(rows.to_vec(), out);
        r.arrange(&rows, OutputOrder::Column, &mut out);
        assert_eq!(rows.to_vec(), out);
    }

    #[test]
    fn test_samples_per_channel() {
        let r = ChannelReshaper::new(4);
        assert_eq!(8, r.stride());
        assert_eq!(2, r.samples_per_channel(16));
        assert_eq!(2, r.samples_per_channel(21));
    }

    #[test]
    fn test_null_block() {
        let mut out = vec![0u8; 3];
        null_block(8, &mut out);
        assert_eq!(16, out.len());
        assert!(out.iter().all(|&b| b == NULL_BYTE));
    }
}
