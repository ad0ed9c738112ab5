/// Bytes per IQ pair on the wire
pub const SAMPLE_BYTES: usize = 2;

/// The byte value representing zero amplitude
pub const MIDPOINT: u8 = 128;

/// The byte written in place of suppressed samples when null filling
pub const NULL_BYTE: u8 = 127;

/// One unsigned 8-bit in-phase/quadrature pair
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct IqSample {
    pub i: u8,
    pub q: u8,
}

impl IqSample {
    pub fn new(i: u8, q: u8) -> Self {
        Self { i, q }
    }

    /// Build from the first two bytes of `pair`
    pub fn from_pair(pair: &[u8]) -> Self {
        Self {
            i: pair[0],
            q: pair[1],
        }
    }

    /// Fast magnitude approximation, |I| + |Q| about the midpoint.
    /// Saturates at 255, so a full-scale pair never reads as quiet.
    pub fn magnitude(self) -> u8 {
        self.i.abs_diff(MIDPOINT).saturating_add(self.q.abs_diff(MIDPOINT))
    }
}

/// Number of whole IQ pairs in `bytes`
pub fn sample_count(bytes: &[u8]) -> usize {
    bytes.len() / SAMPLE_BYTES
}

/// Iterate the whole IQ pairs of a raw byte block
pub fn samples(bytes: &[u8]) -> impl Iterator<Item = IqSample> + '_ {
    bytes.chunks_exact(SAMPLE_BYTES).map(IqSample::from_pair)
}
