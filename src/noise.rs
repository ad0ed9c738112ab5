/// Running background noise estimate, fed only from quiet blocks.
///
/// Each update weighs the newest block mean and the prior average equally.
/// The estimate is recorded and reported but does not move the sample threshold.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoiseEstimator {
    average: u32,
    updates: u64,
}

impl NoiseEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, block_mean: u32) {
        self.average = (self.average + block_mean) / 2;
        self.updates += 1;
    }

    pub fn average(&self) -> u32 {
        self.average
    }

    #[cfg(test)]
    pub fn updates(&self) -> u64 {
        self.updates
    }
}
