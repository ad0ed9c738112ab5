use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub mod args;
pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod exfil;
pub mod monitoring;
pub mod noise;
pub mod pipeline;
pub mod reshape;
pub mod sample;
pub mod source;
pub mod squelch;

pub use config::{Endpoints, SquelchConfig};
pub use error::{Result, SquelchError};
pub use monitoring::RunSummary;
pub use pipeline::Squelch;

/// Cooperative shutdown request shared between the signal handler and the workers
#[derive(Clone, Default, Debug)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
