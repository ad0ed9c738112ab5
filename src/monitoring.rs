//! In this module, we implement the monitoring for a squelch run.
//! This includes event boundary diagnostics, running sample counts
//! and the summary reported when the run ends.

use std::time::{Duration, Instant};

use tracing::info;

/// How often progress is reported in verbose mode
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Totals for one run
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct RunSummary {
    /// Quiet to triggered transitions
    pub events: u64,
    pub blocks_read: u64,
    pub blocks_emitted: u64,
    /// IQ pairs read, all channels
    pub samples_received: u64,
    /// IQ pairs written, all channels
    pub samples_sent: u64,
    /// Inputs with a misaligned tail that was dropped
    pub malformed: u64,
    pub noise_average: u32,
    /// Byte offset of the block that opened the first event
    pub first_event: Option<u64>,
}

#[derive(Debug)]
pub struct Monitor {
    summary: RunSummary,
    started: u64,
    open_event: Option<u64>,
    verbose: bool,
    last_report: Instant,
}

impl Monitor {
    pub fn new(verbose: bool) -> Self {
        Self {
            summary: RunSummary::default(),
            started: 0,
            open_event: None,
            verbose,
            last_report: Instant::now(),
        }
    }

    pub fn received(&mut self, samples: usize) {
        self.summary.blocks_read += 1;
        self.summary.samples_received += samples as u64;
    }

    pub fn sent(&mut self, samples: usize) {
        self.summary.blocks_emitted += 1;
        self.summary.samples_sent += samples as u64;
    }

    pub fn event_start(&mut self, offset: u64) {
        self.started += 1;
        self.open_event = Some(offset);
        self.summary.first_event.get_or_insert(offset);
        info!("Output triggered from byte offset {}", offset);
    }

    pub fn event_end(&mut self, offset: u64) {
        if let Some(start) = self.open_event.take() {
            info!("Event from byte offset {} ended at {}", start, offset);
        }
    }

    /// Event start diagnostics reported so far
    pub fn started(&self) -> u64 {
        self.started
    }

    /// Report progress if verbose and the interval has passed
    pub fn tick(&mut self) {
        if !self.verbose || self.last_report.elapsed() < REPORT_INTERVAL {
            return;
        }
        self.last_report = Instant::now();
        info!(
            received = self.summary.samples_received,
            sent = self.summary.samples_sent,
            events = self.started,
            "Progress"
        );
    }

    /// Close an event still open at end of input and produce the totals
    pub fn finish(mut self, end: u64, events: u64, malformed: u64, noise: u32) -> RunSummary {
        self.event_end(end);
        self.summary.events = events;
        self.summary.malformed = malformed;
        self.summary.noise_average = noise;
        info!("{} events output", events);
        self.summary
    }
}
