//! The squelch loop: read a block, classify it, decide, emit.
//!
//! Everything mutable during a run lives in [`Squelch`] and is touched by this
//! loop only, so nothing here is shared or locked. The stop flag is checked
//! once per block.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::{
    capture::spawn_capture,
    classify::{classify, Classification},
    config::{Endpoints, SquelchConfig},
    error::Result,
    exfil::{open_writer, spawn_publisher, Sink, StreamSink},
    monitoring::{Monitor, RunSummary},
    reshape::{null_block, ChannelReshaper, OutputOrder},
    sample::sample_count,
    source::{open_reader, Block, BlockSource, FrameSource, ReaderSource},
    squelch::{Edge, EventStateMachine},
    StopFlag,
};

pub struct Squelch {
    machine: EventStateMachine,
    reshaper: ChannelReshaper,
    order: OutputOrder,
    sample_threshold: u8,
    null_fill: bool,
    monitor: Monitor,
    columns: Vec<u8>,
    out: Vec<u8>,
    position: u64,
    stop: StopFlag,
}

impl Squelch {
    pub fn new(config: &SquelchConfig, stop: StopFlag) -> Self {
        Self {
            machine: EventStateMachine::new(config.block_threshold, config.padding, config.auto),
            reshaper: ChannelReshaper::new(config.channels),
            order: config.output_order(),
            sample_threshold: config.sample_threshold,
            null_fill: config.null_fill,
            monitor: Monitor::new(config.verbose),
            columns: Vec::with_capacity(config.block_bytes()),
            out: Vec::with_capacity(config.block_bytes()),
            position: config.offset,
            stop,
        }
    }

    /// Run until the source is exhausted, a stop is requested or something fails.
    /// The sink is finished on every path.
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: BlockSource + ?Sized,
        K: Sink + ?Sized,
    {
        if let Err(e) = self.drive(source, sink) {
            if let Err(flush) = sink.finish() {
                warn!("Output not flushed cleanly: {}", flush);
            }
            return Err(e);
        }
        sink.finish()?;
        Ok(self.monitor.finish(
            self.position,
            self.machine.events(),
            source.malformed(),
            self.machine.noise().average(),
        ))
    }

    fn drive<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<()>
    where
        S: BlockSource + ?Sized,
        K: Sink + ?Sized,
    {
        loop {
            if self.stop.is_stopped() {
                info!("Stop requested, finishing up");
                return Ok(());
            }
            match source.next_block()? {
                Some(block) => self.process(block, sink)?,
                None => return Ok(()),
            }
            self.monitor.tick();
        }
    }

    /// Classify on channel 0 only
    fn classify(&mut self, rows: &[u8]) -> Classification {
        if self.reshaper.channels() == 1 {
            return classify(rows, self.sample_threshold);
        }
        self.reshaper.transpose(rows, &mut self.columns);
        classify(self.reshaper.reference(&self.columns), self.sample_threshold)
    }

    fn process<K: Sink + ?Sized>(&mut self, block: Block<'_>, sink: &mut K) -> Result<()> {
        self.monitor.received(sample_count(block.data));
        self.position = block.offset + block.data.len() as u64;

        let class = self.classify(block.data);
        let decision = self.machine.step(&class);
        match decision.edge {
            Some(Edge::Start) => self.monitor.event_start(block.offset),
            Some(Edge::End) => self.monitor.event_end(block.offset),
            None => {}
        }

        // With null filling the previous block already went out as nulls
        if decision.emit_previous && !self.null_fill {
            if let Some(previous) = block.previous {
                self.emit(previous, sink)?;
            }
        }
        if decision.emit_current {
            self.emit(block.data, sink)?;
        } else if self.null_fill {
            let samples = sample_count(block.data);
            null_block(samples, &mut self.out);
            sink.emit(&self.out)?;
            self.monitor.sent(samples);
        }
        Ok(())
    }

    fn emit<K: Sink + ?Sized>(&mut self, rows: &[u8], sink: &mut K) -> Result<()> {
        if self.reshaper.channels() == 1 || self.order == OutputOrder::Row {
            sink.emit(rows)?;
        } else {
            self.reshaper.arrange(rows, self.order, &mut self.out);
            sink.emit(&self.out)?;
        }
        self.monitor.sent(sample_count(rows));
        Ok(())
    }
}

fn log_config(config: &SquelchConfig, endpoints: &Endpoints) {
    info!("Block size: {} samples", config.block_size);
    if config.block_count > 0 {
        info!("Block count: {} blocks", config.block_count);
    }
    info!("Offset: {}", config.offset);
    info!("Sample threshold: {}", config.sample_threshold);
    info!("Block threshold: {}%", config.block_threshold);
    if config.channels > 1 {
        info!("Channels: {}", config.channels);
    }
    match endpoints {
        Endpoints::File { input, output } => {
            let name = |path: &Option<PathBuf>, fallback: &str| {
                path.as_ref()
                    .map_or_else(|| fallback.to_owned(), |p| p.display().to_string())
            };
            info!("Input file: {}", name(input, "stdin"));
            info!("Output file: {}", name(output, "stdout"));
        }
        Endpoints::Stream { listen, publish } => {
            info!("Listening on: {}", listen);
            info!("Publishing to: {}", publish);
        }
    }
}

/// Open the configured endpoints and run the squelch over them
pub fn execute(config: &SquelchConfig, stop: StopFlag) -> Result<RunSummary> {
    let endpoints = config.validate()?;
    log_config(config, &endpoints);
    let stride = ChannelReshaper::new(config.channels).stride();
    let squelch = Squelch::new(config, stop.clone());
    match endpoints {
        Endpoints::File { input, output } => {
            let reader = open_reader(input.as_deref(), config.offset)?;
            let mut source = ReaderSource::new(
                reader,
                config.block_bytes(),
                stride,
                config.offset,
                config.block_count,
            );
            let mut sink = StreamSink::new(open_writer(output.as_deref())?);
            squelch.run(&mut source, &mut sink)
        }
        Endpoints::Stream { listen, publish } => {
            let mut sink = spawn_publisher(&publish)?;
            let (frames, capture) = spawn_capture(&listen, stop.clone())?;
            let mut source = FrameSource::new(
                frames,
                config.block_bytes(),
                stride,
                config.offset,
                config.block_count,
                stop.clone(),
            );
            let summary = squelch.run(&mut source, &mut sink);
            // The block limit can end the run before anyone asked to stop
            stop.stop();
            match capture.join() {
                Ok(dropped) if dropped > 0 => warn!("{} frames dropped on a full ring", dropped),
                Ok(_) => debug!("Capture thread joined"),
                Err(_) => warn!("Capture thread panicked"),
            }
            summary
        }
    }
}
