//! Block sources.
//!
//! Every source fills one of two same-size slots per block and keeps the other
//! untouched, so the block before the current one is still there to be emitted
//! when an event opens.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    thread,
    time::Duration,
};

use crossbeam_channel::TryRecvError;
use tracing::{debug, warn};

use crate::{
    error::{Result, SquelchError},
    StopFlag,
};

/// One block handed to the squelch loop
#[derive(Clone, Copy, Debug)]
pub struct Block<'a> {
    /// Raw sample-major bytes of this block
    pub data: &'a [u8],
    /// The block read just before this one, absent for the first block
    pub previous: Option<&'a [u8]>,
    /// Byte position of `data` in the source, including the starting offset
    pub offset: u64,
}

pub trait BlockSource {
    /// The next block, `None` once the source is exhausted or stopped
    fn next_block(&mut self) -> Result<Option<Block<'_>>>;

    /// Number of inputs whose misaligned tail was discarded
    fn malformed(&self) -> u64 {
        0
    }
}

/// Two block slots used alternately
#[derive(Debug)]
pub struct DoubleBuffer {
    slots: [Vec<u8>; 2],
    lens: [usize; 2],
    current: usize,
    blocks: u64,
}

impl DoubleBuffer {
    pub fn new(block_bytes: usize) -> Self {
        Self {
            slots: [vec![0u8; block_bytes], vec![0u8; block_bytes]],
            lens: [0; 2],
            current: 0,
            blocks: 0,
        }
    }

    /// Retire the current block to the previous slot and hand out the other for filling
    pub fn rotate(&mut self) -> &mut [u8] {
        if self.blocks > 0 {
            self.current ^= 1;
        }
        self.lens[self.current] = 0;
        &mut self.slots[self.current]
    }

    /// Mark the first `len` bytes of the slot from `rotate` as the current block
    pub fn commit(&mut self, len: usize) {
        self.lens[self.current] = len;
        self.blocks += 1;
    }

    pub fn current(&self) -> &[u8] {
        &self.slots[self.current][..self.lens[self.current]]
    }

    pub fn previous(&self) -> Option<&[u8]> {
        let prev = self.current ^ 1;
        (self.blocks > 1).then(|| &self.slots[prev][..self.lens[prev]])
    }

    /// Blocks committed so far
    pub fn blocks(&self) -> u64 {
        self.blocks
    }
}

/// Open the input, `None` for stdin, and skip `offset` bytes
pub fn open_reader(path: Option<&Path>, offset: u64) -> Result<Box<dyn Read + Send>> {
    match path {
        Some(path) => {
            let unavailable = |source| SquelchError::SourceUnavailable {
                name: path.display().to_string(),
                source,
            };
            let mut file = File::open(path).map_err(unavailable)?;
            if offset > 0 {
                file.seek(SeekFrom::Start(offset)).map_err(unavailable)?;
            }
            Ok(Box::new(file))
        }
        None => {
            let mut stdin = io::stdin();
            if offset > 0 {
                // Can't seek a pipe, read past the offset instead
                io::copy(&mut (&mut stdin).take(offset), &mut io::sink()).map_err(|source| {
                    SquelchError::SourceUnavailable {
                        name: "stdin".to_owned(),
                        source,
                    }
                })?;
            }
            Ok(Box::new(stdin))
        }
    }
}

/// Read until `buf` is full or the reader is exhausted
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Blocks from a finite byte source.
/// The last block may be short, it is trimmed to whole rows of samples.
pub struct ReaderSource<R> {
    reader: R,
    buffers: DoubleBuffer,
    block_bytes: usize,
    stride: usize,
    position: u64,
    limit: u64,
    malformed: u64,
    done: bool,
}

impl<R: Read> ReaderSource<R> {
    /// `position` is the byte offset the reader already sits at,
    /// `stride` the bytes in one row of samples across all channels
    pub fn new(reader: R, block_bytes: usize, stride: usize, position: u64, limit: u64) -> Self {
        Self {
            reader,
            buffers: DoubleBuffer::new(block_bytes),
            block_bytes,
            stride,
            position,
            limit,
            malformed: 0,
            done: false,
        }
    }
}

impl<R: Read> BlockSource for ReaderSource<R> {
    fn next_block(&mut self) -> Result<Option<Block<'_>>> {
        if self.done || (self.limit > 0 && self.buffers.blocks() >= self.limit) {
            return Ok(None);
        }
        let offset = self.position;
        let slot = self.buffers.rotate();
        let n = read_full(&mut self.reader, slot)
            .map_err(|source| SquelchError::SourceReadFailure { offset, source })?;
        let aligned = n - n % self.stride;
        if aligned != n {
            self.malformed += 1;
            warn!(
                "Discarding {} trailing bytes at offset {} that do not form a whole sample row",
                n - aligned,
                offset + aligned as u64
            );
        }
        if n < self.block_bytes {
            self.done = true;
        }
        if aligned == 0 {
            self.done = true;
            return Ok(None);
        }
        self.buffers.commit(aligned);
        self.position += n as u64;
        Ok(Some(Block {
            data: self.buffers.current(),
            previous: self.buffers.previous(),
            offset,
        }))
    }

    fn malformed(&self) -> u64 {
        self.malformed
    }
}

/// Result of checking a transport for a frame without blocking
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    Frame(Vec<u8>),
    Empty,
    Closed,
}

/// Non-blocking receive half of a frame transport
pub trait FrameReceiver {
    fn poll_frame(&mut self) -> Poll;
}

impl FrameReceiver for rtrb::Consumer<Vec<u8>> {
    fn poll_frame(&mut self) -> Poll {
        match self.pop() {
            Ok(frame) => Poll::Frame(frame),
            // A frame may land between the failed pop and the producer leaving
            Err(_) if self.is_abandoned() => match self.pop() {
                Ok(frame) => Poll::Frame(frame),
                Err(_) => Poll::Closed,
            },
            Err(_) => Poll::Empty,
        }
    }
}

impl FrameReceiver for crossbeam_channel::Receiver<Vec<u8>> {
    fn poll_frame(&mut self) -> Poll {
        match self.try_recv() {
            Ok(frame) => Poll::Frame(frame),
            Err(TryRecvError::Empty) => Poll::Empty,
            Err(TryRecvError::Disconnected) => Poll::Closed,
        }
    }
}

/// Blocks cut from an unbounded stream of frames.
///
/// Each frame must hold whole rows of samples across all channels; a misaligned
/// tail is dropped. Aligned bytes that don't fill a block wait for the next frame.
pub struct FrameSource<F> {
    frames: F,
    buffers: DoubleBuffer,
    residue: Vec<u8>,
    block_bytes: usize,
    stride: usize,
    skip: u64,
    position: u64,
    limit: u64,
    malformed: u64,
    stop: StopFlag,
    poll_interval: Duration,
}

impl<F: FrameReceiver> FrameSource<F> {
    /// The first `offset` received bytes are skipped
    pub fn new(
        frames: F,
        block_bytes: usize,
        stride: usize,
        offset: u64,
        limit: u64,
        stop: StopFlag,
    ) -> Self {
        Self {
            frames,
            buffers: DoubleBuffer::new(block_bytes),
            residue: Vec::with_capacity(2 * block_bytes),
            block_bytes,
            stride,
            skip: offset,
            position: offset,
            limit,
            malformed: 0,
            stop,
            poll_interval: Duration::from_millis(5),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn accept(&mut self, frame: &[u8]) {
        let aligned = frame.len() - frame.len() % self.stride;
        if aligned != frame.len() {
            self.malformed += 1;
            warn!(
                "Frame of {} bytes is not a multiple of {}, discarding {} trailing bytes",
                frame.len(),
                self.stride,
                frame.len() - aligned
            );
        }
        let mut usable = &frame[..aligned];
        if self.skip > 0 {
            let n = usable.len().min(self.skip as usize);
            usable = &usable[n..];
            self.skip -= n as u64;
        }
        self.residue.extend_from_slice(usable);
    }

    /// Wait until the residue holds a full block, false if the stream ended first
    fn fill(&mut self) -> bool {
        while self.residue.len() < self.block_bytes {
            if self.stop.is_stopped() {
                return false;
            }
            match self.frames.poll_frame() {
                Poll::Frame(frame) => self.accept(&frame),
                Poll::Empty => thread::sleep(self.poll_interval),
                Poll::Closed => {
                    debug!(
                        "Frame transport closed with {} bytes short of a block",
                        self.residue.len()
                    );
                    return false;
                }
            }
        }
        true
    }
}

impl<F: FrameReceiver> BlockSource for FrameSource<F> {
    fn next_block(&mut self) -> Result<Option<Block<'_>>> {
        if self.limit > 0 && self.buffers.blocks() >= self.limit {
            return Ok(None);
        }
        if !self.fill() {
            return Ok(None);
        }
        let offset = self.position;
        let slot = self.buffers.rotate();
        slot.copy_from_slice(&self.residue[..self.block_bytes]);
        self.residue.drain(..self.block_bytes);
        self.buffers.commit(self.block_bytes);
        self.position += self.block_bytes as u64;
        Ok(Some(Block {
            data: self.buffers.current(),
            previous: self.buffers.previous(),
            offset,
        }))
    }

    fn malformed(&self) -> u64 {
        self.malformed
    }
}
