//! This module is responsible for getting emitted blocks out of the process,
//! either as a byte stream or as one datagram per block.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    net::UdpSocket,
    path::Path,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::error::{Result, SquelchError};

/// Emitted frames queued for the publisher before the squelch loop blocks
pub const PUBLISH_QUEUE: usize = 256;

/// Where emitted blocks go. Called once per emitted block.
pub trait Sink {
    fn emit(&mut self, block: &[u8]) -> Result<()>;

    /// Flush anything buffered and surface late failures
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Byte-stream output, fragmentation doesn't matter
pub struct StreamSink<W: Write> {
    writer: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Sink for StreamSink<W> {
    fn emit(&mut self, block: &[u8]) -> Result<()> {
        self.writer
            .write_all(block)
            .map_err(SquelchError::SinkWriteFailure)
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(SquelchError::SinkWriteFailure)
    }
}

/// Create the output file, `None` for stdout
pub fn open_writer(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(SquelchError::SinkWriteFailure)?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Frame-oriented output: every emitted block becomes one frame handed to a
/// publisher thread
pub struct FrameSink {
    sender: Option<Sender<Vec<u8>>>,
    publisher: Option<JoinHandle<io::Result<u64>>>,
}

impl FrameSink {
    pub fn new(sender: Sender<Vec<u8>>, publisher: JoinHandle<io::Result<u64>>) -> Self {
        Self {
            sender: Some(sender),
            publisher: Some(publisher),
        }
    }

    /// Wait for the publisher and turn its outcome into ours
    fn join(&mut self) -> Result<()> {
        let Some(handle) = self.publisher.take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(Ok(sent)) => {
                debug!("Publisher finished after {} frames", sent);
                Ok(())
            }
            Ok(Err(e)) => Err(SquelchError::SinkWriteFailure(e)),
            Err(_) => Err(SquelchError::SinkWriteFailure(io::Error::new(
                io::ErrorKind::Other,
                "publisher thread panicked",
            ))),
        }
    }
}

impl Sink for FrameSink {
    fn emit(&mut self, block: &[u8]) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| {
            SquelchError::SinkWriteFailure(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "frame sink already finished",
            ))
        })?;
        if sender.send(block.to_vec()).is_err() {
            // The publisher only hangs up on failure
            self.sender = None;
            self.join()?;
            return Err(SquelchError::SinkWriteFailure(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "publisher stopped",
            )));
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Hanging up lets the publisher drain the queue and exit
        self.sender = None;
        self.join()
    }
}

/// Send every queued frame as one datagram to the connected peer
pub fn publish_udp(socket: UdpSocket, frames: Receiver<Vec<u8>>) -> io::Result<u64> {
    let mut sent = 0u64;
    for frame in frames {
        socket.send(&frame)?;
        sent += 1;
    }
    Ok(sent)
}

/// Connect a socket to `addr` and start publishing on a new thread
pub fn spawn_publisher(addr: &str) -> Result<FrameSink> {
    let transport = |source| SquelchError::Transport {
        addr: addr.to_owned(),
        source,
    };
    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(transport)?;
    socket.connect(addr).map_err(transport)?;
    info!("Publishing frames to {}", addr);
    let (sender, receiver) = bounded(PUBLISH_QUEUE);
    let handle = thread::spawn(move || publish_udp(socket, receiver));
    Ok(FrameSink::new(sender, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stream_sink_writes_through() {
        let mut out = Vec::new();
        let mut sink = StreamSink::new(&mut out);
        sink.emit(&[1, 2]).unwrap();
        sink.emit(&[3, 4]).unwrap();
        sink.finish().unwrap();
        drop(sink);
        assert_eq!(vec![1, 2, 3, 4], out);
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_sink_failure() {
        let mut sink = StreamSink::new(Full);
        assert!(matches!(
            sink.emit(&[0, 0]),
            Err(SquelchError::SinkWriteFailure(_))
        ));
    }

    #[test]
    fn test_frame_sink_one_frame_per_block() {
        let (sender, receiver) = bounded(4);
        let handle = thread::spawn(move || Ok::<_, io::Error>(receiver.iter().count() as u64));
        let mut sink = FrameSink::new(sender, handle);
        sink.emit(&[1, 1]).unwrap();
        sink.emit(&[2, 2]).unwrap();
        sink.finish().unwrap();
    }

    #[test]
    fn test_frame_sink_reports_publisher_failure() {
        let (sender, receiver) = bounded::<Vec<u8>>(1);
        let handle = thread::spawn(move || {
            let _ = receiver.recv();
            Err::<u64, _>(io::Error::new(io::ErrorKind::ConnectionRefused, "no peer"))
        });
        let mut sink = FrameSink::new(sender, handle);
        let mut result = Ok(());
        for _ in 0..4 {
            result = sink.emit(&[0, 0]);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(SquelchError::SinkWriteFailure(_))));
    }

    #[test]
    fn test_publish_udp_loopback() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut sink = spawn_publisher(&peer.local_addr().unwrap().to_string()).unwrap();
        sink.emit(&[127, 127, 127, 127]).unwrap();
        sink.finish().unwrap();
        let mut buf = [0u8; 16];
        let n = peer.recv(&mut buf).unwrap();
        assert_eq!(&[127, 127, 127, 127], &buf[..n]);
    }
}
