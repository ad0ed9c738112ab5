//! This module contains all the capture logic

// The capture thread does one thing: pull datagrams off the socket and hand
// the payloads to the squelch loop through an rtrb ring buffer. The socket has
// a read timeout so the thread notices a stop request even on a silent link.

use std::{
    io,
    net::UdpSocket,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    config::MAX_DATAGRAM,
    error::{Result, SquelchError},
    StopFlag,
};

pub type Frame = Vec<u8>;

/// How long a receive may block before the stop flag is checked again
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Frames the ring can hold before capture starts dropping
pub const RING_CAPACITY: usize = 1024;

pub fn bind(addr: &str) -> Result<UdpSocket> {
    let transport = |source| SquelchError::Transport {
        addr: addr.to_owned(),
        source,
    };
    let socket = UdpSocket::bind(addr).map_err(transport)?;
    socket
        .set_read_timeout(Some(RECV_TIMEOUT))
        .map_err(transport)?;
    Ok(socket)
}

/// Receive until stopped, returning how many frames were dropped on a full ring
pub fn capture_udp(socket: UdpSocket, mut producer: rtrb::Producer<Frame>, stop: StopFlag) -> u64 {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut dropped = 0u64;
    let mut failures = 0u64;
    while !stop.is_stopped() {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue
            }
            Err(e) => {
                // Keep truckin, a bad datagram shouldn't end the capture
                failures += 1;
                if failures.is_power_of_two() {
                    warn!("Receive failed ({} so far): {}", failures, e);
                }
                thread::sleep(RECV_TIMEOUT);
                continue;
            }
        };
        if producer.push(buf[..n].to_vec()).is_err() {
            dropped += 1;
            if dropped.is_power_of_two() {
                warn!("Ring buffer full, {} frames dropped so far", dropped);
            }
        }
    }
    debug!("Capture stopped");
    dropped
}

/// Bind `addr` and start capturing on a new thread
pub fn spawn_capture(
    addr: &str,
    stop: StopFlag,
) -> Result<(rtrb::Consumer<Frame>, JoinHandle<u64>)> {
    let socket = bind(addr)?;
    info!("Listening for frames on {}", addr);
    let (producer, consumer) = rtrb::RingBuffer::new(RING_CAPACITY);
    let handle = thread::spawn(move || capture_udp(socket, producer, stop));
    Ok((consumer, handle))
}
