use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SquelchError {
    #[error("Cannot open input {name}: {source}")]
    SourceUnavailable { name: String, source: io::Error },

    #[error("Read failed at byte offset {offset}: {source}")]
    SourceReadFailure { offset: u64, source: io::Error },

    #[error("Write to output failed: {0}")]
    SinkWriteFailure(#[source] io::Error),

    #[error("Transport setup failed for {addr}: {source}")]
    Transport { addr: String, source: io::Error },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SquelchError>;
