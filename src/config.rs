//! Validated settings for one squelch run

use std::path::PathBuf;

use crate::{
    error::{Result, SquelchError},
    reshape::OutputOrder,
    sample::SAMPLE_BYTES,
};

pub const DEFAULT_BLOCK_SIZE: usize = 1024;
pub const DEFAULT_SAMPLE_THRESHOLD: u8 = 10;
pub const DEFAULT_BLOCK_THRESHOLD: u8 = 50;

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM: usize = 65_507;

/// Where samples come from and where the survivors go
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Endpoints {
    /// A finite byte source, `None` meaning stdin/stdout
    File {
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    },
    /// Frames received on one UDP address and published to another
    Stream { listen: String, publish: String },
}

#[derive(Clone, Debug)]
pub struct SquelchConfig {
    /// Track the background noise level from quiet blocks
    pub auto: bool,
    /// Samples per channel in one block
    pub block_size: usize,
    /// Stop after this many blocks, 0 for no limit
    pub block_count: u64,
    pub sample_threshold: u8,
    /// Percentage of a block that must be over the sample threshold
    pub block_threshold: u8,
    /// Bytes to skip before the first block
    pub offset: u64,
    /// Emit the block before and after each event
    pub padding: bool,
    pub verbose: bool,
    /// Channels multiplexed in the source
    pub channels: usize,
    /// Emit null samples in place of suppressed blocks
    pub null_fill: bool,
    /// Input file, `-` for stdin
    pub input: Option<PathBuf>,
    /// Output file, `-` or unset for stdout
    pub output: Option<PathBuf>,
    pub listen: Option<String>,
    pub publish: Option<String>,
}

impl Default for SquelchConfig {
    fn default() -> Self {
        Self {
            auto: false,
            block_size: DEFAULT_BLOCK_SIZE,
            block_count: 0,
            sample_threshold: DEFAULT_SAMPLE_THRESHOLD,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            offset: 0,
            padding: false,
            verbose: false,
            channels: 1,
            null_fill: false,
            input: None,
            output: None,
            listen: None,
            publish: None,
        }
    }
}

fn dash_is_std(path: &Option<PathBuf>) -> Option<PathBuf> {
    path.as_ref().filter(|p| p.as_os_str() != "-").cloned()
}

impl SquelchConfig {
    /// Bytes in one block across all channels
    pub fn block_bytes(&self) -> usize {
        self.checked_block_bytes().unwrap_or(usize::MAX)
    }

    fn checked_block_bytes(&self) -> Option<usize> {
        self.block_size
            .checked_mul(self.channels)?
            .checked_mul(SAMPLE_BYTES)
    }

    /// Null filling keeps the received row order, otherwise channels are split out
    pub fn output_order(&self) -> OutputOrder {
        if self.null_fill {
            OutputOrder::Row
        } else {
            OutputOrder::Column
        }
    }

    pub fn endpoints(&self) -> Result<Endpoints> {
        match (&self.listen, &self.publish) {
            (Some(listen), Some(publish)) => {
                if self.input.is_some() {
                    return Err(SquelchError::InvalidConfig(
                        "Cannot read both an input file and --listen".to_owned(),
                    ));
                }
                Ok(Endpoints::Stream {
                    listen: listen.clone(),
                    publish: publish.clone(),
                })
            }
            (Some(_), None) => Err(SquelchError::InvalidConfig(
                "Streaming needs --publish alongside --listen".to_owned(),
            )),
            (None, Some(_)) => Err(SquelchError::InvalidConfig(
                "Streaming needs --listen alongside --publish".to_owned(),
            )),
            (None, None) => match &self.input {
                Some(_) => Ok(Endpoints::File {
                    input: dash_is_std(&self.input),
                    output: dash_is_std(&self.output),
                }),
                None => Err(SquelchError::InvalidConfig(
                    "Must specify an input file or --listen/--publish".to_owned(),
                )),
            },
        }
    }

    pub fn validate(&self) -> Result<Endpoints> {
        if self.block_size == 0 {
            return Err(SquelchError::InvalidConfig(
                "Block size must be at least one sample".to_owned(),
            ));
        }
        if self.block_threshold > 100 {
            return Err(SquelchError::InvalidConfig(format!(
                "Block threshold {}% is over 100%",
                self.block_threshold
            )));
        }
        if self.channels == 0 {
            return Err(SquelchError::InvalidConfig(
                "Channel count must be at least one".to_owned(),
            ));
        }
        // Per-block sample counts are kept as u32
        if self.checked_block_bytes().is_none() || u32::try_from(self.block_size).is_err() {
            return Err(SquelchError::InvalidConfig(format!(
                "A block of {} samples across {} channels is too large",
                self.block_size, self.channels
            )));
        }
        let stride = self.channels * SAMPLE_BYTES;
        if self.channels > 1 && self.offset % stride as u64 != 0 {
            return Err(SquelchError::InvalidConfig(format!(
                "Offset {} is not a whole number of {} byte sample rows",
                self.offset, stride
            )));
        }
        let endpoints = self.endpoints()?;
        if let Endpoints::Stream { .. } = endpoints {
            if self.block_bytes() > MAX_DATAGRAM {
                return Err(SquelchError::InvalidConfig(format!(
                    "A block of {} bytes does not fit in one datagram ({} max)",
                    self.block_bytes(),
                    MAX_DATAGRAM
                )));
            }
        }
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> SquelchConfig {
        SquelchConfig {
            input: Some(PathBuf::from("capture.iq")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = file_config();
        assert_eq!(2048, cfg.block_bytes());
        assert_eq!(OutputOrder::Column, cfg.output_order());
        assert_eq!(
            Endpoints::File {
                input: Some(PathBuf::from("capture.iq")),
                output: None
            },
            cfg.validate().unwrap()
        );
    }

    #[test]
    fn test_dash_means_std() {
        let cfg = SquelchConfig {
            input: Some(PathBuf::from("-")),
            output: Some(PathBuf::from("-")),
            ..Default::default()
        };
        assert_eq!(
            Endpoints::File {
                input: None,
                output: None
            },
            cfg.validate().unwrap()
        );
    }

    #[test]
    fn test_half_stream_rejected() {
        let cfg = SquelchConfig {
            listen: Some("0.0.0.0:6000".to_owned()),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SquelchError::InvalidConfig(_))
        ));
        let cfg = SquelchConfig {
            publish: Some("127.0.0.1:6001".to_owned()),
            ..file_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_stream_block_must_fit_datagram() {
        let mut cfg = SquelchConfig {
            listen: Some("0.0.0.0:6000".to_owned()),
            publish: Some("127.0.0.1:6001".to_owned()),
            channels: 4,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.block_size = 16384;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_values_rejected() {
        for cfg in [
            SquelchConfig {
                block_size: 0,
                ..file_config()
            },
            SquelchConfig {
                block_threshold: 101,
                ..file_config()
            },
            SquelchConfig {
                channels: 0,
                ..file_config()
            },
            SquelchConfig::default(),
        ] {
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn test_oversized_block_rejected() {
        let cfg = SquelchConfig {
            block_size: 1 << (usize::BITS - 1),
            channels: 2,
            ..file_config()
        };
        assert_eq!(usize::MAX, cfg.block_bytes());
        assert!(matches!(
            cfg.validate(),
            Err(SquelchError::InvalidConfig(_))
        ));
        let cfg = SquelchConfig {
            block_size: usize::MAX / 2,
            ..file_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_offset_must_align_rows() {
        let mut cfg = SquelchConfig {
            channels: 4,
            offset: 12,
            ..file_config()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SquelchError::InvalidConfig(_))
        ));
        cfg.offset = 16;
        assert!(cfg.validate().is_ok());
        // A lone channel has no rows to misalign
        cfg.channels = 1;
        cfg.offset = 3;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_null_fill_keeps_rows() {
        let cfg = SquelchConfig {
            null_fill: true,
            ..file_config()
        };
        assert_eq!(OutputOrder::Row, cfg.output_order());
    }
}
