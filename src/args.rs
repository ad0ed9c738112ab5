//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use crate::config::{
    SquelchConfig, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_THRESHOLD, DEFAULT_SAMPLE_THRESHOLD,
};

/// Suppress IQ samples below a certain threshold
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Unsigned 8-bit IQ file to process ("-" for stdin)
    #[clap(value_parser)]
    pub file: Option<PathBuf>,
    /// Auto mode, track the average noise level of quiet blocks
    #[clap(short = 'a', long)]
    pub auto: bool,
    /// Number of samples (per channel) to read at a time
    #[clap(short = 'b', long, default_value_t = DEFAULT_BLOCK_SIZE, value_parser = nonzero)]
    pub block_size: usize,
    /// Limit the total number of blocks to process (0 for no limit)
    #[clap(short = 'c', long, default_value_t = 0, value_parser = parse_int::<u64>)]
    pub block_count: u64,
    /// Sample magnitude threshold (0-255)
    #[clap(short = 'm', long, default_value_t = DEFAULT_SAMPLE_THRESHOLD, value_parser = parse_int::<u8>)]
    pub magnitude: u8,
    /// Output file to write samples ("-" for stdout)
    #[clap(short = 'o', long, value_parser)]
    pub output: Option<PathBuf>,
    /// Output the block before and after a signal
    #[clap(short = 'p', long)]
    pub padding: bool,
    /// Starting byte offset within the input
    #[clap(short = 's', long, default_value_t = 0, value_parser = parse_int::<u64>)]
    pub offset: u64,
    /// Percentage of a block that must be over the magnitude threshold
    /// before that block is output
    #[clap(short = 't', long, default_value_t = DEFAULT_BLOCK_THRESHOLD, value_parser = percent)]
    pub threshold: u8,
    /// Number of channels interleaved in the input
    #[clap(short = 'n', long, default_value_t = 1, value_parser = nonzero)]
    pub channels: usize,
    /// Replace suppressed blocks with null samples instead of dropping them
    #[clap(long)]
    pub null_fill: bool,
    /// UDP address to receive frames on
    #[clap(long, value_name = "HOST:PORT", requires = "publish", conflicts_with = "file")]
    pub listen: Option<String>,
    /// UDP address to publish emitted frames to
    #[clap(long, value_name = "HOST:PORT", requires = "listen")]
    pub publish: Option<String>,
    #[clap(flatten)]
    pub verbose: Verbosity<WarnLevel>,
}

impl Args {
    pub fn into_config(self) -> SquelchConfig {
        SquelchConfig {
            auto: self.auto,
            block_size: self.block_size,
            block_count: self.block_count,
            sample_threshold: self.magnitude,
            block_threshold: self.threshold,
            offset: self.offset,
            padding: self.padding,
            verbose: self.verbose.log_level_filter() >= log::LevelFilter::Info,
            channels: self.channels,
            null_fill: self.null_fill,
            input: self.file,
            output: self.output,
            listen: self.listen,
            publish: self.publish,
        }
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

/// Decimal, or hexadecimal with a leading 0x
fn parse_int<T: TryFrom<u64>>(s: &str) -> Result<T, String> {
    let v = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    }
    .map_err(|_| format!("Invalid number {:?}", s))?;
    T::try_from(v).map_err(|_| format!("{} is out of range", v))
}

fn nonzero(s: &str) -> Result<usize, String> {
    match parse_int::<usize>(s)? {
        0 => Err("Must be at least 1".to_string()),
        v => Ok(v),
    }
}

fn percent(s: &str) -> Result<u8, String> {
    match parse_int::<u8>(s)? {
        v if v > 100 => Err(format!("{}% is over 100%", v)),
        v => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Args::parse_from(["iq-squelch", "capture.iq"]).into_config();
        assert_eq!(1024, cfg.block_size);
        assert_eq!(10, cfg.sample_threshold);
        assert_eq!(50, cfg.block_threshold);
        assert!(!cfg.padding);
        assert!(!cfg.verbose);
        assert_eq!(Some(PathBuf::from("capture.iq")), cfg.input);
    }

    #[test]
    fn test_short_flags() {
        let cfg = Args::parse_from([
            "iq-squelch", "-a", "-p", "-v", "-b", "0x100", "-c", "12", "-m", "20", "-s", "4096",
            "-t", "75", "-o", "out.iq", "-",
        ])
        .into_config();
        assert!(cfg.auto && cfg.padding && cfg.verbose);
        assert_eq!(256, cfg.block_size);
        assert_eq!(12, cfg.block_count);
        assert_eq!(20, cfg.sample_threshold);
        assert_eq!(4096, cfg.offset);
        assert_eq!(75, cfg.block_threshold);
        assert_eq!(Some(PathBuf::from("out.iq")), cfg.output);
    }

    #[test]
    fn test_range_checks() {
        assert!(Args::try_parse_from(["iq-squelch", "-m", "256", "f"]).is_err());
        assert!(Args::try_parse_from(["iq-squelch", "-t", "101", "f"]).is_err());
        assert!(Args::try_parse_from(["iq-squelch", "-b", "0", "f"]).is_err());
        assert!(Args::try_parse_from(["iq-squelch", "-n", "0", "f"]).is_err());
    }

    #[test]
    fn test_stream_needs_both_ends() {
        assert!(Args::try_parse_from(["iq-squelch", "--listen", "0.0.0.0:6000"]).is_err());
        let cfg = Args::try_parse_from([
            "iq-squelch",
            "--listen",
            "0.0.0.0:6000",
            "--publish",
            "127.0.0.1:6001",
            "-n",
            "4",
        ])
        .unwrap()
        .into_config();
        assert_eq!(4, cfg.channels);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(Ok(255u8), parse_int::<u8>("0xff"));
        assert_eq!(Ok(10u64), parse_int::<u64>("10"));
        assert!(parse_int::<u8>("ten").is_err());
    }
}
