use anyhow::Context;
use clap::Parser;
use iq_squelch::{
    args::{convert_filter, Args},
    pipeline::execute,
    StopFlag,
};
use tracing::debug;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    // Data may be going to stdout, keep logs on stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(convert_filter(args.verbose.log_level_filter()))
        .init();

    // Setup the exit handler
    let stop = StopFlag::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop()).context("Failed to set Ctrl-C handler")?;

    let config = args.into_config();
    let summary = execute(&config, stop).context("Squelch run failed")?;
    debug!(?summary, "Run complete");
    Ok(())
}
