#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use std::io::{BufWriter, Write};

use clap::Parser;
use config::{AppConfig, CliArgs, Command};
use ringflake::{
    BackoffTakeHandler, CachedUidGenerator, DefaultUidGenerator, SystemClock, UidGenerator,
};
use telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args.uid)?;

    init_telemetry()?;
    log_startup_info(&config);

    match args.command {
        Command::Generate { count, cached } => generate(&config, count, cached),
        Command::Parse { uids, pretty } => parse(&config, &uids, pretty),
    }
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Starting with full config: {:#?}", config);
    } else {
        tracing::debug!(
            "Starting with worker id {} (enabled: {})",
            config.uid.worker_id,
            config.uid.enabled
        );
    }
}

fn generate(config: &AppConfig, count: usize, cached: bool) -> anyhow::Result<()> {
    let generator: Box<dyn UidGenerator> = if cached {
        Box::new(
            CachedUidGenerator::builder(config.uid.clone())
                .buffer_config(config.buffer.clone())
                .rejected_take_handler(BackoffTakeHandler::default())
                .build(SystemClock::new(config.uid.tick_unit))?,
        )
    } else {
        Box::new(DefaultUidGenerator::from_config(&config.uid)?)
    };

    let mut out = BufWriter::new(std::io::stdout().lock());
    for _ in 0..count {
        writeln!(out, "{}", generator.get_uid()?)?;
    }
    out.flush()?;
    Ok(())
}

fn parse(config: &AppConfig, uids: &[u64], pretty: bool) -> anyhow::Result<()> {
    // Decomposing only needs the layout; a disabled config can still parse.
    let generator = DefaultUidGenerator::from_config(&config.uid.clone().with_enabled(true))?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    for &uid in uids {
        let parsed = generator.parse_uid(uid);
        if pretty {
            writeln!(out, "{}", serde_json::to_string_pretty(&parsed)?)?;
        } else {
            writeln!(out, "{parsed}")?;
        }
    }
    out.flush()?;
    Ok(())
}
