use core::time::Duration;

use anyhow::bail;
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use ringflake::{
    BufferConfig, DEFAULT_BOOST_POWER, DEFAULT_PADDING_FACTOR, DEFAULT_SEQUENCE_BITS,
    DEFAULT_TIMESTAMP_BITS, DEFAULT_WORKER_ID_BITS, TickUnit, UidConfig,
};

/// Command line for the `ringflake` binary.
///
/// Generator settings are global: they can be given before or after the
/// subcommand, or through the environment (a `.env` file is honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ringflake",
    version,
    about = "Generate and inspect Snowflake-style 64-bit ids"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub uid: UidArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate ids and print one per line.
    Generate {
        /// Number of ids to print.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Serve ids from a pre-filled ring buffer instead of generating each
        /// one on demand.
        #[arg(long, default_value_t = false)]
        cached: bool,
    },
    /// Decompose ids into timestamp, worker id and sequence.
    Parse {
        /// Ids to decompose.
        #[arg(required = true)]
        uids: Vec<u64>,

        /// Pretty-print each record over several lines.
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}

/// Generator and ring buffer settings.
#[derive(Args, Debug, Clone)]
pub struct UidArgs {
    /// Set to false to refuse generating ids.
    ///
    /// Environment variable: `UID_ENABLED`
    #[arg(long, global = true, env = "UID_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub enabled: bool,

    /// This process's worker id. Must be unique among live processes and fit
    /// in `worker_id_bits`.
    ///
    /// Environment variable: `UID_WORKER_ID`
    #[arg(long, global = true, env = "UID_WORKER_ID", default_value_t = 1)]
    pub worker_id: u64,

    /// Environment variable: `UID_TIMESTAMP_BITS`
    #[arg(long, global = true, env = "UID_TIMESTAMP_BITS", default_value_t = DEFAULT_TIMESTAMP_BITS)]
    pub timestamp_bits: u8,

    /// Environment variable: `UID_WORKER_ID_BITS`
    #[arg(long, global = true, env = "UID_WORKER_ID_BITS", default_value_t = DEFAULT_WORKER_ID_BITS)]
    pub worker_id_bits: u8,

    /// Environment variable: `UID_SEQUENCE_BITS`
    #[arg(long, global = true, env = "UID_SEQUENCE_BITS", default_value_t = DEFAULT_SEQUENCE_BITS)]
    pub sequence_bits: u8,

    /// Epoch date (YYYY-MM-DD); midnight UTC of this day is tick zero.
    ///
    /// Environment variable: `UID_EPOCH`
    #[arg(long, global = true, env = "UID_EPOCH", default_value = "2018-11-11")]
    pub epoch: NaiveDate,

    /// Tick unit of the timestamp field: `ms` or `s`.
    ///
    /// Environment variable: `UID_TICK_UNIT`
    #[arg(long, global = true, env = "UID_TICK_UNIT", default_value = "ms")]
    pub tick_unit: TickUnit,

    /// The ring buffer holds `(max_sequence + 1) << boost_power` slots.
    ///
    /// Environment variable: `UID_BOOST_POWER`
    #[arg(long, global = true, env = "UID_BOOST_POWER", default_value_t = DEFAULT_BOOST_POWER)]
    pub boost_power: u32,

    /// Refill once fewer than this percentage of slots hold ids.
    ///
    /// Environment variable: `UID_PADDING_FACTOR`
    #[arg(long, global = true, env = "UID_PADDING_FACTOR", default_value_t = DEFAULT_PADDING_FACTOR)]
    pub padding_factor: u32,

    /// Period of the safety-net refill in seconds; 0 disables it.
    ///
    /// Environment variable: `UID_SCHEDULE_INTERVAL_SECS`
    #[arg(long, global = true, env = "UID_SCHEDULE_INTERVAL_SECS", default_value_t = 300)]
    pub schedule_interval_secs: u64,
}

/// Validated settings, ready to hand to the generators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub uid: UidConfig,
    pub buffer: BufferConfig,
}

impl TryFrom<UidArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: UidArgs) -> Result<Self, Self::Error> {
        if args.padding_factor == 0 || args.padding_factor >= 100 {
            bail!(
                "UID_PADDING_FACTOR ({}) must be within (0, 100)",
                args.padding_factor
            );
        }

        let uid = UidConfig::default()
            .with_enabled(args.enabled)
            .with_worker_id(args.worker_id)
            .with_bits(args.timestamp_bits, args.worker_id_bits, args.sequence_bits)
            .with_epoch(args.epoch)
            .with_tick_unit(args.tick_unit);

        // Checks the layout even for a disabled config, so `parse` still
        // reports bad bit widths.
        let allocator = uid.clone().with_enabled(true).validate()?;

        let schedule_interval =
            Some(Duration::from_secs(args.schedule_interval_secs)).filter(|d| !d.is_zero());
        let buffer = BufferConfig::default()
            .with_boost_power(args.boost_power)
            .with_padding_factor(args.padding_factor)
            .with_schedule_interval(schedule_interval);
        buffer.buffer_size(&allocator)?;

        Ok(Self { uid, buffer })
    }
}
