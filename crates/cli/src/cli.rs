//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// imcoders-odom - Differential-drive odometry from wheel-mounted orientation sensors
#[derive(Parser, Debug)]
#[command(
    name = "imcoders-odom",
    author,
    version,
    about = "Differential-drive odometry from two wheel imcoders",
    long_about = "Estimates the planar pose and velocity of a two-wheeled robot from a pair of\n\
                  wheel-mounted orientation sensors (imcoders).\n\n\
                  Pairs left/right readings by timestamp, integrates wheel rotation with\n\
                  differential-drive kinematics, and dispatches odometry records and pose\n\
                  transforms to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "IMCODERS_ODOM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "IMCODERS_ODOM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level when RUST_LOG is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the odometry pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Where wheel readings come from
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Simulated wheels spinning at constant rates
    #[default]
    Mock,
    /// Readings recorded to a JSONL file
    Replay,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "IMCODERS_ODOM_CONFIG"
    )]
    pub config: PathBuf,

    /// Reading source (defaults to replay when --replay is given)
    #[arg(long, value_enum, env = "IMCODERS_ODOM_SOURCE")]
    pub source: Option<SourceKind>,

    /// Recording to replay (JSONL, one reading per line)
    #[arg(long, env = "IMCODERS_ODOM_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (1.0 = recorded pace, 0 = as fast as possible, lockstep)
    #[arg(long, default_value = "1.0", env = "IMCODERS_ODOM_REPLAY_SPEED")]
    pub replay_speed: f64,

    /// Restart the recording when it ends
    #[arg(long)]
    pub replay_loop: bool,

    /// Left wheel spin rate of the mock source (rad/s)
    #[arg(long, default_value = "2.0", allow_negative_numbers = true)]
    pub mock_left_rate: f64,

    /// Right wheel spin rate of the mock source (rad/s)
    #[arg(long, default_value = "2.0", allow_negative_numbers = true)]
    pub mock_right_rate: f64,

    /// Publish frequency of each mock wheel (Hz)
    #[arg(long, default_value = "50.0")]
    pub mock_frequency: f64,

    /// Stamp offset of the right mock wheel relative to the left (s)
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    pub mock_skew: f64,

    /// Maximum number of odometry frames to produce (0 = unlimited)
    #[arg(long, default_value = "0", env = "IMCODERS_ODOM_MAX_FRAMES")]
    pub max_frames: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "IMCODERS_ODOM_TIMEOUT")]
    pub timeout: u64,

    /// Channel buffer size for internal queues
    #[arg(long, default_value = "100", env = "IMCODERS_ODOM_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "IMCODERS_ODOM_METRICS_PORT")]
    pub metrics_port: u16,

    /// Publish the odom -> base transform (overrides configuration)
    #[arg(long, overrides_with = "no_publish_tf")]
    pub publish_tf: bool,

    /// Do not publish the odom -> base transform (overrides configuration)
    #[arg(long, overrides_with = "publish_tf")]
    pub no_publish_tf: bool,

    /// Enable debug mode (overrides configuration)
    #[arg(long)]
    pub debug: bool,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Source selected by `--source`, or implied by `--replay`
    pub fn source_kind(&self) -> SourceKind {
        match (self.source, &self.replay) {
            (Some(kind), _) => kind,
            (None, Some(_)) => SourceKind::Replay,
            (None, None) => SourceKind::Mock,
        }
    }

    /// `publish_tf` override from the command line, if any
    pub fn publish_tf_override(&self) -> Option<bool> {
        if self.publish_tf {
            Some(true)
        } else if self.no_publish_tf {
            Some(false)
        } else {
            None
        }
    }
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "IMCODERS_ODOM_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "IMCODERS_ODOM_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show sink parameters
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
