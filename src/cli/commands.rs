use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "labctl")]
#[command(about = "CLI test harness for cloud virtual-hardware lab devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Lab API endpoint, e.g. https://lab.example.com/api
    #[arg(long, env = "LABCTL_ENDPOINT")]
    pub endpoint: String,

    /// Long-lived API token used to log in
    #[arg(long, env = "LABCTL_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Overall run deadline in seconds
    #[arg(long, default_value = "120")]
    pub timeout: u64,

    /// Output format (text or json)
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options shared by every subcommand.
pub struct SessionOpts {
    pub endpoint: String,
    pub token: String,
    pub deadline: Duration,
    pub format: OutputFormat,
    pub color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision an instance, install firmware, and drive the console GPIO test
    FirmwareTest {
        /// Path to the firmware image to upload
        #[arg(long)]
        firmware: PathBuf,

        /// Hardware flavor prefix to match
        #[arg(long, default_value = "stm32u5")]
        flavor: String,

        /// Instance name to reuse or create
        #[arg(long, default_value = "fw-smoke-test")]
        name: String,

        /// Only accept software bundles whose filename starts with this prefix
        #[arg(long)]
        software_prefix: Option<String>,
    },

    /// Provision an instance and run the sensor round-trip check
    SensorTest {
        /// Path to the firmware image to upload
        #[arg(long)]
        firmware: PathBuf,

        /// Hardware flavor prefix to match
        #[arg(long, default_value = "stm32u5")]
        flavor: String,

        /// Instance name to reuse or create
        #[arg(long, default_value = "sensor-sweep-test")]
        name: String,

        /// Only accept software bundles whose filename starts with this prefix
        #[arg(long)]
        software_prefix: Option<String>,

        /// Number of write/read-back rounds
        #[arg(long, default_value = "3")]
        rounds: usize,
    },

    /// List what the lab offers
    List {
        #[command(subcommand)]
        what: ListTarget,
    },
}

#[derive(Subcommand)]
pub enum ListTarget {
    /// Projects visible to this account
    Projects,

    /// Hardware models, optionally filtered by flavor prefix
    Models {
        /// Show only flavors starting with this prefix
        #[arg(long)]
        flavor: Option<String>,
    },

    /// Software bundles published for a hardware model
    Software {
        /// Model identifier (see `list models`)
        model: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Initialize logging
        if self.verbose {
            // Configure tracing to output to stderr instead of stdout
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .init();
        }

        let opts = SessionOpts {
            endpoint: self.endpoint,
            token: self.token,
            deadline: Duration::from_secs(self.timeout),
            format: self.format,
            color: !self.no_color,
        };

        match self.command {
            Commands::FirmwareTest {
                firmware,
                flavor,
                name,
                software_prefix,
            } => handlers::firmware_test(opts, firmware, flavor, name, software_prefix).await,
            Commands::SensorTest {
                firmware,
                flavor,
                name,
                software_prefix,
                rounds,
            } => {
                handlers::sensor_test(opts, firmware, flavor, name, software_prefix, rounds).await
            }
            Commands::List { what } => handlers::list(opts, what).await,
        }
    }
}

pub mod handlers;
