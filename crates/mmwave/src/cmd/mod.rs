use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use mmwave_frame::Mount;
use mmwave_session::{DEFAULT_CONFIG_BAUD, DEFAULT_DATA_BAUD};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod ports;
pub mod stream;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Configure a sensor and print frames as they arrive.
    Stream(StreamArgs),
    /// Decode frames from a raw capture of the data port.
    Decode(DecodeArgs),
    /// List serial ports on this machine.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Stream(args) => stream::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Sensor placement, in meters and degrees.
#[derive(Args, Debug, Clone, Default)]
pub struct MountArgs {
    /// Height of the sensor above the floor.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub height: f64,
    /// Downward tilt of the boresight.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub elevation_tilt: f64,
    /// Rotation about the vertical axis.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub azimuth_tilt: f64,
}

impl MountArgs {
    pub fn to_mount(&self) -> Mount {
        Mount::new(self.height, self.elevation_tilt.to_radians())
            .with_azimuth_tilt(self.azimuth_tilt.to_radians())
    }
}

#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Command (CLI) port of the sensor.
    #[arg(long, env = "MMWAVE_CONFIG_PORT")]
    pub config_port: String,
    /// Data port of the sensor.
    #[arg(long, env = "MMWAVE_DATA_PORT")]
    pub data_port: String,
    /// Configuration script (.cfg) sent before streaming.
    #[arg(long, value_name = "FILE")]
    pub cfg: PathBuf,
    #[arg(long, default_value_t = DEFAULT_CONFIG_BAUD)]
    pub config_baud: u32,
    #[arg(long, default_value_t = DEFAULT_DATA_BAUD)]
    pub data_baud: u32,
    /// Port read/write timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Handshake attempts per port assignment.
    #[arg(long, default_value_t = 1)]
    pub max_retries: u32,
    /// Do not retry with the ports exchanged when the handshake fails.
    #[arg(long)]
    pub no_swap: bool,
    #[command(flatten)]
    pub mount: MountArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw data-port capture.
    pub capture: PathBuf,
    #[command(flatten)]
    pub mount: MountArgs,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reject frames declaring more bytes than this.
    #[arg(long, value_name = "BYTES")]
    pub max_packet_len: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
