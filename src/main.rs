//! CLI Entry Point for the magnet positioner
//!
//! # Usage
//!
//! ```bash
//! magpos ports
//! magpos --port /dev/ttyACM0 position --json
//! magpos --port /dev/ttyACM0 move x 10.0
//! magpos --port COM10 tare xy
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use magnet_positioner::config::{PositionerConfig, DEFAULT_CONFIG_PATH};
use magnet_positioner::{logging, ports, Axis, DeviceSession};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "magpos")]
#[command(about = "Remote control for the three-axis magnet positioner", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Serial port, overriding the configuration
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate, overriding the configuration
    #[arg(long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    Ports {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read the current x, y, z position in millimetres
    Position {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read one axis in millimetres
    Get {
        /// Axis label (x, y or z)
        axis: Axis,
    },

    /// Move one axis to an absolute position in millimetres
    Move {
        /// Axis label (x, y or z)
        axis: Axis,
        /// Target position in millimetres
        #[arg(allow_hyphen_values = true)]
        mm: f64,
    },

    /// Read, or set, the raw step counter of an axis
    Steps {
        /// Axis label (x, y or z)
        axis: Axis,
        /// New step count
        #[arg(allow_hyphen_values = true)]
        value: Option<i64>,
    },

    /// Zero the step counters at the current position
    Tare {
        /// Axes to zero
        #[arg(default_value = "xyz")]
        labels: String,
    },

    /// Read, or set, the LED state
    Led {
        /// New LED state
        value: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PositionerConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.serial.port = Some(port);
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    config.validate().context("Invalid configuration")?;

    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Ports { json } => list_ports(json),
        command => run_session(&config, command),
    }
}

fn list_ports(json: bool) -> Result<()> {
    let ports = ports::list_ports().context("Failed to enumerate serial ports")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        for port in ports {
            println!(
                "Port: {} | Description: {} | HWID: {}",
                port.name, port.description, port.hardware_id
            );
        }
    }
    Ok(())
}

fn run_session(config: &PositionerConfig, command: Commands) -> Result<()> {
    let port = config.serial.port.clone().unwrap_or_default();

    if let Commands::Position { json } = command {
        let position = DeviceSession::scoped(config, |stage| stage.position())
            .with_context(|| format!("Session on '{}' failed", port))?;
        if json {
            println!(
                "{}",
                serde_json::to_string(&position).context("Failed to serialize position")?
            );
        } else {
            println!("{}", position);
        }
        return Ok(());
    }

    DeviceSession::scoped(config, |stage| {
        match command {
            Commands::Get { axis } => println!("{:.3}", stage.axis_mm(axis)?),
            Commands::Move { axis, mm } => {
                stage.set_axis_mm(axis, mm)?;
                info!("Moved {} to {} mm", axis, mm);
            }
            Commands::Steps { axis, value: None } => println!("{}", stage.steps(axis)?),
            Commands::Steps {
                axis,
                value: Some(steps),
            } => stage.set_steps(axis, steps)?,
            Commands::Tare { labels } => stage.tare(&labels)?,
            Commands::Led { value: None } => println!("{}", stage.led()?),
            Commands::Led { value: Some(v) } => stage.set_led(v)?,
            Commands::Ports { .. } | Commands::Position { .. } => {}
        }
        Ok(())
    })
    .with_context(|| format!("Session on '{}' failed", port))
}
