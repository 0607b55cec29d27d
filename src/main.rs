//! `mp285` command-line tool.
//!
//! ```bash
//! mp285 --port /dev/ttyUSB0 --log moves.csv position
//! mp285 move 3625 4108 9000
//! mp285 --simulate cycle --at 3625,4108,9000 --at 12739,4108,9000 --dwell-secs 600
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::providers::Serialized;
use std::path::PathBuf;
use std::time::Duration;
use sutter_mp285::adapters::SimulatedMp285;
use sutter_mp285::config::{Settings, DEFAULT_CONFIG_FILE};
use sutter_mp285::{CsvMoveLog, MicronPosition, MoveLogger, NullMoveLog, Session};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mp285", version, about = "Drive a Sutter MP-285 micromanipulator")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Serial port, overriding the configuration
    #[arg(short, long)]
    port: Option<String>,

    /// CSV move log, overriding the configuration
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Talk to a simulated controller instead of a serial port
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current position in microns
    Position,
    /// Move to an absolute position in microns
    Move {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
        #[arg(allow_negative_numbers = true)]
        z: f64,
    },
    /// Visit a list of positions in turn, pausing at each one
    Cycle {
        /// Position as X,Y,Z in microns; repeat for each stop
        #[arg(long = "at", value_parser = parse_xyz, required = true)]
        positions: Vec<MicronPosition>,
        /// Seconds to wait after each move
        #[arg(long, default_value_t = 600)]
        dwell_secs: u64,
        /// Number of moves before stopping (runs forever if omitted)
        #[arg(long)]
        count: Option<usize>,
    },
}

fn parse_xyz(s: &str) -> Result<MicronPosition, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected X,Y,Z but got '{}'", s));
    }
    let axis = |v: &str| {
        v.parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{}': {}", v, e))
    };
    Ok(MicronPosition::new(
        axis(parts[0])?,
        axis(parts[1])?,
        axis(parts[2])?,
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut figment = Settings::figment(&cli.config);
    if let Some(port) = &cli.port {
        figment = figment.merge(Serialized::default("serial.port", port));
    }
    if let Some(log) = &cli.log {
        figment = figment.merge(Serialized::default("log.path", log));
    }
    let settings = Settings::from_figment(figment)
        .with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    EnvFilter::new(format!("sutter_mp285={0},mp285={0}", settings.log.level))
                }),
        )
        .init();

    let mut session = open_session(&settings, cli.simulate)?;

    match cli.command {
        Command::Position => {
            let pos = session.position_microns().context("Failed to read position")?;
            println!("{}", pos);
        }
        Command::Move { x, y, z } => {
            let target = MicronPosition::new(x, y, z);
            session
                .move_to(target)
                .with_context(|| format!("Failed to move to {}", target))?;
            println!("{}", target);
        }
        Command::Cycle {
            positions,
            dwell_secs,
            count,
        } => {
            let dwell = Duration::from_secs(dwell_secs);
            let stops = positions.iter().cycle().take(count.unwrap_or(usize::MAX));
            for (i, target) in stops.enumerate() {
                if i > 0 {
                    std::thread::sleep(dwell);
                }
                session
                    .move_to(*target)
                    .with_context(|| format!("Failed to move to {}", target))?;
                info!("Reached stop {}: {}", i + 1, target);
            }
        }
    }

    session.close();
    Ok(())
}

fn open_session(settings: &Settings, simulate: bool) -> Result<Session> {
    let scale = settings.step_scale()?;

    let logger: Box<dyn MoveLogger> = match &settings.log.path {
        Some(path) => Box::new(
            CsvMoveLog::open(path).with_context(|| format!("Failed to open move log {:?}", path))?,
        ),
        None => {
            warn!("No move log configured; moves will not be recorded");
            Box::new(NullMoveLog)
        }
    };

    let session = if simulate {
        Session::with_link(
            Box::new(SimulatedMp285::new()),
            Duration::from_millis(settings.serial.timeout_ms),
        )
    } else {
        Session::open_with(&settings.serial_settings())
            .context("No connection to Sutter MP-285 could be established")?
    };

    Ok(session.with_scale(scale).with_logger(logger))
}
