// Commandline argument parser using clap for magview

use crate::link::serial::DEFAULT_BAUD_RATE;
use crate::projector::VizMode;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
/// Live view of a five-chip magnetic sensor board.
pub struct VizArgs {
    #[command(subcommand)]
    /// Where the sensor frames come from
    pub transport: Transport,

    /// RON file with session settings. Flags below override it
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Which view to draw
    #[arg(short = 'm', long = "mode", global = true)]
    pub mode: Option<VizMode>,

    /// Field units per screen unit
    #[arg(short = 's', long = "scaling", global = true)]
    pub scaling: Option<f64>,

    /// Render ticks per second
    #[arg(long = "fps", global = true)]
    pub frame_rate: Option<f64>,

    /// Length of each notification window, in milliseconds
    #[arg(long = "dwell", global = true)]
    pub dwell_ms: Option<u64>,

    /// Key that resets the baseline
    #[arg(long = "rebaseline-key", global = true)]
    pub rebaseline_key: Option<char>,

    /// Background width in screen units
    #[arg(short = 'w', long = "width", global = true)]
    pub width: Option<u32>,

    /// Picture of the board to draw on
    #[arg(short = 'b', long = "background", global = true)]
    pub background: Option<PathBuf>,

    /// Write the calibrated samples to this file on exit
    #[arg(short = 'o', long = "record", global = true)]
    pub record: Option<PathBuf>,

    /// Send log output here instead of stderr
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Print the effective settings as RON and exit
    #[arg(long = "print-config", global = true)]
    pub print_config: bool,
}

/// Sensor transports.
#[derive(Debug, Subcommand, Clone)]
pub enum Transport {
    /// Read the sensor through a serial bridge
    #[command(about)]
    Serial(SerialCommand),

    /// Generate frames from a simulated board
    #[command(about)]
    Simulate(SimulateCommand),

    /// Play back a captured payload log, one payload per line
    #[command(about)]
    Replay(ReplayCommand),
}

/// Options for the serial bridge.
#[derive(Debug, Args, Clone)]
pub struct SerialCommand {
    /// Serial device, the first one found is used otherwise
    #[arg(short = 'p', long = "port")]
    pub port: Option<PathBuf>,

    /// Baud rate of the bridge
    #[arg(long = "baud", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    /// Pick the port from a list
    #[arg(long = "select", conflicts_with = "port")]
    pub select: bool,
}

/// Options for the simulated board.
#[derive(Debug, Args, Clone)]
pub struct SimulateCommand {
    /// Random seed, for repeatable runs
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Notifications per second
    #[arg(long = "rate", default_value_t = 50.0)]
    pub rate_hz: f64,

    /// Peak amplitude of the noise added to every value
    #[arg(long = "noise", default_value_t = 0.5)]
    pub noise: f64,

    /// Fraction of notifications to truncate
    #[arg(long = "malformed", default_value_t = 0.0)]
    pub malformed_ratio: f64,
}

/// Options for capture playback.
#[derive(Debug, Args, Clone)]
pub struct ReplayCommand {
    /// Captured payload log
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Payloads delivered per notification window
    #[arg(long = "per-window", default_value_t = 1)]
    pub per_window: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        VizArgs::command().debug_assert();
    }

    #[test]
    fn serial_defaults() {
        let args = VizArgs::parse_from(["magview", "serial"]);
        match args.transport {
            Transport::Serial(cmd) => {
                assert_eq!(cmd.port, None);
                assert_eq!(cmd.baud_rate, DEFAULT_BAUD_RATE);
                assert!(!cmd.select);
            }
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(args.mode, None);
        assert!(!args.print_config);
    }

    #[test]
    fn global_flags_after_the_subcommand() {
        let args = VizArgs::parse_from([
            "magview",
            "replay",
            "--file",
            "capture.log",
            "--per-window",
            "3",
            "--mode",
            "magnitude",
            "--record",
            "out.txt",
        ]);
        assert_eq!(args.mode, Some(VizMode::Magnitude));
        assert_eq!(args.record, Some(PathBuf::from("out.txt")));
        match args.transport {
            Transport::Replay(cmd) => {
                assert_eq!(cmd.file, PathBuf::from("capture.log"));
                assert_eq!(cmd.per_window, 3);
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn three_axis_mode_name() {
        let args = VizArgs::parse_from(["magview", "-m", "3axis", "simulate", "--seed", "7"]);
        assert_eq!(args.mode, Some(VizMode::ThreeAxis));
        match args.transport {
            Transport::Simulate(cmd) => assert_eq!(cmd.seed, Some(7)),
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn select_conflicts_with_port() {
        let result =
            VizArgs::try_parse_from(["magview", "serial", "--select", "--port", "/dev/ttyACM0"]);
        assert!(result.is_err());
    }
}
