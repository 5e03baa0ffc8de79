//! Headless acquisition: runs a number of notification windows and logs the
//! calibrated field strength of every chip. Handy for checking a board
//! without a terminal UI.
//!
//! Example:
//! RUST_LOG=info cargo run --bin probe -- --windows 20 serial --port /dev/ttyACM0

use clap::Parser;
use log::{error, info, warn};
use magview::{
    acquisition::AcquisitionLoop,
    args::Transport,
    baseline::BaselineTracker,
    chip_layout::ChipLayout,
    config::VizConfig,
    frame_handoff::FrameHandoff,
    link::open_transport,
    sensor_frame::magnitude,
};
use std::{error::Error, path::PathBuf, process::ExitCode};

#[derive(Debug, Parser)]
#[clap(version, about)]
/// Log per-chip field strength without drawing anything.
struct ProbeArgs {
    #[command(subcommand)]
    transport: Transport,

    /// How many notification windows to run
    #[arg(short = 'n', long = "windows", default_value_t = 10, global = true)]
    windows: u64,

    /// RON file with session settings, only the dwell is used
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Length of each notification window, in milliseconds
    #[arg(long = "dwell", global = true)]
    dwell_ms: Option<u64>,
}

fn run(args: ProbeArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => VizConfig::from_path(path)?,
        None => VizConfig::default(),
    };
    if let Some(dwell_ms) = args.dwell_ms {
        config.dwell_ms = dwell_ms;
    }

    let layout = ChipLayout::five_chip();
    let mut acquisition = AcquisitionLoop::new(open_transport(&args.transport)?, config.dwell());
    let mut handoff = FrameHandoff::new();
    let mut baseline = BaselineTracker::new();

    let mut result = Ok(());
    for window in 0..args.windows {
        if let Err(e) = acquisition.run_window(&mut handoff, &mut baseline) {
            result = Err(e);
            break;
        }

        match handoff.take_latest() {
            Some(frame) => {
                let calibrated = baseline.calibrate(&frame);
                let strengths: Vec<String> = calibrated
                    .primary()
                    .iter()
                    .zip(layout.chips())
                    .map(|(reading, chip)| format!("{} {:.2}", chip.name, magnitude(reading)))
                    .collect();
                info!("window {}: {}", window, strengths.join(", "));
            }
            None => warn!("window {}: no frame", window),
        }
    }

    let shutdown = acquisition.shutdown();
    result?;
    shutdown?;

    let stats = acquisition.stats();
    info!(
        "{} windows, {} frames, {} rejected, {} superseded",
        stats.windows,
        stats.frames,
        stats.parse_errors,
        handoff.dropped()
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = ProbeArgs::parse();

    if args.dwell_ms == Some(0) {
        warn!("A zero dwell will rarely catch a notification");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("probe: {}", e);
            ExitCode::FAILURE
        }
    }
}
