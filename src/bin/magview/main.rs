//! Live view of the sensor board in the terminal.
//!
//! Example:
//! cargo run --bin magview -- --mode 3axis --background board.png simulate --seed 1
//! cargo run --bin magview -- --log-file magview.log serial --select

use clap::Parser;
use log::{error, info};
use magview::{
    acquisition::AcquisitionLoop,
    args::{Transport, VizArgs},
    config::VizConfig,
    gui::{device_selector, Background, TerminalSurface, DEFAULT_HEIGHT, DEFAULT_WIDTH},
    link::{open_transport, serial::SerialLink, DeviceHandle},
    render_loop::RenderLoop,
};
use std::{error::Error, fs::File, path::Path, process::ExitCode};

const CAPTION: &str = "Sensor Data Visualization";

fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(path) = log_file {
        // Anything written to stderr would tear up the canvas.
        builder.target(env_logger::Target::Pipe(Box::new(File::create(path)?)));
    }
    builder.init();
    Ok(())
}

// Swap `--select` for the port the user picked. `None` means they backed out.
fn resolve_port(mut transport: Transport) -> Result<Option<Transport>, Box<dyn Error>> {
    if let Transport::Serial(cmd) = &mut transport {
        if cmd.select {
            let ports = SerialLink::available_ports()?
                .into_iter()
                .map(|port| DeviceHandle {
                    name: "serial bridge".to_owned(),
                    address: port.to_string_lossy().into_owned(),
                })
                .collect::<Vec<_>>();
            if ports.is_empty() {
                return Err("no serial ports found".into());
            }
            match device_selector(ports)? {
                Some(device) => cmd.port = Some(device.address.into()),
                None => return Ok(None),
            }
        }
    }
    Ok(Some(transport))
}

fn run(args: VizArgs) -> Result<(), Box<dyn Error>> {
    let config = VizConfig::from_args(&args)?;
    if args.print_config {
        println!("{}", config.to_ron()?);
        return Ok(());
    }

    let Some(transport) = resolve_port(args.transport)? else {
        info!("No device selected");
        return Ok(());
    };

    let background = match &config.background {
        Some(path) => Background::load(path, config.width)?,
        None => {
            // Validated widths are small enough for this not to overflow.
            let height =
                u64::from(DEFAULT_HEIGHT) * u64::from(config.width) / u64::from(DEFAULT_WIDTH);
            Background::plain(config.width, height as u32)
        }
    };

    let connection = open_transport(&transport)?;
    let acquisition = AcquisitionLoop::new(connection, config.dwell());
    let surface = TerminalSurface::open(background, CAPTION)?;

    let mut session = RenderLoop::new(acquisition, surface, &config);
    let result = session.run();
    // Give the terminal back before printing anything.
    drop(session);

    let summary = result?;
    println!(
        "{} ticks, {} frames drawn, {} payloads rejected",
        summary.ticks, summary.frames_drawn, summary.acquisition.parse_errors
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = VizArgs::parse();
    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("Could not open log file: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("magview: {}", e);
            ExitCode::FAILURE
        }
    }
}
