//! Controller binary entrypoint.
//!
//! Parses CLI arguments, initializes logging, runs the one-time startup
//! sequence (folders, camera probe, serial connect, boot handshake, past-IP
//! announce) and then hands control to the dispatch loop. The binary is
//! intentionally a thin wrapper: all protocol and session logic lives in the
//! `camlink` library crate.

use std::path::PathBuf;

use clap::Parser;

use camlink::capture::{CameraBackend, CaptureSequencer};
use camlink::connection::{ConnectionManager, DEFAULT_PORT, HANDSHAKE_TIMEOUT};
use camlink::dispatch::Dispatcher;
use camlink::presets::PresetStore;
use camlink::startup;

#[derive(clap::Parser)]
#[command(version)]
pub struct Cli {
    /// Serial device path; discovered by USB vendor/product id when omitted
    #[arg(long = "serial-port")]
    pub serial_port: Option<String>,

    /// Match the development board's USB identifier during discovery
    #[arg(long = "dev-board", default_value_t = false)]
    pub dev_board: bool,

    /// Skip the camera availability probe at startup
    #[arg(long = "skip-camera-probe", default_value_t = false)]
    pub skip_camera_probe: bool,

    /// Camera capture backend
    #[arg(long = "backend", value_enum, default_value_t = CameraBackend::Gphoto2)]
    pub backend: CameraBackend,

    /// TCP port of the workstation receiver
    #[arg(long = "workstation-port", default_value_t = DEFAULT_PORT)]
    pub workstation_port: u16,

    /// Directory holding the preset log, address file and capture folders
    #[arg(long = "data-dir", default_value = ".")]
    pub data_dir: PathBuf,
}

fn main() -> camlink::error::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let cli = Cli::parse();
    log::info!("Starting program...");

    startup::create_folders(&cli.data_dir)?;

    if cli.skip_camera_probe {
        log::info!("Camera probe skipped!");
    } else {
        startup::probe_camera(
            startup::CAMERA_PROBE_MAX_ATTEMPTS,
            startup::CAMERA_PROBE_INTERVAL,
        )?;
    }

    let mut link = startup::connect_controller(cli.serial_port, cli.dev_board)?;
    startup::wait_for_boot(&mut link)?;

    let connection = ConnectionManager::new(
        startup::ip_file(&cli.data_dir),
        cli.workstation_port,
        HANDSHAKE_TIMEOUT,
    );
    startup::announce_last_ip(&mut link, &connection)?;

    let sequencer = CaptureSequencer::new(startup::captures_root(&cli.data_dir), cli.backend.tool());
    let presets = PresetStore::new(startup::presets_file(&cli.data_dir));

    Dispatcher::new(sequencer, presets, connection).run(&mut link)
}
