//! One-time startup sequence run before the dispatch loop.
//!
//! Mirrors the rig's boot contract: make sure the data folders exist, probe
//! the camera (bounded retry), open the microcontroller's serial device,
//! wait for its `boot_done` handshake, then push the last known workstation
//! address to it as an unsolicited `past_ip=` message. Any failure here is
//! fatal to the process; once the dispatch loop starts, failures are
//! absorbed instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::ConnectionManager;
use crate::protocol::{Reply, BOOT_DONE};
use crate::serial::{SerialLink, UsbSerial};

/// Folder holding the preset log, under the data directory.
pub const PRESETS_FOLDER: &str = "presets";

/// Folder holding timestamped capture session folders.
pub const CAPTURES_FOLDER: &str = "captures";

/// Preset log file name inside [`PRESETS_FOLDER`].
pub const PRESETS_FILE: &str = "presets.data";

/// Last-known workstation address file, under the data directory.
pub const IP_FILE: &str = "ip.data";

/// Delay between camera probe attempts.
pub const CAMERA_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on camera probe attempts before startup fails.
pub const CAMERA_PROBE_MAX_ATTEMPTS: u32 = 60;

/// Ensure the preset and capture folders exist under the data directory.
pub fn create_folders(data_dir: &Path) -> crate::error::Result<()> {
    for folder in [PRESETS_FOLDER, CAPTURES_FOLDER] {
        let path = data_dir.join(folder);
        if !path.exists() {
            log::info!("Creating folder {}...", path.to_string_lossy());
            std::fs::create_dir_all(&path)?;
        }
    }

    Ok(())
}

/// Check whether the probe listing reports a connected camera.
///
/// gphoto2's auto-detect output is a two-line header followed by one line
/// per detected camera, with nothing on the error stream.
fn camera_detected(stdout: &str, stderr: &str) -> bool {
    stdout.lines().count() > 2 && stderr.trim().is_empty()
}

fn probe_camera_with(program: &str, attempts: u32, interval: Duration) -> crate::error::Result<()> {
    let mut last_failure = String::new();

    for attempt in 1..=attempts {
        match std::process::Command::new(program)
            .arg("--auto-detect")
            .output()
        {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();

                if camera_detected(&stdout, &stderr) {
                    // Line three of the listing names the detected camera.
                    if let Some(camera) = stdout.lines().nth(2) {
                        log::info!("Connected to: {}", camera.trim());
                    }
                    return Ok(());
                }

                last_failure = if stderr.trim().is_empty() { stdout } else { stderr };
            }
            Err(err) => last_failure = err.to_string(),
        }

        log::error!("Could not find camera (attempt {}/{})", attempt, attempts);
        if attempt < attempts {
            log::info!("Checking again in {} seconds...", interval.as_secs());
            std::thread::sleep(interval);
        }
    }

    Err(crate::error::RigError::subprocess_error(program, last_failure))
}

/// Probe for a connected camera, retrying on a fixed interval.
///
/// # Arguments
/// * `attempts` - Maximum probe attempts before giving up.
/// * `interval` - Delay between attempts.
///
/// # Returns
/// `Ok(())` once a camera is detected; an error after the attempts are
/// exhausted, which the caller treats as fatal.
pub fn probe_camera(attempts: u32, interval: Duration) -> crate::error::Result<()> {
    probe_camera_with("gphoto2", attempts, interval)
}

/// Open the serial link to the microcontroller.
///
/// Uses the explicit device path when given, otherwise discovers the port
/// by USB VID/PID. A missing port is a fatal startup error.
pub fn connect_controller(
    port_override: Option<String>,
    dev_board: bool,
) -> crate::error::Result<UsbSerial> {
    let path = match port_override {
        Some(path) => path,
        None => crate::serial::find_controller_port(dev_board).ok_or_else(|| {
            crate::error::RigError::connection_error(
                "usb",
                "no serial port matching the controller's USB identifier".to_string(),
            )
        })?,
    };

    UsbSerial::open(&path)
}

/// Wait for the microcontroller to report the end of its boot sequence.
///
/// Opening the serial connection reboots the board, so everything before
/// the `boot_done` token is boot noise and is only logged.
pub fn wait_for_boot(link: &mut dyn SerialLink) -> crate::error::Result<()> {
    log::info!("Waiting for the controller to boot...");

    loop {
        let line = link.read_line()?;
        if line.contains(BOOT_DONE) {
            log::info!("Controller booted and connection established");
            return Ok(());
        }
        log::debug!("Boot noise: {}", line);
    }
}

/// Send the last known workstation address as an unsolicited boot reply.
pub fn announce_last_ip(
    link: &mut dyn SerialLink,
    connection: &ConnectionManager,
) -> crate::error::Result<()> {
    log::info!("Retrieving previous workstation address...");

    let reply = Reply::PastIp(connection.last_known_address());
    log::info!("Returning '{}'...", reply);
    link.write_all(&reply.wire())
}

/// Path of the preset log under the data directory.
pub fn presets_file(data_dir: &Path) -> PathBuf {
    data_dir.join(PRESETS_FOLDER).join(PRESETS_FILE)
}

/// Path of the last-known-address file under the data directory.
pub fn ip_file(data_dir: &Path) -> PathBuf {
    data_dir.join(IP_FILE)
}

/// Path of the capture root under the data directory.
pub fn captures_root(data_dir: &Path) -> PathBuf {
    data_dir.join(CAPTURES_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_folders_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();

        create_folders(dir.path()).unwrap();
        create_folders(dir.path()).unwrap();

        assert!(dir.path().join(PRESETS_FOLDER).is_dir());
        assert!(dir.path().join(CAPTURES_FOLDER).is_dir());
    }

    #[test]
    fn camera_detection_needs_a_listing_and_a_clean_error_stream() {
        let listing = "Model            Port\n----------------\nCanon EOS usb:001,004\n";
        assert!(camera_detected(listing, ""));
        assert!(!camera_detected("Model            Port\n----------------\n", ""));
        assert!(!camera_detected(listing, "*** Error ***"));
    }

    #[test]
    fn probe_gives_up_after_max_attempts() {
        let result = probe_camera_with("definitely-not-gphoto2", 2, Duration::ZERO);
        assert!(result.is_err());
    }
}
