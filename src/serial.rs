//! Serial link to the rig's microcontroller.
//!
//! The microcontroller is found by its USB vendor/product identifier rather
//! than a fixed device path, since the path moves around across reboots.
//! Commands arrive as newline-terminated ASCII lines; replies are written as
//! raw bytes. The [`SerialLink`] trait is the seam the dispatch loop and the
//! startup sequence talk through, so tests can script a fake link instead of
//! opening a device.

use std::io::{Read, Write};
use std::time::Duration;

/// Baud rate of the microcontroller's USB serial interface.
pub const BAUD_RATE: u32 = 9600;

/// USB vendor/product identifier of the rig's controller board.
pub const CONTROLLER_VID: u16 = 4292;
pub const CONTROLLER_PID: u16 = 60001;

/// USB vendor/product identifier of the development board used on the bench.
pub const DEV_BOARD_VID: u16 = 9025;
pub const DEV_BOARD_PID: u16 = 67;

/// Poll interval for the blocking line read. The protocol has no timeout on
/// the serial read itself; the link just polls until a full line arrives.
const READ_POLL: Duration = Duration::from_millis(100);

/// Byte-line transport to the microcontroller.
pub trait SerialLink {
    /// Block until one full line arrives; returns it trimmed.
    fn read_line(&mut self) -> crate::error::Result<String>;

    /// Write raw reply bytes to the link.
    fn write_all(&mut self, bytes: &[u8]) -> crate::error::Result<()>;
}

/// Locate the microcontroller's serial device by USB VID/PID.
///
/// # Arguments
/// * `dev_board` - Match the development-board identifier instead of the
///   rig's controller board.
///
/// # Returns
/// The device path of the first matching port, or `None`.
pub fn find_controller_port(dev_board: bool) -> Option<String> {
    let (vid, pid) = if dev_board {
        (DEV_BOARD_VID, DEV_BOARD_PID)
    } else {
        (CONTROLLER_VID, CONTROLLER_PID)
    };

    let ports = serialport::available_ports().ok()?;
    ports.into_iter().find_map(|port| match port.port_type {
        serialport::SerialPortType::UsbPort(info) if info.vid == vid && info.pid == pid => {
            Some(port.port_name)
        }
        _ => None,
    })
}

/// A [`SerialLink`] over a real USB serial port.
pub struct UsbSerial {
    port: Box<dyn serialport::SerialPort>,
}

impl UsbSerial {
    /// Open the serial device at the protocol baud rate.
    pub fn open(path: &str) -> crate::error::Result<Self> {
        log::info!("Attempting to connect to USB at {}", path);

        let port = serialport::new(path, BAUD_RATE).timeout(READ_POLL).open()?;

        Ok(Self { port })
    }
}

impl SerialLink for UsbSerial {
    fn read_line(&mut self) -> crate::error::Result<String> {
        let mut line: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => {}
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    line.push(byte[0]);
                }
                // The poll timeout is not a protocol timeout: keep waiting.
                Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn write_all(&mut self, bytes: &[u8]) -> crate::error::Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}
