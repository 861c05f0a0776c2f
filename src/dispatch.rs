//! Top-level command dispatch loop.
//!
//! Reads one command at a time from the serial link, routes it to the owning
//! component and writes the framed reply back. The loop itself is stateless;
//! all session state (the capture session, the workstation stream) lives in
//! the [`Dispatcher`] fields and is owned exclusively for the process
//! lifetime. Commands are strictly serialized: the microcontroller waits for
//! each reply before sending the next command.
//!
//! Failure policy: handler failures are absorbed and logged here, and the
//! protocol acknowledgement is still written where the protocol defines one
//! unconditionally (capture, save, upload). The microcontroller only ever
//! sees the coarse good/bad signal of the connection handshake. Only
//! serial-link failures propagate out of [`Dispatcher::run`].

use std::net::TcpStream;

use crate::capture::CaptureSequencer;
use crate::connection::ConnectionManager;
use crate::presets::PresetStore;
use crate::protocol::{Command, Reply};
use crate::serial::SerialLink;

/// Whether the loop keeps reading commands or shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// Owns the session state and routes classified commands to their handlers.
pub struct Dispatcher {
    sequencer: CaptureSequencer,
    presets: PresetStore,
    connection: ConnectionManager,
    /// The workstation stream from the last good handshake. At most one
    /// active session; a new handshake replaces it.
    stream: Option<TcpStream>,
}

impl Dispatcher {
    pub fn new(
        sequencer: CaptureSequencer,
        presets: PresetStore,
        connection: ConnectionManager,
    ) -> Self {
        Self {
            sequencer,
            presets,
            connection,
            stream: None,
        }
    }

    /// Run the dispatch loop until the `end` command or a serial failure.
    pub fn run(&mut self, link: &mut dyn SerialLink) -> crate::error::Result<()> {
        loop {
            log::info!("Listening for command...");
            let line = link.read_line()?;

            // Line noise from the half-duplex link; not an unknown command.
            if line.trim().is_empty() {
                continue;
            }

            match Command::classify(&line) {
                (Some(command), _) => {
                    if self.handle(command, link)? == Flow::Shutdown {
                        return Ok(());
                    }
                }
                (None, _) => log::error!("Unknown command: {}", line),
            }
        }
    }

    fn handle(&mut self, command: Command, link: &mut dyn SerialLink) -> crate::error::Result<Flow> {
        match command {
            Command::Connect(payload) => match self.connection.handshake(&payload) {
                Ok(stream) => {
                    self.stream = Some(stream);
                    link.write_all(&Reply::ConnectionGood.wire())?;
                }
                Err(err) => {
                    log::error!("Failed to connect to workstation: {}", err);
                    link.write_all(&Reply::ConnectionBad.wire())?;
                }
            },

            Command::GetPresets => {
                let latest = match self.presets.latest() {
                    Ok(latest) => latest,
                    Err(err) => {
                        log::error!("Could not read presets: {}", err);
                        None
                    }
                };
                link.write_all(&Reply::Presets(latest.unwrap_or_default()).wire())?;
            }

            Command::SavePreset(preset) => {
                if let Err(err) = self.presets.append(&preset) {
                    log::error!("Could not save preset: {}", err);
                }
                link.write_all(&Reply::SavePresetDone.wire())?;
            }

            Command::Capture => {
                log::info!("Capturing image...");
                if let Err(err) = self.sequencer.capture() {
                    log::error!("Camera utility reported an error: {}", err);
                }
                link.write_all(&Reply::CaptureImageDone.wire())?;
            }

            Command::BeginUpload => {
                log::info!("Starting upload...");
                match (self.sequencer.active_folder(), self.stream.as_mut()) {
                    (Some(folder), Some(stream)) => {
                        if let Err(err) = crate::upload::upload(folder, stream) {
                            log::error!("Failed to send archive to workstation: {}", err);
                        }
                    }
                    (None, _) => log::warn!("No capture session; nothing to upload"),
                    (_, None) => log::warn!("No workstation connection; cannot upload"),
                }
                link.write_all(&Reply::FinishUpload.wire())?;
            }

            Command::End => {
                log::info!("Gracefully exiting per request by the controller...");
                return Ok(Flow::Shutdown);
            }
        }

        Ok(Flow::Continue)
    }
}
