//! Workstation connection handshake and last-known-address persistence.
//!
//! The microcontroller sends workstation addresses as 12 ASCII digits (four
//! groups of three, each an octet), because its keypad UI edits fixed-width
//! fields. The handshake parses that form, opens a TCP stream to the fixed
//! workstation port and expects the peer to answer with the literal
//! acknowledgement token within the handshake timeout. Only a fully
//! acknowledged connection is persisted - and it is the raw 12-digit string
//! that gets written, so it can be replayed to the microcontroller verbatim
//! as `past_ip=` on the next boot.

use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::time::Duration;

/// TCP port the workstation receiver listens on.
pub const DEFAULT_PORT: u16 = 4545;

/// Literal token the workstation must send immediately after accepting.
pub const ACK_TOKEN: &[u8] = b"workstation_ready";

/// Bounded wait for connect and for the acknowledgement read.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Address reported when no workstation was ever reached.
pub const PLACEHOLDER_ADDRESS: &str = "000000000000";

/// Parse a fixed-width 12-digit address into an IPv4 address.
///
/// # Arguments
/// * `raw` - Exactly 12 ASCII digits, four groups of three, each group an
///   octet in the range 0-255.
///
/// # Returns
/// The parsed address, or a parse error for any other input.
pub fn parse_address(raw: &str) -> crate::error::Result<Ipv4Addr> {
    log::info!("Attempting to parse '{}'", raw);

    if raw.len() != 12 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(crate::error::RigError::parse_error(&format!(
            "address '{}' is not 12 ASCII digits",
            raw
        )));
    }

    let mut octets = [0u8; 4];
    for (slot, group) in octets.iter_mut().zip(raw.as_bytes().chunks(3)) {
        let group = std::str::from_utf8(group).map_err(|_| {
            crate::error::RigError::parse_error("address is not valid ASCII")
        })?;
        *slot = group.parse::<u8>().map_err(|_| {
            crate::error::RigError::parse_error(&format!(
                "octet '{}' is out of the 0-255 range",
                group
            ))
        })?;
    }

    Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

/// Performs the workstation handshake and remembers the last good address.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    ip_file: PathBuf,
    port: u16,
    timeout: Duration,
}

impl ConnectionManager {
    pub fn new(ip_file: impl Into<PathBuf>, port: u16, timeout: Duration) -> Self {
        Self {
            ip_file: ip_file.into(),
            port,
            timeout,
        }
    }

    /// Attempt the IP handshake with the workstation.
    ///
    /// Parses the raw 12-digit payload, connects with a bounded wait, then
    /// reads the peer's greeting: anything other than the exact
    /// acknowledgement token is a failed handshake. The greeting is taken
    /// from a single read, so a token split across TCP segments counts as a
    /// failed handshake too (the fixed protocol has no framing to wait on).
    /// On success the raw
    /// payload is persisted (overwriting the previous address; a persistence
    /// failure is logged but does not fail the handshake) and the open
    /// stream is returned for reuse by the upload step.
    ///
    /// # Arguments
    /// * `payload` - The raw text after `ip=`, unparsed.
    ///
    /// # Returns
    /// The established stream, or the error that stopped the handshake. No
    /// state is persisted on any failure path.
    pub fn handshake(&self, payload: &str) -> crate::error::Result<TcpStream> {
        let ip = parse_address(payload)?;
        let peer = SocketAddr::from((ip, self.port));

        log::info!("Attempting to connect to <{}>...", peer);
        let mut stream = TcpStream::connect_timeout(&peer, self.timeout)
            .map_err(|err| crate::error::RigError::connection_error(&peer.to_string(), err.to_string()))?;
        stream
            .set_read_timeout(Some(self.timeout))
            .map_err(|err| crate::error::RigError::connection_error(&peer.to_string(), err.to_string()))?;

        let mut greeting = [0u8; 64];
        let read = stream
            .read(&mut greeting)
            .map_err(|err| crate::error::RigError::connection_error(&peer.to_string(), err.to_string()))?;

        log::info!(
            "Received '{}' from workstation",
            String::from_utf8_lossy(&greeting[..read])
        );

        if &greeting[..read] != ACK_TOKEN {
            return Err(crate::error::RigError::connection_error(
                &peer.to_string(),
                "workstation did not acknowledge the handshake".to_string(),
            ));
        }

        log::info!("Connection to <{}> successful...", peer);
        if let Err(err) = std::fs::write(&self.ip_file, format!("{}\n", payload)) {
            log::error!(
                "Failed to write address to {}: {}",
                self.ip_file.to_string_lossy(),
                err
            );
        }

        Ok(stream)
    }

    /// The raw 12-digit address of the last workstation successfully
    /// reached, or the all-zero placeholder. Never fails the caller.
    pub fn last_known_address(&self) -> String {
        match std::fs::read_to_string(&self.ip_file) {
            Ok(content) => {
                let address = content.lines().next().unwrap_or("").trim();
                if address.is_empty() {
                    PLACEHOLDER_ADDRESS.to_string()
                } else {
                    address.to_string()
                }
            }
            Err(_) => {
                log::info!("No address saved; returning '{}'...", PLACEHOLDER_ADDRESS);
                PLACEHOLDER_ADDRESS.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn parses_zero_padded_octets() {
        assert_eq!(
            parse_address("192168001100").unwrap().to_string(),
            "192.168.1.100"
        );
        assert_eq!(parse_address("000000000000").unwrap().to_string(), "0.0.0.0");
        assert_eq!(
            parse_address("255255255255").unwrap().to_string(),
            "255.255.255.255"
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in ["", "19216800110", "1921680011000", "19216800110a", "300168001100"] {
            assert!(parse_address(raw).is_err(), "'{}' should not parse", raw);
        }
    }

    /// Spawn a one-shot workstation stand-in that answers with `greeting`.
    fn workstation(greeting: &'static [u8]) -> (u16, std::thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(greeting);
            }
        });
        (port, handle)
    }

    fn manager(dir: &tempfile::TempDir, port: u16) -> ConnectionManager {
        ConnectionManager::new(
            dir.path().join("ip.data"),
            port,
            Duration::from_millis(500),
        )
    }

    #[test]
    fn acknowledged_handshake_persists_the_raw_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (port, handle) = workstation(ACK_TOKEN);
        let manager = manager(&dir, port);

        manager.handshake("127000000001").unwrap();
        handle.join().unwrap();

        assert_eq!(manager.last_known_address(), "127000000001");
    }

    #[test]
    fn wrong_greeting_fails_and_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (port, handle) = workstation(b"hello there");
        let manager = manager(&dir, port);

        assert!(manager.handshake("127000000001").is_err());
        handle.join().unwrap();

        assert!(!dir.path().join("ip.data").exists());
        assert_eq!(manager.last_known_address(), PLACEHOLDER_ADDRESS);
    }

    #[test]
    fn silent_peer_times_out_and_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept but never greet; hold the stream open past the client's
        // timeout so the read fails on the bounded wait, not on closure.
        let handle = std::thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                std::thread::sleep(Duration::from_millis(1500));
                drop(stream);
            }
        });
        let manager = manager(&dir, port);

        assert!(manager.handshake("127000000001").is_err());
        handle.join().unwrap();

        assert!(!dir.path().join("ip.data").exists());
        assert_eq!(manager.last_known_address(), PLACEHOLDER_ADDRESS);
    }

    #[test]
    fn bad_payload_fails_before_any_network_io() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, 1);

        assert!(manager.handshake("not-an-address").is_err());
        assert!(!dir.path().join("ip.data").exists());
    }

    #[test]
    fn last_known_address_defaults_to_the_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, 1);

        assert_eq!(manager.last_known_address(), PLACEHOLDER_ADDRESS);
    }
}
