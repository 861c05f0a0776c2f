//! Serial line protocol vocabulary and command codec.
//!
//! The microcontroller drives the rig over a half-duplex, newline-terminated
//! ASCII protocol: it sends one command line and waits for the controller's
//! reply before sending the next. This module owns both directions of that
//! vocabulary:
//!
//! - [`Command`] classifies an inbound line against the fixed verb set. Verbs
//!   that carry a payload (`ip=`, `save_preset=`) are matched by prefix and
//!   split on the first `=`; verbs without a payload are matched exactly. The
//!   verb set is chosen so no verb is a prefix of another verb with a
//!   different handler, making the two match kinds unambiguous by
//!   construction.
//! - [`Reply`] renders the outbound acknowledgement tokens. Every reply is
//!   newline-terminated.
//!
//! Classification never fails: a line outside the vocabulary yields
//! [`MatchKind::NoMatch`] and is not routed to any handler.

/// Token the microcontroller sends once its own boot sequence is finished.
/// The controller waits for this before accepting any command.
pub const BOOT_DONE: &str = "boot_done";

/// How an inbound line related to the known verb set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The line equalled a payload-less verb exactly.
    Exact,
    /// The line started with a `verb=` marker; the rest is the payload.
    Prefix,
    /// The line matched nothing in the vocabulary.
    NoMatch,
}

/// A classified command from the microcontroller.
///
/// Payload-carrying variants hold the raw text after the first `=`, without
/// further validation; malformed payloads are handled by the target component
/// (for example an unparsable address yields `connection_bad`), never by the
/// codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ip=<12 digits>` - attempt the workstation handshake.
    Connect(String),
    /// `get_presets` - report the most recently saved preset.
    GetPresets,
    /// `save_preset=<payload>` - append a preset to the store.
    SavePreset(String),
    /// `capture_image` - capture one frame into the active session folder.
    Capture,
    /// `begin_upload` - zip the active session folder and stream it out.
    BeginUpload,
    /// `end` - terminate the controller process cleanly.
    End,
}

impl Command {
    /// Classify a raw serial line against the command vocabulary.
    ///
    /// Leading and trailing whitespace (including the newline terminator) is
    /// trimmed before matching. Payload verbs split on the first `=`; an
    /// empty payload still classifies as [`MatchKind::Prefix`] and is handed
    /// to the target component, which treats it as a handled error.
    ///
    /// # Arguments
    /// * `line` - The raw line read from the serial link.
    ///
    /// # Returns
    /// The matched command (if any) together with the match kind used.
    pub fn classify(line: &str) -> (Option<Command>, MatchKind) {
        let line = line.trim();

        if let Some(payload) = line.strip_prefix("ip=") {
            return (Some(Command::Connect(payload.to_string())), MatchKind::Prefix);
        }

        if let Some(payload) = line.strip_prefix("save_preset=") {
            return (
                Some(Command::SavePreset(payload.to_string())),
                MatchKind::Prefix,
            );
        }

        match line {
            "get_presets" => (Some(Command::GetPresets), MatchKind::Exact),
            "capture_image" => (Some(Command::Capture), MatchKind::Exact),
            "begin_upload" => (Some(Command::BeginUpload), MatchKind::Exact),
            "end" => (Some(Command::End), MatchKind::Exact),
            _ => (None, MatchKind::NoMatch),
        }
    }
}

/// Acknowledgement tokens written back over the serial link.
///
/// The protocol is deliberately coarse: most handlers acknowledge
/// unconditionally and failure detail stays in the controller log. The only
/// good/bad distinction on the wire is the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Unsolicited startup message carrying the last known workstation
    /// address in its raw 12-digit form (or the all-zero placeholder).
    PastIp(String),
    ConnectionGood,
    ConnectionBad,
    /// Latest preset payload; empty when the store holds none.
    Presets(String),
    SavePresetDone,
    CaptureImageDone,
    FinishUpload,
}

impl Reply {
    /// Render the reply as wire bytes, newline-terminated.
    pub fn wire(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::PastIp(raw) => write!(f, "past_ip={}", raw),
            Reply::ConnectionGood => write!(f, "connection_good"),
            Reply::ConnectionBad => write!(f, "connection_bad"),
            Reply::Presets(preset) => write!(f, "presets={}", preset),
            Reply::SavePresetDone => write!(f, "save_preset_done"),
            Reply::CaptureImageDone => write!(f, "capture_image_done"),
            Reply::FinishUpload => write!(f, "finish_upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_verbs_classify_exact() {
        for (line, expected) in [
            ("get_presets", Command::GetPresets),
            ("capture_image", Command::Capture),
            ("begin_upload", Command::BeginUpload),
            ("end", Command::End),
        ] {
            let (command, kind) = Command::classify(line);
            assert_eq!(command, Some(expected));
            assert_eq!(kind, MatchKind::Exact);
        }
    }

    #[test]
    fn payload_verbs_classify_prefix() {
        let (command, kind) = Command::classify("ip=192168001100");
        assert_eq!(command, Some(Command::Connect("192168001100".to_string())));
        assert_eq!(kind, MatchKind::Prefix);

        let (command, kind) = Command::classify("save_preset=4,4,50,20");
        assert_eq!(
            command,
            Some(Command::SavePreset("4,4,50,20".to_string()))
        );
        assert_eq!(kind, MatchKind::Prefix);
    }

    #[test]
    fn trailing_whitespace_is_trimmed() {
        let (command, kind) = Command::classify("capture_image\r\n");
        assert_eq!(command, Some(Command::Capture));
        assert_eq!(kind, MatchKind::Exact);

        let (command, _) = Command::classify("  ip=000000000000  \n");
        assert_eq!(command, Some(Command::Connect("000000000000".to_string())));
    }

    #[test]
    fn empty_payload_still_matches_prefix() {
        let (command, kind) = Command::classify("ip=");
        assert_eq!(command, Some(Command::Connect(String::new())));
        assert_eq!(kind, MatchKind::Prefix);
    }

    #[test]
    fn unknown_lines_do_not_match() {
        for line in ["", "capture", "capture_imagex", "uploads", "endx", "presets"] {
            let (command, kind) = Command::classify(line);
            assert_eq!(command, None, "line {:?} should not classify", line);
            assert_eq!(kind, MatchKind::NoMatch);
        }
    }

    #[test]
    fn replies_are_newline_terminated_tokens() {
        assert_eq!(Reply::ConnectionGood.wire(), b"connection_good\n");
        assert_eq!(Reply::ConnectionBad.wire(), b"connection_bad\n");
        assert_eq!(Reply::SavePresetDone.wire(), b"save_preset_done\n");
        assert_eq!(Reply::CaptureImageDone.wire(), b"capture_image_done\n");
        assert_eq!(Reply::FinishUpload.wire(), b"finish_upload\n");
        assert_eq!(
            Reply::Presets("1,2,3,4".to_string()).wire(),
            b"presets=1,2,3,4\n"
        );
        assert_eq!(
            Reply::PastIp("192168001100".to_string()).wire(),
            b"past_ip=192168001100\n"
        );
    }
}
