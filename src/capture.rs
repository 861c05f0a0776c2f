//! Capture sequencing and external camera tool invocation.
//!
//! The sequencer tracks the active capture session: the destination folder
//! (named from its creation timestamp so two sessions never collide) and the
//! next frame index. The actual exposure is delegated to a [`CaptureTool`]
//! capability so tests can substitute a fake and so the gphoto2 and
//! libcamera backends stay interchangeable behind the CLI flag.
//!
//! Sequencing invariant: the frame index only advances on confirmed tool
//! success, so a failed exposure is retried under the same filename on the
//! next `capture_image` command.

use std::path::{Path, PathBuf};

/// Capability interface over the external still-image capture utility.
///
/// Implementations either produce `<index>.jpeg` inside `folder` or fail.
pub trait CaptureTool {
    /// Capture one frame as `<index>.jpeg` inside `folder`.
    fn capture(&self, folder: &Path, index: u32) -> crate::error::Result<()>;
}

/// Camera backend selectable from the command line.
#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum CameraBackend {
    /// Tethered camera driven through the gphoto2 utility.
    Gphoto2,
    /// On-board camera module driven through libcamera-jpeg.
    Libcamera,
}

impl CameraBackend {
    /// Instantiate the concrete tool for this backend.
    pub fn tool(self) -> Box<dyn CaptureTool> {
        match self {
            CameraBackend::Gphoto2 => Box::new(Gphoto2),
            CameraBackend::Libcamera => Box::new(LibcameraJpeg),
        }
    }
}

/// Runs a shell capture command inside `folder` and applies the shared
/// failure signal: spawn failure, nonzero exit or a non-empty error stream.
fn run_capture_command(tool: &str, args: &[String], folder: &Path) -> crate::error::Result<()> {
    let output = std::process::Command::new(tool)
        .args(args)
        .current_dir(folder)
        .output()
        .map_err(|err| crate::error::RigError::subprocess_error(tool, err.to_string()))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() || !stderr.trim().is_empty() {
        return Err(crate::error::RigError::subprocess_error(
            tool,
            stderr.to_string(),
        ));
    }

    Ok(())
}

/// gphoto2 backend: `gphoto2 --filename=<index>.jpeg --capture-image-and-download`.
#[derive(Debug)]
pub struct Gphoto2;

impl CaptureTool for Gphoto2 {
    fn capture(&self, folder: &Path, index: u32) -> crate::error::Result<()> {
        log::info!(
            "Running gphoto2; placing image {} into folder '{}'...",
            index,
            folder.to_string_lossy()
        );

        run_capture_command(
            "gphoto2",
            &[
                format!("--filename={}.jpeg", index),
                "--capture-image-and-download".to_string(),
            ],
            folder,
        )
    }
}

/// libcamera backend: `libcamera-jpeg -n -o <index>.jpeg`.
#[derive(Debug)]
pub struct LibcameraJpeg;

impl CaptureTool for LibcameraJpeg {
    fn capture(&self, folder: &Path, index: u32) -> crate::error::Result<()> {
        log::info!(
            "Running libcamera-jpeg; placing image {} into folder '{}'...",
            index,
            folder.to_string_lossy()
        );

        run_capture_command(
            "libcamera-jpeg",
            &["-n".to_string(), "-o".to_string(), format!("{}.jpeg", index)],
            folder,
        )
    }
}

/// The active capture session: destination folder and next frame index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    pub folder: PathBuf,
    pub next_index: u32,
}

/// Tracks the capture session across `capture_image` commands and invokes
/// the configured [`CaptureTool`].
///
/// The session is created lazily on the first capture and lives until the
/// process exits; uploading does not reset it.
pub struct CaptureSequencer {
    root: PathBuf,
    tool: Box<dyn CaptureTool>,
    session: Option<CaptureSession>,
}

impl CaptureSequencer {
    /// # Arguments
    /// * `root` - Directory under which timestamped session folders are created.
    /// * `tool` - The capture backend to invoke per frame.
    pub fn new(root: impl Into<PathBuf>, tool: Box<dyn CaptureTool>) -> Self {
        Self {
            root: root.into(),
            tool,
            session: None,
        }
    }

    /// Capture one frame into the active session folder.
    ///
    /// Starts a new session folder (named from the current timestamp) when
    /// none is active. A folder-creation failure is logged but does not
    /// abort the session: the tool invocation against the missing folder is
    /// expected to fail loudly into the log. The frame index advances only
    /// when the tool reports success.
    pub fn capture(&mut self) -> crate::error::Result<()> {
        if self.session.is_none() {
            let folder = self
                .root
                .join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
            log::info!("Creating target folder {}...", folder.to_string_lossy());

            if let Err(err) = std::fs::create_dir_all(&folder) {
                log::error!(
                    "Failed to create the target folder {}: {}",
                    folder.to_string_lossy(),
                    err
                );
            }

            self.session = Some(CaptureSession {
                folder,
                next_index: 0,
            });
        }

        if let Some(session) = self.session.as_mut() {
            self.tool.capture(&session.folder, session.next_index)?;
            session.next_index += 1;
        }

        Ok(())
    }

    /// The active session folder, if a capture session has been started.
    pub fn active_folder(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.folder.as_path())
    }

    /// The current session state, if any.
    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records invocations instead of driving a camera; fails on request.
    struct FakeTool {
        calls: Arc<Mutex<Vec<(PathBuf, u32)>>>,
        fail: bool,
    }

    impl CaptureTool for FakeTool {
        fn capture(&self, folder: &Path, index: u32) -> crate::error::Result<()> {
            self.calls.lock().unwrap().push((folder.to_path_buf(), index));
            if self.fail {
                Err(crate::error::RigError::subprocess_error(
                    "fake",
                    "lens cap on".to_string(),
                ))
            } else {
                Ok(())
            }
        }
    }

    fn sequencer(root: &Path, fail: bool) -> (CaptureSequencer, Arc<Mutex<Vec<(PathBuf, u32)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let tool = FakeTool {
            calls: Arc::clone(&calls),
            fail,
        };
        (CaptureSequencer::new(root, Box::new(tool)), calls)
    }

    #[test]
    fn successive_captures_advance_the_index_in_one_folder() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, calls) = sequencer(dir.path(), false);

        sequencer.capture().unwrap();
        sequencer.capture().unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 0);
        assert_eq!(calls[1].1, 1);
        assert_eq!(calls[0].0, calls[1].0, "both frames share one folder");
        assert!(calls[0].0.exists());
    }

    #[test]
    fn failed_capture_does_not_advance_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, calls) = sequencer(dir.path(), true);

        assert!(sequencer.capture().is_err());
        assert!(sequencer.capture().is_err());

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].1, 0);
        assert_eq!(calls[1].1, 0, "index must not advance after a failure");
    }

    #[test]
    fn session_folder_lives_under_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, _) = sequencer(dir.path(), false);

        assert_eq!(sequencer.active_folder(), None);
        sequencer.capture().unwrap();

        let folder = sequencer.active_folder().unwrap();
        assert_eq!(folder.parent(), Some(dir.path()));
    }
}
