//! Append-only preset store.
//!
//! Presets arrive from the microcontroller as opaque strings (in practice
//! comma-separated numeric fields); the store does not validate their
//! structure. History is never rewritten: saving appends one line, and the
//! "current" preset is simply the last line of the file.

use std::io::Write;
use std::path::PathBuf;

/// Flat-file preset log, one preset per line.
#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one preset to the log, creating the file if needed.
    pub fn append(&self, preset: &str) -> crate::error::Result<()> {
        log::info!(
            "Appending preset '{}' to {}",
            preset,
            self.path.to_string_lossy()
        );

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", preset)?;

        Ok(())
    }

    /// Return the most recently saved preset.
    ///
    /// A missing store means zero presets, reported as `Ok(None)` rather
    /// than an error.
    pub fn latest(&self) -> crate::error::Result<Option<String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(content
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PresetStore {
        PresetStore::new(dir.path().join("presets.data"))
    }

    #[test]
    fn append_then_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append("4,4,50,20").unwrap();
        store.append("1,2,3,4").unwrap();

        assert_eq!(store.latest().unwrap(), Some("1,2,3,4".to_string()));
    }

    #[test]
    fn append_never_rewrites_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.append("4,4,50,20").unwrap();
        store.append("1,2,3,4").unwrap();

        let content = std::fs::read_to_string(dir.path().join("presets.data")).unwrap();
        assert_eq!(content, "4,4,50,20\n1,2,3,4\n");
    }

    #[test]
    fn missing_store_means_zero_presets() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.latest().unwrap(), None);
    }
}
