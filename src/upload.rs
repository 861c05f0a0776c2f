//! Archiving and streaming of capture folders.
//!
//! `begin_upload` zips the active capture folder and streams the archive
//! over the established workstation connection in bounded chunks. The wire
//! format is the bare byte stream of the archive - no length prefix and no
//! checksum; the workstation detects end-of-stream from connection closure.
//! That weakness is part of the fixed protocol and is preserved as-is.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;

/// Upper bound on a single write to the workstation stream.
pub const CHUNK_SIZE: usize = 1024;

/// Archive member names are kept relative to the folder's parent so the
/// archive unpacks as `<timestamp>/<index>.jpeg`.
fn member_name(folder: &Path, entry: &Path) -> String {
    let base = folder.parent().unwrap_or(folder);
    entry
        .strip_prefix(base)
        .unwrap_or(entry)
        .to_string_lossy()
        .replace('\\', "/")
}

fn add_folder_entries(
    zip: &mut zip::ZipWriter<std::fs::File>,
    folder: &Path,
    current: &Path,
    options: FileOptions,
) -> crate::error::Result<()> {
    for entry in std::fs::read_dir(current)? {
        let path = entry?.path();

        if path.is_dir() {
            add_folder_entries(zip, folder, &path, options)?;
        } else {
            zip.start_file(member_name(folder, &path), options)?;
            let mut file = std::fs::File::open(&path)?;
            std::io::copy(&mut file, zip)?;
        }
    }

    Ok(())
}

/// Zip `folder` (recursively, Deflate-compressed) into `archive`.
///
/// Member ordering follows the filesystem walk and is not guaranteed.
pub fn zip_folder(folder: &Path, archive: &Path) -> crate::error::Result<()> {
    log::info!("Zipping directory at '{}'...", folder.to_string_lossy());

    let file = std::fs::File::create(archive)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    add_folder_entries(&mut zip, folder, folder, options)?;
    zip.finish()?;

    log::info!("Done zipping directory...");
    Ok(())
}

/// Archive `folder` and stream the archive bytes into `sink`.
///
/// The archive is written next to the capture folder as `<folder>.zip` and
/// then streamed in [`CHUNK_SIZE`] pieces until exhausted.
///
/// # Arguments
/// * `folder` - The capture folder to upload.
/// * `sink` - The established workstation stream (any writer in tests).
pub fn upload(folder: &Path, sink: &mut impl Write) -> crate::error::Result<()> {
    let archive: PathBuf = folder.with_extension("zip");
    zip_folder(folder, &archive)?;

    log::info!(
        "Sending '{}' to workstation...",
        archive.to_string_lossy()
    );

    let mut file = std::fs::File::open(&archive)?;
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read])?;
    }
    sink.flush()?;

    log::info!("Archive sent to workstation");
    Ok(())
}
