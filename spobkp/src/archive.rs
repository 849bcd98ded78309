use std::fs::File;
use std::io;
use std::path::Path;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

const ARCHIVE_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to walk the workspace: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to write the archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to format the archive timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// `{prefix}_{YYYY-MM-DD_HH-MM-SS}.zip`
pub fn archive_name(prefix: &str, timestamp: OffsetDateTime) -> Result<String, ArchiveError> {
    let stamp = timestamp.format(&ARCHIVE_TIMESTAMP)?;
    Ok(format!("{prefix}_{stamp}.zip"))
}

/// Zips the workspace tree into `dest` and returns the archive size in
/// bytes. Entry names are relative to the workspace root.
pub fn create_archive(workspace: &Path, dest: &Path) -> Result<u64, ArchiveError> {
    let file = File::create(dest)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(workspace) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(workspace) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, &mut writer)?;
        }
    }

    let file = writer.finish()?;
    Ok(file.metadata()?.len())
}

/// Deletes the local archive. Runs after every pipeline outcome, so a
/// missing file is only logged.
pub fn remove_archive(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "local archive removed"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::error!(path = %path.display(), "unable to find the archive to delete");
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to remove the local archive");
        }
    }
}
