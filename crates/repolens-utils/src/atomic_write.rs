//! Atomic file writes.
//!
//! Every artifact and the cache file are written through the same path:
//! temp file in the target directory, fsync, atomic rename. A cross-device
//! rename falls back to copy→fsync→replace inside the target directory.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Atomically write raw bytes to `path`, creating parent directories.
pub fn write_bytes_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {parent}"))?;
    }

    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in: {dir}"))?;
    temp.write_all(bytes)
        .with_context(|| format!("Failed to write temporary file for: {path}"))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to fsync temporary file for: {path}"))?;

    match temp.persist(path.as_std_path()) {
        Ok(_) => Ok(()),
        Err(persist_error) if is_cross_device(&persist_error.error) => {
            let temp_path = persist_error.file.path().to_path_buf();
            let staged = fs::read(&temp_path)
                .with_context(|| "Failed to re-read staged bytes for cross-device fallback")?;
            let mut local = NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create fallback temp file in: {dir}"))?;
            local
                .write_all(&staged)
                .with_context(|| "Failed to write fallback temp file")?;
            local
                .as_file()
                .sync_all()
                .with_context(|| "Failed to fsync fallback temp file")?;
            local
                .persist(path.as_std_path())
                .map_err(|e| anyhow::anyhow!(e.error))
                .with_context(|| format!("Failed to persist fallback temp file to: {path}"))?;
            Ok(())
        }
        Err(persist_error) => Err(anyhow::anyhow!(persist_error.error))
            .with_context(|| format!("Failed to atomically write file: {path}")),
    }
}

/// Atomically write text, normalized to LF line endings.
pub fn write_text_atomic(path: &Utf8Path, content: &str) -> Result<()> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    write_bytes_atomic(path, normalized.as_bytes())
}

fn is_cross_device(err: &std::io::Error) -> bool {
    // EXDEV on Linux/macOS
    err.raw_os_error() == Some(18)
}
