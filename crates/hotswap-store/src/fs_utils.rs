use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Replaces `path` with `payload` so that readers observe either the old or
/// the new contents, and the new contents are on disk before returning.
pub fn write_atomically(path: &Path, payload: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state file has no parent directory: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let staging = staging_path(path);
    let mut file = fs::File::create(&staging)
        .with_context(|| format!("failed to create staging file: {}", staging.display()))?;
    file.write_all(payload)
        .with_context(|| format!("failed to write staging file: {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync staging file: {}", staging.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&staging, path) {
        let _ = remove_file_if_exists(&staging);
        return Err(err).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                staging.display(),
                path.display()
            )
        });
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.tmp"))
}
