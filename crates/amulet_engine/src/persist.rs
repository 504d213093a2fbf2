use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("match log writer has shut down")]
    WriterClosed,
}

/// Ensure the directory holding `log` exists; create it if missing.
pub fn ensure_log_dir(log: &Path) -> Result<(), PersistError> {
    let Some(dir) = log.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if dir.exists() {
        if !fs::metadata(dir)?.is_dir() {
            return Err(PersistError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", dir.display()),
            )));
        }
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// `amulets.json` -> `amulets.json.bak`, next to the log.
pub fn backup_path(log: &Path) -> PathBuf {
    let mut name = log
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("log"));
    name.push(".bak");
    log.with_file_name(name)
}

/// Copy the log to its backup when the backup is missing or older than the log.
///
/// The copy goes through a temp file in the same directory and is renamed into
/// place, so a crash never leaves a half-written backup. Returns the backup
/// path when a copy was made.
pub fn refresh_backup(log: &Path) -> Result<Option<PathBuf>, PersistError> {
    let log_meta = match fs::metadata(log) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if !log_meta.is_file() {
        return Err(PersistError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a regular file", log.display()),
        )));
    }

    let backup = backup_path(log);
    let stale = match fs::metadata(&backup) {
        Ok(bak_meta) => log_meta.modified()? > bak_meta.modified()?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => return Err(err.into()),
    };
    if !stale {
        return Ok(None);
    }

    let dir = log
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut source = File::open(log)?;
    io::copy(&mut source, tmp.as_file_mut())?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&backup).map_err(|e| PersistError::Io(e.error))?;
    Ok(Some(backup))
}
