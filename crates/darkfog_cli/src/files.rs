use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// `<path>.backup`, or `<path>.backup_<YYYYmmdd_HHMMSS>` when the plain name
/// is already taken.
pub fn backup_path(path: &Path, now: DateTime<Local>) -> PathBuf {
    let plain = with_suffix(path, ".backup");
    if !plain.exists() {
        return plain;
    }
    with_suffix(path, &format!(".backup_{}", now.format("%Y%m%d_%H%M%S")))
}

/// Copy `path` next to itself before it gets overwritten.
pub fn create_backup(path: &Path) -> io::Result<PathBuf> {
    let backup = backup_path(path, Local::now());
    fs::copy(path, &backup)?;
    tracing::info!(backup = %backup.display(), "created backup");
    Ok(backup)
}

/// `<stem>_darkfog<.ext>` beside the target.
pub fn default_inject_output(target: &Path) -> PathBuf {
    let mut name = target
        .file_stem()
        .map(OsString::from)
        .unwrap_or_default();
    name.push("_darkfog");
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    target.with_file_name(name)
}

/// Write `bytes` to `path`, first backing up whatever is there unless
/// `no_backup` is set. A failed backup is logged and does not stop the write.
pub fn write_with_backup(path: &Path, bytes: &[u8], no_backup: bool) -> io::Result<Option<PathBuf>> {
    let mut backup = None;
    if !no_backup && path.exists() {
        match create_backup(path) {
            Ok(p) => backup = Some(p),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "backup failed"),
        }
    }
    fs::write(path, bytes)?;
    Ok(backup)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
