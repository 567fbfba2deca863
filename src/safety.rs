//! Guaranteed restoration of mutated files.
//!
//! [`RestoreGuard`] snapshots a file's original content and writes it back
//! on every exit path: explicitly via [`RestoreGuard::restore`], or from
//! `Drop` while unwinding. A sidecar backup on disk covers the one case
//! `Drop` cannot: the process being killed outright. The next run finds the
//! backup with [`check_interrupted_run`] and restores from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut backup = source_file.to_path_buf();
    let name = format!(
        ".{}.mutscore.bak",
        source_file.file_name().unwrap_or_default().to_string_lossy()
    );
    backup.set_file_name(name);
    backup
}

/// Check if a backup file exists from a previous interrupted run.
pub fn check_interrupted_run(source_file: &Path) -> Option<PathBuf> {
    let bak = backup_path(source_file);
    if bak.exists() { Some(bak) } else { None }
}

/// Restore source from a leftover backup file and remove the backup.
pub fn restore_from_backup(source_file: &Path, backup_file: &Path) -> io::Result<()> {
    fs::copy(backup_file, source_file)?;
    fs::remove_file(backup_file)?;
    invalidate_bytecode(source_file);
    Ok(())
}

/// Remove the `__pycache__` bytecode for a Python source file so the next
/// import re-reads the source. Same-size edits within one second would
/// otherwise pass the interpreter's mtime+size staleness check.
pub fn invalidate_bytecode(source_file: &Path) {
    if source_file.extension().and_then(|e| e.to_str()) != Some("py") {
        return;
    }
    let (Some(parent), Some(stem)) = (source_file.parent(), source_file.file_stem()) else {
        return;
    };
    let cache_dir = parent.join("__pycache__");
    let Ok(entries) = fs::read_dir(&cache_dir) else {
        return;
    };
    let prefix = format!("{}.", stem.to_string_lossy());
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".pyc") {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Scoped ownership of a file's content for the lifetime of one mutant.
pub struct RestoreGuard<'a> {
    path: &'a Path,
    original: &'a str,
    backup: PathBuf,
    released: bool,
}

impl<'a> RestoreGuard<'a> {
    /// Snapshot `original` to the sidecar backup. Nothing is mutated yet;
    /// on error the caller must not write to `path`.
    pub fn acquire(path: &'a Path, original: &'a str) -> io::Result<Self> {
        let backup = backup_path(path);
        fs::write(&backup, original)?;
        Ok(RestoreGuard {
            path,
            original,
            backup,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.path
    }

    /// Write the original content back and drop the backup.
    pub fn restore(mut self) -> io::Result<()> {
        self.released = true;
        self.write_back()
    }

    fn write_back(&self) -> io::Result<()> {
        if let Err(first) = fs::write(self.path, self.original) {
            tracing::warn!(path = %self.path.display(), error = %first, "restore failed, retrying");
            fs::write(self.path, self.original)?;
        }
        invalidate_bytecode(self.path);
        // The backup stays on disk unless the write-back succeeded.
        if let Err(e) = fs::remove_file(&self.backup) {
            tracing::debug!(backup = %self.backup.display(), error = %e, "could not remove backup");
        }
        Ok(())
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.write_back() {
            tracing::error!(
                path = %self.path.display(),
                backup = %self.backup.display(),
                error = %e,
                "failed to restore original content; recover from the backup file"
            );
        }
    }
}
