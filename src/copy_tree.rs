use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Never copied: VCS metadata, caches, and our own artifacts.
const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".next",
    ".nuxt",
    crate::state::DEFAULT_REPORT_PATH,
];

const SKIP_SUFFIXES: &[&str] = &[".mutscore.bak", ".pyc", ".pyo"];

/// Dependency directories are linked into the copy instead of copied;
/// tests only read them.
const LINK_NAMES: &[&str] = &["node_modules", ".venv", "venv", "target"];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || SKIP_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn should_link(name: &str) -> bool {
    LINK_NAMES.iter().any(|s| *s == name)
}

#[cfg(unix)]
fn link_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn link_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if should_skip(&name_str) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() && should_link(&name_str) {
            link_dir(&src_path, &dst_path)?;
        } else if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Skip symlinks and other special files
    }
    Ok(())
}

/// A private copy of the project tree, removed on drop.
pub struct IsolatedTree {
    source_root: PathBuf,
    root: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl IsolatedTree {
    /// Copy `source_root` into a fresh temp directory named after the
    /// session and worker.
    pub fn prepare(source_root: &Path, session_id: &str, worker: usize) -> io::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("mutscore-{session_id}-w{worker}-"))
            .tempdir()?;
        let root = temp_dir.path().join("tree");
        copy_dir_filtered(source_root, &root)?;
        tracing::debug!(
            from = %source_root.display(),
            to = %root.display(),
            "prepared isolated tree"
        );
        Ok(IsolatedTree {
            source_root: source_root.to_path_buf(),
            root,
            _temp_dir: temp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a path in the original tree to its counterpart in the copy.
    /// `None` for paths outside the copied root.
    pub fn map(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.source_root)
            .ok()
            .map(|rel| self.root.join(rel))
    }
}
