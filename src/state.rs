use std::path::Path;

use crate::error::StateError;
use crate::scorer::RunResult;

pub const DEFAULT_REPORT_PATH: &str = "mutation-report.json";

/// Write the JSON report once, at the end of a run.
pub fn save_report(result: &RunResult, path: &Path) -> Result<(), StateError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| StateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_report(path: &Path) -> Result<RunResult, StateError> {
    let data = std::fs::read_to_string(path).map_err(|source| StateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}
