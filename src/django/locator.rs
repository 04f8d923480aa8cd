//! Finding the nearest file with a given name

use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{DeployError, Result};

/// Find the shallowest file named `filename` under `base_dir`.
///
/// Candidates are ordered by the number of path separators, then by the
/// full path string, so the answer does not depend on directory
/// enumeration order. `base_dir` itself is a candidate.
pub fn find(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    let found = WalkDir::new(base_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::debug!("Skipping unreadable entry under {}: {e}", base_dir.display());
                None
            }
        })
        .filter(|entry| entry.file_name() == filename)
        .map(walkdir::DirEntry::into_path)
        .min_by(|a, b| sort_key(a).cmp(&sort_key(b)));

    match found {
        Some(path) => {
            log::debug!("Found {filename} at {}", path.display());
            Ok(path)
        }
        None => Err(DeployError::FileNotFound {
            filename: filename.to_string(),
            root: base_dir.to_path_buf(),
        }),
    }
}

fn sort_key(path: &Path) -> (usize, String) {
    let s = path.to_string_lossy().into_owned();
    (s.matches(MAIN_SEPARATOR).count(), s)
}
