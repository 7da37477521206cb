use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::project::ProjectError;

/// Options for configuring solution discovery
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Skip hidden directories (starting with '.')
    pub skip_hidden: bool,

    /// Follow symbolic links during traversal
    pub follow_symlinks: bool,

    /// Maximum number of solutions to report (None = unlimited)
    pub max_solutions: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            skip_hidden: true,
            follow_symlinks: false,
            max_solutions: None,
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_solution(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"))
}

/// Find `.sln` files under `root_path`
///
/// # Arguments
/// * `root_path` - Root directory to start scanning from
/// * `depth` - Directory levels to descend (0 = only files in the root)
/// * `options` - Optional scanning configuration
///
/// # Returns
/// Solution paths in walk order (sorted by file name within a directory)
pub fn scan_solutions(
    root_path: &Path,
    depth: usize,
    options: Option<ScanOptions>,
) -> Result<Vec<PathBuf>, ProjectError> {
    let options = options.unwrap_or_default();

    if !root_path.exists() {
        return Err(ProjectError::PathNotFound {
            path: root_path.to_string_lossy().to_string(),
        });
    }

    // walkdir counts the root as depth 0 and files in it as depth 1
    let walker = WalkDir::new(root_path)
        .max_depth(depth + 1)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(options.skip_hidden && is_hidden(entry)));

    let mut solutions = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to access directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_solution(entry.path()) {
            continue;
        }
        solutions.push(entry.into_path());

        if let Some(max) = options.max_solutions
            && solutions.len() >= max
        {
            break;
        }
    }

    debug!(
        root = %root_path.display(),
        depth,
        found = solutions.len(),
        "Solution discovery finished"
    );
    Ok(solutions)
}
