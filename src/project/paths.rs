//! Path handling for Windows-authored project files
//!
//! Redirection, project and solution files spell paths with backslashes and
//! in any letter case. Everything is normalised lexically (no disk access) so
//! the same rules apply to the real and the in-memory file system.

use std::path::{Component, Path, PathBuf};

/// Convert `\` and `/` separators to the platform separator
pub fn to_native(path: &str) -> PathBuf {
    let separator = std::path::MAIN_SEPARATOR.to_string();
    PathBuf::from(path.trim().replace(['\\', '/'], &separator))
}

/// Resolve `.` and `..` components without touching the disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(result.components().next_back(), Some(Component::Normal(_)))
                    && result.pop();
                if !popped && !result.has_root() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// `path` made absolute against `base` and normalised
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Case-insensitive comparison of final path components
pub fn file_name_eq(path: &Path, name: &str) -> bool {
    path.file_name()
        .and_then(|file_name| file_name.to_str())
        .is_some_and(|file_name| file_name.eq_ignore_ascii_case(name))
}

/// Lower-cased extension with its dot, e.g. `.clw`
pub fn dotted_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}
