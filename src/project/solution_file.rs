//! `.sln` solution file reader

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use uuid::Uuid;

use super::paths::{resolve_against, to_native};

/// One `Project(...)` line that points at a `.cwproj`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionProjectEntry {
    pub type_guid: Option<Uuid>,
    pub name: String,
    /// Path as written in the solution
    pub relative_path: String,
    /// Absolute, normalised project file path
    pub path: PathBuf,
    pub guid: Option<Uuid>,
}

pub struct SolutionFileParser {
    project_line: Regex,
}

impl SolutionFileParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            project_line: Regex::new(
                r#"(?m)^\s*Project\("([^"]*)"\)\s*=\s*"([^"]*)"\s*,\s*"([^"]*)"\s*,\s*"([^"]*)""#,
            )?,
        })
    }

    /// Project entries of a solution, in file order
    ///
    /// Solution folders and non-Clarion projects are dropped.
    pub fn parse(&self, content: &str, solution_path: &Path) -> Vec<SolutionProjectEntry> {
        let solution_dir = solution_path.parent().unwrap_or(Path::new("."));
        let entries: Vec<SolutionProjectEntry> = self
            .project_line
            .captures_iter(content)
            .filter_map(|captures| {
                let relative_path = captures[3].trim().to_string();
                if !relative_path.to_ascii_lowercase().ends_with(".cwproj") {
                    trace!(path = %relative_path, "Skipping non-Clarion solution entry");
                    return None;
                }
                Some(SolutionProjectEntry {
                    type_guid: Uuid::parse_str(&captures[1]).ok(),
                    name: captures[2].trim().to_string(),
                    path: resolve_against(solution_dir, &to_native(&relative_path)),
                    relative_path,
                    guid: Uuid::parse_str(&captures[4]).ok(),
                })
            })
            .collect();
        debug!(
            solution = %solution_path.display(),
            projects = entries.len(),
            "Parsed solution file"
        );
        entries
    }
}

impl Default for SolutionFileParser {
    fn default() -> Self {
        Self::new().expect("Failed to compile solution project pattern")
    }
}
