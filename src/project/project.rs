//! A Clarion project: its `.cwproj`, redirection entries and search paths

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{Level, debug, instrument, trace, warn};
use uuid::Uuid;

use crate::io::FileSystemTrait;
use crate::log_timing;

use super::cwproj::{ProjectFile, parse_project_file};
use super::error::ProjectError;
use super::paths::{dotted_extension, file_name_eq, resolve_against, to_native};
use super::redirection::{RedirectionEntry, RedirectionFileParser};

/// Normalise `clw`, `.CLW` or `*.clw` to `.clw`
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('*').trim_start_matches('.');
    format!(".{}", trimmed.to_ascii_lowercase())
}

/// First candidate that exists, checked concurrently
///
/// Every candidate is awaited; the winner is the earliest in precedence
/// order, not the first check to finish.
pub async fn first_existing<F: FileSystemTrait>(fs: &F, candidates: Vec<PathBuf>) -> Option<PathBuf> {
    let mut checks = JoinSet::new();
    for (index, candidate) in candidates.iter().cloned().enumerate() {
        let fs = fs.clone();
        checks.spawn_blocking(move || (index, fs.exists(&candidate)));
    }

    let mut best: Option<usize> = None;
    while let Some(result) = checks.join_next().await {
        match result {
            Ok((index, true)) => best = Some(best.map_or(index, |current| current.min(index))),
            Ok(_) => {}
            Err(error) => warn!(error = %error, "Existence check failed"),
        }
    }
    best.and_then(|index| candidates.into_iter().nth(index))
}

/// Project identity for reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub guid: Option<Uuid>,
    pub path: PathBuf,
    pub source_files: usize,
    pub redirection_entries: usize,
    pub output_type: Option<String>,
    pub file_drivers: Vec<String>,
    /// Names (or paths) of referenced projects
    pub references: Vec<String>,
}

pub struct ClarionProject<F: FileSystemTrait> {
    pub name: String,
    pub guid: Option<Uuid>,
    /// The `.cwproj` file
    pub path: PathBuf,
    pub directory: PathBuf,
    pub file: ProjectFile,
    /// `Compile` items resolved against the project directory
    pub source_files: Vec<PathBuf>,
    entries: Vec<RedirectionEntry>,
    parser: Arc<RedirectionFileParser<F>>,
    search_paths: Mutex<HashMap<(String, String), Vec<PathBuf>>>,
}

impl<F: FileSystemTrait> ClarionProject<F> {
    /// Read a `.cwproj` and the redirection file that applies to it
    pub fn load(
        parser: Arc<RedirectionFileParser<F>>,
        path: &Path,
        fallback_name: Option<&str>,
    ) -> Result<Self, ProjectError> {
        let fs = parser.fs();
        if !fs.exists(path) {
            return Err(ProjectError::PathNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs.read_to_string(path)?;
        let file = parse_project_file(&content, path)?;
        let directory = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let name = file
            .display_name()
            .or(fallback_name)
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            })
            .unwrap_or_default();
        let source_files = file
            .compile
            .iter()
            .map(|item| resolve_against(&directory, &to_native(item)))
            .collect();
        let entries = parser.parse_red_file(&directory);

        debug!(
            project = %name,
            path = %path.display(),
            entries = entries.len(),
            "Loaded project"
        );
        Ok(Self {
            name,
            guid: file.guid,
            path: path.to_path_buf(),
            directory,
            file,
            source_files,
            entries,
            parser,
            search_paths: Mutex::new(HashMap::new()),
        })
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.name.clone(),
            guid: self.guid,
            path: self.path.clone(),
            source_files: self.source_files.len(),
            redirection_entries: self.entries.len(),
            output_type: self.file.output_type.clone(),
            file_drivers: self.file.file_drivers.clone(),
            references: self
                .file
                .project_references
                .iter()
                .map(|reference| {
                    reference
                        .name
                        .clone()
                        .unwrap_or_else(|| reference.include.clone())
                })
                .collect(),
        }
    }

    /// Directories searched for files with `extension`
    ///
    /// The project directory always comes first. Then, in redirection
    /// order, the paths of entries in `Common` or the active configuration
    /// whose mask is `*<extension>` or `*.*`.
    pub fn get_search_paths(&self, extension: &str) -> Vec<PathBuf> {
        let extension = normalize_extension(extension);
        let configuration = self.parser.config().configuration.clone();
        let key = (extension.clone(), configuration.to_ascii_lowercase());

        if let Ok(cache) = self.search_paths.lock()
            && let Some(paths) = cache.get(&key)
        {
            trace!(project = %self.name, extension = %extension, "Search paths cache hit");
            return paths.clone();
        }

        let mut paths = vec![self.directory.clone()];
        for entry in &self.entries {
            if !entry.applies_to(&configuration)
                || !(entry.is_wildcard() || entry.matches_extension(&extension))
            {
                continue;
            }
            for dir in &entry.paths {
                let resolved = resolve_against(&self.directory, dir);
                if !paths.contains(&resolved) {
                    paths.push(resolved);
                }
            }
        }

        if let Ok(mut cache) = self.search_paths.lock() {
            cache.insert(key, paths.clone());
        }
        paths
    }

    /// Source file whose name matches `name`, ignoring case
    pub fn source_file(&self, name: &str) -> Option<&PathBuf> {
        self.source_files
            .iter()
            .find(|path| file_name_eq(path, name))
    }

    /// Names to try for a lookup: `name` itself, followed by one per
    /// default extension when it has none
    pub fn lookup_names(&self, name: &str) -> Vec<String> {
        let mut names = vec![name.to_string()];
        if dotted_extension(name).is_none() {
            names.extend(
                self.parser
                    .config()
                    .default_lookup_extensions
                    .iter()
                    .map(|ext| format!("{name}{}", normalize_extension(ext))),
            );
        }
        names
    }

    /// Redirection candidates for one concrete file name
    pub fn redirected_candidates(&self, name: &str) -> Vec<PathBuf> {
        self.parser.candidates(&self.entries, name, &self.directory)
    }

    /// Search-path candidates for one concrete file name
    pub fn search_path_candidates(&self, name: &str) -> Vec<PathBuf> {
        let extension = dotted_extension(name).unwrap_or_else(|| ".*".to_string());
        self.get_search_paths(&extension)
            .into_iter()
            .map(|dir| dir.join(name))
            .collect()
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for name in self.lookup_names(name) {
            candidates.extend(self.redirected_candidates(&name));
            candidates.extend(self.search_path_candidates(&name));
        }
        candidates
    }

    /// Locate `name` through the redirection index, then the search paths
    #[allow(dead_code)]
    pub fn find_file_in_project_paths(&self, name: &str) -> Option<PathBuf> {
        let fs = self.parser.fs();
        let found = self.lookup_names(name).into_iter().find_map(|name| {
            self.parser
                .find_file(&self.entries, &name, &self.directory)
                .or_else(|| {
                    self.search_path_candidates(&name)
                        .into_iter()
                        .find(|candidate| fs.exists(candidate))
                })
        });
        trace!(project = %self.name, file = name, found = ?found, "Project path lookup");
        found
    }

    /// Same lookup with the existence checks issued concurrently
    #[instrument(name = "find_file_in_project_paths_async", skip(self), fields(project = %self.name))]
    pub async fn find_file_in_project_paths_async(&self, name: &str) -> Option<PathBuf> {
        let start = Instant::now();
        let found = first_existing(self.parser.fs(), self.candidates(name)).await;
        log_timing!(Level::DEBUG, "find_file_in_project_paths_async", start.elapsed());
        found
    }
}
