//! Solution loading, caching and solution-wide file lookup
//!
//! A [`SolutionManager`] owns one active solution. Loading is serialised by an
//! operation lock that callers can check with
//! [`SolutionManager::is_operation_in_progress`]. Parsed solutions stay cached
//! by path until the `.sln` or one of its `.cwproj` files changes on disk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{Level, debug, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::io::FileSystemTrait;
use crate::{log_lookup, log_timing};

use super::class_index::{ClassDefinition, ClassIndex};
use super::error::ProjectError;
use super::project::{ClarionProject, ProjectSummary, first_existing, normalize_extension};
use super::redirection::RedirectionFileParser;
use super::solution_file::SolutionFileParser;

/// Where a solution-wide lookup found its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupSource {
    /// Listed as a source file of a project
    Project,
    /// Found through a redirection entry
    Redirected,
    ProjectSearchPath,
    /// Repeated lookup answered from memory
    Cache,
}

impl LookupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupSource::Project => "project",
            LookupSource::Redirected => "redirected",
            LookupSource::ProjectSearchPath => "project-search-path",
            LookupSource::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLookup {
    pub path: PathBuf,
    pub source: LookupSource,
    pub project: String,
}

pub struct ClarionSolution<F: FileSystemTrait> {
    pub path: PathBuf,
    pub name: String,
    pub projects: Vec<ClarionProject<F>>,
    pub loaded_at: DateTime<Utc>,
}

/// Solution identity for reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSummary {
    pub path: PathBuf,
    pub name: String,
    pub loaded_at: DateTime<Utc>,
    pub projects: Vec<ProjectSummary>,
}

impl<F: FileSystemTrait> ClarionSolution<F> {
    pub fn summary(&self) -> SolutionSummary {
        SolutionSummary {
            path: self.path.clone(),
            name: self.name.clone(),
            loaded_at: self.loaded_at,
            projects: self.projects.iter().map(ClarionProject::summary).collect(),
        }
    }

    pub fn project(&self, name: &str) -> Option<&ClarionProject<F>> {
        self.projects
            .iter()
            .find(|project| project.name.eq_ignore_ascii_case(name))
    }

    /// Project directories followed by every project's `.inc` search paths
    pub fn class_search_directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<PathBuf> = Vec::new();
        let project_dirs = self.projects.iter().map(|p| p.directory.clone());
        let include_dirs = self
            .projects
            .iter()
            .flat_map(|project| project.get_search_paths(".inc"));
        for dir in project_dirs.chain(include_dirs) {
            if !directories.contains(&dir) {
                directories.push(dir);
            }
        }
        directories
    }
}

struct ManagerState<F: FileSystemTrait> {
    active: Option<Arc<ClarionSolution<F>>>,
    cache: HashMap<PathBuf, Arc<ClarionSolution<F>>>,
    lookups: HashMap<String, FileLookup>,
    class_index: Option<Arc<ClassIndex>>,
}

pub struct SolutionManager<F: FileSystemTrait> {
    parser: Arc<RedirectionFileParser<F>>,
    solution_parser: SolutionFileParser,
    operation_lock: Mutex<()>,
    state: Mutex<ManagerState<F>>,
}

impl<F: FileSystemTrait> SolutionManager<F> {
    pub fn new(fs: F, config: ResolverConfig) -> Result<Self, ProjectError> {
        Ok(Self {
            parser: Arc::new(RedirectionFileParser::new(fs, config)?),
            solution_parser: SolutionFileParser::new()?,
            operation_lock: Mutex::new(()),
            state: Mutex::new(ManagerState {
                active: None,
                cache: HashMap::new(),
                lookups: HashMap::new(),
                class_index: None,
            }),
        })
    }

    /// Whether a solution load is currently running
    pub fn is_operation_in_progress(&self) -> bool {
        self.operation_lock.try_lock().is_err()
    }

    pub async fn active_solution(&self) -> Option<Arc<ClarionSolution<F>>> {
        self.state.lock().await.active.clone()
    }

    /// Load `solution_path` and make it the active solution
    ///
    /// A cached parse is reused while no file it was built from has a newer
    /// modification time.
    #[instrument(name = "solution_initialize", skip(self), fields(solution = %solution_path.display()))]
    pub async fn initialize(
        &self,
        solution_path: &Path,
    ) -> Result<Arc<ClarionSolution<F>>, ProjectError> {
        if self.is_operation_in_progress() {
            debug!("Waiting for the running solution operation");
        }
        let _operation = self.operation_lock.lock().await;
        let start = Instant::now();

        let cached = self.state.lock().await.cache.get(solution_path).cloned();
        let solution = match cached {
            Some(solution) if self.is_fresh(&solution) => {
                debug!("Reusing cached solution");
                solution
            }
            _ => Arc::new(self.load(solution_path)?),
        };

        let mut state = self.state.lock().await;
        let switched = state
            .active
            .as_ref()
            .is_none_or(|active| !Arc::ptr_eq(active, &solution));
        if switched {
            state.lookups.clear();
            state.class_index = None;
        }
        state
            .cache
            .insert(solution_path.to_path_buf(), Arc::clone(&solution));
        state.active = Some(Arc::clone(&solution));

        log_timing!(Level::INFO, "solution_initialize", start.elapsed());
        info!(
            projects = solution.projects.len(),
            "Solution ready"
        );
        Ok(solution)
    }

    fn load(&self, solution_path: &Path) -> Result<ClarionSolution<F>, ProjectError> {
        let fs = self.parser.fs();
        if !fs.exists(solution_path) {
            return Err(ProjectError::PathNotFound {
                path: solution_path.display().to_string(),
            });
        }
        let loaded_at = Utc::now();
        let content = fs.read_to_string(solution_path)?;

        let mut projects = Vec::new();
        for entry in self.solution_parser.parse(&content, solution_path) {
            match ClarionProject::load(Arc::clone(&self.parser), &entry.path, Some(&entry.name)) {
                Ok(project) => projects.push(project),
                // A broken project only removes itself from the solution
                Err(error) => warn!(
                    project = %entry.name,
                    path = %entry.path.display(),
                    error = %error,
                    "Skipping project"
                ),
            }
        }

        let name = solution_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ClarionSolution {
            path: solution_path.to_path_buf(),
            name,
            projects,
            loaded_at,
        })
    }

    /// Whether no source file of `solution` changed after it was parsed
    fn is_fresh(&self, solution: &ClarionSolution<F>) -> bool {
        let fs = self.parser.fs();
        std::iter::once(&solution.path)
            .chain(solution.projects.iter().map(|project| &project.path))
            .all(|path| match fs.metadata(path) {
                Ok(metadata) => DateTime::<Utc>::from(metadata.modified) <= solution.loaded_at,
                Err(_) => false,
            })
    }

    /// Drop every cached solution and remembered lookup
    #[allow(dead_code)]
    pub async fn clear_cache(&self) {
        let mut state = self.state.lock().await;
        state.cache.clear();
        state.lookups.clear();
        state.class_index = None;
        debug!("Solution cache cleared");
    }

    async fn require_active(&self) -> Result<Arc<ClarionSolution<F>>, ProjectError> {
        self.active_solution()
            .await
            .ok_or(ProjectError::SolutionNotLoaded)
    }

    /// Search paths of one project, or of all projects when `project` is `None`
    pub async fn get_search_paths(
        &self,
        project: Option<&str>,
        extension: &str,
    ) -> Result<Vec<PathBuf>, ProjectError> {
        let solution = self.require_active().await?;
        let projects: Vec<&ClarionProject<F>> = match project {
            Some(name) => solution.project(name).into_iter().collect(),
            None => solution.projects.iter().collect(),
        };
        let mut paths: Vec<PathBuf> = Vec::new();
        for path in projects.iter().flat_map(|p| p.get_search_paths(extension)) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Locate `name` across the active solution
    ///
    /// Project source lists are searched first, then every project's
    /// redirection entries, then every project's search paths. Names without
    /// an extension are tried with each default lookup extension.
    #[instrument(name = "find_file_with_extension", skip(self))]
    pub async fn find_file_with_extension(&self, name: &str) -> Option<FileLookup> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(hit) = self.state.lock().await.lookups.get(&key).cloned() {
            log_lookup!(Level::DEBUG, name, LookupSource::Cache.as_str(), hit.path);
            return Some(FileLookup {
                source: LookupSource::Cache,
                ..hit
            });
        }

        let solution = self.active_solution().await?;
        let found = self.search(&solution, name.trim()).await;
        match &found {
            Some(lookup) => {
                log_lookup!(Level::DEBUG, name, lookup.source.as_str(), lookup.path);
                self.state.lock().await.lookups.insert(key, lookup.clone());
            }
            None => debug!(file = name, "File not found in solution"),
        }
        found
    }

    /// Locate `name` through one project's redirection entries and search
    /// paths only
    pub async fn find_file_in_project(
        &self,
        project: &str,
        name: &str,
    ) -> Result<Option<FileLookup>, ProjectError> {
        let solution = self.require_active().await?;
        let project = solution
            .project(project)
            .ok_or_else(|| ProjectError::ProjectNotFound {
                name: project.to_string(),
            })?;
        let found = project.find_file_in_project_paths_async(name.trim()).await;
        if let Some(path) = &found {
            log_lookup!(Level::DEBUG, name, LookupSource::ProjectSearchPath.as_str(), path);
        }
        Ok(found.map(|path| FileLookup {
            path,
            source: LookupSource::ProjectSearchPath,
            project: project.name.clone(),
        }))
    }

    async fn search(&self, solution: &ClarionSolution<F>, name: &str) -> Option<FileLookup> {
        let names = solution.projects.first()?.lookup_names(name);

        for name in &names {
            for project in &solution.projects {
                if let Some(path) = project.source_file(name) {
                    return Some(FileLookup {
                        path: path.clone(),
                        source: LookupSource::Project,
                        project: project.name.clone(),
                    });
                }
            }
        }

        let phases: [(LookupSource, fn(&ClarionProject<F>, &str) -> Vec<PathBuf>); 2] = [
            (LookupSource::Redirected, ClarionProject::redirected_candidates),
            (LookupSource::ProjectSearchPath, ClarionProject::search_path_candidates),
        ];
        for (source, candidates_of) in phases {
            let mut owners = Vec::new();
            let mut candidates = Vec::new();
            for name in &names {
                for project in &solution.projects {
                    for candidate in candidates_of(project, name) {
                        owners.push(project.name.clone());
                        candidates.push(candidate);
                    }
                }
            }
            if let Some(path) = first_existing(self.parser.fs(), candidates.clone()).await {
                let project = candidates
                    .iter()
                    .position(|candidate| *candidate == path)
                    .and_then(|index| owners.get(index).cloned())
                    .unwrap_or_default();
                return Some(FileLookup {
                    path,
                    source,
                    project,
                });
            }
        }
        None
    }

    /// Class definitions named `name` anywhere in the active solution
    ///
    /// The index is built on first use, off the state lock on the blocking
    /// pool, and kept until the solution changes.
    pub async fn find_class(&self, name: &str) -> Result<Vec<ClassDefinition>, ProjectError> {
        let solution = self.require_active().await?;
        let cached = self.state.lock().await.class_index.clone();
        let index = match cached {
            Some(index) => index,
            None => {
                let directories = solution.class_search_directories();
                let fs = self.parser.fs().clone();
                let built = tokio::task::spawn_blocking(move || ClassIndex::build(&fs, &directories))
                    .await
                    .map_err(|e| ProjectError::Io(std::io::Error::other(e)))??;
                let built = Arc::new(built);

                let mut state = self.state.lock().await;
                let still_active = state
                    .active
                    .as_ref()
                    .is_some_and(|active| Arc::ptr_eq(active, &solution));
                if still_active {
                    Arc::clone(state.class_index.get_or_insert(built))
                } else {
                    built
                }
            }
        };
        Ok(index.find_class(name).to_vec())
    }

    /// Normalised extension together with its search paths
    pub async fn describe_search_paths(
        &self,
        project: Option<&str>,
        extension: &str,
    ) -> Result<(String, Vec<PathBuf>), ProjectError> {
        let extension = normalize_extension(extension);
        let paths = self.get_search_paths(project, &extension).await?;
        Ok((extension, paths))
    }
}
