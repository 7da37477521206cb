//! Redirection (`.RED`) file parsing
//!
//! A redirection file maps file masks to directory lists, grouped into
//! configuration sections:
//!
//! ```text
//! -- comment
//! [Common]
//! *.clw = .;%ROOT%\LibSrc\win
//! {include %bin%\shared.red}
//! [Debug]
//! *.obj = obj\debug
//! ```
//!
//! Parsing never fails from the caller's point of view: unreadable files,
//! include cycles and bad masks are logged and skipped, and the result always
//! starts with a synthetic `Common / *.* / .` entry.

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::config::ResolverConfig;
use crate::io::FileSystemTrait;

use super::error::ProjectError;
use super::paths::{file_name_eq, normalize, resolve_against, to_native};

pub const COMMON_SECTION: &str = "Common";

pub const WILDCARD_MASK: &str = "*.*";

/// Nesting limit for `{include ...}` chains
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// One `mask = path;path` assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectionEntry {
    pub section: String,
    /// File mask such as `*.clw` or `*.*`
    pub extension: String,
    /// Macro-expanded, normalised paths; relative ones are relative to the project
    pub paths: Vec<PathBuf>,
    /// Redirection file the entry was read from
    pub source: PathBuf,
}

impl RedirectionEntry {
    /// Whether the entry belongs to `Common` or to `configuration`
    pub fn applies_to(&self, configuration: &str) -> bool {
        self.section.eq_ignore_ascii_case(COMMON_SECTION)
            || self.section.eq_ignore_ascii_case(configuration)
    }

    pub fn is_wildcard(&self) -> bool {
        self.extension == WILDCARD_MASK
    }

    /// Whether the mask names exactly `extension` (`.clw` matches `*.clw`)
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extension
            .strip_prefix('*')
            .is_some_and(|mask| mask.eq_ignore_ascii_case(extension))
    }
}

/// Case-insensitive matcher for a redirection mask
pub fn mask_matcher(mask: &str) -> Result<GlobMatcher, ProjectError> {
    GlobBuilder::new(mask)
        .case_insensitive(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|error| ProjectError::Pattern {
            pattern: mask.to_string(),
            reason: error.to_string(),
        })
}

enum Line<'a> {
    Section(&'a str),
    Include(&'a str),
    Assignment { mask: &'a str, paths: &'a str },
}

/// Classify one line with its `--` comment removed
fn classify_line(raw: &str) -> Option<Line<'_>> {
    let line = raw.split("--").next().unwrap_or_default().trim();
    if line.is_empty() {
        return None;
    }
    if let Some(section) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return Some(Line::Section(section.trim()));
    }
    if let Some(body) = line.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
        let body = body.trim();
        let keyword = body.get(..7)?;
        if keyword.eq_ignore_ascii_case("include") {
            return Some(Line::Include(body[7..].trim()));
        }
        return None;
    }
    let (mask, paths) = line.split_once('=')?;
    let mask = mask.trim();
    (!mask.is_empty()).then_some(Line::Assignment {
        mask,
        paths: paths.trim(),
    })
}

// ============================================================================
// Parser
// ============================================================================

pub struct RedirectionFileParser<F: FileSystemTrait> {
    fs: F,
    config: ResolverConfig,
    macro_pattern: Regex,
}

impl<F: FileSystemTrait> RedirectionFileParser<F> {
    pub fn new(fs: F, config: ResolverConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            fs,
            config,
            macro_pattern: Regex::new(r"%([^%\s]+)%")?,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Project-specific redirection file if present, else the global one
    pub fn locate_red_file(&self, project_dir: &Path) -> Option<PathBuf> {
        let name = &self.config.redirection_file;
        let local = self
            .fs
            .list_dir(project_dir)
            .ok()
            .and_then(|files| files.into_iter().find(|file| file_name_eq(file, name)));
        if local.is_some() {
            return local;
        }
        self.config
            .global_redirection_path()
            .filter(|global| self.fs.exists(global))
    }

    /// Entries for a project directory, starting with `Common / *.* / .`
    pub fn parse_red_file(&self, project_dir: &Path) -> Vec<RedirectionEntry> {
        let Some(red_file) = self.locate_red_file(project_dir) else {
            debug!(project_dir = %project_dir.display(), "No redirection file found");
            return vec![self.seed_entry(project_dir)];
        };
        self.parse_path(&red_file, project_dir)
    }

    /// Entries for an explicit redirection file
    pub fn parse_path(&self, red_file: &Path, project_dir: &Path) -> Vec<RedirectionEntry> {
        let mut entries = vec![self.seed_entry(project_dir)];
        let mut ancestors = HashSet::new();
        if let Err(error) = self.parse_file(red_file, red_file, &mut entries, &mut ancestors, 0) {
            warn!(file = %red_file.display(), error = %error, "Failed to parse redirection file");
        }
        debug!(
            file = %red_file.display(),
            entries = entries.len(),
            "Parsed redirection file"
        );
        entries
    }

    fn seed_entry(&self, project_dir: &Path) -> RedirectionEntry {
        RedirectionEntry {
            section: COMMON_SECTION.to_string(),
            extension: WILDCARD_MASK.to_string(),
            paths: vec![PathBuf::from(".")],
            source: project_dir.to_path_buf(),
        }
    }

    /// Parse one file, recursing into includes
    ///
    /// `root` is the top-level redirection file, used for `%bin%` and
    /// `%redname%` while expanding included files. `ancestors` holds the
    /// files on the current include chain; a file may be included again
    /// from a different branch.
    fn parse_file(
        &self,
        path: &Path,
        root: &Path,
        entries: &mut Vec<RedirectionEntry>,
        ancestors: &mut HashSet<PathBuf>,
        depth: usize,
    ) -> Result<(), ProjectError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(ProjectError::IncludeDepthExceeded {
                path: path.display().to_string(),
                depth,
            });
        }
        let key = PathBuf::from(normalize(path).to_string_lossy().to_lowercase());
        if !ancestors.insert(key.clone()) {
            return Err(ProjectError::IncludeCycle {
                path: path.display().to_string(),
            });
        }
        let result = self.parse_lines(path, root, entries, ancestors, depth);
        ancestors.remove(&key);
        result
    }

    fn parse_lines(
        &self,
        path: &Path,
        root: &Path,
        entries: &mut Vec<RedirectionEntry>,
        ancestors: &mut HashSet<PathBuf>,
        depth: usize,
    ) -> Result<(), ProjectError> {
        if !self.fs.exists(path) {
            return Err(ProjectError::RedirectionFileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = self.fs.read_to_string(path)?;
        let base = path.parent().unwrap_or(Path::new("."));
        let mut section = COMMON_SECTION.to_string();

        for raw in content.lines() {
            match classify_line(raw) {
                None => {}
                Some(Line::Section(name)) => {
                    trace!(section = name, "Redirection section");
                    section = name.to_string();
                }
                Some(Line::Include(target)) => {
                    let expanded = self.expand_macros(target, root);
                    let include = resolve_against(base, &to_native(&expanded));
                    // A broken include only loses its own entries
                    if let Err(error) =
                        self.parse_file(&include, root, entries, ancestors, depth + 1)
                    {
                        warn!(
                            file = %path.display(),
                            include = %include.display(),
                            error = %error,
                            "Skipping redirection include"
                        );
                    }
                }
                Some(Line::Assignment { mask, paths }) => {
                    let paths = paths
                        .split(';')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| normalize(&to_native(&self.expand_macros(p, root))))
                        .collect();
                    entries.push(RedirectionEntry {
                        section: section.clone(),
                        extension: mask.to_string(),
                        paths,
                        source: path.to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Expand `%name%` tokens; unknown names stay verbatim
    pub fn expand_macros(&self, text: &str, red_file: &Path) -> String {
        self.macro_pattern
            .replace_all(text, |captures: &regex::Captures| {
                let name = &captures[1];
                self.macro_value(name, red_file)
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }

    fn macro_value(&self, name: &str, red_file: &Path) -> Option<String> {
        if let Some(value) = self.config.macro_value(name) {
            return Some(value.to_string());
        }
        let bin = || {
            self.config
                .clarion_bin
                .clone()
                .or_else(|| red_file.parent().map(Path::to_path_buf))
        };
        match name.to_ascii_lowercase().as_str() {
            "bin" => bin().map(|dir| dir.display().to_string()),
            "redname" => red_file
                .file_name()
                .map(|file_name| file_name.to_string_lossy().into_owned()),
            "root" => bin()
                .and_then(|dir| dir.parent().map(Path::to_path_buf))
                .map(|dir| dir.display().to_string()),
            _ => None,
        }
    }

    /// Candidate locations for `name`, in lookup order
    ///
    /// Entries are honoured when their section applies to the active
    /// configuration and their mask matches the file name; relative paths
    /// resolve against `base_dir`.
    pub fn candidates(
        &self,
        entries: &[RedirectionEntry],
        name: &str,
        base_dir: &Path,
    ) -> Vec<PathBuf> {
        let configuration = &self.config.configuration;
        let mut candidates = Vec::new();
        for entry in entries.iter().filter(|e| e.applies_to(configuration)) {
            let matcher = match mask_matcher(&entry.extension) {
                Ok(matcher) => matcher,
                Err(error) => {
                    warn!(error = %error, "Ignoring redirection entry");
                    continue;
                }
            };
            if !matcher.is_match(name) {
                continue;
            }
            candidates.extend(
                entry
                    .paths
                    .iter()
                    .map(|dir| resolve_against(base_dir, dir).join(name)),
            );
        }
        candidates
    }

    /// First existing candidate for `name`
    pub fn find_file(
        &self,
        entries: &[RedirectionEntry],
        name: &str,
        base_dir: &Path,
    ) -> Option<PathBuf> {
        let found = self
            .candidates(entries, name, base_dir)
            .into_iter()
            .find(|candidate| self.fs.exists(candidate));
        if let Some(path) = &found {
            trace!(file = name, path = %path.display(), "Redirection hit");
        }
        found
    }
}
