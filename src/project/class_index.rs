//! Solution-wide index of `Label CLASS(...)` definitions

use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, debug, warn};

use crate::io::FileSystemTrait;
use crate::log_timing;

use super::paths::dotted_extension;

/// Files scanned for class definitions
const INDEXED_EXTENSIONS: &[&str] = &[".inc", ".clw"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub name: String,
    pub file: PathBuf,
    /// 0-based
    pub line: u32,
    pub parent_class: Option<String>,
    /// Declared with the `TYPE` attribute
    pub is_type: bool,
}

pub struct ClassIndex {
    classes: HashMap<String, Vec<ClassDefinition>>,
    files: usize,
    class_line: Regex,
}

impl ClassIndex {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            classes: HashMap::new(),
            files: 0,
            class_line: Regex::new(
                r"(?i)^([A-Z_][A-Z0-9_:]*)\s+CLASS\b\s*(?:\(\s*([A-Z_][A-Z0-9_:]*)?\s*\))?(.*)$",
            )?,
        })
    }

    /// Index every `.inc`/`.clw` file directly inside `directories`
    pub fn build<F: FileSystemTrait>(fs: &F, directories: &[PathBuf]) -> Result<Self, regex::Error> {
        let start = Instant::now();
        let mut index = Self::new()?;
        let mut seen = HashSet::new();

        for dir in directories {
            let files = match fs.list_dir(dir) {
                Ok(files) => files,
                Err(error) => {
                    debug!(dir = %dir.display(), error = %error, "Skipping directory");
                    continue;
                }
            };
            for file in files {
                let indexed = file
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(dotted_extension)
                    .is_some_and(|ext| INDEXED_EXTENSIONS.contains(&ext.as_str()));
                if !indexed || !seen.insert(file.clone()) {
                    continue;
                }
                match fs.read_to_string(&file) {
                    Ok(content) => index.index_source(&file, &content),
                    Err(error) => warn!(file = %file.display(), error = %error, "Failed to read"),
                }
            }
        }

        log_timing!(Level::DEBUG, "class_index_build", start.elapsed());
        debug!(
            files = index.files,
            classes = index.classes.len(),
            "Built class index"
        );
        Ok(index)
    }

    /// Record the class definitions of one source file
    pub fn index_source(&mut self, file: &Path, content: &str) {
        self.files += 1;
        for (line_number, line) in content.lines().enumerate() {
            let Some(captures) = self.class_line.captures(line) else {
                continue;
            };
            let name = captures[1].to_string();
            let attributes = captures
                .get(3)
                .map_or("", |m| m.as_str())
                .split('!')
                .next()
                .unwrap_or_default();
            let is_type = attributes
                .split(',')
                .any(|attribute| attribute.trim().eq_ignore_ascii_case("TYPE"));

            self.classes
                .entry(name.to_ascii_uppercase())
                .or_default()
                .push(ClassDefinition {
                    name,
                    file: file.to_path_buf(),
                    line: line_number as u32,
                    parent_class: captures.get(2).map(|m| m.as_str().to_string()),
                    is_type,
                });
        }
    }

    /// All definitions of `name`, ignoring case
    pub fn find_class(&self, name: &str) -> &[ClassDefinition] {
        self.classes
            .get(&name.trim().to_ascii_uppercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
