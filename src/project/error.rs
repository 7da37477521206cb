use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path does not exist: {path}")]
    PathNotFound { path: String },

    #[error("Redirection file not found: {path}")]
    RedirectionFileNotFound { path: String },

    #[error("Redirection include cycle at {path}")]
    IncludeCycle { path: String },

    #[error("Redirection include depth {depth} exceeded at {path}")]
    IncludeDepthExceeded { path: String, depth: usize },

    #[error("Invalid project file {path}: {reason}")]
    Xml { path: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Project not found in solution: {name}")]
    ProjectNotFound { name: String },

    #[error("No solution loaded")]
    SolutionNotLoaded,
}

impl From<regex::Error> for ProjectError {
    fn from(error: regex::Error) -> Self {
        ProjectError::Pattern {
            pattern: String::new(),
            reason: error.to_string(),
        }
    }
}
