//! Solution and project resolution
//!
//! Reads `.sln` and `.cwproj` files, parses the redirection files that
//! configure where the compiler looks for sources, and answers "where is
//! this file" and "where is this class" for a loaded solution.

pub mod class_index;
pub mod cwproj;
pub mod error;
pub mod paths;
#[allow(clippy::module_inception)]
pub mod project;
pub mod redirection;
pub mod scanner;
pub mod solution;
pub mod solution_file;

pub use error::ProjectError;
pub use scanner::{ScanOptions, scan_solutions};
pub use solution::SolutionManager;
