//! I/O layer
//!
//! File system access behind a trait so project resolution can be exercised
//! against an in-memory tree.

pub mod file_system;

pub use file_system::{FileSystemTrait, RealFileSystem};
#[cfg(test)]
pub use file_system::TestFileSystem;
