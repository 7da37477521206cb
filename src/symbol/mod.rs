//! Document outline
//!
//! Turns a Clarion token stream into a hierarchical outline of procedures,
//! classes, data structures, windows and their members. The tree is built in
//! an arena ([`tree::SymbolTree`]) and frozen into owned
//! `ClarionDocumentSymbol` values at the end of the pass.

pub mod finder;
pub mod hierarchy;
mod provider;
pub mod structures;
#[allow(clippy::module_inception)]
mod symbol;
pub mod tree;

#[cfg(test)]
mod tests;

pub use provider::ClarionDocumentSymbolProvider;
pub use symbol::SymbolIterator;
#[cfg(test)]
pub use symbol::{ClarionDocumentSymbol, ClarionSymbolKind};
