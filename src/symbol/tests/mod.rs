//! Outline scenarios
//!
//! Each suite lexes a small Clarion program with the test lexer and checks
//! the shape of the resulting outline.

pub mod determinism_tests;
pub mod scope_tests;

use crate::symbol::{ClarionDocumentSymbol, ClarionDocumentSymbolProvider};
use crate::test_utils::tokens::lex;

/// Build the outline of `source`
pub fn outline(source: &str) -> Vec<ClarionDocumentSymbol> {
    let tokens = lex(source);
    ClarionDocumentSymbolProvider::new().provide_document_symbols(&tokens, "test.clw")
}

/// Follow a path of names from the roots, ignoring case
pub fn at<'a>(symbols: &'a [ClarionDocumentSymbol], path: &[&str]) -> &'a ClarionDocumentSymbol {
    let (first, rest) = path.split_first().expect("empty path");
    let mut current = symbols
        .iter()
        .find(|symbol| symbol.name.eq_ignore_ascii_case(first))
        .unwrap_or_else(|| panic!("no root named {first}"));
    for name in rest {
        current = current
            .child(name)
            .unwrap_or_else(|| panic!("{} has no child {name}", current.name));
    }
    current
}

pub fn root_names(symbols: &[ClarionDocumentSymbol]) -> Vec<&str> {
    symbols.iter().map(|symbol| symbol.name.as_str()).collect()
}
