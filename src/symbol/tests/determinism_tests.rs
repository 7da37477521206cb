//! Repeatability and protocol conversion

use super::outline;
use crate::symbol::{ClarionDocumentSymbol, ClarionDocumentSymbolProvider, SymbolIterator};
use crate::test_utils::tokens::lex;
use lsp_types::{DocumentSymbol, SymbolKind};

#[cfg(feature = "test-logging")]
#[ctor::ctor]
fn init_test_logging() {
    crate::test_utils::logging::init();
}

const SOURCE: &str = concat!(
    "  MEMBER('app')\n",
    "Shape  CLASS,TYPE\n",
    "Area     PROCEDURE,REAL\n",
    "Sides    LONG\n",
    "       END\n",
    "Shape.Area PROCEDURE\n",
    "Scale  REAL\n",
    "  CODE\n",
    "  RETURN 0\n",
    "Report PROCEDURE\n",
    "Window WINDOW('Report')\n",
    "         BUTTON('Go'),USE(?Go)\n",
    "       END\n",
    "  CODE\n",
    "Run ROUTINE\n",
    "  EXIT\n",
);

#[test]
fn test_same_tokens_give_same_outline() {
    let tokens = lex(SOURCE);
    let provider = ClarionDocumentSymbolProvider::new();
    let first = provider.provide_document_symbols(&tokens, "shapes.clw");
    let second = provider.provide_document_symbols(&tokens, "shapes.clw");
    assert_eq!(first, second);
    assert_eq!(first, outline(SOURCE));
}

#[test]
fn test_every_child_range_is_inside_its_parent() {
    fn check(parent: &ClarionDocumentSymbol) {
        for child in &parent.children {
            assert!(
                (child.range.start.line, child.range.start.character)
                    >= (parent.range.start.line, parent.range.start.character),
                "{} starts before {}",
                child.name,
                parent.name
            );
            assert!(
                (child.range.end.line, child.range.end.character)
                    <= (parent.range.end.line, parent.range.end.character),
                "{} ends after {}",
                child.name,
                parent.name
            );
            check(child);
        }
    }
    for root in outline(SOURCE) {
        check(&root);
    }
}

#[test]
fn test_converts_to_lsp_document_symbols() {
    let symbols = outline(SOURCE);
    let lsp: Vec<DocumentSymbol> = symbols.iter().map(DocumentSymbol::from).collect();

    let class = lsp.iter().find(|s| s.name == "Shape").unwrap();
    assert_eq!(class.kind, SymbolKind::CLASS);
    assert_eq!(class.detail.as_deref(), Some("CLASS,TYPE"));

    let report = lsp.iter().find(|s| s.name == "Report ()").unwrap();
    assert_eq!(report.kind, SymbolKind::FUNCTION);
    let children = report.children.as_ref().unwrap();
    assert!(children.iter().any(|c| c.name == "Window" && c.kind == SymbolKind::OBJECT));

    let code = children.iter().find(|c| c.name == "CODE").unwrap();
    assert!(code.children.is_none());
    assert!(code.detail.is_none());
}

#[test]
fn test_iterator_reports_ancestor_paths() {
    let symbols = outline(SOURCE);
    let (button, path) = SymbolIterator::new(&symbols)
        .find(|(symbol, _)| symbol.name.starts_with("BUTTON"))
        .unwrap();
    assert_eq!(button.detail, "USE(?Go)");
    assert_eq!(path, vec!["Report ()", "Window"]);
}

#[test]
fn test_serializes_with_camel_case_metadata() {
    let symbols = outline(SOURCE);
    let json = serde_json::to_value(&symbols).unwrap();
    let class = &json[0];
    assert_eq!(class["name"], "Shape");
    assert_eq!(class["kind"], "Class");
    assert_eq!(class["clarionLabel"], "Shape");
    assert!(class.get("isMethodImplementation").is_none());
    assert!(class["selectionRange"].is_object());
}
