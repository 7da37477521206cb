//! Outline symbol representation
//!
//! [`ClarionDocumentSymbol`] is the owned tree handed back to callers. It
//! carries the LSP `documentSymbol` shape plus the Clarion metadata later
//! consumers (hover, definition lookup) rely on, and converts losslessly into
//! [`lsp_types::DocumentSymbol`] for the protocol layer.

use lsp_types::{DocumentSymbol, Range, SymbolKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Semantic role of an outline node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClarionSymbolKind {
    Procedure,
    Method,
    Routine,
    Variable,
    Property,
    Field,
    Structure,
    Class,
    Interface,
    Module,
    Container,
    Window,
    Control,
    Key,
    Marker,
}

impl ClarionSymbolKind {
    /// Map onto the closed LSP symbol kind enumeration
    pub fn to_lsp(self) -> SymbolKind {
        match self {
            ClarionSymbolKind::Procedure => SymbolKind::FUNCTION,
            ClarionSymbolKind::Method => SymbolKind::METHOD,
            ClarionSymbolKind::Routine => SymbolKind::FUNCTION,
            ClarionSymbolKind::Variable => SymbolKind::VARIABLE,
            ClarionSymbolKind::Property => SymbolKind::PROPERTY,
            ClarionSymbolKind::Field => SymbolKind::FIELD,
            ClarionSymbolKind::Structure => SymbolKind::STRUCT,
            ClarionSymbolKind::Class => SymbolKind::CLASS,
            ClarionSymbolKind::Interface => SymbolKind::INTERFACE,
            ClarionSymbolKind::Module => SymbolKind::MODULE,
            ClarionSymbolKind::Container => SymbolKind::NAMESPACE,
            ClarionSymbolKind::Window => SymbolKind::OBJECT,
            ClarionSymbolKind::Control => SymbolKind::OBJECT,
            ClarionSymbolKind::Key => SymbolKind::KEY,
            ClarionSymbolKind::Marker => SymbolKind::EVENT,
        }
    }

    /// Procedures and methods: scopes that own local data and a CODE section
    pub fn is_callable(self) -> bool {
        matches!(self, ClarionSymbolKind::Procedure | ClarionSymbolKind::Method)
    }

    /// Kinds that group declarations (data structures, UI containers, MAPs)
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ClarionSymbolKind::Structure
                | ClarionSymbolKind::Class
                | ClarionSymbolKind::Interface
                | ClarionSymbolKind::Module
                | ClarionSymbolKind::Window
                | ClarionSymbolKind::Control
        )
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Clarion-specific flags and naming data attached to a symbol
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarionSymbolMeta {
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_method_implementation: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_method_declaration: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_global_procedure: bool,

    /// Routine whose name contains `::`
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_special_routine: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_interface: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_map_procedure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finishes_at: Option<u32>,

    /// Field prefix declared with `PRE(...)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarion_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarion_label: Option<String>,

    /// Declared type without trailing attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarion_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarion_var_name: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_part_of_structure: bool,

    /// Upper-cased alternate spellings: `PREFIX:FIELD`, `LABEL.FIELD`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_references: Vec<String>,
}

/// A node of the document outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarionDocumentSymbol {
    pub name: String,
    pub detail: String,
    pub kind: ClarionSymbolKind,
    pub range: Range,
    pub selection_range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_text: Option<String>,
    #[serde(flatten)]
    pub meta: ClarionSymbolMeta,
    #[serde(default)]
    pub children: Vec<ClarionDocumentSymbol>,
}

impl ClarionDocumentSymbol {
    /// First direct child with the given name, ignoring case
    pub fn child(&self, name: &str) -> Option<&ClarionDocumentSymbol> {
        self.children
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }

    /// Direct child names in order
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|child| child.name.as_str()).collect()
    }

    /// Name up to the first whitespace or parenthesis
    pub fn bare_name(&self) -> &str {
        bare_name(&self.name)
    }
}

/// Identifier part of a display name such as `Init (LONG x)` or `count  LONG`
pub fn bare_name(name: &str) -> &str {
    let end = name
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(name.len());
    &name[..end]
}

impl From<&ClarionDocumentSymbol> for DocumentSymbol {
    fn from(symbol: &ClarionDocumentSymbol) -> Self {
        let children: Vec<DocumentSymbol> =
            symbol.children.iter().map(DocumentSymbol::from).collect();

        #[allow(deprecated)]
        DocumentSymbol {
            name: symbol.name.clone(),
            detail: (!symbol.detail.is_empty()).then(|| symbol.detail.clone()),
            kind: symbol.kind.to_lsp(),
            tags: None,
            deprecated: None,
            range: symbol.range,
            selection_range: symbol.selection_range,
            children: (!children.is_empty()).then_some(children),
        }
    }
}

// ============================================================================
// Iterator for Tree Traversal
// ============================================================================

/// Depth-first iterator over an outline, yielding each symbol with the names
/// of its ancestors
pub struct SymbolIterator<'a> {
    stack: VecDeque<(&'a ClarionDocumentSymbol, Vec<&'a str>)>,
}

impl<'a> SymbolIterator<'a> {
    pub fn new(symbols: &'a [ClarionDocumentSymbol]) -> Self {
        let stack = symbols.iter().map(|symbol| (symbol, Vec::new())).collect();
        Self { stack }
    }
}

impl<'a> Iterator for SymbolIterator<'a> {
    type Item = (&'a ClarionDocumentSymbol, Vec<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let (symbol, path) = self.stack.pop_front()?;
        let mut child_path = path.clone();
        child_path.push(&symbol.name);
        for child in symbol.children.iter().rev() {
            self.stack.push_front((child, child_path.clone()));
        }
        Some((symbol, path))
    }
}
