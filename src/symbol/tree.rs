//! Arena-backed outline under construction
//!
//! Nodes live in a flat `Vec` and refer to each other by [`NodeId`]. Named
//! child containers (a class's Properties/Methods, a MAP's Functions) are
//! tracked in a side table keyed by parent so later children can be routed
//! without searching, and without the node itself holding links into its own
//! children.

use lsp_types::{Position, Range};
use std::collections::HashMap;

use super::symbol::{ClarionDocumentSymbol, ClarionSymbolKind, ClarionSymbolMeta, bare_name};

/// Stable handle into a [`SymbolTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Synthetic grouping containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerName {
    Properties,
    Methods,
    Functions,
}

impl ContainerName {
    pub fn label(self) -> &'static str {
        match self {
            ContainerName::Properties => "Properties",
            ContainerName::Methods => "Methods",
            ContainerName::Functions => "Functions",
        }
    }

    /// Fixed ordering ahead of alphabetically sorted siblings
    fn sort_text(self) -> &'static str {
        match self {
            ContainerName::Properties => "!0",
            ContainerName::Methods => "!1",
            ContainerName::Functions => "!2",
        }
    }

    /// Methods keep source order, the other containers sort by name
    fn sorts_children(self) -> bool {
        !matches!(self, ContainerName::Methods)
    }
}

/// A node as stored in the arena
#[derive(Debug, Clone)]
pub struct SymbolNode {
    pub name: String,
    pub detail: String,
    pub kind: ClarionSymbolKind,
    pub range: Range,
    pub selection_range: Range,
    pub sort_text: Option<String>,
    pub meta: ClarionSymbolMeta,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    container: Option<ContainerName>,
}

impl SymbolNode {
    pub fn new(
        name: impl Into<String>,
        detail: impl Into<String>,
        kind: ClarionSymbolKind,
        range: Range,
    ) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
            kind,
            range,
            selection_range: range,
            sort_text: None,
            meta: ClarionSymbolMeta::default(),
            parent: None,
            children: Vec::new(),
            container: None,
        }
    }

    pub fn with_selection_range(mut self, selection_range: Range) -> Self {
        self.selection_range = selection_range;
        self
    }

    pub fn with_meta(mut self, meta: ClarionSymbolMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The outline being assembled by a single provider pass
#[derive(Debug, Default)]
pub struct SymbolTree {
    nodes: Vec<SymbolNode>,
    roots: Vec<NodeId>,
    containers: HashMap<NodeId, HashMap<ContainerName, NodeId>>,
}

impl SymbolTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node` under `parent`, or at the root when `parent` is `None`
    pub fn add(&mut self, parent: Option<NodeId>, mut node: SymbolNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(parent_id) => self.nodes[parent_id.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn get(&self, id: NodeId) -> &SymbolNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut SymbolNode {
        &mut self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn container(&self, parent: NodeId, name: ContainerName) -> Option<NodeId> {
        self.containers
            .get(&parent)
            .and_then(|named| named.get(&name))
            .copied()
    }

    /// Return the named container of `parent`, creating it on first use
    pub fn ensure_container(&mut self, parent: NodeId, name: ContainerName) -> NodeId {
        if let Some(existing) = self.container(parent, name) {
            return existing;
        }
        let parent_node = self.get(parent);
        let mut node = SymbolNode::new(
            name.label(),
            "",
            ClarionSymbolKind::Container,
            parent_node.range,
        )
        .with_selection_range(parent_node.selection_range);
        node.sort_text = Some(name.sort_text().to_string());
        node.container = Some(name);

        let id = self.add(Some(parent), node);
        self.containers.entry(parent).or_default().insert(name, id);
        id
    }

    /// Move the end of a node's range forward; never shrinks
    pub fn extend_range_to(&mut self, id: NodeId, end: Position) {
        let node = self.get_mut(id);
        if position_after(end, node.range.end) {
            node.range.end = end;
        }
    }

    /// Nearest ancestor (excluding `id` itself) satisfying `predicate`
    pub fn ancestor_where(
        &self,
        id: NodeId,
        predicate: impl Fn(&SymbolNode) -> bool,
    ) -> Option<NodeId> {
        let mut current = self.get(id).parent;
        while let Some(ancestor) = current {
            let node = self.get(ancestor);
            if predicate(node) {
                return Some(ancestor);
            }
            current = node.parent;
        }
        None
    }

    /// Whether any node in the tree is a method implementation
    pub fn has_method_implementations(&self) -> bool {
        self.roots
            .iter()
            .any(|root| self.subtree_has_method_implementation(*root))
    }

    fn subtree_has_method_implementation(&self, id: NodeId) -> bool {
        let node = self.get(id);
        node.meta.is_method_implementation
            || node
                .children
                .iter()
                .any(|child| self.subtree_has_method_implementation(*child))
    }

    /// Freeze the arena into the owned output tree
    ///
    /// Children of Properties and Functions containers are ordered by bare
    /// name and get zero-padded `sortText`; every parent range is widened to
    /// enclose its children.
    pub fn into_document_symbols(self) -> Vec<ClarionDocumentSymbol> {
        self.roots.iter().map(|root| self.build(*root)).collect()
    }

    fn build(&self, id: NodeId) -> ClarionDocumentSymbol {
        let node = self.get(id);
        let mut children: Vec<ClarionDocumentSymbol> =
            node.children.iter().map(|child| self.build(*child)).collect();

        if node.container.is_some_and(ContainerName::sorts_children) {
            children.sort_by_key(|child| sort_key(&child.name));
            for (index, child) in children.iter_mut().enumerate() {
                child.sort_text = Some(format!("{index:04}"));
            }
        }

        let mut range = node.range;
        for child in &children {
            if position_after(range.start, child.range.start) {
                range.start = child.range.start;
            }
            if position_after(child.range.end, range.end) {
                range.end = child.range.end;
            }
        }

        ClarionDocumentSymbol {
            name: node.name.clone(),
            detail: node.detail.clone(),
            kind: node.kind,
            range,
            selection_range: node.selection_range,
            sort_text: node.sort_text.clone(),
            meta: node.meta.clone(),
            children,
        }
    }
}

fn position_after(a: Position, b: Position) -> bool {
    (a.line, a.character) > (b.line, b.character)
}

/// Alphabetisation key: the identifier before the name/type gap
fn sort_key(name: &str) -> String {
    bare_name(name).to_lowercase()
}
