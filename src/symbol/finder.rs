//! Read-only lookups over the partially built outline

use super::symbol::{ClarionSymbolKind, bare_name};
use super::tree::{ContainerName, NodeId, SymbolTree};

/// Suffix of the synthetic root that collects methods of an undeclared class
pub const IMPLEMENTATION_SUFFIX: &str = " (Implementation)";

pub struct SymbolFinder<'a> {
    tree: &'a SymbolTree,
}

impl<'a> SymbolFinder<'a> {
    pub fn new(tree: &'a SymbolTree) -> Self {
        Self { tree }
    }

    /// Class symbol with the given name, ignoring case
    ///
    /// Searches roots and the direct children of roots, which is where class
    /// definitions land (top level, or inside a procedure's data section).
    pub fn find_class_definition(&self, name: &str) -> Option<NodeId> {
        let is_class = |id: &NodeId| {
            let node = self.tree.get(*id);
            node.kind == ClarionSymbolKind::Class
                && !node.name.ends_with(IMPLEMENTATION_SUFFIX)
                && node.name.eq_ignore_ascii_case(name)
        };
        self.tree.roots().iter().copied().find(is_class).or_else(|| {
            self.tree
                .roots()
                .iter()
                .flat_map(|root| self.tree.get(*root).children().iter().copied())
                .find(is_class)
        })
    }

    /// Root-level `"Name (Implementation)"` container, ignoring case
    pub fn find_implementation_container(&self, class_name: &str) -> Option<NodeId> {
        self.tree.roots().iter().copied().find(|id| {
            let name = &self.tree.get(*id).name;
            name.strip_suffix(IMPLEMENTATION_SUFFIX)
                .is_some_and(|class| class.eq_ignore_ascii_case(class_name))
        })
    }

    /// Declared method in a class's Methods container, matched by bare name
    pub fn find_method_declaration(&self, class: NodeId, method_name: &str) -> Option<NodeId> {
        let methods = self.tree.container(class, ContainerName::Methods)?;
        self.find_method_in_container(methods, method_name)
    }

    pub fn find_method_in_container(&self, container: NodeId, method_name: &str) -> Option<NodeId> {
        self.tree
            .get(container)
            .children()
            .iter()
            .copied()
            .find(|id| bare_name(&self.tree.get(*id).name).eq_ignore_ascii_case(method_name))
    }

    /// Method implementation for `Class.Method` anywhere it may have been filed
    pub fn find_method_implementation(&self, class_name: &str, method_name: &str) -> Option<NodeId> {
        let containers = [
            self.find_class_definition(class_name),
            self.find_implementation_container(class_name),
        ];
        containers
            .into_iter()
            .flatten()
            .filter_map(|owner| self.tree.container(owner, ContainerName::Methods))
            .flat_map(|methods| self.tree.get(methods).children().iter().copied())
            .find(|id| {
                let node = self.tree.get(*id);
                node.meta.is_method_implementation
                    && bare_name(&node.name).eq_ignore_ascii_case(method_name)
            })
    }

    /// Most recently added root-level global procedure
    pub fn find_last_global_procedure(&self) -> Option<NodeId> {
        self.tree.roots().iter().rev().copied().find(|id| {
            let node = self.tree.get(*id);
            node.kind == ClarionSymbolKind::Procedure && node.meta.is_global_procedure
        })
    }
}
