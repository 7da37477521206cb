//! Document outline provider
//!
//! Builds the symbol tree for one document in a single left-to-right pass over
//! its tokens. Each token kind has a handler that creates nodes and picks
//! their parent from the open-scope stack ([`HierarchyManager`]) plus a few
//! pieces of sticky state (the procedure in progress, whether its CODE marker
//! has been seen, the last method implementation). Scopes close lazily when
//! the scan reaches a new line.
//!
//! The pass never fails: when a parent cannot be determined the node goes to
//! the best remaining candidate and ultimately to the document root.

use lsp_types::{Position, Range};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{Level, debug, instrument, trace};

use crate::log_timing;
use crate::token::{
    FOLDING_ONLY_KEYWORDS, LineIndex, NON_SYMBOL_KEYWORDS, Token, TokenSubType, TokenType,
    closes_block, is_loop_terminator, is_module_attribute, is_one_of, logical_line_end,
    render_tokens, split_top_level_commas,
};

use super::finder::{IMPLEMENTATION_SUFFIX, SymbolFinder};
use super::hierarchy::{HierarchyManager, ScopeKind, StackEntry, classify_scope};
use super::structures::{
    StructureHeader, is_line_head, key_display, line_label, line_tail, procedure_params,
    block_end, project_display, structure_kind, window_element_display,
};
use super::symbol::{ClarionDocumentSymbol, ClarionSymbolKind, ClarionSymbolMeta};
use super::tree::{ContainerName, NodeId, SymbolNode, SymbolTree};

/// Produces the document outline from a token stream
#[derive(Debug, Default, Clone, Copy)]
pub struct ClarionDocumentSymbolProvider;

impl ClarionDocumentSymbolProvider {
    pub fn new() -> Self {
        Self
    }

    /// Build the outline for `tokens`; `document` is only used for logging
    ///
    /// Holds no state between calls: the same tokens always give the same
    /// tree.
    #[instrument(name = "provide_document_symbols", skip(self, tokens), fields(tokens = tokens.len()))]
    pub fn provide_document_symbols(
        &self,
        tokens: &[Token],
        document: &str,
    ) -> Vec<ClarionDocumentSymbol> {
        let start = Instant::now();
        let symbols = OutlineBuilder::new(tokens).build();
        log_timing!(Level::DEBUG, "provide_document_symbols", start.elapsed());
        debug!(roots = symbols.len(), "Built outline for {}", document);
        symbols
    }
}

// ============================================================================
// Single-pass Builder
// ============================================================================

struct OutlineBuilder<'a> {
    tokens: &'a [Token],
    lines: LineIndex,
    tree: SymbolTree,
    hierarchy: HierarchyManager,

    current_line: Option<u32>,
    previous_line: Option<u32>,

    current_structure: Option<NodeId>,
    current_procedure: Option<NodeId>,
    current_class_implementation: Option<NodeId>,
    inside_definition_block: bool,
    past_code_statement: bool,
    last_method_implementation: Option<NodeId>,
    /// Method whose CODE marker has been seen; no longer `current_procedure`
    code_cleared_procedure: Option<NodeId>,
    has_method_implementations: bool,
    /// Open IF/LOOP/BREAK/... blocks whose END must not pop a scope
    open_blocks: Vec<&'a Token>,

    /// Upper-cased class/interface label -> definition node
    classes: HashMap<String, NodeId>,
    /// Tokens already consumed by a walk-ahead
    handled: HashSet<usize>,
    /// RECORD nodes created by a FILE walk-ahead, keyed by token index
    prebuilt: HashMap<usize, NodeId>,
}

impl<'a> OutlineBuilder<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            lines: LineIndex::build(tokens),
            tree: SymbolTree::new(),
            hierarchy: HierarchyManager::new(),
            current_line: None,
            previous_line: None,
            current_structure: None,
            current_procedure: None,
            current_class_implementation: None,
            inside_definition_block: false,
            past_code_statement: false,
            last_method_implementation: None,
            code_cleared_procedure: None,
            has_method_implementations: false,
            open_blocks: Vec::new(),
            classes: HashMap::new(),
            handled: HashSet::new(),
            prebuilt: HashMap::new(),
        }
    }

    fn build(mut self) -> Vec<ClarionDocumentSymbol> {
        for idx in 0..self.tokens.len() {
            let line = self.tokens[idx].line;
            if self.current_line != Some(line) {
                self.advance_line(line);
            }
            if self.handled.contains(&idx) {
                continue;
            }
            self.dispatch(idx);
        }

        let remaining = self.hierarchy.clear();
        self.close(remaining, self.current_line);
        trace!(
            nodes = self.tree.len(),
            method_implementations = self.tree.has_method_implementations(),
            class_implementation = ?self.current_class_implementation,
            "Outline pass complete"
        );
        self.tree.into_document_symbols()
    }

    fn dispatch(&mut self, idx: usize) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        match token.token_type {
            TokenType::Structure => self.handle_structure(idx),
            TokenType::WindowElement => self.handle_window_element(idx),
            TokenType::PropertyFunction if token.value_is("PROJECT") => self.handle_project(idx),
            TokenType::Keyword if token.value_is("KEY") || token.value_is("INDEX") => {
                self.handle_key(idx)
            }
            TokenType::Keyword if token.value_is("ROUTINE") => self.handle_routine(idx),
            TokenType::Keyword if is_one_of(token, FOLDING_ONLY_KEYWORDS) => {
                self.open_blocks.push(token)
            }
            TokenType::Keyword if is_loop_terminator(tokens, idx) => self.handle_loop_terminator(idx),
            TokenType::Procedure => self.handle_procedure(idx),
            TokenType::Routine => self.handle_routine(idx),
            TokenType::ExecutionMarker => self.handle_execution_marker(idx),
            TokenType::EndStatement => self.handle_end(idx),
            TokenType::Type
            | TokenType::TypeAnnotation
            | TokenType::ReferenceVariable
            | TokenType::Variable
            | TokenType::FunctionArgumentParameter => self.handle_variable(idx),
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Scope bookkeeping
    // ------------------------------------------------------------------------

    fn advance_line(&mut self, line: u32) {
        let line_tokens = self.lines.tokens_on_line(self.tokens, line);
        let outcome = self.hierarchy.check_and_pop_completed_structures(
            line,
            line_tokens,
            self.has_method_implementations,
        );
        self.close(outcome.closed, self.current_line);
        if outcome.closed_global_procedure {
            self.last_method_implementation = None;
            self.current_class_implementation = None;
        }
        self.previous_line = self.current_line;
        self.current_line = Some(line);
        self.sync_scope();
    }

    /// Extend closed scopes to the line they were closed on
    ///
    /// Scopes with a recorded closing line already span it; global procedures
    /// held open past it are extended as well.
    fn close(&mut self, entries: Vec<StackEntry>, line: Option<u32>) {
        let Some(line) = line else {
            return;
        };
        let end = self.line_end(line);
        for entry in entries {
            if entry.finishes_at.is_none() || entry.kind == ScopeKind::GlobalProcedure {
                self.tree.extend_range_to(entry.node, end);
            }
        }
    }

    fn push_scope(&mut self, node: NodeId, finishes_at: Option<u32>) {
        let kind = classify_scope(self.tree.get(node));
        self.hierarchy.push(node, finishes_at, kind);
        self.sync_scope();
    }

    /// Recompute the derived scope pointers from the stack
    fn sync_scope(&mut self) {
        self.current_structure = None;
        self.current_procedure = None;
        self.inside_definition_block = false;

        for entry in self.hierarchy.entries().iter().rev() {
            let kind = self.tree.get(entry.node).kind;
            if kind == ClarionSymbolKind::Routine {
                continue;
            }
            if kind.is_callable() {
                if self.code_cleared_procedure != Some(entry.node) {
                    self.current_procedure = Some(entry.node);
                }
                break;
            }
            if self.current_structure.is_none() {
                self.current_structure = Some(entry.node);
            }
            if matches!(
                kind,
                ClarionSymbolKind::Class | ClarionSymbolKind::Interface | ClarionSymbolKind::Module
            ) {
                self.inside_definition_block = true;
            }
        }
    }

    fn reset_procedure_state(&mut self) {
        self.past_code_statement = false;
        self.open_blocks.clear();
        self.code_cleared_procedure = None;
    }

    /// Node that receives data declared in `node`: a class's Properties
    fn route_into(&mut self, node: NodeId) -> NodeId {
        if self.tree.get(node).kind == ClarionSymbolKind::Class {
            self.tree.ensure_container(node, ContainerName::Properties)
        } else {
            node
        }
    }

    fn scope_target(&mut self) -> Option<NodeId> {
        self.hierarchy
            .current_parent()
            .map(|top| self.route_into(top))
    }

    /// Parent for controls and view/file members
    fn element_parent(&mut self) -> Option<NodeId> {
        match self.current_structure.or(self.current_procedure) {
            Some(node) => Some(self.route_into(node)),
            None => self.scope_target(),
        }
    }

    // ------------------------------------------------------------------------
    // Ranges
    // ------------------------------------------------------------------------

    fn line_end(&self, line: u32) -> Position {
        Position::new(
            line,
            self.lines.line_end_column(self.tokens, line).unwrap_or(0),
        )
    }

    fn line_start(&self, line: u32, fallback: u32) -> Position {
        let column = self
            .lines
            .first_on_line(line)
            .map_or(fallback, |first| self.tokens[first].start);
        Position::new(line, column)
    }

    /// From the start of the token's line to the end of its closing line
    fn block_range(&self, idx: usize, finishes_at: Option<u32>) -> Range {
        let token = &self.tokens[idx];
        let end_line = finishes_at
            .filter(|line| *line >= token.line)
            .unwrap_or(token.line);
        Range::new(
            self.line_start(token.line, token.start),
            self.line_end(end_line),
        )
    }

    /// From the start of the token's line to the end of its logical line
    fn statement_range(&self, idx: usize) -> Range {
        let token = &self.tokens[idx];
        let end = logical_line_end(self.tokens, idx);
        let last = &self.tokens[end.saturating_sub(1).max(idx)];
        Range::new(
            self.line_start(token.line, token.start),
            Position::new(last.line, last.end()),
        )
    }

    /// Span of the line label in front of the token, or the token itself
    fn selection_range(&self, idx: usize) -> Range {
        let token = &self.tokens[idx];
        match line_label(self.tokens, &self.lines, idx) {
            Some(label) => {
                let first = &self.tokens[label.index];
                let last = &self.tokens[idx - 1];
                Range::new(
                    Position::new(first.line, first.start),
                    Position::new(last.line, last.end()),
                )
            }
            None => token_range(token),
        }
    }

    fn label_of(&self, idx: usize) -> Option<String> {
        self.tokens[idx]
            .label
            .clone()
            .or_else(|| line_label(self.tokens, &self.lines, idx).map(|label| label.text))
    }

    // ------------------------------------------------------------------------
    // Structures
    // ------------------------------------------------------------------------

    fn handle_structure(&mut self, idx: usize) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        if is_one_of(token, NON_SYMBOL_KEYWORDS) {
            self.open_blocks.push(token);
            return;
        }
        if is_module_attribute(tokens, idx) {
            return;
        }
        if let Some(node) = self.prebuilt.remove(&idx) {
            self.push_scope(node, token.finishes_at);
            return;
        }

        let header = StructureHeader::read(tokens, idx);
        let label = self.label_of(idx);
        let kind = structure_kind(&token.value);
        let name = label.clone().unwrap_or_else(|| header.unlabeled_name());
        let meta = ClarionSymbolMeta {
            finishes_at: token.finishes_at,
            clarion_prefix: header.prefix.clone(),
            clarion_label: label.clone(),
            is_interface: kind == ClarionSymbolKind::Interface,
            ..Default::default()
        };

        let parent = self.scope_target();
        let node = SymbolNode::new(name, header.signature.clone(), kind, self.block_range(idx, token.finishes_at))
            .with_selection_range(self.selection_range(idx))
            .with_meta(meta);
        let node = self.tree.add(parent, node);

        match token.value.to_ascii_uppercase().as_str() {
            "CLASS" => {
                self.tree.ensure_container(node, ContainerName::Properties);
                self.tree.ensure_container(node, ContainerName::Methods);
                if let Some(label) = &label {
                    self.classes.insert(label.to_ascii_uppercase(), node);
                }
            }
            "INTERFACE" => {
                if let Some(label) = &label {
                    self.classes.insert(label.to_ascii_uppercase(), node);
                }
            }
            "MAP" | "MODULE" => {
                self.tree.ensure_container(node, ContainerName::Functions);
            }
            "FILE" => self.walk_file(idx, node),
            "VIEW" => self.walk_view(idx, node),
            _ => {}
        }

        trace!(name = %self.tree.get(node).name, line = token.line, "Structure");
        self.push_scope(node, token.finishes_at);
    }

    /// Surface KEY/INDEX/RECORD/MEMO/BLOB declarations of a FILE
    fn walk_file(&mut self, idx: usize, file: NodeId) {
        let tokens = self.tokens;
        let end = block_end(tokens, idx);
        for j in idx + 1..end {
            let token = &tokens[j];
            if token.token_type == TokenType::Structure && token.value_is("RECORD") {
                let header = StructureHeader::read(tokens, j);
                let label = self.label_of(j);
                let meta = ClarionSymbolMeta {
                    finishes_at: token.finishes_at,
                    clarion_prefix: header.prefix.clone(),
                    clarion_label: label.clone(),
                    ..Default::default()
                };
                let record = SymbolNode::new(
                    label.unwrap_or_else(|| header.unlabeled_name()),
                    header.signature,
                    ClarionSymbolKind::Structure,
                    self.block_range(j, token.finishes_at),
                )
                .with_selection_range(self.selection_range(j))
                .with_meta(meta);
                let record = self.tree.add(Some(file), record);
                self.prebuilt.insert(j, record);
            } else if (token.value_is("KEY") || token.value_is("INDEX"))
                && is_line_head(tokens, &self.lines, j)
            {
                let key = self.key_node(j);
                self.tree.add(Some(file), key);
                self.handled.insert(j);
            } else if (token.value_is("MEMO") || token.value_is("BLOB"))
                && is_line_head(tokens, &self.lines, j)
            {
                let label = self.label_of(j);
                let text = line_tail(tokens, j);
                let meta = ClarionSymbolMeta {
                    clarion_var_name: label.clone(),
                    clarion_type: Some(text.clone()),
                    is_part_of_structure: true,
                    ..Default::default()
                };
                let name = match &label {
                    Some(label) => format!("{label}  {text}"),
                    None => text.clone(),
                };
                let field = SymbolNode::new(name, text, ClarionSymbolKind::Field, self.statement_range(j))
                    .with_selection_range(self.selection_range(j))
                    .with_meta(meta);
                self.tree.add(Some(file), field);
                self.handled.insert(j);
            }
        }
    }

    /// Build the JOIN/PROJECT nesting of a VIEW
    fn walk_view(&mut self, idx: usize, view: NodeId) {
        let tokens = self.tokens;
        let end = block_end(tokens, idx);
        let mut joins = vec![view];
        for j in idx + 1..end {
            let token = &tokens[j];
            let parent = joins.last().copied().unwrap_or(view);
            if token.token_type == TokenType::Structure && token.value_is("JOIN") {
                let header = StructureHeader::read(tokens, j);
                let meta = ClarionSymbolMeta {
                    finishes_at: token.finishes_at,
                    ..Default::default()
                };
                let join = SymbolNode::new(
                    header.unlabeled_name(),
                    header.signature,
                    ClarionSymbolKind::Structure,
                    self.block_range(j, token.finishes_at),
                )
                .with_selection_range(token_range(token))
                .with_meta(meta);
                joins.push(self.tree.add(Some(parent), join));
                self.handled.insert(j);
            } else if token.value_is("PROJECT") {
                let project = SymbolNode::new(
                    project_display(tokens, j),
                    "",
                    ClarionSymbolKind::Field,
                    self.statement_range(j),
                )
                .with_selection_range(token_range(token));
                self.tree.add(Some(parent), project);
                self.handled.insert(j);
            } else if token.token_type == TokenType::EndStatement && joins.len() > 1 {
                joins.pop();
                self.handled.insert(j);
            }
        }
    }

    fn key_node(&self, idx: usize) -> SymbolNode {
        let label = line_label(self.tokens, &self.lines, idx).map(|label| label.text);
        let (name, fields) = key_display(self.tokens, idx, label.as_deref());
        let meta = ClarionSymbolMeta {
            clarion_label: label,
            ..Default::default()
        };
        SymbolNode::new(name, fields, ClarionSymbolKind::Key, self.statement_range(idx))
            .with_selection_range(self.selection_range(idx))
            .with_meta(meta)
    }

    // ------------------------------------------------------------------------
    // Controls, PROJECT, KEY
    // ------------------------------------------------------------------------

    fn handle_window_element(&mut self, idx: usize) {
        let (name, detail) = window_element_display(self.tokens, idx);
        let node = SymbolNode::new(name, detail, ClarionSymbolKind::Control, self.statement_range(idx))
            .with_selection_range(token_range(&self.tokens[idx]));
        let parent = self.element_parent();
        self.tree.add(parent, node);
    }

    fn handle_project(&mut self, idx: usize) {
        let node = SymbolNode::new(
            project_display(self.tokens, idx),
            "",
            ClarionSymbolKind::Field,
            self.statement_range(idx),
        )
        .with_selection_range(token_range(&self.tokens[idx]));
        let parent = self.element_parent();
        self.tree.add(parent, node);
    }

    fn handle_key(&mut self, idx: usize) {
        // KEY(...) on a control line is an attribute, not a declaration
        if !is_line_head(self.tokens, &self.lines, idx) {
            return;
        }
        let node = self.key_node(idx);
        let parent = match self.current_structure {
            Some(structure) => Some(self.route_into(structure)),
            None => self.scope_target(),
        };
        self.tree.add(parent, node);
    }

    // ------------------------------------------------------------------------
    // Procedures and methods
    // ------------------------------------------------------------------------

    fn handle_procedure(&mut self, idx: usize) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        let name = self.label_of(idx).unwrap_or_else(|| token.value.clone());

        let is_body = match token.sub_type {
            Some(TokenSubType::GlobalProcedure | TokenSubType::MethodImplementation) => true,
            Some(sub_type) if sub_type.is_declaration() => false,
            _ => !self.inside_definition_block,
        };
        if !is_body {
            self.handle_declaration(idx, name);
            return;
        }

        let explicit_global = token.sub_type == Some(TokenSubType::GlobalProcedure);
        match name.split_once('.') {
            Some((class_name, method_name)) if !explicit_global => {
                self.handle_method_implementation(idx, class_name, method_name)
            }
            _ => self.handle_procedure_body(idx, name, explicit_global),
        }
    }

    fn handle_procedure_body(&mut self, idx: usize, name: String, explicit_global: bool) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        let global = explicit_global || self.current_structure.is_none();

        let parent = if global {
            let closed = self.hierarchy.clear();
            self.close(closed, self.previous_line);
            self.last_method_implementation = None;
            self.current_class_implementation = None;
            self.sync_scope();
            None
        } else {
            self.current_structure
        };

        let meta = ClarionSymbolMeta {
            is_global_procedure: global,
            finishes_at: token.finishes_at,
            clarion_label: Some(name.clone()),
            ..Default::default()
        };
        let display = format!("{} {}", name, procedure_params(tokens, idx));
        let node = SymbolNode::new(
            display,
            line_tail(tokens, idx),
            ClarionSymbolKind::Procedure,
            self.block_range(idx, token.finishes_at),
        )
        .with_selection_range(self.selection_range(idx))
        .with_meta(meta);
        let node = self.tree.add(parent, node);

        trace!(name = %name, global, line = token.line, "Procedure");
        self.reset_procedure_state();
        self.push_scope(node, token.finishes_at);
    }

    fn handle_method_implementation(&mut self, idx: usize, class_name: &str, method_name: &str) {
        let tokens = self.tokens;
        let token = &tokens[idx];

        // Implementations never nest
        let closed = self.hierarchy.remove_method_implementations();
        self.close(closed, self.previous_line);
        self.sync_scope();

        let declared_class = self
            .classes
            .get(&class_name.to_ascii_uppercase())
            .copied()
            .or_else(|| SymbolFinder::new(&self.tree).find_class_definition(class_name))
            .filter(|class| {
                SymbolFinder::new(&self.tree)
                    .find_method_declaration(*class, method_name)
                    .is_some()
            });

        let (owner, detail) = match declared_class {
            Some(class) => (class, "Implementation".to_string()),
            None => {
                let existing = SymbolFinder::new(&self.tree).find_implementation_container(class_name);
                let container = match existing {
                    Some(container) => container,
                    None => {
                        let meta = ClarionSymbolMeta {
                            clarion_label: Some(class_name.to_string()),
                            ..Default::default()
                        };
                        let container = SymbolNode::new(
                            format!("{class_name}{IMPLEMENTATION_SUFFIX}"),
                            "",
                            ClarionSymbolKind::Class,
                            self.block_range(idx, None),
                        )
                        .with_selection_range(self.selection_range(idx))
                        .with_meta(meta);
                        self.tree.add(None, container)
                    }
                };
                (container, format!("{class_name}.{method_name}"))
            }
        };
        let methods = self.tree.ensure_container(owner, ContainerName::Methods);

        let meta = ClarionSymbolMeta {
            is_method_implementation: true,
            finishes_at: token.finishes_at,
            clarion_label: Some(format!("{class_name}.{method_name}")),
            ..Default::default()
        };
        let display = format!("{} {}", method_name, procedure_params(tokens, idx));
        let node = SymbolNode::new(
            display,
            detail,
            ClarionSymbolKind::Method,
            self.block_range(idx, token.finishes_at),
        )
        .with_selection_range(self.selection_range(idx))
        .with_meta(meta);
        let node = self.tree.add(Some(methods), node);

        trace!(class = class_name, method = method_name, line = token.line, "Method implementation");
        self.has_method_implementations = true;
        self.last_method_implementation = Some(node);
        self.current_class_implementation = Some(owner);
        self.reset_procedure_state();
        self.push_scope(node, token.finishes_at);
    }

    /// Prototype inside CLASS, INTERFACE, MAP or MODULE
    fn handle_declaration(&mut self, idx: usize, name: String) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        let owner = self
            .hierarchy
            .innermost(|entry| {
                matches!(
                    self.tree.get(entry.node).kind,
                    ClarionSymbolKind::Class
                        | ClarionSymbolKind::Interface
                        | ClarionSymbolKind::Module
                )
            })
            .map(|entry| entry.node);

        let mut meta = ClarionSymbolMeta {
            clarion_label: Some(name.clone()),
            ..Default::default()
        };
        let (parent, kind) = match owner.map(|node| (node, self.tree.get(node).kind)) {
            Some((class, ClarionSymbolKind::Class)) => {
                meta.is_method_declaration = true;
                (
                    Some(self.tree.ensure_container(class, ContainerName::Methods)),
                    ClarionSymbolKind::Method,
                )
            }
            Some((interface, ClarionSymbolKind::Interface)) => {
                meta.is_method_declaration = true;
                (Some(interface), ClarionSymbolKind::Method)
            }
            Some((module, _)) => {
                meta.is_map_procedure = true;
                (
                    Some(self.tree.ensure_container(module, ContainerName::Functions)),
                    ClarionSymbolKind::Procedure,
                )
            }
            None => {
                meta.is_map_procedure = token.sub_type == Some(TokenSubType::MapProcedure);
                meta.is_method_declaration = matches!(
                    token.sub_type,
                    Some(TokenSubType::MethodDeclaration | TokenSubType::InterfaceMethod)
                );
                (self.current_structure, ClarionSymbolKind::Procedure)
            }
        };

        let node = SymbolNode::new(name, line_tail(self.tokens, idx), kind, self.statement_range(idx))
            .with_selection_range(self.selection_range(idx))
            .with_meta(meta);
        self.tree.add(parent, node);
    }

    // ------------------------------------------------------------------------
    // Routines, markers, END
    // ------------------------------------------------------------------------

    fn handle_routine(&mut self, idx: usize) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        let name = self
            .label_of(idx)
            .or_else(|| {
                idx.checked_sub(1)
                    .map(|prev| &tokens[prev])
                    .filter(|prev| prev.token_type == TokenType::Label)
                    .map(|prev| prev.value.clone())
            })
            .unwrap_or_else(|| token.value.clone());
        let special = name.contains("::");

        // A new routine ends the previous one
        let closed = self
            .hierarchy
            .split_from(|entry| self.tree.get(entry.node).kind == ClarionSymbolKind::Routine);
        self.close(closed, self.previous_line);
        self.sync_scope();

        let parent = self
            .hierarchy
            .innermost(|entry| self.tree.get(entry.node).kind.is_callable())
            .map(|entry| entry.node)
            .or_else(|| self.routine_owner_from_tokens(idx))
            .or_else(|| SymbolFinder::new(&self.tree).find_last_global_procedure());

        let meta = ClarionSymbolMeta {
            is_special_routine: special,
            finishes_at: token.finishes_at,
            clarion_label: Some(name.clone()),
            ..Default::default()
        };
        let node = SymbolNode::new(
            name,
            "ROUTINE",
            ClarionSymbolKind::Routine,
            self.block_range(idx, token.finishes_at),
        )
        .with_selection_range(self.selection_range(idx))
        .with_meta(meta);
        let node = self.tree.add(parent, node);

        // Routine bodies are executable until a DATA marker
        self.past_code_statement = true;
        if special || token.finishes_at.is_some() {
            self.push_scope(node, token.finishes_at);
        }
    }

    /// Method implementation that lexically precedes a routine
    fn routine_owner_from_tokens(&self, idx: usize) -> Option<NodeId> {
        let procedure = self.tokens[..idx].iter().rev().find(|token| {
            token.token_type == TokenType::Procedure
                && !token.sub_type.is_some_and(TokenSubType::is_declaration)
        })?;
        let label = procedure.label.as_deref()?;
        let (class_name, method_name) = label.split_once('.')?;
        SymbolFinder::new(&self.tree).find_method_implementation(class_name, method_name)
    }

    fn handle_execution_marker(&mut self, idx: usize) {
        let tokens = self.tokens;
        let token = &tokens[idx];
        if token.value_is("DATA") {
            self.past_code_statement = false;
            return;
        }
        if !token.value_is("CODE") {
            return;
        }

        self.past_code_statement = true;
        let owner = self
            .hierarchy
            .innermost(|entry| {
                let kind = self.tree.get(entry.node).kind;
                kind.is_callable() || kind == ClarionSymbolKind::Routine
            })
            .map(|entry| entry.node);
        let Some(owner) = owner else {
            return;
        };

        let marker = SymbolNode::new("CODE", "", ClarionSymbolKind::Marker, token_range(token));
        self.tree.add(Some(owner), marker);
        if self.tree.get(owner).kind == ClarionSymbolKind::Method {
            self.code_cleared_procedure = Some(owner);
            self.sync_scope();
        }
    }

    fn handle_loop_terminator(&mut self, idx: usize) {
        if let Some(opener) = self.open_blocks.last()
            && closes_block(self.tokens, idx, opener)
        {
            self.open_blocks.pop();
        }
    }

    fn handle_end(&mut self, idx: usize) {
        if self.open_blocks.pop().is_some() {
            return;
        }
        let token = &self.tokens[idx];
        let end = Position::new(token.line, token.end());
        // Procedures, methods and routines have no END of their own
        let tree = &self.tree;
        let popped = self.hierarchy.pop_if_open_ended(|entry| {
            let kind = tree.get(entry.node).kind;
            !kind.is_callable() && kind != ClarionSymbolKind::Routine
        });
        if let Some(entry) = popped {
            self.tree.extend_range_to(entry.node, end);
            self.sync_scope();
        }
    }

    // ------------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------------

    fn handle_variable(&mut self, idx: usize) {
        if self.past_code_statement || idx == 0 {
            return;
        }
        let tokens = self.tokens;
        let token = &tokens[idx];
        let prev = &tokens[idx - 1];
        if prev.line != token.line
            || !matches!(
                prev.token_type,
                TokenType::Label | TokenType::StructurePrefix | TokenType::Variable
            )
        {
            return;
        }

        let rejoin = prev.token_type == TokenType::StructurePrefix
            && prev.value.starts_with(':')
            && idx >= 2
            && tokens[idx - 2].line == token.line
            && tokens[idx - 2].token_type == TokenType::Label;
        let (var_name, label_idx) = if rejoin {
            (format!("{}{}", tokens[idx - 2].value, prev.value), idx - 2)
        } else {
            (prev.value.clone(), idx - 1)
        };
        if self.lines.first_on_line(token.line) != Some(label_idx) {
            return;
        }
        // Parameters of a PROCEDURE prototype are not declarations
        if tokens[label_idx..idx]
            .iter()
            .any(|t| t.token_type == TokenType::Procedure)
        {
            return;
        }

        let end = logical_line_end(tokens, idx);
        let declaration = &tokens[idx..end];
        let clarion_type = split_top_level_commas(declaration)
            .first()
            .map(|part| render_tokens(part))
            .unwrap_or_default();
        let detail = render_tokens(declaration);

        let (parent, kind, structure) = self.variable_home();
        let mut meta = ClarionSymbolMeta {
            clarion_type: Some(clarion_type.clone()),
            clarion_var_name: Some(var_name.clone()),
            ..Default::default()
        };
        if let Some(structure) = structure {
            meta.is_part_of_structure = kind == ClarionSymbolKind::Field;
            meta.possible_references =
                self.possible_references(structure, &var_name, token.structure_prefix.as_deref());
        }

        let label = &tokens[label_idx];
        let selection = Range::new(
            Position::new(label.line, label.start),
            Position::new(prev.line, prev.end()),
        );
        let node = SymbolNode::new(
            format!("{var_name}  {clarion_type}"),
            detail,
            kind,
            self.statement_range(idx),
        )
        .with_selection_range(selection)
        .with_meta(meta);
        self.tree.add(parent, node);
    }

    /// Parent, kind, and owning structure for a data declaration
    ///
    /// The innermost open scope wins, skipping special routines. With nothing
    /// open: current procedure, last method implementation, current
    /// structure, last global procedure, then the root.
    fn variable_home(&mut self) -> (Option<NodeId>, ClarionSymbolKind, Option<NodeId>) {
        let innermost = self
            .hierarchy
            .innermost(|entry| entry.kind != ScopeKind::SpecialRoutine)
            .map(|entry| entry.node);

        if let Some(scope) = innermost {
            let kind = self.tree.get(scope).kind;
            return match kind {
                ClarionSymbolKind::Class => (
                    Some(self.tree.ensure_container(scope, ContainerName::Properties)),
                    ClarionSymbolKind::Property,
                    Some(scope),
                ),
                ClarionSymbolKind::Procedure
                | ClarionSymbolKind::Method
                | ClarionSymbolKind::Routine => (Some(scope), ClarionSymbolKind::Variable, None),
                _ => (Some(scope), ClarionSymbolKind::Field, Some(scope)),
            };
        }

        let fallback = self
            .current_procedure
            .or(self.last_method_implementation)
            .or(self.current_structure)
            .or_else(|| SymbolFinder::new(&self.tree).find_last_global_procedure());
        (fallback, ClarionSymbolKind::Variable, None)
    }

    /// `PREFIX:NAME` and `LABEL.NAME` spellings, upper-cased
    fn possible_references(
        &self,
        structure: NodeId,
        var_name: &str,
        token_prefix: Option<&str>,
    ) -> Vec<String> {
        let mut references = Vec::new();
        let prefix = token_prefix
            .map(|prefix| prefix.trim_end_matches(':').to_string())
            .or_else(|| self.inherited_prefix(structure));
        if let Some(prefix) = prefix
            && !var_name.contains(':')
        {
            references.push(format!("{prefix}:{var_name}").to_uppercase());
        }
        if let Some(label) = &self.tree.get(structure).meta.clarion_label {
            references.push(format!("{label}.{var_name}").to_uppercase());
        }
        references
    }

    fn inherited_prefix(&self, structure: NodeId) -> Option<String> {
        let node = self.tree.get(structure);
        if let Some(prefix) = &node.meta.clarion_prefix {
            return Some(prefix.clone());
        }
        self.tree
            .ancestor_where(structure, |ancestor| ancestor.meta.clarion_prefix.is_some())
            .and_then(|ancestor| self.tree.get(ancestor).meta.clarion_prefix.clone())
    }
}

fn token_range(token: &Token) -> Range {
    Range::new(
        Position::new(token.line, token.start),
        Position::new(token.line, token.end()),
    )
}
