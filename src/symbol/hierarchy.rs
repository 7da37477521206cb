//! Open-scope stack with lazy, line-driven closing
//!
//! Scopes are pushed as the provider meets their opening token and are only
//! closed when the scan reaches a line past their recorded `finishes_at`, when
//! a new global procedure starts, or when a new method implementation begins.
//! The closing decision itself is [`pop_completed`], a pure function over the
//! stack so it can be tested without any token scanning.

use crate::token::{Token, TokenSubType, TokenType};

use super::symbol::ClarionSymbolKind;
use super::tree::{NodeId, SymbolNode};

/// How an open scope takes part in the closing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    GlobalProcedure,
    MethodImplementation,
    OrdinaryStructure,
    SpecialRoutine,
}

/// Classify a node about to be pushed
///
/// A procedure counts as global when flagged so, or when it is neither a
/// method implementation nor a dotted `Class.Method` name.
pub fn classify_scope(node: &SymbolNode) -> ScopeKind {
    if node.meta.is_method_implementation {
        ScopeKind::MethodImplementation
    } else if node.meta.is_special_routine {
        ScopeKind::SpecialRoutine
    } else if node.kind == ClarionSymbolKind::Procedure
        && (node.meta.is_global_procedure || !node.name.contains('.'))
    {
        ScopeKind::GlobalProcedure
    } else {
        ScopeKind::OrdinaryStructure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEntry {
    pub node: NodeId,
    pub finishes_at: Option<u32>,
    pub kind: ScopeKind,
}

/// Result of the closing policy: how many entries survive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopDecision {
    pub keep: usize,
    pub closed_global_procedure: bool,
}

/// Decide which scopes are closed once the scan reaches `current_line`
///
/// 1. A line that starts a new global procedure truncates the stack at the
///    most recent global procedure entry, closing it and everything above it.
/// 2. Otherwise the lowest entry whose `finishes_at` is before `current_line`
///    closes together with every scope nested above it. While the document
///    has method implementations, global procedure entries are exempt from
///    this rule and nothing below them is considered.
pub fn pop_completed(
    stack: &[StackEntry],
    current_line: u32,
    starts_global_procedure: bool,
    has_method_implementations: bool,
) -> PopDecision {
    let mut keep = stack.len();

    if starts_global_procedure
        && let Some(global) = stack
            .iter()
            .rposition(|entry| entry.kind == ScopeKind::GlobalProcedure)
    {
        keep = global;
    }

    let floor = if has_method_implementations {
        stack[..keep]
            .iter()
            .rposition(|entry| entry.kind == ScopeKind::GlobalProcedure)
            .map_or(0, |protected| protected + 1)
    } else {
        0
    };

    if let Some(offset) = stack[floor..keep]
        .iter()
        .position(|entry| entry.finishes_at.is_some_and(|line| line < current_line))
    {
        keep = floor + offset;
    }

    PopDecision {
        keep,
        closed_global_procedure: starts_global_procedure,
    }
}

/// Entries closed on a line advance
#[derive(Debug, Default)]
pub struct PopOutcome {
    pub closed: Vec<StackEntry>,
    pub closed_global_procedure: bool,
}

/// Stack of open scopes for one provider pass
#[derive(Debug, Default)]
pub struct HierarchyManager {
    stack: Vec<StackEntry>,
}

impl HierarchyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId, finishes_at: Option<u32>, kind: ScopeKind) {
        self.stack.push(StackEntry {
            node,
            finishes_at,
            kind,
        });
    }

    /// Top of the stack
    pub fn current_parent(&self) -> Option<NodeId> {
        self.stack.last().map(|entry| entry.node)
    }

    /// Open scopes, outermost first
    pub fn entries(&self) -> &[StackEntry] {
        &self.stack
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Apply the closing policy for the first token on `current_line`
    pub fn check_and_pop_completed_structures(
        &mut self,
        current_line: u32,
        line_tokens: &[Token],
        has_method_implementations: bool,
    ) -> PopOutcome {
        let starts_global_procedure = line_tokens.iter().any(|token| {
            token.token_type == TokenType::Procedure
                && token.sub_type == Some(TokenSubType::GlobalProcedure)
        });
        let decision = pop_completed(
            &self.stack,
            current_line,
            starts_global_procedure,
            has_method_implementations,
        );
        PopOutcome {
            closed: self.stack.split_off(decision.keep),
            closed_global_procedure: decision.closed_global_procedure,
        }
    }

    /// Close every open method implementation and anything nested inside it
    pub fn remove_method_implementations(&mut self) -> Vec<StackEntry> {
        self.split_from(|entry| entry.kind == ScopeKind::MethodImplementation)
    }

    /// Remove the outermost entry matching `predicate` and everything above it
    pub fn split_from(&mut self, predicate: impl Fn(&StackEntry) -> bool) -> Vec<StackEntry> {
        match self.stack.iter().position(predicate) {
            Some(first) => self.stack.split_off(first),
            None => Vec::new(),
        }
    }

    /// Pop the top entry when it has no recorded closing line and an END
    /// statement can close it
    pub fn pop_if_open_ended(
        &mut self,
        closes_on_end: impl Fn(&StackEntry) -> bool,
    ) -> Option<StackEntry> {
        match self.stack.last() {
            Some(top) if top.finishes_at.is_none() && closes_on_end(top) => self.stack.pop(),
            _ => None,
        }
    }

    /// Innermost entry satisfying `predicate`
    pub fn innermost(&self, predicate: impl Fn(&StackEntry) -> bool) -> Option<&StackEntry> {
        self.stack.iter().rev().find(|entry| predicate(entry))
    }

    pub fn clear(&mut self) -> Vec<StackEntry> {
        std::mem::take(&mut self.stack)
    }
}
