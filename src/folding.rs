//! Folding ranges
//!
//! Derived from the same token stream as the outline. Blocks with a known
//! closing line fold to it; the rest are matched against END statements with
//! a single stack, so nesting stays consistent whichever way a block closes.

use lsp_types::{FoldingRange, FoldingRangeKind};
use std::time::Instant;
use tracing::{Level, debug, instrument};

use crate::log_timing;
use crate::token::{Token, TokenType, closes_block, opens_block};

const REGION_START: &str = "region";
const REGION_END: &str = "endregion";

/// Compute folding ranges for a tokenized document
#[instrument(name = "compute_folding_ranges", skip(tokens), fields(tokens = tokens.len()))]
pub fn compute_folding_ranges(tokens: &[Token]) -> Vec<FoldingRange> {
    let start = Instant::now();
    let mut folds = Vec::new();

    block_folds(tokens, &mut folds);
    body_folds(tokens, &mut folds);
    comment_folds(tokens, &mut folds);

    folds.sort_by_key(|fold| (fold.start_line, fold.end_line));
    folds.dedup_by_key(|fold| (fold.start_line, fold.end_line));

    log_timing!(Level::DEBUG, "compute_folding_ranges", start.elapsed());
    debug!(count = folds.len(), "Computed folding ranges");
    folds
}

fn fold(start_line: u32, end_line: u32, kind: FoldingRangeKind) -> Option<FoldingRange> {
    (end_line > start_line).then(|| FoldingRange {
        start_line,
        start_character: None,
        end_line,
        end_character: None,
        kind: Some(kind),
        collapsed_text: None,
    })
}

/// Structures and IF/LOOP/CASE-style blocks
fn block_folds(tokens: &[Token], folds: &mut Vec<FoldingRange>) {
    let mut open: Vec<&Token> = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        if opens_block(tokens, idx) {
            open.push(token);
            continue;
        }
        let Some(opener) = open.last().copied() else {
            continue;
        };
        if !closes_block(tokens, idx, opener) {
            continue;
        }
        open.pop();
        let end_line = opener.finishes_at.unwrap_or(token.line);
        folds.extend(fold(opener.line, end_line, FoldingRangeKind::Region));
    }

    // Unterminated blocks still fold when the tokenizer knows their end
    for opener in open {
        if let Some(end_line) = opener.finishes_at {
            folds.extend(fold(opener.line, end_line, FoldingRangeKind::Region));
        }
    }
}

fn is_body_start(token: &Token) -> bool {
    match token.token_type {
        TokenType::Procedure => !token.sub_type.is_some_and(|sub| sub.is_declaration()),
        TokenType::Routine => true,
        TokenType::Keyword => token.value_is("ROUTINE"),
        _ => false,
    }
}

/// Procedure and routine bodies; open-ended ones run to the next body
fn body_folds(tokens: &[Token], folds: &mut Vec<FoldingRange>) {
    let starts: Vec<&Token> = tokens.iter().filter(|token| is_body_start(token)).collect();
    let Some(last_line) = tokens.last().map(|token| token.line) else {
        return;
    };

    for (n, token) in starts.iter().enumerate() {
        let end_line = match token.finishes_at {
            Some(line) => line,
            None => starts[n + 1..]
                .iter()
                .map(|next| next.line)
                .find(|line| *line > token.line)
                .map_or(last_line, |line| line - 1),
        };
        folds.extend(fold(token.line, end_line, FoldingRangeKind::Region));
    }
}

/// Text of a comment with the `!` markers and surrounding space removed
fn comment_text(token: &Token) -> &str {
    token.value.trim_start_matches('!').trim()
}

fn is_region_marker(text: &str, marker: &str) -> bool {
    text.get(..marker.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(marker))
}

/// Comment runs and `!region` / `!endregion` pairs
fn comment_folds(tokens: &[Token], folds: &mut Vec<FoldingRange>) {
    let mut regions: Vec<u32> = Vec::new();
    let mut run: Option<(u32, u32)> = None;
    let mut previous_line: Option<u32> = None;

    for token in tokens {
        let full_line = previous_line != Some(token.line);
        previous_line = Some(token.line);
        if !token.is_comment() || !full_line {
            if !token.is_comment() {
                close_run(&mut run, folds);
            }
            continue;
        }

        let text = comment_text(token);
        if is_region_marker(text, REGION_END) {
            close_run(&mut run, folds);
            if let Some(start_line) = regions.pop() {
                folds.extend(fold(start_line, token.line, FoldingRangeKind::Region));
            }
            continue;
        }
        if is_region_marker(text, REGION_START) {
            close_run(&mut run, folds);
            regions.push(token.line);
            continue;
        }

        run = match run {
            Some((first, last)) if token.line == last + 1 => Some((first, token.line)),
            _ => {
                close_run(&mut run, folds);
                Some((token.line, token.line))
            }
        };
    }
    close_run(&mut run, folds);
}

fn close_run(run: &mut Option<(u32, u32)>, folds: &mut Vec<FoldingRange>) {
    if let Some((first, last)) = run.take() {
        folds.extend(fold(first, last, FoldingRangeKind::Comment));
    }
}
