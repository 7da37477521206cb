//! Line-oriented helpers over an ordered token slice
//!
//! Clarion statements are line based: a statement may only continue onto the
//! next physical line when the last significant token of the current line is
//! the `|` continuation marker. All bounded scanners in the outline builder go
//! through [`continuation_allows`] so that rule lives in one place.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::token::Token;

// ============================================================================
// Line Index
// ============================================================================

/// Maps each line to the contiguous index range of its tokens
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lines: BTreeMap<u32, Range<usize>>,
}

impl LineIndex {
    /// Build the index; tokens must be ordered by line
    pub fn build(tokens: &[Token]) -> Self {
        let mut lines: BTreeMap<u32, Range<usize>> = BTreeMap::new();
        for (idx, token) in tokens.iter().enumerate() {
            lines
                .entry(token.line)
                .and_modify(|range| range.end = idx + 1)
                .or_insert(idx..idx + 1);
        }
        Self { lines }
    }

    pub fn range(&self, line: u32) -> Option<Range<usize>> {
        self.lines.get(&line).cloned()
    }

    pub fn tokens_on_line<'a>(&self, tokens: &'a [Token], line: u32) -> &'a [Token] {
        match self.lines.get(&line) {
            Some(range) => &tokens[range.clone()],
            None => &[],
        }
    }

    /// Index of the first token on the given line
    pub fn first_on_line(&self, line: u32) -> Option<usize> {
        self.lines.get(&line).map(|range| range.start)
    }

    /// Column just past the last token on the line
    pub fn line_end_column(&self, tokens: &[Token], line: u32) -> Option<u32> {
        self.lines
            .get(&line)
            .and_then(|range| tokens.get(range.end - 1))
            .map(Token::end)
    }

    /// Last line holding any token
    pub fn last_line(&self) -> Option<u32> {
        self.lines.keys().next_back().copied()
    }
}

// ============================================================================
// Continuation Rule
// ============================================================================

/// Position of a bounded scan: the physical line it is on and the last
/// significant (non-comment) token seen on that line
#[derive(Debug, Clone, Copy)]
pub struct LineCursor<'a> {
    line: u32,
    last: Option<&'a Token>,
}

impl<'a> LineCursor<'a> {
    pub fn at(token: &'a Token) -> Self {
        Self {
            line: token.line,
            last: (!token.is_comment()).then_some(token),
        }
    }

    pub fn advance(&mut self, token: &'a Token) {
        if token.line != self.line {
            self.line = token.line;
            self.last = None;
        }
        if !token.is_comment() {
            self.last = Some(token);
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

/// Whether a scan positioned at `cursor` may consume `next`
///
/// Same-line tokens are always allowed. Moving to the following line requires
/// the cursor line to end with `|`.
pub fn continuation_allows(cursor: &LineCursor<'_>, next: &Token) -> bool {
    if next.line == cursor.line {
        return true;
    }
    next.line == cursor.line + 1 && cursor.last.is_some_and(Token::is_continuation)
}

/// Exclusive end index of the logical line starting at `start`
pub fn logical_line_end(tokens: &[Token], start: usize) -> usize {
    let Some(first) = tokens.get(start) else {
        return start;
    };
    let mut cursor = LineCursor::at(first);
    let mut idx = start + 1;
    while let Some(next) = tokens.get(idx) {
        if !continuation_allows(&cursor, next) {
            break;
        }
        cursor.advance(next);
        idx += 1;
    }
    idx
}

// ============================================================================
// Parenthesis Scanning
// ============================================================================

/// Index of the `)` matching the `(` at `open`, bounded by `limit`
pub fn matching_paren(tokens: &[Token], open: usize, limit: usize) -> Option<usize> {
    if !tokens.get(open).is_some_and(Token::is_open_paren) {
        return None;
    }
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().take(limit).skip(open) {
        if token.is_open_paren() {
            depth += 1;
        } else if token.is_close_paren() {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Split a token run at commas that are not nested inside parentheses
pub fn split_top_level_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut part_start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        if token.is_open_paren() {
            depth += 1;
        } else if token.is_close_paren() {
            depth -= 1;
        } else if token.is_comma() && depth <= 0 {
            parts.push(&tokens[part_start..idx]);
            part_start = idx + 1;
        }
    }
    parts.push(&tokens[part_start..]);
    parts
}

/// Find `NAME(...)` inside `tokens[from..to]` at parenthesis depth zero and
/// return the rendered inner text
pub fn find_attribute(tokens: &[Token], from: usize, to: usize, name: &str) -> Option<String> {
    let to = to.min(tokens.len());
    let mut depth = 0i32;
    let mut idx = from;
    while idx < to {
        let token = &tokens[idx];
        if token.is_open_paren() {
            depth += 1;
        } else if token.is_close_paren() {
            depth -= 1;
        } else if depth == 0 && token.value_is(name) {
            let open = idx + 1;
            if let Some(close) = matching_paren(tokens, open, to) {
                return Some(render_tokens(&tokens[open + 1..close]));
            }
        }
        idx += 1;
    }
    None
}

// ============================================================================
// Rendering
// ============================================================================

/// Reassemble source text from tokens
///
/// Gaps between same-line tokens collapse to a single space; continuation
/// markers and comments are dropped.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut text = String::new();
    let mut previous: Option<&Token> = None;
    for token in tokens {
        if token.is_comment() || token.is_continuation() {
            continue;
        }
        if let Some(prev) = previous {
            let gap = prev.line != token.line || token.start > prev.end();
            if gap && !text.ends_with(' ') {
                text.push(' ');
            }
        }
        text.push_str(&token.value);
        previous = Some(token);
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn tok(token_type: TokenType, value: &str, line: u32, start: u32) -> Token {
        Token::new(token_type, value, line, start)
    }

    #[test]
    fn test_line_index_ranges() {
        let tokens = vec![
            tok(TokenType::Label, "A", 0, 0),
            tok(TokenType::Type, "LONG", 0, 4),
            tok(TokenType::Label, "B", 2, 0),
        ];
        let index = LineIndex::build(&tokens);
        assert_eq!(index.range(0), Some(0..2));
        assert_eq!(index.range(1), None);
        assert_eq!(index.tokens_on_line(&tokens, 2).len(), 1);
        assert_eq!(index.line_end_column(&tokens, 0), Some(8));
        assert_eq!(index.last_line(), Some(2));
    }

    #[test]
    fn test_continuation_requires_pipe_on_previous_line() {
        let tokens = vec![
            tok(TokenType::WindowElement, "BUTTON", 0, 2),
            tok(TokenType::LineContinuation, "|", 0, 10),
            tok(TokenType::Comment, "! trailing", 0, 12),
            tok(TokenType::Attribute, "USE", 1, 4),
            tok(TokenType::WindowElement, "ENTRY", 2, 2),
        ];
        // `|` followed by a comment still continues; line 1 has no marker
        assert_eq!(logical_line_end(&tokens, 0), 4);
    }

    #[test]
    fn test_continuation_does_not_skip_lines() {
        let first = tok(TokenType::LineContinuation, "|", 0, 10);
        let cursor = LineCursor::at(&first);
        assert!(continuation_allows(&cursor, &tok(TokenType::Attribute, "AT", 1, 2)));
        assert!(!continuation_allows(&cursor, &tok(TokenType::Attribute, "AT", 2, 2)));
    }

    #[test]
    fn test_render_and_split() {
        let tokens = vec![
            tok(TokenType::Type, "long", 0, 3),
            tok(TokenType::Delimiter, ",", 0, 7),
            tok(TokenType::Attribute, "auto", 0, 9),
        ];
        assert_eq!(render_tokens(&tokens), "long, auto");
        let parts = split_top_level_commas(&tokens);
        assert_eq!(parts.len(), 2);
        assert_eq!(render_tokens(parts[0]), "long");
    }

    #[test]
    fn test_find_attribute_respects_depth() {
        let tokens = vec![
            tok(TokenType::Structure, "GROUP", 0, 2),
            tok(TokenType::Delimiter, ",", 0, 7),
            tok(TokenType::Attribute, "OVER", 0, 8),
            tok(TokenType::Delimiter, "(", 0, 12),
            tok(TokenType::Variable, "bits", 0, 13),
            tok(TokenType::Delimiter, ")", 0, 17),
        ];
        assert_eq!(find_attribute(&tokens, 1, tokens.len(), "OVER").as_deref(), Some("bits"));
        assert_eq!(find_attribute(&tokens, 1, tokens.len(), "PRE"), None);
        assert_eq!(matching_paren(&tokens, 3, tokens.len()), Some(5));
    }
}
