//! Token stream model
//!
//! The tokenizer itself lives in the editor host; this module only describes
//! its output and the line/continuation rules shared by every consumer.

mod line_index;
mod types;

pub use line_index::{
    LineCursor, LineIndex, continuation_allows, find_attribute, logical_line_end, matching_paren,
    render_tokens, split_top_level_commas,
};
pub use types::{ExecutionMarker, Token, TokenSubType, TokenType};

/// Keywords that open a block closed by END but never produce a symbol
pub const FOLDING_ONLY_KEYWORDS: &[&str] = &[
    "IF", "LOOP", "CASE", "BEGIN", "EXECUTE", "ITEMIZE", "ACCEPT",
];

/// Keywords the outline skips outright
pub const NON_SYMBOL_KEYWORDS: &[&str] = &[
    "IF", "LOOP", "CASE", "BEGIN", "EXECUTE", "ITEMIZE", "BREAK", "ACCEPT",
];

/// Whether the token text is one of `keywords`, ignoring case
pub fn is_one_of(token: &Token, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| token.value_is(keyword))
}

/// Whether the token opens a block that END or `.` closes
pub fn opens_block(tokens: &[Token], idx: usize) -> bool {
    let Some(token) = tokens.get(idx) else {
        return false;
    };
    match token.token_type {
        TokenType::Structure => !is_module_attribute(tokens, idx),
        TokenType::Keyword => is_one_of(token, FOLDING_ONLY_KEYWORDS),
        _ => false,
    }
}

/// `UNTIL`/`WHILE` leading its line, the END-less way to close a LOOP
pub fn is_loop_terminator(tokens: &[Token], idx: usize) -> bool {
    let Some(token) = tokens.get(idx) else {
        return false;
    };
    token.token_type == TokenType::Keyword
        && (token.value_is("UNTIL") || token.value_is("WHILE"))
        && idx
            .checked_sub(1)
            .is_none_or(|prev| tokens[prev].line != token.line)
}

/// Whether the token at `idx` closes `opener`, the innermost open block
pub fn closes_block(tokens: &[Token], idx: usize, opener: &Token) -> bool {
    tokens
        .get(idx)
        .is_some_and(|token| token.token_type == TokenType::EndStatement)
        || (opener.value_is("LOOP") && is_loop_terminator(tokens, idx))
}

/// A `MODULE` token that is an attribute of a CLASS line rather than a
/// MAP-level MODULE structure
///
/// Scans backward on the same line: a comma found before any structure token
/// means the MODULE is an attribute.
pub fn is_module_attribute(tokens: &[Token], idx: usize) -> bool {
    let Some(token) = tokens.get(idx) else {
        return false;
    };
    if !token.value_is("MODULE") {
        return false;
    }
    for prev in tokens[..idx].iter().rev() {
        if prev.line != token.line {
            break;
        }
        if prev.is_comma() {
            return true;
        }
        if prev.token_type == TokenType::Structure {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_attribute_detection() {
        let tokens = vec![
            Token::new(TokenType::Label, "MyClass", 0, 0),
            Token::new(TokenType::Structure, "CLASS", 0, 8),
            Token::new(TokenType::Delimiter, ",", 0, 13),
            Token::new(TokenType::Structure, "MODULE", 0, 14),
            Token::new(TokenType::Structure, "MODULE", 1, 2),
        ];
        assert!(is_module_attribute(&tokens, 3));
        assert!(!is_module_attribute(&tokens, 4));
        assert!(!is_module_attribute(&tokens, 1));
    }

    #[test]
    fn test_loop_terminator_must_lead_its_line() {
        let tokens = vec![
            Token::new(TokenType::Keyword, "LOOP", 0, 2),
            Token::new(TokenType::Keyword, "WHILE", 0, 7),
            Token::new(TokenType::Variable, "Done", 0, 13),
            Token::new(TokenType::Keyword, "LOOP", 1, 2),
            Token::new(TokenType::Keyword, "UNTIL", 2, 2),
            Token::new(TokenType::Variable, "Done", 2, 8),
            Token::new(TokenType::EndStatement, "END", 3, 2),
        ];
        assert!(opens_block(&tokens, 0));
        assert!(!is_loop_terminator(&tokens, 1));
        assert!(is_loop_terminator(&tokens, 4));
        assert!(closes_block(&tokens, 4, &tokens[3]));
        assert!(!closes_block(&tokens, 4, &Token::new(TokenType::Keyword, "IF", 1, 2)));
        assert!(closes_block(&tokens, 6, &tokens[0]));
    }
}
