//! Display text for Clarion constructs
//!
//! Every extractor works on a bounded slice: the logical line of the token
//! (continuations included) or, for walk-ahead structures, the block up to
//! its closing line. Nothing here looks at the outline being built.

use crate::token::{
    LineIndex, Token, TokenType, closes_block, find_attribute, logical_line_end, matching_paren,
    opens_block, render_tokens, split_top_level_commas,
};

use super::symbol::ClarionSymbolKind;

/// Outline kind for a structure keyword
pub fn structure_kind(keyword: &str) -> ClarionSymbolKind {
    match keyword.to_ascii_uppercase().as_str() {
        "CLASS" => ClarionSymbolKind::Class,
        "INTERFACE" => ClarionSymbolKind::Interface,
        "MAP" | "MODULE" => ClarionSymbolKind::Module,
        "WINDOW" | "APPLICATION" | "REPORT" => ClarionSymbolKind::Window,
        "SHEET" | "TAB" | "MENU" | "MENUBAR" | "TOOLBAR" | "OPTION" | "OLE" | "DETAIL"
        | "HEADER" | "FOOTER" | "FORM" => ClarionSymbolKind::Control,
        _ => ClarionSymbolKind::Structure,
    }
}

/// Opening line of a structure, split into the parts the outline shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureHeader {
    pub keyword: String,
    /// Text of the parenthesis group directly after the keyword
    pub args: Option<String>,
    /// Whole declaration from the keyword to the end of the logical line
    pub signature: String,
    pub prefix: Option<String>,
    pub use_attr: Option<String>,
    pub over: Option<String>,
    pub dim: Option<String>,
    pub driver: Option<String>,
    pub name_attr: Option<String>,
}

impl StructureHeader {
    pub fn read(tokens: &[Token], idx: usize) -> Self {
        let Some(token) = tokens.get(idx) else {
            return Self::default();
        };
        let end = logical_line_end(tokens, idx);
        let args = (idx + 1 < end)
            .then(|| matching_paren(tokens, idx + 1, end))
            .flatten()
            .map(|close| render_tokens(&tokens[idx + 2..close]));

        Self {
            keyword: token.value.clone(),
            args,
            signature: render_tokens(&tokens[idx..end]),
            prefix: find_attribute(tokens, idx + 1, end, "PRE"),
            use_attr: find_attribute(tokens, idx + 1, end, "USE"),
            over: find_attribute(tokens, idx + 1, end, "OVER"),
            dim: find_attribute(tokens, idx + 1, end, "DIM"),
            driver: find_attribute(tokens, idx + 1, end, "DRIVER"),
            name_attr: find_attribute(tokens, idx + 1, end, "NAME"),
        }
    }

    /// Name shown for a structure without a label: `GROUP,OVER(bits)`,
    /// `TAB('General')`, `FILE,DRIVER('TOPSPEED'),PRE(CUS)`
    pub fn unlabeled_name(&self) -> String {
        let mut name = self.keyword.clone();
        if let Some(args) = &self.args {
            name.push_str(&format!("({args})"));
        }
        let attributes = [
            ("DRIVER", &self.driver),
            ("PRE", &self.prefix),
            ("OVER", &self.over),
            ("DIM", &self.dim),
        ];
        for (attribute, value) in attributes {
            if let Some(value) = value {
                name.push_str(&format!(",{attribute}({value})"));
            }
        }
        if self.args.is_none()
            && let Some(external) = &self.name_attr
        {
            name.push_str(&format!(",NAME({external})"));
        }
        name
    }
}

/// `ELEMENT('text')` name and `USE(...) AT(...)` detail for a window control
pub fn window_element_display(tokens: &[Token], idx: usize) -> (String, String) {
    let Some(token) = tokens.get(idx) else {
        return (String::new(), String::new());
    };
    let end = logical_line_end(tokens, idx);

    let text = matching_paren(tokens, idx + 1, end).and_then(|close| {
        split_top_level_commas(&tokens[idx + 2..close])
            .first()
            .map(|first| render_tokens(first))
    });
    let name = match text {
        Some(text) if !text.is_empty() => format!("{}({})", token.value, text),
        _ => token.value.clone(),
    };

    let mut detail = Vec::new();
    if let Some(use_attr) = find_attribute(tokens, idx + 1, end, "USE") {
        detail.push(format!("USE({use_attr})"));
    }
    if let Some(at) = find_attribute(tokens, idx + 1, end, "AT") {
        detail.push(format!("AT({at})"));
    }
    (name, detail.join(" "))
}

/// `PROJECT(field,...)`
pub fn project_display(tokens: &[Token], idx: usize) -> String {
    let end = logical_line_end(tokens, idx);
    match matching_paren(tokens, idx + 1, end) {
        Some(close) => format!("PROJECT({})", render_tokens(&tokens[idx + 2..close])),
        None => "PROJECT".to_string(),
    }
}

/// `KEY(label),(field,...),OPT1,OPT2` for KEY and INDEX declarations
pub fn key_display(tokens: &[Token], idx: usize, label: Option<&str>) -> (String, String) {
    let Some(token) = tokens.get(idx) else {
        return (String::new(), String::new());
    };
    let keyword = token.value.to_ascii_uppercase();
    let end = logical_line_end(tokens, idx);

    let mut name = match label {
        Some(label) => format!("{keyword}({label})"),
        None => keyword,
    };
    let mut fields = String::new();
    let mut options_from = idx + 1;
    if let Some(close) = matching_paren(tokens, idx + 1, end) {
        fields = render_tokens(&tokens[idx + 2..close]);
        name.push_str(&format!(",({fields})"));
        options_from = close + 1;
    }
    for option in split_top_level_commas(&tokens[options_from.min(end)..end]) {
        let option = render_tokens(option);
        if !option.is_empty() {
            name.push(',');
            name.push_str(&option);
        }
    }
    (name, fields)
}

/// Parameter list of a PROCEDURE token verbatim, `()` when absent
pub fn procedure_params(tokens: &[Token], idx: usize) -> String {
    let end = logical_line_end(tokens, idx);
    matching_paren(tokens, idx + 1, end)
        .map(|close| render_tokens(&tokens[idx + 1..=close]))
        .unwrap_or_else(|| "()".to_string())
}

/// Text from the token to the end of its logical line, comments dropped
pub fn line_tail(tokens: &[Token], idx: usize) -> String {
    let end = logical_line_end(tokens, idx);
    render_tokens(&tokens[idx.min(end)..end])
}

/// Label heading a declaration line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLabel {
    pub text: String,
    /// Index of the first label token
    pub index: usize,
}

/// The column-0 label directly in front of the token, joining a split
/// `PREFIX` + `:Field` pair back together
pub fn line_label(tokens: &[Token], lines: &LineIndex, idx: usize) -> Option<LineLabel> {
    let token = tokens.get(idx)?;
    let first = lines.first_on_line(token.line)?;
    if first >= idx {
        return None;
    }
    let head = tokens.get(first)?;
    let text = match (head.token_type, idx - first) {
        (TokenType::Label | TokenType::StructurePrefix, 1) => head.value.clone(),
        (TokenType::Label, 2) if tokens[first + 1].token_type == TokenType::StructurePrefix => {
            format!("{}{}", head.value, tokens[first + 1].value)
        }
        _ => return None,
    };
    Some(LineLabel { text, index: first })
}

/// Whether the token starts its line, optionally after a label
pub fn is_line_head(tokens: &[Token], lines: &LineIndex, idx: usize) -> bool {
    let Some(token) = tokens.get(idx) else {
        return false;
    };
    lines.first_on_line(token.line) == Some(idx) || line_label(tokens, lines, idx).is_some()
}

/// Exclusive end index of the block opened at `idx`
///
/// Uses the token's `finishes_at` when present; otherwise matches nested
/// openers against END statements and LOOP terminators. An unterminated
/// block runs to the end of the stream.
pub fn block_end(tokens: &[Token], idx: usize) -> usize {
    let Some(token) = tokens.get(idx) else {
        return idx;
    };
    if let Some(last_line) = token.finishes_at {
        return tokens[idx..]
            .iter()
            .position(|t| t.line > last_line)
            .map_or(tokens.len(), |offset| idx + offset);
    }

    let mut open = vec![token];
    for (j, t) in tokens.iter().enumerate().skip(idx + 1) {
        if opens_block(tokens, j) {
            open.push(t);
        } else if let Some(opener) = open.last()
            && closes_block(tokens, j, opener)
        {
            open.pop();
            if open.is_empty() {
                return if t.token_type == TokenType::EndStatement {
                    j + 1
                } else {
                    logical_line_end(tokens, j)
                };
            }
        }
    }
    tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::tokens::lex;

    fn index_of(tokens: &[Token], value: &str) -> usize {
        tokens.iter().position(|t| t.value_is(value)).unwrap()
    }

    #[test]
    fn test_unlabeled_group_name_uses_attributes() {
        let tokens = lex("  GROUP,OVER(bits)\n");
        let header = StructureHeader::read(&tokens, index_of(&tokens, "GROUP"));
        assert_eq!(header.unlabeled_name(), "GROUP,OVER(bits)");
        assert_eq!(header.signature, "GROUP,OVER(bits)");
    }

    #[test]
    fn test_file_header_attributes() {
        let tokens = lex("Customers FILE,DRIVER('TOPSPEED'),PRE(CUS),CREATE\n");
        let header = StructureHeader::read(&tokens, index_of(&tokens, "FILE"));
        assert_eq!(header.driver.as_deref(), Some("'TOPSPEED'"));
        assert_eq!(header.prefix.as_deref(), Some("CUS"));
        assert_eq!(header.args, None);
        assert_eq!(header.signature, "FILE,DRIVER('TOPSPEED'),PRE(CUS),CREATE");
    }

    #[test]
    fn test_window_element_respects_continuation() {
        let source = concat!(
            "Window WINDOW('Edit')\n",
            "         BUTTON('&OK',1),AT(10,20,40,14), |\n",
            "           USE(?OkButton)\n",
            "         ENTRY(@s20),AT(10,40)\n",
            "       END\n",
        );
        let tokens = lex(source);
        let (name, detail) = window_element_display(&tokens, index_of(&tokens, "BUTTON"));
        assert_eq!(name, "BUTTON('&OK')");
        assert_eq!(detail, "USE(?OkButton) AT(10,20,40,14)");

        let (name, detail) = window_element_display(&tokens, index_of(&tokens, "ENTRY"));
        assert_eq!(name, "ENTRY(@s20)");
        assert_eq!(detail, "AT(10,40)");
    }

    #[test]
    fn test_key_display() {
        let tokens = lex("CUS:NameKey KEY(CUS:Last,CUS:First),DUP,NOCASE\n");
        let key = index_of(&tokens, "KEY");
        let (name, fields) = key_display(&tokens, key, Some("CUS:NameKey"));
        assert_eq!(name, "KEY(CUS:NameKey),(CUS:Last,CUS:First),DUP,NOCASE");
        assert_eq!(fields, "CUS:Last,CUS:First");
    }

    #[test]
    fn test_procedure_params_and_tail() {
        let tokens = lex("Init  PROCEDURE(LONG x, STRING s),VIRTUAL ! comment\n");
        let proc = index_of(&tokens, "PROCEDURE");
        assert_eq!(procedure_params(&tokens, proc), "(LONG x, STRING s)");
        assert_eq!(line_tail(&tokens, proc), "PROCEDURE(LONG x, STRING s),VIRTUAL");

        let bare = lex("Main PROCEDURE\n");
        assert_eq!(procedure_params(&bare, 1), "()");
    }

    #[test]
    fn test_line_label_rejoins_prefix() {
        let tokens = lex("CUS:NameKey KEY(CUS:Last)\n  KEY(x)\n");
        let lines = LineIndex::build(&tokens);
        let key = index_of(&tokens, "KEY");
        let label = line_label(&tokens, &lines, key).unwrap();
        assert_eq!(label.text, "CUS:NameKey");
        assert_eq!(label.index, 0);
        assert!(is_line_head(&tokens, &lines, key));

        let bare = tokens.iter().rposition(|t| t.value_is("KEY")).unwrap();
        assert!(line_label(&tokens, &lines, bare).is_none());
        assert!(is_line_head(&tokens, &lines, bare));
    }

    #[test]
    fn test_block_end_counts_nested_blocks() {
        let source = concat!(
            "Q QUEUE\n",
            "  GROUP\n",
            "  END\n",
            "  END\n",
            "X LONG\n",
        );
        let mut tokens = lex(source);
        for token in &mut tokens {
            token.finishes_at = None;
        }
        let end = block_end(&tokens, 1);
        assert_eq!(tokens[end - 1].line, 3);
        assert_eq!(tokens[end].value, "X");
    }
}
