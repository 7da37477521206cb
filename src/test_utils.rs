//! Test utilities and global setup
//!
//! Provides centralized test logging configuration, a small Clarion lexer that
//! produces tokenizer-shaped input for the outline tests, and on-disk fixture
//! helpers for the project layer.

/// Test logging utilities
#[cfg(all(test, feature = "test-logging"))]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally - safe to call multiple times
    ///
    /// For automatic initialization in a test module:
    /// ```rust
    /// #[cfg(test)]
    /// mod tests {
    ///     #[cfg(feature = "test-logging")]
    ///     #[ctor::ctor]
    ///     fn init_test_logging() {
    ///         crate::test_utils::logging::init();
    ///     }
    /// }
    /// ```
    ///
    /// # Environment Variables
    ///
    /// - `RUST_LOG`: Controls log level (default: "debug,tokio=info")
    ///
    /// ```bash
    /// RUST_LOG=clarion_lsp_core::symbol=trace cargo test --features test-logging
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok();
        });
    }
}

/// Minimal Clarion lexer for tests
///
/// Emits the token shapes the editor tokenizer produces: column-0 labels,
/// classified keywords, `finishes_at` from END matching, procedure subtypes
/// from the enclosing declaration block, and CODE execution markers.
#[cfg(test)]
pub mod tokens {
    use crate::token::{
        ExecutionMarker, Token, TokenSubType, TokenType, closes_block, is_loop_terminator,
        is_module_attribute, opens_block,
    };

    const STRUCTURES: &[&str] = &[
        "CLASS",
        "INTERFACE",
        "WINDOW",
        "APPLICATION",
        "REPORT",
        "SHEET",
        "TAB",
        "GROUP",
        "QUEUE",
        "FILE",
        "RECORD",
        "VIEW",
        "JOIN",
        "MAP",
        "MODULE",
        "MENU",
        "MENUBAR",
        "TOOLBAR",
        "OPTION",
        "OLE",
        "DETAIL",
        "HEADER",
        "FOOTER",
        "FORM",
    ];

    const FOLDING: &[&str] = &[
        "IF", "LOOP", "CASE", "BEGIN", "EXECUTE", "ACCEPT", "ITEMIZE",
    ];

    const WINDOW_ELEMENTS: &[&str] = &[
        "BUTTON", "LIST", "ENTRY", "PROMPT", "RADIO", "CHECK", "SLIDER", "SPIN", "ITEM", "IMAGE",
        "BOX", "ELLIPSE", "LINE", "PANEL", "COMBO", "TEXT", "REGION", "PROGRESS",
    ];

    const TYPES: &[&str] = &[
        "BYTE", "SHORT", "USHORT", "LONG", "ULONG", "SIGNED", "UNSIGNED", "REAL", "SREAL",
        "DECIMAL", "PDECIMAL", "CSTRING", "PSTRING", "ASTRING", "BSTRING", "DATE", "TIME", "BOOL",
        "ANY", "LIKE",
    ];

    const KEYWORDS: &[&str] = &[
        "KEY", "INDEX", "MEMO", "BLOB", "EQUATE", "MEMBER", "PROGRAM", "RETURN", "DO", "THEN",
        "OF", "OROF", "ELSE", "UNTIL", "WHILE", "TO", "BY", "SELF", "PARENT", "BREAK", "CYCLE",
    ];

    const ATTRIBUTES: &[&str] = &[
        "PRE", "USE", "DRIVER", "OVER", "DIM", "NAME", "AT", "AUTO", "TYPE", "CREATE", "DUP",
        "NOCASE", "OPT", "PRIMARY", "THREAD", "STATIC", "EXTERNAL", "DLL", "LINK", "IMPLEMENTS",
        "VIRTUAL", "DERIVED", "PRIVATE", "PROTECTED", "BINDABLE", "ICON", "MSG", "TIP", "FONT",
        "CENTER", "SYSTEM", "GRAY", "MDI", "IMM", "DEFAULT", "REQ", "FROM", "RAW", "PASCAL",
        "PROC",
    ];

    const WINDOW_CONTEXTS: &[&str] = &["WINDOW", "APPLICATION", "REPORT"];

    fn contains(set: &[&str], word: &str) -> bool {
        set.iter().any(|candidate| candidate.eq_ignore_ascii_case(word))
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || matches!(c, '_' | '?' | '@')
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '?' | '@')
    }

    struct Lexer {
        tokens: Vec<Token>,
        /// Open blocks by keyword, for context-dependent classification
        context: Vec<String>,
    }

    impl Lexer {
        fn push(&mut self, token: Token) {
            self.tokens.push(token);
        }

        fn open_block(&mut self, keyword: &str) {
            self.context.push(keyword.to_ascii_uppercase());
        }

        fn in_window(&self) -> bool {
            self.context.iter().any(|k| contains(WINDOW_CONTEXTS, k))
        }

        /// BREAK groups report bands; elsewhere it leaves a LOOP
        fn is_structure(&self, upper: &str) -> bool {
            contains(STRUCTURES, upper)
                || (upper == "BREAK"
                    && self
                        .context
                        .last()
                        .is_some_and(|k| k == "REPORT" || k == "BREAK"))
        }

        fn declaration_subtype(&self) -> Option<TokenSubType> {
            self.context.iter().rev().find_map(|k| match k.as_str() {
                "CLASS" => Some(TokenSubType::MethodDeclaration),
                "INTERFACE" => Some(TokenSubType::InterfaceMethod),
                "MAP" | "MODULE" => Some(TokenSubType::MapProcedure),
                _ => None,
            })
        }

        fn identifier(&mut self, word: &str, line: u32, col: u32) {
            if col == 0 {
                match word.find(':') {
                    Some(split) if split > 0 => {
                        self.push(Token::new(TokenType::Label, &word[..split], line, 0));
                        self.push(Token::new(
                            TokenType::StructurePrefix,
                            &word[split..],
                            line,
                            split as u32,
                        ));
                    }
                    _ => self.push(Token::new(TokenType::Label, word, line, 0)),
                }
                return;
            }

            let upper = word.to_ascii_uppercase();
            let token_type = match upper.as_str() {
                "PROCEDURE" | "FUNCTION" => {
                    let mut token = Token::new(TokenType::Procedure, word, line, col);
                    token.sub_type = self.declaration_subtype();
                    self.push(token);
                    return;
                }
                "ROUTINE" => TokenType::Routine,
                "CODE" | "DATA" => TokenType::ExecutionMarker,
                "END" => {
                    self.context.pop();
                    TokenType::EndStatement
                }
                "STRING" if self.in_window() => TokenType::WindowElement,
                "STRING" => TokenType::Type,
                "PROJECT" => TokenType::PropertyFunction,
                _ if self.is_structure(&upper) => {
                    self.push(Token::new(TokenType::Structure, word, line, col));
                    let idx = self.tokens.len() - 1;
                    if !is_module_attribute(&self.tokens, idx) {
                        self.open_block(&upper);
                    }
                    return;
                }
                _ if contains(FOLDING, &upper) => {
                    self.open_block(&upper);
                    TokenType::Keyword
                }
                _ if contains(WINDOW_ELEMENTS, &upper) => TokenType::WindowElement,
                _ if contains(TYPES, &upper) => TokenType::Type,
                _ if contains(KEYWORDS, &upper) => {
                    self.push(Token::new(TokenType::Keyword, word, line, col));
                    let idx = self.tokens.len() - 1;
                    if is_loop_terminator(&self.tokens, idx)
                        && self.context.last().is_some_and(|k| k == "LOOP")
                    {
                        self.context.pop();
                    }
                    return;
                }
                _ if contains(ATTRIBUTES, &upper) => TokenType::Attribute,
                _ => TokenType::Variable,
            };
            self.push(Token::new(token_type, word, line, col));
        }

        fn lex_line(&mut self, text: &str, line: u32) {
            let chars: Vec<char> = text.chars().collect();
            let mut i = 0;
            while i < chars.len() {
                let c = chars[i];
                let col = i as u32;
                if c.is_whitespace() {
                    i += 1;
                } else if c == '!' {
                    let rest: String = chars[i..].iter().collect();
                    self.push(Token::new(TokenType::Comment, rest.trim_end(), line, col));
                    break;
                } else if c == '\'' {
                    let mut j = i + 1;
                    while j < chars.len() {
                        if chars[j] == '\'' {
                            if chars.get(j + 1) == Some(&'\'') {
                                j += 2;
                                continue;
                            }
                            break;
                        }
                        j += 1;
                    }
                    let end = (j + 1).min(chars.len());
                    let text: String = chars[i..end].iter().collect();
                    self.push(Token::new(TokenType::String, text, line, col));
                    i = end;
                } else if c.is_ascii_digit() {
                    let mut j = i;
                    while j < chars.len() && chars[j].is_ascii_alphanumeric() {
                        j += 1;
                    }
                    let text: String = chars[i..j].iter().collect();
                    self.push(Token::new(TokenType::Number, text, line, col));
                    i = j;
                } else if c == '&' && chars.get(i + 1).is_some_and(|n| is_ident_start(*n)) {
                    let mut j = i + 1;
                    while j < chars.len() && is_ident_char(chars[j]) {
                        j += 1;
                    }
                    let text: String = chars[i..j].iter().collect();
                    self.push(Token::new(TokenType::ReferenceVariable, text, line, col));
                    i = j;
                } else if is_ident_start(c) {
                    let mut j = i;
                    while j < chars.len()
                        && (is_ident_char(chars[j])
                            || (chars[j] == '.'
                                && chars.get(j + 1).is_some_and(|n| is_ident_start(*n))))
                    {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    self.identifier(&word, line, col);
                    i = j;
                } else if c == '.' && !chars.get(i + 1).is_some_and(|n| n.is_ascii_alphanumeric()) {
                    self.context.pop();
                    self.push(Token::new(TokenType::EndStatement, ".", line, col));
                    i += 1;
                } else {
                    let token_type = match c {
                        '|' => TokenType::LineContinuation,
                        '(' | ')' | ',' => TokenType::Delimiter,
                        _ => TokenType::Operator,
                    };
                    self.push(Token::new(token_type, c.to_string(), line, col));
                    i += 1;
                }
            }
        }
    }

    /// Tokenize Clarion source into annotated tokens
    pub fn lex(source: &str) -> Vec<Token> {
        let mut lexer = Lexer {
            tokens: Vec::new(),
            context: Vec::new(),
        };
        for (line, text) in source.lines().enumerate() {
            lexer.lex_line(text, line as u32);
        }
        let mut tokens = lexer.tokens;
        annotate_labels(&mut tokens);
        annotate_block_ends(&mut tokens);
        annotate_procedures(&mut tokens);
        tokens
    }

    fn annotate_labels(tokens: &mut [Token]) {
        for idx in 1..tokens.len() {
            if !matches!(
                tokens[idx].token_type,
                TokenType::Structure | TokenType::Procedure | TokenType::Routine
            ) {
                continue;
            }
            let line = tokens[idx].line;
            let prev = &tokens[idx - 1];
            let label = match prev.token_type {
                TokenType::Label if prev.line == line => Some(prev.value.clone()),
                TokenType::StructurePrefix
                    if prev.line == line
                        && idx >= 2
                        && tokens[idx - 2].token_type == TokenType::Label =>
                {
                    Some(format!("{}{}", tokens[idx - 2].value, prev.value))
                }
                _ => None,
            };
            tokens[idx].label = label;
        }
    }

    fn annotate_block_ends(tokens: &mut [Token]) {
        let mut open: Vec<usize> = Vec::new();
        for idx in 0..tokens.len() {
            if opens_block(tokens, idx) {
                open.push(idx);
            } else if let Some(&opener) = open.last()
                && closes_block(tokens, idx, &tokens[opener])
            {
                open.pop();
                tokens[opener].finishes_at = Some(tokens[idx].line);
            }
        }
    }

    fn annotate_procedures(tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            if token.token_type == TokenType::Procedure && token.sub_type.is_none() {
                let dotted = token.label.as_deref().is_some_and(|l| l.contains('.'));
                token.sub_type = Some(if dotted {
                    TokenSubType::MethodImplementation
                } else {
                    TokenSubType::GlobalProcedure
                });
            }
        }

        let is_body = |t: &Token| {
            t.token_type == TokenType::Procedure
                && matches!(
                    t.sub_type,
                    Some(TokenSubType::GlobalProcedure | TokenSubType::MethodImplementation)
                )
        };
        let is_routine = |t: &Token| {
            t.token_type == TokenType::Routine
                || (t.token_type == TokenType::Keyword && t.value.eq_ignore_ascii_case("ROUTINE"))
        };
        let bodies: Vec<usize> = (0..tokens.len()).filter(|&i| is_body(&tokens[i])).collect();
        let routines: Vec<usize> = (0..tokens.len()).filter(|&i| is_routine(&tokens[i])).collect();
        let last_line_before = |tokens: &[Token], line: Option<u32>| -> Option<u32> {
            tokens
                .iter()
                .rev()
                .find(|t| line.is_none_or(|l| t.line < l))
                .map(|t| t.line)
        };

        for (n, &idx) in bodies.iter().enumerate() {
            let next_line = bodies.get(n + 1).map(|&next| tokens[next].line);
            let end = last_line_before(tokens, next_line);
            let upto = bodies.get(n + 1).copied().unwrap_or(tokens.len());
            let has_code = tokens[idx..upto].iter().any(|t| {
                t.token_type == TokenType::ExecutionMarker && t.value.eq_ignore_ascii_case("CODE")
            });
            let token = &mut tokens[idx];
            token.finishes_at = end.filter(|&line| line > token.line);
            if has_code {
                token.execution_marker = Some(ExecutionMarker::Code);
            }
        }

        for &idx in &routines {
            let line = tokens[idx].line;
            let next_line = routines
                .iter()
                .chain(bodies.iter())
                .map(|&other| tokens[other].line)
                .filter(|&other| other > line)
                .min();
            let end = last_line_before(tokens, next_line);
            tokens[idx].finishes_at = end.filter(|&end| end > line);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_lex_labels_and_procedures() {
            let tokens = lex(concat!(
                "MyProc PROCEDURE(LONG x)\n",
                "LOC:Count  LONG\n",
                "  CODE\n",
                "  RETURN\n",
            ));
            assert_eq!(tokens[0].token_type, TokenType::Label);
            let proc = &tokens[1];
            assert_eq!(proc.token_type, TokenType::Procedure);
            assert_eq!(proc.sub_type, Some(TokenSubType::GlobalProcedure));
            assert_eq!(proc.label.as_deref(), Some("MyProc"));
            assert_eq!(proc.finishes_at, Some(3));
            assert_eq!(proc.execution_marker, Some(ExecutionMarker::Code));

            let prefix = tokens.iter().find(|t| t.token_type == TokenType::StructurePrefix);
            assert_eq!(prefix.map(|t| t.value.as_str()), Some(":Count"));
        }

        #[test]
        fn test_lex_block_ends_and_declarations() {
            let tokens = lex(concat!(
                "MyClass CLASS,TYPE,MODULE('my.clw')\n",
                "Init      PROCEDURE\n",
                "        END\n",
            ));
            let class = &tokens[1];
            assert_eq!(class.finishes_at, Some(2));
            let module = tokens.iter().find(|t| t.value == "MODULE").unwrap();
            assert_eq!(module.token_type, TokenType::Structure);
            assert_eq!(module.finishes_at, None);
            let init = tokens.iter().find(|t| t.token_type == TokenType::Procedure).unwrap();
            assert_eq!(init.sub_type, Some(TokenSubType::MethodDeclaration));
        }

        #[test]
        fn test_lex_window_strings_and_end_dot() {
            let tokens = lex(concat!(
                "W WINDOW\n",
                "    STRING('Hi'),AT(1,1)\n",
                "  .\n",
                "S STRING(20)\n",
            ));
            assert_eq!(tokens[2].token_type, TokenType::WindowElement);
            assert_eq!(tokens[1].finishes_at, Some(2));
            let last_string = tokens.iter().rev().find(|t| t.value == "STRING").unwrap();
            assert_eq!(last_string.token_type, TokenType::Type);
        }
    }
}

/// On-disk fixtures for the project layer
#[cfg(test)]
pub mod fixtures {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Temporary directory tree that is removed on drop
    pub struct TempTree {
        _temp_dir: TempDir,
        pub root: PathBuf,
    }

    impl TempTree {
        pub fn new() -> Result<Self, std::io::Error> {
            let temp_dir = TempDir::new()?;
            let root = temp_dir.path().to_path_buf();
            Ok(Self {
                _temp_dir: temp_dir,
                root,
            })
        }

        /// Write `content` at `relative`, creating parent directories
        pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf, std::io::Error> {
            let path = self.root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            Ok(path)
        }

        pub fn path(&self) -> &Path {
            &self.root
        }
    }
}
