//! Token records produced by the external Clarion tokenizer
//!
//! Tokens are immutable input. Field names serialise in camelCase so a token
//! dump produced by the editor host can be fed straight into the CLI.

use serde::{Deserialize, Serialize};

/// Coarse lexical category assigned by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Comment,
    String,
    Keyword,
    Directive,
    Function,
    Variable,
    Number,
    Operator,
    Class,
    Attribute,
    Property,
    PropertyFunction,
    Constant,
    Type,
    TypeAnnotation,
    ImplicitVariable,
    Structure,
    ReferenceVariable,
    LineContinuation,
    Delimiter,
    FunctionArgumentParameter,
    PointerParameter,
    FieldEquateLabel,
    ClarionDocument,
    Procedure,
    Routine,
    ExecutionMarker,
    Label,
    EndStatement,
    StructurePrefix,
    StructureField,
    WindowElement,
    ColorValue,
    Unknown,
}

/// Refinement of [`TokenType`] for procedure-like tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSubType {
    Procedure,
    GlobalProcedure,
    MethodImplementation,
    MethodDeclaration,
    MapProcedure,
    InterfaceMethod,
    Routine,
    Class,
}

impl TokenSubType {
    /// Prototype-only subtypes: declared inside MAP, CLASS or INTERFACE
    pub fn is_declaration(self) -> bool {
        matches!(
            self,
            TokenSubType::MethodDeclaration
                | TokenSubType::MapProcedure
                | TokenSubType::InterfaceMethod
        )
    }
}

/// Nearest preceding CODE/DATA marker recorded by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionMarker {
    Code,
    Data,
}

/// One lexical unit of a Clarion document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(rename = "type")]
    pub token_type: TokenType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<TokenSubType>,

    pub value: String,

    /// 0-based line
    pub line: u32,

    /// 0-based column
    pub start: u32,

    /// Line on which the block opened by this token closes, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finishes_at: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_marker: Option<ExecutionMarker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_local_data: Option<bool>,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, line: u32, start: u32) -> Self {
        Self {
            token_type,
            sub_type: None,
            value: value.into(),
            line,
            start,
            finishes_at: None,
            label: None,
            execution_marker: None,
            structure_prefix: None,
            has_local_data: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: TokenSubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }

    /// Column just past the last character of the token
    pub fn end(&self) -> u32 {
        self.start + self.value.chars().count() as u32
    }

    /// Case-insensitive comparison of the token text
    pub fn value_is(&self, text: &str) -> bool {
        self.value.eq_ignore_ascii_case(text)
    }

    pub fn is_comment(&self) -> bool {
        self.token_type == TokenType::Comment || self.value.starts_with('!')
    }

    pub fn is_continuation(&self) -> bool {
        self.token_type == TokenType::LineContinuation || self.value == "|"
    }

    pub fn is_open_paren(&self) -> bool {
        self.value == "("
    }

    pub fn is_close_paren(&self) -> bool {
        self.value == ")"
    }

    pub fn is_comma(&self) -> bool {
        self.value == ","
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_deserializes_from_camel_case_json() {
        let json = r#"{
            "type": "Procedure",
            "subType": "GlobalProcedure",
            "value": "PROCEDURE",
            "line": 4,
            "start": 8,
            "finishesAt": 12,
            "label": "MyProc",
            "executionMarker": "CODE"
        }"#;

        let token: Token = serde_json::from_str(json).unwrap();
        assert_eq!(token.token_type, TokenType::Procedure);
        assert_eq!(token.sub_type, Some(TokenSubType::GlobalProcedure));
        assert_eq!(token.finishes_at, Some(12));
        assert_eq!(token.label.as_deref(), Some("MyProc"));
        assert_eq!(token.execution_marker, Some(ExecutionMarker::Code));
        assert_eq!(token.structure_prefix, None);
    }

    #[test]
    fn test_token_end_and_case_insensitive_value() {
        let token = Token::new(TokenType::Structure, "Queue", 0, 10);
        assert_eq!(token.end(), 15);
        assert!(token.value_is("QUEUE"));
        assert!(!token.value_is("GROUP"));
    }

    #[test]
    fn test_declaration_subtypes() {
        assert!(TokenSubType::MapProcedure.is_declaration());
        assert!(TokenSubType::MethodDeclaration.is_declaration());
        assert!(TokenSubType::InterfaceMethod.is_declaration());
        assert!(!TokenSubType::MethodImplementation.is_declaration());
        assert!(!TokenSubType::GlobalProcedure.is_declaration());
    }
}
