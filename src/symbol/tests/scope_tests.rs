//! Scope closing across procedures and routines

use super::{at, outline, root_names};
use crate::symbol::ClarionSymbolKind;

#[cfg(feature = "test-logging")]
#[ctor::ctor]
fn init_test_logging() {
    crate::test_utils::logging::init();
}

const PROGRAM: &str = concat!(
    "  PROGRAM\n",                 // 0
    "  MAP\n",                     // 1
    "Main  PROCEDURE\n",           // 2
    "  END\n",                     // 3
    "GlobalVar  LONG\n",           // 4
    "  CODE\n",                    // 5
    "  Main()\n",                  // 6
    "Main PROCEDURE\n",            // 7
    "LocalVar  STRING(20)\n",      // 8
    "  CODE\n",                    // 9
    "  IF LocalVar THEN\n",        // 10
    "    RETURN\n",                // 11
    "  END\n",                     // 12
    "DoIt ROUTINE\n",              // 13
    "  RETURN\n",                  // 14
    "Helper PROCEDURE(LONG x)\n",  // 15
    "Count  LONG\n",               // 16
    "  CODE\n",                    // 17
);

#[test]
fn test_global_procedures_are_roots_in_source_order() {
    let symbols = outline(PROGRAM);
    assert_eq!(
        root_names(&symbols),
        vec!["MAP", "GlobalVar  LONG", "Main ()", "Helper (LONG x)"]
    );

    let main = at(&symbols, &["Main ()"]);
    assert_eq!(main.kind, ClarionSymbolKind::Procedure);
    assert!(main.meta.is_global_procedure);
    assert_eq!(main.child_names(), vec!["LocalVar  STRING(20)", "CODE", "DoIt"]);
}

#[test]
fn test_new_global_procedure_closes_previous_scope() {
    let symbols = outline(PROGRAM);
    let main = at(&symbols, &["Main ()"]);
    assert_eq!(main.range.start.line, 7);
    assert_eq!(main.range.end.line, 14);

    let helper = at(&symbols, &["Helper (LONG x)"]);
    assert_eq!(helper.range.start.line, 15);
    assert_eq!(helper.child_names(), vec!["Count  LONG", "CODE"]);
}

#[test]
fn test_routine_belongs_to_enclosing_procedure() {
    let symbols = outline(PROGRAM);
    let routine = at(&symbols, &["Main ()", "DoIt"]);
    assert_eq!(routine.kind, ClarionSymbolKind::Routine);
    assert_eq!(routine.detail, "ROUTINE");
    assert_eq!(routine.range.start.line, 13);
    assert_eq!(routine.range.end.line, 14);
}

#[test]
fn test_map_prototypes_are_declarations() {
    let symbols = outline(PROGRAM);
    let prototype = at(&symbols, &["MAP", "Functions", "Main"]);
    assert_eq!(prototype.kind, ClarionSymbolKind::Procedure);
    assert!(prototype.meta.is_map_procedure);
    assert!(!prototype.meta.is_global_procedure);
}

#[test]
fn test_selection_range_covers_label() {
    let symbols = outline(PROGRAM);
    let main = at(&symbols, &["Main ()"]);
    assert_eq!(main.selection_range.start.line, 7);
    assert_eq!(main.selection_range.start.character, 0);
    assert_eq!(main.selection_range.end.character, 4);
}

#[test]
fn test_routine_data_section_and_special_routines() {
    let source = concat!(
        "Main PROCEDURE\n",      // 0
        "  CODE\n",              // 1
        "Calc ROUTINE\n",        // 2
        "  DATA\n",              // 3
        "Tmp  LONG\n",           // 4
        "  CODE\n",              // 5
        "  Tmp = 1\n",           // 6
        "Init::Data ROUTINE\n",  // 7
        "  DATA\n",              // 8
        "Shared  LONG\n",        // 9
        "  CODE\n",              // 10
    );
    let symbols = outline(source);
    let main = at(&symbols, &["Main ()"]);
    assert_eq!(main.child_names(), vec!["CODE", "Calc", "Init::Data", "Shared  LONG"]);

    let calc = at(&symbols, &["Main ()", "Calc"]);
    assert_eq!(calc.child_names(), vec!["Tmp  LONG", "CODE"]);
    assert_eq!(calc.range.end.line, 6);

    let special = at(&symbols, &["Main ()", "Init::Data"]);
    assert!(special.meta.is_special_routine);
    assert_eq!(special.child_names(), vec!["CODE"]);
}

#[test]
fn test_empty_input_gives_empty_outline() {
    assert!(outline("").is_empty());
    assert!(outline("! just a comment\n").is_empty());
}

#[test]
fn test_sibling_procedures_keep_their_own_locals() {
    let source = concat!(
        "MyProc1 PROCEDURE\n",
        "LocalVar1  LONG\n",
        "  CODE\n",
        "  RETURN\n",
        "MyProc2 PROCEDURE\n",
        "LocalVar2  LONG\n",
        "  CODE\n",
        "  RETURN\n",
    );
    let symbols = outline(source);
    assert_eq!(
        at(&symbols, &["MyProc1 ()"]).child_names(),
        vec!["LocalVar1  LONG", "CODE"]
    );
    assert_eq!(
        at(&symbols, &["MyProc2 ()"]).child_names(),
        vec!["LocalVar2  LONG", "CODE"]
    );
}
