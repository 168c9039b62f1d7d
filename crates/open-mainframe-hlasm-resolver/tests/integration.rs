//! End-to-end scenarios: assembler source driven through the analyzer.

use open_mainframe_hlasm_resolver::{
    ebcdic, Analyzer, AttrKind, Evaluation, MacroOrigin, OrdinaryContext, ResolverConfig, SectionKind,
    SymbolValue, VariableValue,
};

fn analyze(source: &str) -> OrdinaryContext {
    Analyzer::new(source).analyze()
}

fn abs(ctx: &OrdinaryContext, name: &str) -> i32 {
    match ctx.symbol_value(name) {
        Some(SymbolValue::Absolute(n)) => n,
        other => panic!("{name} is not absolute: {other:?}"),
    }
}

fn reloc_offset(ctx: &OrdinaryContext, name: &str) -> i32 {
    match ctx.symbol_value(name) {
        Some(SymbolValue::Relocatable(a)) => {
            assert!(a.spaces().is_empty(), "{name} still has spaces: {a:?}");
            a.offset()
        }
        other => panic!("{name} is not relocatable: {other:?}"),
    }
}

fn length(ctx: &OrdinaryContext, name: &str) -> u32 {
    ctx.symbol(name)
        .and_then(|s| s.attributes.length.known())
        .unwrap_or_else(|| panic!("{name} has no known length"))
}

fn codes(ctx: &OrdinaryContext) -> Vec<String> {
    ctx.diagnostics().iter().map(|d| d.code.clone()).collect()
}

fn letter(c: char) -> i32 {
    i32::from(ebcdic::from_ascii(c))
}

// ---------------------------------------------------------------------------
//  EQU
// ---------------------------------------------------------------------------

#[test]
fn equ_forward_chain() {
    let ctx = analyze("A EQU B+1\nB EQU C+1\nC EQU 10\n");
    assert_eq!(abs(&ctx, "A"), 12);
    assert_eq!(abs(&ctx, "B"), 11);
    assert_eq!(abs(&ctx, "C"), 10);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(ctx.pending_count(), 0);
}

#[test]
fn equ_complex_expression() {
    let ctx = analyze("A EQU 1\nB EQU A+A-10\n");
    assert_eq!(abs(&ctx, "B"), -8);
}

#[test]
fn equ_cycle_reported_once() {
    let ctx = analyze("A EQU B+1\nB EQU C+1\nC EQU A\n");
    assert_eq!(codes(&ctx), vec!["E033"]);
    assert_eq!(abs(&ctx, "C"), 0);
    assert_eq!(abs(&ctx, "B"), 1);
    assert_eq!(abs(&ctx, "A"), 2);
}

#[test]
fn equ_self_reference_is_cycle() {
    let ctx = analyze("A EQU A+1\n");
    assert_eq!(codes(&ctx), vec!["E033"]);
    assert_eq!(abs(&ctx, "A"), 0);
}

#[test]
fn equ_redefinition() {
    let ctx = analyze("A EQU 1\nA EQU 2\n");
    assert_eq!(codes(&ctx), vec!["E031"]);
    assert_eq!(abs(&ctx, "A"), 1);
}

#[test]
fn equ_explicit_length() {
    let ctx = analyze("Y EQU X,12\nX EQU 5,2\n");
    assert_eq!(abs(&ctx, "X"), 5);
    assert_eq!(length(&ctx, "X"), 2);
    assert_eq!(abs(&ctx, "Y"), 5);
    assert_eq!(length(&ctx, "Y"), 12);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn equ_implicit_length() {
    let ctx = analyze("X EQU 5,2\nY EQU X\nZ EQU 1+X\nZZ EQU *+X\n");
    assert_eq!(length(&ctx, "Y"), 2);
    assert_eq!(length(&ctx, "Z"), 1);
    assert_eq!(length(&ctx, "ZZ"), 1);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn equ_deferred_length() {
    let ctx = analyze("LEN EQU 11\nX EQU UNKNOWN,LEN\nUNKNOWN EQU L'X\n");
    assert_eq!(abs(&ctx, "X"), 11);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn equ_length_bounds() {
    let ctx = analyze("A EQU 1,12\nLEN EQU 1+A,-100\nLEM EQU A+1,100000\n");
    assert_eq!(length(&ctx, "LEN"), 1);
    assert_eq!(length(&ctx, "LEM"), 12);
    assert_eq!(codes(&ctx), vec!["A133", "A133"]);
}

#[test]
fn equ_explicit_type() {
    let ctx = analyze("LEN EQU 11,3,4\n");
    assert_eq!(ctx.symbol("LEN").map(|s| s.attributes.type_attr), Some(4));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn equ_implicit_type_is_u() {
    let ctx = analyze("LEN EQU 11,3\n");
    assert_eq!(ctx.symbol("LEN").and_then(|s| s.attributes.type_letter()), Some('U'));
}

#[test]
fn equ_type_bounds() {
    let ctx = analyze("LEN EQU 11,1,-1\nLEM EQU 11,1,300\n");
    assert_eq!(ctx.symbol("LEN").and_then(|s| s.attributes.type_letter()), Some('U'));
    assert_eq!(ctx.symbol("LEM").and_then(|s| s.attributes.type_letter()), Some('U'));
    assert_eq!(codes(&ctx), vec!["A134", "A134"]);
}

#[test]
fn equ_location_counter() {
    let src = "A DS A\nB EQU 256\nC EQU B-*+A\n DS XL(C)\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "C"), 252);
}

#[test]
fn equ_deps_with_multiplication() {
    let src = "\
TEST CSECT
     DS    XL(D)
A    DS    A
L    EQU   (A-TEST)*(A-TEST)
     DS    XL(L)
D    EQU   4
RES  EQU   *-TEST
";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
    assert_eq!(abs(&ctx, "L"), 16);
    assert_eq!(abs(&ctx, "RES"), 24);
}

#[test]
fn equ_reloc_deps_with_multiplication() {
    let src = "\
TEST CSECT
     DS    XL(D)
A    DS    A
L    EQU   TEST+(A-TEST)*(A-TEST)
     DS    XL(L-TEST)
D    EQU   4
RES  EQU   *-TEST
";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
    assert_eq!(abs(&ctx, "RES"), 24);
}

#[test]
fn equ_undefined_symbol_reported_at_end() {
    let ctx = analyze("A EQU B+1\nC EQU B+2\n");
    assert_eq!(codes(&ctx), vec!["E010"]);
    assert!(ctx.diagnostics()[0].message.contains('B'));
    assert_eq!(abs(&ctx, "A"), 0);
    assert_eq!(abs(&ctx, "C"), 0);
    assert_eq!(ctx.pending_count(), 0);
}

// ---------------------------------------------------------------------------
//  Location counter values
// ---------------------------------------------------------------------------

#[test]
fn location_counter_simple() {
    let src = "\
A LR 1,1
B EQU *-A
C EQU *-*
D EQU *
E EQU *
 LR 1,1
F EQU *
G EQU *+1
X1 EQU G-F
X2 EQU E-D
X3 EQU F-E
";
    let ctx = analyze(src);
    assert!(matches!(ctx.symbol_value("A"), Some(SymbolValue::Relocatable(_))));
    assert_eq!(ctx.symbol_value("B"), Some(SymbolValue::Absolute(2)));
    assert_eq!(ctx.symbol_value("C"), Some(SymbolValue::Absolute(0)));
    assert_eq!(abs(&ctx, "X1"), 1);
    assert_eq!(abs(&ctx, "X2"), 0);
    assert_eq!(abs(&ctx, "X3"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn alignment_cycle() {
    let src = "     DS   (X)B\nS1   EQU  *\nS2   DS   0F\nX    EQU  S2-S1\n";
    let ctx = analyze(src);
    assert_eq!(codes(&ctx), vec!["E033"]);
}

#[test]
fn no_alignment_cycle() {
    let src = "     DS   (X)F\nS1   EQU  *\nS2   DS   0F\nX    EQU  S2-S1\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "X"), 0);
}

#[test]
fn space_valid_alignment() {
    let src = "\
A    CSECT
     DS   3C
     DS   (X)D
B    EQU  *
     DS   1F
     DS   3X
     DS   2D
X    EQU  *-B
";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "X"), 24);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn loctr_placement_at_end() {
    let src = "\
A    CSECT
     DS     3C
B    LOCTR
     DS     2F
C    LOCTR
     DS     1D
X    EQU    *-A
";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "X"), 24);
    assert_eq!(reloc_offset(&ctx, "B"), 8);
    assert_eq!(reloc_offset(&ctx, "C"), 16);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn loctr_alignment_from_config() {
    let src = "A CSECT\n DS 3C\nB LOCTR\n DS 1C\nX EQU *-A\n";
    let config = ResolverConfig {
        loctr_alignment: 16,
        ..ResolverConfig::default()
    };
    let ctx = Analyzer::new(src).with_config(config).analyze();
    assert_eq!(abs(&ctx, "X"), 17);
}

#[test]
fn loctr_resume_and_redefinition() {
    let src = "\
A    CSECT
     DS   2C
B    LOCTR
     DS   4C
A    LOCTR
P    DS   1C
Q    EQU  1
Q    LOCTR
";
    let ctx = analyze(src);
    assert_eq!(reloc_offset(&ctx, "P"), 2);
    assert_eq!(codes(&ctx), vec!["E031"]);
}

// ---------------------------------------------------------------------------
//  Sections
// ---------------------------------------------------------------------------

#[test]
fn sections_declared_and_resumed() {
    let src = "\
A    CSECT
     DS   4C
D    DSECT
F1   DS   F
A    CSECT
X    DS   C
";
    let ctx = analyze(src);
    assert_eq!(ctx.section_kind("A"), Some(SectionKind::Executable));
    assert_eq!(ctx.section_kind("D"), Some(SectionKind::Dummy));
    assert_eq!(reloc_offset(&ctx, "X"), 4);
    assert_eq!(reloc_offset(&ctx, "F1"), 0);
    assert_eq!(ctx.symbol("A").and_then(|s| s.attributes.type_letter()), Some('J'));
    assert_eq!(length(&ctx, "A"), 1);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn section_kind_conflict() {
    let ctx = analyze("A CSECT\nA DSECT\nB EQU 1\nB CSECT\n");
    assert_eq!(codes(&ctx), vec!["E031", "E031"]);
    assert_eq!(ctx.section_kind("A"), Some(SectionKind::Executable));
    assert_eq!(ctx.section_kind("B"), None);
}

#[test]
fn difference_across_sections_is_relocatable() {
    let ctx = analyze("A CSECT\nX DS F\nB CSECT\nY DS F\nZ EQU Y-X\n");
    assert!(matches!(ctx.symbol_value("Z"), Some(SymbolValue::Relocatable(_))));
}

// ---------------------------------------------------------------------------
//  Data definitions
// ---------------------------------------------------------------------------

#[test]
fn dc_self_length_cycle() {
    let ctx = analyze("X DC CL(L'X)'X'\n");
    assert_eq!(codes(&ctx), vec!["E033"]);
    assert_eq!(length(&ctx, "X"), 1);
}

#[test]
fn dc_length_cycle_through_equ() {
    let ctx = analyze("X DC CL(A+1)'X'\nA EQU L'X\n");
    assert_eq!(ctx.diagnostics().len(), 1);
    assert_eq!(abs(&ctx, "A"), 0);
}

#[test]
fn dc_length_cycle_from_equ() {
    let ctx = analyze("A EQU L'X\nX DC CL(A+1)'X'\n");
    assert_eq!(ctx.diagnostics().len(), 1);
    assert_eq!(abs(&ctx, "A"), 1);
}

#[test]
fn dc_invalid_length_reference() {
    let ctx = analyze("A EQU L'X\nX DC CL(Y+1)'X'\nY EQU A\n");
    assert_eq!(ctx.diagnostics().len(), 1);
    assert_eq!(abs(&ctx, "A"), 1);
    assert_eq!(length(&ctx, "X"), 1);
    assert_eq!(abs(&ctx, "Y"), 0);
}

#[test]
fn dc_undefined_symbol_in_length() {
    let src = "A DC CL(D-C)'1'\nB LR 1,1\nC LR 1,1\nR EQU B-A\n";
    let ctx = analyze(src);
    assert_eq!(codes(&ctx), vec!["E010"]);
}

#[test]
fn dc_forward_length() {
    let src = "A DC CL(C-B)'1'\nB LR 1,1\nC LR 1,1\nR EQU B-A\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "R"), 2);
    assert_eq!(length(&ctx, "A"), 2);
}

#[test]
fn dc_backward_length() {
    let src = "A LR 1,1\n LR 1,1\nB DC CL(B-A)'ABCD'\nC LR 1,1\nR EQU C-B\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "R"), 4);
}

#[test]
fn dc_implicit_length_of_s_constant() {
    let src = "A LR 1,1\nB DC S(1,1)\nC LR 1,1\nR EQU C-B\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "R"), 4);
    assert_eq!(length(&ctx, "B"), 2);
}

#[test]
fn dc_length_from_negative_symbol() {
    let ctx = analyze("X EQU -12\nA DC CL(X+14)'A'\n");
    assert_eq!(length(&ctx, "A"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn dc_deferred_length_out_of_range() {
    let ctx = analyze("A DC FL(N)'1'\nN EQU 9\n");
    assert_eq!(codes(&ctx), vec!["D008"]);
    assert_eq!(length(&ctx, "A"), 4);
}

#[test]
fn dc_bit_length() {
    let ctx = analyze("A DC BL.12'1'\nB EQU *-A\n");
    assert_eq!(length(&ctx, "A"), 2);
    assert_eq!(abs(&ctx, "B"), 2);
}

#[test]
fn dc_multiple_operands() {
    let ctx = analyze("A DC C'AB',F'1'\nB EQU *-A\n");
    assert_eq!(length(&ctx, "A"), 2);
    assert_eq!(abs(&ctx, "B"), 8);
}

#[test]
fn dc_scale_attribute() {
    let ctx = analyze("X EQU 22\nA DC FS(X+14)'1'\n");
    assert_eq!(ctx.symbol("A").and_then(|s| s.attributes.scale.known()), Some(36));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn dc_forward_scale_attribute() {
    let ctx = analyze("A DC HS(X)'1'\nB EQU I'A\nX EQU 3\n");
    assert_eq!(ctx.symbol("A").and_then(|s| s.attributes.scale.known()), Some(3));
    assert_eq!(abs(&ctx, "B"), 12);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn dc_integer_attributes() {
    let src = "\
HALFCON DC HS6'-25.93'
ONECON DC FS8'100.3E-2'
SHORT DC ES2'46.415'
LONG DC DS5'-3.729'
EXTEND DC LS10'5.312'
";
    let ctx = analyze(src);
    let integer = |n: &str| ctx.symbol(n).and_then(|s| s.attributes.integer.known());
    assert_eq!(integer("HALFCON"), Some(9));
    assert_eq!(integer("ONECON"), Some(23));
    assert_eq!(integer("SHORT"), Some(4));
    assert_eq!(integer("LONG"), Some(9));
    assert_eq!(integer("EXTEND"), Some(18));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn dc_integer_referenced_by_equ() {
    let ctx = analyze("HALFCON DC HS6'-25.93'\nX EQU I'HALFCON\n");
    assert_eq!(abs(&ctx, "X"), 9);
}

#[test]
fn dc_scale_referenced_by_equ() {
    let ctx = analyze("A DC FS12'1'\nB EQU S'A\n");
    assert_eq!(abs(&ctx, "B"), 12);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn dc_manual_alignment() {
    let src = "\
S   CSECT
    DC    C' '
    DS    XL(((((*-S)+4095)/4096)*4096)-(*-S))'00'
T   EQU   *
";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(reloc_offset(&ctx, "T"), 4096);
}

#[test]
fn dc_type_attributes() {
    let ctx = analyze("A DC F'1'\nB DC FL2'1'\nC DC CL3'X'\nD DC A(0)\n");
    let t = |n: &str| ctx.symbol(n).and_then(|s| s.attributes.type_letter());
    assert_eq!(t("A"), Some('F'));
    assert_eq!(t("B"), Some('G'));
    assert_eq!(t("C"), Some('C'));
    assert_eq!(t("D"), Some('A'));
}

// ---------------------------------------------------------------------------
//  Attribute references
// ---------------------------------------------------------------------------

#[test]
fn attr_length_of_labels() {
    let ctx = analyze("TEST CSECT\nLBL LR 1,1\nA EQU L'TEST\nB EQU L'LBL\n");
    assert_eq!(abs(&ctx, "A"), 1);
    assert_eq!(abs(&ctx, "B"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn attr_basic_references() {
    let ctx = analyze("Q EQU 1\nW EQU 4\nA EQU L'Q\nB EQU T'W\n");
    assert_eq!(abs(&ctx, "A"), 1);
    assert_eq!(abs(&ctx, "B"), letter('U'));
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn attr_forward_references() {
    let ctx = analyze("A EQU L'Q\nB EQU T'W\nQ EQU 1,2,3\nW EQU 4,5,6\n");
    assert_eq!(abs(&ctx, "A"), 2);
    assert_eq!(abs(&ctx, "B"), 6);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn attr_forward_references_never_defined() {
    let ctx = analyze("A EQU L'Q\nB EQU T'W\n");
    assert_eq!(codes(&ctx), vec!["E010", "E010"]);
    assert_eq!(abs(&ctx, "A"), 1);
    assert_eq!(abs(&ctx, "B"), letter('U'));
}

#[test]
fn attr_cycle_broken_by_explicit_length() {
    let ctx = analyze("A EQU B,11\nB EQU L'A\n");
    assert_eq!(abs(&ctx, "A"), 11);
    assert_eq!(length(&ctx, "A"), 11);
    assert_eq!(abs(&ctx, "B"), 11);
    assert_eq!(length(&ctx, "B"), 1);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn attr_in_relocatable_difference() {
    let ctx = analyze("A LR 1,1\nB LR 1,1\nX EQU B-A+L'C\nC EQU 1,12\n");
    assert_eq!(abs(&ctx, "X"), 14);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn attr_illegal_reference() {
    let ctx = analyze("C EQU C'A'\nV EQU I'C\n");
    assert_eq!(codes(&ctx), vec!["E066"]);
    assert_eq!(abs(&ctx, "C"), 0xC1);
}

#[test]
fn attr_type_of_machine_label() {
    let ctx = analyze("A LR 1,1\nB EQU T'A\n");
    assert_eq!(abs(&ctx, "B"), letter('I'));
}

#[test]
fn attr_defined() {
    let mut ctx = analyze("A EQU 11\nB LR 1,1\n");
    assert_eq!(ctx.request_attribute(AttrKind::Defined, "A"), Evaluation::Resolved(1));
    assert_eq!(ctx.request_attribute(AttrKind::Defined, "B"), Evaluation::Resolved(1));
    assert_eq!(ctx.request_attribute(AttrKind::Defined, "C"), Evaluation::Resolved(0));
}

#[test]
fn attr_opcode_classes() {
    let mut ctx = analyze(" MACRO\n M\n MEND\n");
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "LR"), Evaluation::Resolved(letter('O')));
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "ORG"), Evaluation::Resolved(letter('A')));
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "SETC"), Evaluation::Resolved(letter('A')));
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "J"), Evaluation::Resolved(letter('E')));
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "M"), Evaluation::Resolved(letter('M')));
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "UNKNOWN"), Evaluation::Resolved(letter('U')));
}

#[test]
fn attr_opcode_waits_for_library_macro() {
    let mut ctx = OrdinaryContext::default();
    assert!(matches!(ctx.request_attribute(AttrKind::Opcode, "MYMAC"), Evaluation::Blocked(_)));
    ctx.define_macro("MYMAC", MacroOrigin::Library);
    assert_eq!(ctx.request_attribute(AttrKind::Opcode, "MYMAC"), Evaluation::Resolved(letter('S')));
}

#[test]
fn attr_variable_symbols() {
    let mut ctx = OrdinaryContext::default();
    ctx.define_variable("&NUM", VariableValue::Arithmetic(-123));
    ctx.define_variable("&STR", VariableValue::Character("HELLO".to_string()));
    ctx.define_variable("&L", VariableValue::List(vec!["A".to_string(), "BC".to_string()]));
    assert_eq!(ctx.request_variable_attribute(AttrKind::Count, "&NUM"), Evaluation::Resolved(4));
    assert_eq!(ctx.request_variable_attribute(AttrKind::Count, "&STR"), Evaluation::Resolved(5));
    assert_eq!(ctx.request_variable_attribute(AttrKind::Number, "&L"), Evaluation::Resolved(2));
    assert_eq!(ctx.request_variable_attribute(AttrKind::Number, "&STR"), Evaluation::Resolved(1));
    assert_eq!(ctx.request_variable_attribute(AttrKind::Type, "&NUM"), Evaluation::Resolved(letter('N')));
    assert!(matches!(
        ctx.request_variable_attribute(AttrKind::Scale, "&NUM"),
        Evaluation::ErrorFallback(0, _)
    ));
}

// ---------------------------------------------------------------------------
//  ORG
// ---------------------------------------------------------------------------

#[test]
fn org_absolute_target() {
    let ctx = analyze(" ORG 0\n");
    assert_eq!(codes(&ctx), vec!["A245"]);
}

#[test]
fn org_absolute_symbolic_target() {
    let ctx = analyze(" ORG X-X\nX EQU *\n");
    assert_eq!(codes(&ctx), vec!["A245"]);
}

#[test]
fn org_missing_target() {
    let ctx = analyze(" ORG ,2\n");
    assert_eq!(codes(&ctx), vec!["A245"]);
}

#[test]
fn org_to_later_label_is_cycle() {
    let ctx = analyze("  ORG S\nS LR  1,1\n");
    assert_eq!(codes(&ctx), vec!["E033"]);
}

#[test]
fn org_into_other_section() {
    let ctx = analyze("A  CSECT\nA1 LR 1,1\nB  CSECT\nB1 LR 1,1\n   ORG A1\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_into_other_loctr() {
    let ctx = analyze("A  CSECT\n   LR 1,1\nB  LOCTR\nB1 LR 1,1\nA  LOCTR\n   ORG B1\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_section_underflow() {
    let ctx = analyze("A  CSECT\n   LR 1,1\n   ORG *-3\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_loctr_underflow() {
    let ctx = analyze("A  CSECT\n   LR 1,1\nB LOCTR\n   ORG *-1\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_subtract_from_asterisk() {
    let ctx = analyze("A DS  (16)B\n  ORG *-1\nB EQU *-A\n");
    assert_eq!(abs(&ctx, "B"), 15);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_add_to_asterisk() {
    let ctx = analyze("A DS  (15)B\n  ORG *+1\nB EQU *-A\n");
    assert_eq!(abs(&ctx, "B"), 16);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_jump_to_symbol_before_space() {
    let ctx = analyze("A DS  (X)B\n  ORG A\nX EQU 1\n");
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_jump_to_symbol_plus_constant() {
    let ctx = analyze("A DS  (15)B\n  ORG A+3\nB EQU *-A\n");
    assert_eq!(abs(&ctx, "B"), 3);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_back_over_spaces() {
    let src = "   LR  1,1\nS0 DS  (X)C\n   LR  1,1\nS  ORG *-2\nX  EQU S-*\n";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "X"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_back_over_spaces_with_forward_target() {
    let src = "   LR  1,1\nS0 DS  (X)C\n   LR  1,1\nS  ORG Y-2\nX  EQU S-*\nY  EQU S\n";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "X"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_forth_and_back_by_symbols() {
    let src = "\
S0 DS  (2)C
S1 DS  (X)C
S2 DS  (2)C
S3 ORG S2
   ORG S3
X  EQU *-S2
";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "X"), 2);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_before_space_then_continue() {
    let src = "\
A      DS (8)C
B      DS (X)H
       ORG B
       DS 2H
       DS 1F
Y      EQU *-A
X      EQU 3
";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "Y"), 16);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_invalid_boundary() {
    let ctx = analyze(" ORG *,0\n ORG *,0\n ORG *,3\n ORG *,-2\n");
    assert_eq!(codes(&ctx), vec!["A116", "A116", "A116", "A116"]);
}

#[test]
fn org_boundary_use() {
    let ctx = analyze("A  DS  1C\n   ORG *,4\n   DS  1F\nB  EQU *-A\n");
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(abs(&ctx, "B"), 8);
}

#[test]
fn org_boundary_with_symbol() {
    let src = "A  DS  1C\nB  DS  (X)C\n   ORG B,4\nC  EQU *\n   DS  1F\nY  EQU *-C\nX  EQU 1\n";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "Y"), 4);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_boundary_with_symbol_resolving_later_space() {
    let src = "A  DS  1C\nB  DS  (X)C\n   ORG B,4\nC  EQU *\n   DS  1F\nX  EQU *-C\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty());
    assert_eq!(reloc_offset(&ctx, "C"), 4);
    assert_eq!(abs(&ctx, "X"), 4);
}

#[test]
fn org_boundary_alignment_cycle() {
    let src = "A  DS  (X)C\nB  DS  (4)C\n   ORG B,4\n   DS  1F\nX  EQU *-B\n";
    let ctx = analyze(src);
    assert_eq!(codes(&ctx), vec!["E033"]);
}

#[test]
fn org_invalid_offset() {
    let ctx = analyze("  ORG *,,A\nA EQU 1\n  ORG *,,*\nS EQU *+1\n  ORG *,,S\n");
    assert_eq!(codes(&ctx), vec!["A115", "A115", "A115"]);
}

#[test]
fn org_negative_offset_underflow() {
    let ctx = analyze(" ORG *,,-3\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_to_highest_location() {
    let ctx = analyze("A  DS  (4)C\nB  ORG\nX  EQU *-A\nY  EQU *-B\n");
    assert_eq!(abs(&ctx, "X"), 4);
    assert_eq!(abs(&ctx, "Y"), 0);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_back_and_to_highest() {
    let ctx = analyze("A  DS  (4)C\nB  ORG A\nC  ORG\nX  EQU *-A\nY  EQU *-B\n");
    assert_eq!(abs(&ctx, "X"), 4);
    assert_eq!(abs(&ctx, "Y"), 0);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_to_highest_deferred() {
    let ctx = analyze("A  DS  (N)C\n   ORG A\n   DS  2C\n   ORG\nX  EQU *-A\nN  EQU 6\n");
    assert_eq!(abs(&ctx, "X"), 6);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_negative_check_passes_once_resolved() {
    let src = "TEST CSECT\n  DS  (Y)C\nA DS  (4)C\n  ORG *-X\nY EQU *-A\nX EQU 2\n";
    let ctx = analyze(src);
    assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
    assert_eq!(abs(&ctx, "Y"), 2);
}

#[test]
fn org_label_equated_back() {
    let ctx = analyze("A ORG B\nB EQU A\n");
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_repeated_in_loctr() {
    let src = "A LOCTR\n DS (X)C\n ORG A+1\n ORG A+1\nX EQU 1\nB EQU *-A\n";
    let ctx = analyze(src);
    assert_eq!(abs(&ctx, "B"), 1);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn org_underflow_found_after_resolution() {
    let ctx = analyze(" DS (N)C\n ORG *-10\nN EQU 4\n");
    assert_eq!(codes(&ctx), vec!["E068"]);
}

#[test]
fn org_back_over_non_cancelling_spaces_is_cycle() {
    let src = "   LR 1,1\nS0 DS (X)C\n   LR 1,1\nX EQU *-S0\n";
    let ctx = analyze(src);
    assert_eq!(codes(&ctx), vec!["E033"]);
}

// ---------------------------------------------------------------------------
//  Driver
// ---------------------------------------------------------------------------

#[test]
fn continuation_lines_joined() {
    let first = format!("{:<71}X", "A        EQU   1+");
    let src = format!("{first}\n               2\n");
    let ctx = analyze(&src);
    assert_eq!(abs(&ctx, "A"), 3);
}

#[test]
fn comments_and_remarks_ignored() {
    let ctx = analyze("* comment line\n.* macro comment\nA EQU 5 remark text\n");
    assert_eq!(abs(&ctx, "A"), 5);
    assert!(ctx.diagnostics().is_empty());
}

#[test]
fn symbol_location_recorded() {
    let ctx = analyze("\nX EQU 1\n");
    let sym = ctx.symbol("X").unwrap();
    assert_eq!(sym.location.line, 1);
    assert_eq!(sym.location.column, 0);
}

#[test]
fn diagnostics_can_be_taken() {
    let mut ctx = analyze(" ORG 0\n");
    assert_eq!(ctx.take_diagnostics().len(), 1);
    assert!(ctx.diagnostics().is_empty());
    assert!(ctx.is_finished());
}

fn analyze_capped(source: &str, max_sweeps: usize) -> OrdinaryContext {
    let config = ResolverConfig {
        max_sweeps,
        ..ResolverConfig::default()
    };
    Analyzer::new(source).with_config(config).analyze()
}

#[test]
fn retry_cap_applies_per_cascade() {
    let src = "F1 EQU Z+1\nF2 EQU Z+2\nF3 EQU Z+3\nZ EQU 1\nB EQU A\nA EQU Y\nY EQU 7\n";
    let ctx = analyze_capped(src, 2);
    assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
    assert_eq!(abs(&ctx, "F1"), 2);
    assert_eq!(abs(&ctx, "F2"), 3);
    assert_eq!(abs(&ctx, "F3"), 4);
    assert_eq!(abs(&ctx, "Y"), 7);
    assert_eq!(abs(&ctx, "A"), 7);
    assert_eq!(abs(&ctx, "B"), 7);
    assert_eq!(ctx.pending_count(), 0);
}

#[test]
fn retry_cap_long_chain_settles_at_end() {
    let mut src = String::from("A0 EQU Z\n");
    for i in 1..20 {
        src.push_str(&format!("A{i} EQU A{}+1\n", i - 1));
    }
    src.push_str("Z EQU 5\n");
    let ctx = analyze_capped(&src, 1);
    assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
    assert_eq!(abs(&ctx, "A0"), 5);
    assert_eq!(abs(&ctx, "A19"), 24);
}

#[test]
fn retry_cap_keeps_undefined_reference_diagnostic() {
    let ctx = analyze_capped("F1 EQU Z+1\nF2 EQU Z+Q\nZ EQU 1\n", 1);
    assert_eq!(codes(&ctx), vec!["E010"]);
    assert!(ctx.diagnostics()[0].message.contains('Q'));
    assert_eq!(abs(&ctx, "F1"), 2);
    assert_eq!(abs(&ctx, "F2"), 0);
}

#[test]
fn requery_is_idempotent() {
    let mut ctx = analyze("A EQU B,11\nB EQU L'A\n");
    let first = ctx.request_attribute(AttrKind::Length, "A");
    assert_eq!(first, Evaluation::Resolved(11));
    assert_eq!(ctx.request_attribute(AttrKind::Length, "A"), first);
    assert_eq!(ctx.lookup_symbol("B"), Some(11));
    assert_eq!(ctx.lookup_symbol("B"), Some(11));
    assert!(ctx.diagnostics().is_empty());
}
