// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::collections::HashMap;

use super::engine::ArchLoader;
use super::spec::{ArchSpec, CompiledArch};
use super::{r824_arch, Assembler, AssemblerState};

fn r824() -> CompiledArch {
    r824_arch().expect("built-in table compiles")
}

fn assemble(text: &str) -> AssemblerState {
    Assembler::new(r824()).assemble_source(text)
}

fn bytes(state: &AssemblerState) -> Vec<u8> {
    state.output.iter().map(|word| (*word & 0xFF) as u8).collect()
}

fn messages(state: &AssemblerState) -> Vec<String> {
    state
        .diagnostics
        .iter()
        .map(|diag| diag.message.clone())
        .collect()
}

fn assert_clean(state: &AssemblerState) {
    assert!(
        state.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        messages(state)
    );
}

struct MapLoader {
    sources: HashMap<String, String>,
}

impl ArchLoader for MapLoader {
    fn load_arch(&self, name: &str) -> Result<CompiledArch, String> {
        Err(format!("Could not load arch file '{name}'"))
    }

    fn load_source(&self, name: &str) -> Result<String, String> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Could not load include file '{name}'"))
    }
}

#[test]
fn data_directive_emits_the_given_bytes() {
    let state = assemble(".org 0\n.data $01 $02 $03\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x01, 0x02, 0x03]);
}

#[test]
fn blank_comment_and_label_only_lines_emit_nothing() {
    let mut assembler = Assembler::new(r824());
    assembler.assemble_line("; just a comment");
    assembler.assemble_line("");
    assembler.assemble_line("entry:");
    assembler.assemble_line("   \t ");
    let state = assembler.finish();
    assert_clean(&state);
    assert!(state.output.is_empty());
    assert_eq!(state.ip, 0);
    assert_eq!(assembler.symbol("entry"), Some(0));
}

#[test]
fn multiple_labels_on_one_line_all_bind() {
    let mut assembler = Assembler::new(r824());
    assembler.assemble_line("first: second: nop");
    assembler.finish();
    assert_eq!(assembler.symbol("first"), Some(0));
    assert_eq!(assembler.symbol("second"), Some(0));
}

#[test]
fn labels_are_case_insensitive() {
    let mut assembler = Assembler::new(r824());
    assembler.assemble_line("Loop: nop");
    assembler.assemble_line("j LOOP");
    let state = assembler.finish();
    assert_clean(&state);
    assert_eq!(assembler.symbol("loop"), Some(0));
}

#[test]
fn mnemonics_match_case_insensitively() {
    let state = assemble("NoP\nHLT\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x00, 0xFF]);
}

#[test]
fn literal_push_rules_win_over_the_general_immediate() {
    let state = assemble("ldl #0\nldl #1\nldl #2\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x83, 0x87, 0x8B, 0x02, 0x00, 0x00]);
}

#[test]
fn immediate_operands_emit_little_endian() {
    let state = assemble("ldl #0x1000\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x8B, 0x00, 0x10, 0x00]);
}

#[test]
fn fused_store_expands_to_push_swap_store() {
    let state = assemble("st #0x1000\n");
    assert_eq!(bytes(&state), vec![0x8B, 0x00, 0x10, 0x00, 0x0C, 0xF8]);
    // the fused form is wider than one 32-bit opcode and says so
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("wider than 32 bits")));
}

#[test]
fn emitted_bit_counts_match_the_rule_components() {
    let state = assemble("sll 1\nsra 4\nldl @7\nbeq 0\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x30, 0xBE, 0x1F, 0x42, 0x00]);
    let nbits: Vec<u32> = state.lines.iter().map(|line| line.nbits).collect();
    assert_eq!(nbits, vec![8, 8, 8, 16]);
}

#[test]
fn workspace_rules_encode_the_slot_number() {
    let state = assemble("ldl @0\nldl @15\nstl @0\nstl @15\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x03, 0x3F, 0x43, 0x7F]);
}

#[test]
fn self_jump_resolves_to_a_looping_offset() {
    let state = assemble("start:\nj start\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x62, 0xFE]);
}

#[test]
fn forward_reference_resolves_after_finalize() {
    let state = assemble("j end\nnop\nend:\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x62, 0x01, 0x00]);
}

#[test]
fn define_binds_a_symbol_usable_as_an_operand() {
    let state = assemble(".define base $1234\nldl #base\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x8B, 0x34, 0x12, 0x00]);
}

#[test]
fn directive_arguments_resolve_through_the_symbol_table() {
    let state = assemble(".define count 4\n.len count\nnop\n");
    assert_clean(&state);
    assert_eq!(state.output.len(), 4);
}

#[test]
fn forward_reference_honors_variable_endianness() {
    let toy = ArchSpec::from_json(
        r#"{
            "name": "toy",
            "vars": {
                "big16": { "bits": 16 },
                "lit16": { "bits": 16, "endian": "little" }
            },
            "rules": [
                { "fmt": "dw ~big16", "bits": ["00000001", 0] },
                { "fmt": "dl ~lit16", "bits": ["00000010", 0] }
            ]
        }"#,
    )
    .unwrap()
    .compile()
    .unwrap();

    let state = Assembler::new(toy.clone()).assemble_source("dw later\nlater:\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x01, 0x00, 0x03]);

    let state = Assembler::new(toy).assemble_source("dl later\nlater:\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x02, 0x03, 0x00]);
}

#[test]
fn slices_splice_the_selected_bits() {
    let toy = ArchSpec::from_json(
        r#"{
            "name": "toy",
            "vars": { "imm": { "bits": 16 } },
            "rules": [
                { "fmt": "hi ~imm", "bits": ["0001", { "a": 0, "b": 12, "n": 4 }] }
            ]
        }"#,
    )
    .unwrap()
    .compile()
    .unwrap();
    let state = Assembler::new(toy).assemble_source("hi $a555\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x1A]);
}

#[test]
fn output_length_is_the_larger_of_emitted_and_declared() {
    let state = assemble(".len 8\nnop\n");
    assert_clean(&state);
    assert_eq!(state.output.len(), 8);
    assert_eq!(bytes(&state)[0], 0x00);

    let state = assemble(".len 1\nnop\nnop\n");
    assert_clean(&state);
    assert_eq!(state.output.len(), 2);
}

#[test]
fn reassembly_is_byte_identical() {
    let source = "start:\nldl #5\nldl #7\nadd\nbne start\njal done\nnop\ndone:\nhlt\n";
    let first = assemble(source);
    let second = assemble(source);
    assert_clean(&first);
    assert_eq!(bytes(&first), bytes(&second));
}

#[test]
fn unknown_enum_token_reports_the_allowed_set() {
    let state = assemble("sll 9\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("only one of")));
}

#[test]
fn too_wide_immediate_is_rejected() {
    let state = assemble("u #300\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("does not fit in 8 bits")));
}

#[test]
fn unmatched_line_reports_could_not_decode() {
    let state = assemble("frobnicate\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Could not decode instruction")));
}

#[test]
fn unknown_directive_is_a_nonfatal_warning() {
    let state = assemble(".bogus 1\nnop\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Unrecognized directive")));
    // processing continued past the warning
    assert_eq!(bytes(&state), vec![0x00]);
}

#[test]
fn align_rejects_zero_and_values_beyond_the_code_length() {
    let state = assemble(".align 0\nfrobnicate\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Invalid alignment value")));
    // the fatal stopped line processing before the bad line
    assert!(!messages(&state)
        .iter()
        .any(|message| message.contains("Could not decode")));

    let state = assemble(".len 4\n.align 8\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Invalid alignment value")));
}

#[test]
fn width_directive_rejects_unusable_widths() {
    let state = assemble(".width 0\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Unsupported word width")));
    let state = assemble(".width 64\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("Unsupported word width")));
}

#[test]
fn unresolved_symbol_surfaces_after_finalize() {
    let state = assemble("j nowhere\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("'nowhere' not found")));
}

#[test]
fn string_directive_emits_character_codes() {
    let state = assemble(".string AB\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x41, 0x42]);
}

#[test]
fn include_assembles_the_loaded_text_inline() {
    let mut sources = HashMap::new();
    sources.insert("lib".to_string(), "nop\nhlt\n".to_string());
    let mut assembler = Assembler::new(r824());
    assembler.set_loader(Box::new(MapLoader { sources }));
    let state = assembler.assemble_source(".include lib\nnop\n");
    assert_clean(&state);
    assert_eq!(bytes(&state), vec![0x00, 0xFF, 0x00]);
}

#[test]
fn arch_and_include_without_a_loader_are_fatal() {
    let state = assemble(".arch other\nnop\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("No loader available")));
    // aborted: the trailing nop was never processed
    assert!(state.output.is_empty());

    let state = assemble(".include lib\n");
    assert!(messages(&state)
        .iter()
        .any(|message| message.contains("No loader available")));
}

#[test]
fn listing_contains_addresses_words_and_source() {
    let source = "nop\nldl #0x1000\n";
    let state = assemble(source);
    assert_clean(&state);
    let listing = super::listing_text(&state, source);
    assert!(listing.contains("000000"));
    assert!(listing.contains("8B 00 10 00"));
    assert!(listing.contains("ldl #0x1000"));
}

#[test]
fn rendered_line_hex_reflects_patched_fixups() {
    let state = assemble("j end\nnop\nend:\n");
    assert_eq!(state.lines[0].insns, "62 01");
}
