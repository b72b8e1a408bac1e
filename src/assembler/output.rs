// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Finalization and output serialization.

use std::io::{self, Write};

use super::engine::Assembler;
use super::error::Diagnostic;

/// Per-source-line emission metadata, including the rendered hex words
/// produced during finalization.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub line: u32,
    pub offset: i64,
    pub nbits: u32,
    pub insns: String,
}

/// Snapshot of a finished assembly.
#[derive(Debug, Clone)]
pub struct AssemblerState {
    pub ip: i64,
    pub line: u32,
    pub origin: i64,
    pub codelen: i64,
    pub output: Vec<u32>,
    pub lines: Vec<SourceLine>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Assembler {
    /// Resolve fixups, render per-line hex, pad the output up to the
    /// declared code length, and snapshot the result.
    pub fn finish(&mut self) -> AssemblerState {
        self.resolve_fixups();

        let width = self.width;
        let origin = self.origin;
        let digits = (width / 4).max(1);
        for asm_line in &mut self.asmlines {
            let words = asm_line.nbits / width;
            let mut text = String::new();
            for word_index in 0..words {
                let index = asm_line.offset + word_index as i64 - origin;
                let word = if index >= 0 && (index as usize) < self.outwords.len() {
                    self.outwords[index as usize]
                } else {
                    0
                };
                if word_index > 0 {
                    text.push(' ');
                }
                text.push_str(&hex(word, digits));
            }
            asm_line.insns = text;
        }

        while (self.outwords.len() as i64) < self.codelen {
            self.outwords.push(0);
        }

        AssemblerState {
            ip: self.ip,
            line: self.linenum,
            origin: self.origin,
            codelen: self.codelen,
            output: self.outwords.clone(),
            lines: self.asmlines.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

/// Zero-padded uppercase hex.
pub(crate) fn hex(value: u32, digits: u32) -> String {
    format!("{value:0width$X}", width = digits as usize)
}

/// Serialize the output stream, one byte per word (the low eight bits of
/// each emitted word).
pub fn write_binary<W: Write>(state: &AssemblerState, writer: &mut W) -> io::Result<()> {
    for word in &state.output {
        writer.write_all(&[(*word & 0xFF) as u8])?;
    }
    Ok(())
}

/// Render a human-readable listing: line number, address, emitted words,
/// and the original source text.
pub fn listing_text(state: &AssemblerState, source: &str) -> String {
    let sources: Vec<&str> = source.lines().collect();
    let mut out = String::new();
    for line in &state.lines {
        let text = line
            .line
            .checked_sub(1)
            .and_then(|index| sources.get(index as usize))
            .copied()
            .unwrap_or("");
        out.push_str(&format!(
            "{:5}  {:06X}  {:<20}  {}\n",
            line.line,
            line.offset as u32 & 0xFF_FFFF,
            line.insns,
            text
        ));
    }
    out
}
