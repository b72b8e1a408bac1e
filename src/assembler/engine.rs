// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler state and per-line processing.
//!
//! Lines are stripped of comments, labels bind to the current IP, and
//! the remainder is tried against every rule in table order; the first
//! matching rule that also encodes cleanly wins. Numeric operands that
//! fail to parse are treated as symbols and deferred through the fixup
//! list.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::error::{Diagnostic, Severity};
use super::fixups::Fixup;
use super::output::SourceLine;
use super::spec::{CompiledArch, CompiledRule, Endian, RuleBits};

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+):").expect("label pattern compiles"));

/// Host-supplied loader behind `.arch`, `.include`, and `.module`.
pub trait ArchLoader {
    /// Resolve an architecture name to a compiled description.
    fn load_arch(&self, name: &str) -> Result<CompiledArch, String>;
    /// Resolve an include/module name to its source text.
    fn load_source(&self, name: &str) -> Result<String, String>;
}

/// A successfully encoded instruction: the accumulated opcode and its
/// bit length. Multi-word encodings emit most-significant word first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Instruction {
    pub opcode: i64,
    pub nbits: u32,
}

pub struct Assembler {
    pub(crate) arch: CompiledArch,
    pub(crate) width: u32,
    pub(crate) ip: i64,
    pub(crate) origin: i64,
    pub(crate) linenum: u32,
    pub(crate) codelen: i64,
    pub(crate) symbols: HashMap<String, i64>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) outwords: Vec<u32>,
    pub(crate) asmlines: Vec<SourceLine>,
    pub(crate) fixups: Vec<Fixup>,
    pub(crate) aborted: bool,
    pub(crate) loader: Option<Box<dyn ArchLoader>>,
}

impl Assembler {
    pub fn new(arch: CompiledArch) -> Self {
        let width = if arch.width != 0 { arch.width } else { 8 };
        Self {
            arch,
            width,
            ip: 0,
            origin: 0,
            linenum: 0,
            codelen: 0,
            symbols: HashMap::new(),
            diagnostics: Vec::new(),
            outwords: Vec::new(),
            asmlines: Vec::new(),
            fixups: Vec::new(),
            aborted: false,
            loader: None,
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn ArchLoader>) {
        self.loader = Some(loader);
    }

    /// Assemble a whole source text and finalize.
    pub fn assemble_source(&mut self, text: &str) -> super::output::AssemblerState {
        for line in text.lines() {
            if self.aborted {
                break;
            }
            self.assemble_line(line);
        }
        self.finish()
    }

    pub(crate) fn warning_at(&mut self, message: impl Into<String>, line: u32) {
        self.diagnostics
            .push(Diagnostic::new(line, Severity::Warning, message));
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        let line = self.linenum;
        self.warning_at(message, line);
    }

    /// A fatal diagnostic stops further line processing; fixups and
    /// serialization still run so the report is complete.
    pub(crate) fn fatal(&mut self, message: impl Into<String>) {
        let line = self.linenum;
        self.diagnostics
            .push(Diagnostic::new(line, Severity::Error, message));
        self.aborted = true;
    }

    /// Process one source line.
    pub(crate) fn assemble_line(&mut self, raw: &str) {
        self.linenum += 1;

        // Comments run from ';' to end of line.
        let line = match raw.find(';') {
            Some(at) => &raw[..at],
            None => raw,
        };
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if line.starts_with('.') {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            self.parse_directive(&tokens);
            return;
        }

        let line = line.to_lowercase();

        // Bind every `name:` prefix to the current IP, then drop them.
        for caps in LABEL_RE.captures_iter(&line) {
            if let Some(label) = caps.get(1) {
                self.symbols.insert(label.as_str().to_string(), self.ip);
            }
        }
        let line = LABEL_RE.replace_all(&line, "");
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let mut last_error: Option<String> = None;
        for index in 0..self.arch.rules.len() {
            let captured = {
                let rule = &self.arch.rules[index];
                if !rule.prefix.is_empty() && !line.starts_with(rule.prefix.as_str()) {
                    continue;
                }
                rule.re.captures(line).map(|caps| {
                    (1..=rule.varlist.len())
                        .map(|group| {
                            caps.get(group)
                                .map(|m| m.as_str().to_string())
                                .unwrap_or_default()
                        })
                        .collect::<Vec<String>>()
                })
            };
            let Some(captured) = captured else {
                continue;
            };
            match self.build_instruction(index, &captured) {
                Ok((instruction, fixups, warnings)) => {
                    for message in warnings {
                        self.warning(message);
                    }
                    self.fixups.extend(fixups);
                    self.add_instruction(instruction);
                    return;
                }
                Err(message) => last_error = Some(message),
            }
        }

        match last_error {
            Some(message) => self.warning(message),
            None => self.warning(format!("Could not decode instruction: {line}")),
        }
    }

    /// Walk a rule's bit components and accumulate the opcode.
    ///
    /// Errors are returned (not recorded) so the caller can keep trying
    /// later rules; fixups and size warnings are committed only when the
    /// rule is accepted.
    fn build_instruction(
        &self,
        rule_index: usize,
        captured: &[String],
    ) -> Result<(Instruction, Vec<Fixup>, Vec<String>), String> {
        let rule: &CompiledRule = &self.arch.rules[rule_index];
        let mut opcode: i64 = 0;
        let mut oplen: u32 = 0;
        let mut fixups = Vec::new();

        for field in &rule.bits {
            let (n, x) = match field {
                RuleBits::Literal { len, value } => (*len, *value as i64),
                RuleBits::Var(index) | RuleBits::Slice { var: index, .. } => {
                    let text = &captured[*index];
                    let name = &rule.varlist[*index];
                    let Some(var) = self.arch.vars.get(name) else {
                        return Err(format!("Could not find variable definition for '~{name}'"));
                    };
                    let (n, shift) = match field {
                        RuleBits::Slice { shift, len, .. } => (*len, *shift),
                        _ => (var.bits, 0),
                    };

                    let mut x: i64;
                    if let Some(toks) = &var.toks {
                        match toks.iter().position(|tok| tok == text) {
                            Some(position) => x = position as i64,
                            None => {
                                return Err(format!(
                                    "Can't use '{text}' here, only one of: {}",
                                    toks.join(", ")
                                ))
                            }
                        }
                    } else {
                        match parse_const(text) {
                            Some(value) => {
                                let mask = mask64(var.bits) as i64;
                                if value & mask != value {
                                    return Err(format!(
                                        "Value {value} does not fit in {} bits",
                                        var.bits
                                    ));
                                }
                                x = value;
                            }
                            None => {
                                // Not a number: a symbol reference, patched
                                // after the whole file has been seen.
                                fixups.push(Fixup {
                                    sym: text.clone(),
                                    ofs: self.ip,
                                    size: var.bits,
                                    srcofs: 0,
                                    dstofs: oplen,
                                    dstlen: n,
                                    line: self.linenum,
                                    iprel: var.iprel,
                                    ipofs: var.ipofs,
                                    ipmul: if var.ipmul == 0 { 1 } else { var.ipmul },
                                    endian: var.endian,
                                });
                                x = 0;
                            }
                        }
                    }

                    if var.endian == Endian::Little {
                        x = swap_endian(x, var.bits, self.width);
                    }
                    if let RuleBits::Slice { .. } = field {
                        x = (((x as u64) & 0xFFFF_FFFF) >> shift) as i64 & mask64(n) as i64;
                    }
                    (n, x)
                }
            };

            opcode = (opcode << n) | x;
            oplen += n;
        }

        let mut warnings = Vec::new();
        if oplen == 0 {
            warnings.push("Opcode had zero length".to_string());
        } else if oplen > 32 {
            warnings.push(format!("Opcode wider than 32 bits ({oplen} bits)"));
        } else if oplen % self.width != 0 {
            warnings.push(format!("Opcode was not word-aligned ({oplen} bits)"));
        }

        Ok((
            Instruction {
                opcode,
                nbits: oplen,
            },
            fixups,
            warnings,
        ))
    }

    /// Emit an encoded instruction, most-significant word first.
    pub(crate) fn add_instruction(&mut self, instruction: Instruction) {
        self.asmlines.push(SourceLine {
            line: self.linenum,
            offset: self.ip,
            nbits: instruction.nbits,
            insns: String::new(),
        });
        let words = instruction.nbits / self.width;
        for index in 0..words {
            let word = if self.width < 32 {
                ((instruction.opcode >> ((words - 1 - index) * self.width)) as u64
                    & mask64(self.width)) as u32
            } else {
                instruction.opcode as u32
            };
            self.outwords.push(word);
            self.ip += 1;
        }
    }

    /// Append raw data words, one per value.
    pub(crate) fn add_words(&mut self, data: &[i64]) {
        self.asmlines.push(SourceLine {
            line: self.linenum,
            offset: self.ip,
            nbits: self.width * data.len() as u32,
            insns: String::new(),
        });
        for value in data {
            let word = if self.width < 32 {
                (*value as u64 & mask64(self.width)) as u32
            } else {
                *value as u32
            };
            self.outwords.push(word);
            self.ip += 1;
        }
    }

    pub(crate) fn align_ip(&mut self, align: i64) {
        if align < 1 || align > self.codelen {
            self.fatal("Invalid alignment value");
        } else {
            self.ip = (self.ip + align - 1) / align * align;
        }
    }

    /// Numeric literal or symbol-table lookup, used by directives.
    pub(crate) fn parse_value(&self, token: &str) -> Option<i64> {
        parse_const(token).or_else(|| self.symbols.get(&token.to_lowercase()).copied())
    }

    pub fn symbol(&self, name: &str) -> Option<i64> {
        self.symbols.get(name).copied()
    }
}

/// Parse a decimal, `0x`-prefixed hex, or `$`-prefixed hex literal.
/// Anything else is assumed to be a symbol.
pub(crate) fn parse_const(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

pub(crate) fn mask64(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Reverse a value's bit groups of `width` bits across `nbits`.
pub(crate) fn swap_endian(value: i64, mut nbits: u32, width: u32) -> i64 {
    let mut v = value as u64 & mask64(32);
    let mut y: u64 = 0;
    while nbits > 0 {
        let n = nbits.min(width);
        y = (y << n) | (v & mask64(n));
        v >>= n;
        nbits -= n;
    }
    y as i64
}
