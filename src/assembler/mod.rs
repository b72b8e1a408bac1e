// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Table-driven assembler.
//!
//! An architecture description (JSON) declares operand variables and an
//! ordered rule list; each rule pairs a source format with the bit
//! pattern it emits. The engine matches lines against the compiled
//! rules, emits words, and patches symbol references in a fixup pass
//! after the whole file has been read.
//!
//! - [`spec`] - architecture descriptions and rule compilation
//! - [`cli`] - the `r824asm` command line

pub mod cli;
mod directives;
mod engine;
mod error;
mod fixups;
mod output;
pub mod spec;
#[cfg(test)]
mod tests;

pub use engine::{ArchLoader, Assembler};
pub use error::{Diagnostic, Severity, SpecError};
pub use output::{listing_text, write_binary, AssemblerState, SourceLine};

use spec::{ArchSpec, CompiledArch};

/// The built-in R824 architecture description.
pub const R824_ARCH_JSON: &str = include_str!("../../arch/r824.json");

/// Compile the built-in R824 rule table.
pub fn r824_arch() -> Result<CompiledArch, SpecError> {
    ArchSpec::from_json(R824_ARCH_JSON)?.compile()
}

/// One-shot assembly of a source text against an architecture.
pub fn assemble_source(arch: CompiledArch, text: &str) -> AssemblerState {
    Assembler::new(arch).assemble_source(text)
}
