// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface for `r824asm`.

use std::fs::{self, File};
use std::path::PathBuf;

use clap::Parser;

use super::engine::ArchLoader;
use super::spec::{ArchSpec, CompiledArch};
use super::{listing_text, r824_arch, write_binary, Assembler};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Table-driven assembler for the R824 24-bit stack CPU.

Assembles INPUT.ASM against the built-in R824 rule table (or the table
given with --arch) and writes the binary image to OUTPUT.BIN. Exit status
is 0 on success, 1 on a configuration error, and 2 when the assembly
surfaced any diagnostic.";

#[derive(Parser, Debug)]
#[command(
    name = "r824asm",
    version = VERSION,
    about = "R824 table-driven assembler",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    /// Assembly source file.
    #[arg(value_name = "INPUT.ASM")]
    pub input: PathBuf,
    /// Binary image output file.
    #[arg(value_name = "OUTPUT.BIN")]
    pub output: PathBuf,
    #[arg(
        long = "arch",
        value_name = "FILE",
        long_help = "Architecture description (JSON) to assemble against \
                     instead of the built-in R824 table."
    )]
    pub arch: Option<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        long_help = "Write a listing (line, address, emitted words, source) to FILE."
    )]
    pub list: Option<PathBuf>,
}

/// Filesystem loader behind `.arch`/`.include`/`.module`, resolving
/// names relative to the input file's directory.
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }
}

impl ArchLoader for FsLoader {
    fn load_arch(&self, name: &str) -> Result<CompiledArch, String> {
        let path = self.base.join(format!("{name}.json"));
        let text = fs::read_to_string(&path)
            .map_err(|err| format!("Could not load arch file '{}': {err}", path.display()))?;
        ArchSpec::from_json(&text)
            .and_then(ArchSpec::compile)
            .map_err(|err| format!("Could not load arch file '{}': {err}", path.display()))
    }

    fn load_source(&self, name: &str) -> Result<String, String> {
        let path = self.base.join(name);
        fs::read_to_string(&path)
            .map_err(|err| format!("Could not load include file '{}': {err}", path.display()))
    }
}

/// Run the assembler CLI. Returns the process exit code.
pub fn run(cli: &Cli) -> i32 {
    let arch = match &cli.arch {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    eprintln!("{}: {err}", path.display());
                    return 1;
                }
            };
            match ArchSpec::from_json(&text).and_then(ArchSpec::compile) {
                Ok(arch) => arch,
                Err(err) => {
                    eprintln!("{}: {err}", path.display());
                    return 1;
                }
            }
        }
        None => match r824_arch() {
            Ok(arch) => arch,
            Err(err) => {
                eprintln!("built-in architecture table: {err}");
                return 1;
            }
        },
    };

    let source = match fs::read_to_string(&cli.input) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}: {err}", cli.input.display());
            return 1;
        }
    };

    let mut assembler = Assembler::new(arch);
    let base = cli
        .input
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    assembler.set_loader(Box::new(FsLoader::new(base)));
    let state = assembler.assemble_source(&source);

    if !state.diagnostics.is_empty() {
        let input = cli.input.display().to_string();
        for diagnostic in &state.diagnostics {
            eprintln!("{}", diagnostic.format_with_file(&input));
        }
        return 2;
    }

    let mut output = match File::create(&cli.output) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("{}: {err}", cli.output.display());
            return 1;
        }
    };
    if let Err(err) = write_binary(&state, &mut output) {
        eprintln!("{}: {err}", cli.output.display());
        return 1;
    }

    if let Some(path) = &cli.list {
        if let Err(err) = fs::write(path, listing_text(&state, &source)) {
            eprintln!("{}: {err}", path.display());
            return 1;
        }
    }

    0
}
