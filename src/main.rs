// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for r824asm.

use clap::Parser;

use r824::assembler::cli::{run, Cli};

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(&cli));
}
