// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Headless runner: load a binary image and execute until HLT.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use r824::system::Machine;

const LONG_ABOUT: &str = "Boots the default R824 system (RAM, VRAM, timer),
loads IMAGE.BIN into memory, and runs the interpreter until the guest
executes HLT or the step bound is reached. Guest console I/O goes to
stdin/stdout; the run summary goes to stderr.";

#[derive(Parser, Debug)]
#[command(
    name = "r824run",
    version,
    about = "R824 system runner",
    long_about = LONG_ABOUT
)]
struct Cli {
    /// Binary image to load.
    #[arg(value_name = "IMAGE.BIN")]
    image: PathBuf,
    #[arg(
        long = "origin",
        value_name = "ADDR",
        default_value = "0",
        value_parser = parse_address,
        long_help = "Load address for the image (decimal, 0x-hex, or $-hex)."
    )]
    origin: u32,
    #[arg(
        long = "entry",
        value_name = "ADDR",
        default_value = "0",
        value_parser = parse_address,
        long_help = "Initial instruction pointer (decimal, 0x-hex, or $-hex)."
    )]
    entry: u32,
    #[arg(
        long = "max-steps",
        value_name = "N",
        long_help = "Stop after N instructions even without HLT."
    )]
    max_steps: Option<u64>,
}

fn parse_address(text: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse::<u32>()
    };
    parsed.map_err(|err| format!("invalid address '{text}': {err}"))
}

fn main() {
    let cli = Cli::parse();

    let image = match fs::read(&cli.image) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{}: {err}", cli.image.display());
            std::process::exit(1);
        }
    };

    let mut machine = match Machine::new() {
        Ok(machine) => machine,
        Err(err) => {
            eprintln!("system configuration: {err}");
            std::process::exit(1);
        }
    };
    if let Err(fault) = machine.load_program(&image, cli.origin) {
        eprintln!("loading image: {fault}");
        std::process::exit(1);
    }
    machine.cpu_mut().set_iptr(cli.entry);

    match machine.run_until_halt(cli.max_steps.unwrap_or(u64::MAX)) {
        Ok(summary) => {
            eprintln!(
                "{} after {} instructions ({} cycles)",
                if summary.halted { "halted" } else { "stopped" },
                summary.instructions,
                summary.cycles
            );
        }
        Err(fault) => {
            eprintln!("runtime fault: {fault}");
            std::process::exit(1);
        }
    }
}
