// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Directive dispatch.
//!
//! Directives are recognized before the line is lowercased, so `.string`
//! payloads keep their case. Numeric arguments accept the same literal
//! forms as operands and additionally resolve through the symbol table.

use super::engine::Assembler;

impl Assembler {
    pub(crate) fn parse_directive(&mut self, tokens: &[&str]) {
        let command = tokens[0].to_lowercase();
        match command.as_str() {
            ".define" => self.define_directive(tokens),
            ".org" => {
                if let Some(value) = self.directive_value(tokens, 1) {
                    self.ip = value;
                    self.origin = value;
                }
            }
            ".len" => {
                if let Some(value) = self.directive_value(tokens, 1) {
                    self.codelen = value;
                }
            }
            ".width" => {
                if let Some(value) = self.directive_value(tokens, 1) {
                    if (1..=32).contains(&value) {
                        self.width = value as u32;
                    } else {
                        self.fatal(format!("Unsupported word width {value}"));
                    }
                }
            }
            ".arch" => self.arch_directive(tokens),
            ".include" | ".module" => self.include_directive(tokens),
            ".data" => self.data_directive(tokens),
            ".string" => self.string_directive(tokens),
            ".align" => {
                if let Some(value) = self.directive_value(tokens, 1) {
                    self.align_ip(value);
                }
            }
            _ => self.warning(format!("Unrecognized directive: {}", tokens.join(" "))),
        }
    }

    /// Fetch and resolve a directive argument; missing or unresolvable
    /// arguments are fatal, matching the all-or-nothing directive model.
    fn directive_value(&mut self, tokens: &[&str], position: usize) -> Option<i64> {
        let Some(token) = tokens.get(position) else {
            self.fatal(format!("Missing argument for {}", tokens[0]));
            return None;
        };
        let value = self.parse_value(token);
        if value.is_none() {
            self.fatal(format!("Invalid value '{token}' for {}", tokens[0]));
        }
        value
    }

    fn define_directive(&mut self, tokens: &[&str]) {
        let Some(name) = tokens.get(1) else {
            self.fatal("Missing name for .define");
            return;
        };
        let name = name.to_lowercase();
        if let Some(value) = self.directive_value(tokens, 2) {
            self.symbols.insert(name, value);
        }
    }

    fn arch_directive(&mut self, tokens: &[&str]) {
        let Some(name) = tokens.get(1) else {
            self.fatal("Missing architecture name for .arch");
            return;
        };
        let result = match &self.loader {
            Some(loader) => loader.load_arch(name),
            None => Err(format!("No loader available for '{name}'")),
        };
        match result {
            Ok(arch) => {
                if arch.width != 0 {
                    self.width = arch.width;
                }
                self.arch = arch;
            }
            Err(message) => self.fatal(message),
        }
    }

    fn include_directive(&mut self, tokens: &[&str]) {
        let Some(name) = tokens.get(1) else {
            self.fatal(format!("Missing file name for {}", tokens[0]));
            return;
        };
        let result = match &self.loader {
            Some(loader) => loader.load_source(name),
            None => Err(format!("No loader available for '{name}'")),
        };
        match result {
            Ok(text) => {
                // Included lines keep their own numbering; the outer
                // file's counter resumes afterwards.
                let saved = self.linenum;
                self.linenum = 0;
                for line in text.lines() {
                    if self.aborted {
                        break;
                    }
                    self.assemble_line(line);
                }
                self.linenum = saved;
            }
            Err(message) => self.fatal(message),
        }
    }

    fn data_directive(&mut self, tokens: &[&str]) {
        let mut data = Vec::with_capacity(tokens.len().saturating_sub(1));
        for token in &tokens[1..] {
            match self.parse_value(token) {
                Some(value) => data.push(value),
                None => {
                    self.warning(format!("Invalid constant '{token}' in .data"));
                    data.push(0);
                }
            }
        }
        self.add_words(&data);
    }

    fn string_directive(&mut self, tokens: &[&str]) {
        let text = tokens[1..].join(" ");
        let data: Vec<i64> = text.chars().map(|ch| ch as i64).collect();
        self.add_words(&data);
    }
}
