// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Architecture descriptions and rule compilation.
//!
//! A description names its variables and an ordered rule list. Each rule
//! format string becomes one anchored, case-insensitive regex; rule order
//! is preserved and defines first-match priority at assembly time.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use super::error::SpecError;

/// Byte order of a multi-word variable within its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Operand variable: bit width plus interpretation flags.
///
/// A token list makes the variable an enumeration: matched text encodes
/// as its zero-based token index. `iprel` marks branch-style operands
/// whose fixups resolve relative to the instruction address.
#[derive(Debug, Clone, Deserialize)]
pub struct VarSpec {
    pub bits: u32,
    #[serde(default)]
    pub toks: Option<Vec<String>>,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub iprel: bool,
    #[serde(default)]
    pub ipofs: i32,
    #[serde(default)]
    pub ipmul: i32,
}

/// One `bits` entry as it appears in the JSON document: a binary literal
/// string, a bare variable index, or an `{a, b, n}` slice.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BitField {
    Literal(String),
    Var(usize),
    Slice { a: usize, b: u32, n: u32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub fmt: String,
    pub bits: Vec<BitField>,
}

/// The raw architecture document, straight from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchSpec {
    pub name: String,
    /// Word width in bits; 0 means "unspecified, keep the current width".
    #[serde(default)]
    pub width: u32,
    pub vars: HashMap<String, VarSpec>,
    pub rules: Vec<RuleSpec>,
}

/// A validated `bits` component with literals pre-parsed.
#[derive(Debug, Clone)]
pub enum RuleBits {
    Literal { len: u32, value: u32 },
    Var(usize),
    Slice { var: usize, shift: u32, len: u32 },
}

/// A rule with its compiled matcher. The k-th capture of `re`
/// corresponds to the k-th entry of `varlist`.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub fmt: String,
    pub prefix: String,
    pub re: Regex,
    pub varlist: Vec<String>,
    pub bits: Vec<RuleBits>,
}

/// An architecture ready for assembly.
#[derive(Debug, Clone)]
pub struct CompiledArch {
    pub name: String,
    pub width: u32,
    pub vars: HashMap<String, VarSpec>,
    pub rules: Vec<CompiledRule>,
}

impl ArchSpec {
    pub fn from_json(text: &str) -> Result<ArchSpec, SpecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Turn every rule into a matcher, rejecting the description when a
    /// rule references a variable that does not exist.
    pub fn compile(self) -> Result<CompiledArch, SpecError> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            rules.push(compile_rule(rule, &self.vars)?);
        }
        Ok(CompiledArch {
            name: self.name,
            width: self.width,
            vars: self.vars,
            rules,
        })
    }
}

fn compile_rule(
    rule: &RuleSpec,
    vars: &HashMap<String, VarSpec>,
) -> Result<CompiledRule, SpecError> {
    let (pattern, varlist) = rule_pattern(&rule.fmt, vars)?;
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| SpecError::BadRegex {
            rule: rule.fmt.clone(),
            source: Box::new(source),
        })?;

    let mut bits = Vec::with_capacity(rule.bits.len());
    for field in &rule.bits {
        bits.push(match field {
            BitField::Literal(text) => {
                let value = u32::from_str_radix(text, 2).map_err(|_| SpecError::BadLiteral {
                    rule: rule.fmt.clone(),
                    literal: text.clone(),
                })?;
                RuleBits::Literal {
                    len: text.len() as u32,
                    value,
                }
            }
            BitField::Var(index) => {
                check_var_index(&rule.fmt, *index, varlist.len())?;
                RuleBits::Var(*index)
            }
            BitField::Slice { a, b, n } => {
                check_var_index(&rule.fmt, *a, varlist.len())?;
                RuleBits::Slice {
                    var: *a,
                    shift: *b,
                    len: *n,
                }
            }
        });
    }

    // Mnemonic prefix for cheap pre-filtering; left empty when the
    // format string opens with a variable.
    let first = rule.fmt.split_whitespace().next().unwrap_or("");
    let prefix = if first.contains('~') {
        String::new()
    } else {
        first.to_lowercase()
    };
    Ok(CompiledRule {
        fmt: rule.fmt.clone(),
        prefix,
        re,
        varlist,
        bits,
    })
}

fn check_var_index(fmt: &str, index: usize, len: usize) -> Result<(), SpecError> {
    if index >= len {
        return Err(SpecError::VarIndex {
            rule: fmt.to_string(),
            index,
        });
    }
    Ok(())
}

/// Build the anchored pattern for one format string.
///
/// Literal punctuation is escaped, whitespace runs collapse to `\s+`,
/// and each `~name` becomes a capture group: a word group for
/// enumerations, a numeric/symbolic group otherwise.
fn rule_pattern(
    fmt: &str,
    vars: &HashMap<String, VarSpec>,
) -> Result<(String, Vec<String>), SpecError> {
    let mut pattern = String::from("^");
    let mut varlist = Vec::new();
    let mut chars = fmt.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '+' | '*' | '[' | ']' | '(' | ')' | '.' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                pattern.push_str(r"\s+");
            }
            '~' => {
                let mut name = String::new();
                while let Some(next) = chars.peek() {
                    if !next.is_alphanumeric() && *next != '_' {
                        break;
                    }
                    name.push(*next);
                    chars.next();
                }
                let var = vars.get(&name).ok_or_else(|| SpecError::UnknownVar {
                    rule: fmt.to_string(),
                    var: name.clone(),
                })?;
                if var.toks.is_some() {
                    pattern.push_str(r"(\w+)");
                } else {
                    pattern.push_str(r"([0-9]+|\$[0-9a-f]+|\w+)");
                }
                varlist.push(name);
            }
            c => pattern.push(c),
        }
    }
    pattern.push('$');
    Ok((pattern, varlist))
}
