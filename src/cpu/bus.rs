// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Byte-addressed bus contract between the CPU and the memory system.

use thiserror::Error;

/// Fault raised when an access touches an address no device claims.
///
/// There is no recovery path: the run loop surfaces the fault and stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no memory region mapped for address {addr:#08x}")]
pub struct BusFault {
    pub addr: u32,
}

pub type BusResult<T> = Result<T, BusFault>;

/// A byte-addressed memory target.
///
/// Addresses arrive already masked to the 24-bit space; devices see
/// absolute addresses and dispatch internally.
pub trait Bus {
    fn read(&mut self, addr: u32) -> BusResult<u8>;
    fn write(&mut self, addr: u32, value: u8) -> BusResult<()>;
}
