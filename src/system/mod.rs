// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The default R824 system: CPU, memory map, and the run loop.
//!
//! - [`memory`] - RAM/ROM devices and the region registry
//! - [`timer`] - the memory-mapped cycle timer
//!
//! The machine owns every piece of mutable state; hosts that run it on a
//! worker thread share only the stop flag, which is polled between
//! instructions.

pub mod memory;
pub mod timer;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cpu::bus::BusResult;
use crate::cpu::{Cause, Console, Cpu, StdConsole};

use memory::{Device, MapError, MemoryMap, Ram};
use timer::TimerDevice;

pub const RAM_BASE: u32 = 0x00_0000;
pub const RAM_SIZE: u32 = 10 * 1024 * 1024;
pub const VRAM_BASE: u32 = 0xE0_0000;
pub const VRAM_SIZE: u32 = 1024 * 1024;
pub const TIMER_BASE: u32 = 0xF0_0000;
pub const TIMER_SIZE: u32 = 8;

/// Outcome of a bounded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub instructions: u64,
    pub cycles: u64,
    pub halted: bool,
}

/// A complete system instance.
pub struct Machine {
    cpu: Cpu,
    bus: MemoryMap,
    console: Box<dyn Console>,
}

impl Machine {
    /// Build the default system: RAM, VRAM, and the timer, with the
    /// console wired to stdin/stdout.
    pub fn new() -> Result<Self, MapError> {
        Self::with_console(Box::new(StdConsole))
    }

    pub fn with_console(console: Box<dyn Console>) -> Result<Self, MapError> {
        let mut bus = MemoryMap::new();
        bus.map_region(RAM_BASE, RAM_SIZE, Device::Ram(Ram::new(RAM_SIZE as usize)))?;
        bus.map_region(
            VRAM_BASE,
            VRAM_SIZE,
            Device::Ram(Ram::new(VRAM_SIZE as usize)),
        )?;
        bus.map_region(TIMER_BASE, TIMER_SIZE, Device::Timer(TimerDevice::new()))?;
        Ok(Self {
            cpu: Cpu::new(),
            bus,
            console,
        })
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus_mut(&mut self) -> &mut MemoryMap {
        &mut self.bus
    }

    /// Copy a binary image into memory starting at `start`.
    pub fn load_program(&mut self, image: &[u8], start: u32) -> BusResult<()> {
        use crate::cpu::Bus;
        for (index, byte) in image.iter().enumerate() {
            self.bus.write(start.wrapping_add(index as u32), *byte)?;
        }
        Ok(())
    }

    /// Execute one instruction, feed its cycles to the timer, and post
    /// the timer interrupt when the comparison fires.
    pub fn step(&mut self) -> BusResult<u32> {
        let cycles = self.cpu.step(&mut self.bus, &mut *self.console)?;
        if let Some(timer) = self.bus.timer_mut() {
            if timer.tick(cycles) {
                self.cpu.set_interrupt_pending(Cause::Timer);
            }
        }
        Ok(cycles)
    }

    /// Run until the host raises `stop`. A halted CPU keeps polling the
    /// flag; every step is then a zero-cycle no-op.
    pub fn run(&mut self, stop: &AtomicBool) -> BusResult<u64> {
        let mut cycles: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            cycles += self.step()? as u64;
        }
        Ok(cycles)
    }

    /// Run until HLT or the step bound, whichever comes first.
    pub fn run_until_halt(&mut self, max_steps: u64) -> BusResult<RunSummary> {
        let mut summary = RunSummary {
            instructions: 0,
            cycles: 0,
            halted: false,
        };
        for _ in 0..max_steps {
            if self.cpu.halted() {
                break;
            }
            summary.cycles += self.step()? as u64;
            summary.instructions += 1;
        }
        summary.halted = self.cpu.halted();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::assembler::{r824_arch, Assembler};
    use crate::cpu::{Bus, MTVEC};

    struct NullConsole;

    impl Console for NullConsole {
        fn print(&mut self, _text: &str) -> io::Result<()> {
            Ok(())
        }

        fn read_char(&mut self) -> io::Result<u8> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"))
        }

        fn read_line(&mut self) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input"))
        }
    }

    fn assemble(source: &str) -> Vec<u8> {
        let mut assembler = Assembler::new(r824_arch().expect("built-in table must compile"));
        let state = assembler.assemble_source(source);
        assert!(
            !state.diagnostics.iter().any(|diag| diag.is_error()),
            "unexpected errors: {:?}",
            state.diagnostics
        );
        state.output.iter().map(|word| (*word & 0xFF) as u8).collect()
    }

    fn machine_with(source: &str) -> Machine {
        let image = assemble(source);
        let mut machine = Machine::with_console(Box::new(NullConsole)).unwrap();
        machine.load_program(&image, 0).unwrap();
        machine
    }

    #[test]
    fn add_and_store_program_lands_in_ram() {
        let mut machine = machine_with("ldl #0x05\nldl #0x07\nadd\nst #0x1000\nhlt\n");
        let summary = machine.run_until_halt(100).unwrap();
        assert!(summary.halted);
        assert_eq!(machine.bus_mut().read(0x1000).unwrap(), 0x0C);
        assert_eq!(machine.bus_mut().read(0x1001).unwrap(), 0x00);
        assert_eq!(machine.bus_mut().read(0x1002).unwrap(), 0x00);
    }

    #[test]
    fn self_jump_keeps_iptr_cycling_through_the_instruction() {
        let mut machine = machine_with("start:\nj start\n");
        for _ in 0..5 {
            machine.step().unwrap();
            // each step walks IPtr 0 -> 2 -> back to 0
            assert_eq!(machine.cpu().iptr(), 0);
        }
        assert!(!machine.cpu().halted());
    }

    #[test]
    fn timer_write_fires_within_sixteen_cycles_and_vectors() {
        // Arm the timer with mtimecmp = 2, then idle in NOPs.
        let source = "ei\nldl #2\nst #0xf00000\nnop\nnop\nnop\nnop\nnop\nnop\nnop\nnop\n";
        let image = assemble(source);
        let mut machine = Machine::with_console(Box::new(NullConsole)).unwrap();
        // Keep the trap vector clear of the program so the jump is visible.
        machine.load_program(&image, 0x100).unwrap();
        machine.cpu_mut().set_iptr(0x100);

        let mut vectored = false;
        let mut cycles = 0u64;
        for _ in 0..16 {
            cycles += machine.step().unwrap() as u64;
            if machine.cpu().iptr() == MTVEC {
                vectored = true;
                break;
            }
        }
        assert!(vectored, "timer interrupt did not arrive after {cycles} cycles");
        assert_eq!(machine.cpu().current_interrupt(), Some(Cause::Timer));
    }

    #[test]
    fn unmapped_access_terminates_the_run() {
        let mut machine = Machine::with_console(Box::new(NullConsole)).unwrap();
        // Jump straight into unmapped space between RAM and VRAM.
        machine.cpu_mut().set_iptr(0xA0_0000);
        let fault = machine.step().unwrap_err();
        assert_eq!(fault.addr, 0xA0_0000);
    }

    #[test]
    fn stop_flag_ends_the_loop_even_when_halted() {
        let mut machine = machine_with("hlt\n");
        let stop = AtomicBool::new(false);
        machine.run_until_halt(10).unwrap();
        stop.store(true, Ordering::Relaxed);
        // a stopped loop returns immediately with no further cycles
        assert_eq!(machine.run(&stop).unwrap(), 0);
    }
}
