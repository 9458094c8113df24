mod commands;   // Command handlers moved to separate file due to length.


use log::{debug, info, trace, warn};

use crate::error::{AttachError, CommandError, CommandResult};
use crate::image::BackingStore;
use crate::interrupt::{interrupt_level, InterruptSink};
use crate::memory::HostMemory;
use crate::registers::*;
use crate::unit::{DiskUnit, UnitId, MAX_UNITS};

// Command codes in the w1 command field.
pub const COMMAND_STORE_REGISTERS: u16 = 0;
pub const COMMAND_WRITE_FORMAT: u16 = 1;
pub const COMMAND_READ_DATA: u16 = 2;
pub const COMMAND_WRITE_DATA: u16 = 3;
pub const COMMAND_UNFORMATTED_READ: u16 = 4;
pub const COMMAND_UNFORMATTED_WRITE: u16 = 5;
pub const COMMAND_SEEK: u16 = 6;
pub const COMMAND_RESTORE: u16 = 7;

/// A TI990 hard disk controller with up to `MAX_UNITS` drives.
///
/// Commands run synchronously: the register write that starts a command
/// returns only once the command has finished, file I/O included. The
/// controller does no locking of its own; a host sharing it between threads
/// must wrap it in a mutex.
pub struct HardDiskController<M, S> {
    regs: RegisterFile,
    units: [DiskUnit; MAX_UNITS],
    memory: M,
    interrupt: S,
}

impl<M: HostMemory, S: InterruptSink> HardDiskController<M, S> {
    /// Construct a controller with no units attached, DMAing to `memory` and
    /// signalling on `interrupt`. The controller starts out reset.
    pub fn new(memory: M, interrupt: S) -> Self {
        let mut controller = HardDiskController {
            regs: RegisterFile::new(),
            units: std::array::from_fn(|_| DiskUnit::new()),
            memory,
            interrupt,
        };
        controller.init();
        controller
    }

    /// Reset the registers. Attention lines are raised again for every unit
    /// that has a pack attached.
    pub fn init(&mut self) {
        self.regs.reset();
        for (id, unit) in self.units.iter().enumerate() {
            if unit.is_attached() {
                self.regs.raise_attention(id);
            }
        }
        info!("Disk controller reset.");
        self.update_interrupt();
    }

    /// Handle a register read. Out-of-range registers read as zero.
    pub fn read(&self, index: usize) -> u16 {
        if index < NUM_REGISTERS {
            self.regs.get(index)
        } else {
            0
        }
    }

    /// Handle a register write. `preserve_lanes` (a combination of
    /// `LANE_LOW` and `LANE_HIGH`) names the byte lanes the host did not
    /// drive. Clearing the idle bit in w7 runs the command in w1 before this
    /// returns.
    pub fn write(&mut self, index: usize, value: u16, preserve_lanes: u8) {
        if index >= NUM_REGISTERS {
            trace!("Ignoring write to nonexistent register {}.", index);
            return;
        }
        if index != 7 && !self.regs.is_idle() {
            trace!("Ignoring write to w{} while busy.", index);
            return;
        }

        let old = self.regs.merge(index, value, preserve_lanes);
        if index == 0 || index == 7 {
            self.update_interrupt();
        }
        if index == 7 && old & W7_IDLE != 0 && !self.regs.is_idle() {
            self.execute_command();
        }
    }

    /// Insert a pack into a unit. The unit starts out unsafe, and its
    /// attention line is raised.
    pub fn attach<B>(&mut self, unit: UnitId, store: B) -> Result<(), AttachError>
        where B: BackingStore + 'static
    {
        let slot = self.units.get_mut(unit).ok_or(AttachError::InvalidUnit(unit))?;
        if slot.is_attached() {
            return Err(AttachError::AlreadyAttached(unit));
        }
        slot.attach(Box::new(store))?;
        info!("Unit {} attached.", unit);
        self.regs.raise_attention(unit);
        self.update_interrupt();
        Ok(())
    }

    /// Remove the pack from a unit, returning its backing store. Detaching an
    /// empty or nonexistent unit does nothing.
    pub fn detach(&mut self, unit: UnitId) -> Option<Box<dyn BackingStore>> {
        let store = self.units.get_mut(unit)?.detach();
        if store.is_some() {
            info!("Unit {} detached.", unit);
        }
        self.regs.lower_attention(unit);
        self.update_interrupt();
        store
    }

    /// The unit chosen by the select bits in w6: the lowest numbered one if
    /// several are set.
    pub fn current_unit(&self) -> Option<UnitId> {
        let select = self.regs.unit_select_bits();
        let unit = [W6_UNIT0_SELECT, W6_UNIT1_SELECT, W6_UNIT2_SELECT, W6_UNIT3_SELECT]
            .iter()
            .position(|&bit| select & bit != 0)?;
        if unit < MAX_UNITS { Some(unit) } else { None }
    }

    pub fn unit(&self, unit: UnitId) -> Option<&DiskUnit> {
        self.units.get(unit)
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    /// The current interrupt line level.
    pub fn interrupt_asserted(&self) -> bool {
        interrupt_level(self.regs.get(0), self.regs.get(7))
    }

    /// Recompute the interrupt line and tell the sink.
    fn update_interrupt(&mut self) -> bool {
        let level = self.interrupt_asserted();
        self.interrupt.set_level(level);
        level
    }

    /// Run the command in w1 to completion. Always leaves the controller idle.
    fn execute_command(&mut self) {
        self.regs.clear_outcome();

        if self.regs.extended_command() != 0 {
            warn!("Extended command {} is not implemented; running base command.",
                  self.regs.extended_command());
        }
        let command = self.regs.command();
        let result = match command {
            COMMAND_STORE_REGISTERS => self.store_registers(),
            COMMAND_WRITE_FORMAT => self.write_format(),
            COMMAND_READ_DATA => self.read_data(),
            COMMAND_WRITE_DATA => self.write_data(),
            COMMAND_UNFORMATTED_READ => self.unformatted_read(),
            COMMAND_UNFORMATTED_WRITE => self.unformatted_write(),
            COMMAND_SEEK => self.seek(),
            COMMAND_RESTORE => self.restore(),
            _ => unreachable!(),  // Three-bit field.
        };
        self.finish(command, result);
    }

    /// Publish a command's outcome in w0 and w7 and return to idle.
    fn finish(&mut self, command: u16, result: CommandResult) {
        match result {
            Ok(()) => {
                debug!("Command {} complete.", command);
                self.regs.set(7, self.regs.get(7) | W7_IDLE | W7_COMPLETE);
            }
            Err(e) => {
                debug!("Command {} failed: {:?}.", command, e);
                let (w0_bits, w7_bits) = e.status_bits();
                self.regs.set(0, self.regs.get(0) | w0_bits);
                self.regs.set(7, self.regs.get(7) | W7_IDLE | W7_ERROR | w7_bits);
            }
        }
        self.update_interrupt();
    }

    /// The selected unit, provided it has a pack attached.
    fn online_unit(&self) -> Result<UnitId, CommandError> {
        let unit = self.current_unit().ok_or(CommandError::NoUnitSelected)?;
        if !self.units[unit].is_attached() {
            return Err(CommandError::UnitOffline);
        }
        Ok(unit)
    }

    /// The selected unit, provided it is attached and its position is known.
    fn ready_unit(&self) -> Result<UnitId, CommandError> {
        let unit = self.online_unit()?;
        if self.units[unit].is_unsafe() {
            return Err(CommandError::UnitUnsafe);
        }
        Ok(unit)
    }

    /// The selected unit, provided it can be written to.
    fn writable_unit(&self) -> Result<UnitId, CommandError> {
        let unit = self.online_unit()?;
        if self.units[unit].is_write_protected() {
            return Err(CommandError::WriteProtected);
        }
        if self.units[unit].is_unsafe() {
            return Err(CommandError::UnitUnsafe);
        }
        Ok(unit)
    }
}
