use log::{trace, warn};

use super::HardDiskController;
use crate::error::{CommandError, CommandResult, GeometryError};
use crate::image::MAX_SECTOR_SIZE;
use crate::interrupt::InterruptSink;
use crate::memory::{next_dma_address, HostMemory};
use crate::registers::RegisterFile;
use crate::unit::{Geometry, UnitId};

/// Per-sector overhead reported by Store Registers. Image sectors are stored
/// back to back, so there is none.
const SECTOR_OVERHEAD_BYTES: u16 = 0;

/// Where a multi-sector transfer has got to.
struct Transfer {
    cylinder: u32,
    head: u32,
    sector: u32,
    dma_address: u32,
    remaining: u32,
}

impl Transfer {
    fn from_registers(regs: &RegisterFile) -> Self {
        Transfer {
            cylinder: regs.cylinder(),
            head: regs.head(),
            sector: regs.sector(),
            dma_address: regs.dma_address(),
            remaining: regs.byte_count(),
        }
    }

    /// Move to the next sector, carrying into the head and then the cylinder.
    fn advance(&mut self, geometry: &Geometry) {
        self.sector += 1;
        if self.sector >= geometry.sectors_per_track {
            self.sector = 0;
            self.head += 1;
            if self.head >= geometry.heads {
                self.head = 0;
                self.cylinder += 1;
            }
        }
    }

    /// Leave the position, count and address in the registers for the host.
    fn write_back(&self, regs: &mut RegisterFile) {
        regs.set_position(self.cylinder, self.head, self.sector);
        regs.set_byte_count(self.remaining);
        regs.set_dma_address(self.dma_address);
    }
}

impl<M: HostMemory, S: InterruptSink> HardDiskController<M, S> {
    /// Store a word to host memory and step the address on.
    fn dma_store(&mut self, address: &mut u32, word: u16) {
        self.memory.write_word(*address, word);
        *address = next_dma_address(*address);
    }

    /// Fetch a word from host memory and step the address on.
    fn dma_load(&mut self, address: &mut u32) -> u16 {
        let word = self.memory.read_word(*address);
        *address = next_dma_address(*address);
        word
    }

    /// DMA up to three summary words, as many as the byte count allows,
    /// unless transfers are inhibited.
    fn store_summary(&mut self, words: &[u16; 3]) {
        if self.regs.transfer_inhibited() {
            return;
        }
        let count = words.len().min((self.regs.byte_count() / 2) as usize);
        let mut address = self.regs.dma_address();
        for &word in &words[..count] {
            self.dma_store(&mut address, word);
        }
    }

    /// Command 0: report the selected unit's geometry.
    pub(super) fn store_registers(&mut self) -> CommandResult {
        let unit = self.online_unit()?;
        self.units[unit].clear_unsafe();
        let geometry = self.units[unit].geometry();
        let words_per_track =
            (geometry.sectors_per_track as u64 * geometry.bytes_per_sector as u64) >> 1;
        let summary = [
            words_per_track as u16,
            ((geometry.sectors_per_track as u16) << 8) | SECTOR_OVERHEAD_BYTES,
            ((geometry.heads << 11) | geometry.cylinders) as u16,
        ];
        self.store_summary(&summary);
        Ok(())
    }

    /// Command 1: fill one track with zeroed sectors.
    pub(super) fn write_format(&mut self) -> CommandResult {
        let unit = self.writable_unit()?;
        let cylinder = self.regs.cylinder();
        let head = self.regs.head();
        self.units[unit].seek(cylinder, head, 0)?;

        let geometry = self.units[unit].geometry();
        let sector_size = geometry.bytes_per_sector as usize;
        let zeros = [0; MAX_SECTOR_SIZE];
        for _ in 0..geometry.sectors_per_track {
            if self.units[unit].write_sector(&zeros[..sector_size]) != sector_size {
                return Err(CommandError::WriteFailed);
            }
        }
        trace!("Formatted C{} H{} on unit {}.", cylinder, head, unit);
        Ok(())
    }

    /// Command 2: transfer sectors from the pack into host memory.
    pub(super) fn read_data(&mut self) -> CommandResult {
        let unit = self.ready_unit()?;
        let mut transfer = Transfer::from_registers(&self.regs);
        self.units[unit].seek(transfer.cylinder, transfer.head, transfer.sector)?;
        let result = self.read_sectors(unit, &mut transfer);
        transfer.write_back(&mut self.regs);
        result
    }

    fn read_sectors(&mut self, unit: UnitId, transfer: &mut Transfer) -> CommandResult {
        let geometry = self.units[unit].geometry();
        let inhibit = self.regs.transfer_inhibited();
        let mut buffer = [0; MAX_SECTOR_SIZE];

        while transfer.remaining > 0 {
            if transfer.cylinder > geometry.cylinders {
                return Err(GeometryError::CylinderOutOfRange.into());
            }
            let wanted = transfer.remaining.min(geometry.bytes_per_sector) as usize;
            if wanted == 0 {
                // Zero-byte sectors: nothing can ever be read.
                return Err(CommandError::ReadFailed);
            }
            let read = self.units[unit].read_sector(&mut buffer[..wanted]);
            if read != wanted {
                return Err(CommandError::ReadFailed);
            }
            if !inhibit {
                let mut address = transfer.dma_address;
                for pair in buffer[..read].chunks(2) {
                    let word = u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]);
                    self.dma_store(&mut address, word);
                }
                transfer.dma_address = address;
            }
            trace!("Read C{} H{} S{} ({} bytes) on unit {}.",
                   transfer.cylinder, transfer.head, transfer.sector, read, unit);
            transfer.remaining -= read as u32;
            transfer.advance(&geometry);
        }
        Ok(())
    }

    /// Command 3: transfer host memory onto the pack. Transfer inhibit does
    /// not apply to writes.
    pub(super) fn write_data(&mut self) -> CommandResult {
        let unit = self.writable_unit()?;
        let mut transfer = Transfer::from_registers(&self.regs);
        self.units[unit].seek(transfer.cylinder, transfer.head, transfer.sector)?;
        let result = self.write_sectors(unit, &mut transfer);
        transfer.write_back(&mut self.regs);
        result
    }

    fn write_sectors(&mut self, unit: UnitId, transfer: &mut Transfer) -> CommandResult {
        let geometry = self.units[unit].geometry();
        let sector_size = geometry.bytes_per_sector as usize;
        let mut buffer = [0; MAX_SECTOR_SIZE];

        while transfer.remaining > 0 {
            if transfer.cylinder > geometry.cylinders {
                return Err(GeometryError::CylinderOutOfRange.into());
            }
            if sector_size == 0 {
                return Err(CommandError::WriteFailed);
            }
            let filled = (transfer.remaining as usize).min(sector_size);
            let mut address = transfer.dma_address;
            for pair in buffer[..filled].chunks_mut(2) {
                let [upper, lower] = self.dma_load(&mut address).to_be_bytes();
                pair[0] = upper;
                if let Some(byte) = pair.get_mut(1) {
                    *byte = lower;
                }
            }
            transfer.dma_address = address;
            // A partial last sector is padded out with zeroes.
            buffer[filled..sector_size].fill(0);

            if self.units[unit].write_sector(&buffer[..sector_size]) != sector_size {
                return Err(CommandError::WriteFailed);
            }
            trace!("Wrote C{} H{} S{} ({} bytes) on unit {}.",
                   transfer.cylinder, transfer.head, transfer.sector, filled, unit);
            transfer.remaining -= filled as u32;
            transfer.advance(&geometry);
        }
        Ok(())
    }

    /// Command 4: echo the sector header the controller would look for.
    pub(super) fn unformatted_read(&mut self) -> CommandResult {
        let unit = self.ready_unit()?;
        let cylinder = self.regs.cylinder();
        let head = self.regs.head();
        let sector = self.regs.sector();
        let geometry = self.units[unit].geometry();
        geometry.validate(cylinder, head, sector)?;
        let header = [
            ((head << 11) | cylinder) as u16,
            ((1 << 8) | sector) as u16,
            (geometry.bytes_per_sector >> 1) as u16,
        ];
        self.store_summary(&header);
        Ok(())
    }

    /// Command 5: not supported.
    pub(super) fn unformatted_write(&mut self) -> CommandResult {
        warn!("Unformatted write is not implemented.");
        Err(CommandError::Unsupported)
    }

    /// Command 6: positioning is recomputed from the registers by every data
    /// command, so there's nothing to do.
    pub(super) fn seek(&mut self) -> CommandResult {
        Ok(())
    }

    /// Command 7: return to cylinder 0 and trust the pack again.
    pub(super) fn restore(&mut self) -> CommandResult {
        let unit = self.online_unit()?;
        self.units[unit].clear_unsafe();
        self.units[unit].seek(0, 0, 0)?;
        Ok(())
    }
}
