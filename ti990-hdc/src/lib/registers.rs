//! The controller's eight 16-bit registers and their bit assignments.

use crate::memory::DMA_ADDRESS_MASK;

pub const NUM_REGISTERS: usize = 8;

// w0: status byte (controller-owned), attention lines and their enables.
pub const W0_OFFLINE: u16 = 0x8000;
pub const W0_NOT_READY: u16 = 0x4000;
pub const W0_WRITE_PROTECT: u16 = 0x2000;
pub const W0_UNSAFE: u16 = 0x1000;
pub const W0_END_OF_CYLINDER: u16 = 0x0800;
pub const W0_SEEK_INCOMPLETE: u16 = 0x0400;
pub const W0_OFFSET_ACTIVE: u16 = 0x0200;
pub const W0_PACK_CHANGE: u16 = 0x0100;
pub const W0_STATUS: u16 = 0xFF00;
pub const W0_ATTENTION_LINES: u16 = 0x00F0;
pub const W0_ATTENTION_ENABLES: u16 = 0x000F;

// w1: command word.
pub const W1_EXTENDED_COMMAND: u16 = 0xC000;
pub const W1_TRANSFER_INHIBIT: u16 = 0x0800;
pub const W1_COMMAND: u16 = 0x0700;
pub const W1_OFFSET: u16 = 0x0080;
pub const W1_OFFSET_FORWARD: u16 = 0x0040;
pub const W1_HEAD_ADDRESS: u16 = 0x003F;

// w6: unit select, shared with the top of the DMA address.
pub const W6_UNIT0_SELECT: u16 = 0x0800;
pub const W6_UNIT1_SELECT: u16 = 0x0400;
pub const W6_UNIT2_SELECT: u16 = 0x0200;
pub const W6_UNIT3_SELECT: u16 = 0x0100;
pub const W6_UNIT_SELECT: u16 = 0x0F00;
pub const W6_DMA_ADDRESS_HIGH: u16 = 0x001F;

// w7: controller status.
pub const W7_IDLE: u16 = 0x8000;
pub const W7_COMPLETE: u16 = 0x4000;
pub const W7_ERROR: u16 = 0x2000;
pub const W7_INT_ENABLE: u16 = 0x1000;
pub const W7_LOCK_OUT: u16 = 0x0800;
pub const W7_RETRY: u16 = 0x0400;
pub const W7_ECC: u16 = 0x0200;
pub const W7_ABNORMAL_COMPLETION: u16 = 0x0100;
pub const W7_MEMORY_ERROR: u16 = 0x0080;
pub const W7_DATA_ERROR: u16 = 0x0040;
pub const W7_TILINE_TIMEOUT: u16 = 0x0020;
pub const W7_HEADER_ERROR: u16 = 0x0010;
pub const W7_RATE_ERROR: u16 = 0x0008;
pub const W7_COMMAND_TIMEOUT: u16 = 0x0004;
pub const W7_SEARCH_ERROR: u16 = 0x0002;
pub const W7_UNIT_ERROR: u16 = 0x0001;
/// Everything describing the outcome of the last command.
pub const W7_OUTCOME: u16 = W7_COMPLETE | W7_ERROR | 0x07FF;

/// Bits the host may change in each register.
pub const WRITE_MASKS: [u16; NUM_REGISTERS] =
    [0x000F, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, !W7_LOCK_OUT];

// Byte lanes a write may leave untouched.
pub const LANE_LOW: u8 = 0b01;
pub const LANE_HIGH: u8 = 0b10;

/// Expand a set of preserved byte lanes into a bit mask.
fn lane_mask(preserve_lanes: u8) -> u16 {
    let mut mask = 0;
    if preserve_lanes & LANE_LOW != 0 {
        mask |= 0x00FF;
    }
    if preserve_lanes & LANE_HIGH != 0 {
        mask |= 0xFF00;
    }
    mask
}

/// The attention line bit in `w0` for a unit.
pub fn attention_line(unit: usize) -> u16 {
    0x0080 >> unit
}

/// The attention enable bit in `w0` for a unit.
pub fn attention_enable(unit: usize) -> u16 {
    0x0008 >> unit
}

/// Raw register storage. Host writes go through `merge`; the controller
/// itself uses `set` and the field helpers, which bypass the write masks.
#[derive(Debug, Default)]
pub(crate) struct RegisterFile {
    w: [u16; NUM_REGISTERS],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero everything except the idle bit.
    pub fn reset(&mut self) {
        self.w = [0; NUM_REGISTERS];
        self.w[7] = W7_IDLE;
    }

    pub fn get(&self, index: usize) -> u16 {
        self.w[index]
    }

    pub fn set(&mut self, index: usize, value: u16) {
        self.w[index] = value;
    }

    /// Apply a host write: only bits in the register's write mask change, and
    /// only within the byte lanes not preserved. Returns the previous value.
    pub fn merge(&mut self, index: usize, data: u16, preserve_lanes: u8) -> u16 {
        let old = self.w[index];
        let mask = WRITE_MASKS[index];
        let preserve = lane_mask(preserve_lanes);
        self.w[index] = (old & (!mask | preserve)) | (data & mask & !preserve);
        old
    }

    pub fn is_idle(&self) -> bool {
        self.w[7] & W7_IDLE != 0
    }

    /// Forget the previous command's outcome at the start of a new one.
    pub fn clear_outcome(&mut self) {
        self.w[0] &= !W0_STATUS;
        self.w[7] &= !W7_OUTCOME;
    }

    pub fn raise_attention(&mut self, unit: usize) {
        self.w[0] |= attention_line(unit);
    }

    pub fn lower_attention(&mut self, unit: usize) {
        self.w[0] &= !attention_line(unit);
    }

    pub fn command(&self) -> u16 {
        (self.w[1] & W1_COMMAND) >> 8
    }

    pub fn extended_command(&self) -> u16 {
        (self.w[1] & W1_EXTENDED_COMMAND) >> 14
    }

    pub fn transfer_inhibited(&self) -> bool {
        self.w[1] & W1_TRANSFER_INHIBIT != 0
    }

    pub fn head(&self) -> u32 {
        (self.w[1] & W1_HEAD_ADDRESS) as u32
    }

    pub fn sector(&self) -> u32 {
        (self.w[2] & 0x00FF) as u32
    }

    pub fn cylinder(&self) -> u32 {
        self.w[3] as u32
    }

    /// Transfers are word granular, so the LSB is ignored.
    pub fn byte_count(&self) -> u32 {
        (self.w[4] & 0xFFFE) as u32
    }

    pub fn unit_select_bits(&self) -> u16 {
        self.w[6] & W6_UNIT_SELECT
    }

    pub fn dma_address_high_bits(&self) -> u16 {
        self.w[6] & W6_DMA_ADDRESS_HIGH
    }

    pub fn dma_address(&self) -> u32 {
        (((self.dma_address_high_bits() as u32) << 16) | self.w[5] as u32) & DMA_ADDRESS_MASK
    }

    pub fn set_dma_address(&mut self, address: u32) {
        self.w[5] = address as u16;
        self.w[6] = (self.w[6] & !W6_DMA_ADDRESS_HIGH)
            | ((address >> 16) as u16 & W6_DMA_ADDRESS_HIGH);
    }

    /// Leave a transfer's final position in the address registers.
    pub fn set_position(&mut self, cylinder: u32, head: u32, sector: u32) {
        self.w[1] = (self.w[1] & !W1_HEAD_ADDRESS) | (head as u16 & W1_HEAD_ADDRESS);
        self.w[2] = (self.w[2] & 0xFF00) | (sector as u16 & 0x00FF);
        self.w[3] = cylinder as u16;
    }

    pub fn set_byte_count(&mut self, count: u32) {
        self.w[4] = count as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset() {
        let mut regs = RegisterFile::new();
        regs.set(3, 0x1234);
        regs.reset();
        assert_eq!(regs.get(3), 0);
        assert_eq!(regs.get(7), W7_IDLE);
        assert!(regs.is_idle());
    }

    #[test]
    fn test_merge_masks() {
        let mut regs = RegisterFile::new();
        regs.set(0, 0xA5F0);
        assert_eq!(regs.merge(0, 0xFFFF, 0), 0xA5F0);
        assert_eq!(regs.get(0), 0xA5FF);
        regs.merge(0, 0x0000, 0);
        assert_eq!(regs.get(0), 0xA5F0);

        regs.merge(7, 0xFFFF, 0);
        assert_eq!(regs.get(7), 0xF7FF);
    }

    #[test]
    fn test_merge_byte_lanes() {
        let mut regs = RegisterFile::new();
        regs.set(3, 0x1234);
        regs.merge(3, 0xABCD, LANE_LOW);
        assert_eq!(regs.get(3), 0xAB34);
        regs.merge(3, 0x5678, LANE_HIGH);
        assert_eq!(regs.get(3), 0xAB78);
        regs.merge(3, 0x0000, LANE_LOW | LANE_HIGH);
        assert_eq!(regs.get(3), 0xAB78);
    }

    #[test]
    fn test_dma_address() {
        let mut regs = RegisterFile::new();
        regs.set(5, 0x3457);
        regs.set(6, W6_UNIT2_SELECT | 0x00F2);
        // Bit 0 and everything above bit 20 are dropped.
        assert_eq!(regs.dma_address(), 0x12_3456);
        assert_eq!(regs.unit_select_bits(), W6_UNIT2_SELECT);
        assert_eq!(regs.dma_address_high_bits(), 0x0012);

        regs.set_dma_address(0x1F_FFFE);
        assert_eq!(regs.get(5), 0xFFFE);
        assert_eq!(regs.get(6), W6_UNIT2_SELECT | 0x00FF);
    }

    #[test]
    fn test_fields() {
        let mut regs = RegisterFile::new();
        regs.set(1, 0xC000 | W1_TRANSFER_INHIBIT | 0x0500 | 0x0021);
        regs.set(2, 0x7F09);
        regs.set(3, 0x0133);
        regs.set(4, 0x0201);
        assert_eq!(regs.extended_command(), 3);
        assert!(regs.transfer_inhibited());
        assert_eq!(regs.command(), 5);
        assert_eq!(regs.head(), 0x21);
        assert_eq!(regs.sector(), 9);
        assert_eq!(regs.cylinder(), 0x133);
        assert_eq!(regs.byte_count(), 0x200);

        regs.set_position(2, 1, 3);
        assert_eq!(regs.get(1), 0xC000 | W1_TRANSFER_INHIBIT | 0x0500 | 0x0001);
        assert_eq!(regs.get(2), 0x7F03);
        assert_eq!(regs.get(3), 2);
    }

    #[test]
    fn test_attention_bits() {
        assert_eq!(attention_line(0), 0x0080);
        assert_eq!(attention_line(3), 0x0010);
        assert_eq!(attention_enable(0), 0x0008);
        assert_eq!(attention_enable(3), 0x0001);
        assert_eq!(attention_line(2) >> 4, attention_enable(2));
    }
}
