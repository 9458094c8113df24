//! Host memory as seen by the controller's DMA engine.
//!
//! The controller addresses a 21-bit (2MiB) window of word-aligned memory.
//! Hosts provide their own `HostMemory`; the bundled `Ram` covers the whole
//! window and comes in two flavours: `memory_eager`, a single vector of
//! words, and `memory_lazy` (feature `lazy-ram`), which only allocates pages
//! that have been written.

#[cfg(not(feature = "lazy-ram"))]
mod memory_eager;
#[cfg(not(feature = "lazy-ram"))]
pub use memory_eager::Ram;

#[cfg(feature = "lazy-ram")]
mod memory_lazy;
#[cfg(feature = "lazy-ram")]
pub use memory_lazy::Ram;

/// Size in bytes of the DMA window.
pub const DMA_WINDOW_SIZE: usize = 1 << 21;
/// Valid DMA addresses: even and below `DMA_WINDOW_SIZE`.
pub const DMA_ADDRESS_MASK: u32 = 0x1F_FFFE;
/// Number of 16-bit words in the DMA window.
pub const DMA_WINDOW_WORDS: usize = DMA_WINDOW_SIZE / 2;

/// Memory the controller can transfer words to and from. Addresses are
/// already masked with `DMA_ADDRESS_MASK`.
pub trait HostMemory {
    fn read_word(&self, address: u32) -> u16;
    fn write_word(&mut self, address: u32, value: u16);
}

/// Step a DMA address on by one word, wrapping within the window.
pub fn next_dma_address(address: u32) -> u32 {
    address.wrapping_add(2) & DMA_ADDRESS_MASK
}

fn word_index(address: u32) -> usize {
    ((address & DMA_ADDRESS_MASK) >> 1) as usize
}

impl HostMemory for Ram {
    fn read_word(&self, address: u32) -> u16 {
        self[word_index(address)]
    }

    fn write_word(&mut self, address: u32, value: u16) {
        self[word_index(address)] = value;
    }
}

impl Ram {
    /// Copy `words` into memory starting at `address`, wrapping at the top
    /// of the window like the controller does.
    pub fn load(&mut self, address: u32, words: &[u16]) {
        let mut address = address & DMA_ADDRESS_MASK;
        for &word in words {
            self.write_word(address, word);
            address = next_dma_address(address);
        }
    }

    /// Read `count` words starting at `address`, wrapping at the top of the
    /// window.
    pub fn dump(&self, address: u32, count: usize) -> Vec<u16> {
        let mut address = address & DMA_ADDRESS_MASK;
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(self.read_word(address));
            address = next_dma_address(address);
        }
        words
    }
}
