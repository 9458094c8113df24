//! Emulation of the TI990 hard disk controller.
//!
//! The controller is driven entirely through eight 16-bit registers: the
//! host fills in a command, unit, CHS address, byte count and DMA address,
//! then clears the idle bit in w7. The command runs to completion before
//! that register write returns, moving data between a disk image and host
//! memory, and the outcome is reported in w0/w7 and on the interrupt line.

mod controller;
mod error;
mod image;
mod interrupt;
mod memory;
pub mod registers;
mod unit;

// Public API.
pub use controller::*;
pub use error::{AttachError, GeometryError, SeekError};
pub use image::{create_blank_image, BackingStore, DiskFile, DiskImageHeader, MemoryDisk,
                HEADER_LEN, MAX_SECTOR_SIZE};
pub use interrupt::{interrupt_level, InterruptSink, NoInterrupt};
pub use memory::{next_dma_address, HostMemory, Ram,
                 DMA_ADDRESS_MASK, DMA_WINDOW_SIZE, DMA_WINDOW_WORDS};
pub use unit::{DiskUnit, Geometry, UnitId, MAX_UNITS};

/// Logging setup for tests; safe to call from every test.
#[cfg(test)]
pub fn init_test_logging() {
    use simplelog::{Config, LevelFilter, TestLogger};

    // The logger can only be initialised once, but we don't know the order of
    // tests. Therefore we use `init` and ignore the result.
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}
