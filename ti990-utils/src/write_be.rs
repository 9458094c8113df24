use std::io::{self, Write};

/// Write big-endian integers directly to a stream.
pub trait WriteBE: Write {
    fn write_be_u32(&mut self, val: u32) -> io::Result<()>;
}

impl<T: Write> WriteBE for T {
    fn write_be_u32(&mut self, val: u32) -> io::Result<()> {
        self.write_all(&val.to_be_bytes())
    }
}
