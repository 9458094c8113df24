use std::io::{self, Read};

/// Read big-endian integers directly from a stream.
pub trait ReadBE: Read {
    fn read_be_u32(&mut self) -> io::Result<u32>;

    /// Read `N` consecutive big-endian u32 fields, failing if the stream ends
    /// before all of them are present.
    fn read_be_u32_fields<const N: usize>(&mut self) -> io::Result<[u32; N]> {
        let mut fields = [0; N];
        for field in fields.iter_mut() {
            *field = self.read_be_u32()?;
        }
        Ok(fields)
    }
}

impl<T: Read> ReadBE for T {
    fn read_be_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_fields_in_order() {
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x01, 0x32,
            0x00, 0x00, 0x00, 0x05,
            0x12, 0x34]);
        let fields: [u32; 2] = input.read_be_u32_fields().unwrap();
        assert_eq!(fields, [0x132, 5]);
        // Not enough left for a third.
        assert!(input.read_be_u32_fields::<1>().is_err());
    }

    #[test]
    fn test_truncated() {
        let mut input = Cursor::new(vec![0x00, 0x00, 0x01]);
        let err = input.read_be_u32().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
