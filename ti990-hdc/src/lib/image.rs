//! The disk image format and the stores an image can live in.
//!
//! An image is a 16-byte header of four big-endian u32 fields (cylinders,
//! heads, sectors per track, bytes per sector) followed by the raw sectors in
//! cylinder, head, sector order.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;

use ti990_utils::read_be::ReadBE;
use ti990_utils::write_be::WriteBE;

/// Size of the image header in bytes.
pub const HEADER_LEN: u64 = 16;
/// Largest sector the controller's buffer can hold.
pub const MAX_SECTOR_SIZE: usize = 512;

/// The geometry header at the start of every disk image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskImageHeader {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
    pub bytes_per_sector: u32,
}

impl DiskImageHeader {
    /// Read a header from the current position of `input`.
    pub fn parse<R: Read>(input: &mut R) -> io::Result<Self> {
        let [cylinders, heads, sectors_per_track, bytes_per_sector] =
            input.read_be_u32_fields()?;
        Ok(DiskImageHeader {
            cylinders,
            heads,
            sectors_per_track,
            bytes_per_sector,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_be_u32(self.cylinders)?;
        out.write_be_u32(self.heads)?;
        out.write_be_u32(self.sectors_per_track)?;
        out.write_be_u32(self.bytes_per_sector)
    }

    /// Number of payload bytes the geometry describes, saturating at
    /// `u64::MAX` for nonsensical headers.
    pub fn payload_len(&self) -> u64 {
        (self.cylinders as u64)
            .saturating_mul(self.heads as u64)
            .saturating_mul(self.sectors_per_track as u64)
            .saturating_mul(self.bytes_per_sector as u64)
    }

    /// Total size of a complete image with this header.
    pub fn image_len(&self) -> u64 {
        HEADER_LEN.saturating_add(self.payload_len())
    }
}

/// Write a header followed by a zero-filled payload.
pub fn create_blank_image<W: Write>(out: &mut W, header: &DiskImageHeader) -> io::Result<()> {
    header.write_to(out)?;
    let zeros = [0; 4096];
    let mut remaining = header.payload_len();
    while remaining > 0 {
        let chunk = remaining.min(zeros.len() as u64) as usize;
        out.write_all(&zeros[..chunk])?;
        remaining -= chunk as u64;
    }
    out.flush()
}

/// A byte-addressable store holding one disk image.
pub trait BackingStore: Read + Write + Seek + Send {
    /// Whether the store was opened without write access. Units attached to
    /// a read-only store are write protected.
    fn is_read_only(&self) -> bool;
}

/// A disk image on the host filesystem.
#[derive(Debug)]
pub struct DiskFile {
    file: File,
    read_only: bool,
}

impl DiskFile {
    /// Open an image for reading and writing, falling back to read-only
    /// access (and thus a write-protected unit) if the file can't be written.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => Ok(DiskFile { file, read_only: false }),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!("'{}' is not writable, opening read-only.", path.display());
                Self::open_read_only(path)
            }
            Err(e) => Err(e),
        }
    }

    pub fn open_read_only(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(DiskFile { file, read_only: true })
    }

    /// Create a new blank image at `path`, replacing anything already there.
    pub fn create(path: impl AsRef<Path>, header: &DiskImageHeader) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        create_blank_image(&mut io::BufWriter::new(&mut file), header)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(DiskFile { file, read_only: false })
    }
}

impl Read for DiskFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DiskFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for DiskFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BackingStore for DiskFile {
    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// An in-memory disk image. Clones share the same bytes (and position), so a
/// host can keep a handle to inspect an image after attaching it.
#[derive(Debug, Clone)]
pub struct MemoryDisk {
    data: Arc<Mutex<Cursor<Vec<u8>>>>,
    read_only: bool,
}

impl MemoryDisk {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemoryDisk {
            data: Arc::new(Mutex::new(Cursor::new(bytes))),
            read_only: false,
        }
    }

    /// A blank image with the given geometry.
    pub fn blank(header: &DiskImageHeader) -> Self {
        let mut bytes = Vec::with_capacity(header.image_len() as usize);
        // Writing to a Vec cannot fail.
        create_blank_image(&mut bytes, header).unwrap();
        Self::new(bytes)
    }

    /// A read-only view sharing this image's bytes.
    pub fn to_read_only(&self) -> Self {
        MemoryDisk {
            data: Arc::clone(&self.data),
            read_only: true,
        }
    }

    /// Copy of the current image contents.
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().get_ref().clone()
    }
}

impl Read for MemoryDisk {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.lock().unwrap().read(buf)
    }
}

impl Write for MemoryDisk {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.read_only {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied,
                                      "memory disk is read-only"));
        }
        self.data.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryDisk {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.data.lock().unwrap().seek(pos)
    }
}

impl BackingStore for MemoryDisk {
    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: DiskImageHeader = DiskImageHeader {
        cylinders: 3,
        heads: 2,
        sectors_per_track: 5,
        bytes_per_sector: 256,
    };

    #[test]
    fn test_header_layout() {
        let mut bytes = Vec::new();
        GEOMETRY.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 3, 0, 0, 0, 2, 0, 0, 0, 5, 0, 0, 1, 0]);
        let parsed = DiskImageHeader::parse(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed, GEOMETRY);
    }

    #[test]
    fn test_short_header() {
        let bytes = [0u8; 15];
        let err = DiskImageHeader::parse(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_lengths_saturate() {
        let header = DiskImageHeader {
            cylinders: u32::MAX,
            heads: u32::MAX,
            sectors_per_track: u32::MAX,
            bytes_per_sector: 512,
        };
        assert_eq!(header.payload_len(), u64::MAX);
        assert_eq!(header.image_len(), u64::MAX);
        assert_eq!(GEOMETRY.image_len(), 16 + 3 * 2 * 5 * 256);
    }

    #[test]
    fn test_blank_image() {
        let disk = MemoryDisk::blank(&GEOMETRY);
        let contents = disk.contents();
        assert_eq!(contents.len() as u64, GEOMETRY.image_len());
        assert_eq!(contents.len(), 16 + 3 * 2 * 5 * 256);
        assert!(contents[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_memory_disk_read_only() {
        let disk = MemoryDisk::blank(&GEOMETRY);
        let mut view = disk.to_read_only();
        assert!(view.is_read_only());
        assert!(!disk.is_read_only());
        assert_eq!(view.write(&[1, 2, 3]).unwrap_err().kind(),
                   io::ErrorKind::PermissionDenied);
        // The view sees writes made through the writable handle.
        let mut writer = disk.clone();
        writer.seek(SeekFrom::Start(HEADER_LEN)).unwrap();
        writer.write_all(&[7]).unwrap();
        assert_eq!(view.contents()[16], 7);
    }

    #[test]
    fn test_disk_file_create_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.hd");
        {
            let mut disk = DiskFile::create(&path, &GEOMETRY).unwrap();
            assert!(!disk.is_read_only());
            assert_eq!(DiskImageHeader::parse(&mut disk).unwrap(), GEOMETRY);
        }
        assert_eq!(std::fs::metadata(&path).unwrap().len(), GEOMETRY.image_len());

        let mut disk = DiskFile::open_read_only(&path).unwrap();
        assert!(disk.is_read_only());
        assert!(disk.write(&[0xFF]).is_err());
        let mut disk = DiskFile::open(&path).unwrap();
        assert!(!disk.is_read_only());
        disk.seek(SeekFrom::Start(HEADER_LEN)).unwrap();
        disk.write_all(&[0xAB]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap()[16], 0xAB);
    }
}
