use log::{info, trace};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use crate::error::{AttachError, GeometryError, SeekError};
use crate::image::{BackingStore, DiskImageHeader, HEADER_LEN, MAX_SECTOR_SIZE};

/// Number of drives one controller can address.
pub const MAX_UNITS: usize = 4;

pub type UnitId = usize;

/// Shape of the pack in a unit, as declared by its image header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors_per_track: u32,
    pub bytes_per_sector: u32,
}

impl From<DiskImageHeader> for Geometry {
    fn from(header: DiskImageHeader) -> Self {
        Geometry {
            cylinders: header.cylinders,
            heads: header.heads,
            sectors_per_track: header.sectors_per_track,
            bytes_per_sector: header.bytes_per_sector,
        }
    }
}

impl Geometry {
    /// Check a CHS address against the geometry. The declared counts
    /// themselves are accepted: a pack with 10 cylinders can address
    /// cylinder 10.
    pub fn validate(&self, cylinder: u32, head: u32, sector: u32) -> Result<(), GeometryError> {
        if cylinder > self.cylinders {
            Err(GeometryError::CylinderOutOfRange)
        } else if head > self.heads {
            Err(GeometryError::HeadOutOfRange)
        } else if sector > self.sectors_per_track {
            Err(GeometryError::SectorOutOfRange)
        } else {
            Ok(())
        }
    }

    /// Byte offset of a sector within the image, header included. `None` if
    /// the geometry puts it beyond any addressable offset.
    pub fn byte_position(&self, cylinder: u32, head: u32, sector: u32) -> Option<u64> {
        let track = (cylinder as u64)
            .checked_mul(self.heads as u64)?
            .checked_add(head as u64)?;
        let sector_index = track
            .checked_mul(self.sectors_per_track as u64)?
            .checked_add(sector as u64)?;
        sector_index
            .checked_mul(self.bytes_per_sector as u64)?
            .checked_add(HEADER_LEN)
    }
}

/// One drive slot of the controller.
#[derive(Default)]
pub struct DiskUnit {
    store: Option<Box<dyn BackingStore>>,
    write_protected: bool,
    unsafe_flag: bool,
    geometry: Geometry,
}

impl DiskUnit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    /// Set while the pack position can't be trusted, i.e. since it was
    /// attached and until a Restore or Store Registers.
    pub fn is_unsafe(&self) -> bool {
        self.unsafe_flag
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Read the image header and take ownership of the store. On failure the
    /// unit is left detached.
    pub(crate) fn attach(&mut self, mut store: Box<dyn BackingStore>) -> Result<(), AttachError> {
        store.seek(SeekFrom::Start(0))?;
        let header = DiskImageHeader::parse(&mut store)?;
        if header.bytes_per_sector as usize > MAX_SECTOR_SIZE {
            return Err(AttachError::SectorTooLarge(header.bytes_per_sector));
        }
        self.write_protected = store.is_read_only();
        self.unsafe_flag = true;
        self.geometry = header.into();
        self.store = Some(store);
        info!("Attached pack: {} cylinders, {} heads, {} sectors of {} bytes{}.",
              header.cylinders, header.heads, header.sectors_per_track,
              header.bytes_per_sector,
              if self.write_protected { ", write protected" } else { "" });
        Ok(())
    }

    /// Drop the store and forget the pack.
    pub(crate) fn detach(&mut self) -> Option<Box<dyn BackingStore>> {
        let store = self.store.take();
        self.write_protected = false;
        self.unsafe_flag = false;
        self.geometry = Geometry::default();
        store
    }

    pub(crate) fn clear_unsafe(&mut self) {
        self.unsafe_flag = false;
    }

    /// Position the store at the start of the given sector.
    pub(crate) fn seek(&mut self, cylinder: u32, head: u32, sector: u32) -> Result<(), SeekError> {
        let geometry = self.geometry;
        let store = self.store.as_mut().ok_or(SeekError::Offline)?;
        geometry.validate(cylinder, head, sector)?;
        let position = geometry.byte_position(cylinder, head, sector)
            .ok_or(SeekError::Unsafe)?;
        trace!("Seek to C{} H{} S{} (byte {}).", cylinder, head, sector, position);
        store.seek(SeekFrom::Start(position)).map_err(|_| SeekError::Unsafe)?;
        Ok(())
    }

    /// Read from the current position until `buf` is full or the store runs
    /// out, returning the number of bytes read.
    pub(crate) fn read_sector(&mut self, buf: &mut [u8]) -> usize {
        let store = match self.store.as_mut() {
            Some(store) => store,
            None => return 0,
        };
        let mut filled = 0;
        while filled < buf.len() {
            match store.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    trace!("Backing store read failed: {}", e);
                    break;
                }
            }
        }
        filled
    }

    /// Write `buf` at the current position, returning the number of bytes
    /// the store accepted.
    pub(crate) fn write_sector(&mut self, buf: &[u8]) -> usize {
        let store = match self.store.as_mut() {
            Some(store) => store,
            None => return 0,
        };
        let mut written = 0;
        while written < buf.len() {
            match store.write(&buf[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    trace!("Backing store write failed: {}", e);
                    break;
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::MemoryDisk;

    const HEADER: DiskImageHeader = DiskImageHeader {
        cylinders: 4,
        heads: 2,
        sectors_per_track: 8,
        bytes_per_sector: 128,
    };

    fn attached_unit() -> (DiskUnit, MemoryDisk) {
        let disk = MemoryDisk::blank(&HEADER);
        let mut unit = DiskUnit::new();
        unit.attach(Box::new(disk.clone())).unwrap();
        (unit, disk)
    }

    #[test]
    fn test_validate_inclusive_bounds() {
        let geometry = Geometry::from(HEADER);
        assert_eq!(geometry.validate(4, 2, 8), Ok(()));
        assert_eq!(geometry.validate(5, 0, 0), Err(GeometryError::CylinderOutOfRange));
        assert_eq!(geometry.validate(0, 3, 0), Err(GeometryError::HeadOutOfRange));
        assert_eq!(geometry.validate(0, 0, 9), Err(GeometryError::SectorOutOfRange));
        // Cylinder is checked first.
        assert_eq!(geometry.validate(5, 3, 9), Err(GeometryError::CylinderOutOfRange));
        assert_eq!(geometry.validate(0, 3, 9), Err(GeometryError::HeadOutOfRange));
    }

    #[test]
    fn test_byte_position() {
        let geometry = Geometry::from(HEADER);
        assert_eq!(geometry.byte_position(0, 0, 0), Some(16));
        assert_eq!(geometry.byte_position(0, 0, 1), Some(16 + 128));
        assert_eq!(geometry.byte_position(0, 1, 0), Some(16 + 8 * 128));
        assert_eq!(geometry.byte_position(1, 0, 0), Some(16 + 2 * 8 * 128));
        assert_eq!(geometry.byte_position(3, 1, 7), Some(16 + 63 * 128));
    }

    #[test]
    fn test_huge_geometry_fails_seek() {
        let header = DiskImageHeader {
            cylinders: 2,
            heads: u32::MAX,
            sectors_per_track: u32::MAX,
            bytes_per_sector: 512,
        };
        let geometry = Geometry::from(header);
        assert_eq!(geometry.byte_position(0, 0, 0), Some(16));
        assert_eq!(geometry.byte_position(1, 0, 0), None);

        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        let mut unit = DiskUnit::new();
        unit.attach(Box::new(MemoryDisk::new(bytes))).unwrap();
        assert_eq!(unit.seek(0, 0, 0), Ok(()));
        assert_eq!(unit.seek(1, 0, 0), Err(SeekError::Unsafe));
    }

    #[test]
    fn test_attach_detach() {
        let (mut unit, _disk) = attached_unit();
        assert!(unit.is_attached());
        assert!(unit.is_unsafe());
        assert!(!unit.is_write_protected());
        assert_eq!(unit.geometry(), Geometry::from(HEADER));

        assert!(unit.detach().is_some());
        assert!(!unit.is_attached());
        assert!(!unit.is_unsafe());
        assert_eq!(unit.geometry(), Geometry::default());
        assert_eq!(unit.seek(0, 0, 0), Err(SeekError::Offline));
    }

    #[test]
    fn test_attach_rejects_large_sectors() {
        let header = DiskImageHeader { bytes_per_sector: 513, ..HEADER };
        let mut unit = DiskUnit::new();
        let result = unit.attach(Box::new(MemoryDisk::blank(&header)));
        assert!(matches!(result, Err(AttachError::SectorTooLarge(513))));
        assert!(!unit.is_attached());
        assert_eq!(unit.geometry(), Geometry::default());
    }

    #[test]
    fn test_attach_rejects_short_image() {
        let mut unit = DiskUnit::new();
        let result = unit.attach(Box::new(MemoryDisk::new(vec![0; 10])));
        assert!(matches!(result, Err(AttachError::Io(_))));
        assert!(!unit.is_attached());
    }

    #[test]
    fn test_write_protect_from_store() {
        let mut unit = DiskUnit::new();
        unit.attach(Box::new(MemoryDisk::blank(&HEADER).to_read_only())).unwrap();
        assert!(unit.is_write_protected());
        unit.seek(0, 0, 0).unwrap();
        assert_eq!(unit.write_sector(&[1; 128]), 0);
    }

    #[test]
    fn test_sector_io() {
        let (mut unit, disk) = attached_unit();
        unit.seek(1, 1, 2).unwrap();
        assert_eq!(unit.write_sector(&[0x5A; 128]), 128);
        let offset = Geometry::from(HEADER).byte_position(1, 1, 2).unwrap() as usize;
        let contents = disk.contents();
        assert!(contents[offset..offset + 128].iter().all(|&b| b == 0x5A));
        assert_eq!(contents[offset + 128], 0);

        unit.seek(1, 1, 2).unwrap();
        let mut buf = [0; 128];
        assert_eq!(unit.read_sector(&mut buf), 128);
        assert_eq!(buf, [0x5A; 128]);

        // Reading past the end of the image comes up short.
        unit.seek(4, 0, 0).unwrap();
        assert_eq!(unit.read_sector(&mut buf), 0);
    }

    #[test]
    fn test_seek_validates() {
        let (mut unit, _disk) = attached_unit();
        assert_eq!(unit.seek(0, 0, 9),
                   Err(SeekError::Geometry(GeometryError::SectorOutOfRange)));
    }
}
