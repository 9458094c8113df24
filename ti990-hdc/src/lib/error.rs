use std::error::Error;
use std::fmt;
use std::io;

use crate::registers::*;

/// Reasons a backing store can be refused by `attach`.
#[derive(Debug)]
pub enum AttachError {
    /// The unit number is not below `MAX_UNITS`.
    InvalidUnit(usize),
    /// Something is already attached to the unit.
    AlreadyAttached(usize),
    /// The image declares sectors bigger than the controller's buffer.
    SectorTooLarge(u32),
    /// The header could not be read.
    Io(io::Error),
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::InvalidUnit(unit) =>
                write!(f, "No such disk unit: {}.", unit),
            AttachError::AlreadyAttached(unit) =>
                write!(f, "Disk unit {} already has an image attached.", unit),
            AttachError::SectorTooLarge(size) =>
                write!(f, "Sector size of {} bytes exceeds the maximum of {}.",
                       size, crate::MAX_SECTOR_SIZE),
            AttachError::Io(e) => match e.kind() {
                io::ErrorKind::UnexpectedEof =>
                    write!(f, "Disk image is too short to hold a header."),
                _ => write!(f, "IO error reading disk image header: {}", e),
            },
        }
    }
}

impl Error for AttachError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttachError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for AttachError {
    fn from(e: io::Error) -> Self {
        AttachError::Io(e)
    }
}

/// A CHS address outside a unit's declared geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    CylinderOutOfRange,
    HeadOutOfRange,
    SectorOutOfRange,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dimension = match self {
            GeometryError::CylinderOutOfRange => "Cylinder",
            GeometryError::HeadOutOfRange => "Head",
            GeometryError::SectorOutOfRange => "Sector",
        };
        write!(f, "{} address out of range.", dimension)
    }
}

impl Error for GeometryError {}

/// Failure to position a unit at a CHS address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekError {
    /// Nothing is attached.
    Offline,
    Geometry(GeometryError),
    /// The backing store refused to reposition.
    Unsafe,
}

impl fmt::Display for SeekError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeekError::Offline => write!(f, "Unit is offline."),
            SeekError::Geometry(e) => e.fmt(f),
            SeekError::Unsafe => write!(f, "Backing store could not be repositioned."),
        }
    }
}

impl Error for SeekError {}

impl From<GeometryError> for SeekError {
    fn from(e: GeometryError) -> Self {
        SeekError::Geometry(e)
    }
}

/// Every way a command can end other than successful completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandError {
    NoUnitSelected,
    UnitOffline,
    UnitUnsafe,
    WriteProtected,
    Geometry(GeometryError),
    /// Short read from the backing store.
    ReadFailed,
    /// Short write to the backing store.
    WriteFailed,
    /// The backing store could not be repositioned.
    SeekFailed,
    Unsupported,
}

pub(crate) type CommandResult = Result<(), CommandError>;

impl CommandError {
    /// The bits this outcome sets in `w0` and `w7` respectively, excluding
    /// the idle and error bits which every failure sets.
    pub(crate) fn status_bits(self) -> (u16, u16) {
        match self {
            CommandError::NoUnitSelected => (0, W7_ABNORMAL_COMPLETION),
            CommandError::UnitOffline => (W0_OFFLINE | W0_NOT_READY, W7_UNIT_ERROR),
            CommandError::UnitUnsafe => (W0_UNSAFE | W0_PACK_CHANGE, W7_UNIT_ERROR),
            CommandError::WriteProtected => (W0_WRITE_PROTECT, W7_UNIT_ERROR),
            CommandError::Geometry(GeometryError::CylinderOutOfRange) =>
                (W0_SEEK_INCOMPLETE, W7_UNIT_ERROR),
            CommandError::Geometry(GeometryError::HeadOutOfRange) =>
                (W0_END_OF_CYLINDER, W7_UNIT_ERROR),
            CommandError::Geometry(GeometryError::SectorOutOfRange) =>
                (0, W7_COMMAND_TIMEOUT),
            CommandError::ReadFailed => (0, W7_COMMAND_TIMEOUT),
            CommandError::WriteFailed => (W0_OFFLINE | W0_NOT_READY, W7_UNIT_ERROR),
            CommandError::SeekFailed => (W0_UNSAFE | W0_PACK_CHANGE, W7_UNIT_ERROR),
            CommandError::Unsupported => (0, W7_ABNORMAL_COMPLETION),
        }
    }
}

impl From<GeometryError> for CommandError {
    fn from(e: GeometryError) -> Self {
        CommandError::Geometry(e)
    }
}

impl From<SeekError> for CommandError {
    fn from(e: SeekError) -> Self {
        match e {
            SeekError::Offline => CommandError::UnitOffline,
            SeekError::Geometry(g) => CommandError::Geometry(g),
            SeekError::Unsafe => CommandError::SeekFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_error_mapping() {
        assert_eq!(CommandError::from(SeekError::Offline), CommandError::UnitOffline);
        assert_eq!(CommandError::from(SeekError::Unsafe), CommandError::SeekFailed);
        assert_eq!(CommandError::from(SeekError::from(GeometryError::HeadOutOfRange)),
                   CommandError::Geometry(GeometryError::HeadOutOfRange));
    }

    #[test]
    fn test_attach_error_messages() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(AttachError::from(eof).to_string(),
                   "Disk image is too short to hold a header.");
        assert_eq!(AttachError::SectorTooLarge(1024).to_string(),
                   "Sector size of 1024 bytes exceeds the maximum of 512.");
    }
}
