use std::{error::Error, fmt, io};

/// Every failure the container reader can raise is fatal: the format is consumed
/// byte-exactly, and a truncated or malformed stream leaves no safe recovery point.
#[derive(Debug)]
pub enum ContainerError {
    Io(io::Error),
    UnsupportedHunk { kind: u32, reason: &'static str },
    UnsupportedExtSubtype(u8),
    BadRelocationHunk(u32),
    RelocationOutOfRange { offset: u32, section_size: u32 },
    ResidentLibraryUnsupported,
    UnrecognizedMagic(u32),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContainerError::Io(err) => write!(f, "I/O error reading container: {}", err),
            ContainerError::UnsupportedHunk { kind, reason } => {
                write!(f, "Hunk {:#06x} not supported: {}", kind, reason)
            }
            ContainerError::UnsupportedExtSubtype(sub) => {
                write!(f, "HUNK_EXT sub-type {} not supported", sub)
            }
            ContainerError::BadRelocationHunk(hunk) => {
                write!(f, "Relocation referenced bad hunk ({})", hunk)
            }
            ContainerError::RelocationOutOfRange {
                offset,
                section_size,
            } => write!(
                f,
                "Relocation offset {} out of range (section is {} bytes)",
                offset, section_size
            ),
            ContainerError::ResidentLibraryUnsupported => {
                write!(f, "Can't handle first hunk not equal to 0 (resident libraries not supported)")
            }
            ContainerError::UnrecognizedMagic(word) => {
                write!(f, "Unrecognized container magic {:#010x}", word)
            }
        }
    }
}

impl Error for ContainerError {}

impl From<io::Error> for ContainerError {
    fn from(err: io::Error) -> ContainerError {
        ContainerError::Io(err)
    }
}
