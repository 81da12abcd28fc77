use std::{error::Error, fmt, io};

use ira_container::ContainerError;

/// Raised by the decoder and operand resolver. Most sites recover locally (the
/// invalid-mode `DC.W` path); this type exists for the handful of conditions that
/// genuinely cannot be recovered from within a single instruction.
#[derive(Debug)]
pub enum DecodeError {
    TruncatedInstruction { address: u32 },
    UnterminatedBitfield { address: u32 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::TruncatedInstruction { address } => {
                write!(f, "instruction at {:#010x} runs past end of image", address)
            }
            DecodeError::UnterminatedBitfield { address } => {
                write!(f, "bit-field specifier at {:#010x} runs past end of image", address)
            }
        }
    }
}

impl Error for DecodeError {}

/// Top-level failure of the engine: container read, side-file I/O, or a decode error
/// that escaped a pass's local recovery.
#[derive(Debug)]
pub enum EngineError {
    Container(ContainerError),
    Decode(DecodeError),
    Io(io::Error),
    NoCodeSections,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Container(err) => write!(f, "{}", err),
            EngineError::Decode(err) => write!(f, "{}", err),
            EngineError::Io(err) => write!(f, "{}", err),
            EngineError::NoCodeSections => write!(f, "input has no CODE section to disassemble"),
        }
    }
}

impl Error for EngineError {}

impl From<ContainerError> for EngineError {
    fn from(err: ContainerError) -> EngineError {
        EngineError::Container(err)
    }
}

impl From<DecodeError> for EngineError {
    fn from(err: DecodeError) -> EngineError {
        EngineError::Decode(err)
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> EngineError {
        EngineError::Io(err)
    }
}
