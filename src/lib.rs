//! Core engine for the 680x0 interactive reassembler: reads an Amiga executable,
//! object, or raw binary and emits re-assemblable Motorola-syntax 68k source.

pub mod codearea;
pub mod comment;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod engine;
pub mod equate;
pub mod error;
pub mod image;
pub mod jumptable;
pub mod label;
pub mod opcode;
pub mod operand;
pub mod pass0;
pub mod pass1;
pub mod pass2;
pub mod reloc;
pub mod romtag;
pub mod symbol;

pub use config::Config;
pub use engine::Engine;
pub use error::EngineError;
