use std::mem;

pub const BYTE_BYTES: u32 = mem::size_of::<u8>() as u32;
pub const WORD_BYTES: u32 = mem::size_of::<u16>() as u32;
pub const LONG_BYTES: u32 = mem::size_of::<u32>() as u32;

/// `ILLEGAL` (`4AFCh`): also the sentinel the ROM-tag scanner looks for immediately
/// before a resident-module header.
pub const ILLEGAL_WORD: u16 = 0x4AFC;

/// Minimum run length (bytes) for the Pass-2 text-detection heuristic to prefer
/// `DC.B "..."` over a numeric data dump.
pub const MIN_TEXT_RUN: usize = 4;

/// Maximum `DC.B`/`DC.W`/`DC.L` elements emitted on one output line.
pub const MAX_DATA_PER_LINE: usize = 4;
