//! Readers for the binary container formats IRA can load: Amiga hunk executables and
//! unit (object) files, and flat raw binaries. Every reader produces a [`ContainerResult`]:
//! a flat byte image plus the section table, relocation list and symbol table the core
//! engine needs to seed its passes.

pub mod error;
pub mod hunk;
pub mod amiga;
pub mod raw;

pub use error::ContainerError;
pub use hunk::MemoryAttr;

use std::io::{Read, Seek};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SectionKind {
    Code,
    Data,
    Bss,
}

/// One hunk (Amiga) or the single synthesized segment (raw binary), already laid out
/// at its final offset in [`ContainerResult::image`].
#[derive(Clone, Debug)]
pub struct Section {
    pub kind: SectionKind,
    pub memory: MemoryAttr,
    /// Offset of this section's first byte within `ContainerResult::image`.
    pub base: u32,
    pub size: u32,
}

impl Section {
    pub fn end(&self) -> u32 {
        self.base + self.size
    }
}

/// A 32-bit relocation: the longword at `section[offset..offset+4]` holds the
/// link-time value of `target_section`'s base and must be rebased onto the load
/// address IRA assigns that section.
#[derive(Clone, Copy, Debug)]
pub struct RelocEntry {
    pub section: usize,
    pub offset: u32,
    pub target_section: usize,
}

/// A name bound to an address by `HUNK_SYMBOL` or an `EXT_DEF`/`EXT_ABS`/`EXT_RES` group.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub section: usize,
    pub offset: u32,
}

/// Output of any container reader: enough to seed the core engine's image, its
/// code-area/label/relocation tables, and the symbol table used for name substitution.
#[derive(Debug)]
pub struct ContainerResult {
    pub image: Vec<u8>,
    pub sections: Vec<Section>,
    pub relocs: Vec<RelocEntry>,
    pub symbols: Vec<Symbol>,
    /// Index into `sections` holding the first `HUNK_CODE` (or the sole section, for
    /// raw binaries); where pass 0 starts walking if the caller gave no explicit entry.
    pub entry_section: usize,
}

/// Reads a container from `reader`, auto-detecting Amiga hunk executables by magic
/// and falling back to treating the whole stream as a raw binary otherwise, per the
/// three input kinds the caller is expected to tell apart only by content.
pub fn read_container<R: Read + Seek>(reader: &mut R) -> Result<ContainerResult, ContainerError> {
    use std::io::SeekFrom;

    let start = reader.stream_position()?;
    match amiga::read_amiga(reader) {
        Ok(result) => Ok(result),
        Err(ContainerError::UnrecognizedMagic(_)) => {
            reader.seek(SeekFrom::Start(start))?;
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            Ok(raw::read_raw_binary(data))
        }
        Err(other) => Err(other),
    }
}

pub trait ReadContainerExt: Read + Seek + Sized {
    fn read_container(&mut self) -> Result<ContainerResult, ContainerError> {
        read_container(self)
    }
}

impl<R: Read + Seek + Sized> ReadContainerExt for R {}
