//! Reader for Amiga "Hunk" load files (`HUNK_HEADER`) and unit/object files
//! (`HUNK_UNIT`). Only load files are relocated against a flat image; unit files are
//! rejected, since they carry unresolved external references IRA has no linker for.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::hunk::*;
use crate::{ContainerError, ContainerResult, RelocEntry, Section, SectionKind, Symbol};

struct RawHunk {
    kind: SectionKind,
    memory: MemoryAttr,
    /// Size in bytes, as declared by the header table (may exceed the bytes actually
    /// stored on disk for a `HUNK_CODE`/`HUNK_DATA` hunk with trailing implicit BSS).
    size: u32,
    base: u32,
    content: Vec<u8>,
}

pub fn read_amiga<R: Read + Seek>(reader: &mut R) -> Result<ContainerResult, ContainerError> {
    reader.seek(SeekFrom::Start(0))?;
    let magic = reader.read_u32::<BigEndian>()?;
    match magic {
        HUNK_HEADER => read_executable(reader),
        HUNK_UNIT => Err(ContainerError::UnsupportedHunk {
            kind: HUNK_UNIT,
            reason: "object/unit files carry unresolved externals; link before disassembling",
        }),
        other => Err(ContainerError::UnrecognizedMagic(other)),
    }
}

fn read_executable<R: Read + Seek>(reader: &mut R) -> Result<ContainerResult, ContainerError> {
    while read_name(reader, false)?.is_some() {
        log::warn!("unexpected resident library name in HUNK_HEADER");
    }

    let hunk_count = reader.read_u32::<BigEndian>()?;
    let first_hunk = reader.read_u32::<BigEndian>()?;
    let last_hunk = reader.read_u32::<BigEndian>()?;

    if first_hunk != 0 {
        return Err(ContainerError::ResidentLibraryUnsupported);
    }

    let table_len = (last_hunk - first_hunk + 1) as usize;
    let mut sizes = Vec::with_capacity(table_len);
    let mut memories = Vec::with_capacity(table_len);
    for _ in 0..table_len {
        let raw = reader.read_u32::<BigEndian>()?;
        let type_bits = raw >> 30;
        let ext_flags = if type_bits == 3 {
            reader.read_u32::<BigEndian>()?
        } else {
            0
        };
        sizes.push((raw & 0x3FFF_FFFF) * 4);
        memories.push(MemoryAttr::from_type_bits(type_bits, ext_flags));
    }

    let mut base = 0u32;
    let mut hunks: Vec<RawHunk> = Vec::with_capacity(hunk_count as usize);
    for i in 0..table_len {
        hunks.push(RawHunk {
            kind: SectionKind::Code,
            memory: memories[i],
            size: sizes[i],
            base,
            content: vec![0u8; sizes[i] as usize],
        });
        base += sizes[i];
    }

    let mut relocs = Vec::new();
    let mut symbols = Vec::new();

    let mut index = 0usize;
    let mut have_body = false;
    loop {
        let tag = match reader.read_u32::<BigEndian>() {
            Ok(t) => t,
            Err(_) => break,
        };
        let kind = tag & 0x0000_FFFF;

        match kind {
            HUNK_CODE | HUNK_DATA | HUNK_BSS => {
                if have_body {
                    index += 1;
                }
                have_body = true;

                if tag & 0xC000_0000 != 0 {
                    let type_bits = tag >> 30;
                    let ext_flags = if type_bits == 3 {
                        reader.read_u32::<BigEndian>()?
                    } else {
                        0
                    };
                    hunks[index].memory = MemoryAttr::from_type_bits(type_bits, ext_flags);
                }

                hunks[index].kind = match kind {
                    HUNK_CODE => SectionKind::Code,
                    HUNK_DATA => SectionKind::Data,
                    _ => SectionKind::Bss,
                };

                let body_longwords = reader.read_u32::<BigEndian>()?;
                if kind != HUNK_BSS {
                    let body_len = (body_longwords * 4) as usize;
                    let content = &mut hunks[index].content;
                    if body_len > content.len() {
                        content.resize(body_len, 0);
                    }
                    reader.read_exact(&mut content[..body_len])?;
                }
            }
            HUNK_RELOC32 => {
                loop {
                    let count = reader.read_u32::<BigEndian>()?;
                    if count == 0 {
                        break;
                    }
                    let target = reader.read_u32::<BigEndian>()?;
                    if target > last_hunk {
                        return Err(ContainerError::BadRelocationHunk(target));
                    }
                    for _ in 0..count {
                        let offset = reader.read_u32::<BigEndian>()?;
                        apply_reloc(&mut hunks, index, offset, target as usize, &mut relocs)?;
                    }
                }
            }
            HUNK_DREL32 | HUNK_RELOC32SHORT => {
                let mut total = 0u32;
                loop {
                    let count = reader.read_u16::<BigEndian>()? as u32;
                    if count == 0 {
                        if total % 2 == 1 {
                            reader.seek(SeekFrom::Current(2))?;
                        }
                        break;
                    }
                    total += count;
                    let target = reader.read_u16::<BigEndian>()? as u32;
                    if target > last_hunk {
                        return Err(ContainerError::BadRelocationHunk(target));
                    }
                    for _ in 0..count {
                        let offset = reader.read_u16::<BigEndian>()? as u32;
                        apply_reloc(&mut hunks, index, offset, target as usize, &mut relocs)?;
                    }
                }
            }
            HUNK_RELOC16 | HUNK_RELOC8 | HUNK_DREL16 | HUNK_DREL8 => {
                // Pre-V37 short relocations: IRA skips these without patching the
                // image, matching the reference reassembler's behaviour.
                loop {
                    let count = reader.read_u32::<BigEndian>()?;
                    if count == 0 {
                        break;
                    }
                    reader.seek(SeekFrom::Current(((count + 1) * 4) as i64))?;
                }
            }
            HUNK_END | HUNK_BREAK => {
                if have_body {
                    index += 1;
                }
                have_body = false;
            }
            HUNK_NAME => {
                if let Some((name, _)) = read_name(reader, false)? {
                    log::debug!("hunk {} named {:?}", index, name);
                }
            }
            HUNK_DEBUG => {
                let count = reader.read_u32::<BigEndian>()?;
                reader.seek(SeekFrom::Current((count * 4) as i64))?;
            }
            HUNK_SYMBOL => {
                while let Some((name, value)) = read_named_value(reader)? {
                    symbols.push(Symbol {
                        name,
                        section: index,
                        offset: value,
                    });
                }
            }
            HUNK_EXT => read_ext_block(reader)?,
            HUNK_OVERLAY => skip_overlay(reader)?,
            other => {
                return Err(ContainerError::UnsupportedHunk {
                    kind: other,
                    reason: "not supported by this reassembler",
                });
            }
        }

        if index >= table_len {
            break;
        }
    }

    let sections: Vec<Section> = hunks
        .iter()
        .map(|h| Section {
            kind: h.kind,
            memory: h.memory,
            base: h.base,
            size: h.size,
        })
        .collect();
    let image = hunks.into_iter().flat_map(|h| h.content).collect();
    let entry_section = first_code_section(&sections);

    Ok(ContainerResult {
        image,
        sections,
        relocs,
        symbols,
        entry_section,
    })
}

fn first_code_section(sections: &[Section]) -> usize {
    sections
        .iter()
        .position(|s| s.kind == SectionKind::Code)
        .unwrap_or(0)
}

fn apply_reloc(
    hunks: &mut [RawHunk],
    section: usize,
    offset: u32,
    target: usize,
    relocs: &mut Vec<RelocEntry>,
) -> Result<(), ContainerError> {
    let size = hunks[section].size;
    if offset > size.saturating_sub(4) {
        return Err(ContainerError::RelocationOutOfRange {
            offset,
            section_size: size,
        });
    }
    let at = offset as usize;
    let current = {
        let bytes = &hunks[section].content[at..at + 4];
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    };
    let patched = current.wrapping_add(hunks[target].base);
    hunks[section].content[at..at + 4].copy_from_slice(&patched.to_be_bytes());
    relocs.push(RelocEntry {
        section,
        offset,
        target_section: target,
    });
    Ok(())
}

fn skip_overlay<R: Read + Seek>(reader: &mut R) -> Result<(), ContainerError> {
    let size = reader.read_u32::<BigEndian>()?;
    let level = reader.read_u32::<BigEndian>()?;
    let marker = reader.read_u32::<BigEndian>()?;
    reader.seek(SeekFrom::Current(-4))?;
    let entries = if marker == 0 {
        reader.seek(SeekFrom::Current(((level.saturating_sub(2)) + 1) as i64 * 4))?;
        (size - level.saturating_sub(2) + 1) / 8
    } else {
        size / 8
    };
    reader.seek(SeekFrom::Current((entries as i64) * 8 * 4))?;
    Ok(())
}

fn read_ext_block<R: Read + Seek>(reader: &mut R) -> Result<(), ContainerError> {
    loop {
        let header = reader.read_u32::<BigEndian>()?;
        if header == 0 {
            break;
        }
        let ext_type = (header >> 24) as u8;
        let name_longwords = header & 0x00FF_FFFF;
        let name_len = (name_longwords * 4) as i64;
        reader.seek(SeekFrom::Current(name_len))?;
        let value = reader.read_u32::<BigEndian>()?;

        match ext_type {
            EXT_SYMB | EXT_DEF | EXT_ABS | EXT_RES => {}
            EXT_COMMON => {
                let skip = reader.read_u32::<BigEndian>()?;
                reader.seek(SeekFrom::Current((skip * 4) as i64))?;
            }
            EXT_REF32 | EXT_REF16 | EXT_REF8 | EXT_DEXT32 | EXT_DEXT16 | EXT_DEXT8 => {
                reader.seek(SeekFrom::Current((value * 4) as i64))?;
            }
            EXT_RELREF32 | EXT_RELCOMMON | EXT_ABSREF16 | EXT_ABSREF8 | EXT_RELREF26 => {
                return Err(ContainerError::UnsupportedExtSubtype(ext_type));
            }
            _ => return Err(ContainerError::UnsupportedExtSubtype(ext_type)),
        }
    }
    Ok(())
}

/// Reads one `(length-in-longwords [| type<<24], name-bytes...)` unit shared by resident
/// library names, `HUNK_SYMBOL` entries and `HUNK_EXT` groups. Returns `None` at the
/// zero-length terminator.
fn read_name<R: Read>(reader: &mut R, split_type: bool) -> Result<Option<(String, u8)>, ContainerError> {
    let header = reader.read_u32::<BigEndian>()?;
    if header == 0 {
        return Ok(None);
    }
    let (ext_type, longwords) = if split_type {
        ((header >> 24) as u8, header & 0x00FF_FFFF)
    } else {
        (0, header)
    };
    let mut buf = vec![0u8; (longwords * 4) as usize];
    reader.read_exact(&mut buf)?;
    while buf.last() == Some(&0) {
        buf.pop();
    }
    let name = String::from_utf8_lossy(&buf).into_owned();
    Ok(Some((name, ext_type)))
}

fn read_named_value<R: Read>(reader: &mut R) -> Result<Option<(String, u32)>, ContainerError> {
    match read_name(reader, false)? {
        None => Ok(None),
        Some((name, _)) => {
            let value = reader.read_u32::<BigEndian>()?;
            Ok(Some((name, value)))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn longword(v: u32) -> [u8; 4] {
        v.to_be_bytes()
    }

    /// A minimal executable: one CODE hunk containing `rts` (`4E75`), no relocations.
    fn minimal_executable() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(longword(HUNK_HEADER));
        bytes.extend(longword(0)); // no resident libraries
        bytes.extend(longword(1)); // hunk_count
        bytes.extend(longword(0)); // first_hunk
        bytes.extend(longword(0)); // last_hunk
        bytes.extend(longword(1)); // hunk 0 size: 1 longword, public memory
        bytes.extend(longword(HUNK_CODE));
        bytes.extend(longword(1)); // 1 longword of code
        bytes.extend([0x4e, 0x75, 0x00, 0x00]); // rts, padding
        bytes.extend(longword(HUNK_END));
        bytes
    }

    #[test]
    fn reads_minimal_single_hunk_executable() {
        let mut cursor = Cursor::new(minimal_executable());
        let result = read_amiga(&mut cursor).unwrap();
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].kind, SectionKind::Code);
        assert_eq!(result.sections[0].size, 4);
        assert_eq!(&result.image[0..2], &[0x4e, 0x75]);
        assert!(result.relocs.is_empty());
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 0]);
        let err = read_amiga(&mut cursor).unwrap_err();
        assert!(matches!(err, ContainerError::UnrecognizedMagic(0)));
    }

    #[test]
    fn applies_reloc32_against_second_hunk_base() {
        let mut bytes = Vec::new();
        bytes.extend(longword(HUNK_HEADER));
        bytes.extend(longword(0));
        bytes.extend(longword(2));
        bytes.extend(longword(0));
        bytes.extend(longword(1));
        bytes.extend(longword(1)); // hunk 0: 1 longword
        bytes.extend(longword(1)); // hunk 1: 1 longword

        // hunk 0 (CODE): one longword holding an absolute-long reference to hunk 1's start.
        bytes.extend(longword(HUNK_CODE));
        bytes.extend(longword(1));
        bytes.extend(longword(0)); // link-time offset 0 into hunk 1
        bytes.extend(longword(HUNK_RELOC32));
        bytes.extend(longword(1)); // one relocation
        bytes.extend(longword(1)); // targets hunk 1
        bytes.extend(longword(0)); // at offset 0 in hunk 0
        bytes.extend(longword(0)); // terminator
        bytes.extend(longword(HUNK_END));

        // hunk 1 (DATA)
        bytes.extend(longword(HUNK_DATA));
        bytes.extend(longword(1));
        bytes.extend(longword(0x1234_5678));
        bytes.extend(longword(HUNK_END));

        let mut cursor = Cursor::new(bytes);
        let result = read_amiga(&mut cursor).unwrap();
        assert_eq!(result.relocs.len(), 1);
        assert_eq!(result.relocs[0].target_section, 1);
        let patched = u32::from_be_bytes([
            result.image[0],
            result.image[1],
            result.image[2],
            result.image[3],
        ]);
        assert_eq!(patched, result.sections[1].base);
    }
}
