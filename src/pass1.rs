//! Pass 1: walks every code area recording labels and cross-references, and writes
//! each visited instruction address to a side buffer that Pass 2 replays for
//! phase synchronization and corrected-label lookup.

use crate::codearea::CodeAreas;
use crate::config::Config;
use crate::dispatch;
use crate::image::{Image, Storage};
use crate::label::LabelTable;
use crate::opcode;
use crate::operand::{self, Operand};
use crate::reloc::RelocTable;

#[derive(Default)]
pub struct Pass1Output {
    /// One entry per instruction boundary visited, in walk order; mirrors the
    /// `.label` side file the real tool writes to disk.
    pub visited: Vec<u32>,
    pub labels: LabelTable,
}

/// Runs the label-collection walk over every area, in area order. Invalid decodes
/// re-sync at the next word boundary rather than aborting the area.
pub fn run(image: &Image, config: &Config, areas: &CodeAreas, relocs: &RelocTable) -> Pass1Output {
    let mut out = Pass1Output::default();

    for (start, end) in areas.iter() {
        let mut pc = start;
        while pc < end {
            out.visited.push(pc);

            let word = match image.read_word(pc) {
                Ok(w) => w,
                Err(_) => break,
            };

            if relocs.at(pc).is_some() {
                pc += 4;
                continue;
            }

            let entry = opcode::decode(word, config.cpu_mask);
            if entry.mnemonic == "DC.W" {
                pc += 2;
                continue;
            }
            let over = dispatch::dispatch(entry, word, config.cpu_mask);
            if over.invalid {
                pc += 2;
                continue;
            }

            let split = opcode::split(word, entry);
            let mut len = 2u32;

            if matches!(entry.mnemonic, "BCC" | "DBCC" | "JMP" | "JSR") {
                let disp8 = (word & 0x00ff) as i8;
                if matches!(entry.mnemonic, "BCC") && disp8 != 0 {
                    out.labels.insert(pc.wrapping_add(2).wrapping_add(disp8 as i32 as u32));
                } else if let Ok(w) = image.read_word(pc.wrapping_add(2)) {
                    if matches!(entry.mnemonic, "BCC" | "DBCC") {
                        len = 4;
                        out.labels.insert(pc.wrapping_add(2).wrapping_add(w as i16 as i32 as u32));
                    } else {
                        let operand = operand::resolve(image, pc.wrapping_add(2), split.address_mode, split.ea_register);
                        len += operand.extension_bytes();
                        if let Operand::AbsoluteLong(target) = operand {
                            out.labels.insert(target);
                        }
                    }
                }
            } else {
                let decoded =
                    opcode::decode_operands(image, pc, word, entry, entry.mnemonic, &split, over.source_mask, over.dest_mask);
                len = decoded.len;
                record_operand_label(&decoded.source, &mut out.labels);
                if let Some(dest) = &decoded.dest {
                    record_operand_label(dest, &mut out.labels);
                }
            }

            pc += len;
        }
    }

    for table in &config.jump_tables {
        out.labels.insert(table.base);
        let jt = crate::jumptable::JumpTable {
            start: table.start,
            end: table.end,
            base: table.base,
            element_size: table.element_size,
        };
        for target in jt.targets(image) {
            out.labels.insert(target);
        }
    }

    out
}

fn record_operand_label(operand: &Operand, labels: &mut LabelTable) {
    match operand {
        Operand::AbsoluteLong(target) => {
            labels.insert(*target);
        }
        Operand::PcDisplacement { at, displacement } => {
            labels.insert((*at as i64 + 2 + *displacement as i64) as u32);
        }
        _ => {}
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::cpu;

    #[test]
    fn records_absolute_long_target_as_label() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x4e, 0xb9]); // JSR abs.L
        data.extend_from_slice(&[0x00, 0x00, 0x20, 0x00]);
        let image = Image::new(0x1000, data);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1000, 0x1006);
        let relocs = RelocTable::new();
        let out = run(&image, &config, &areas, &relocs);
        assert!(out.labels.contains(0x2000));
        assert_eq!(out.visited, vec![0x1000]);
    }

    #[test]
    fn relocation_at_position_is_skipped_as_four_bytes() {
        let data = vec![0; 4];
        let image = Image::new(0x1000, data);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1000, 0x1004);
        let mut relocs = RelocTable::new();
        relocs.insert(crate::reloc::Relocation { at_address: 0x1000, target_value: 0, offset: 0, target_section: 0 });
        let out = run(&image, &config, &areas, &relocs);
        assert_eq!(out.visited, vec![0x1000]);
    }
}
