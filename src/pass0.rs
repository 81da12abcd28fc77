//! Pass 0: optional reachability walk that discovers code areas before labels are
//! collected. Starts from a work queue of known entry points (configured entry,
//! ROM-tag init functions, anything found so far) and walks instructions until it
//! hits a terminator, a section edge, or ground already covered.

use std::collections::VecDeque;

use crate::codearea::CodeAreas;
use crate::config::Config;
use crate::dispatch;
use crate::image::{Image, Storage};
use crate::opcode;
use crate::operand::{self, Operand};

/// Mnemonics that end a straight-line walk without being able to fall through.
fn is_terminator(mnemonic: &str) -> bool {
    matches!(mnemonic, "RTS" | "RTE" | "RTR" | "RTD" | "RTM")
}

/// Walks from every seed address, recording finalized straight-line runs into
/// `areas`. Returns early out of a walk (without finalizing it) on an invalid
/// decode or a run past the end of the image, matching the reference behaviour
/// where garbage code never becomes a confirmed area.
pub fn discover(image: &Image, config: &Config, seeds: &[u32]) -> CodeAreas {
    let mut areas = CodeAreas::new();
    let mut queue: VecDeque<u32> = seeds.iter().copied().collect();
    let mut visited_starts: Vec<u32> = Vec::new();

    while let Some(seed) = queue.pop_front() {
        if areas.contains(seed) || visited_starts.contains(&seed) {
            continue;
        }
        visited_starts.push(seed);

        let mut pc = seed;
        let run_start = seed;
        loop {
            if pc >= image.end() {
                break;
            }
            if areas.contains(pc) && pc != run_start {
                // Walked into ground already finalized by an earlier seed.
                areas.insert(run_start, pc);
                break;
            }

            let word = match image.read_word(pc) {
                Ok(w) => w,
                Err(_) => break,
            };
            let entry = opcode::decode(word, config.cpu_mask);
            if entry.mnemonic == "DC.W" {
                break;
            }
            let over = dispatch::dispatch(entry, word, config.cpu_mask);
            if over.invalid {
                break;
            }

            let split = opcode::split(word, entry);
            let mut len = 2u32;

            if entry.mnemonic == "BCC" || entry.mnemonic == "DBCC" {
                // Branch/loop displacement lives in the word itself or the next word.
                let disp8 = (word & 0x00ff) as i8;
                let target = if disp8 == 0 {
                    match image.read_word(pc.wrapping_add(2)) {
                        Ok(w) => {
                            len = 4;
                            pc.wrapping_add(2).wrapping_add(w as i16 as i32 as u32)
                        }
                        Err(_) => break,
                    }
                } else {
                    pc.wrapping_add(2).wrapping_add(disp8 as i32 as u32)
                };
                if entry.mnemonic == "BCC" && word & 0x0f00 == 0 {
                    // unconditional BRA terminates the straight-line walk
                    queue.push_back(target);
                    areas.insert(run_start, pc + len);
                    break;
                }
                queue.push_back(target);
            } else if matches!(entry.mnemonic, "JMP" | "JSR") {
                let operand = operand::resolve(image, pc.wrapping_add(2), split.address_mode, split.ea_register);
                len += operand.extension_bytes();
                if let Operand::AbsoluteLong(target) = operand {
                    queue.push_back(target);
                }
                if entry.mnemonic == "JMP" {
                    areas.insert(run_start, pc + len);
                    break;
                }
            } else {
                let decoded =
                    opcode::decode_operands(image, pc, word, entry, entry.mnemonic, &split, over.source_mask, over.dest_mask);
                len = decoded.len;
                if split.extension == 2 && entry.flags.contains(opcode::OpcodeFlags::ONE_MORE_WORD) {
                    len += 2;
                }
            }

            if is_terminator(entry.mnemonic) {
                areas.insert(run_start, pc + len);
                break;
            }

            pc += len;
        }
    }

    areas
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::cpu;

    #[test]
    fn stops_walk_at_rts() {
        let data = vec![0x4e, 0x75]; // RTS
        let image = Image::new(0x1000, data);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let areas = discover(&image, &config, &[0x1000]);
        assert!(areas.contains(0x1000));
        assert!(!areas.contains(0x1002));
    }

    #[test]
    fn follows_unconditional_branch_target() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0x60, 0x02]); // BRA +2 -> 0x1004
        data.extend_from_slice(&[0x4e, 0x75]); // RTS (unreachable straight line)
        data.extend_from_slice(&[0x4e, 0x75]); // RTS at target
        let image = Image::new(0x1000, data);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let areas = discover(&image, &config, &[0x1000]);
        assert!(areas.contains(0x1000));
        assert!(areas.contains(0x1004));
    }
}
