//! Opcode-family dispatcher (`DoSpecific`): post-decode adjustments that depend on
//! bits outside the generic `(mask, result)` classification. Runs identically at all
//! three passes; only Pass 2 callers use the returned mnemonic override for text.

use crate::opcode::OpcodeEntry;
use crate::operand::Mode;

/// Adjustments `DoSpecific` may apply on top of a generic decode.
pub struct Override {
    pub mnemonic: Option<&'static str>,
    pub source_mask: Option<Mode>,
    pub dest_mask: Option<Mode>,
    pub invalid: bool,
}

impl Override {
    fn none() -> Override {
        Override { mnemonic: None, source_mask: None, dest_mask: None, invalid: false }
    }

    fn invalid() -> Override {
        Override { invalid: true, ..Override::none() }
    }
}

/// `CMPI`/`TST` gain PC-relative source addressing on the 68020 and later; every
/// other opcode family in this build's table needs no bit-level override.
pub fn dispatch(entry: &OpcodeEntry, word: u16, cpu_mask: u32) -> Override {
    use crate::config::cpu;

    match entry.mnemonic {
        "CMPI" | "TST" if cpu_mask & !cpu::M68000 != 0 => Override {
            source_mask: Some(Mode(Mode::all_data().0 | Mode::bit(9).0)),
            ..Override::none()
        },
        "BFCHG" | "BFCLR" | "BFSET" | "BFINS" | "BFEXTU" | "BFEXTS" | "BFFFO" | "BFTST" => {
            bitfield_override(word)
        }
        "PMOVE" => pmove_override(word),
        _ => Override::none(),
    }
}

/// Bit-field operations share one instruction word layout; the extension word
/// (read separately by the operand resolver) carries offset/width, but the *mode*
/// class of the effective-address operand is fixed per sub-op here: `CHG/CLR/SET/
/// INS` accept a narrower destination mask than `EXTU/EXTS/FFO/TST`, which are
/// read-only.
fn bitfield_override(word: u16) -> Override {
    let writes = matches!(word & 0x0fc0, 0x0ac0 | 0x0cc0 | 0x0ec0 | 0x0fc0);
    let mask = if writes {
        Mode(Mode::bit(0).0 | Mode::bit(2).0 | Mode::bit(5).0 | Mode::bit(6).0 | Mode::bit(7).0 | Mode::bit(8).0)
    } else {
        Mode(Mode::bit(0).0 | Mode::bit(2).0 | Mode::bit(5).0 | Mode::bit(6).0 | Mode::bit(7).0 | Mode::bit(8).0 | Mode::bit(9).0)
    };
    Override { dest_mask: Some(mask), ..Override::none() }
}

/// PMOVE's extension word selects among PMOVE-TT/format-1/format-2/PFLUSH/PTEST
/// sub-forms; this build recognizes the plain MMU-register move and rejects any
/// reserved extension pattern rather than decoding the full PMMU sub-format table.
fn pmove_override(word: u16) -> Override {
    if word & 0x0020 != 0 {
        Override::invalid()
    } else {
        Override { mnemonic: Some("PMOVE"), ..Override::none() }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::cpu;
    use crate::opcode::{decode};

    #[test]
    fn cmpi_gains_pc_relative_source_on_020() {
        let entry = decode(0x0c00, cpu::M68020);
        let over = dispatch(entry, 0x0c00, cpu::M68020);
        assert!(over.source_mask.is_some());
    }

    #[test]
    fn cmpi_unchanged_on_plain_68000() {
        let entry = decode(0x0c00, cpu::M68000);
        let over = dispatch(entry, 0x0c00, cpu::M68000);
        assert!(over.source_mask.is_none());
    }

    #[test]
    fn bftst_read_only_mask_excludes_predecrement() {
        let entry = decode(0xe8c0, cpu::M68020);
        let over = dispatch(entry, 0xe8c0, cpu::M68020);
        let mask = over.dest_mask.unwrap();
        assert!(!mask.allows(4));
    }
}
