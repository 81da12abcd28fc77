//! Pass 2: emission. Walks the same code areas Pass 1 walked, replaying the label
//! side file for phase synchronization, and writes Motorola-syntax assembly text.

use std::fmt::Write as _;

use crate::codearea::CodeAreas;
use crate::comment::AnnotationTable;
use crate::config::Config;
use crate::constants;
use crate::dispatch;
use crate::equate::EquateTable;
use crate::image::{Image, Storage};
use crate::label::LabelTable;
use crate::opcode;
use crate::operand::{self, Operand, Size};
use crate::reloc::RelocTable;
use crate::symbol::{xref, SymbolTable};

pub struct Pass2Input<'a> {
    pub image: &'a Image,
    pub config: &'a Config,
    pub areas: &'a CodeAreas,
    pub labels: &'a LabelTable,
    pub relocs: &'a RelocTable,
    pub symbols: &'a SymbolTable,
    pub equates: &'a EquateTable,
    pub annotations: &'a AnnotationTable,
    /// Section (base, end) pairs in ascending base order, for `SECSTRT_n` naming
    /// and for deciding where a code area's trailing data region stops.
    pub sections: &'a [(u32, u32)],
}

/// Produces the complete assembly listing for one input, as it would be written to
/// the `.asm` target (or the main include file, in split mode — split emission
/// itself is the caller's responsibility, since it only changes where these lines
/// land, not their content).
pub fn emit(input: &Pass2Input) -> String {
    let mut out = String::new();
    emit_cpu_directives(&mut out, input.config.cpu_mask);

    let mut last_section: Option<usize> = None;
    for (start, end) in input.areas.iter() {
        let section = section_index(input.sections, start);
        if section != last_section {
            emit_section_header(&mut out, section, input.sections);
            last_section = section;
        }
        emit_code_region(&mut out, input, start, end);
        let data_end = next_boundary(input, end);
        if data_end > end {
            emit_data_region(&mut out, input, end, data_end);
        }
    }

    out.push_str("\tEND\n");
    out
}

fn emit_cpu_directives(out: &mut String, cpu_mask: u32) {
    use crate::config::cpu;
    if cpu_mask & cpu::M68060 != 0 {
        out.push_str("\tCPU\tMC68060\n");
    } else if cpu_mask & cpu::M68040 != 0 {
        out.push_str("\tCPU\tMC68040\n");
    } else if cpu_mask & cpu::M68030 != 0 {
        out.push_str("\tCPU\tMC68030\n");
    } else if cpu_mask & cpu::M68020 != 0 {
        out.push_str("\tCPU\tMC68020\n");
    }
    if cpu_mask & cpu::M68881 != 0 || cpu_mask & cpu::M68882 != 0 {
        out.push_str("\tFPU\tMC68881\n");
    }
    if cpu_mask & cpu::M68851 != 0 {
        out.push_str("\tMMU\tMC68851\n");
    }
}

fn section_index(sections: &[(u32, u32)], address: u32) -> Option<usize> {
    sections.iter().position(|&(base, end)| address >= base && address < end)
}

fn emit_section_header(out: &mut String, section: Option<usize>, sections: &[(u32, u32)]) {
    match section {
        Some(n) => {
            let _ = writeln!(out, "\tSECTION\tS_{},CODE", n);
            let _ = writeln!(out, "SECSTRT_{}:", n);
            let _ = sections;
        }
        None => {
            out.push_str("\tORG\t$0\n");
        }
    }
}

/// An area's trailing data region runs to the next area's start, or to the end of
/// its own section if this is the last area in it.
fn next_boundary(input: &Pass2Input, area_end: u32) -> u32 {
    if let Some(&(next_start, _)) = input
        .areas
        .iter()
        .find(|&(s, _)| s >= area_end)
        .as_ref()
    {
        let section_end = section_index(input.sections, area_end)
            .map(|i| input.sections[i].1)
            .unwrap_or(u32::MAX);
        next_start.min(section_end)
    } else {
        section_index(input.sections, area_end.saturating_sub(1))
            .map(|i| input.sections[i].1)
            .unwrap_or(area_end)
    }
}

fn emit_code_region(out: &mut String, input: &Pass2Input, start: u32, end: u32) {
    let mut pc = start;
    while pc < end {
        emit_annotations(out, input.annotations, pc);
        emit_label(out, input.labels, input.symbols, pc);

        if let Some(reloc) = input.relocs.at(pc) {
            let target = get_label(input, reloc.target_section, pc, true);
            let _ = writeln!(out, "\tDC.L\t{}", target);
            pc += 4;
            continue;
        }

        let word = match input.image.read_word(pc) {
            Ok(w) => w,
            Err(_) => break,
        };
        let entry = opcode::decode(word, input.config.cpu_mask);
        let over = dispatch::dispatch(entry, word, input.config.cpu_mask);

        if entry.mnemonic == "DC.W" || over.invalid {
            let _ = writeln!(out, "\tDC.W\t${:04x}", word);
            pc += 2;
            continue;
        }

        let split = opcode::split(word, entry);

        if entry.mnemonic == "BCC" || entry.mnemonic == "DBCC" {
            let disp8 = (word & 0x00ff) as i8;
            let short_form = entry.mnemonic == "BCC" && disp8 != 0;
            let (len, target) = if short_form {
                (2u32, pc.wrapping_add(2).wrapping_add(disp8 as i32 as u32))
            } else {
                match input.image.read_word(pc.wrapping_add(2)) {
                    Ok(w) => (4u32, pc.wrapping_add(2).wrapping_add(w as i16 as i32 as u32)),
                    Err(_) => {
                        let _ = writeln!(out, "\tDC.W\t${:04x}", word);
                        pc += 2;
                        continue;
                    }
                }
            };
            let target_text = get_label_for_address(input, target);
            if entry.mnemonic == "DBCC" {
                let mnemonic_text = opcode::dbcc_mnemonic(word);
                let _ = writeln!(out, "\t{}\tD{},{}", mnemonic_text, split.ea_register, target_text);
            } else {
                let mnemonic_text = opcode::branch_mnemonic(word);
                let _ = writeln!(out, "\t{}\t{}", mnemonic_text, target_text);
            }
            pc += len;
            continue;
        }

        let mnemonic = over.mnemonic.unwrap_or(entry.mnemonic);
        let mnemonic = if entry.flags.contains(opcode::OpcodeFlags::APPEND_CC) && mnemonic == "SCC" {
            opcode::scc_mnemonic(word)
        } else {
            mnemonic
        };
        let decoded =
            opcode::decode_operands(input.image, pc, word, entry, mnemonic, &split, over.source_mask, over.dest_mask);

        let mnemonic_text = format_mnemonic(mnemonic, entry, decoded.size);
        match (&decoded.source, &decoded.dest) {
            (Operand::None, None) => {
                let _ = writeln!(out, "\t{}", mnemonic_text);
            }
            (source, Some(dest)) => {
                let source_text = format_operand_text(input, source, pc, decoded.size);
                let dest_at = pc.wrapping_add(decoded.len).wrapping_sub(2 + operand::wire_len(dest, decoded.size));
                let dest_text = format_operand_text(input, dest, dest_at, decoded.size);
                let _ = writeln!(out, "\t{}\t{},{}", mnemonic_text, source_text, dest_text);
            }
            (source, None) => {
                let source_text = format_operand_text(input, source, pc, decoded.size);
                let _ = writeln!(out, "\t{}\t{}", mnemonic_text, source_text);
            }
        }

        pc += decoded.len;
    }
}

fn format_mnemonic(mnemonic: &'static str, entry: &opcode::OpcodeEntry, size: Option<Size>) -> String {
    let sized = entry.flags.contains(opcode::OpcodeFlags::APPEND_SIZE) || mnemonic == "MOVE" || mnemonic == "MOVEA";
    match size {
        Some(s) if sized => format!("{}.{}", mnemonic, s.suffix()),
        _ => mnemonic.to_string(),
    }
}

fn format_operand_text(input: &Pass2Input, operand: &Operand, at: u32, size: Option<Size>) -> String {
    match operand {
        Operand::DataRegister(r) => format!("D{}", r),
        Operand::AddressRegister(r) => format!("A{}", r),
        Operand::Indirect(r) => format!("(A{})", r),
        Operand::PostIncrement(r) => format!("(A{})+", r),
        Operand::PreDecrement(r) => format!("-(A{})", r),
        Operand::Displacement { register, displacement } => {
            format_displacement(input, at, *register, *displacement)
        }
        Operand::Indexed { register, displacement, index_reg, index_is_addr, .. } => {
            format!(
                "({},A{},{}{})",
                displacement,
                register,
                if *index_is_addr { "A" } else { "D" },
                index_reg
            )
        }
        Operand::AbsoluteShort(v) => format!("${:04x}.W", v),
        Operand::AbsoluteLong(v) => get_label_for_address(input, *v),
        Operand::PcDisplacement { at: ext_at, displacement } => {
            let target = (*ext_at as i64 + 2 + *displacement as i64) as u32;
            format!("{}(PC)", get_label_for_address(input, target))
        }
        Operand::PcIndexed { index_reg, index_is_addr, .. } => {
            format!("(PC,{}{})", if *index_is_addr { "A" } else { "D" }, index_reg)
        }
        Operand::Immediate(_) => {
            let size = size.unwrap_or(Size::Word);
            let immediate_at = at.wrapping_add(2);
            match operand::read_immediate(input.image, immediate_at, size, false) {
                Ok((value, _)) => format_immediate(input, immediate_at, size, value),
                Err(_) => "#$0".to_string(),
            }
        }
        Operand::ImmediateInline(v) => format!("#${:x}", v),
        Operand::RegisterList(mask) => format_register_list(*mask),
        Operand::None => String::new(),
        Operand::Invalid => "?".to_string(),
    }
}

/// Renders a MOVEM register-list mask (bit 0 = D0 .. bit 15 = A7) as compact
/// slash-separated ranges, e.g. `D0-D3/A0/A5`.
fn format_register_list(mask: u16) -> String {
    let name = |n: u16| if n < 8 { format!("D{}", n) } else { format!("A{}", n - 8) };
    let mut parts = Vec::new();
    let mut i = 0u16;
    while i < 16 {
        if mask & (1 << i) != 0 {
            let start = i;
            while i < 16 && mask & (1 << i) != 0 {
                i += 1;
            }
            let end = i - 1;
            if start == end {
                parts.push(name(start));
            } else {
                parts.push(format!("{}-{}", name(start), name(end)));
            }
        } else {
            i += 1;
        }
    }
    parts.join("/")
}

fn format_immediate(input: &Pass2Input, at: u32, size: Size, value: u32) -> String {
    use crate::config::EquateSize;
    let equate_size = match size {
        Size::Byte => EquateSize::Byte,
        Size::Word => EquateSize::Word,
        Size::Long => EquateSize::Long,
    };
    if let Some(equate) = input.equates.at(at, equate_size) {
        format!("#{}", equate.name)
    } else {
        format!("#${:x}", value)
    }
}

fn format_displacement(input: &Pass2Input, at: u32, register: u16, displacement: i16) -> String {
    if let Some(base_reg) = &input.config.base_reg {
        if base_reg.register as u16 == register {
            if let Some(&(base, end)) = input.sections.get(base_reg.section) {
                let target = (base as i64 + displacement as i64) as u32;
                if target >= base && target < end {
                    return format!("{}(A{})", get_label_for_address(input, target), register);
                }
            }
        }
    }
    let _ = at;
    format!("{}(A{})", displacement, register)
}

fn get_label_for_address(input: &Pass2Input, address: u32) -> String {
    if let Some(n) = input.sections.iter().position(|&(base, _)| base == address) {
        return format!("SECSTRT_{}", n);
    }
    if let Some(name) = input.symbols.name_at(address) {
        return name.to_string();
    }
    let resolved = input.labels.index_of(address).or_else(|| {
        input.labels.corrected(address).and_then(|corrected| input.labels.index_of(corrected))
    });
    match resolved {
        Some(idx) => format!("LAB_{}", idx),
        None => {
            let in_image = address >= input.image.base() && address < input.image.end();
            if in_image {
                format!("LAB_{:08x}", address)
            } else {
                xref::resolve(address)
            }
        }
    }
}

fn get_label(input: &Pass2Input, section: usize, at: u32, _via_reloc: bool) -> String {
    if let Some(&(base, _)) = input.sections.get(section) {
        format!("SECSTRT_{}", section) + &format_offset(input.image.read_long(at).unwrap_or(0).wrapping_sub(base))
    } else {
        format!("LAB_{:08x}", at)
    }
}

fn format_offset(offset: u32) -> String {
    if offset == 0 {
        String::new()
    } else {
        format!("+{}", offset as i32)
    }
}

fn emit_label(out: &mut String, labels: &LabelTable, symbols: &SymbolTable, address: u32) {
    if let Some(name) = symbols.name_at(address) {
        let _ = writeln!(out, "{}:", name);
    } else if let Some(idx) = labels.index_of(address) {
        let _ = writeln!(out, "LAB_{}:", idx);
    }
}

fn emit_annotations(out: &mut String, annotations: &AnnotationTable, address: u32) {
    for note in annotations.at(address) {
        if note.is_banner {
            let _ = writeln!(out, "*{}", "=".repeat(note.text.len().max(1)));
            let _ = writeln!(out, "*{}", note.text);
            let _ = writeln!(out, "*{}", "=".repeat(note.text.len().max(1)));
        } else {
            let _ = writeln!(out, "\t; {}", note.text);
        }
    }
}

/// Classifies and emits the data region `[start, end)` between two code areas: a
/// relocation takes priority, then an equate, then a configured jump-table, then
/// text detection, then a generic aligned `DC.B/W/L` dump.
fn emit_data_region(out: &mut String, input: &Pass2Input, start: u32, end: u32) {
    let mut pc = start;
    while pc < end {
        emit_annotations(out, input.annotations, pc);
        emit_label(out, input.labels, input.symbols, pc);

        if let Some(reloc) = input.relocs.at(pc) {
            let target = get_label(input, reloc.target_section, pc, true);
            let _ = writeln!(out, "\tDC.L\t{}", target);
            pc += 4;
            continue;
        }

        if let Some(table) = input
            .config
            .jump_tables
            .iter()
            .find(|t| t.start == pc)
        {
            emit_jump_table(out, input, table);
            pc = table.end;
            continue;
        }

        if let Some(run) = text_run_at(input.image, pc, end) {
            let text: String = run.iter().map(|&b| b as char).collect();
            let _ = writeln!(out, "\tDC.B\t\"{}\"", text.replace('"', "\\\""));
            pc += run.len() as u32;
            continue;
        }

        let chunk_end = (pc + constants::LONG_BYTES * constants::MAX_DATA_PER_LINE as u32).min(end);
        emit_data_line(out, input.image, pc, chunk_end);
        pc = chunk_end;
    }
}

fn emit_jump_table(out: &mut String, input: &Pass2Input, table: &crate::config::JumpTableConfig) {
    let jt = crate::jumptable::JumpTable {
        start: table.start,
        end: table.end,
        base: table.base,
        element_size: table.element_size,
    };
    let suffix = match table.element_size {
        1 => "B",
        2 => "W",
        _ => "L",
    };
    for target in jt.targets(input.image) {
        let label = get_label_for_address(input, target);
        let _ = writeln!(out, "\tDC.{}\t{}-{}", suffix, label, get_label_for_address(input, table.base));
    }
}

fn text_run_at(image: &Image, start: u32, end: u32) -> Option<Vec<u8>> {
    let mut run = Vec::new();
    let mut pc = start;
    while pc < end {
        match image.read_byte(pc) {
            Ok(b) if b.is_ascii_graphic() || b == b' ' => {
                run.push(b);
                pc += 1;
            }
            _ => break,
        }
    }
    if run.len() >= constants::MIN_TEXT_RUN {
        Some(run)
    } else {
        None
    }
}

fn emit_data_line(out: &mut String, image: &Image, start: u32, end: u32) {
    let mut values = Vec::new();
    let mut pc = start;
    while pc < end {
        if let Ok(l) = image.read_long(pc) {
            values.push(l);
            pc += 4;
        } else {
            break;
        }
    }
    if !values.is_empty() {
        let items: Vec<String> = values.iter().map(|v| format!("${:08x}", v)).collect();
        let _ = writeln!(out, "\tDC.L\t{}", items.join(","));
    }
    if pc < end {
        let remaining = (end - pc) as usize;
        let _ = writeln!(out, "\tDS.B\t{}", remaining);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{cpu, Config};

    #[test]
    fn emits_rts_instruction() {
        let image = Image::new(0x1000, vec![0x4e, 0x75]);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1000, 0x1002);
        let labels = LabelTable::new();
        let relocs = RelocTable::new();
        let symbols = SymbolTable::new();
        let equates = EquateTable::new();
        let annotations = AnnotationTable::new();
        let sections = [(0x1000, 0x1002)];
        let input = Pass2Input {
            image: &image,
            config: &config,
            areas: &areas,
            labels: &labels,
            relocs: &relocs,
            symbols: &symbols,
            equates: &equates,
            annotations: &annotations,
            sections: &sections,
        };
        let text = emit(&input);
        assert!(text.contains("RTS"));
        assert!(text.contains("SECSTRT_0"));
        assert!(text.trim_end().ends_with("END"));
    }

    #[test]
    fn unknown_word_falls_back_to_dc_w() {
        let image = Image::new(0x1000, vec![0xff, 0xff]);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1000, 0x1002);
        let labels = LabelTable::new();
        let relocs = RelocTable::new();
        let symbols = SymbolTable::new();
        let equates = EquateTable::new();
        let annotations = AnnotationTable::new();
        let sections = [(0x1000, 0x1002)];
        let input = Pass2Input {
            image: &image,
            config: &config,
            areas: &areas,
            labels: &labels,
            relocs: &relocs,
            symbols: &symbols,
            equates: &equates,
            annotations: &annotations,
            sections: &sections,
        };
        let text = emit(&input);
        assert!(text.contains("DC.W\t$ffff"));
    }

    #[test]
    fn move_immediate_word_substitutes_equate_and_keeps_destination() {
        // MOVE.W #$1234,D0 at 0x1ffe; the immediate word lands at 0x2000.
        let image = Image::new(0x1ffe, vec![0x30, 0x3c, 0x12, 0x34]);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1ffe, 0x2002);
        let labels = LabelTable::new();
        let relocs = RelocTable::new();
        let symbols = SymbolTable::new();
        let mut equates = EquateTable::new();
        equates.insert(crate::equate::Equate {
            name: "FOO".to_string(),
            address: 0x2000,
            size: crate::config::EquateSize::Word,
            value: 0x1234,
        });
        let annotations = AnnotationTable::new();
        let sections = [(0x1ffe, 0x2002)];
        let input = Pass2Input {
            image: &image,
            config: &config,
            areas: &areas,
            labels: &labels,
            relocs: &relocs,
            symbols: &symbols,
            equates: &equates,
            annotations: &annotations,
            sections: &sections,
        };
        let text = emit(&input);
        assert!(text.contains("MOVE.W\t#FOO,D0"), "{}", text);
    }

    #[test]
    fn movea_long_reads_address_register_destination_with_no_extra_extension() {
        // MOVEA.L (A1),A0 -> 0x2051
        let image = Image::new(0x1000, vec![0x20, 0x51]);
        let config = Config { cpu_mask: cpu::M68000, ..Config::default() };
        let mut areas = CodeAreas::new();
        areas.insert(0x1000, 0x1002);
        let labels = LabelTable::new();
        let relocs = RelocTable::new();
        let symbols = SymbolTable::new();
        let equates = EquateTable::new();
        let annotations = AnnotationTable::new();
        let sections = [(0x1000, 0x1002)];
        let input = Pass2Input {
            image: &image,
            config: &config,
            areas: &areas,
            labels: &labels,
            relocs: &relocs,
            symbols: &symbols,
            equates: &equates,
            annotations: &annotations,
            sections: &sections,
        };
        let text = emit(&input);
        assert!(text.contains("MOVEA.L\t(A1),A0"), "{}", text);
    }
}
