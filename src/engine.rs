//! The engine: orchestrates container read, optional Pass 0, Pass 1 and Pass 2 in
//! strict sequence. Single-threaded, no cancellation; any fatal condition returns
//! an [`EngineError`] for the caller to report and exit on.

use std::io::{Read, Seek};

use ira_container::{ContainerResult, ReadContainerExt, SectionKind};
use log::{debug, info, warn};

use crate::comment::AnnotationTable;
use crate::config::{Config, ConfigFlags};
use crate::equate::{Equate, EquateTable};
use crate::error::EngineError;
use crate::image::Image;
use crate::label::LabelTable;
use crate::pass0;
use crate::pass1;
use crate::pass2::{self, Pass2Input};
use crate::reloc::{RelocTable, Relocation};
use crate::romtag;
use crate::symbol::SymbolTable;

pub struct Engine {
    config: Config,
}

impl Engine {
    pub fn new(config: Config) -> Engine {
        Engine { config }
    }

    /// Runs the full container-read -> Pass 0 -> Pass 1 -> Pass 2 pipeline and
    /// returns the finished assembly text.
    pub fn run<R: Read + Seek>(&self, reader: &mut R) -> Result<String, EngineError> {
        let container = reader.read_container()?;
        info!("read container: {} sections, {} bytes", container.sections.len(), container.image.len());

        if container.sections.iter().all(|s| s.kind != SectionKind::Code) {
            return Err(EngineError::NoCodeSections);
        }

        let base = self.config.prg_start;
        let image = Image::new(base, container.image.clone());
        let sections: Vec<(u32, u32)> = container
            .sections
            .iter()
            .map(|s| (base + s.base, base + s.end()))
            .collect();

        let mut relocs = RelocTable::new();
        for r in &container.relocs {
            let target_base = sections.get(r.target_section).map(|&(b, _)| b).unwrap_or(base);
            let at_address = base + container.sections[r.section].base + r.offset;
            relocs.insert(Relocation {
                at_address,
                target_value: target_base,
                offset: 0,
                target_section: r.target_section,
            });
        }

        let mut symbols = SymbolTable::new();
        for s in &container.symbols {
            let addr = base + container.sections[s.section].base + s.offset;
            symbols.insert(s.name.clone(), addr);
        }
        for (name, addr) in &self.config.symbols {
            symbols.insert(name.clone(), *addr);
        }

        let mut equates = EquateTable::new();
        for e in &self.config.equates {
            equates.insert(Equate { name: e.name.clone(), address: e.address, size: e.size, value: 0 });
        }

        let mut annotations = AnnotationTable::new();
        for c in &self.config.comments {
            annotations.insert(crate::comment::Annotation { address: c.address, text: c.text.clone(), is_banner: c.is_banner });
        }

        let entry = self.config.code_entry.unwrap_or(sections[container.entry_section].0);

        let mut scan_symbols = SymbolTable::new();
        let mut scan_relocs = RelocTable::new();
        let scan = romtag::scan(&image, &mut scan_symbols, &mut scan_relocs);
        debug!("rom-tag scan found {} resident tags", scan.tags.len());

        let areas = if self.config.flags.contains(ConfigFlags::PREPROC) {
            let mut seeds = vec![entry];
            seeds.extend(scan.code_seeds.iter().copied());
            let areas = pass0::discover(&image, &self.config, &seeds);
            if areas.is_empty() {
                warn!("pass 0 discovered no reachable code from seed {:#010x}; falling back to section seeding", entry);
                section_seeded_areas(&sections, &container, entry)
            } else {
                areas
            }
        } else {
            section_seeded_areas(&sections, &container, entry)
        };

        let labels = LabelTable::new();
        let pass1_out = pass1::run(&image, &self.config, &areas, &relocs);
        info!("pass 1 visited {} instruction boundaries, {} labels", pass1_out.visited.len(), pass1_out.labels.len());

        let input = Pass2Input {
            image: &image,
            config: &self.config,
            areas: &areas,
            labels: if pass1_out.labels.is_empty() { &labels } else { &pass1_out.labels },
            relocs: &relocs,
            symbols: &symbols,
            equates: &equates,
            annotations: &annotations,
            sections: &sections,
        };
        Ok(pass2::emit(&input))
    }
}

fn section_seeded_areas(sections: &[(u32, u32)], container: &ContainerResult, entry: u32) -> crate::codearea::CodeAreas {
    let mut areas = crate::codearea::CodeAreas::new();
    for (i, section) in container.sections.iter().enumerate() {
        if section.kind != SectionKind::Code {
            continue;
        }
        let (base, end) = sections[i];
        areas.split_at(base);
        areas.split_at(end);
        let start = if base <= entry && entry < end { entry } else { base };
        areas.insert(start, end);
    }
    areas
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::cpu;
    use std::io::Cursor;

    #[test]
    fn runs_end_to_end_over_raw_binary() {
        let data = vec![0x4e, 0x75, 0x00, 0x00]; // RTS; doesn't start with a hunk magic
        let mut config = Config::default();
        config.cpu_mask = cpu::M68000;
        config.prg_start = 0x1000;
        let engine = Engine::new(config);
        let mut cursor = Cursor::new(data);
        let text = engine.run(&mut cursor).expect("raw binary should reassemble");
        assert!(text.contains("RTS"));
        assert!(text.trim_end().ends_with("END"));
    }

    #[test]
    fn truncated_stream_is_a_fatal_error() {
        let mut config = Config::default();
        config.cpu_mask = cpu::M68000;
        let engine = Engine::new(config);
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(engine.run(&mut cursor).is_err());
    }
}
