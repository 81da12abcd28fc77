//! Flat raw-binary "container": the whole file is one `CODE` section loaded at
//! whatever address the caller supplies on the command line.

use crate::{ContainerResult, MemoryAttr, Section, SectionKind};

pub fn read_raw_binary(data: Vec<u8>) -> ContainerResult {
    let size = data.len() as u32;
    ContainerResult {
        image: data,
        sections: vec![Section {
            kind: SectionKind::Code,
            memory: MemoryAttr::Public,
            base: 0,
            size,
        }],
        relocs: Vec::new(),
        symbols: Vec::new(),
        entry_section: 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_file_becomes_one_code_section() {
        let result = read_raw_binary(vec![0x4e, 0x75, 0x00, 0x00]);
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].kind, SectionKind::Code);
        assert_eq!(result.sections[0].size, 4);
        assert!(result.relocs.is_empty());
    }
}
