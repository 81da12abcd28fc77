//! Equate table: named constants substituted for an immediate value at a specific
//! address, sized to the immediate the decoder emits there.

use crate::config::EquateSize;

#[derive(Clone, Debug)]
pub struct Equate {
    pub name: String,
    pub address: u32,
    pub size: EquateSize,
    pub value: u32,
}

#[derive(Default)]
pub struct EquateTable {
    entries: Vec<Equate>,
}

impl EquateTable {
    pub fn new() -> EquateTable {
        EquateTable::default()
    }

    /// Multiple equates sharing a name must agree on value; the first registration
    /// wins and later agreeing ones are accepted silently.
    pub fn insert(&mut self, equate: Equate) {
        if let Some(existing) = self.entries.iter().find(|e| e.name == equate.name) {
            debug_assert_eq!(
                existing.value, equate.value,
                "equate {} redefined with a conflicting value",
                equate.name
            );
            return;
        }
        self.entries.push(equate);
    }

    pub fn at(&self, address: u32, size: EquateSize) -> Option<&Equate> {
        self.entries
            .iter()
            .find(|e| e.address == address && e.size == size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_equate_by_address_and_size() {
        let mut table = EquateTable::new();
        table.insert(Equate {
            name: "LVOOpenLibrary".to_string(),
            address: 0x1000,
            size: EquateSize::Long,
            value: 0xffffff00,
        });
        assert!(table.at(0x1000, EquateSize::Long).is_some());
        assert!(table.at(0x1000, EquateSize::Word).is_none());
    }
}
