//! The label table: every address flagged as a jump/branch/pointer destination.
//! Weakly ascending; consumers collapse runs of equal addresses to one label.

use ira_util::{sorted_find_at_or_before, sorted_find_leftmost, sorted_insert};

#[derive(Default)]
pub struct LabelTable {
    addresses: Vec<u32>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable::default()
    }

    pub fn insert(&mut self, address: u32) {
        sorted_insert(&mut self.addresses, address);
    }

    pub fn contains(&self, address: u32) -> bool {
        sorted_find_leftmost(&self.addresses, address).is_some()
    }

    /// Index of the leftmost entry equal to `address`, collapsing duplicate runs.
    pub fn index_of(&self, address: u32) -> Option<usize> {
        sorted_find_leftmost(&self.addresses, address)
    }

    /// Address of the entry at or immediately before `address` — used to compute the
    /// "corrected label" when a raw target points mid-instruction.
    pub fn corrected(&self, address: u32) -> Option<u32> {
        sorted_find_at_or_before(&self.addresses, address).map(|i| self.addresses[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.addresses.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_inserts_collapse_at_lookup() {
        let mut labels = LabelTable::new();
        labels.insert(0x2000);
        labels.insert(0x1000);
        labels.insert(0x2000);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.index_of(0x2000), Some(1));
    }

    #[test]
    fn corrected_rounds_down_to_nearest_label() {
        let mut labels = LabelTable::new();
        labels.insert(0x1000);
        labels.insert(0x1010);
        assert_eq!(labels.corrected(0x1008), Some(0x1000));
        assert_eq!(labels.corrected(0x0ff0), None);
    }
}
