//! Comment / banner table: printed at emission time whenever an entry's address
//! matches the instruction or data line about to be written.

#[derive(Clone, Debug)]
pub struct Annotation {
    pub address: u32,
    pub text: String,
    pub is_banner: bool,
}

#[derive(Default)]
pub struct AnnotationTable {
    entries: Vec<Annotation>,
}

impl AnnotationTable {
    pub fn new() -> AnnotationTable {
        AnnotationTable::default()
    }

    pub fn insert(&mut self, annotation: Annotation) {
        self.entries.push(annotation);
    }

    pub fn at(&self, address: u32) -> impl Iterator<Item = &Annotation> {
        self.entries.iter().filter(move |a| a.address == address)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn multiple_entries_at_one_address_are_all_returned() {
        let mut table = AnnotationTable::new();
        table.insert(Annotation { address: 0x1000, text: "hello".into(), is_banner: false });
        table.insert(Annotation { address: 0x1000, text: "=====".into(), is_banner: true });
        table.insert(Annotation { address: 0x2000, text: "elsewhere".into(), is_banner: false });
        assert_eq!(table.at(0x1000).count(), 2);
        assert_eq!(table.at(0x3000).count(), 0);
    }
}
