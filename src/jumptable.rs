//! Jump-table descriptor: an interval of signed displacements, each naming a branch
//! target relative to a shared base.

#[derive(Clone, Copy, Debug)]
pub struct JumpTable {
    pub start: u32,
    pub end: u32,
    pub base: u32,
    pub element_size: u32,
}

impl JumpTable {
    /// Reads every entry's displacement out of `image` and returns the resolved
    /// target addresses, in table order.
    pub fn targets(&self, image: &crate::image::Image) -> Vec<u32> {
        use crate::image::Storage;

        let mut targets = Vec::new();
        let mut addr = self.start;
        while addr < self.end {
            let displacement: i64 = match self.element_size {
                1 => image.read_byte(addr).map(|b| b as i8 as i64).unwrap_or(0),
                2 => image.read_word(addr).map(|w| w as i16 as i64).unwrap_or(0),
                4 => image.read_long(addr).map(|l| l as i32 as i64).unwrap_or(0),
                _ => 0,
            };
            targets.push((self.base as i64 + displacement) as u32);
            addr += self.element_size;
        }
        targets
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::Image;

    #[test]
    fn resolves_word_displacements_relative_to_base() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        let image = Image::new(0x1000, data);
        let table = JumpTable {
            start: 0x1000,
            end: 0x1004,
            base: 0x1000,
            element_size: 2,
        };
        assert_eq!(table.targets(&image), vec![0x1000, 0x1004]);
    }
}
