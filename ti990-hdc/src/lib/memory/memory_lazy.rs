use ahash::AHashMap;
use std::ops::{Index, IndexMut};

use super::DMA_WINDOW_WORDS;

const PAGE_SHIFT: usize = 11;
const PAGE_WORDS: usize = 1 << PAGE_SHIFT;
const PAGE_MASK: usize = PAGE_WORDS - 1;
const NUM_PAGES: usize = DMA_WINDOW_WORDS >> PAGE_SHIFT;

/// Lazy memory implementation: pages of 2048 words, allocated on first write.
pub struct Ram {
    data: AHashMap<usize, Vec<u16>>,
}

impl Ram {
    pub fn new() -> Self {
        Self {
            data: AHashMap::with_capacity(NUM_PAGES),
        }
    }

    fn get(&self, index: usize) -> &u16 {
        assert!(index < DMA_WINDOW_WORDS, "word index {:#X} outside the DMA window", index);
        match self.data.get(&(index >> PAGE_SHIFT)) {
            Some(page) => &page[index & PAGE_MASK],
            None => &0,
        }
    }

    fn get_mut(&mut self, index: usize) -> &mut u16 {
        assert!(index < DMA_WINDOW_WORDS, "word index {:#X} outside the DMA window", index);
        let page = self
            .data
            .entry(index >> PAGE_SHIFT)
            .or_insert_with(|| vec![0; PAGE_WORDS]);
        &mut page[index & PAGE_MASK]
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Ram {
    type Output = u16;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index)
    }
}

impl IndexMut<usize> for Ram {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.get_mut(index)
    }
}
