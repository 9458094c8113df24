use std::ops::{Index, IndexMut};

use super::DMA_WINDOW_WORDS;

/// Eager memory implementation: every word of the window allocated up front,
/// in a fixed-size boxed slice.
#[derive(Clone)]
pub struct Ram {
    words: Box<[u16]>,
}

impl Ram {
    pub fn new() -> Self {
        Self {
            words: vec![0; DMA_WINDOW_WORDS].into_boxed_slice(),
        }
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for Ram {
    type Output = u16;

    fn index(&self, word: usize) -> &u16 {
        &self.words[word]
    }
}

impl IndexMut<usize> for Ram {
    fn index_mut(&mut self, word: usize) -> &mut u16 {
        &mut self.words[word]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_window() {
        let mut ram = Ram::new();
        assert_eq!(ram.words.len(), DMA_WINDOW_WORDS);
        ram[DMA_WINDOW_WORDS - 1] = 0xBEEF;
        let copy = ram.clone();
        ram[DMA_WINDOW_WORDS - 1] = 0;
        assert_eq!(copy[DMA_WINDOW_WORDS - 1], 0xBEEF);
        assert_eq!(ram[0], 0);
    }
}
