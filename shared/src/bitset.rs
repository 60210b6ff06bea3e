/// Growable bitset over `u32` words. Backs change masks and enable
/// masks, where wire layout is also word-granular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitArray {
    words: Vec<u32>,
    bits: usize,
}

impl BitArray {
    pub fn with_bits(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(32)],
            bits,
        }
    }

    pub fn from_words(words: Vec<u32>, bits: usize) -> Self {
        debug_assert!(words.len() == bits.div_ceil(32));
        Self { words, bits }
    }

    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn set(&mut self, bit: usize, value: bool) {
        debug_assert!(bit < self.bits);
        let word = bit / 32;
        let mask = 1u32 << (bit % 32);
        if value {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
    }

    pub fn get(&self, bit: usize) -> bool {
        debug_assert!(bit < self.bits);
        self.words[bit / 32] & (1u32 << (bit % 32)) != 0
    }

    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    pub fn set_all(&mut self) {
        self.words.fill(u32::MAX);
        self.mask_tail();
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|word| *word != 0)
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// In-place XOR with another set of the same length.
    pub fn xor_with(&mut self, other: &BitArray) {
        debug_assert_eq!(self.bits, other.bits);
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word ^= other_word;
        }
    }

    /// In-place OR with another set of the same length.
    pub fn or_with(&mut self, other: &BitArray) {
        debug_assert_eq!(self.bits, other.bits);
        for (word, other_word) in self.words.iter_mut().zip(&other.words) {
            *word |= other_word;
        }
    }

    /// Indices of set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, word)| {
                let mut word = *word;
                std::iter::from_fn(move || {
                    if word == 0 {
                        return None;
                    }
                    let bit = word.trailing_zeros() as usize;
                    word &= word - 1;
                    Some(word_index * 32 + bit)
                })
            })
    }

    /// Grow to `bits`, new bits cleared. Shrinking is not supported.
    pub fn resize(&mut self, bits: usize) {
        debug_assert!(bits >= self.bits);
        self.bits = bits;
        self.words.resize(bits.div_ceil(32), 0);
    }

    fn mask_tail(&mut self) {
        let tail = self.bits % 32;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u32 << tail) - 1;
            }
        }
    }
}
