use wraith_serde::BitWrite;

use crate::{config::ReplicationConfig, host::baseline::BaselineTriple};

/// Fixed-capacity bit staging buffer. Overflow never panics and never
/// reallocates mid-pass; it latches a flag the serializer turns into a
/// grow-and-retry. Truncation to a saved mark is how group rollback
/// and budget aborts are implemented.
pub struct BitScratch {
    words: Vec<u64>,
    len_bits: u32,
    capacity_bits: u32,
    overflowed: bool,
}

impl BitScratch {
    pub fn with_capacity_bits(capacity_bits: u32) -> Self {
        Self {
            words: vec![0; (capacity_bits as usize).div_ceil(64)],
            len_bits: 0,
            capacity_bits,
            overflowed: false,
        }
    }

    pub fn clear(&mut self) {
        self.len_bits = 0;
        self.overflowed = false;
    }

    pub fn len_bits(&self) -> u32 {
        self.len_bits
    }

    pub fn capacity_bits(&self) -> u32 {
        self.capacity_bits
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn mark(&self) -> u32 {
        self.len_bits
    }

    pub fn truncate(&mut self, mark: u32) {
        debug_assert!(mark <= self.len_bits);
        self.len_bits = mark;
    }

    pub fn bit(&self, index: u32) -> bool {
        debug_assert!(index < self.len_bits);
        self.words[(index / 64) as usize] & (1u64 << (index % 64)) != 0
    }

    /// Append every bit of `other`.
    pub fn append_from(&mut self, other: &BitScratch) {
        for index in 0..other.len_bits {
            self.write_bit(other.bit(index));
        }
    }

    /// Replay the staged bits into a real writer.
    pub fn copy_into(&self, writer: &mut dyn BitWrite) {
        for index in 0..self.len_bits {
            writer.write_bit(self.bit(index));
        }
    }

    /// Explicit reallocation point; the only way capacity changes.
    pub fn grow(&mut self, capacity_bits: u32) {
        debug_assert!(capacity_bits >= self.capacity_bits);
        self.capacity_bits = capacity_bits;
        self.words.resize((capacity_bits as usize).div_ceil(64), 0);
        self.overflowed = false;
    }
}

impl BitWrite for BitScratch {
    fn write_bit(&mut self, bit: bool) {
        if self.len_bits >= self.capacity_bits {
            self.overflowed = true;
            return;
        }
        let word = (self.len_bits / 64) as usize;
        let mask = 1u64 << (self.len_bits % 64);
        if bit {
            self.words[word] |= mask;
        } else {
            self.words[word] &= !mask;
        }
        self.len_bits += 1;
    }

    fn write_byte(&mut self, byte: u8) {
        for index in 0..8 {
            self.write_bit(byte & (1 << index) != 0);
        }
    }

    fn is_counter(&self) -> bool {
        false
    }

    fn count_bits(&mut self, _bits: u32) {}
}

/// Per-worker serialization workspace, sized once per tick. One block
/// at a time flows through it: component payloads stage in `payload`,
/// each entity's body in `body`, the batch's committed records in
/// `records`.
pub struct SerializeScratch {
    pub payload: BitScratch,
    pub body: BitScratch,
    pub records: BitScratch,
    pub triples: Vec<BaselineTriple>,
    pub predicted: Vec<u32>,
    pub cur_mask: Vec<u32>,
    pub mask_stash: Vec<u32>,
    pub emitted: Vec<usize>,
}

impl SerializeScratch {
    pub fn new(config: &ReplicationConfig) -> Self {
        Self::with_capacity_bits(config.scratch_capacity_bits)
    }

    pub fn with_capacity_bits(capacity_bits: u32) -> Self {
        Self {
            payload: BitScratch::with_capacity_bits(capacity_bits),
            body: BitScratch::with_capacity_bits(capacity_bits),
            records: BitScratch::with_capacity_bits(capacity_bits),
            triples: Vec::new(),
            predicted: Vec::new(),
            cur_mask: Vec::new(),
            mask_stash: Vec::new(),
            emitted: Vec::new(),
        }
    }

    /// Reset per-block state. Capacity is untouched.
    pub fn reset(&mut self) {
        self.payload.clear();
        self.body.clear();
        self.records.clear();
        self.triples.clear();
        self.mask_stash.clear();
        self.emitted.clear();
    }

    pub fn capacity_bits(&self) -> u32 {
        self.records.capacity_bits()
    }

    pub fn overflowed(&self) -> bool {
        self.payload.overflowed() || self.body.overflowed() || self.records.overflowed()
    }

    /// Double every staging region, bounded by `max_bits`. Returns
    /// false when the ceiling has been reached.
    pub fn grow(&mut self, max_bits: u32) -> bool {
        let current = self.capacity_bits();
        if current >= max_bits {
            return false;
        }
        let next = (current * 2).min(max_bits);
        self.payload.grow(next);
        self.body.grow(next);
        self.records.grow(next);
        true
    }
}
