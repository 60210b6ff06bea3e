use crate::constants::MTU_SIZE_BITS;

/// Destination for bit-granular writes. Implemented by the real
/// [`BitWriter`] and by the dry-run [`BitCounter`].
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn is_counter(&self) -> bool;
    /// Bulk-advance a counter without touching bit values. No-op on a
    /// real writer.
    fn count_bits(&mut self, bits: u32);
}

/// Bit-packed packet writer with a hard capacity.
///
/// Bits are written LSB-first within each byte: the first bit written
/// lands in bit 0 of the first byte. Capacity is enforced through the
/// [`BitCounter`] dry-run discipline; writing past capacity is a caller
/// bug and asserts.
pub struct BitWriter {
    scratch: u8,
    scratch_index: u8,
    buffer: Vec<u8>,
    current_bits: u32,
    max_bits: u32,
    reserved_bits: u32,
}

impl BitWriter {
    /// A writer sized for one network packet.
    pub fn new() -> Self {
        Self::with_capacity_bits(MTU_SIZE_BITS)
    }

    /// A writer with an explicit capacity, for tests and for oversized
    /// staging buffers.
    pub fn with_capacity_bits(max_bits: u32) -> Self {
        Self {
            scratch: 0,
            scratch_index: 0,
            buffer: Vec::with_capacity(((max_bits + 7) / 8) as usize),
            current_bits: 0,
            max_bits,
            reserved_bits: 0,
        }
    }

    /// Dry-run counter seeded with this writer's current position and
    /// effective capacity. Serialize into the counter first; commit to
    /// the writer only if the counter did not overflow.
    pub fn counter(&self) -> BitCounter {
        BitCounter::new(self.current_bits, self.max_bits - self.reserved_bits)
    }

    /// Bits still writable before the (reserved-adjusted) capacity.
    pub fn bits_free(&self) -> u32 {
        (self.max_bits - self.reserved_bits).saturating_sub(self.current_bits)
    }

    pub fn bits_written(&self) -> u32 {
        self.current_bits
    }

    /// Hold back capacity for a trailer that will be written later.
    pub fn reserve_bits(&mut self, bits: u32) {
        self.reserved_bits += bits;
    }

    /// Give back previously reserved capacity.
    pub fn release_bits(&mut self, bits: u32) {
        debug_assert!(bits <= self.reserved_bits);
        self.reserved_bits -= bits;
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        self.flush_scratch();
        self.buffer
    }

    fn flush_scratch(&mut self) {
        if self.scratch_index > 0 {
            let byte = (self.scratch << (8 - self.scratch_index)).reverse_bits();
            self.buffer.push(byte);
            self.scratch = 0;
            self.scratch_index = 0;
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        assert!(
            self.current_bits < self.max_bits,
            "BitWriter capacity exceeded: measure with counter() first"
        );

        self.scratch <<= 1;
        if bit {
            self.scratch |= 1;
        }
        self.scratch_index += 1;
        self.current_bits += 1;

        if self.scratch_index >= 8 {
            self.buffer.push(self.scratch.reverse_bits());
            self.scratch_index = 0;
            self.scratch = 0;
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    fn is_counter(&self) -> bool {
        false
    }

    fn count_bits(&mut self, _bits: u32) {}
}

/// Counts the bits a serialization pass would emit, against a capacity,
/// without producing any bytes.
pub struct BitCounter {
    start_bits: u32,
    current_bits: u32,
    max_bits: u32,
}

impl BitCounter {
    pub fn new(start_bits: u32, max_bits: u32) -> Self {
        Self {
            start_bits,
            current_bits: start_bits,
            max_bits,
        }
    }

    /// Whether the measured writes would not fit in the writer the
    /// counter was taken from.
    pub fn overflowed(&self) -> bool {
        self.current_bits > self.max_bits
    }

    /// Bits the measured writes would occupy.
    pub fn bits_needed(&self) -> u32 {
        self.current_bits - self.start_bits
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _bit: bool) {
        self.current_bits += 1;
    }

    fn write_byte(&mut self, _byte: u8) {
        self.current_bits += 8;
    }

    fn is_counter(&self) -> bool {
        true
    }

    fn count_bits(&mut self, bits: u32) {
        self.current_bits += bits;
    }
}
