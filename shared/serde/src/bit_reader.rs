use crate::error::StreamError;

#[derive(Clone, Copy)]
struct ReaderState {
    scratch: u8,
    scratch_index: u8,
    buffer_index: usize,
}

/// Bit-granular reader over a borrowed byte slice, mirroring
/// [`crate::BitWriter`]'s LSB-first layout.
pub struct BitReader<'b> {
    state: ReaderState,
    buffer: &'b [u8],
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            state: ReaderState {
                scratch: 0,
                scratch_index: 0,
                buffer_index: 0,
            },
            buffer,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, StreamError> {
        if self.state.scratch_index == 0 {
            if self.state.buffer_index >= self.buffer.len() {
                return Err(StreamError::Depleted);
            }
            self.state.scratch = self.buffer[self.state.buffer_index];
            self.state.buffer_index += 1;
            self.state.scratch_index = 8;
        }
        let bit = self.state.scratch & 1 != 0;
        self.state.scratch >>= 1;
        self.state.scratch_index -= 1;
        Ok(bit)
    }

    pub fn read_byte(&mut self) -> Result<u8, StreamError> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Discard `bits` bits, erroring if the stream ends first.
    pub fn skip_bits(&mut self, bits: u32) -> Result<(), StreamError> {
        for _ in 0..bits {
            self.read_bit()?;
        }
        Ok(())
    }

    /// Upper bound on bits left, counting trailing write padding.
    pub fn bits_remaining(&self) -> u32 {
        let whole = (self.buffer.len() - self.state.buffer_index) as u32 * 8;
        whole + self.state.scratch_index as u32
    }

    /// Snapshot this reader (position included) into an owned buffer,
    /// so it can be held across ticks.
    pub fn to_owned(&self) -> OwnedBitReader {
        OwnedBitReader {
            state: self.state,
            buffer: self.buffer.into(),
        }
    }
}

/// A [`BitReader`] that owns its bytes. Used to park partially read or
/// not-yet-due packets until their tick comes up.
pub struct OwnedBitReader {
    state: ReaderState,
    buffer: Box<[u8]>,
}

impl OwnedBitReader {
    pub fn new(buffer: &[u8]) -> Self {
        Self {
            state: ReaderState {
                scratch: 0,
                scratch_index: 0,
                buffer_index: 0,
            },
            buffer: buffer.into(),
        }
    }

    pub fn borrow(&self) -> BitReader {
        BitReader {
            state: self.state,
            buffer: &self.buffer,
        }
    }
}
