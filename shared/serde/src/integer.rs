use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::StreamError, serde::BitSerde};

/// Unsigned integer stored on the wire in exactly `BITS` bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct UnsignedInt<const BITS: u8> {
    value: u64,
}

impl<const BITS: u8> UnsignedInt<BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        let value = value.into();
        assert!(BITS >= 1 && BITS < 64, "UnsignedInt supports 1..=63 bits");
        assert!(
            value < (1u64 << BITS),
            "value {value} does not fit in {BITS} bits"
        );
        Self { value }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

impl<const BITS: u8> BitSerde for UnsignedInt<BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.value;
        for _ in 0..BITS {
            writer.write_bit(value & 1 != 0);
            value >>= 1;
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        let mut value = 0u64;
        for i in 0..BITS {
            if reader.read_bit()? {
                value |= 1 << i;
            }
        }
        Ok(Self { value })
    }

    fn bit_length(&self) -> u32 {
        BITS as u32
    }
}

/// Unsigned integer written as a chain of `BITS`-wide chunks, each
/// preceded by a continue bit. Small values cost `BITS + 1` bits; the
/// width grows with the value instead of the declared maximum.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct UnsignedVarInt<const BITS: u8> {
    value: u64,
}

impl<const BITS: u8> UnsignedVarInt<BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        assert!(BITS >= 1 && BITS < 64, "UnsignedVarInt supports 1..=63 bits");
        Self {
            value: value.into(),
        }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

fn ser_var_chunks(mut value: u64, bits: u8, writer: &mut dyn BitWrite) {
    loop {
        let proceed = value >= (1u64 << bits);
        writer.write_bit(proceed);
        for _ in 0..bits {
            writer.write_bit(value & 1 != 0);
            value >>= 1;
        }
        if !proceed {
            return;
        }
    }
}

fn de_var_chunks(bits: u8, reader: &mut BitReader) -> Result<u64, StreamError> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let proceed = reader.read_bit()?;
        let mut chunk = 0u64;
        for i in 0..bits {
            if reader.read_bit()? {
                chunk |= 1 << i;
            }
        }
        if shift >= 64 || (shift > 0 && chunk >> (64 - shift) != 0) {
            return Err(StreamError::OverlongVarInt);
        }
        value |= chunk << shift;
        if !proceed {
            return Ok(value);
        }
        shift += bits as u32;
    }
}

fn var_chunk_count(value: u64, bits: u8) -> u32 {
    let mut chunks = 1;
    let mut rest = value >> bits;
    while rest != 0 {
        chunks += 1;
        rest >>= bits;
    }
    chunks
}

impl<const BITS: u8> BitSerde for UnsignedVarInt<BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_var_chunks(self.value, BITS, writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        Ok(Self {
            value: de_var_chunks(BITS, reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        var_chunk_count(self.value, BITS) * (BITS as u32 + 1)
    }
}

/// Signed companion of [`UnsignedVarInt`]: one sign bit, then the
/// magnitude in continue-bit chunks.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SignedVarInt<const BITS: u8> {
    value: i64,
}

impl<const BITS: u8> SignedVarInt<BITS> {
    pub fn new<T: Into<i64>>(value: T) -> Self {
        assert!(BITS >= 1 && BITS < 64, "SignedVarInt supports 1..=63 bits");
        Self {
            value: value.into(),
        }
    }

    pub fn get(&self) -> i64 {
        self.value
    }
}

impl<const BITS: u8> BitSerde for SignedVarInt<BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(self.value < 0);
        ser_var_chunks(self.value.unsigned_abs(), BITS, writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        let negative = reader.read_bit()?;
        let magnitude = de_var_chunks(BITS, reader)?;
        let value = if negative {
            if magnitude > (i64::MAX as u64) + 1 {
                return Err(StreamError::OverlongVarInt);
            }
            (magnitude as i64).wrapping_neg()
        } else {
            if magnitude > i64::MAX as u64 {
                return Err(StreamError::OverlongVarInt);
            }
            magnitude as i64
        };
        Ok(Self { value })
    }

    fn bit_length(&self) -> u32 {
        1 + var_chunk_count(self.value.unsigned_abs(), BITS) * (BITS as u32 + 1)
    }
}
