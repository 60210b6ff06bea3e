use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::StreamError};

/// Types with a canonical bit-stream representation.
pub trait BitSerde: Sized {
    fn ser(&self, writer: &mut dyn BitWrite);
    fn de(reader: &mut BitReader) -> Result<Self, StreamError>;
    /// Exact number of bits `ser` will emit for this value.
    fn bit_length(&self) -> u32;
}

impl BitSerde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl BitSerde for u8 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_byte(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        reader.read_byte()
    }

    fn bit_length(&self) -> u32 {
        8
    }
}

macro_rules! impl_le_bytes_serde {
    ($ty:ty, $bytes:expr) => {
        impl BitSerde for $ty {
            fn ser(&self, writer: &mut dyn BitWrite) {
                for byte in self.to_le_bytes() {
                    writer.write_byte(byte);
                }
            }

            fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
                let mut bytes = [0u8; $bytes];
                for byte in bytes.iter_mut() {
                    *byte = reader.read_byte()?;
                }
                Ok(<$ty>::from_le_bytes(bytes))
            }

            fn bit_length(&self) -> u32 {
                $bytes * 8
            }
        }
    };
}

impl_le_bytes_serde!(u16, 2);
impl_le_bytes_serde!(u32, 4);
impl_le_bytes_serde!(u64, 8);

impl<T: BitSerde> BitSerde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.bit_length(),
            None => 1,
        }
    }
}
