//! Bit-granular stream primitives shared by the wraith host and remote
//! paths: a capacity-checked packet writer with dry-run counters, the
//! matching reader, and fixed/variable-width integer encodings.

mod bit_reader;
mod bit_writer;
mod constants;
mod error;
mod integer;
mod serde;

pub use bit_reader::{BitReader, OwnedBitReader};
pub use bit_writer::{BitCounter, BitWrite, BitWriter};
pub use constants::{MTU_SIZE_BITS, MTU_SIZE_BYTES};
pub use error::StreamError;
pub use integer::{SignedVarInt, UnsignedInt, UnsignedVarInt};
pub use serde::BitSerde;
