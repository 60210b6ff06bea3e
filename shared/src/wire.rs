//! Variable-width integer shapes shared by the write and read paths.
//! Keeping them in one place is what keeps the two ends bit-exact.

use wraith_serde::{SignedVarInt, UnsignedVarInt};

/// Entity count in a batch header.
pub(crate) type CountVarInt = UnsignedVarInt<7>;
/// Baseline tick delta in a run header; 0 means "no baseline".
pub(crate) type TickDeltaVarInt = UnsignedVarInt<5>;
/// Run length in a run header.
pub(crate) type RunLenVarInt = UnsignedVarInt<5>;
/// Body bit length, present when the protocol is size-prefixed.
pub(crate) type SizePrefixVarInt = UnsignedVarInt<7>;
/// One change-mask word, XORed against the primary baseline's mask.
pub(crate) type MaskVarInt = UnsignedVarInt<7>;
/// One enable word, XORed against the primary baseline's enables.
pub(crate) type EnableVarInt = UnsignedVarInt<3>;
/// Per-entity total dynamic payload size, delta against the baseline.
pub(crate) type DynSizeVarInt = SignedVarInt<7>;
/// Byte length of one changed buffer payload.
pub(crate) type BufferLenVarInt = UnsignedVarInt<7>;
