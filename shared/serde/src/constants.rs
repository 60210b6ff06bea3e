/// Biggest UDP payload that reliably avoids IP fragmentation.
pub const MTU_SIZE_BYTES: usize = 1472;

/// Same limit, in bits. Default capacity of a [`crate::BitWriter`].
pub const MTU_SIZE_BITS: u32 = (MTU_SIZE_BYTES as u32) * 8;
