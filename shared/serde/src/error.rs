use thiserror::Error;

/// Errors surfaced while reading from or building a bit stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// The reader ran out of bits before the value was complete.
    #[error("bit stream depleted")]
    Depleted,
    /// A variable-width integer kept its continue bit set past 64 bits
    /// of accumulated value.
    #[error("variable-width integer exceeds 64 bits")]
    OverlongVarInt,
}
