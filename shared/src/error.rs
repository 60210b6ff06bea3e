use thiserror::Error;
use wraith_serde::StreamError;

use crate::{ghost::GhostTypeId, tick::Tick};

/// Errors raised while assembling outgoing snapshot batches. Packet
/// exhaustion is not an error; it surfaces as a resume cursor instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeError {
    /// The staging scratch filled up mid-block. The caller grows the
    /// scratch and retries the whole block.
    #[error("serialization scratch exhausted, {needed_bits} bits required")]
    ScratchOverflow { needed_bits: u32 },
}

/// Errors raised while decoding and applying incoming snapshot data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// A batch for a type this end has no descriptor for, in a stream
    /// without size prefixes. With prefixes this is a skip, not an error.
    #[error("unknown ghost type {0:?} in unprefixed batch")]
    UnknownType(GhostTypeId),
    /// A ghost id with no local storage slot, in a stream without size
    /// prefixes. With prefixes this is the (transient) unspawned skip.
    #[error("ghost {id} has no local storage in unprefixed batch")]
    UnresolvedGhost { id: u32 },
    /// A ghost id resolved to storage of a different type than the
    /// batch header claims.
    #[error("ghost {id} resolved to a different type than its batch")]
    TypeMismatch { id: u32 },
    /// The sender delta-compressed against a tick this end no longer
    /// (or never) holds for that entity.
    #[error("no usable baseline record at tick {tick}")]
    MissingBaseline { tick: Tick },
    /// A prediction backup's identity array no longer matches the
    /// block it would restore into.
    #[error("prediction backup identity does not match block")]
    StaleIdentity,
    /// A size prefix or buffer length larger than what remains in the
    /// packet.
    #[error("declared payload of {bits} bits exceeds packet remainder")]
    PayloadOverflow { bits: u32 },
}
