//! # Wraith Shared
//! Common functionality shared between the wraith host and remote ends:
//! columnar ghost storage, per-connection snapshot histories, the
//! delta-compressed batch codec, and the managers that drive one send
//! or receive stream per connection.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use wraith_serde::{
    BitCounter, BitReader, BitSerde, BitWrite, BitWriter, OwnedBitReader, SignedVarInt,
    StreamError, UnsignedInt, UnsignedVarInt, MTU_SIZE_BITS, MTU_SIZE_BYTES,
};

mod bitset;
mod block;
mod config;
mod error;
mod ghost;
mod history;
mod schema;
mod tick;
mod tick_queue;
mod wire;

pub mod host;
pub mod remote;

pub use bitset::BitArray;
pub use block::{Column, GhostBlock};
pub use config::{ReplicationConfig, BASELINE_AGE_RTT_FACTOR};
pub use error::{ApplyError, SerializeError};
pub use ghost::{BlockId, GhostId, GhostTypeId};
pub use history::{ByteArena, SnapshotHistory, SnapshotSlot};
pub use host::{
    baseline::BaselineTriple,
    chunk_serializer::{serialize, SerializeOutcome},
    host_manager::{HostManager, PacketIndex, PacketNotifiable, WritePass},
    relevancy::{compute_relevancy, GhostEvent, RelevancyState},
    scratch::SerializeScratch,
    static_optimizer::StaticOptimizer,
    write_connections, ConnectionSend,
};
pub use remote::{
    chunk_deserializer::{read_batch, DecodeScratch, ReadOutcome},
    ghost_update::{apply_interpolated, apply_predicted, apply_tick, PredictedApply},
    prediction_backup::{AppliedTicks, PredictionBackupStore},
    remote_manager::RemoteManager,
};
pub use schema::{
    build_predicted, BufferCodec, CodecLayout, ComponentCodec, ComponentDef, ComponentSchema,
    DeltaPredictor, IntCodec, QuantizedFloatCodec, QuantizedVec3Codec, SchemaDescriptor,
    SchemaRegistry,
};
pub use tick::{tick_after, tick_delta, Tick, TickInstant};
pub use tick_queue::{TickQueue, TickQueueError};
