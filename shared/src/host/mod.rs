//! Host-side write path: snapshot capture, baseline selection, batch
//! encoding and the per-tick fan-out across connections.

pub mod baseline;
pub mod chunk_serializer;
pub mod host_manager;
pub mod relevancy;
pub mod scratch;
pub mod static_optimizer;

use log::warn;
use wraith_serde::BitWriter;

use crate::{
    block::GhostBlock,
    config::ReplicationConfig,
    error::SerializeError,
    ghost::GhostId,
    host::{
        host_manager::{HostManager, PacketIndex, WritePass},
        scratch::SerializeScratch,
    },
    tick::Tick,
};

/// One connection's slice of a tick-wide send pass.
pub struct ConnectionSend<'m> {
    pub manager: &'m mut HostManager,
    pub packet_index: PacketIndex,
    pub rtt_millis: f32,
    /// Packet bytes produced by the pass; empty until it succeeds.
    pub packet: Vec<u8>,
    pub result: Option<Result<WritePass, SerializeError>>,
}

impl<'m> ConnectionSend<'m> {
    pub fn new(manager: &'m mut HostManager, packet_index: PacketIndex, rtt_millis: f32) -> Self {
        Self {
            manager,
            packet_index,
            rtt_millis,
            packet: Vec::new(),
            result: None,
        }
    }
}

cfg_if! {
    if #[cfg(feature = "parallel")] {
        /// Write one packet per connection for `tick`.
        ///
        /// Connections fan out across the rayon pool, each worker with
        /// its own scratch sized from the config. A scratch overflow
        /// aborts only that connection's packet; overflowed
        /// connections are retried single-threaded afterwards with a
        /// doubled buffer.
        pub fn write_connections<F>(
            connections: &mut [ConnectionSend],
            blocks: &[&GhostBlock],
            tick: Tick,
            config: &ReplicationConfig,
            relevant: &F,
        ) where
            F: Fn(usize, &GhostBlock, usize, GhostId) -> bool + Sync,
        {
            use rayon::prelude::*;

            connections.par_iter_mut().enumerate().for_each_init(
                || SerializeScratch::new(config),
                |scratch, (index, send)| {
                    attempt(send, index, blocks, tick, config, scratch, relevant);
                },
            );
            retry_overflowed(connections, blocks, tick, config, relevant);
        }
    } else {
        /// Write one packet per connection for `tick`, in slice order.
        ///
        /// A scratch overflow aborts only that connection's packet;
        /// overflowed connections are retried afterwards with a
        /// doubled buffer.
        pub fn write_connections<F>(
            connections: &mut [ConnectionSend],
            blocks: &[&GhostBlock],
            tick: Tick,
            config: &ReplicationConfig,
            relevant: &F,
        ) where
            F: Fn(usize, &GhostBlock, usize, GhostId) -> bool + Sync,
        {
            let mut scratch = SerializeScratch::new(config);
            for (index, send) in connections.iter_mut().enumerate() {
                attempt(send, index, blocks, tick, config, &mut scratch, relevant);
            }
            retry_overflowed(connections, blocks, tick, config, relevant);
        }
    }
}

fn attempt<F>(
    send: &mut ConnectionSend,
    index: usize,
    blocks: &[&GhostBlock],
    tick: Tick,
    config: &ReplicationConfig,
    scratch: &mut SerializeScratch,
    relevant: &F,
) where
    F: Fn(usize, &GhostBlock, usize, GhostId) -> bool + Sync,
{
    let mut writer = BitWriter::with_capacity_bits(config.packet_capacity_bits);
    let result = send.manager.write_blocks(
        blocks,
        tick,
        send.rtt_millis,
        send.packet_index,
        &mut writer,
        scratch,
        |block, entity, ghost| relevant(index, block, entity, ghost),
    );
    match &result {
        Ok(_) => send.packet = writer.to_bytes(),
        Err(_) => send.packet.clear(),
    }
    send.result = Some(result);
}

/// Serial second chance for connections whose packet hit a scratch
/// overflow: grow until the reported need fits or the ceiling is
/// reached, rebuilding the whole packet each time.
fn retry_overflowed<F>(
    connections: &mut [ConnectionSend],
    blocks: &[&GhostBlock],
    tick: Tick,
    config: &ReplicationConfig,
    relevant: &F,
) where
    F: Fn(usize, &GhostBlock, usize, GhostId) -> bool + Sync,
{
    let mut grown: Option<SerializeScratch> = None;
    for (index, send) in connections.iter_mut().enumerate() {
        loop {
            let Some(Err(SerializeError::ScratchOverflow { needed_bits })) = send.result else {
                break;
            };
            let scratch = grown.get_or_insert_with(|| SerializeScratch::new(config));
            while scratch.capacity_bits() < needed_bits {
                if !scratch.grow(config.max_scratch_bits) {
                    break;
                }
            }
            if scratch.capacity_bits() < needed_bits {
                warn!(
                    "serialize scratch ceiling reached at {} bits; a connection keeps last tick's state",
                    scratch.capacity_bits()
                );
                break;
            }
            warn!(
                "serialize scratch grown to {} bits; rebuilding packet",
                scratch.capacity_bits()
            );
            attempt(send, index, blocks, tick, config, scratch, relevant);
        }
    }
}
