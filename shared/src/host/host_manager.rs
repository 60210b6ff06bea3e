//! Per-connection send orchestration: one packet per tick, block
//! batches in strict storage order, resume cursors under backpressure,
//! ack bookkeeping keyed by packet index.

use std::collections::HashMap;

use wraith_serde::{BitSerde, BitWriter};

use crate::{
    block::GhostBlock,
    config::ReplicationConfig,
    error::SerializeError,
    ghost::{BlockId, GhostId},
    history::SnapshotHistory,
    host::{
        chunk_serializer::serialize,
        relevancy::{compute_relevancy, GhostEvent, RelevancyState},
        scratch::SerializeScratch,
        static_optimizer::StaticOptimizer,
    },
    tick::{tick_after, Tick},
};

/// Outgoing packet sequence number, assigned by the transport.
pub type PacketIndex = u16;

/// Ack plumbing from the transport to anything that keyed state on a
/// sent packet.
pub trait PacketNotifiable {
    fn notify_packet_delivered(&mut self, packet_index: PacketIndex);
    fn notify_packet_dropped(&mut self, _packet_index: PacketIndex) {}
}

/// What one send pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePass {
    pub entities_written: usize,
    /// The packet filled before every block was fully covered.
    pub filled: bool,
}

struct HostBlockState {
    history: SnapshotHistory,
    relevancy: RelevancyState,
    static_opt: StaticOptimizer,
    /// Next entity index to cover; nonzero while rotating through a
    /// block too large for one packet.
    resume: usize,
    latest_acked: Option<Tick>,
}

impl HostBlockState {
    fn new(config: &ReplicationConfig, block: &GhostBlock) -> Self {
        Self {
            history: SnapshotHistory::new(
                config.history_capacity,
                block.len(),
                block.schema().record_words(),
            ),
            relevancy: RelevancyState::new(block.len()),
            static_opt: StaticOptimizer::new_for(block),
            resume: 0,
            latest_acked: None,
        }
    }
}

/// Host side of one connection's replication stream.
///
/// Owns the per-block snapshot histories, relevancy masks and static
/// gates; maps sent packets to the `(block, tick)` slots an ack will
/// vouch for. Exactly one packet is written per tick, so a slot's
/// single ack flag covers everything the slot stamped.
pub struct HostManager {
    config: ReplicationConfig,
    blocks: HashMap<BlockId, HostBlockState>,
    sent: HashMap<PacketIndex, Vec<(BlockId, Tick)>>,
    events: Vec<GhostEvent>,
}

impl HostManager {
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            config,
            blocks: HashMap::new(),
            sent: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Newest tick this connection has acked for `block`.
    pub fn latest_acked(&self, block: BlockId) -> Option<Tick> {
        self.blocks.get(&block).and_then(|state| state.latest_acked)
    }

    /// Despawn and lifecycle notifications accumulated since the last
    /// call.
    pub fn take_events(&mut self) -> Vec<GhostEvent> {
        std::mem::take(&mut self.events)
    }

    /// Write one packet for `tick`: `[tick:u16]`, a batch per visited
    /// block, a terminator bit.
    ///
    /// Blocks are visited in slice order; a filled packet ends the
    /// pass and the remaining blocks keep their cursors. On
    /// [`SerializeError::ScratchOverflow`] no cursor or packet mapping
    /// has been committed: grow the scratch, discard the writer, and
    /// call again with the same arguments.
    #[allow(clippy::too_many_arguments)]
    pub fn write_blocks<F>(
        &mut self,
        blocks: &[&GhostBlock],
        tick: Tick,
        rtt_millis: f32,
        packet_index: PacketIndex,
        writer: &mut BitWriter,
        scratch: &mut SerializeScratch,
        mut relevant: F,
    ) -> Result<WritePass, SerializeError>
    where
        F: FnMut(&GhostBlock, usize, GhostId) -> bool,
    {
        let max_age = self.config.max_baseline_age(rtt_millis);
        tick.ser(writer);
        writer.reserve_bits(1);

        let mut entities_written = 0;
        let mut filled = false;
        let mut pass_sent: Vec<(BlockId, Tick)> = Vec::new();
        let mut cursors: Vec<(BlockId, usize)> = Vec::new();

        for block in blocks {
            let state = self
                .blocks
                .entry(block.id())
                .or_insert_with(|| HostBlockState::new(&self.config, block));
            debug_assert_eq!(state.history.entities(), block.len());

            let next_mask =
                compute_relevancy(block, |entity, ghost| relevant(block, entity, ghost));
            state
                .relevancy
                .update(block, next_mask, tick, &mut state.history, &mut self.events);
            if state.relevancy.changed() {
                state.static_opt.invalidate();
            }

            if state.resume == 0
                && state
                    .static_opt
                    .can_skip(block, state.latest_acked, self.config.static_streak)
            {
                continue;
            }

            let outcome = serialize(
                block,
                &mut state.history,
                state.relevancy.mask(),
                state.resume..block.len(),
                tick,
                max_age,
                writer,
                scratch,
            )?;

            entities_written += outcome.entities_written;
            if outcome.entities_written > 0 {
                pass_sent.push((block.id(), tick));
            }
            cursors.push((block.id(), outcome.resume_index.unwrap_or(0)));
            if outcome.resume_index.is_none() && state.resume == 0 {
                state.static_opt.on_serialized(block, tick);
            } else {
                // Partial coverage; the remote cannot hold the whole
                // block, so no streak accrues.
                state.static_opt.invalidate();
            }
            if outcome.filled {
                filled = true;
                break;
            }
        }

        // Committed only on success, so an overflow retry rebuilds the
        // packet from the same cursors.
        for (id, resume) in cursors {
            if let Some(state) = self.blocks.get_mut(&id) {
                state.resume = resume;
            }
        }
        if !pass_sent.is_empty() {
            self.sent.insert(packet_index, pass_sent);
        }

        writer.release_bits(1);
        false.ser(writer);
        Ok(WritePass {
            entities_written,
            filled,
        })
    }
}

impl PacketNotifiable for HostManager {
    fn notify_packet_delivered(&mut self, packet_index: PacketIndex) {
        let Some(entries) = self.sent.remove(&packet_index) else {
            return;
        };
        for (block_id, tick) in entries {
            if let Some(state) = self.blocks.get_mut(&block_id) {
                if state.history.ack_tick(tick) {
                    let newer = state
                        .latest_acked
                        .map_or(true, |acked| tick_after(tick, acked));
                    if newer {
                        state.latest_acked = Some(tick);
                    }
                }
            }
        }
    }

    fn notify_packet_dropped(&mut self, packet_index: PacketIndex) {
        self.sent.remove(&packet_index);
    }
}
