//! Per-connection receive orchestration: snapshot packets parked in a
//! tick-ordered buffer, decoded strictly ascending, stale arrivals
//! dropped before they can regress a history slot.

use std::collections::HashMap;

use wraith_serde::{BitReader, BitSerde, OwnedBitReader};

use crate::{
    block::GhostBlock,
    config::ReplicationConfig,
    error::ApplyError,
    ghost::BlockId,
    history::SnapshotHistory,
    remote::chunk_deserializer::{read_batch, DecodeScratch, ReadOutcome},
    schema::SchemaRegistry,
    tick::{tick_after, Tick},
    tick_queue::TickQueue,
};

/// Remote side of one connection's replication stream.
///
/// Owns the per-block receive histories and a reorder buffer of
/// not-yet-due packets. A packet is decoded only once the simulation
/// reaches its tick, and only if no newer tick has been decoded: the
/// history ring recycles slots by tick, so decoding an old packet
/// after a new one could overwrite the newer records.
pub struct RemoteManager {
    config: ReplicationConfig,
    histories: HashMap<BlockId, SnapshotHistory>,
    buffered: TickQueue<OwnedBitReader>,
    scratch: DecodeScratch,
    newest: Option<Tick>,
}

impl RemoteManager {
    pub fn new(config: ReplicationConfig) -> Self {
        Self {
            config,
            histories: HashMap::new(),
            buffered: TickQueue::new(),
            scratch: DecodeScratch::default(),
            newest: None,
        }
    }

    /// Newest tick decoded into the receive histories.
    pub fn newest(&self) -> Option<Tick> {
        self.newest
    }

    /// Packets parked until the simulation reaches their tick.
    pub fn pending(&self) -> usize {
        self.buffered.len()
    }

    /// Receive history for `block`, once a packet has touched it.
    pub fn history(&self, block: BlockId) -> Option<&SnapshotHistory> {
        self.histories.get(&block)
    }

    /// Park an incoming snapshot payload for decode, returning its
    /// tick. Arrivals at or behind the newest decoded tick are
    /// dropped, as are duplicates of a parked tick.
    pub fn read_packet(&mut self, payload: &[u8]) -> Result<Tick, ApplyError> {
        let mut reader = BitReader::new(payload);
        let tick = Tick::de(&mut reader)?;
        if let Some(newest) = self.newest {
            if !tick_after(tick, newest) {
                log::debug!("snapshot for tick {tick} arrived behind tick {newest}, dropped");
                return Ok(tick);
            }
        }
        if self.buffered.try_insert(tick, reader.to_owned()).is_err() {
            log::debug!("duplicate snapshot for tick {tick} dropped");
        }
        Ok(tick)
    }

    /// Decode every parked packet whose tick is at or before `up_to`,
    /// oldest first. A packet failing mid-parse is logged and its
    /// remainder dropped; packets behind it still decode.
    pub fn process_ready(
        &mut self,
        up_to: Tick,
        registry: &SchemaRegistry,
        blocks: &[&GhostBlock],
    ) -> ReadOutcome {
        let mut outcome = ReadOutcome::default();
        loop {
            match self.buffered.front() {
                Some((tick, _)) if !tick_after(*tick, up_to) => {}
                _ => break,
            }
            let Some((tick, owned)) = self.buffered.pop_front() else {
                break;
            };
            let mut reader = owned.borrow();
            if let Err(error) =
                self.decode_packet(&mut reader, registry, blocks, tick, &mut outcome)
            {
                log::warn!("snapshot for tick {tick} dropped mid-parse: {error}");
            }
            self.newest = Some(tick);
        }
        outcome
    }

    fn decode_packet(
        &mut self,
        reader: &mut BitReader,
        registry: &SchemaRegistry,
        blocks: &[&GhostBlock],
        tick: Tick,
        outcome: &mut ReadOutcome,
    ) -> Result<(), ApplyError> {
        while bool::de(reader)? {
            let batch = read_batch(
                reader,
                registry,
                blocks,
                &mut self.histories,
                &self.config,
                tick,
                &mut self.scratch,
            )?;
            outcome.absorb(batch);
        }
        Ok(())
    }

    /// Drop one entity slot from a block's receive history after its
    /// ghost despawns locally. Records for a reused slot must not
    /// resolve against the departed ghost's identity.
    pub fn forget_entity(&mut self, block: BlockId, entity: usize) {
        if let Some(history) = self.histories.get_mut(&block) {
            history.clear_entity(entity);
        }
    }
}
