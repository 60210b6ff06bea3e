//! Per-(connection, block) ring of snapshot images. The host fills
//! slots as it serializes and flips their ack flag on packet delivery;
//! the remote fills the same structure from decoded batches, where the
//! ack flag simply means "populated".

mod arena;

pub use arena::ByteArena;

use crate::{ghost::GhostId, tick::Tick};

/// One ring position: the records serialized (or decoded) at one tick.
///
/// A record is meaningful only while the slot stamps a tick and the
/// entity's identity entry matches; everything else in the record
/// buffer is stale by construction and never read.
pub struct SnapshotSlot {
    tick: Option<Tick>,
    acked: bool,
    record_words: usize,
    records: Vec<u32>,
    identities: Vec<Option<GhostId>>,
    arena: ByteArena,
}

impl SnapshotSlot {
    fn new(entities: usize, record_words: usize) -> Self {
        Self {
            tick: None,
            acked: false,
            record_words,
            records: vec![0; entities * record_words],
            identities: vec![None; entities],
            arena: ByteArena::new(),
        }
    }

    fn reset(&mut self, tick: Tick) {
        self.tick = Some(tick);
        self.acked = false;
        self.identities.fill(None);
        self.arena.clear();
    }

    pub fn tick(&self) -> Option<Tick> {
        self.tick
    }

    pub fn acked(&self) -> bool {
        self.acked
    }

    pub fn identity(&self, entity: usize) -> Option<GhostId> {
        self.identities[entity]
    }

    pub fn set_identity(&mut self, entity: usize, ghost: GhostId) {
        self.identities[entity] = Some(ghost);
    }

    /// Mark that `entity` has no image at this tick. Slots holding a
    /// gap never serve as that entity's baseline.
    pub fn mark_gap(&mut self, entity: usize) {
        self.identities[entity] = None;
    }

    pub fn record(&self, entity: usize) -> &[u32] {
        &self.records[entity * self.record_words..(entity + 1) * self.record_words]
    }

    pub fn record_mut(&mut self, entity: usize) -> &mut [u32] {
        &mut self.records[entity * self.record_words..(entity + 1) * self.record_words]
    }

    pub fn arena(&self) -> &ByteArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ByteArena {
        &mut self.arena
    }

    /// Append a variable-length payload to the slot arena and write
    /// its `(len, offset)` handle into the record at `word`.
    pub fn store_buffer(&mut self, entity: usize, word: usize, data: &[u8]) {
        let (offset, len) = self.arena.push(data);
        let record = self.record_mut(entity);
        record[word] = len;
        record[word + 1] = offset;
    }

    /// Bytes addressed by the `(len, offset)` handle at `word` of the
    /// entity's record.
    pub fn buffer_bytes(&self, entity: usize, word: usize) -> &[u8] {
        let record = self.record(entity);
        self.arena.get(record[word + 1], record[word])
    }
}

/// Ring of [`SnapshotSlot`]s addressed by `tick % capacity`. No
/// pointers cycle; a slot is valid for exactly the tick it stamps.
pub struct SnapshotHistory {
    capacity: usize,
    entities: usize,
    slots: Vec<SnapshotSlot>,
}

impl SnapshotHistory {
    pub fn new(capacity: usize, entities: usize, record_words: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two");
        Self {
            capacity,
            entities,
            slots: (0..capacity)
                .map(|_| SnapshotSlot::new(entities, record_words))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    fn position(&self, tick: Tick) -> usize {
        tick as usize & (self.capacity - 1)
    }

    /// Slot for `tick`, recycled if it still stamps an older tick.
    /// Re-entry at the same tick leaves the slot untouched, so a
    /// serialization retry or a second batch continues into it.
    pub fn begin_tick(&mut self, tick: Tick) -> &mut SnapshotSlot {
        let position = self.position(tick);
        let slot = &mut self.slots[position];
        if slot.tick != Some(tick) {
            slot.reset(tick);
        }
        slot
    }

    /// Slot currently stamping exactly `tick`, if any.
    pub fn slot(&self, tick: Tick) -> Option<&SnapshotSlot> {
        let slot = &self.slots[self.position(tick)];
        (slot.tick == Some(tick)).then_some(slot)
    }

    pub fn slot_mut(&mut self, tick: Tick) -> Option<&mut SnapshotSlot> {
        let position = self.position(tick);
        let slot = &mut self.slots[position];
        (slot.tick == Some(tick)).then_some(slot)
    }

    /// Flip the ack flag for `tick`. Returns false if the ring has
    /// already recycled that slot.
    pub fn ack_tick(&mut self, tick: Tick) -> bool {
        match self.slot_mut(tick) {
            Some(slot) => {
                slot.acked = true;
                true
            }
            None => false,
        }
    }

    /// Write off a slot as undeliverable without unstamping it.
    pub fn clear_ack(&mut self, tick: Tick) {
        if let Some(slot) = self.slot_mut(tick) {
            slot.acked = false;
        }
    }

    /// Whether `tick` holds an acked image of `ghost` at `entity`.
    pub fn has_record(&self, tick: Tick, entity: usize, ghost: GhostId) -> bool {
        self.slot(tick)
            .is_some_and(|slot| slot.acked && slot.identity(entity) == Some(ghost))
    }

    /// Erase one entity's column across all slots. Used when an entity
    /// leaves relevancy: its next appearance must be a fresh spawn.
    pub fn clear_entity(&mut self, entity: usize) {
        for slot in &mut self.slots {
            slot.identities[entity] = None;
        }
    }

    /// Unstamp every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.tick = None;
            slot.acked = false;
            slot.identities.fill(None);
            slot.arena.clear();
        }
    }
}
