//! Per-connection visibility: which entities of a block a remote may
//! see, and the bookkeeping when that set shrinks.

use crate::{
    bitset::BitArray, block::GhostBlock, ghost::GhostId, history::SnapshotHistory, tick::Tick,
};

/// Lifecycle notification produced by a send pass. Despawns are not
/// part of the batch wire format; the caller forwards them through its
/// own messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhostEvent {
    /// The entity left this connection's relevant set at `tick`; the
    /// remote should drop its ghost.
    Despawn { ghost: GhostId, tick: Tick },
}

/// Evaluate a visibility predicate over every occupied slot. The
/// predicate runs once per group, on the root; members inherit the
/// verdict so a group is always sent or withheld whole.
pub fn compute_relevancy<F>(block: &GhostBlock, mut predicate: F) -> BitArray
where
    F: FnMut(usize, GhostId) -> bool,
{
    let mut relevancy = BitArray::with_bits(block.len());
    let mut entity = 0;
    while entity < block.len() {
        let run = block.group_run(entity).max(1);
        let end = (entity + run).min(block.len());
        let relevant = match block.ghost(entity) {
            Some(ghost) => predicate(entity, ghost),
            None => false,
        };
        if relevant {
            for member in entity..end {
                if block.ghost(member).is_some() {
                    relevancy.set(member, true);
                }
            }
        }
        entity = end;
    }
    relevancy
}

/// One connection's relevancy mask for one block. Installing a new
/// mask emits a despawn exactly once per relevant-to-irrelevant
/// transition and clears that entity's history column, so a later
/// return to relevance is a fresh spawn instead of a delta against
/// records the remote no longer trusts.
pub struct RelevancyState {
    mask: BitArray,
    changed: bool,
}

impl RelevancyState {
    pub fn new(entities: usize) -> Self {
        Self {
            mask: BitArray::with_bits(entities),
            changed: false,
        }
    }

    pub fn mask(&self) -> &BitArray {
        &self.mask
    }

    /// Whether the last [`Self::update`] flipped any entity's verdict.
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn update(
        &mut self,
        block: &GhostBlock,
        next: BitArray,
        tick: Tick,
        history: &mut SnapshotHistory,
        events: &mut Vec<GhostEvent>,
    ) {
        debug_assert_eq!(next.len(), block.len());
        if self.mask.len() < next.len() {
            self.mask.resize(next.len());
        }
        self.changed = false;
        for entity in 0..next.len() {
            let was = self.mask.get(entity);
            let now = next.get(entity);
            if was == now {
                continue;
            }
            self.changed = true;
            if was && !now {
                history.clear_entity(entity);
                if let Some(ghost) = block.ghost(entity) {
                    events.push(GhostEvent::Despawn { ghost, tick });
                }
            }
        }
        self.mask = next;
    }
}
