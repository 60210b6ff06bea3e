use std::ops::Range;

use crate::{
    bitset::BitArray, block::GhostBlock, ghost::GhostId, history::SnapshotHistory, tick::Tick,
};

/// Up to three baseline ticks for one entity, newest first. Valid
/// entries form a prefix; an all-`None` triple is the spawn encoding
/// (raw values, no delta).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaselineTriple {
    pub ticks: [Option<Tick>; 3],
}

impl BaselineTriple {
    pub fn is_spawn(&self) -> bool {
        self.ticks[0].is_none()
    }

    pub fn primary(&self) -> Option<Tick> {
        self.ticks[0]
    }

    /// Valid ticks packed into `out`, returning how many there are.
    pub fn collect(&self, out: &mut [Tick; 3]) -> usize {
        let mut count = 0;
        for tick in self.ticks.iter().flatten() {
            out[count] = *tick;
            count += 1;
        }
        count
    }
}

/// Write off every slot older than the baseline window, so it is
/// never scanned again for this or any other entity. Runs once per
/// block per serialized tick.
pub fn expire_stale_acks(history: &mut SnapshotHistory, current_tick: Tick, max_age: Tick) {
    for age in (max_age as usize + 1)..history.capacity() {
        history.clear_ack(current_tick.wrapping_sub(age as Tick));
    }
}

/// Pick the baselines for one entity: acked slots within the age
/// window whose identity entry matches, newest first.
pub fn select(
    history: &SnapshotHistory,
    entity: usize,
    ghost: GhostId,
    current_tick: Tick,
    max_age: Tick,
) -> BaselineTriple {
    let mut triple = BaselineTriple::default();
    let mut found = 0;
    for age in 1..=max_age {
        let tick = current_tick.wrapping_sub(age);
        if history.has_record(tick, entity, ghost) {
            triple.ticks[found] = Some(tick);
            found += 1;
            if found == 3 {
                break;
            }
        }
    }
    triple
}

/// One triple per entity over a storage range, so run headers can look
/// ahead past the current entity. Vacant and irrelevant entities get
/// the spawn triple; they are never emitted anyway.
pub fn select_range(
    history: &SnapshotHistory,
    block: &GhostBlock,
    relevancy: &BitArray,
    range: Range<usize>,
    current_tick: Tick,
    max_age: Tick,
    out: &mut Vec<BaselineTriple>,
) {
    for entity in range {
        let triple = match block.ghost(entity) {
            Some(ghost) if relevancy.get(entity) => {
                select(history, entity, ghost, current_tick, max_age)
            }
            _ => BaselineTriple::default(),
        };
        out.push(triple);
    }
}
