//! Moves decoded snapshot records onto live block state. Interpolated
//! ghosts sample a bracketing pair of history points and blend;
//! predicted ghosts roll the block back to a full-tick backup and
//! apply the newest authoritative records on top, telling the
//! simulation scheduler where to resume from.

use crate::{
    block::GhostBlock,
    ghost::GhostId,
    history::{SnapshotHistory, SnapshotSlot},
    remote::prediction_backup::{AppliedTicks, PredictionBackupStore},
    schema::SchemaDescriptor,
    tick::{tick_delta, Tick, TickInstant},
};

/// Which path [`apply_predicted`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedApply {
    /// The newest tick was already applied; predicted state reused.
    Reused,
    /// Rolled back to the previous full-tick backup, then applied the
    /// new records. One tick of forward simulation catches up.
    Restored,
    /// No usable backup: records applied raw, and the simulation must
    /// replay everything since the snapshot tick.
    Resimulated,
}

/// Write every matching record stamped `tick` onto live storage.
/// Entities without a record there keep their current state. Returns
/// how many entities were written.
pub fn apply_tick(block: &mut GhostBlock, history: &SnapshotHistory, tick: Tick) -> usize {
    let Some(slot) = history.slot(tick) else {
        return 0;
    };
    if !slot.acked() {
        return 0;
    }
    let schema = block.schema().clone();
    let mut applied = 0;
    for entity in 0..block.len() {
        let Some(ghost) = block.ghost(entity) else {
            continue;
        };
        if slot.identity(entity) != Some(ghost) {
            continue;
        }
        apply_record(block, &schema, slot, entity);
        applied += 1;
    }
    applied
}

/// Bring a predicted block up to the authoritative state at `latest`.
///
/// The cheap path restores the backup of `latest - 1` and lets the
/// simulation step forward once; the expensive path applies the
/// records raw and the scheduler replays from `latest`.
pub fn apply_predicted(
    block: &mut GhostBlock,
    history: &SnapshotHistory,
    backups: &PredictionBackupStore,
    applied: &AppliedTicks,
    latest: Tick,
) -> PredictedApply {
    if applied.get(block.id()) == Some(latest) {
        return PredictedApply::Reused;
    }

    let previous = latest.wrapping_sub(1);
    let outcome = match backups.restore(block, previous) {
        Ok(true) => PredictedApply::Restored,
        Ok(false) => {
            log::warn!(
                "block {:?} resimulates from tick {latest}: no backup for tick {previous}",
                block.id()
            );
            PredictedApply::Resimulated
        }
        Err(error) => {
            log::warn!(
                "block {:?} resimulates from tick {latest}: {error}",
                block.id()
            );
            PredictedApply::Resimulated
        }
    };

    apply_tick(block, history, latest);
    applied.mark(block.id(), latest);
    outcome
}

/// Sample the history at `target` for every interpolated ghost and
/// write the blended state to live storage. Predicted ghosts are
/// untouched; they are simulated, never blended. Returns how many
/// ghosts were sampled.
pub fn apply_interpolated(
    block: &mut GhostBlock,
    history: &SnapshotHistory,
    target: TickInstant,
) -> usize {
    let schema = block.schema().clone();
    let field_start = schema.field_word_range().start;
    let mut sampled = 0;

    for entity in 0..block.len() {
        let Some(ghost) = block.ghost(entity) else {
            continue;
        };
        if block.is_predicted(entity) {
            continue;
        }
        let Some((from_tick, to_tick)) = locate_bracket(history, entity, ghost, target.tick)
        else {
            continue;
        };
        let Some(from_slot) = history.slot(from_tick) else {
            continue;
        };
        let to = to_tick.and_then(|tick| history.slot(tick).map(|slot| (tick, slot)));
        let factor = match to {
            Some((to_tick, _)) => {
                let span = tick_delta(from_tick, to_tick) as f32;
                let offset = tick_delta(from_tick, target.tick) as f32 + target.fraction;
                (offset / span).clamp(0.0, 1.0)
            }
            None => 0.0,
        };

        let from_record = from_slot.record(entity);
        for (index, component) in schema.components().iter().enumerate() {
            if component.layout.buffer {
                // Buffers never blend; the older bracket's bytes win.
                let word = field_start + component.word_range().start;
                let bytes = from_slot.buffer_bytes(entity, word);
                let live = block.buffer_mut(entity, index);
                live.clear();
                live.extend_from_slice(bytes);
            } else {
                let words = component.word_range();
                let from_words = &from_record[field_start + words.start..field_start + words.end];
                match to {
                    Some((_, to_slot)) => {
                        let to_record = to_slot.record(entity);
                        component.codec.interpolate(
                            from_words,
                            &to_record[field_start + words.start..field_start + words.end],
                            factor,
                            block.value_mut(entity, index),
                        );
                    }
                    // Single-sided bracket snaps.
                    None => component.codec.apply(from_words, block.value_mut(entity, index)),
                }
            }
            set_enable_from_record(block, &schema, from_record, entity, index);
        }
        sampled += 1;
    }
    sampled
}

/// The records bracketing `tick` for one ghost: the newest at or
/// before it, plus the earliest after it if one exists. When the
/// history only holds future records, the earliest of those snaps.
fn locate_bracket(
    history: &SnapshotHistory,
    entity: usize,
    ghost: GhostId,
    tick: Tick,
) -> Option<(Tick, Option<Tick>)> {
    if let Some(from) = newest_at_or_before(history, entity, ghost, tick) {
        return Some((from, earliest_after(history, entity, ghost, tick)));
    }
    earliest_after(history, entity, ghost, tick).map(|to| (to, None))
}

fn newest_at_or_before(
    history: &SnapshotHistory,
    entity: usize,
    ghost: GhostId,
    tick: Tick,
) -> Option<Tick> {
    for age in 0..history.capacity() {
        let candidate = tick.wrapping_sub(age as Tick);
        if history.has_record(candidate, entity, ghost) {
            return Some(candidate);
        }
    }
    None
}

fn earliest_after(
    history: &SnapshotHistory,
    entity: usize,
    ghost: GhostId,
    tick: Tick,
) -> Option<Tick> {
    for ahead in 1..history.capacity() {
        let candidate = tick.wrapping_add(ahead as Tick);
        if history.has_record(candidate, entity, ghost) {
            return Some(candidate);
        }
    }
    None
}

/// One record onto one entity's live columns: fields through the
/// codec, buffer bytes out of the slot arena, enable bits as stored.
fn apply_record(
    block: &mut GhostBlock,
    schema: &SchemaDescriptor,
    slot: &SnapshotSlot,
    entity: usize,
) {
    let record = slot.record(entity);
    let field_start = schema.field_word_range().start;
    for (index, component) in schema.components().iter().enumerate() {
        if component.layout.buffer {
            let word = field_start + component.word_range().start;
            let bytes = slot.buffer_bytes(entity, word);
            let live = block.buffer_mut(entity, index);
            live.clear();
            live.extend_from_slice(bytes);
        } else {
            let words = component.word_range();
            component.codec.apply(
                &record[field_start + words.start..field_start + words.end],
                block.value_mut(entity, index),
            );
        }
        set_enable_from_record(block, schema, record, entity, index);
    }
}

fn set_enable_from_record(
    block: &mut GhostBlock,
    schema: &SchemaDescriptor,
    record: &[u32],
    entity: usize,
    component: usize,
) {
    let Some(enable) = schema.components()[component].enable_index() else {
        return;
    };
    let enable_range = schema.enable_word_range();
    let on = record[enable_range.start + enable / 32] & (1 << (enable % 32)) != 0;
    block.set_enabled_by_index(entity, enable, on);
}
