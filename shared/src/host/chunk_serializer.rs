//! Host-side batch encoder. One call turns a block's live state at one
//! tick into delta-compressed entity records against per-connection
//! baselines, staged in scratch and flushed to the packet writer only
//! once they are known to fit.

use std::ops::Range;

use wraith_serde::{BitSerde, BitWrite, BitWriter};

use crate::{
    bitset::BitArray,
    block::GhostBlock,
    error::SerializeError,
    ghost::GhostTypeId,
    history::{SnapshotHistory, SnapshotSlot},
    host::{
        baseline::{expire_stale_acks, select_range, BaselineTriple},
        scratch::SerializeScratch,
    },
    schema::{build_predicted, SchemaDescriptor},
    tick::{tick_delta, Tick},
    wire::{
        BufferLenVarInt, CountVarInt, DynSizeVarInt, EnableVarInt, MaskVarInt, RunLenVarInt,
        SizePrefixVarInt, TickDeltaVarInt,
    },
};

/// What one [`serialize`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOutcome {
    /// Entities whose records were flushed to the writer.
    pub entities_written: usize,
    /// First entity index that did not fit; pick the next tick's range
    /// up from here.
    pub resume_index: Option<usize>,
    /// The packet has no room for further batches.
    pub filled: bool,
}

/// Serialize `range` of `block` for one connection at `tick`.
///
/// Captures the live state into the connection's snapshot history,
/// selects baselines among acked slots no older than `max_age` ticks,
/// and writes one batch to `writer` if at least one entity fits. The
/// history slot keeps identities only for entities actually flushed,
/// so a later ack of this tick vouches for exactly what was sent.
///
/// On [`SerializeError::ScratchOverflow`] nothing has been written and
/// the whole range is recorded as unsent; the caller grows the scratch
/// and retries.
#[allow(clippy::too_many_arguments)]
pub fn serialize(
    block: &GhostBlock,
    history: &mut SnapshotHistory,
    relevancy: &BitArray,
    range: Range<usize>,
    tick: Tick,
    max_age: Tick,
    writer: &mut BitWriter,
    scratch: &mut SerializeScratch,
) -> Result<SerializeOutcome, SerializeError> {
    let schema = block.schema();
    debug_assert!(range.end <= block.len());
    debug_assert!(relevancy.len() >= range.end);

    scratch.reset();
    scratch.predicted.resize(schema.field_words(), 0);
    scratch.cur_mask.resize(schema.mask_words(), 0);

    expire_stale_acks(history, tick, max_age);

    // Capture live state for every relevant entity in range. Entities
    // outside the range, vacant slots and irrelevant entities leave
    // gaps so they can never be mistaken for baselines.
    {
        let slot = history.begin_tick(tick);
        slot.arena_mut().clear();
        for entity in range.clone() {
            match block.ghost(entity) {
                Some(ghost) if relevancy.get(entity) => {
                    capture_entity(block, schema, slot, entity, tick);
                    slot.set_identity(entity, ghost);
                }
                _ => slot.mark_gap(entity),
            }
        }
    }

    select_range(
        history,
        block,
        relevancy,
        range.clone(),
        tick,
        max_age,
        &mut scratch.triples,
    );

    let header_bits = batch_header_bits(schema.type_id(), range.len());
    let pass = stage_range(
        block,
        schema,
        history,
        relevancy,
        &range,
        tick,
        header_bits,
        writer.bits_free(),
        scratch,
    );

    if pass.overflowed {
        let needed_bits = scratch.capacity_bits().saturating_mul(2);
        let slot = history.begin_tick(tick);
        for entity in range.clone() {
            slot.mark_gap(entity);
        }
        return Err(SerializeError::ScratchOverflow { needed_bits });
    }

    // Stamp the sent change masks into the slot and gap everything
    // staged but not flushed; future acks must only vouch for records
    // the remote will actually hold.
    let mask_words = schema.mask_words();
    let mask_range = schema.mask_word_range();
    {
        let slot = history.begin_tick(tick);
        let mut next = 0;
        for entity in range.clone() {
            if next < scratch.emitted.len() && scratch.emitted[next] == entity {
                let stash = &scratch.mask_stash[next * mask_words..(next + 1) * mask_words];
                slot.record_mut(entity)[mask_range.clone()].copy_from_slice(stash);
                next += 1;
            } else {
                slot.mark_gap(entity);
            }
        }
    }

    let entities_written = scratch.emitted.len();
    if entities_written > 0 {
        true.ser(writer);
        schema.type_id().ser(writer);
        CountVarInt::new(entities_written as u64).ser(writer);
        block.prespawned().ser(writer);
        scratch.records.copy_into(writer);
    }

    Ok(SerializeOutcome {
        entities_written,
        resume_index: pass.resume,
        filled: pass.filled,
    })
}

struct StagePass {
    resume: Option<usize>,
    filled: bool,
    overflowed: bool,
}

/// Stage entity records group by group. A group whose last member does
/// not fit is rolled back whole; the packet is then full.
#[allow(clippy::too_many_arguments)]
fn stage_range(
    block: &GhostBlock,
    schema: &SchemaDescriptor,
    history: &SnapshotHistory,
    relevancy: &BitArray,
    range: &Range<usize>,
    tick: Tick,
    header_bits: u32,
    free_bits: u32,
    scratch: &mut SerializeScratch,
) -> StagePass {
    let cur_slot = match history.slot(tick) {
        Some(slot) => slot,
        None => {
            return StagePass {
                resume: Some(range.start),
                filled: false,
                overflowed: false,
            }
        }
    };

    let mut run_remaining: u64 = 0;
    let mut entity = range.start;

    while entity < range.end {
        let group_len = block.group_run(entity).max(1);
        let group_end = (entity + group_len).min(range.end);
        let group_mark = scratch.records.mark();
        let stash_mark = scratch.mask_stash.len();
        let emitted_mark = scratch.emitted.len();

        for member in entity..group_end {
            if !is_live(block, relevancy, member) {
                continue;
            }
            let triple = scratch.triples[member - range.start];
            let run_header = if run_remaining == 0 {
                let length = run_length(block, relevancy, &scratch.triples, range, member, triple);
                run_remaining = length;
                Some(length)
            } else {
                None
            };
            run_remaining -= 1;

            stage_entity(
                block, schema, history, cur_slot, member, triple, run_header, tick, scratch,
            );
            if scratch.overflowed() {
                return StagePass {
                    resume: None,
                    filled: false,
                    overflowed: true,
                };
            }
            scratch.mask_stash.extend_from_slice(&scratch.cur_mask);
            scratch.emitted.push(member);

            if header_bits + scratch.records.len_bits() > free_bits {
                scratch.records.truncate(group_mark);
                scratch.mask_stash.truncate(stash_mark);
                scratch.emitted.truncate(emitted_mark);
                return StagePass {
                    resume: Some(entity),
                    filled: true,
                    overflowed: false,
                };
            }
        }

        entity = group_end;
    }

    StagePass {
        resume: None,
        filled: false,
        overflowed: false,
    }
}

/// Stage one entity's record: body bits into `scratch.body`, then the
/// framed record into `scratch.records`.
#[allow(clippy::too_many_arguments)]
fn stage_entity(
    block: &GhostBlock,
    schema: &SchemaDescriptor,
    history: &SnapshotHistory,
    cur_slot: &SnapshotSlot,
    entity: usize,
    triple: BaselineTriple,
    run_header: Option<u64>,
    tick: Tick,
    scratch: &mut SerializeScratch,
) {
    scratch.payload.clear();
    scratch.body.clear();
    scratch.cur_mask.fill(0);

    let field_range = schema.field_word_range();
    let cur_record = cur_slot.record(entity);
    let cur_fields = &cur_record[field_range.clone()];

    let mut base_ticks: [Tick; 3] = [0; 3];
    let base_count = triple.collect(&mut base_ticks);
    let mut base_fields: [&[u32]; 3] = [&[], &[], &[]];
    let mut b0_slot: Option<&SnapshotSlot> = None;
    for index in 0..base_count {
        let slot = history
            .slot(base_ticks[index])
            .expect("selected baseline is stamped");
        base_fields[index] = &slot.record(entity)[field_range.clone()];
        if index == 0 {
            b0_slot = Some(slot);
        }
    }
    let b0_record = b0_slot.map(|slot| slot.record(entity));
    if base_count > 0 {
        build_predicted(
            schema,
            tick,
            &base_ticks[..base_count],
            &base_fields[..base_count],
            &mut scratch.predicted,
        );
    }

    for component in schema.components() {
        let words = component.word_range();
        if component.layout.buffer {
            let word = field_range.start + words.start;
            let cur_bytes = cur_slot.buffer_bytes(entity, word);
            let changed = match b0_slot {
                Some(baseline) => cur_bytes != baseline.buffer_bytes(entity, word),
                None => true,
            };
            if changed {
                let shift = component.mask_shift();
                scratch.cur_mask[shift / 32] |= 1 << (shift % 32);
                BufferLenVarInt::new(cur_bytes.len() as u64).ser(&mut scratch.payload);
                for &byte in cur_bytes {
                    scratch.payload.write_byte(byte);
                }
            }
        } else {
            let predicted = (base_count > 0).then(|| &scratch.predicted[words.clone()]);
            let mask = component.codec.encode(
                &cur_fields[words.clone()],
                predicted,
                &mut scratch.payload,
            );
            for bit in 0..component.layout.mask_bits as usize {
                if mask & (1 << bit) != 0 {
                    let shift = component.mask_shift() + bit;
                    scratch.cur_mask[shift / 32] |= 1 << (shift % 32);
                }
            }
        }
    }

    // Body: [dyn-size delta][mask XOR][enable XOR][payload].
    if schema.has_buffers() {
        let cur_total = schema.dynamic_size(cur_record);
        let base_total = b0_record.map_or(0, |record| schema.dynamic_size(record));
        DynSizeVarInt::new(cur_total - base_total).ser(&mut scratch.body);
    }
    let mask_range = schema.mask_word_range();
    for word in 0..schema.mask_words() {
        let baseline = b0_record.map_or(0, |record| record[mask_range.start + word]);
        MaskVarInt::new(scratch.cur_mask[word] ^ baseline).ser(&mut scratch.body);
    }
    let enable_range = schema.enable_word_range();
    for word in 0..schema.enable_words() {
        let current = cur_record[enable_range.start + word];
        let baseline = b0_record.map_or(0, |record| record[enable_range.start + word]);
        EnableVarInt::new(current ^ baseline).ser(&mut scratch.body);
    }
    scratch.body.append_from(&scratch.payload);

    // Record framing: [run header][ghost id][size prefix][body].
    if let Some(run_len) = run_header {
        for slot_tick in triple.ticks {
            let delta = slot_tick.map_or(0, |t| tick_delta(t, tick) as u64);
            TickDeltaVarInt::new(delta).ser(&mut scratch.records);
        }
        RunLenVarInt::new(run_len).ser(&mut scratch.records);
    }
    if let Some(ghost) = block.ghost(entity) {
        ghost.ser(&mut scratch.records);
    }
    if schema.size_prefixed() {
        SizePrefixVarInt::new(scratch.body.len_bits() as u64).ser(&mut scratch.records);
    }
    scratch.records.append_from(&scratch.body);
}

/// Quantize one entity's live state into the slot record: tick word,
/// enable words, field words, buffer bytes into the slot arena. Mask
/// words are stamped later, once the entity is known to have shipped.
fn capture_entity(
    block: &GhostBlock,
    schema: &SchemaDescriptor,
    slot: &mut SnapshotSlot,
    entity: usize,
    tick: Tick,
) {
    let field_start = schema.field_word_range().start;
    let enable_range = schema.enable_word_range();
    {
        let record = slot.record_mut(entity);
        record[SchemaDescriptor::TICK_WORD] = tick as u32;
        for word in record[enable_range.clone()].iter_mut() {
            *word = 0;
        }
        for (index, component) in schema.components().iter().enumerate() {
            let enabled = match component.enable_index() {
                Some(enable) => {
                    let on = block.enabled_by_index(entity, enable);
                    if on {
                        record[enable_range.start + enable / 32] |= 1 << (enable % 32);
                    }
                    on
                }
                None => true,
            };
            if component.layout.buffer {
                continue;
            }
            let words = component.word_range();
            let target = &mut record[field_start + words.start..field_start + words.end];
            if enabled {
                component.codec.capture(block.value(entity, index), target);
            } else {
                // Disabled components quantize to zero on both ends,
                // keeping later baseline records bit-identical.
                target.fill(0);
            }
        }
    }
    for (index, component) in schema.components().iter().enumerate() {
        if component.layout.buffer {
            let enabled = component
                .enable_index()
                .map_or(true, |enable| block.enabled_by_index(entity, enable));
            let bytes: &[u8] = if enabled { block.buffer(entity, index) } else { &[] };
            slot.store_buffer(
                entity,
                field_start + component.word_range().start,
                bytes,
            );
        }
    }
}

/// Count how many upcoming live entities share `triple`, the current
/// entity included. Irrelevant and vacant entities sit inside a run
/// without breaking it.
fn run_length(
    block: &GhostBlock,
    relevancy: &BitArray,
    triples: &[BaselineTriple],
    range: &Range<usize>,
    start: usize,
    triple: BaselineTriple,
) -> u64 {
    let mut length = 0u64;
    for entity in start..range.end {
        if !is_live(block, relevancy, entity) {
            continue;
        }
        if triples[entity - range.start] == triple {
            length += 1;
        } else {
            break;
        }
    }
    length.max(1)
}

fn is_live(block: &GhostBlock, relevancy: &BitArray, entity: usize) -> bool {
    block.ghost(entity).is_some() && relevancy.get(entity)
}

/// Upper bound on the batch header: present bit, type id, entity
/// count, prespawn bit.
fn batch_header_bits(type_id: GhostTypeId, max_entities: usize) -> u32 {
    1 + type_id.bit_length() + CountVarInt::new(max_entities as u64).bit_length() + 1
}
