//! Remote-side batch decoder. Mirrors the host serializer bit for bit:
//! each decoded entity record lands in the connection's receive-side
//! snapshot history, where the ack flag reads as "slot populated" and
//! later batches find their baselines the same way the host did.

use std::collections::HashMap;

use wraith_serde::{BitReader, BitSerde};

use crate::{
    block::GhostBlock,
    config::ReplicationConfig,
    error::ApplyError,
    ghost::{BlockId, GhostId, GhostTypeId},
    history::SnapshotHistory,
    host::baseline::BaselineTriple,
    schema::{build_predicted, SchemaDescriptor, SchemaRegistry},
    tick::Tick,
    wire::{
        BufferLenVarInt, CountVarInt, DynSizeVarInt, EnableVarInt, MaskVarInt, RunLenVarInt,
        SizePrefixVarInt, TickDeltaVarInt,
    },
};

/// What one [`read_batch`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Entities whose records were written into the receive history.
    pub entities_applied: usize,
    /// Entities skipped over their size prefix: unspawned ghosts,
    /// unknown types, or records dropped as inconsistent.
    pub entities_skipped: usize,
}

impl ReadOutcome {
    pub fn absorb(&mut self, other: ReadOutcome) {
        self.entities_applied += other.entities_applied;
        self.entities_skipped += other.entities_skipped;
    }
}

/// Reusable decode workspace. One entity flows through it at a time;
/// nothing here survives past its commit.
#[derive(Default)]
pub struct DecodeScratch {
    staged: Vec<u32>,
    base_record: Vec<u32>,
    base_fields: Vec<u32>,
    predicted: Vec<u32>,
    buffer_bytes: Vec<u8>,
    buffer_stages: Vec<(usize, usize, usize)>,
}

/// Where a wire ghost id landed among the local blocks.
enum Resolution {
    Found {
        block: usize,
        entity: usize,
        ghost: GhostId,
    },
    WrongType,
    Unspawned,
}

fn resolve(
    blocks: &[&GhostBlock],
    type_id: GhostTypeId,
    prespawned: bool,
    wire_id: u32,
) -> Resolution {
    let mut elsewhere = false;
    for (index, block) in blocks.iter().enumerate() {
        let Some(entity) = block.index_of(wire_id) else {
            continue;
        };
        if block.type_id() == type_id && block.prespawned() == prespawned {
            if let Some(ghost) = block.ghost(entity) {
                return Resolution::Found {
                    block: index,
                    entity,
                    ghost,
                };
            }
        }
        elsewhere = true;
    }
    if elsewhere {
        Resolution::WrongType
    } else {
        Resolution::Unspawned
    }
}

/// Decode one type batch at `tick` into the receive-side histories.
/// The reader must sit just past the batch's present bit.
///
/// Storage indices are local: the wire carries ghost ids, and each id
/// is applied at whatever slot this end keeps it in. Per-entity
/// inconsistencies (unspawned ghost, missing baseline, wrong type) are
/// skipped over their size prefix and counted; without size prefixes
/// they end the batch with an error.
pub fn read_batch(
    reader: &mut BitReader,
    registry: &SchemaRegistry,
    blocks: &[&GhostBlock],
    histories: &mut HashMap<BlockId, SnapshotHistory>,
    config: &ReplicationConfig,
    tick: Tick,
    scratch: &mut DecodeScratch,
) -> Result<ReadOutcome, ApplyError> {
    let type_id = GhostTypeId::de(reader)?;
    let count = CountVarInt::de(reader)?.get() as usize;
    let prespawned = bool::de(reader)?;

    let Some(schema) = registry.get(type_id) else {
        if !registry.size_prefixed() {
            return Err(ApplyError::UnknownType(type_id));
        }
        skip_batch(reader, count)?;
        log::debug!("skipped batch of {count}: no descriptor for {type_id:?} yet");
        return Ok(ReadOutcome {
            entities_applied: 0,
            entities_skipped: count,
        });
    };

    let mut outcome = ReadOutcome::default();
    let mut touched: Vec<BlockId> = Vec::new();
    let mut run = BaselineTriple::default();
    let mut run_remaining: u64 = 0;

    for index in 0..count {
        if run_remaining == 0 {
            let remaining = (count - index) as u64;
            let (triple, length) = read_run_header(reader, tick, remaining)?;
            run = triple;
            run_remaining = length;
        }
        run_remaining -= 1;

        let ghost = GhostId::de(reader)?;
        let body_bits = if schema.size_prefixed() {
            let bits = SizePrefixVarInt::de(reader)?.get() as u32;
            if bits > reader.bits_remaining() {
                return Err(ApplyError::PayloadOverflow { bits });
            }
            Some(bits)
        } else {
            None
        };

        let (block, entity, local_ghost) = match resolve(blocks, type_id, prespawned, ghost.id) {
            Resolution::Found {
                block,
                entity,
                ghost,
            } => (blocks[block], entity, ghost),
            Resolution::Unspawned => {
                let Some(bits) = body_bits else {
                    return Err(ApplyError::UnresolvedGhost { id: ghost.id });
                };
                reader.skip_bits(bits)?;
                log::debug!("ghost {} not spawned here yet, record deferred", ghost.id);
                outcome.entities_skipped += 1;
                continue;
            }
            Resolution::WrongType => {
                let Some(bits) = body_bits else {
                    return Err(ApplyError::TypeMismatch { id: ghost.id });
                };
                reader.skip_bits(bits)?;
                log::warn!("ghost {} is not a {type_id:?} here, record dropped", ghost.id);
                outcome.entities_skipped += 1;
                continue;
            }
        };

        let history = histories.entry(block.id()).or_insert_with(|| {
            SnapshotHistory::new(config.history_capacity, block.len(), schema.record_words())
        });

        let applied = read_entity(
            reader,
            &schema,
            block,
            history,
            entity,
            local_ghost,
            run,
            tick,
            body_bits,
            scratch,
        )?;
        if applied {
            if !touched.contains(&block.id()) {
                touched.push(block.id());
            }
            outcome.entities_applied += 1;
        } else {
            outcome.entities_skipped += 1;
        }
    }

    // Populated ticks become baseline candidates only once the whole
    // batch has landed.
    for id in touched {
        if let Some(history) = histories.get_mut(&id) {
            history.ack_tick(tick);
        }
    }

    Ok(outcome)
}

/// Decode one entity's record and commit it to the history slot.
/// Returns false when the record was dropped over its size prefix.
#[allow(clippy::too_many_arguments)]
fn read_entity(
    reader: &mut BitReader,
    schema: &SchemaDescriptor,
    block: &GhostBlock,
    history: &mut SnapshotHistory,
    entity: usize,
    local_ghost: GhostId,
    run: BaselineTriple,
    tick: Tick,
    body_bits: Option<u32>,
    scratch: &mut DecodeScratch,
) -> Result<bool, ApplyError> {
    let field_range = schema.field_word_range();
    let mask_range = schema.mask_word_range();
    let enable_range = schema.enable_word_range();

    // Resolve the run's baselines against our own history. The host
    // only deltas against ticks this end acknowledged, so a miss means
    // desync (or a despawn gap) and the record cannot be trusted.
    let mut base_ticks: [Tick; 3] = [0; 3];
    let base_count = run.collect(&mut base_ticks);
    scratch.base_fields.clear();
    scratch.base_record.clear();
    scratch.base_record.resize(schema.record_words(), 0);
    for (index, &base_tick) in base_ticks[..base_count].iter().enumerate() {
        match history.slot(base_tick) {
            Some(slot) if slot.acked() && slot.identity(entity) == Some(local_ghost) => {
                scratch
                    .base_fields
                    .extend_from_slice(&slot.record(entity)[field_range.clone()]);
                if index == 0 {
                    scratch.base_record.copy_from_slice(slot.record(entity));
                }
            }
            _ => {
                let Some(bits) = body_bits else {
                    return Err(ApplyError::MissingBaseline { tick: base_tick });
                };
                reader.skip_bits(bits)?;
                log::warn!(
                    "ghost {} needs baseline tick {base_tick} we do not hold, record dropped",
                    local_ghost.id
                );
                return Ok(false);
            }
        }
    }

    if base_count > 0 {
        let field_words = schema.field_words();
        scratch.predicted.resize(field_words, 0);
        let mut field_slices: [&[u32]; 3] = [&[], &[], &[]];
        for (index, slice) in field_slices[..base_count].iter_mut().enumerate() {
            *slice = &scratch.base_fields[index * field_words..(index + 1) * field_words];
        }
        build_predicted(
            schema,
            tick,
            &base_ticks[..base_count],
            &field_slices[..base_count],
            &mut scratch.predicted,
        );
    }

    let before = reader.bits_remaining();

    let mut arena_hint = 0i64;
    if schema.has_buffers() {
        let delta = DynSizeVarInt::de(reader)?.get();
        arena_hint = schema.dynamic_size(&scratch.base_record) + delta;
    }

    scratch.staged.clear();
    scratch.staged.resize(schema.record_words(), 0);
    scratch.staged[SchemaDescriptor::TICK_WORD] = tick as u32;
    for word in 0..schema.mask_words() {
        let xor = MaskVarInt::de(reader)?.get() as u32;
        scratch.staged[mask_range.start + word] = xor ^ scratch.base_record[mask_range.start + word];
    }
    for word in 0..schema.enable_words() {
        let xor = EnableVarInt::de(reader)?.get() as u32;
        scratch.staged[enable_range.start + word] =
            xor ^ scratch.base_record[enable_range.start + word];
    }

    scratch.buffer_bytes.clear();
    scratch.buffer_stages.clear();
    for component in schema.components() {
        let words = component.word_range();
        if component.layout.buffer {
            let word = field_range.start + words.start;
            let shift = component.mask_shift();
            let changed =
                scratch.staged[mask_range.start + shift / 32] & (1 << (shift % 32)) != 0;
            let start = scratch.buffer_bytes.len();
            if changed {
                let len = BufferLenVarInt::de(reader)?.get() as usize;
                let bits = (len as u32).saturating_mul(8);
                if bits > reader.bits_remaining() {
                    return Err(ApplyError::PayloadOverflow { bits });
                }
                for _ in 0..len {
                    scratch.buffer_bytes.push(reader.read_byte()?);
                }
            } else {
                // Unchanged: carried forward out of the primary
                // baseline slot's arena.
                let carried: &[u8] = match run.primary() {
                    Some(base_tick) => history
                        .slot(base_tick)
                        .map_or(&[], |slot| slot.buffer_bytes(entity, word)),
                    None => &[],
                };
                scratch.buffer_bytes.extend_from_slice(carried);
            }
            let len = scratch.buffer_bytes.len() - start;
            scratch.buffer_stages.push((word, start, len));
        } else {
            let mask = component_mask(
                &scratch.staged[mask_range.clone()],
                component.mask_shift(),
                component.layout.mask_bits as usize,
            );
            let predicted = (base_count > 0).then(|| &scratch.predicted[words.clone()]);
            component.codec.decode(
                mask,
                predicted,
                &mut scratch.staged[field_range.start + words.start..field_range.start + words.end],
                reader,
            )?;
        }
    }

    if let Some(bits) = body_bits {
        let consumed = before - reader.bits_remaining();
        if consumed > bits {
            return Err(ApplyError::PayloadOverflow { bits });
        }
        if consumed < bits {
            // Shorter than declared: the decode diverged somewhere.
            // Realign and drop the suspect record.
            reader.skip_bits(bits - consumed)?;
            log::warn!(
                "ghost {} record consumed {consumed} of {bits} declared bits, dropped",
                local_ghost.id
            );
            return Ok(false);
        }
    }

    let slot = history.begin_tick(tick);
    if arena_hint > 0 {
        slot.arena_mut().reserve(arena_hint as usize);
    }
    slot.record_mut(entity).copy_from_slice(&scratch.staged);
    for &(word, start, len) in &scratch.buffer_stages {
        slot.store_buffer(entity, word, &scratch.buffer_bytes[start..start + len]);
    }
    slot.set_identity(entity, local_ghost);
    Ok(true)
}

fn read_run_header(
    reader: &mut BitReader,
    tick: Tick,
    remaining: u64,
) -> Result<(BaselineTriple, u64), ApplyError> {
    let mut triple = BaselineTriple::default();
    for slot in triple.ticks.iter_mut() {
        let age = TickDeltaVarInt::de(reader)?.get();
        if age != 0 {
            *slot = Some(tick.wrapping_sub(age as Tick));
        }
    }
    let run_len = RunLenVarInt::de(reader)?.get();
    Ok((triple, run_len.clamp(1, remaining)))
}

/// Walk a batch of an undescribed type record by record. Run headers
/// and size prefixes are enough to stay aligned; the bodies themselves
/// need no schema.
fn skip_batch(reader: &mut BitReader, count: usize) -> Result<(), ApplyError> {
    let mut run_remaining: u64 = 0;
    for index in 0..count {
        if run_remaining == 0 {
            for _ in 0..3 {
                TickDeltaVarInt::de(reader)?;
            }
            let run_len = RunLenVarInt::de(reader)?.get();
            run_remaining = run_len.clamp(1, (count - index) as u64);
        }
        run_remaining -= 1;
        GhostId::de(reader)?;
        let bits = SizePrefixVarInt::de(reader)?.get() as u32;
        if bits > reader.bits_remaining() {
            return Err(ApplyError::PayloadOverflow { bits });
        }
        reader.skip_bits(bits)?;
    }
    Ok(())
}

/// This component's change bits, shifted down out of the mask words.
fn component_mask(mask: &[u32], shift: usize, bits: usize) -> u32 {
    let mut out = 0u32;
    for bit in 0..bits {
        let index = shift + bit;
        if mask[index / 32] & (1 << (index % 32)) != 0 {
            out |= 1 << bit;
        }
    }
    out
}
