//! Rollback state for predicted blocks: a raw copy of applied live
//! state taken at the last fully simulated tick, plus the shared map
//! of ticks already applied per block. Both structures are cloneable
//! handles over shared storage so the read path's block partitions can
//! use them concurrently on disjoint keys.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    bitset::BitArray,
    block::GhostBlock,
    error::ApplyError,
    ghost::{BlockId, GhostId},
    tick::{Tick, TickInstant},
};

enum ColumnBackup {
    Value(Vec<u8>),
    Buffer(Vec<Vec<u8>>),
}

/// One block's applied state at one tick: columns, enable bits,
/// buffers, and the identity array that gates restoring them.
struct BlockBackup {
    tick: Tick,
    identities: Vec<Option<GhostId>>,
    columns: Vec<ColumnBackup>,
    enables: BitArray,
}

fn capture_block(block: &GhostBlock, tick: Tick) -> BlockBackup {
    let schema = block.schema();
    let mut columns = Vec::with_capacity(schema.components().len());
    for (index, component) in schema.components().iter().enumerate() {
        if component.layout.buffer {
            let entries = (0..block.len())
                .map(|entity| block.buffer(entity, index).to_vec())
                .collect();
            columns.push(ColumnBackup::Buffer(entries));
        } else {
            let mut bytes = Vec::with_capacity(block.len() * component.layout.stride);
            for entity in 0..block.len() {
                bytes.extend_from_slice(block.value(entity, index));
            }
            columns.push(ColumnBackup::Value(bytes));
        }
    }

    let enable_bits = schema.enable_bits();
    let mut enables = BitArray::with_bits(block.len() * enable_bits);
    for entity in 0..block.len() {
        for bit in 0..enable_bits {
            enables.set(
                entity * enable_bits + bit,
                block.enabled_by_index(entity, bit),
            );
        }
    }

    BlockBackup {
        tick,
        identities: (0..block.len()).map(|entity| block.ghost(entity)).collect(),
        columns,
        enables,
    }
}

fn restore_block(backup: &BlockBackup, block: &mut GhostBlock) {
    let schema = block.schema().clone();
    for (index, column) in backup.columns.iter().enumerate() {
        match column {
            ColumnBackup::Value(bytes) => {
                let stride = schema.components()[index].layout.stride;
                for entity in 0..block.len() {
                    block
                        .value_mut(entity, index)
                        .copy_from_slice(&bytes[entity * stride..(entity + 1) * stride]);
                }
            }
            ColumnBackup::Buffer(entries) => {
                for entity in 0..block.len() {
                    let live = block.buffer_mut(entity, index);
                    live.clear();
                    live.extend_from_slice(&entries[entity]);
                }
            }
        }
    }

    let enable_bits = schema.enable_bits();
    for entity in 0..block.len() {
        for bit in 0..enable_bits {
            block.set_enabled_by_index(
                entity,
                bit,
                backup.enables.get(entity * enable_bits + bit),
            );
        }
    }
}

fn identities_match(backup: &BlockBackup, block: &GhostBlock) -> bool {
    backup.identities.len() == block.len()
        && (0..block.len()).all(|entity| block.ghost(entity) == backup.identities[entity])
}

/// Latest full-tick backup per block. Only one generation is kept; a
/// capture replaces whatever was there.
#[derive(Clone, Default)]
pub struct PredictionBackupStore {
    data: Arc<RwLock<HashMap<BlockId, BlockBackup>>>,
}

impl PredictionBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every block's applied state. Fractional instants are
    /// mid-simulation and are not capture points.
    pub fn capture(&self, blocks: &[&GhostBlock], instant: TickInstant) {
        if !instant.is_whole() {
            return;
        }
        if let Ok(mut data) = self.data.as_ref().write() {
            for block in blocks {
                data.insert(block.id(), capture_block(block, instant.tick));
            }
        }
    }

    /// Tick of the backup held for `block`, if any.
    pub fn backup_tick(&self, block: BlockId) -> Option<Tick> {
        if let Ok(data) = self.data.as_ref().read() {
            return data.get(&block).map(|backup| backup.tick);
        }
        None
    }

    /// Write the backup stamped `tick` back onto `block`. `Ok(false)`
    /// is a plain miss (no backup, or one for another tick);
    /// [`ApplyError::StaleIdentity`] means the block's identities
    /// moved since the capture and the backup cannot be trusted.
    pub fn restore(&self, block: &mut GhostBlock, tick: Tick) -> Result<bool, ApplyError> {
        let Ok(data) = self.data.as_ref().read() else {
            return Ok(false);
        };
        let Some(backup) = data.get(&block.id()) else {
            return Ok(false);
        };
        if backup.tick != tick {
            return Ok(false);
        }
        if !identities_match(backup, block) {
            return Err(ApplyError::StaleIdentity);
        }
        restore_block(backup, block);
        Ok(true)
    }
}

/// Newest tick applied onto each predicted block, shared with the
/// simulation scheduler: a block whose entry moved needs resimulation
/// from that tick.
#[derive(Clone, Default)]
pub struct AppliedTicks {
    data: Arc<RwLock<HashMap<BlockId, Tick>>>,
}

impl AppliedTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, block: BlockId) -> Option<Tick> {
        if let Ok(data) = self.data.as_ref().read() {
            return data.get(&block).copied();
        }
        None
    }

    pub fn mark(&self, block: BlockId, tick: Tick) {
        if let Ok(mut data) = self.data.as_ref().write() {
            data.insert(block, tick);
        }
    }

    /// Current view of the whole map, for the scheduler's pass.
    pub fn snapshot(&self) -> Vec<(BlockId, Tick)> {
        if let Ok(data) = self.data.as_ref().read() {
            return data.iter().map(|(block, tick)| (*block, *tick)).collect();
        }
        Vec::new()
    }
}
