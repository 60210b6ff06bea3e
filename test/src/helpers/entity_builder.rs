use std::sync::Arc;

use wraith_shared::{BlockId, GhostBlock, GhostId, SchemaDescriptor};

/// Fluent setup for one end's block: spawn ghosts into consecutive
/// slots, then poke values, buffers, enables, groups.
pub struct BlockBuilder {
    block: GhostBlock,
    next: usize,
}

impl BlockBuilder {
    pub fn new(id: u32, schema: &Arc<SchemaDescriptor>, capacity: usize) -> Self {
        Self {
            block: GhostBlock::new(BlockId(id), schema.clone(), capacity),
            next: 0,
        }
    }

    /// Continue poking an already built block.
    pub fn rewrap(block: GhostBlock) -> Self {
        let next = (0..block.len())
            .take_while(|&entity| block.ghost(entity).is_some())
            .count();
        Self { block, next }
    }

    pub fn spawn(mut self, ghost_id: u32) -> Self {
        self.block.insert(self.next, GhostId::new(ghost_id, 0));
        self.next += 1;
        self
    }

    pub fn spawn_ids(mut self, ids: &[u32]) -> Self {
        for &id in ids {
            self = self.spawn(id);
        }
        self
    }

    pub fn int(mut self, entity: usize, component: usize, value: i32) -> Self {
        self.block.set_value(entity, component, &value.to_le_bytes());
        self
    }

    pub fn float(mut self, entity: usize, component: usize, value: f32) -> Self {
        self.block.set_value(entity, component, &value.to_le_bytes());
        self
    }

    pub fn vec3(mut self, entity: usize, component: usize, value: [f32; 3]) -> Self {
        let mut bytes = [0u8; 12];
        for (axis, part) in value.iter().enumerate() {
            bytes[axis * 4..axis * 4 + 4].copy_from_slice(&part.to_le_bytes());
        }
        self.block.set_value(entity, component, &bytes);
        self
    }

    pub fn payload(mut self, entity: usize, component: usize, data: &[u8]) -> Self {
        self.block.set_buffer(entity, component, data);
        self
    }

    pub fn disabled(mut self, entity: usize, component: usize) -> Self {
        self.block.set_enabled(entity, component, false);
        self
    }

    pub fn group(mut self, root: usize, len: usize) -> Self {
        self.block.set_group(root, len);
        self
    }

    pub fn predicted(mut self, entity: usize) -> Self {
        self.block.set_predicted(entity, true);
        self
    }

    pub fn prespawned(mut self) -> Self {
        self.block.set_prespawned(true);
        self
    }

    pub fn build(self) -> GhostBlock {
        self.block
    }
}

/// An empty remote-end twin: same block id and schema, same capacity,
/// every slot vacant until the spawn records land.
pub fn mirror(source: &GhostBlock) -> GhostBlock {
    GhostBlock::new(source.id(), source.schema().clone(), source.len())
}

/// A remote-end twin with the same ghosts already spawned at the same
/// indices, as after a fully applied spawn stream.
pub fn mirror_spawned(source: &GhostBlock) -> GhostBlock {
    let mut block = mirror(source);
    for entity in 0..source.len() {
        if let Some(ghost) = source.ghost(entity) {
            block.insert(entity, ghost);
        }
    }
    block.set_prespawned(source.prespawned());
    block
}

/// A remote-end twin with the same ghosts spawned in reverse slot
/// order, so wire ids resolve to permuted local indices.
pub fn mirror_reversed(source: &GhostBlock) -> GhostBlock {
    let mut block = mirror(source);
    let mut slot = 0;
    for entity in (0..source.len()).rev() {
        if let Some(ghost) = source.ghost(entity) {
            block.insert(slot, ghost);
            slot += 1;
        }
    }
    block.set_prespawned(source.prespawned());
    block
}
