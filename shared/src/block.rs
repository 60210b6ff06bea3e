use std::{collections::HashMap, sync::Arc};

use crate::{
    bitset::BitArray,
    ghost::{BlockId, GhostId, GhostTypeId},
    schema::SchemaDescriptor,
};

/// One component's storage across a block's entity slots.
pub enum Column {
    Value { bytes: Vec<u8>, stride: usize },
    Buffer { entries: Vec<Vec<u8>> },
}

/// Fixed-capacity columnar storage for one ghost type: the live state
/// the serializer reads and the apply path writes. Slots are vacant
/// when their identity entry is `None`.
///
/// `data_version` advances on every gameplay-facing value write;
/// `structure_version` advances when slot identities move. The static
/// optimization keys off both.
pub struct GhostBlock {
    id: BlockId,
    schema: Arc<SchemaDescriptor>,
    len: usize,
    ids: Vec<Option<GhostId>>,
    columns: Vec<Column>,
    enables: BitArray,
    group_run: Vec<u8>,
    predicted: BitArray,
    prespawned: bool,
    data_version: u64,
    structure_version: u64,
    by_wire_id: HashMap<u32, usize>,
}

impl GhostBlock {
    pub fn new(id: BlockId, schema: Arc<SchemaDescriptor>, capacity: usize) -> Self {
        assert!(capacity >= 1);
        let columns = schema
            .components()
            .iter()
            .map(|component| {
                if component.layout.buffer {
                    Column::Buffer {
                        entries: vec![Vec::new(); capacity],
                    }
                } else {
                    Column::Value {
                        bytes: vec![0; capacity * component.layout.stride],
                        stride: component.layout.stride,
                    }
                }
            })
            .collect();
        Self {
            id,
            len: capacity,
            ids: vec![None; capacity],
            columns,
            enables: BitArray::with_bits(capacity * schema.enable_bits()),
            group_run: vec![1; capacity],
            predicted: BitArray::with_bits(capacity),
            prespawned: false,
            data_version: 0,
            structure_version: 0,
            by_wire_id: HashMap::new(),
            schema,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn type_id(&self) -> GhostTypeId {
        self.schema.type_id()
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    /// Slot count, vacant slots included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.ids.iter().all(|id| id.is_none())
    }

    pub fn ghost(&self, entity: usize) -> Option<GhostId> {
        self.ids[entity]
    }

    pub fn index_of(&self, wire_id: u32) -> Option<usize> {
        self.by_wire_id.get(&wire_id).copied()
    }

    pub fn insert(&mut self, entity: usize, ghost: GhostId) {
        debug_assert!(self.ids[entity].is_none(), "slot occupied");
        self.ids[entity] = Some(ghost);
        self.by_wire_id.insert(ghost.id, entity);
        self.group_run[entity] = 1;
        self.structure_version += 1;
    }

    pub fn remove(&mut self, entity: usize) -> Option<GhostId> {
        let ghost = self.ids[entity].take()?;
        self.by_wire_id.remove(&ghost.id);
        self.group_run[entity] = 1;
        self.predicted.set(entity, false);
        self.structure_version += 1;
        Some(ghost)
    }

    /// Move one entity's slot, `to` must be vacant. Group members
    /// cannot be relocated individually.
    pub fn relocate(&mut self, from: usize, to: usize) {
        debug_assert!(self.ids[to].is_none(), "target slot occupied");
        debug_assert_eq!(self.group_run[from], 1, "cannot relocate grouped entity");
        let Some(ghost) = self.ids[from].take() else {
            return;
        };
        self.ids[to] = Some(ghost);
        self.by_wire_id.insert(ghost.id, to);

        for column in &mut self.columns {
            match column {
                Column::Value { bytes, stride } => {
                    let stride = *stride;
                    let (src, dst) = (from * stride, to * stride);
                    let moved: Vec<u8> = bytes[src..src + stride].to_vec();
                    bytes[dst..dst + stride].copy_from_slice(&moved);
                }
                Column::Buffer { entries } => {
                    entries[to] = std::mem::take(&mut entries[from]);
                }
            }
        }

        let enable_bits = self.schema.enable_bits();
        for k in 0..enable_bits {
            let bit = self.enables.get(from * enable_bits + k);
            self.enables.set(to * enable_bits + k, bit);
            self.enables.set(from * enable_bits + k, false);
        }
        let was_predicted = self.predicted.get(from);
        self.predicted.set(to, was_predicted);
        self.predicted.set(from, false);

        self.structure_version += 1;
    }

    /// Read one entity's bytes in a value column.
    pub fn value(&self, entity: usize, component: usize) -> &[u8] {
        match &self.columns[component] {
            Column::Value { bytes, stride } => &bytes[entity * stride..(entity + 1) * stride],
            Column::Buffer { .. } => panic!("component {component} is a buffer"),
        }
    }

    /// Gameplay-facing value write; advances `data_version`.
    pub fn set_value(&mut self, entity: usize, component: usize, data: &[u8]) {
        match &mut self.columns[component] {
            Column::Value { bytes, stride } => {
                debug_assert_eq!(data.len(), *stride);
                bytes[entity * *stride..(entity + 1) * *stride].copy_from_slice(data);
            }
            Column::Buffer { .. } => panic!("component {component} is a buffer"),
        }
        self.data_version += 1;
    }

    /// Replication-internal value write: the apply path restores
    /// received state without advancing `data_version`.
    pub fn value_mut(&mut self, entity: usize, component: usize) -> &mut [u8] {
        match &mut self.columns[component] {
            Column::Value { bytes, stride } => {
                &mut bytes[entity * *stride..(entity + 1) * *stride]
            }
            Column::Buffer { .. } => panic!("component {component} is a buffer"),
        }
    }

    pub fn buffer(&self, entity: usize, component: usize) -> &[u8] {
        match &self.columns[component] {
            Column::Buffer { entries } => &entries[entity],
            Column::Value { .. } => panic!("component {component} is not a buffer"),
        }
    }

    /// Gameplay-facing buffer write; advances `data_version`.
    pub fn set_buffer(&mut self, entity: usize, component: usize, data: &[u8]) {
        match &mut self.columns[component] {
            Column::Buffer { entries } => {
                entries[entity].clear();
                entries[entity].extend_from_slice(data);
            }
            Column::Value { .. } => panic!("component {component} is not a buffer"),
        }
        self.data_version += 1;
    }

    /// Replication-internal buffer write, no version bump.
    pub fn buffer_mut(&mut self, entity: usize, component: usize) -> &mut Vec<u8> {
        match &mut self.columns[component] {
            Column::Buffer { entries } => &mut entries[entity],
            Column::Value { .. } => panic!("component {component} is not a buffer"),
        }
    }

    pub fn enabled(&self, entity: usize, component: usize) -> bool {
        match self.schema.components()[component].enable_index() {
            Some(index) => self.enabled_by_index(entity, index),
            None => true,
        }
    }

    pub fn set_enabled(&mut self, entity: usize, component: usize, enabled: bool) {
        let index = self.schema.components()[component]
            .enable_index()
            .expect("component is not optional");
        self.set_enabled_by_index(entity, index, enabled);
        self.data_version += 1;
    }

    pub fn enabled_by_index(&self, entity: usize, enable_index: usize) -> bool {
        self.enables
            .get(entity * self.schema.enable_bits() + enable_index)
    }

    /// Replication-internal enable write, no version bump.
    pub fn set_enabled_by_index(&mut self, entity: usize, enable_index: usize, enabled: bool) {
        self.enables
            .set(entity * self.schema.enable_bits() + enable_index, enabled);
    }

    /// Declare `len` storage-adjacent entities starting at `root` as
    /// one replication group. They serialize all-or-nothing.
    pub fn set_group(&mut self, root: usize, len: usize) {
        assert!(len >= 2 && len <= u8::MAX as usize);
        assert!(root + len <= self.len);
        self.group_run[root] = len as u8;
        for member in root + 1..root + len {
            self.group_run[member] = 0;
        }
        self.structure_version += 1;
    }

    /// Run length at `entity`: `1` ungrouped, `>= 2` a group root,
    /// `0` a group member.
    pub fn group_run(&self, entity: usize) -> usize {
        self.group_run[entity] as usize
    }

    pub fn has_groups(&self) -> bool {
        self.group_run.iter().any(|run| *run != 1)
    }

    pub fn is_predicted(&self, entity: usize) -> bool {
        self.predicted.get(entity)
    }

    pub fn set_predicted(&mut self, entity: usize, predicted: bool) {
        self.predicted.set(entity, predicted);
    }

    pub fn prespawned(&self) -> bool {
        self.prespawned
    }

    pub fn set_prespawned(&mut self, prespawned: bool) {
        self.prespawned = prespawned;
    }

    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    pub fn structure_version(&self) -> u64 {
        self.structure_version
    }
}
