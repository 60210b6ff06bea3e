//! Serialized-layout descriptors. A descriptor is built once per ghost
//! type from its component list; everything downstream (record shape,
//! mask offsets, wire order) is derived here and then only indexed.

mod codec;

pub use codec::{
    BufferCodec, CodecLayout, ComponentCodec, DeltaPredictor, IntCodec, QuantizedFloatCodec,
    QuantizedVec3Codec,
};

use std::{collections::HashMap, ops::Range, sync::Arc};

use crate::{ghost::GhostTypeId, tick::Tick};

/// Input to [`SchemaDescriptor::build`]: one replicated component.
pub struct ComponentDef {
    pub name: String,
    pub codec: Arc<dyn ComponentCodec>,
    /// Optional components get an enable bit; while disabled their
    /// values are withheld from the wire.
    pub optional: bool,
}

impl ComponentDef {
    pub fn new(name: &str, codec: Arc<dyn ComponentCodec>) -> Self {
        Self {
            name: name.to_string(),
            codec,
            optional: false,
        }
    }

    pub fn optional(name: &str, codec: Arc<dyn ComponentCodec>) -> Self {
        Self {
            name: name.to_string(),
            codec,
            optional: true,
        }
    }
}

/// One component's resolved place inside a record.
pub struct ComponentSchema {
    pub name: String,
    pub codec: Arc<dyn ComponentCodec>,
    pub layout: CodecLayout,
    mask_shift: u16,
    word_offset: u16,
    enable_index: Option<u16>,
}

impl ComponentSchema {
    /// Index of this component's first change-mask bit.
    pub fn mask_shift(&self) -> usize {
        self.mask_shift as usize
    }

    /// Offset of this component's words within the field-word region.
    pub fn word_offset(&self) -> usize {
        self.word_offset as usize
    }

    pub fn word_range(&self) -> Range<usize> {
        self.word_offset()..self.word_offset() + self.layout.words as usize
    }

    /// Enable-bit index, present iff the component is optional.
    pub fn enable_index(&self) -> Option<usize> {
        self.enable_index.map(|index| index as usize)
    }
}

/// Resolved wire and record layout for one ghost type.
///
/// Record layout, in `u32` words:
/// `[tick][change-mask words][enable words][field words]`.
pub struct SchemaDescriptor {
    type_id: GhostTypeId,
    size_prefixed: bool,
    components: Vec<ComponentSchema>,
    mask_bits: u16,
    mask_words: u16,
    enable_bits: u16,
    enable_words: u16,
    field_words: u16,
    has_buffers: bool,
    predict_words: Vec<bool>,
}

impl SchemaDescriptor {
    pub fn build(type_id: GhostTypeId, size_prefixed: bool, defs: Vec<ComponentDef>) -> Self {
        assert!(!defs.is_empty(), "a ghost type needs at least one component");

        let mut components = Vec::with_capacity(defs.len());
        let mut mask_bits = 0u16;
        let mut enable_bits = 0u16;
        let mut field_words = 0u16;
        let mut has_buffers = false;
        let mut predict_words = Vec::new();

        for def in defs {
            let layout = def.codec.layout();
            assert!(layout.mask_bits >= 1 && layout.mask_bits <= 32);
            assert!(layout.words >= 1);
            has_buffers |= layout.buffer;

            let enable_index = if def.optional {
                let index = enable_bits;
                enable_bits += 1;
                Some(index)
            } else {
                None
            };

            components.push(ComponentSchema {
                name: def.name,
                codec: def.codec,
                layout,
                mask_shift: mask_bits,
                word_offset: field_words,
                enable_index,
            });

            mask_bits += layout.mask_bits as u16;
            field_words += layout.words as u16;
            for _ in 0..layout.words {
                predict_words.push(layout.predict);
            }
        }

        Self {
            type_id,
            size_prefixed,
            components,
            mask_bits,
            mask_words: mask_bits.div_ceil(32),
            enable_bits,
            enable_words: enable_bits.div_ceil(32),
            field_words,
            has_buffers,
            predict_words,
        }
    }

    pub fn type_id(&self) -> GhostTypeId {
        self.type_id
    }

    pub fn size_prefixed(&self) -> bool {
        self.size_prefixed
    }

    pub fn components(&self) -> &[ComponentSchema] {
        &self.components
    }

    pub fn mask_bits(&self) -> usize {
        self.mask_bits as usize
    }

    pub fn mask_words(&self) -> usize {
        self.mask_words as usize
    }

    pub fn enable_bits(&self) -> usize {
        self.enable_bits as usize
    }

    pub fn enable_words(&self) -> usize {
        self.enable_words as usize
    }

    pub fn field_words(&self) -> usize {
        self.field_words as usize
    }

    pub fn has_buffers(&self) -> bool {
        self.has_buffers
    }

    /// Whether the word at `index` (within the field-word region) may
    /// be run through the [`DeltaPredictor`].
    pub fn predict_word(&self, index: usize) -> bool {
        self.predict_words[index]
    }

    /// Total words of one record: tick word + masks + enables + fields.
    pub fn record_words(&self) -> usize {
        1 + self.mask_words() + self.enable_words() + self.field_words()
    }

    pub const TICK_WORD: usize = 0;

    pub fn mask_word_range(&self) -> Range<usize> {
        1..1 + self.mask_words()
    }

    pub fn enable_word_range(&self) -> Range<usize> {
        let start = 1 + self.mask_words();
        start..start + self.enable_words()
    }

    pub fn field_word_range(&self) -> Range<usize> {
        let start = 1 + self.mask_words() + self.enable_words();
        start..start + self.field_words()
    }

    /// Total dynamic payload bytes a record carries, summed over its
    /// buffer components' length words.
    pub fn dynamic_size(&self, record: &[u32]) -> i64 {
        let field_start = self.field_word_range().start;
        let mut total = 0i64;
        for component in &self.components {
            if component.layout.buffer {
                total += record[field_start + component.word_range().start] as i64;
            }
        }
        total
    }
}

/// Fill `out` with the receiver-reconstructible prediction of each
/// field word, given 1..=3 baseline field-word slices, newest first.
/// Words whose codec opts out of prediction copy the primary baseline.
pub fn build_predicted(
    descriptor: &SchemaDescriptor,
    target: Tick,
    baseline_ticks: &[Tick],
    baseline_fields: &[&[u32]],
    out: &mut [u32],
) {
    debug_assert_eq!(baseline_ticks.len(), baseline_fields.len());
    debug_assert_eq!(out.len(), descriptor.field_words());

    let predictor = DeltaPredictor::new(target, baseline_ticks);
    let count = baseline_fields.len();
    for word in 0..out.len() {
        let b0 = baseline_fields[0][word];
        out[word] = if count >= 2 && descriptor.predict_word(word) {
            let b1 = baseline_fields[1][word];
            let b2 = if count >= 3 { baseline_fields[2][word] } else { 0 };
            predictor.predict(b0, b1, b2)
        } else {
            b0
        };
    }
}

/// Lookup table from ghost type to descriptor. The size-prefix setting
/// is uniform across the protocol so that batches of unknown types can
/// still be skipped.
pub struct SchemaRegistry {
    size_prefixed: bool,
    schemas: HashMap<GhostTypeId, Arc<SchemaDescriptor>>,
}

impl SchemaRegistry {
    pub fn new(size_prefixed: bool) -> Self {
        Self {
            size_prefixed,
            schemas: HashMap::new(),
        }
    }

    pub fn add(&mut self, descriptor: Arc<SchemaDescriptor>) {
        assert_eq!(
            descriptor.size_prefixed(),
            self.size_prefixed,
            "size-prefix setting must be uniform across the protocol"
        );
        let previous = self.schemas.insert(descriptor.type_id(), descriptor);
        assert!(previous.is_none(), "duplicate ghost type registration");
    }

    pub fn get(&self, type_id: GhostTypeId) -> Option<&Arc<SchemaDescriptor>> {
        self.schemas.get(&type_id)
    }

    pub fn size_prefixed(&self) -> bool {
        self.size_prefixed
    }
}
