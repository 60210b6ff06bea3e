use wraith_serde::{BitReader, BitSerde, BitWrite, StreamError, UnsignedVarInt};

/// Stable identity of a replicated entity. The `id` travels on the
/// wire; `generation` stays local and guards against a storage index
/// being reused for a different entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GhostId {
    pub id: u32,
    pub generation: u32,
}

impl GhostId {
    pub fn new(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }
}

impl BitSerde for GhostId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVarInt::<7>::new(self.id).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        let id = UnsignedVarInt::<7>::de(reader)?.get() as u32;
        // Generation is not transmitted; the receiver resolves it
        // against its own storage.
        Ok(Self { id, generation: 0 })
    }

    fn bit_length(&self) -> u32 {
        UnsignedVarInt::<7>::new(self.id).bit_length()
    }
}

/// Identifies one replicated archetype and its serialized layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GhostTypeId(pub u16);

impl BitSerde for GhostTypeId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVarInt::<5>::new(self.0).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, StreamError> {
        Ok(Self(UnsignedVarInt::<5>::de(reader)?.get() as u16))
    }

    fn bit_length(&self) -> u32 {
        UnsignedVarInt::<5>::new(self.0).bit_length()
    }
}

/// Identifies one storage block. Local only, never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
