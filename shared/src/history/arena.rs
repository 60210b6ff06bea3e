/// Append-only byte arena addressed by `(offset, len)` handles. Backs
/// the variable-length component payloads of one history slot; cleared
/// wholesale when the slot is recycled.
#[derive(Debug, Default, Clone)]
pub struct ByteArena {
    bytes: Vec<u8>,
}

impl ByteArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.bytes.reserve(additional);
    }

    /// Append `data`, returning its handle.
    pub fn push(&mut self, data: &[u8]) -> (u32, u32) {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(data);
        (offset, data.len() as u32)
    }

    pub fn get(&self, offset: u32, len: u32) -> &[u8] {
        &self.bytes[offset as usize..(offset + len) as usize]
    }
}
