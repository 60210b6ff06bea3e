use crate::tick::{tick_after, Tick};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickQueueError {
    /// Attempted to insert a second item for a tick already queued.
    #[error("duplicate tick {tick} not allowed in TickQueue")]
    DuplicateTick { tick: Tick },
}

/// A list of items kept sorted by wrapping tick order. Inserts scan
/// from the back, so near-ordered arrivals cost a constant probe.
pub struct TickQueue<T> {
    list: Vec<(Tick, T)>,
}

impl<T> TickQueue<T> {
    pub fn new() -> Self {
        Self { list: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// The oldest queued item, without removing it.
    pub fn front(&self) -> Option<&(Tick, T)> {
        self.list.first()
    }

    /// Remove and return the oldest queued item.
    pub fn pop_front(&mut self) -> Option<(Tick, T)> {
        if self.list.is_empty() {
            return None;
        }
        Some(self.list.remove(0))
    }

    /// Insert an item at its tick-ordered position, scanning from the
    /// back. A tick already present is rejected.
    pub fn try_insert(&mut self, tick: Tick, item: T) -> Result<(), TickQueueError> {
        let mut index = self.list.len();

        loop {
            if index == 0 {
                // made it all the way through, insert at front and be done
                self.list.insert(index, (tick, item));
                return Ok(());
            }

            index -= 1;

            let (old_tick, _) = &self.list[index];
            if *old_tick == tick {
                return Err(TickQueueError::DuplicateTick { tick });
            }
            if tick_after(tick, *old_tick) {
                self.list.insert(index + 1, (tick, item));
                return Ok(());
            }
        }
    }
}

impl<T> Default for TickQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
