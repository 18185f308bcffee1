use std::collections::VecDeque;

use glam::{Vec2, Vec3};

use crate::object::ObjectId;

use super::codec::{self, CodecError};
use super::entry::{InputEntry, InputMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PipeError {
    #[error("input pipe is full ({capacity} entries)")]
    Full { capacity: usize },
}

/// Hand-off buffer between the network path and the simulation.
///
/// Entries are kept sorted by descending timestamp. Entries sharing a
/// timestamp stay in insertion order, so `pull` yields the newest pending
/// input first and breaks ties first-in first-out.
#[derive(Debug)]
pub struct InputPipe {
    entries: VecDeque<InputEntry>,
    capacity: usize,
}

impl InputPipe {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(
        &mut self,
        object_id: ObjectId,
        timestamp: u32,
        mask: InputMask,
        movement: Option<Vec2>,
        direction: Option<Vec3>,
    ) -> Result<(), PipeError> {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.object_id == object_id && e.timestamp == timestamp)
        {
            existing.merge(mask, movement, direction);
            return Ok(());
        }

        if self.entries.len() >= self.capacity {
            return Err(PipeError::Full {
                capacity: self.capacity,
            });
        }

        let mut entry = InputEntry::new(object_id, timestamp);
        entry.merge(mask, movement, direction);

        let index = self.entries.partition_point(|e| e.timestamp >= timestamp);
        self.entries.insert(index, entry);
        Ok(())
    }

    /// Whether `push` for this object and timestamp would succeed.
    pub fn accepts(&self, object_id: ObjectId, timestamp: u32) -> bool {
        self.entries.len() < self.capacity
            || self
                .entries
                .iter()
                .any(|e| e.object_id == object_id && e.timestamp == timestamp)
    }

    pub fn push_entry(&mut self, entry: &InputEntry) -> Result<(), PipeError> {
        self.push(
            entry.object_id,
            entry.timestamp,
            entry.mask,
            Some(entry.movement),
            Some(entry.direction),
        )
    }

    pub fn pull(&mut self) -> Option<InputEntry> {
        self.entries.pop_front()
    }

    pub fn peek_timestamp(&self) -> Option<u32> {
        self.entries.front().map(|e| e.timestamp)
    }

    /// Drains every pending entry in ascending timestamp order, ready to be
    /// packed into a wire batch.
    pub fn take_batch(&mut self) -> Vec<InputEntry> {
        let mut batch: Vec<InputEntry> = self.entries.drain(..).collect();
        // Stable: equal timestamps stay in insertion order.
        batch.sort_by_key(|e| e.timestamp);
        batch
    }

    /// Packs the oldest pending entries into one wire batch and removes them.
    /// A batch ends before any gap too wide for the delta field, so the rest
    /// waits for the next call. `None` when nothing is queued. On error the
    /// pipe is left untouched.
    pub fn pack(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        let mut batch: Vec<InputEntry> = self.entries.iter().copied().collect();
        batch.sort_by_key(|e| e.timestamp);
        let split = batch_len(&batch);
        let bytes = codec::pack(&batch[..split])?;

        self.entries.clear();
        for entry in batch.drain(split..) {
            let index = self.entries.partition_point(|e| e.timestamp >= entry.timestamp);
            self.entries.insert(index, entry);
        }
        Ok(Some(bytes))
    }

    /// Decodes a batch and queues its entries. A malformed batch queues
    /// nothing; entries that no longer fit are handed back.
    pub fn unpack(&mut self, data: &[u8]) -> Result<Vec<InputEntry>, CodecError> {
        let (entries, _) = codec::unpack(data)?;
        Ok(entries
            .into_iter()
            .filter(|entry| self.push_entry(entry).is_err())
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Length of the leading run of `batch` (ascending) that fits one wire batch.
fn batch_len(batch: &[InputEntry]) -> usize {
    let limit = batch.len().min(codec::MAX_BATCH_ENTRIES);
    (1..limit)
        .find(|&i| batch[i].timestamp - batch[i - 1].timestamp > u32::from(u16::MAX))
        .unwrap_or(limit)
}
