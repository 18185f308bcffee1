use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::entry::{InputEntry, InputMask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    #[error("input at {timestamp} is older than the full log's oldest entry {oldest}")]
    Stale { timestamp: u32, oldest: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPush {
    Appended,
    Inserted,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub timestamp: u32,
    pub mask: InputMask,
    pub movement: Vec2,
    pub direction: Vec3,
}

impl InputRecord {
    fn new(timestamp: u32) -> Self {
        Self {
            timestamp,
            mask: InputMask::empty(),
            movement: Vec2::ZERO,
            direction: Vec3::ZERO,
        }
    }

    fn merge(&mut self, mask: InputMask, movement: Option<Vec2>, direction: Option<Vec3>) {
        self.mask |= mask;
        if let (true, Some(movement)) = (mask.contains(InputMask::MOVEMENT), movement) {
            self.movement = movement;
        }
        if let (true, Some(direction)) = (mask.contains(InputMask::DIRECTION), direction) {
            self.direction = direction;
        }
    }
}

impl From<&InputEntry> for InputRecord {
    fn from(entry: &InputEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            mask: entry.mask,
            movement: entry.movement,
            direction: entry.direction,
        }
    }
}

/// Per-object ring of input records in strictly ascending timestamp order.
///
/// Late records are inserted at their chronological position. The earliest
/// timestamp touched since the last [`InputLog::take_earliest_change`] tells
/// the integrator where re-simulation has to start.
#[derive(Debug, Clone)]
pub struct InputLog {
    entries: VecDeque<InputRecord>,
    capacity: usize,
    earliest_change: Option<u32>,
}

impl InputLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            earliest_change: None,
        }
    }

    pub fn push(
        &mut self,
        timestamp: u32,
        mask: InputMask,
        movement: Option<Vec2>,
        direction: Option<Vec3>,
    ) -> Result<LogPush, LogError> {
        // Walk back from the tail; late input usually lands near it.
        let mut index = self.entries.len();
        while index > 0 {
            let previous = &mut self.entries[index - 1];
            if previous.timestamp == timestamp {
                previous.merge(mask, movement, direction);
                self.mark_changed(timestamp);
                return Ok(LogPush::Merged);
            }
            if previous.timestamp < timestamp {
                break;
            }
            index -= 1;
        }

        let mut record = InputRecord::new(timestamp);
        record.merge(mask, movement, direction);

        let outcome = if index == self.entries.len() {
            if self.entries.len() >= self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back(record);
            LogPush::Appended
        } else {
            if self.entries.len() >= self.capacity {
                if index == 0 {
                    return Err(LogError::Stale {
                        timestamp,
                        oldest: self.entries[0].timestamp,
                    });
                }
                self.entries.pop_front();
                index -= 1;
            }
            self.entries.insert(index, record);
            LogPush::Inserted
        };

        self.mark_changed(timestamp);
        Ok(outcome)
    }

    pub fn push_entry(&mut self, entry: &InputEntry) -> Result<LogPush, LogError> {
        self.push(
            entry.timestamp,
            entry.mask,
            Some(entry.movement),
            Some(entry.direction),
        )
    }

    /// Records at or after `cursor`, oldest first. Calling it again restarts
    /// the walk.
    pub fn iterate_from(&self, cursor: u32) -> impl Iterator<Item = &InputRecord> + '_ {
        let start = self.entries.partition_point(|e| e.timestamp < cursor);
        self.entries.range(start..)
    }

    pub fn earliest_change(&self) -> Option<u32> {
        self.earliest_change
    }

    pub fn take_earliest_change(&mut self) -> Option<u32> {
        self.earliest_change.take()
    }

    pub fn oldest_timestamp(&self) -> Option<u32> {
        self.entries.front().map(|e| e.timestamp)
    }

    pub fn newest_timestamp(&self) -> Option<u32> {
        self.entries.back().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.earliest_change = None;
    }

    fn mark_changed(&mut self, timestamp: u32) {
        self.earliest_change = Some(match self.earliest_change {
            Some(earliest) => earliest.min(timestamp),
            None => timestamp,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_move(log: &mut InputLog, ts: u32, x: f32) -> Result<LogPush, LogError> {
        log.push(ts, InputMask::MOVEMENT, Some(Vec2::new(x, 0.0)), None)
    }

    fn stamps(log: &InputLog, cursor: u32) -> Vec<u32> {
        log.iterate_from(cursor).map(|r| r.timestamp).collect()
    }

    #[test]
    fn late_entry_lands_in_order() {
        let mut log = InputLog::new(16);
        assert_eq!(push_move(&mut log, 10, 1.0), Ok(LogPush::Appended));
        assert_eq!(push_move(&mut log, 30, 1.0), Ok(LogPush::Appended));
        assert_eq!(push_move(&mut log, 20, 1.0), Ok(LogPush::Inserted));

        assert_eq!(stamps(&log, 0), vec![10, 20, 30]);
    }

    #[test]
    fn iterate_from_is_restartable() {
        let mut log = InputLog::new(16);
        for ts in [0, 20, 40, 60] {
            push_move(&mut log, ts, 1.0).unwrap();
        }

        assert_eq!(stamps(&log, 25), vec![40, 60]);
        assert_eq!(stamps(&log, 40), vec![40, 60]);
        assert_eq!(stamps(&log, 25), vec![40, 60]);
        assert!(stamps(&log, 61).is_empty());
    }

    #[test]
    fn same_timestamp_merges_channels() {
        let mut log = InputLog::new(4);
        push_move(&mut log, 40, 1.0).unwrap();
        assert_eq!(
            log.push(40, InputMask::DIRECTION, None, Some(Vec3::X)),
            Ok(LogPush::Merged)
        );

        let record = log.iterate_from(0).next().unwrap();
        assert_eq!(record.mask, InputMask::MOVEMENT | InputMask::DIRECTION);
        assert_eq!(record.movement.x, 1.0);
        assert_eq!(record.direction, Vec3::X);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn full_ring_evicts_oldest() {
        let mut log = InputLog::new(3);
        for ts in [0, 20, 40] {
            push_move(&mut log, ts, 1.0).unwrap();
        }

        push_move(&mut log, 60, 1.0).unwrap();
        assert_eq!(stamps(&log, 0), vec![20, 40, 60]);

        push_move(&mut log, 30, 1.0).unwrap();
        assert_eq!(stamps(&log, 0), vec![30, 40, 60]);

        assert_eq!(
            push_move(&mut log, 10, 1.0),
            Err(LogError::Stale {
                timestamp: 10,
                oldest: 30
            })
        );
    }

    #[test]
    fn tracks_earliest_change_between_steps() {
        let mut log = InputLog::new(16);
        push_move(&mut log, 100, 1.0).unwrap();
        push_move(&mut log, 60, 1.0).unwrap();
        push_move(&mut log, 80, 1.0).unwrap();

        assert_eq!(log.take_earliest_change(), Some(60));
        assert_eq!(log.take_earliest_change(), None);

        log.push(100, InputMask::DIRECTION, None, Some(Vec3::Y)).unwrap();
        assert_eq!(log.earliest_change(), Some(100));
    }
}
