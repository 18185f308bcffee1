use glam::{Vec2, Vec3};

use super::entry::{InputEntry, InputMask};

/// `base_timestamp` (4) + `count` (2).
pub const BATCH_HEADER_SIZE: usize = 6;
pub const MAX_BATCH_ENTRIES: usize = u16::MAX as usize;

const ENTRY_HEADER_SIZE: usize = 4 + 1 + 2;
const MOVEMENT_SIZE: usize = 2 * 4;
const DIRECTION_SIZE: usize = 3 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("batch contains no entries")]
    EmptyBatch,
    #[error("batch holds {0} entries, more than the count field can express")]
    TooManyEntries(usize),
    #[error("entry {index} is {delta} ms after its predecessor, outside the delta field")]
    DeltaOutOfRange { index: usize, delta: i64 },
    #[error("batch truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("entry {index} carries unknown sub-mask bits {bits:#04x}")]
    UnknownMask { index: usize, bits: u8 },
    #[error("entry {index} timestamp overflows")]
    TimestampOverflow { index: usize },
}

fn entry_size(mask: InputMask) -> usize {
    let mut size = ENTRY_HEADER_SIZE;
    if mask.contains(InputMask::MOVEMENT) {
        size += MOVEMENT_SIZE;
    }
    if mask.contains(InputMask::DIRECTION) {
        size += DIRECTION_SIZE;
    }
    size
}

/// Encodes a batch. Each entry stores its timestamp as an unsigned 16-bit
/// delta from the previous entry, so the batch must be in non-decreasing
/// timestamp order with gaps no larger than `u16::MAX` ms.
pub fn pack(entries: &[InputEntry]) -> Result<Vec<u8>, CodecError> {
    let first = entries.first().ok_or(CodecError::EmptyBatch)?;
    if entries.len() > MAX_BATCH_ENTRIES {
        return Err(CodecError::TooManyEntries(entries.len()));
    }

    let size = BATCH_HEADER_SIZE + entries.iter().map(|e| entry_size(e.mask)).sum::<usize>();
    let mut buf = Vec::with_capacity(size);

    let base = first.timestamp;
    buf.extend_from_slice(&base.to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());

    let mut previous = base;
    for (index, entry) in entries.iter().enumerate() {
        let delta = i64::from(entry.timestamp) - i64::from(previous);
        let delta = u16::try_from(delta).map_err(|_| CodecError::DeltaOutOfRange { index, delta })?;
        previous = entry.timestamp;

        buf.extend_from_slice(&entry.object_id.to_le_bytes());
        buf.push(entry.mask.bits());
        buf.extend_from_slice(&delta.to_le_bytes());

        if entry.has(InputMask::MOVEMENT) {
            for v in entry.movement.to_array() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        if entry.has(InputMask::DIRECTION) {
            for v in entry.direction.to_array() {
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    Ok(buf)
}

/// Decodes a batch, returning the entries and the number of bytes consumed.
/// Any malformed field aborts the whole batch.
pub fn unpack(data: &[u8]) -> Result<(Vec<InputEntry>, usize), CodecError> {
    let mut reader = Reader::new(data);

    let base = reader.u32()?;
    let count = reader.u16()? as usize;
    if count == 0 {
        return Err(CodecError::EmptyBatch);
    }

    let mut entries = Vec::with_capacity(count);
    let mut timestamp = base;
    for index in 0..count {
        let object_id = reader.u32()?;
        let bits = reader.u8()?;
        let mask = InputMask::from_bits(bits).ok_or(CodecError::UnknownMask { index, bits })?;
        let delta = reader.u16()?;
        timestamp = timestamp
            .checked_add(u32::from(delta))
            .ok_or(CodecError::TimestampOverflow { index })?;

        let mut entry = InputEntry::new(object_id, timestamp);
        entry.mask = mask;
        if mask.contains(InputMask::MOVEMENT) {
            entry.movement = Vec2::new(reader.f32()?, reader.f32()?);
        }
        if mask.contains(InputMask::DIRECTION) {
            entry.direction = Vec3::new(reader.f32()?, reader.f32()?, reader.f32()?);
        }
        entries.push(entry);
    }

    Ok((entries, reader.offset))
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let end = self.offset + N;
        let bytes = self.data.get(self.offset..end).ok_or(CodecError::Truncated {
            needed: end,
            available: self.data.len(),
        })?;
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        self.take().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.take().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        self.take().map(f32::from_le_bytes)
    }
}
