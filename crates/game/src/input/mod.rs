mod codec;
mod entry;
mod log_ring;
mod pipe;

pub use codec::{pack, unpack, CodecError, BATCH_HEADER_SIZE, MAX_BATCH_ENTRIES};
pub use entry::{InputEntry, InputMask};
pub use log_ring::{InputLog, InputRecord, LogError, LogPush};
pub use pipe::{InputPipe, PipeError};
