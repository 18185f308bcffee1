mod history;
mod mask;
mod snapshot;
mod state;
mod table;

pub use history::StateHistory;
pub use mask::ObjectMask;
pub use snapshot::{ArchivedObjectSnapshot, Attributes, ObjectRecord, ObjectSnapshot, SnapshotError};
pub use state::{Marker, Object, ObjectId, ObjectSpawn, ObjectState, RigState, MAX_PAYLOAD};
pub use table::{ObjectHandle, ObjectTable, TableError, OBJECT_SLOTS};
