use thiserror::Error;

use crate::collision::MeshError;
use crate::input::{CodecError, LogError, PipeError};
use crate::object::{SnapshotError, TableError};
use crate::world::TerrainError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Pipe(#[from] PipeError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("replicated record is missing id, mask or position")]
    IncompleteRecord,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
