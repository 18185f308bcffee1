pub mod collision;
pub mod error;
pub mod input;
pub mod model;
pub mod object;
pub mod render;
pub mod simulation;
pub mod world;

pub use collision::{
    Aabb, CollisionMesh, CollisionResolver, Ellipsoid, MAX_SLIDE_ITERATIONS, MeshError,
    Resolution, Triangle, VERY_CLOSE_DISTANCE,
};
pub use error::{Error, Result};
pub use input::{
    CodecError, InputEntry, InputLog, InputMask, InputPipe, InputRecord, LogError, LogPush,
    PipeError, pack, unpack,
};
pub use model::{CollisionModel, ModelId, ModelRegistry};
pub use object::{
    Attributes, Marker, OBJECT_SLOTS, Object, ObjectHandle, ObjectId, ObjectMask, ObjectRecord,
    ObjectSnapshot, ObjectSpawn, ObjectState, ObjectTable, RigState, SnapshotError, TableError,
};
pub use render::{RenderInterpolator, RenderTransform};
pub use simulation::{Phase, SimConfig, Simulation, StepReport, TickClock};
pub use world::{HeightMap, TerrainError, World, WorldBounds};
