mod config;
mod context;
mod integrator;
mod tick;

pub use config::SimConfig;
pub use context::{Phase, Simulation, StepReport};
pub use integrator::{Integrator, Obstacles, TickOutcome};
pub use tick::TickClock;
