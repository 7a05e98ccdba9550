//! Force-directed layout: parameter derivation, the simulator and its
//! optional worker thread.

mod forces;
mod params;
mod quadtree;
mod simulator;
mod worker;

pub use params::{ForceParameters, LARGE_GRAPH_ITERATIONS, optimize};
pub use simulator::{LayoutSimulator, SettleProgress, SimulationState, StepOutcome};
pub use worker::{DragPhase, LayoutSnapshot, LayoutWorker};
