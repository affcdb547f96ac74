pub mod boundedness;
pub mod reachability;
pub mod simulation;
pub mod state_space;

pub use boundedness::{
    Analysis, BoundednessAnalyzer, BoundednessResult, Witness, check_boundedness,
};
pub use reachability::{FiringStep, ReachabilityEdge, ReachabilityGraph, ReachabilityNode};
pub use simulation::{Simulation, SimulationError};
pub use state_space::{StateSpace, StateSpaceConfig, StateSpaceStats};
