//! Memory management for the motion core.
//!
//! Trajectories, waypoints and states are carved from a [`Region`] and
//! released in bulk once the trajectory is retired. [`Pool`] layers
//! fixed-size block reuse on top of a region.
pub mod pool;
pub mod region;

pub use pool::{BlockId, Pool, MIN_BLOCK_SIZE};
pub use region::{Mark, Region, REGION_ALIGN};
