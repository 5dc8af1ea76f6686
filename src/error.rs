//! Error types for the motion core.
//!
//! Allocator misuse that the borrow checker cannot rule out (popping to a
//! stale mark, freeing a block twice) is reported through `RegionError` and
//! `PoolError`. Trajectory generation and checking failures are recoverable
//! and surface as `TrajectoryError`.

use thiserror::Error;

/// Errors reported by checked region operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// The mark refers to a chunk that was freed by an earlier pop or release.
    #[error("mark refers to chunk {chunk}, which this region no longer owns")]
    UnknownChunk {
        /// Identifier of the missing chunk.
        chunk: u64,
    },

    /// The mark lies above the committed high-water mark of its chunk.
    #[error("mark offset {offset} is past the committed high-water mark {head}")]
    BeyondHead {
        /// Offset of the mark inside its chunk.
        offset: usize,
        /// Committed bytes in that chunk.
        head: usize,
    },

    /// The mark is not on an allocation boundary.
    #[error("mark offset {offset} is not on a {align}-byte allocation boundary")]
    Misaligned {
        /// Offset of the mark inside its chunk.
        offset: usize,
        /// Alignment every allocation starts on.
        align: usize,
    },

    /// The address does not belong to any live chunk of this region.
    #[error("address does not belong to any chunk of this region")]
    ForeignPointer,
}

/// Errors reported by pool block operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The block id was never issued by this pool, or the pool was released.
    #[error("block {block} was not issued by this pool")]
    UnknownBlock {
        /// Index of the block.
        block: usize,
    },

    /// The block is currently on the free list.
    #[error("block {block} is not live")]
    NotLive {
        /// Index of the block.
        block: usize,
    },

    /// The handle belongs to an earlier hand-out of a reused slot.
    #[error("handle to block {block} is stale")]
    Stale {
        /// Index of the block.
        block: usize,
    },
}

/// Errors reported while building, evaluating or checking trajectories.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrajectoryError {
    /// A boundary state was required but the waypoint list is empty.
    #[error("waypoint list is empty")]
    EmptyWaypoints,

    /// Two pieces of data that must agree on a dimension do not.
    #[error("{what}: expected {expected} values, found {found}")]
    DimensionMismatch {
        /// What was being compared.
        what: &'static str,
        /// The dimension implied by the trajectory.
        expected: usize,
        /// The dimension actually supplied.
        found: usize,
    },

    /// A waypoint or limit contains NaN or infinity.
    #[error("{what} contains a non-finite value")]
    NonFinite {
        /// Which input was rejected.
        what: &'static str,
    },

    /// A bound makes the trajectory impossible to build.
    #[error("axis {axis} is infeasible: {reason}")]
    Infeasible {
        /// The offending axis.
        axis: usize,
        /// Why the bound was rejected.
        reason: &'static str,
    },

    /// Leg durations kept growing without fitting every blend.
    #[error("blend fitting did not converge within {iterations} iterations")]
    BlendDidNotConverge {
        /// Iterations spent before giving up.
        iterations: usize,
    },

    /// A continuity check found a jump larger than allowed.
    #[error("position jumps by {gap} at t = {time} (allowed {tolerance})")]
    Discontinuity {
        /// Time of the offending sample or boundary.
        time: f64,
        /// Measured distance.
        gap: f64,
        /// Allowed distance.
        tolerance: f64,
    },

    /// A configuration parameter or call argument is out of range.
    #[error("invalid value {value} for parameter `{name}`")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Rejected value.
        value: f64,
    },
}

/// Top-level error for the control layer and the component registry.
#[derive(Error, Debug)]
pub enum MotionError {
    /// Region misuse.
    #[error(transparent)]
    Region(#[from] RegionError),

    /// Pool misuse.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Trajectory generation or checking failed.
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    /// A component was used before `on_configure` or after `on_cleanup`.
    #[error("component `{0}` is not configured")]
    NotConfigured(String),
}
