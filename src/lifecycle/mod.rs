//! Lifecycle management for Prometheus components

use std::any::Any;

use tracing::info;

use crate::error::MotionError;

/// Trait for components that follow a lifecycle pattern
///
/// Components own regions, which are not shareable between threads, so
/// nodes only need to be `Send`.
pub trait LifecycleNode: Send {
    /// Configure the node
    fn on_configure(&mut self) -> Result<(), MotionError>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<(), MotionError>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<(), MotionError>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<(), MotionError>;

    /// Convert to Any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: NodeState,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unconfigured,
    Inactive,
    Active,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: NodeState::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> NodeState {
        self.state
    }

    /// Set the state
    pub fn set_state(&mut self, state: NodeState) {
        info!(node = %self.name, from = ?self.state, to = ?state, "lifecycle transition");
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_follows_the_configure_activate_cycle() {
        let mut base = LifecycleNodeBase::new("node");
        assert_eq!(base.get_state(), NodeState::Unconfigured);
        for state in [
            NodeState::Inactive,
            NodeState::Active,
            NodeState::Inactive,
            NodeState::Unconfigured,
        ] {
            base.set_state(state);
            assert_eq!(base.get_state(), state);
        }
    }
}
