//! Region-backed waypoint list.

use std::cell::Cell;

use crate::error::TrajectoryError;
use crate::memory::Region;
use crate::state::State;

/// One node of a [`WaypointList`].
#[derive(Debug)]
pub struct Waypoint<'r> {
    state: State<'r>,
    next: Cell<Option<&'r Waypoint<'r>>>,
}

impl<'r> Waypoint<'r> {
    /// The waypoint's state.
    pub fn state(&self) -> &State<'r> {
        &self.state
    }
}

/// Ordered list of states a trajectory passes through.
///
/// Points are deep-copied into the list's region when added; the first and
/// last are the trajectory's boundary conditions.
#[derive(Debug)]
pub struct WaypointList<'r> {
    region: &'r Region,
    head: Option<&'r Waypoint<'r>>,
    tail: Option<&'r Waypoint<'r>>,
    len: usize,
}

impl<'r> WaypointList<'r> {
    /// Create an empty list allocating from `region`.
    pub fn new(region: &'r Region) -> Self {
        WaypointList {
            region,
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Append a copy of `state`.
    ///
    /// Every point must have the joint count and pose layout of the first.
    pub fn add(&mut self, state: &State<'_>) -> Result<(), TrajectoryError> {
        if let Some(first) = self.head {
            let first = &first.state;
            for (what, expected, found) in [
                ("waypoint joint count", first.n_q, state.n_q),
                ("waypoint joint positions", first.q.len(), state.q.len()),
                ("waypoint pose", first.x.len(), state.x.len()),
            ] {
                if expected != found {
                    return Err(TrajectoryError::DimensionMismatch {
                        what,
                        expected,
                        found,
                    });
                }
            }
        }

        let node: &'r Waypoint<'r> = self.region.alloc_value(Waypoint {
            state: state.clone_in(self.region),
            next: Cell::new(None),
        });
        match self.tail {
            Some(tail) => tail.next.set(Some(node)),
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
        Ok(())
    }

    /// The first point.
    pub fn start_state(&self) -> Result<&'r State<'r>, TrajectoryError> {
        self.head
            .map(|w| &w.state)
            .ok_or(TrajectoryError::EmptyWaypoints)
    }

    /// The last point.
    pub fn final_state(&self) -> Result<&'r State<'r>, TrajectoryError> {
        self.tail
            .map(|w| &w.state)
            .ok_or(TrajectoryError::EmptyWaypoints)
    }

    /// Points in insertion order.
    pub fn iter(&self) -> Iter<'r> {
        Iter { next: self.head }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Iterator over the states of a [`WaypointList`].
#[derive(Debug, Clone)]
pub struct Iter<'r> {
    next: Option<&'r Waypoint<'r>>,
}

impl<'r> Iterator for Iter<'r> {
    type Item = &'r State<'r>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.get();
        Some(&node.state)
    }
}

impl<'a, 'r> IntoIterator for &'a WaypointList<'r> {
    type Item = &'r State<'r>;
    type IntoIter = Iter<'r>;

    fn into_iter(self) -> Iter<'r> {
        self.iter()
    }
}
