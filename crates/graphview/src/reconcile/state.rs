//! Per-node interaction state.
//!
//! Whether a node's position may be driven by the snapshot depends on what
//! is currently happening to it: the user may be holding it, a layout may
//! own it, or one of our own animations may be moving it. Each node id maps
//! to one [`NodeState`]; ids without an entry are [`NodeState::Idle`].

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use log::trace;

use graphview_core::{geometry::Point, identifier::ElementId};

/// What currently controls a node's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeState {
    Idle,
    /// Held by the user's pointer.
    UserDragging,
    /// Positioned by a running (or just finished) layout.
    LayoutHeld,
    /// Moving towards `target` under a reconciler animation.
    Animating { target: Point },
    /// A ghost entering towards `target`.
    GhostEntering { target: Point },
}

impl NodeState {
    /// Whether snapshot position changes must leave the node alone.
    pub fn is_held(self) -> bool {
        matches!(self, Self::UserDragging | Self::LayoutHeld)
    }
}

/// Arena of [`NodeState`] keyed by node id.
///
/// Interior mutability lets animation completions, which outlive the
/// reconciliation pass that scheduled them, return their node to idle.
#[derive(Debug, Default)]
pub struct NodeStateArena {
    states: RefCell<HashMap<ElementId, NodeState>>,
    layout_done: Cell<bool>,
}

impl NodeStateArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: ElementId) -> NodeState {
        self.states
            .borrow()
            .get(&id)
            .copied()
            .unwrap_or(NodeState::Idle)
    }

    pub fn is_held(&self, id: ElementId) -> bool {
        self.state(id).is_held()
    }

    fn set(&self, id: ElementId, state: NodeState) {
        trace!(id = id.to_string(), state:?; "Node state");
        let mut states = self.states.borrow_mut();
        if state == NodeState::Idle {
            states.remove(&id);
        } else {
            states.insert(id, state);
        }
    }

    /// The user grabbed the node.
    pub fn grab(&self, id: ElementId) {
        self.set(id, NodeState::UserDragging);
    }

    /// The user released the node.
    pub fn free(&self, id: ElementId) {
        if self.state(id) == NodeState::UserDragging {
            self.set(id, NodeState::Idle);
        }
    }

    /// A layout takes ownership of `ids` until it stops and their next
    /// position change has been observed.
    pub fn hold_for_layout(&self, ids: impl IntoIterator<Item = ElementId>) {
        self.layout_done.set(false);
        for id in ids {
            self.set(id, NodeState::LayoutHeld);
        }
    }

    pub fn layout_stopped(&self) {
        self.layout_done.set(true);
    }

    pub fn is_layout_done(&self) -> bool {
        self.layout_done.get()
    }

    /// Releases a layout-held node once the layout has stopped.
    ///
    /// Returns whether the node was released.
    pub fn release_after_layout(&self, id: ElementId) -> bool {
        if self.layout_done.get() && self.state(id) == NodeState::LayoutHeld {
            self.set(id, NodeState::Idle);
            true
        } else {
            false
        }
    }

    pub fn start_animation(&self, id: ElementId, target: Point) {
        self.set(id, NodeState::Animating { target });
    }

    pub fn start_ghost(&self, id: ElementId, target: Point) {
        self.set(id, NodeState::GhostEntering { target });
    }

    pub fn is_ghost_entering_to(&self, id: ElementId, target: Point) -> bool {
        self.state(id) == NodeState::GhostEntering { target }
    }

    /// An animation towards `target` completed.
    ///
    /// A node retargeted since is left alone.
    pub fn finish(&self, id: ElementId, target: Point) {
        match self.state(id) {
            NodeState::Animating { target: current } | NodeState::GhostEntering { target: current }
                if current == target =>
            {
                self.set(id, NodeState::Idle);
            }
            _ => {}
        }
    }

    /// Forgets a removed node.
    pub fn remove(&self, id: ElementId) {
        self.states.borrow_mut().remove(&id);
    }

    /// Ids in the given state, for diagnostics and tests.
    pub fn count_where(&self, predicate: impl Fn(NodeState) -> bool) -> usize {
        self.states
            .borrow()
            .values()
            .filter(|state| predicate(**state))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_nodes_are_idle() {
        let arena = NodeStateArena::new();
        assert_eq!(arena.state(ElementId::new("nobody")), NodeState::Idle);
    }

    #[test]
    fn test_grab_and_free() {
        let arena = NodeStateArena::new();
        let id = ElementId::new("v1");
        arena.grab(id);
        assert!(arena.is_held(id));
        arena.free(id);
        assert_eq!(arena.state(id), NodeState::Idle);
    }

    #[test]
    fn test_free_does_not_clear_other_states() {
        let arena = NodeStateArena::new();
        let id = ElementId::new("v1");
        arena.hold_for_layout([id]);
        arena.free(id);
        assert_eq!(arena.state(id), NodeState::LayoutHeld);
    }

    #[test]
    fn test_layout_release_requires_stop() {
        let arena = NodeStateArena::new();
        let id = ElementId::new("v1");
        arena.hold_for_layout([id]);
        assert!(!arena.release_after_layout(id));
        arena.layout_stopped();
        assert!(arena.release_after_layout(id));
        assert_eq!(arena.state(id), NodeState::Idle);
    }

    #[test]
    fn test_stale_completion_keeps_new_target() {
        let arena = NodeStateArena::new();
        let id = ElementId::new("v1");
        let first = Point::new(10.0, 10.0);
        let second = Point::new(50.0, 50.0);

        arena.start_animation(id, first);
        arena.start_animation(id, second);
        arena.finish(id, first);
        assert_eq!(arena.state(id), NodeState::Animating { target: second });
        arena.finish(id, second);
        assert_eq!(arena.state(id), NodeState::Idle);
    }

    #[test]
    fn test_ghost_target_check() {
        let arena = NodeStateArena::new();
        let id = ElementId::new("ghost");
        let target = Point::new(1.0, 2.0);
        arena.start_ghost(id, target);
        assert!(arena.is_ghost_entering_to(id, target));
        assert!(!arena.is_ghost_entering_to(id, Point::new(3.0, 4.0)));
        assert_eq!(
            arena.count_where(|state| matches!(state, NodeState::GhostEntering { .. })),
            1
        );
    }
}
