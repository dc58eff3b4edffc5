//! The rubber-band edge shown while the user draws a new connection.
//!
//! While a [`DrawEdgeSpec`] has no target vertex, a synthetic node follows
//! the pointer and an edge joins it to the source vertex. Hovering a vertex
//! snaps the synthetic node onto it.

use log::trace;
use serde::{Deserialize, Serialize};

use graphview_core::{geometry::Point, identifier::ElementId};

use crate::{
    engine::RenderEngine,
    snapshot::{Element, ElementSnapshot},
};

/// Id of the synthetic node that tracks the pointer.
pub const DRAW_EDGE_NODE_ID: &str = "DrawEdgeNodeId";
/// Class of the synthetic node and edge.
pub const DRAW_EDGE_CLASS: &str = "drawEdgeToMouse";

/// Draw-in-progress edge, `drawEdgeToMouseFrom` in the host input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawEdgeSpec {
    pub vertex_id: ElementId,
    #[serde(default)]
    pub to_vertex_id: Option<ElementId>,
}

impl DrawEdgeSpec {
    pub fn new(vertex_id: impl Into<ElementId>) -> Self {
        Self {
            vertex_id: vertex_id.into(),
            to_vertex_id: None,
        }
    }

    pub fn with_target(mut self, to_vertex_id: impl Into<ElementId>) -> Self {
        self.to_vertex_id = Some(to_vertex_id.into());
        self
    }

    /// Whether the synthetic node is following the pointer.
    pub fn is_tracking(&self) -> bool {
        self.to_vertex_id.is_none()
    }
}

pub fn draw_edge_node_id() -> ElementId {
    ElementId::new(DRAW_EDGE_NODE_ID)
}

pub fn draw_edge_edge_id() -> ElementId {
    draw_edge_node_id().derive("edge")
}

/// Adds the synthetic node and edge to `snapshot` while `spec` is tracking.
///
/// `pointer` is the last pointer position relative to the canvas origin.
/// Returns whether anything was injected.
pub fn inject_draw_edge(snapshot: &mut ElementSnapshot, spec: &DrawEdgeSpec, pointer: Point) -> bool {
    if !spec.is_tracking() {
        return false;
    }

    let node = draw_edge_node_id();
    snapshot.push_node(
        Element::new(node)
            .with_classes(DRAW_EDGE_CLASS)
            .with_rendered_position(pointer),
    );
    snapshot.push_edge(
        Element::edge(draw_edge_edge_id(), spec.vertex_id, node).with_classes(DRAW_EDGE_CLASS),
    );
    true
}

/// Where a pointer move puts the synthetic node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawEdgeMove {
    /// Onto a hovered vertex, in model coordinates.
    Snap(Point),
    /// Under the pointer, in canvas-relative screen coordinates.
    Follow(Point),
}

/// Tracks the pointer for the synthetic node.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTracker {
    canvas_origin: Point,
    last_page: Point,
}

impl PointerTracker {
    pub fn new(canvas_origin: Point) -> Self {
        Self {
            canvas_origin,
            last_page: canvas_origin,
        }
    }

    pub fn set_canvas_origin(&mut self, origin: Point) {
        self.canvas_origin = origin;
    }

    /// Last pointer position relative to the canvas.
    pub fn relative(&self) -> Point {
        self.last_page.sub_point(self.canvas_origin)
    }

    /// Records a pointer move at page position `page`.
    ///
    /// `hovered_vertex` is the position of the vertex under the pointer, if
    /// any. Returns the move to apply while `spec` is tracking.
    pub fn track(
        &mut self,
        spec: Option<&DrawEdgeSpec>,
        page: Point,
        hovered_vertex: Option<Point>,
    ) -> Option<DrawEdgeMove> {
        self.last_page = page;
        if !spec.is_some_and(DrawEdgeSpec::is_tracking) {
            return None;
        }
        Some(match hovered_vertex {
            Some(position) => DrawEdgeMove::Snap(position),
            None => DrawEdgeMove::Follow(self.relative()),
        })
    }
}

/// Moves the synthetic node on the engine.
pub fn apply_move(engine: &mut dyn RenderEngine, movement: DrawEdgeMove) {
    let node = draw_edge_node_id();
    if !engine.contains(node) {
        return;
    }
    trace!(movement:?; "Moving draw-edge node");
    match movement {
        DrawEdgeMove::Snap(position) => engine.set_position(node, position),
        DrawEdgeMove::Follow(rendered) => engine.set_rendered_position(node, rendered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_while_tracking() {
        let mut snapshot = ElementSnapshot::default().with_node(Element::new("v1"));
        let injected = inject_draw_edge(&mut snapshot, &DrawEdgeSpec::new("v1"), Point::new(40.0, 30.0));

        assert!(injected);
        let node = snapshot.node(draw_edge_node_id()).unwrap();
        assert_eq!(node.rendered_position(), Some(Point::new(40.0, 30.0)));
        assert!(node.classes().contains(DRAW_EDGE_CLASS));

        let edge = &snapshot.edges()[0];
        assert_eq!(edge.data().source(), Some(ElementId::new("v1")));
        assert_eq!(edge.data().target(), Some(draw_edge_node_id()));
        assert!(snapshot.validate(&ElementSnapshot::default()).is_ok());
    }

    #[test]
    fn test_nothing_injected_once_target_chosen() {
        let mut snapshot = ElementSnapshot::default();
        let spec = DrawEdgeSpec::new("v1").with_target("v2");
        assert!(!inject_draw_edge(&mut snapshot, &spec, Point::default()));
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_tracker_snaps_or_follows() {
        let mut tracker = PointerTracker::new(Point::new(100.0, 50.0));
        let spec = DrawEdgeSpec::new("v1");

        assert_eq!(
            tracker.track(Some(&spec), Point::new(150.0, 80.0), None),
            Some(DrawEdgeMove::Follow(Point::new(50.0, 30.0)))
        );
        assert_eq!(
            tracker.track(Some(&spec), Point::new(0.0, 0.0), Some(Point::new(7.0, 8.0))),
            Some(DrawEdgeMove::Snap(Point::new(7.0, 8.0)))
        );
        assert_eq!(tracker.track(None, Point::new(1.0, 1.0), None), None);
        assert_eq!(tracker.relative(), Point::new(-99.0, -49.0));
    }
}
