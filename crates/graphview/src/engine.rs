//! The boundary to the stateful graph-drawing engine.
//!
//! The reconciler never owns scene state; it drives an engine through the
//! [`RenderEngine`] trait. The operation set mirrors what interactive
//! graph-canvas libraries expose: batched structural mutations, per-element
//! attribute setters, engine-scheduled animations, viewport control and event
//! subscription. [`MemoryEngine`] implements it in memory for tests and
//! headless hosts.

mod memory;

pub use memory::{EngineOp, GeometrySpec, MemoryEngine};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphview_core::{
    animation::Animation,
    geometry::{Bounds, Point, Size},
    identifier::ElementId,
};

use crate::{
    decoration::{HorizontalAlign, VerticalAlign},
    error::UnknownOption,
    events::EngineEvent,
    snapshot::{Classes, Element, ElementData},
    viewport::{Viewport, ZoomBounds},
};

/// Callback the engine runs once when an animation completes.
///
/// Stopping the animation drops it without running it, which also releases
/// anything it owns.
pub type Completion = Box<dyn FnOnce()>;

/// Receiver registered through [`RenderEngine::subscribe`].
pub type EventListener = Box<dyn FnMut(&EngineEvent)>;

/// Live geometry of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    /// Center of the node in model coordinates.
    pub position: Point,
    /// Size of the node shape.
    pub size: Size,
    /// Bounding box including the node's label.
    pub label_bounds: Bounds,
    pub text_h_align: HorizontalAlign,
    pub text_v_align: VerticalAlign,
}

impl NodeGeometry {
    /// Bounding box of the node shape, labels excluded.
    pub fn bounds(&self) -> Bounds {
        self.position.to_bounds(self.size)
    }
}

/// A layout run requested through the graph menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    /// Layout algorithm name understood by the engine.
    pub name: String,
    /// Lay out only these nodes; the whole graph when empty.
    #[serde(default)]
    pub nodes: Vec<ElementId>,
    #[serde(default)]
    pub only_selected: bool,
    /// Algorithm-specific options, passed through untouched.
    #[serde(default)]
    pub options: Value,
}

impl LayoutRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            only_selected: false,
            options: Value::Null,
        }
    }
}

/// Preview image parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewOptions {
    pub background: String,
    /// Capture the whole graph instead of the visible area.
    pub full: bool,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            background: "white".to_string(),
            full: true,
            max_width: 300,
            max_height: 300,
        }
    }
}

/// Imperative interface to a stateful graph-drawing engine.
///
/// Setters on ids the engine does not contain are no-ops. Callers check
/// liveness with [`RenderEngine::contains`] where the distinction matters.
pub trait RenderEngine {
    /// Opens a batch; rendering is deferred until the matching
    /// [`RenderEngine::end_batch`]. Prefer [`batch`].
    fn begin_batch(&mut self);
    fn end_batch(&mut self);

    fn add_nodes(&mut self, nodes: &[Element]);
    fn add_edges(&mut self, edges: &[Element]);
    fn remove_element(&mut self, id: ElementId);
    fn contains(&self, id: ElementId) -> bool;

    /// Replaces the element's attribute map.
    fn set_data(&mut self, id: ElementId, data: &ElementData);
    /// Re-parents a node; `None` detaches it.
    fn move_to_parent(&mut self, id: ElementId, parent: Option<ElementId>);
    fn set_classes(&mut self, id: ElementId, classes: &Classes);

    fn set_grabbable(&mut self, id: ElementId, grabbable: bool);
    fn set_selectable(&mut self, id: ElementId, selectable: bool);
    fn set_locked(&mut self, id: ElementId, locked: bool);

    fn is_selected(&self, id: ElementId) -> bool;
    fn set_selected(&mut self, id: ElementId, selected: bool);
    /// Whether the user currently holds the node with the pointer.
    fn is_grabbed(&self, id: ElementId) -> bool;
    /// Disables selection by user interaction.
    fn set_auto_unselectify(&mut self, enabled: bool);

    fn position(&self, id: ElementId) -> Option<Point>;
    fn set_position(&mut self, id: ElementId, position: Point);
    /// Positions a node in screen coordinates.
    fn set_rendered_position(&mut self, id: ElementId, position: Point);
    fn animate_to(
        &mut self,
        id: ElementId,
        position: Point,
        animation: Animation,
        on_complete: Option<Completion>,
    );
    /// Stops any in-flight animation of the element, dropping its completion.
    fn stop_animation(&mut self, id: ElementId);
    fn live_geometry(&self, id: ElementId) -> Option<NodeGeometry>;

    fn viewport(&self) -> Viewport;
    /// Applies a viewport immediately and emits pan and zoom events.
    fn set_viewport(&mut self, viewport: Viewport);
    fn animate_viewport(
        &mut self,
        viewport: Viewport,
        animation: Animation,
        on_complete: Option<Completion>,
    );
    fn stop_viewport_animation(&mut self);
    /// Returns to pan `(0, 0)` at zoom 1.
    fn reset_viewport(&mut self);
    fn zoom_bounds(&self) -> ZoomBounds;
    fn set_zoom_bounds(&mut self, bounds: ZoomBounds);
    /// Size of the canvas in screen units, `None` while it is not laid out.
    fn container_size(&self) -> Option<Size>;

    /// Sets a named engine option.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownOption`] when the engine has no setter for `key`.
    fn set_option(&mut self, key: &str, value: &Value) -> Result<(), UnknownOption>;
    fn set_style(&mut self, style: &Value);
    /// Starts a layout; the engine emits a layout-stop event when it ends.
    fn run_layout(&mut self, request: &LayoutRequest);
    /// Renders the graph into an image buffer.
    fn capture_preview(&mut self, options: &PreviewOptions) -> Vec<u8>;

    fn subscribe(&mut self, listener: EventListener);
    /// Tears the engine down. No events are emitted afterwards.
    fn destroy(&mut self);
}

/// Runs `f` inside one engine batch.
///
/// The batch is closed even when `f` returns an error value.
pub fn batch<E, R>(engine: &mut E, f: impl FnOnce(&mut E) -> R) -> R
where
    E: RenderEngine + ?Sized,
{
    engine.begin_batch();
    let result = f(engine);
    engine.end_batch();
    result
}
