//! A headless [`RenderEngine`] that keeps the scene in memory.
//!
//! Every applied mutation is recorded as an [`EngineOp`], events are emitted
//! synchronously to subscribers the way an interactive engine would, and
//! animations are queued until [`MemoryEngine::finish_animations`] plays them
//! out. Geometry is synthetic: every node gets a [`GeometrySpec`], either the
//! default or one set per id.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace};
use serde_json::{Value, json};

use graphview_core::{
    animation::Animation,
    geometry::{Point, Size},
    identifier::ElementId,
};

use super::{
    Completion, EventListener, LayoutRequest, NodeGeometry, PreviewOptions, RenderEngine,
};
use crate::{
    decoration::{HorizontalAlign, VerticalAlign},
    error::UnknownOption,
    events::{EngineEvent, EventKind},
    snapshot::{Classes, Element, ElementData, Group},
    viewport::{Viewport, ZoomBounds},
};

/// Named options the in-memory engine accepts.
const KNOWN_OPTIONS: &[&str] = &[
    "minZoom",
    "maxZoom",
    "zoomingEnabled",
    "userZoomingEnabled",
    "panningEnabled",
    "userPanningEnabled",
    "boxSelectionEnabled",
    "selectionType",
    "autolock",
    "autoungrabify",
    "autounselectify",
    "wheelSensitivity",
    "motionBlur",
    "textureOnViewport",
    "hideEdgesOnViewport",
    "pixelRatio",
];

/// One mutation applied to a [`MemoryEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOp {
    BeginBatch,
    EndBatch,
    AddNode(ElementId),
    AddEdge(ElementId),
    Remove(ElementId),
    SetData(ElementId),
    MoveToParent(ElementId, Option<ElementId>),
    SetClasses(ElementId, String),
    SetGrabbable(ElementId, bool),
    SetSelectable(ElementId, bool),
    SetLocked(ElementId, bool),
    SetSelected(ElementId, bool),
    SetAutoUnselectify(bool),
    SetPosition(ElementId, Point),
    SetRenderedPosition(ElementId, Point),
    AnimateTo(ElementId, Point),
    StopAnimation(ElementId),
    SetViewport(Viewport),
    AnimateViewport(Viewport),
    StopViewportAnimation,
    ResetViewport,
    SetZoomBounds(ZoomBounds),
    SetOption(String),
    SetStyle,
    RunLayout(String),
    CapturePreview,
    Destroy,
}

impl EngineOp {
    /// Whether this op moves a node.
    pub fn is_position_change(&self) -> bool {
        matches!(
            self,
            Self::SetPosition(..) | Self::SetRenderedPosition(..) | Self::AnimateTo(..)
        )
    }

    /// Whether this op adds or removes an element.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::AddNode(_) | Self::AddEdge(_) | Self::Remove(_))
    }

    /// The element this op targets, if any.
    pub fn element(&self) -> Option<ElementId> {
        match self {
            Self::AddNode(id)
            | Self::AddEdge(id)
            | Self::Remove(id)
            | Self::SetData(id)
            | Self::MoveToParent(id, _)
            | Self::SetClasses(id, _)
            | Self::SetGrabbable(id, _)
            | Self::SetSelectable(id, _)
            | Self::SetLocked(id, _)
            | Self::SetSelected(id, _)
            | Self::SetPosition(id, _)
            | Self::SetRenderedPosition(id, _)
            | Self::AnimateTo(id, _)
            | Self::StopAnimation(id) => Some(*id),
            _ => None,
        }
    }
}

/// Synthetic geometry of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySpec {
    pub size: Size,
    /// Size of the box enclosing the node and its label.
    pub label_size: Size,
    pub text_h_align: HorizontalAlign,
    pub text_v_align: VerticalAlign,
}

impl Default for GeometrySpec {
    fn default() -> Self {
        Self {
            size: Size::new(30.0, 30.0),
            label_size: Size::new(30.0, 30.0),
            text_h_align: HorizontalAlign::Center,
            text_v_align: VerticalAlign::Top,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredElement {
    group: Group,
    data: ElementData,
    classes: Classes,
    position: Point,
    parent: Option<ElementId>,
    selected: bool,
    grabbable: bool,
    selectable: bool,
    locked: bool,
    grabbed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AnimationTarget {
    Node(ElementId, Point),
    Viewport(Viewport),
}

struct PendingAnimation {
    target: AnimationTarget,
    animation: Animation,
    on_complete: Option<Completion>,
}

/// In-memory engine.
pub struct MemoryEngine {
    elements: IndexMap<ElementId, StoredElement>,
    geometry: HashMap<ElementId, GeometrySpec>,
    default_geometry: GeometrySpec,
    viewport: Viewport,
    zoom_bounds: ZoomBounds,
    container: Option<Size>,
    options: IndexMap<String, Value>,
    style: Value,
    auto_unselectify: bool,
    batch_depth: usize,
    listeners: Vec<EventListener>,
    pending: Vec<PendingAnimation>,
    layouts: Vec<LayoutRequest>,
    ops: Vec<EngineOp>,
    destroyed: bool,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("elements", &self.elements.len())
            .field("viewport", &self.viewport)
            .field("pending", &self.pending.len())
            .field("ops", &self.ops.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an empty engine with an 800x600 canvas.
    pub fn new() -> Self {
        Self {
            elements: IndexMap::new(),
            geometry: HashMap::new(),
            default_geometry: GeometrySpec::default(),
            viewport: Viewport::default(),
            zoom_bounds: ZoomBounds::default(),
            container: Some(Size::new(800.0, 600.0)),
            options: IndexMap::new(),
            style: Value::Null,
            auto_unselectify: false,
            batch_depth: 0,
            listeners: Vec::new(),
            pending: Vec::new(),
            layouts: Vec::new(),
            ops: Vec::new(),
            destroyed: false,
        }
    }

    /// Sets the canvas size; `None` simulates a canvas that is not laid out.
    pub fn with_container(mut self, container: Option<Size>) -> Self {
        self.container = container;
        self
    }

    pub fn with_default_geometry(mut self, geometry: GeometrySpec) -> Self {
        self.default_geometry = geometry;
        self
    }

    /// Overrides the geometry of one node.
    pub fn set_geometry(&mut self, id: ElementId, geometry: GeometrySpec) {
        self.geometry.insert(id, geometry);
    }

    /// Emits an event to every subscriber, as user interaction would.
    pub fn emit(&mut self, event: EngineEvent) {
        if self.destroyed {
            return;
        }
        trace!(kind:? = event.kind; "Emitting event");
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Simulates the user grabbing a node.
    pub fn grab(&mut self, id: ElementId) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.grabbed = true;
            self.emit(EngineEvent::on_element(EventKind::Grab, id));
        }
    }

    /// Simulates the user dragging a grabbed node to `position`.
    pub fn drag_to(&mut self, id: ElementId, position: Point) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.position = position;
            self.emit(EngineEvent::on_element(EventKind::Drag, id));
            self.emit(EngineEvent::on_element(EventKind::Position, id));
        }
    }

    /// Simulates the user releasing a node.
    pub fn free(&mut self, id: ElementId) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.grabbed = false;
            self.emit(EngineEvent::on_element(EventKind::Free, id));
        }
    }

    /// Plays every queued animation to its end, in start order.
    ///
    /// Each target is applied (emitting the usual events) before its
    /// completion runs. Returns how many animations finished.
    pub fn finish_animations(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let finished = pending.len();
        for animation in pending {
            match animation.target {
                AnimationTarget::Node(id, position) => self.apply_position(id, position),
                AnimationTarget::Viewport(viewport) => self.apply_viewport(viewport),
            }
            if let Some(on_complete) = animation.on_complete {
                on_complete();
            }
        }
        finished
    }

    /// Ends every running layout, moving nodes to `positions` first.
    pub fn complete_layout(&mut self, positions: &[(ElementId, Point)]) {
        for (id, position) in positions {
            self.apply_position(*id, *position);
        }
        self.layouts.clear();
        self.emit(EngineEvent::on_canvas(EventKind::LayoutStop));
    }

    pub fn pending_animations(&self) -> usize {
        self.pending.len()
    }

    pub fn is_animating(&self, id: ElementId) -> bool {
        self.pending
            .iter()
            .any(|p| matches!(p.target, AnimationTarget::Node(target, _) if target == id))
    }

    /// Timing of the queued animation of `id`, if any.
    pub fn animation_of(&self, id: ElementId) -> Option<Animation> {
        self.pending.iter().find_map(|p| match p.target {
            AnimationTarget::Node(target, _) if target == id => Some(p.animation),
            _ => None,
        })
    }

    pub fn ops(&self) -> &[EngineOp] {
        &self.ops
    }

    /// Returns and clears the op log.
    pub fn take_ops(&mut self) -> Vec<EngineOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn node_ids(&self) -> Vec<ElementId> {
        self.ids_in(Group::Nodes)
    }

    pub fn edge_ids(&self) -> Vec<ElementId> {
        self.ids_in(Group::Edges)
    }

    pub fn data(&self, id: ElementId) -> Option<&ElementData> {
        self.elements.get(&id).map(|e| &e.data)
    }

    pub fn classes(&self, id: ElementId) -> Option<&Classes> {
        self.elements.get(&id).map(|e| &e.classes)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(&id).and_then(|e| e.parent)
    }

    pub fn is_grabbable(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.grabbable)
    }

    pub fn is_selectable(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.selectable)
    }

    pub fn is_locked(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.locked)
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn style(&self) -> &Value {
        &self.style
    }

    pub fn auto_unselectify(&self) -> bool {
        self.auto_unselectify
    }

    pub fn batch_depth(&self) -> usize {
        self.batch_depth
    }

    pub fn layouts(&self) -> &[LayoutRequest] {
        &self.layouts
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ids_in(&self, group: Group) -> Vec<ElementId> {
        self.elements
            .iter()
            .filter(|(_, e)| e.group == group)
            .map(|(id, _)| *id)
            .collect()
    }

    fn geometry_spec(&self, id: ElementId) -> GeometrySpec {
        self.geometry
            .get(&id)
            .copied()
            .unwrap_or(self.default_geometry)
    }

    fn insert(&mut self, group: Group, element: &Element) {
        let id = element.id();
        if self.elements.contains_key(&id) {
            debug!(id = id.to_string(); "Element already present, ignoring add");
            return;
        }

        let position = element
            .position()
            .or_else(|| element.rendered_position().map(|p| self.viewport.to_model(p)))
            .unwrap_or_default();
        let parent = element
            .data()
            .parent()
            .filter(|parent| self.elements.contains_key(parent));

        self.elements.insert(
            id,
            StoredElement {
                group,
                data: element.data().clone(),
                classes: element.classes().clone(),
                position,
                parent,
                selected: element.selected(),
                grabbable: element.raw_grabbable().unwrap_or(true),
                selectable: element.raw_selectable().unwrap_or(true),
                locked: element.raw_locked().unwrap_or(false),
                grabbed: false,
            },
        );
        self.ops.push(match group {
            Group::Nodes => EngineOp::AddNode(id),
            Group::Edges => EngineOp::AddEdge(id),
        });
        self.emit(EngineEvent::on_element(EventKind::Add, id));
    }

    fn apply_position(&mut self, id: ElementId, position: Point) {
        if let Some(element) = self.elements.get_mut(&id) {
            element.position = position;
            self.emit(EngineEvent::on_element(EventKind::Position, id));
        }
    }

    fn apply_viewport(&mut self, viewport: Viewport) {
        self.viewport = Viewport::new(viewport.pan, self.zoom_bounds.clamp(viewport.zoom));
        self.emit(EngineEvent::on_canvas(EventKind::Pan));
        self.emit(EngineEvent::on_canvas(EventKind::Zoom));
    }

    fn update<F>(&mut self, id: ElementId, op: EngineOp, f: F) -> bool
    where
        F: FnOnce(&mut StoredElement),
    {
        match self.elements.get_mut(&id) {
            Some(element) => {
                f(element);
                self.ops.push(op);
                true
            }
            None => false,
        }
    }
}

impl RenderEngine for MemoryEngine {
    fn begin_batch(&mut self) {
        self.batch_depth += 1;
        self.ops.push(EngineOp::BeginBatch);
    }

    fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        self.ops.push(EngineOp::EndBatch);
    }

    fn add_nodes(&mut self, nodes: &[Element]) {
        for node in nodes {
            self.insert(Group::Nodes, node);
        }
    }

    fn add_edges(&mut self, edges: &[Element]) {
        for edge in edges {
            self.insert(Group::Edges, edge);
        }
    }

    fn remove_element(&mut self, id: ElementId) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };

        if element.group == Group::Nodes {
            let connected: Vec<ElementId> = self
                .elements
                .iter()
                .filter(|(_, e)| {
                    e.group == Group::Edges
                        && (e.data.source() == Some(id) || e.data.target() == Some(id))
                })
                .map(|(edge, _)| *edge)
                .collect();
            for edge in connected {
                self.remove_element(edge);
            }
            for child in self.elements.values_mut() {
                if child.parent == Some(id) {
                    child.parent = None;
                }
            }
        }

        self.pending
            .retain(|p| !matches!(p.target, AnimationTarget::Node(target, _) if target == id));
        self.elements.shift_remove(&id);
        self.ops.push(EngineOp::Remove(id));
        self.emit(EngineEvent::on_element(EventKind::Remove, id));
    }

    fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    fn set_data(&mut self, id: ElementId, data: &ElementData) {
        if self.update(id, EngineOp::SetData(id), |e| e.data = data.clone()) {
            self.emit(EngineEvent::on_element(EventKind::Data, id));
        }
    }

    fn move_to_parent(&mut self, id: ElementId, parent: Option<ElementId>) {
        let parent = parent.filter(|parent| self.elements.contains_key(parent));
        self.update(id, EngineOp::MoveToParent(id, parent), |e| e.parent = parent);
    }

    fn set_classes(&mut self, id: ElementId, classes: &Classes) {
        let op = EngineOp::SetClasses(id, classes.as_str().to_string());
        self.update(id, op, |e| e.classes = classes.clone());
    }

    fn set_grabbable(&mut self, id: ElementId, grabbable: bool) {
        self.update(id, EngineOp::SetGrabbable(id, grabbable), |e| {
            e.grabbable = grabbable
        });
    }

    fn set_selectable(&mut self, id: ElementId, selectable: bool) {
        self.update(id, EngineOp::SetSelectable(id, selectable), |e| {
            e.selectable = selectable
        });
    }

    fn set_locked(&mut self, id: ElementId, locked: bool) {
        self.update(id, EngineOp::SetLocked(id, locked), |e| e.locked = locked);
    }

    fn is_selected(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.selected)
    }

    fn set_selected(&mut self, id: ElementId, selected: bool) {
        if self.is_selected(id) == selected {
            return;
        }
        if self.update(id, EngineOp::SetSelected(id, selected), |e| {
            e.selected = selected
        }) {
            let kind = if selected {
                EventKind::Select
            } else {
                EventKind::Unselect
            };
            self.emit(EngineEvent::on_element(kind, id));
        }
    }

    fn is_grabbed(&self, id: ElementId) -> bool {
        self.elements.get(&id).is_some_and(|e| e.grabbed)
    }

    fn set_auto_unselectify(&mut self, enabled: bool) {
        self.auto_unselectify = enabled;
        self.ops.push(EngineOp::SetAutoUnselectify(enabled));
    }

    fn position(&self, id: ElementId) -> Option<Point> {
        self.elements.get(&id).map(|e| e.position)
    }

    fn set_position(&mut self, id: ElementId, position: Point) {
        if self.contains(id) {
            self.ops.push(EngineOp::SetPosition(id, position));
            self.apply_position(id, position);
        }
    }

    fn set_rendered_position(&mut self, id: ElementId, position: Point) {
        if self.contains(id) {
            self.ops.push(EngineOp::SetRenderedPosition(id, position));
            let model = self.viewport.to_model(position);
            self.apply_position(id, model);
        }
    }

    fn animate_to(
        &mut self,
        id: ElementId,
        position: Point,
        animation: Animation,
        on_complete: Option<Completion>,
    ) {
        if !self.contains(id) {
            return;
        }
        self.ops.push(EngineOp::AnimateTo(id, position));
        self.pending.push(PendingAnimation {
            target: AnimationTarget::Node(id, position),
            animation,
            on_complete,
        });
    }

    fn stop_animation(&mut self, id: ElementId) {
        if !self.contains(id) {
            return;
        }
        self.ops.push(EngineOp::StopAnimation(id));
        self.pending
            .retain(|p| !matches!(p.target, AnimationTarget::Node(target, _) if target == id));
    }

    fn live_geometry(&self, id: ElementId) -> Option<NodeGeometry> {
        let element = self.elements.get(&id)?;
        if element.group != Group::Nodes {
            return None;
        }
        let spec = self.geometry_spec(id);
        Some(NodeGeometry {
            position: element.position,
            size: spec.size,
            label_bounds: element.position.to_bounds(spec.label_size),
            text_h_align: spec.text_h_align,
            text_v_align: spec.text_v_align,
        })
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.ops.push(EngineOp::SetViewport(viewport));
        self.apply_viewport(viewport);
    }

    fn animate_viewport(
        &mut self,
        viewport: Viewport,
        animation: Animation,
        on_complete: Option<Completion>,
    ) {
        self.ops.push(EngineOp::AnimateViewport(viewport));
        self.pending.push(PendingAnimation {
            target: AnimationTarget::Viewport(viewport),
            animation,
            on_complete,
        });
    }

    fn stop_viewport_animation(&mut self) {
        self.ops.push(EngineOp::StopViewportAnimation);
        self.pending
            .retain(|p| !matches!(p.target, AnimationTarget::Viewport(_)));
    }

    fn reset_viewport(&mut self) {
        self.ops.push(EngineOp::ResetViewport);
        self.apply_viewport(Viewport::default());
    }

    fn zoom_bounds(&self) -> ZoomBounds {
        self.zoom_bounds
    }

    fn set_zoom_bounds(&mut self, bounds: ZoomBounds) {
        self.ops.push(EngineOp::SetZoomBounds(bounds));
        self.zoom_bounds = bounds;
    }

    fn container_size(&self) -> Option<Size> {
        self.container
    }

    fn set_option(&mut self, key: &str, value: &Value) -> Result<(), UnknownOption> {
        if !KNOWN_OPTIONS.contains(&key) {
            return Err(UnknownOption(key.to_string()));
        }
        let zoom = value.as_f64().map(|zoom| zoom as f32);
        match (key, zoom) {
            ("minZoom", Some(min)) => self.zoom_bounds.min = min,
            ("maxZoom", Some(max)) => self.zoom_bounds.max = max,
            ("autounselectify", _) => self.auto_unselectify = value.as_bool().unwrap_or(false),
            _ => {}
        }
        self.options.insert(key.to_string(), value.clone());
        self.ops.push(EngineOp::SetOption(key.to_string()));
        Ok(())
    }

    fn set_style(&mut self, style: &Value) {
        self.style = style.clone();
        self.ops.push(EngineOp::SetStyle);
    }

    fn run_layout(&mut self, request: &LayoutRequest) {
        self.ops.push(EngineOp::RunLayout(request.name.clone()));
        self.layouts.push(request.clone());
    }

    fn capture_preview(&mut self, options: &PreviewOptions) -> Vec<u8> {
        self.ops.push(EngineOp::CapturePreview);
        let (width, height) = self
            .container
            .map(|size| (size.width(), size.height()))
            .unwrap_or_default();
        let scale = (options.max_width as f32 / width.max(1.0))
            .min(options.max_height as f32 / height.max(1.0))
            .min(1.0);
        let summary = json!({
            "background": options.background,
            "full": options.full,
            "width": (width * scale).round(),
            "height": (height * scale).round(),
            "nodes": self.node_ids().len(),
            "edges": self.edge_ids().len(),
        });
        serde_json::to_vec(&summary).unwrap_or_default()
    }

    fn subscribe(&mut self, listener: EventListener) {
        self.listeners.push(listener);
    }

    fn destroy(&mut self) {
        self.ops.push(EngineOp::Destroy);
        self.listeners.clear();
        self.pending.clear();
        self.elements.clear();
        self.destroyed = true;
    }
}
