//! The graph widget: props in, engine mutations and callbacks out.
//!
//! [`GraphView`] owns everything that lives between two host updates: the
//! reconciler with its applied snapshot, the viewport controller, the event
//! dispatcher, the draw-edge pointer tracker and the preview debouncer.
//! The host drives it with three calls:
//!
//! - [`GraphView::mount`] once, when the engine exists.
//! - [`GraphView::update`] whenever its declarative props change.
//! - [`GraphView::tick`] from its event loop, which processes engine events
//!   and captures due previews.

use std::{rc::Rc, time::Duration};

use log::{debug, info, trace};
use serde_json::Value;

use graphview_core::{
    color::Color,
    geometry::{Insets, Point},
    identifier::ElementId,
};

use crate::{
    config::{EngineConfig, ViewConfig},
    draw_edge::{DrawEdgeSpec, PointerTracker, apply_move, draw_edge_edge_id, draw_edge_node_id, inject_draw_edge},
    engine::{LayoutRequest, RenderEngine},
    error::{ConfigError, GraphViewError},
    events::{EngineEvent, EventDispatcher, EventKind, EventTarget, GraphCallbacks, ReceivedEvent},
    paths::{PathSpec, apply_paths},
    preview::PreviewScheduler,
    reconcile::{ReconcileOptions, ReconcileOutcome, SceneReconciler},
    snapshot::{Element, ElementSnapshot},
    suppression::{Category, SuppressionGate},
    viewport::{FitOutcome, RequestedViewport, Viewport, ViewportController, ZoomBounds, ZoomDirection},
};

/// Declarative input of one update.
#[derive(Debug, Clone, Default)]
pub struct GraphProps {
    pub snapshot: ElementSnapshot,
    pub config: EngineConfig,
    /// Animate position and viewport changes.
    pub animate: bool,
    /// Space covered by host panels on each side of the canvas.
    pub panel_padding: Insets,
    /// Edge being drawn from a vertex to the pointer.
    pub draw_edge_to_mouse_from: Option<DrawEdgeSpec>,
    /// Paths to highlight.
    pub draw_paths: Option<PathSpec>,
    /// A different product was just opened; fit it without animation.
    pub initial_product_display: bool,
    /// The host already stores a preview for this product.
    pub has_preview: bool,
}

impl GraphProps {
    pub fn new(snapshot: ElementSnapshot) -> Self {
        Self {
            snapshot,
            animate: true,
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_animate(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }

    pub fn with_panel_padding(mut self, padding: Insets) -> Self {
        self.panel_padding = padding;
        self
    }

    pub fn with_draw_edge(mut self, spec: DrawEdgeSpec) -> Self {
        self.draw_edge_to_mouse_from = Some(spec);
        self
    }

    pub fn with_paths(mut self, spec: PathSpec) -> Self {
        self.draw_paths = Some(spec);
        self
    }

    pub fn with_initial_product_display(mut self, initial: bool) -> Self {
        self.initial_product_display = initial;
        self
    }

    pub fn with_has_preview(mut self, has_preview: bool) -> Self {
        self.has_preview = has_preview;
        self
    }
}

/// Graph menu selection commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectCommand {
    All,
    None,
    Invert,
    /// Select every node, unselect every edge.
    Vertices,
    /// Select every edge, unselect every node.
    Edges,
}

/// Interactive graph view over a [`RenderEngine`].
pub struct GraphView {
    config: ViewConfig,
    base_color: Color,
    dispatcher: Rc<EventDispatcher>,
    reconciler: SceneReconciler,
    viewport: ViewportController,
    preview: PreviewScheduler,
    pointer: PointerTracker,
    draw_edge: Option<DrawEdgeSpec>,
    previous_config: Option<EngineConfig>,
    panel_padding: Insets,
    full_layout_running: bool,
    mounted: bool,
}

impl std::fmt::Debug for GraphView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphView")
            .field("reconciler", &self.reconciler)
            .field("viewport", &self.viewport)
            .field("preview", &self.preview)
            .field("draw_edge", &self.draw_edge)
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl GraphView {
    /// Creates a view reporting to `callbacks`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the configured path color
    /// cannot be parsed.
    pub fn new(config: ViewConfig, callbacks: Rc<dyn GraphCallbacks>) -> Result<Self, ConfigError> {
        let base_color = config.paths().base_color()?;
        let gate = SuppressionGate::new();

        let mut reconciler = SceneReconciler::new(gate.clone())
            .with_settings(config.animation_settings())
            .with_default_padding(config.decoration().padding());
        let ghost_callbacks = Rc::clone(&callbacks);
        reconciler.set_ghost_listener(Rc::new(move |entity| ghost_callbacks.on_ghost_finished(entity)));

        let viewport = ViewportController::new(
            ZoomBounds::default(),
            config.viewport().panel_padding_border(),
            config.animation().to_animation(),
        );
        let preview = PreviewScheduler::new(config.preview().debounce());

        Ok(Self {
            config,
            base_color,
            dispatcher: Rc::new(EventDispatcher::new(gate, callbacks)),
            reconciler,
            viewport,
            preview,
            pointer: PointerTracker::default(),
            draw_edge: None,
            previous_config: None,
            panel_padding: Insets::default(),
            full_layout_running: false,
            mounted: false,
        })
    }

    /// Subscribes to `engine` and reports readiness.
    ///
    /// `canvas_origin` is the page position of the canvas' top-left corner.
    pub fn mount(&mut self, engine: &mut dyn RenderEngine, canvas_origin: Point) {
        let dispatcher = Rc::clone(&self.dispatcher);
        engine.subscribe(Box::new(move |event: &EngineEvent| dispatcher.dispatch(event)));
        self.pointer = PointerTracker::new(canvas_origin);
        self.mounted = true;
        info!("Graph view mounted");
        self.dispatcher.callbacks().on_ready(&*engine);
    }

    /// Tears the engine down. Pending previews are dropped.
    pub fn unmount(&mut self, engine: &mut dyn RenderEngine) {
        engine.destroy();
        self.dispatcher.drain();
        self.preview.cancel();
        self.reconciler.reset();
        self.previous_config = None;
        self.mounted = false;
        info!("Graph view unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn gate(&self) -> &SuppressionGate {
        self.dispatcher.gate()
    }

    pub fn reconciler(&self) -> &SceneReconciler {
        &self.reconciler
    }

    /// The snapshot last applied to the engine, derived elements included.
    pub fn applied(&self) -> &ElementSnapshot {
        self.reconciler.previous()
    }

    /// Moves the canvas, e.g. after the host layout changed.
    pub fn set_canvas_origin(&mut self, origin: Point) {
        self.pointer.set_canvas_origin(origin);
    }

    /// Applies new props at time `now`.
    ///
    /// Derived elements (draw-edge preview, path edges) are materialized
    /// into the snapshot, changed engine options are applied, the snapshot
    /// is reconciled and finally the viewport is adjusted.
    ///
    /// # Errors
    ///
    /// Returns [`GraphViewError::Reconcile`] when the snapshot cannot be
    /// applied. The engine and the applied snapshot are then unchanged,
    /// apart from engine options which were already set.
    pub fn update(
        &mut self,
        engine: &mut dyn RenderEngine,
        props: GraphProps,
        now: Duration,
    ) -> Result<ReconcileOutcome, GraphViewError> {
        let GraphProps {
            mut snapshot,
            config,
            animate,
            panel_padding,
            draw_edge_to_mouse_from,
            draw_paths,
            initial_product_display,
            has_preview,
        } = props;

        self.panel_padding = panel_padding;
        self.draw_edge = draw_edge_to_mouse_from;
        if let Some(spec) = &self.draw_edge {
            inject_draw_edge(&mut snapshot, spec, self.pointer.relative());
        }
        if let Some(spec) = &draw_paths {
            let touched = apply_paths(&mut snapshot, spec, self.base_color);
            debug!(touched; "Materialized path edges");
        }

        let requested = self.apply_config(engine, config);

        let outcome = self
            .reconciler
            .reconcile(engine, snapshot, ReconcileOptions { animate })?;

        engine.set_auto_unselectify(self.draw_edge.is_some());
        self.adjust_viewport(engine, requested, animate, initial_product_display, outcome);

        if outcome.is_dirty() || !has_preview {
            self.preview.request(now);
        }
        self.process_events(engine, now);
        Ok(outcome)
    }

    fn apply_config(&mut self, engine: &mut dyn RenderEngine, config: EngineConfig) -> RequestedViewport {
        let diff = config.diff(self.previous_config.as_ref());

        let mut bounds = self.viewport.configured_bounds();
        let zoom_option = |key: &str| {
            diff.options
                .iter()
                .find(|(option, _)| option == key)
                .and_then(|(_, value)| value.as_f64())
                .map(|value| value as f32)
        };
        let (min, max) = (zoom_option("minZoom"), zoom_option("maxZoom"));
        if min.is_some() || max.is_some() {
            bounds = ZoomBounds::new(min.unwrap_or(bounds.min), max.unwrap_or(bounds.max));
            debug!(min = bounds.min, max = bounds.max; "Configured zoom bounds");
            self.viewport.set_configured_bounds(bounds);
        }

        let requested = diff.apply(engine);
        self.previous_config = Some(config);
        requested
    }

    fn adjust_viewport(
        &mut self,
        engine: &mut dyn RenderEngine,
        requested: RequestedViewport,
        animate: bool,
        initial_product_display: bool,
        outcome: ReconcileOutcome,
    ) {
        if !requested.is_empty() {
            let target = requested.resolve(engine.viewport());
            debug!(zoom = target.zoom, animate; "Applying requested viewport");
            let gate = self.gate().clone();
            if animate {
                let guard = gate.suppress(&[Category::Pan, Category::Zoom]);
                engine.stop_viewport_animation();
                engine.animate_viewport(
                    target,
                    self.config.animation().to_animation(),
                    Some(Box::new(move || drop(guard))),
                );
            } else {
                gate.with_suppressed(&[Category::Pan, Category::Zoom], || engine.set_viewport(target));
            }
        } else if initial_product_display || outcome.needs_fit {
            debug!(initial_product_display, needs_fit = outcome.needs_fit; "Fitting new content");
            self.fit(engine, false);
        }
    }

    /// Processes engine events and captures a due preview.
    pub fn tick(&mut self, engine: &mut dyn RenderEngine, now: Duration) {
        self.process_events(engine, now);
        if self.mounted && self.preview.poll(now) {
            self.capture_preview(engine);
        }
    }

    /// Captures a preview immediately.
    pub fn capture_preview(&mut self, engine: &mut dyn RenderEngine) {
        let image = engine.capture_preview(&self.config.preview().options());
        debug!(bytes = image.len(); "Captured preview");
        self.dispatcher.callbacks().on_update_preview(&image);
    }

    /// Handles every event received since the last call.
    pub fn process_events(&mut self, engine: &mut dyn RenderEngine, now: Duration) {
        for received in self.dispatcher.drain() {
            self.handle_event(engine, received, now);
        }
    }

    fn handle_event(&mut self, engine: &mut dyn RenderEngine, received: ReceivedEvent, now: Duration) {
        let ReceivedEvent { event, suppressed } = received;
        trace!(kind:? = event.kind, suppressed; "Handling event");
        let states = Rc::clone(self.reconciler.states());

        match (event.kind, event.target) {
            (EventKind::Grab, EventTarget::Element(id)) => {
                states.grab(id);
                self.follow_decorations(engine, id);
            }
            (EventKind::Free, EventTarget::Element(id)) => {
                states.free(id);
                self.follow_decorations(engine, id);
            }
            (EventKind::Position, EventTarget::Element(id)) => {
                if !self.is_synthetic(id) {
                    if !suppressed {
                        self.follow_decorations(engine, id);
                    }
                    self.preview.request(now);
                }
            }
            (EventKind::Add | EventKind::Remove, EventTarget::Element(id)) => {
                if !self.is_synthetic(id) {
                    self.preview.request(now);
                }
            }
            (EventKind::Tap | EventKind::MouseOver | EventKind::MouseOut, EventTarget::Element(id))
                if !suppressed && self.is_decoration(id) =>
            {
                self.dispatcher.callbacks().on_decoration_event(&event);
            }
            (EventKind::MouseMove, target) => self.track_pointer(engine, &event, target),
            (EventKind::ContextTap, EventTarget::Canvas) if !suppressed => {
                self.dispatcher.callbacks().on_show_menu(&event);
            }
            (EventKind::Tap, EventTarget::Canvas) if !suppressed && event.ctrl_key => {
                self.dispatcher.callbacks().on_show_menu(&event);
            }
            (EventKind::LayoutStop, _) => {
                states.layout_stopped();
                if std::mem::take(&mut self.full_layout_running) {
                    info!("Layout finished, fitting");
                    self.fit(engine, true);
                }
            }
            _ => {}
        }
    }

    fn follow_decorations(&self, engine: &mut dyn RenderEngine, anchor: ElementId) {
        self.reconciler.reposition_decorations(engine, anchor);
    }

    fn track_pointer(&mut self, engine: &mut dyn RenderEngine, event: &EngineEvent, target: EventTarget) {
        let Some(page) = event.pointer else {
            return;
        };
        let hovered = match target {
            EventTarget::Element(id) if !self.is_synthetic(id) && !self.is_decoration(id) => {
                self.applied().node(id).and_then(|_| engine.position(id))
            }
            _ => None,
        };
        if let Some(movement) = self.pointer.track(self.draw_edge.as_ref(), page, hovered) {
            self.gate()
                .clone()
                .with_suppressed(&[Category::Position], || apply_move(engine, movement));
        }
    }

    fn is_synthetic(&self, id: ElementId) -> bool {
        id == draw_edge_node_id() || id == draw_edge_edge_id()
    }

    fn is_decoration(&self, id: ElementId) -> bool {
        self.applied().node(id).is_some_and(Element::is_decoration)
    }

    /// Nodes considered by fits.
    fn fit_targets(&self) -> Vec<ElementId> {
        self.applied()
            .nodes()
            .iter()
            .map(Element::id)
            .filter(|id| !self.is_synthetic(*id))
            .collect()
    }

    /// Fits the viewport around every node.
    pub fn fit(&mut self, engine: &mut dyn RenderEngine, animate: bool) -> FitOutcome {
        let targets = self.fit_targets();
        self.viewport.fit(engine, &targets, self.panel_padding, animate)
    }

    /// Fits the viewport around `targets`.
    pub fn fit_to(&mut self, engine: &mut dyn RenderEngine, targets: &[ElementId], animate: bool) -> FitOutcome {
        self.viewport.fit(engine, targets, self.panel_padding, animate)
    }

    /// Menu zoom: animates to `level` around the canvas center.
    pub fn zoom_to(&self, engine: &mut dyn RenderEngine, level: f32) -> Option<Viewport> {
        self.viewport.zoom_to_level(engine, level)
    }

    /// Zoom button press at time `now`.
    pub fn zoom_step(&mut self, engine: &mut dyn RenderEngine, direction: ZoomDirection, now: Duration) -> Option<Viewport> {
        self.viewport.zoom_step(engine, direction, now)
    }

    /// Pan control.
    pub fn pan_by(&self, engine: &mut dyn RenderEngine, offset: Point) -> Viewport {
        self.viewport.pan_by(engine, offset)
    }

    /// Runs a layout. Its nodes ignore snapshot positions until the layout
    /// stopped and their next position change arrived.
    pub fn run_layout(&mut self, engine: &mut dyn RenderEngine, mut request: LayoutRequest) {
        if request.nodes.is_empty() {
            request.nodes = self
                .applied()
                .nodes()
                .iter()
                .map(Element::id)
                .filter(|id| !request.only_selected || engine.is_selected(*id))
                .collect();
        }
        if request.options.is_null() {
            request.options = Value::Object(Default::default());
        }

        info!(
            name = request.name.as_str(),
            nodes = request.nodes.len(),
            only_selected = request.only_selected;
            "Running layout"
        );
        self.reconciler
            .states()
            .hold_for_layout(request.nodes.iter().copied());
        self.full_layout_running = !request.only_selected;
        engine.run_layout(&request);
    }

    /// Applies a graph menu selection command to the applied elements.
    pub fn select(&self, engine: &mut dyn RenderEngine, command: SelectCommand) {
        let applied = self.applied();
        let live = |elements: &[Element]| -> Vec<ElementId> {
            elements
                .iter()
                .map(Element::id)
                .filter(|id| engine.contains(*id))
                .collect()
        };
        let (nodes, edges) = (live(applied.nodes()), live(applied.edges()));
        debug!(command:?; "Selection command");

        let (node_state, edge_state) = match command {
            SelectCommand::All => (Some(true), Some(true)),
            SelectCommand::None => (Some(false), Some(false)),
            SelectCommand::Invert => (None, None),
            SelectCommand::Vertices => (Some(true), Some(false)),
            SelectCommand::Edges => (Some(false), Some(true)),
        };
        for (ids, state) in [(nodes, node_state), (edges, edge_state)] {
            for id in ids {
                let selected = state.unwrap_or_else(|| !engine.is_selected(id));
                engine.set_selected(id, selected);
            }
        }
    }
}
