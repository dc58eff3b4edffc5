//! Scene reconciliation.
//!
//! [`SceneReconciler::reconcile`] diffs the next snapshot against the last
//! one it applied and issues the smallest set of engine mutations that makes
//! the engine show the next snapshot. A pass runs in fixed phases:
//!
//! 1. **Validation**: snapshot invariants, decoration attributes and field
//!    diffs are all checked before anything is mutated.
//! 2. **Structural**: one engine batch for nodes (modify, add parent-first,
//!    remove), then one for edges.
//! 3. **Reparent**: nodes whose parent changed are attached to their new
//!    parent, which now exists.
//! 4. **Decoration**: decorations that were added, or whose anchor changed,
//!    are placed from live anchor geometry in one batch.
//!
//! The stored snapshot only advances when every phase succeeded.

mod diff;
mod state;

pub use diff::{FieldChange, GroupPlan, Modified, classify, diff_element};
pub use state::{NodeState, NodeStateArena};

use std::{collections::HashMap, fmt, rc::Rc, time::Duration};

use log::{debug, info, trace, warn};
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::{Dfs, Walker},
};

use graphview_core::{
    animation::{Animation, Easing},
    geometry::Point,
    identifier::ElementId,
};

use crate::{
    decoration::{AnchorSpecs, DecorationSize, Padding, calculate_position},
    engine::{RenderEngine, batch},
    error::{DecorationError, ReconcileError},
    snapshot::{AnimateTo, Element, ElementSnapshot},
    suppression::{Category, SuppressionGate},
};

/// Per-pass options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Animate position changes instead of jumping.
    pub animate: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self { animate: true }
    }
}

/// What a pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// A node was added, removed or moved.
    pub nodes_changed: bool,
    /// An edge was added or removed.
    pub edges_changed: bool,
    /// The graph went from empty to nodes that all sit on the origin, which
    /// is taken to mean they were never positioned.
    pub needs_fit: bool,
}

impl ReconcileOutcome {
    pub fn is_dirty(&self) -> bool {
        self.nodes_changed || self.edges_changed
    }
}

/// Timing of reconciler-driven animations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSettings {
    /// Position changes and the decorations following them.
    pub position: Animation,
    /// Ghost entrances.
    pub ghost: Animation,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            position: Animation::default(),
            ghost: Animation::new(Duration::from_millis(800), Easing::default())
                .with_delay(Duration::from_millis(100)),
        }
    }
}

/// Called with the entity id once a ghost finished entering.
pub type GhostListener = Rc<dyn Fn(ElementId)>;

/// Work deferred to the decoration phase.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DecorationJob {
    /// Place one decoration.
    Place(ElementId),
    /// Place every decoration of an anchor.
    Follow(ElementId),
}

/// Output of the structural phase consumed by the later phases.
#[derive(Debug, Default)]
struct Deferred {
    reparent: Vec<(ElementId, Option<ElementId>)>,
    decorations: Vec<DecorationJob>,
}

/// Diffs snapshots and applies them to a [`RenderEngine`].
pub struct SceneReconciler {
    previous: ElementSnapshot,
    gate: SuppressionGate,
    states: Rc<NodeStateArena>,
    settings: AnimationSettings,
    default_padding: Padding,
    ghost_listener: Option<GhostListener>,
}

impl fmt::Debug for SceneReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneReconciler")
            .field("nodes", &self.previous.nodes().len())
            .field("edges", &self.previous.edges().len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SceneReconciler {
    pub fn new(gate: SuppressionGate) -> Self {
        Self {
            previous: ElementSnapshot::default(),
            gate,
            states: Rc::new(NodeStateArena::new()),
            settings: AnimationSettings::default(),
            default_padding: Padding::default(),
            ghost_listener: None,
        }
    }

    pub fn with_settings(mut self, settings: AnimationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Padding used for decorations that carry none.
    pub fn with_default_padding(mut self, padding: Padding) -> Self {
        self.default_padding = padding;
        self
    }

    pub fn set_ghost_listener(&mut self, listener: GhostListener) {
        self.ghost_listener = Some(listener);
    }

    /// The last successfully applied snapshot.
    pub fn previous(&self) -> &ElementSnapshot {
        &self.previous
    }

    pub fn states(&self) -> &Rc<NodeStateArena> {
        &self.states
    }

    pub fn gate(&self) -> &SuppressionGate {
        &self.gate
    }

    /// Forgets the applied snapshot and all node state.
    pub fn reset(&mut self) {
        self.previous = ElementSnapshot::default();
        self.states = Rc::new(NodeStateArena::new());
    }

    /// Applies `next` to `engine`.
    ///
    /// # Errors
    ///
    /// Fails without mutating the engine when `next` breaks a snapshot
    /// invariant, carries a malformed decoration, or changes a field the
    /// reconciler does not handle. On any error the stored snapshot is left
    /// as it was.
    pub fn reconcile(
        &mut self,
        engine: &mut dyn RenderEngine,
        next: ElementSnapshot,
        options: ReconcileOptions,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        next.validate(&self.previous)?;
        check_decorations(&next)?;
        let nodes = classify(self.previous.nodes(), next.nodes())?;
        let edges = classify(self.previous.edges(), next.edges())?;

        debug!(
            added = nodes.added.len(),
            removed = nodes.removed.len(),
            modified = nodes.modified.iter().filter(|m| !m.changes.is_empty()).count();
            "Reconciling nodes"
        );
        debug!(
            added = edges.added.len(),
            removed = edges.removed.len(),
            modified = edges.modified.iter().filter(|m| !m.changes.is_empty()).count();
            "Reconciling edges"
        );

        let needs_fit = self.previous.nodes().is_empty()
            && !nodes.added.is_empty()
            && nodes.added.iter().all(|node| is_unpositioned(node));

        let mut deferred = Deferred::default();
        let nodes_changed = batch(engine, |engine| {
            self.apply_nodes(engine, &next, &nodes, options, &mut deferred)
        });
        let edges_changed = batch(engine, |engine| {
            self.apply_edges(engine, &next, &edges, options, &mut deferred)
        });
        self.reparent_phase(engine, &deferred.reparent);
        self.decoration_phase(engine, &next, &deferred.decorations)?;

        let outcome = ReconcileOutcome {
            nodes_changed,
            edges_changed,
            needs_fit,
        };
        info!(
            nodes_changed,
            edges_changed,
            needs_fit;
            "Reconciliation pass complete"
        );
        self.previous = next;
        Ok(outcome)
    }

    /// Places the decorations of `anchor` from its live geometry, without
    /// animation.
    ///
    /// Used when the user moves or releases an anchor.
    pub fn reposition_decorations(&self, engine: &mut dyn RenderEngine, anchor: ElementId) {
        let decorations = decorations_of(&self.previous, anchor);
        if decorations.is_empty() {
            return;
        }
        batch(engine, |engine| {
            let _guard = self.gate.suppress(&[Category::Position]);
            for decoration in decorations {
                self.place_decoration(engine, decoration, None);
            }
        });
    }

    fn apply_nodes(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        plan: &GroupPlan<'_>,
        options: ReconcileOptions,
        deferred: &mut Deferred,
    ) -> bool {
        let mut changed = false;

        for modified in &plan.modified {
            changed |= self.apply_modified(engine, next, modified, true, options, deferred);
        }

        let ordered = parent_first(&plan.added);
        if !ordered.is_empty() {
            let elements: Vec<Element> = ordered.iter().map(|node| (*node).clone()).collect();
            engine.add_nodes(&elements);
            changed = true;
        }
        for node in ordered {
            if node.is_decoration() {
                deferred.decorations.push(DecorationJob::Place(node.id()));
            } else if let Some(animate_to) = node.data().animate_to() {
                self.enter_ghost(engine, node.id(), animate_to);
            }
        }

        changed |= self.remove_all(engine, &plan.removed);
        changed
    }

    fn apply_edges(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        plan: &GroupPlan<'_>,
        options: ReconcileOptions,
        deferred: &mut Deferred,
    ) -> bool {
        for modified in &plan.modified {
            self.apply_modified(engine, next, modified, false, options, deferred);
        }

        let mut changed = false;
        if !plan.added.is_empty() {
            let elements: Vec<Element> = plan.added.iter().map(|edge| (*edge).clone()).collect();
            engine.add_edges(&elements);
            changed = true;
        }
        changed |= self.remove_all(engine, &plan.removed);
        changed
    }

    /// Applies the field changes of one element. Returns whether it moved.
    fn apply_modified(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        modified: &Modified<'_>,
        is_node: bool,
        options: ReconcileOptions,
        deferred: &mut Deferred,
    ) -> bool {
        let Modified { old, new, changes } = modified;
        let id = new.id();
        if changes.is_empty() {
            return false;
        }
        if !engine.contains(id) {
            debug!(id = id.to_string(); "Changed element is not live, skipping");
            return false;
        }

        let mut moved = false;
        for change in changes {
            match change {
                FieldChange::Data => {
                    self.apply_data(engine, next, old, new, is_node, deferred);
                }
                FieldChange::Grabbable => engine.set_grabbable(id, new.grabbable()),
                FieldChange::Selectable => engine.set_selectable(id, new.selectable()),
                FieldChange::Locked => engine.set_locked(id, new.locked()),
                FieldChange::Selected => {
                    if engine.is_selected(id) != new.selected() {
                        self.gate.with_suppressed(&[Category::Selection], || {
                            engine.set_selected(id, new.selected())
                        });
                    }
                }
                FieldChange::Classes => engine.set_classes(id, new.classes()),
                FieldChange::Position if is_node => {
                    moved |= self.apply_position(engine, next, old, new, options.animate);
                }
                FieldChange::RenderedPosition if !modified.has(FieldChange::Position) => {
                    if let Some(rendered) = new.rendered_position() {
                        self.gate.with_suppressed(&[Category::Position], || {
                            engine.set_rendered_position(id, rendered)
                        });
                        if is_node && !decorations_of(next, id).is_empty() {
                            deferred.decorations.push(DecorationJob::Follow(id));
                        }
                        moved = true;
                    }
                }
                FieldChange::Position | FieldChange::RenderedPosition => {}
            }
        }
        moved
    }

    fn apply_data(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        old: &Element,
        new: &Element,
        is_node: bool,
        deferred: &mut Deferred,
    ) {
        let id = new.id();
        let new_parent = new.data().parent();
        let reparent = is_node && old.data().parent() != new_parent;

        self.gate.with_suppressed(&[Category::Data], || {
            if reparent {
                engine.set_data(id, &new.data().without_parent());
                engine.move_to_parent(id, None);
                deferred.reparent.push((id, new_parent));
            } else {
                engine.set_data(id, new.data());
            }
        });

        if !is_node {
            return;
        }
        if new.is_decoration() {
            deferred.decorations.push(DecorationJob::Place(id));
        } else if !decorations_of(next, id).is_empty() {
            deferred.decorations.push(DecorationJob::Follow(id));
        }
        let animate_to = new.data().animate_to();
        if let Some(animate_to) = animate_to.filter(|_| old.data().animate_to() != animate_to) {
            self.enter_ghost(engine, id, animate_to);
        }
    }

    /// Moves a node towards its snapshot position. Returns whether it moved.
    fn apply_position(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        old: &Element,
        new: &Element,
        animate: bool,
    ) -> bool {
        let id = new.id();
        let Some(target) = new.position() else {
            return false;
        };
        if new.is_decoration() || new.is_ghost() {
            return false;
        }
        if self.states.is_held(id) {
            if self.states.release_after_layout(id) {
                debug!(id = id.to_string(); "Layout finished, releasing node");
            } else {
                trace!(id = id.to_string(); "Node is held, ignoring position");
            }
            return false;
        }
        if engine.is_grabbed(id) {
            trace!(id = id.to_string(); "Node is grabbed, ignoring position");
            return false;
        }

        let from = old
            .position()
            .or_else(|| engine.position(id))
            .unwrap_or_default();
        if from.max_axis_delta(target) < 1.0 {
            return false;
        }

        let decorations = decorations_of(next, id);
        if animate {
            engine.stop_animation(id);
            for decoration in &decorations {
                self.animate_decoration(engine, decoration, target);
            }

            let guard = self.gate.suppress(&[Category::Position]);
            self.states.start_animation(id, target);
            let states = Rc::clone(&self.states);
            engine.animate_to(
                id,
                target,
                self.settings.position,
                Some(Box::new(move || {
                    drop(guard);
                    states.finish(id, target);
                })),
            );
        } else {
            self.gate.with_suppressed(&[Category::Position], || {
                engine.set_position(id, target);
                for decoration in &decorations {
                    self.place_decoration(engine, decoration, None);
                }
            });
        }
        true
    }

    fn enter_ghost(&self, engine: &mut dyn RenderEngine, id: ElementId, animate_to: AnimateTo) {
        let target = animate_to.pos;
        if self.states.is_ghost_entering_to(id, target) {
            return;
        }
        debug!(id = id.to_string(), entity = animate_to.id.to_string(); "Ghost entering");

        engine.stop_animation(id);
        self.states.start_ghost(id, target);
        let states = Rc::clone(&self.states);
        let listener = self.ghost_listener.clone();
        engine.animate_to(
            id,
            target,
            self.settings.ghost,
            Some(Box::new(move || {
                states.finish(id, target);
                if let Some(listener) = listener {
                    listener(animate_to.id);
                }
            })),
        );
    }

    fn remove_all(&self, engine: &mut dyn RenderEngine, removed: &[ElementId]) -> bool {
        for id in removed {
            self.states.remove(*id);
            if engine.contains(*id) {
                engine.remove_element(*id);
            } else {
                trace!(id = id.to_string(); "Already removed");
            }
        }
        !removed.is_empty()
    }

    fn reparent_phase(&self, engine: &mut dyn RenderEngine, reparent: &[(ElementId, Option<ElementId>)]) {
        for (id, parent) in reparent {
            debug!(id = id.to_string(), parent:? = parent.map(|p| p.to_string()); "Reparenting");
            engine.move_to_parent(*id, *parent);
        }
    }

    fn decoration_phase(
        &self,
        engine: &mut dyn RenderEngine,
        next: &ElementSnapshot,
        jobs: &[DecorationJob],
    ) -> Result<(), ReconcileError> {
        if jobs.is_empty() {
            return Ok(());
        }

        batch(engine, |engine| -> Result<(), ReconcileError> {
            let _guard = self.gate.suppress(&[Category::Position]);
            for job in jobs {
                let decorations = match job {
                    DecorationJob::Place(id) => next.node(*id).into_iter().collect(),
                    DecorationJob::Follow(anchor) => decorations_of(next, *anchor),
                };
                for decoration in decorations {
                    let target = self
                        .decoration_target(&*engine, decoration, None)
                        .map_err(|source| ReconcileError::Decoration {
                            id: decoration.id(),
                            source,
                        })?;
                    if let Some(target) = target {
                        engine.set_position(decoration.id(), target);
                    }
                }
            }
            Ok(())
        })
    }

    fn place_decoration(
        &self,
        engine: &mut dyn RenderEngine,
        decoration: &Element,
        anchor_position: Option<Point>,
    ) {
        match self.decoration_target(&*engine, decoration, anchor_position) {
            Ok(Some(target)) => engine.set_position(decoration.id(), target),
            Ok(None) => {}
            Err(err) => {
                warn!(id = decoration.id().to_string(), err:%; "Cannot place decoration")
            }
        }
    }

    fn animate_decoration(&self, engine: &mut dyn RenderEngine, decoration: &Element, anchor_target: Point) {
        match self.decoration_target(&*engine, decoration, Some(anchor_target)) {
            Ok(Some(target)) => {
                engine.stop_animation(decoration.id());
                engine.animate_to(decoration.id(), target, self.settings.position, None);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(id = decoration.id().to_string(), err:%; "Cannot animate decoration")
            }
        }
    }

    /// Where `decoration` belongs, given its anchor's live geometry.
    ///
    /// `Ok(None)` when the anchor or the decoration is not live.
    fn decoration_target(
        &self,
        engine: &dyn RenderEngine,
        decoration: &Element,
        anchor_position: Option<Point>,
    ) -> Result<Option<Point>, DecorationError> {
        let data = decoration.data();
        let Some(anchor) = data.vertex() else {
            warn!(id = decoration.id().to_string(); "Decoration has no anchor vertex");
            return Ok(None);
        };
        let Some(anchor_geometry) = engine.live_geometry(anchor) else {
            warn!(
                id = decoration.id().to_string(),
                anchor = anchor.to_string();
                "Decoration anchor is not live"
            );
            return Ok(None);
        };
        let Some(own_geometry) = engine.live_geometry(decoration.id()) else {
            return Ok(None);
        };

        let padding = data.padding()?.unwrap_or(self.default_padding);
        calculate_position(
            Some(padding),
            data.alignment()?,
            &AnchorSpecs::from_geometry(&anchor_geometry, anchor_position),
            &DecorationSize::from_geometry(&own_geometry),
        )
        .map(Some)
    }
}

/// Whether a node carries no usable position.
fn is_unpositioned(node: &Element) -> bool {
    node.rendered_position().is_none() && node.position().is_none_or(Point::is_zero)
}

/// Decorations in `snapshot` anchored on `anchor`.
pub fn decorations_of(snapshot: &ElementSnapshot, anchor: ElementId) -> Vec<&Element> {
    snapshot
        .nodes()
        .iter()
        .filter(|node| node.is_decoration() && node.data().vertex() == Some(anchor))
        .collect()
}

/// Parses every decoration's attributes up front.
fn check_decorations(snapshot: &ElementSnapshot) -> Result<(), ReconcileError> {
    for node in snapshot.nodes().iter().filter(|node| node.is_decoration()) {
        let data = node.data();
        let checked = data.padding().and_then(|_| {
            data.alignment()?
                .map(|_| ())
                .ok_or(DecorationError::MissingAlignment)
        });
        checked.map_err(|source| ReconcileError::Decoration {
            id: node.id(),
            source,
        })?;
    }
    Ok(())
}

/// Orders added nodes so every parent comes before its children, keeping
/// the snapshot order otherwise.
fn parent_first<'a>(added: &[&'a Element]) -> Vec<&'a Element> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let indices: Vec<NodeIndex> = (0..added.len()).map(|i| graph.add_node(i)).collect();
    let by_id: HashMap<ElementId, NodeIndex> = added
        .iter()
        .zip(&indices)
        .map(|(node, index)| (node.id(), *index))
        .collect();

    for (node, index) in added.iter().zip(&indices) {
        if let Some(parent) = node.data().parent().and_then(|p| by_id.get(&p)) {
            graph.add_edge(*parent, *index, ());
        }
    }

    let mut visited = vec![false; added.len()];
    let mut ordered = Vec::with_capacity(added.len());
    let roots = indices.iter().filter(|index| {
        graph
            .neighbors_directed(**index, Direction::Incoming)
            .next()
            .is_none()
    });
    for root in roots {
        for index in Dfs::new(&graph, *root).iter(&graph) {
            let position = graph[index];
            if !visited[position] {
                visited[position] = true;
                ordered.push(added[position]);
            }
        }
    }

    // Nodes on a parent cycle have no root; keep them in snapshot order.
    if ordered.len() < added.len() {
        warn!(count = added.len() - ordered.len(); "Parent cycle among added nodes");
        for (position, node) in added.iter().enumerate() {
            if !visited[position] {
                ordered.push(*node);
            }
        }
    }
    ordered
}
