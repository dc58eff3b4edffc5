//! Integration tests for the SceneReconciler
//!
//! These tests drive the reconciler against the in-memory engine and check
//! the mutations it issues.

use std::{cell::RefCell, rc::Rc};

use serde_json::json;

use graphview::{
    ReconcileError, ReconcileOptions, SceneReconciler, SnapshotError,
    decoration::{HorizontalAlign, VerticalAlign},
    engine::{EngineOp, GeometrySpec, MemoryEngine, RenderEngine},
    events::{EngineEvent, EventKind, EventTarget},
    geometry::{Point, Size},
    identifier::ElementId,
    reconcile::NodeState,
    snapshot::{Element, ElementSnapshot},
    suppression::{Category, SuppressionGate},
};

fn node(id: &str, x: f32, y: f32) -> Element {
    Element::new(id).with_position(Point::new(x, y))
}

fn instant() -> ReconcileOptions {
    ReconcileOptions { animate: false }
}

fn animated() -> ReconcileOptions {
    ReconcileOptions { animate: true }
}

fn setup() -> (SceneReconciler, MemoryEngine) {
    (SceneReconciler::new(SuppressionGate::new()), MemoryEngine::new())
}

#[test]
fn test_reconcile_twice_is_idempotent() {
    let (mut reconciler, mut engine) = setup();
    let snapshot = ElementSnapshot::default()
        .with_node(node("a", 10.0, 10.0).with_classes("v").with_selected(true))
        .with_node(node("b", 60.0, 10.0).with_locked(true))
        .with_edge(Element::edge("ab", "a", "b"));

    reconciler
        .reconcile(&mut engine, snapshot.clone(), animated())
        .unwrap();
    engine.take_ops();

    let outcome = reconciler
        .reconcile(&mut engine, snapshot, animated())
        .unwrap();
    assert!(!outcome.is_dirty());
    let ops = engine.take_ops();
    assert!(!ops.iter().any(EngineOp::is_structural));
    assert!(!ops.iter().any(EngineOp::is_position_change));
}

#[test]
fn test_add_remove_symmetry() {
    let (mut reconciler, mut engine) = setup();
    let previous = ElementSnapshot::default()
        .with_node(Element::new("a"))
        .with_node(Element::new("b"))
        .with_node(Element::new("c"));
    reconciler.reconcile(&mut engine, previous, instant()).unwrap();
    engine.take_ops();

    let next = ElementSnapshot::default()
        .with_node(Element::new("b"))
        .with_node(Element::new("c"))
        .with_node(Element::new("d"));
    let outcome = reconciler.reconcile(&mut engine, next, instant()).unwrap();

    assert!(outcome.nodes_changed);
    assert!(!outcome.edges_changed);
    let structural: Vec<EngineOp> = engine
        .take_ops()
        .into_iter()
        .filter(EngineOp::is_structural)
        .collect();
    assert_eq!(
        structural,
        vec![
            EngineOp::AddNode(ElementId::new("d")),
            EngineOp::Remove(ElementId::new("a")),
        ]
    );
}

#[test]
fn test_sub_unit_move_is_ignored() {
    for options in [instant(), animated()] {
        let (mut reconciler, mut engine) = setup();
        reconciler
            .reconcile(
                &mut engine,
                ElementSnapshot::default().with_node(node("a", 10.0, 10.0)),
                options,
            )
            .unwrap();
        engine.take_ops();

        let outcome = reconciler
            .reconcile(
                &mut engine,
                ElementSnapshot::default().with_node(node("a", 10.5, 10.5)),
                options,
            )
            .unwrap();

        assert!(!outcome.nodes_changed);
        assert!(!engine.ops().iter().any(EngineOp::is_position_change));
    }
}

#[test]
fn test_animated_move_suppresses_position_until_done() {
    let (mut reconciler, mut engine) = setup();
    let gate = reconciler.gate().clone();
    let a = ElementId::new("a");
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(node("a", 0.0, 0.0)),
            animated(),
        )
        .unwrap();

    let outcome = reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(node("a", 100.0, 0.0)),
            animated(),
        )
        .unwrap();

    assert!(outcome.nodes_changed);
    assert!(gate.is_suppressed(Category::Position));
    assert_eq!(
        reconciler.states().state(a),
        NodeState::Animating {
            target: Point::new(100.0, 0.0)
        }
    );

    engine.finish_animations();
    assert_eq!(engine.position(a), Some(Point::new(100.0, 0.0)));
    assert!(!gate.is_suppressed(Category::Position));
    assert_eq!(reconciler.states().state(a), NodeState::Idle);
}

#[test]
fn test_retargeting_stops_previous_animation() {
    let (mut reconciler, mut engine) = setup();
    let gate = reconciler.gate().clone();
    let a = ElementId::new("a");
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(node("a", 0.0, 0.0)),
            animated(),
        )
        .unwrap();
    for x in [100.0, 200.0] {
        reconciler
            .reconcile(
                &mut engine,
                ElementSnapshot::default().with_node(node("a", x, 0.0)),
                animated(),
            )
            .unwrap();
    }

    assert_eq!(engine.pending_animations(), 1);
    engine.finish_animations();
    assert_eq!(engine.position(a), Some(Point::new(200.0, 0.0)));
    // The first animation's guard was released when it was stopped.
    assert!(!gate.is_suppressed(Category::Position));
}

#[test]
fn test_grabbed_node_keeps_user_position() {
    let (mut reconciler, mut engine) = setup();
    let a = ElementId::new("a");
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(node("a", 0.0, 0.0)),
            instant(),
        )
        .unwrap();

    engine.grab(a);
    engine.drag_to(a, Point::new(40.0, 40.0));
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(node("a", 300.0, 300.0)),
            instant(),
        )
        .unwrap();

    assert_eq!(engine.position(a), Some(Point::new(40.0, 40.0)));
}

#[test]
fn test_decoration_is_placed_right_of_anchor() {
    let (mut reconciler, mut engine) = setup();
    let anchor = ElementId::new("v1");
    let decoration = ElementId::new("v1-badge");
    engine.set_geometry(
        anchor,
        GeometrySpec {
            size: Size::new(20.0, 20.0),
            label_size: Size::new(20.0, 20.0),
            text_h_align: HorizontalAlign::Left,
            text_v_align: VerticalAlign::Top,
        },
    );
    engine.set_geometry(
        decoration,
        GeometrySpec {
            size: Size::new(10.0, 10.0),
            label_size: Size::new(10.0, 10.0),
            ..GeometrySpec::default()
        },
    );

    let badge = Element::new("v1-badge")
        .with_attr("alignment", json!({"h": "right", "v": "center"}))
        .with_attr("vertex", "v1");
    let snapshot = ElementSnapshot::default()
        .with_node(node("v1", 100.0, 50.0))
        .with_node(badge.clone());
    reconciler.reconcile(&mut engine, snapshot, instant()).unwrap();

    // anchor.x + anchor.w / 2 + decoration.w / 2 + default padding
    assert_eq!(
        engine.position(decoration),
        Some(Point::new(100.0 + 10.0 + 5.0 + 8.0, 50.0))
    );

    // The decoration follows an animated anchor move.
    let moved = ElementSnapshot::default()
        .with_node(node("v1", 200.0, 50.0))
        .with_node(badge);
    reconciler.reconcile(&mut engine, moved, animated()).unwrap();
    engine.finish_animations();
    assert_eq!(engine.position(decoration), Some(Point::new(223.0, 50.0)));
}

fn anchored_badge() -> Element {
    Element::new("v1-badge")
        .with_attr("alignment", json!({"h": "right", "v": "center"}))
        .with_attr("vertex", "v1")
}

#[test]
fn test_instant_move_places_decorations_immediately() {
    let (mut reconciler, mut engine) = setup();
    let badge = ElementId::new("v1-badge");
    let snapshot = |x: f32| {
        ElementSnapshot::default()
            .with_node(node("v1", x, 50.0))
            .with_node(anchored_badge())
    };
    reconciler.reconcile(&mut engine, snapshot(100.0), instant()).unwrap();
    // Default geometry: 30x30 nodes, labels on top.
    assert_eq!(engine.position(badge), Some(Point::new(138.0, 50.0)));

    reconciler.reconcile(&mut engine, snapshot(200.0), instant()).unwrap();
    assert_eq!(engine.pending_animations(), 0);
    assert_eq!(engine.position(badge), Some(Point::new(238.0, 50.0)));
}

#[test]
fn test_anchor_data_change_repositions_decorations() {
    let (mut reconciler, mut engine) = setup();
    let anchor = ElementId::new("v1");
    let badge = ElementId::new("v1-badge");
    let snapshot = |label: &str| {
        ElementSnapshot::default()
            .with_node(node("v1", 100.0, 50.0).with_attr("label", label))
            .with_node(anchored_badge())
    };
    reconciler.reconcile(&mut engine, snapshot("a"), instant()).unwrap();

    // Moved behind the reconciler's back; the next data edit catches up.
    engine.set_position(anchor, Point::new(200.0, 50.0));
    assert_eq!(engine.position(badge), Some(Point::new(138.0, 50.0)));

    reconciler.reconcile(&mut engine, snapshot("b"), instant()).unwrap();
    assert_eq!(engine.position(badge), Some(Point::new(238.0, 50.0)));
}

#[test]
fn test_rendered_position_applies_only_without_position_change() {
    let (mut reconciler, mut engine) = setup();
    let gate = reconciler.gate().clone();
    let anchor = ElementId::new("v1");
    let badge = ElementId::new("v1-badge");

    let suppressed_moves = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&suppressed_moves);
    let watched = gate.clone();
    engine.subscribe(Box::new(move |event: &EngineEvent| {
        if event.kind == EventKind::Position && event.target == EventTarget::Element(anchor) {
            sink.borrow_mut().push(watched.is_suppressed(Category::Position));
        }
    }));

    let snapshot = |position: Point, rendered: Point| {
        ElementSnapshot::default()
            .with_node(
                Element::new("v1")
                    .with_position(position)
                    .with_rendered_position(rendered),
            )
            .with_node(anchored_badge())
    };
    let origin = Point::new(100.0, 50.0);
    reconciler
        .reconcile(&mut engine, snapshot(origin, origin), instant())
        .unwrap();
    engine.take_ops();
    suppressed_moves.borrow_mut().clear();

    reconciler
        .reconcile(&mut engine, snapshot(origin, Point::new(300.0, 50.0)), instant())
        .unwrap();
    assert!(
        engine
            .take_ops()
            .contains(&EngineOp::SetRenderedPosition(anchor, Point::new(300.0, 50.0)))
    );
    assert_eq!(engine.position(anchor), Some(Point::new(300.0, 50.0)));
    assert_eq!(engine.position(badge), Some(Point::new(338.0, 50.0)));
    assert!(!suppressed_moves.borrow().is_empty());
    assert!(suppressed_moves.borrow().iter().all(|suppressed| *suppressed));
    assert!(!gate.is_suppressed(Category::Position));

    // When both change, the model position wins.
    reconciler
        .reconcile(
            &mut engine,
            snapshot(Point::new(500.0, 50.0), Point::new(10.0, 10.0)),
            instant(),
        )
        .unwrap();
    let ops = engine.take_ops();
    assert!(
        !ops.iter()
            .any(|op| matches!(op, EngineOp::SetRenderedPosition(..)))
    );
    assert_eq!(engine.position(anchor), Some(Point::new(500.0, 50.0)));
}

#[test]
fn test_malformed_decoration_is_rejected() {
    let (mut reconciler, mut engine) = setup();
    let badge = Element::new("badge")
        .with_attr("alignment", json!({"h": "diagonal"}))
        .with_attr("vertex", "v1");
    let snapshot = ElementSnapshot::default()
        .with_node(Element::new("v1"))
        .with_node(badge);

    let err = reconciler
        .reconcile(&mut engine, snapshot, instant())
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Decoration { .. }));
    assert!(reconciler.previous().is_empty());
}

#[test]
fn test_parent_is_added_before_child() {
    let (mut reconciler, mut engine) = setup();
    let snapshot = ElementSnapshot::default()
        .with_node(Element::new("child").with_parent("group"))
        .with_node(Element::new("group"));

    reconciler.reconcile(&mut engine, snapshot, instant()).unwrap();

    let added: Vec<EngineOp> = engine
        .ops()
        .iter()
        .filter(|op| matches!(op, EngineOp::AddNode(_)))
        .cloned()
        .collect();
    assert_eq!(
        added,
        vec![
            EngineOp::AddNode(ElementId::new("group")),
            EngineOp::AddNode(ElementId::new("child")),
        ]
    );
    assert_eq!(
        engine.parent(ElementId::new("child")),
        Some(ElementId::new("group"))
    );
}

#[test]
fn test_node_batch_precedes_edge_batch() {
    let (mut reconciler, mut engine) = setup();
    let snapshot = ElementSnapshot::default()
        .with_node(Element::new("a"))
        .with_node(Element::new("b"))
        .with_edge(Element::edge("ab", "a", "b"));
    reconciler.reconcile(&mut engine, snapshot, instant()).unwrap();

    let ops = engine.ops();
    let position = |op: &EngineOp| ops.iter().position(|o| o == op).unwrap();
    assert_eq!(ops[0], EngineOp::BeginBatch);
    assert!(
        position(&EngineOp::AddNode(ElementId::new("b")))
            < position(&EngineOp::AddEdge(ElementId::new("ab")))
    );
    assert_eq!(
        ops.iter()
            .filter(|op| matches!(op, EngineOp::BeginBatch))
            .count(),
        2
    );
    assert_eq!(engine.batch_depth(), 0);
}

#[test]
fn test_dangling_edge_is_rejected_before_mutation() {
    let (mut reconciler, mut engine) = setup();
    let snapshot = ElementSnapshot::default()
        .with_node(Element::new("a"))
        .with_edge(Element::edge("ax", "a", "x"));

    let err = reconciler
        .reconcile(&mut engine, snapshot, instant())
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Snapshot(SnapshotError::DanglingEdge { .. })
    ));
    assert!(engine.ops().is_empty());
}

#[test]
fn test_attribute_changes_are_applied() {
    let (mut reconciler, mut engine) = setup();
    let a = ElementId::new("a");
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(Element::new("a").with_classes("v")),
            instant(),
        )
        .unwrap();

    let next = Element::new("a")
        .with_classes("v focused")
        .with_attr("title", "Alpha")
        .with_grabbable(false)
        .with_selected(true);
    reconciler
        .reconcile(&mut engine, ElementSnapshot::default().with_node(next), instant())
        .unwrap();

    assert_eq!(engine.classes(a).map(|c| c.as_str()), Some("v focused"));
    assert_eq!(
        engine.data(a).and_then(|d| d.get("title")),
        Some(&json!("Alpha"))
    );
    assert!(!engine.is_grabbable(a));
    assert!(engine.is_selected(a));
}

#[test]
fn test_removed_attribute_is_dropped() {
    let (mut reconciler, mut engine) = setup();
    let a = ElementId::new("a");
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(Element::new("a").with_attr("title", "x")),
            instant(),
        )
        .unwrap();
    reconciler
        .reconcile(
            &mut engine,
            ElementSnapshot::default().with_node(Element::new("a")),
            instant(),
        )
        .unwrap();

    assert_eq!(engine.data(a).and_then(|d| d.get("title")), None);
}
