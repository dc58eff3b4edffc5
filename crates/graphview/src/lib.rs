//! Graphview - declarative scene reconciliation for graph-drawing engines.
//!
//! A host describes what a graph should show as an [`ElementSnapshot`];
//! [`GraphView`] turns each new snapshot into the minimal set of imperative
//! mutations against a stateful [`RenderEngine`], while keeping animations
//! continuous and programmatic changes from being reported back as user
//! input.
//!
//! # Examples
//!
//! ```
//! use std::{rc::Rc, time::Duration};
//!
//! use graphview::{
//!     GraphProps, GraphView, NoopCallbacks,
//!     config::ViewConfig,
//!     engine::MemoryEngine,
//!     geometry::Point,
//!     snapshot::{Element, ElementSnapshot},
//! };
//!
//! let mut engine = MemoryEngine::new();
//! let mut view = GraphView::new(ViewConfig::default(), Rc::new(NoopCallbacks)).unwrap();
//! view.mount(&mut engine, Point::default());
//!
//! let snapshot = ElementSnapshot::default()
//!     .with_node(Element::new("a").with_position(Point::new(10.0, 10.0)))
//!     .with_node(Element::new("b").with_position(Point::new(80.0, 10.0)))
//!     .with_edge(Element::edge("a-b", "a", "b"));
//!
//! let outcome = view
//!     .update(&mut engine, GraphProps::new(snapshot), Duration::ZERO)
//!     .unwrap();
//! assert!(outcome.nodes_changed && outcome.edges_changed);
//! assert_eq!(engine.node_ids().len(), 2);
//! ```

pub mod config;
pub mod decoration;
pub mod draw_edge;
pub mod engine;
pub mod events;
pub mod paths;
pub mod preview;
pub mod reconcile;
pub mod snapshot;
pub mod suppression;
pub mod viewport;

mod error;
mod view;

pub use graphview_core::{animation, color, geometry, identifier};

pub use error::{
    ConfigError, DecorationError, GraphViewError, ReconcileError, SnapshotError, UnknownOption,
};
pub use events::{GraphCallbacks, NoopCallbacks};
pub use reconcile::{ReconcileOptions, ReconcileOutcome, SceneReconciler};
pub use snapshot::{Element, ElementSnapshot};
pub use view::{GraphProps, GraphView, SelectCommand};
