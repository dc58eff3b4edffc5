//! Edges that highlight paths between two vertices.
//!
//! In "focus paths" mode the host supplies a [`PathSpec`]: a list of vertex
//! paths from a source to a target. Every consecutive pair of *visible*
//! vertices on a path gets connected, either by annotating an edge the
//! snapshot already has or by synthesizing a temporary one. Vertices missing
//! from the snapshot are skipped and counted, and the count is written on the
//! bridging temporary edge.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use graphview_core::{color::Color, identifier::ElementId};

use crate::snapshot::{Classes, Element, ElementSnapshot};

/// Class added to every edge on a highlighted path.
pub const PATH_EDGE_CLASS: &str = "path-edge";
/// Class of synthesized path edges.
pub const PATH_TEMP_CLASS: &str = "path-temp";
/// Class of synthesized path edges that bridge hidden vertices.
pub const PATH_HIDDEN_VERTS_CLASS: &str = "path-hidden-verts";

/// Paths to highlight, `drawPaths` in the host input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSpec {
    pub paths: Vec<Vec<ElementId>>,
    pub source_id: ElementId,
    pub target_id: ElementId,
}

/// Edges of a snapshot indexed by their endpoints, ignoring direction.
#[derive(Debug, Default)]
pub struct EdgeIndex {
    by_endpoints: HashMap<(String, String), Vec<ElementId>>,
}

impl EdgeIndex {
    pub fn from_snapshot(snapshot: &ElementSnapshot) -> Self {
        let mut index = Self::default();
        for edge in snapshot.edges() {
            if let (Some(source), Some(target)) = (edge.data().source(), edge.data().target()) {
                index
                    .by_endpoints
                    .entry(Self::key(source, target))
                    .or_default()
                    .push(edge.id());
            }
        }
        index
    }

    /// Edges connecting `a` and `b` in either direction.
    pub fn between(&self, a: ElementId, b: ElementId) -> &[ElementId] {
        self.by_endpoints
            .get(&Self::key(a, b))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn key(a: ElementId, b: ElementId) -> (String, String) {
        let (a, b) = (a.to_string(), b.to_string());
        if a <= b { (a, b) } else { (b, a) }
    }
}

/// One edge produced by [`synthesize`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathEdge {
    /// Existing edges to style as part of a path.
    Annotate { edges: Vec<ElementId>, color: Color },
    /// A temporary edge to add.
    Synthesize(Element),
}

/// Computes the path edges for `spec`.
///
/// `visible` holds the node ids of the snapshot being rendered. Path `i` of
/// `n` is colored by rotating `base` by `i * 360 / n` degrees. Synthesized
/// edge ids depend only on their endpoints and path index, so repeating a
/// request interns no new ids.
pub fn synthesize(
    spec: &PathSpec,
    visible: &HashSet<ElementId>,
    edges: &EdgeIndex,
    base: Color,
) -> Vec<PathEdge> {
    let path_count = spec.paths.len();
    let mut result = Vec::new();

    for (i, path) in spec.paths.iter().enumerate() {
        let color = base.shift_hue(i as f32 * (360.0 / path_count as f32));
        let mut last = spec.source_id;
        let mut skipped = 0usize;

        let inner = path
            .iter()
            .filter(|vertex| **vertex != spec.source_id && **vertex != spec.target_id);
        for vertex in inner {
            if visible.contains(vertex) {
                result.push(edge_between(last, *vertex, skipped, i, color, edges));
                last = *vertex;
                skipped = 0;
            } else {
                skipped += 1;
            }
        }
        result.push(edge_between(last, spec.target_id, skipped, i, color, edges));
    }

    trace!(paths = path_count, edges = result.len(); "Synthesized path edges");
    result
}

fn edge_between(
    from: ElementId,
    to: ElementId,
    hidden: usize,
    path_index: usize,
    color: Color,
    edges: &EdgeIndex,
) -> PathEdge {
    let existing = edges.between(from, to);
    if !existing.is_empty() {
        return PathEdge::Annotate {
            edges: existing.to_vec(),
            color,
        };
    }

    let mut classes = Classes::new(&format!("{PATH_EDGE_CLASS} {PATH_TEMP_CLASS}"));
    if hidden > 0 {
        classes.add(PATH_HIDDEN_VERTS_CLASS);
    }

    let mut edge = Element::edge(format!("{from}-{to}path={path_index}"), from, to)
        .with_classes(classes)
        .with_attr("pathColor", color.to_css_hex());
    if let Some(label) = hidden_label(hidden) {
        edge = edge.with_attr("label", label);
    }
    PathEdge::Synthesize(edge)
}

/// Label of an edge that bridges `count` hidden vertices.
fn hidden_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("1 hidden vertex".to_string()),
        n => Some(format!("{} hidden vertices", pretty_number(n))),
    }
}

/// Formats `n` with comma thousands separators.
fn pretty_number(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Materializes the path edges of `spec` into `snapshot`.
///
/// Existing edges gain the path class and a `pathColor`; synthesized edges
/// are appended unless an edge with the same id is already present. Returns
/// how many edges were annotated or added.
pub fn apply_paths(snapshot: &mut ElementSnapshot, spec: &PathSpec, base: Color) -> usize {
    let visible: HashSet<ElementId> = snapshot.nodes().iter().map(Element::id).collect();
    let index = EdgeIndex::from_snapshot(snapshot);
    let mut touched = 0;

    for path_edge in synthesize(spec, &visible, &index, base) {
        match path_edge {
            PathEdge::Annotate { edges, color } => {
                for edge in snapshot
                    .edges_mut()
                    .iter_mut()
                    .filter(|edge| edges.contains(&edge.id()))
                {
                    edge.classes_mut().add(PATH_EDGE_CLASS);
                    edge.data_mut().insert("pathColor", color.to_css_hex());
                    touched += 1;
                }
            }
            PathEdge::Synthesize(edge) => {
                if snapshot.edges().iter().any(|e| e.id() == edge.id()) {
                    debug!(id = edge.id().to_string(); "Path edge already present");
                    continue;
                }
                snapshot.push_edge(edge);
                touched += 1;
            }
        }
    }
    touched
}
