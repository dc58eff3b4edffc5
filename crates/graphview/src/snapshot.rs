//! The declarative element snapshot supplied by the host.
//!
//! A snapshot is two ordered sequences, nodes and edges, describing what the
//! graph should show. The reconciler only ever diffs snapshots against each
//! other; it never reads the live engine state to decide *what* changed.
//!
//! Element attributes live in an open [`ElementData`] map. A handful of keys
//! carry meaning for the reconciler:
//!
//! | key         | meaning                                                   |
//! |-------------|-----------------------------------------------------------|
//! | `parent`    | compound parent node id                                   |
//! | `source`    | edge source node id                                       |
//! | `target`    | edge target node id                                       |
//! | `alignment` | marks a decoration; `{h, v}` placement around its anchor  |
//! | `padding`   | decoration gap `{x, y}`                                   |
//! | `vertex`    | decoration anchor, an id or an object with an `id`        |
//! | `animateTo` | marks a ghost; `{id, pos}` resting entity and position    |

use std::{collections::HashSet, fmt};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphview_core::{geometry::Point, identifier::ElementId};

use crate::{
    decoration::{Alignment, Padding},
    error::{DecorationError, SnapshotError},
};

/// Which sequence of a snapshot an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Nodes,
    Edges,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes => f.write_str("nodes"),
            Self::Edges => f.write_str("edges"),
        }
    }
}

/// Target of a ghost element's entrance animation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AnimateTo {
    /// The entity the ghost stands in for.
    pub id: ElementId,
    /// Resting position in model coordinates.
    pub pos: Point,
}

/// Open attribute map attached to every element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementData(IndexMap<String, Value>);

impl ElementData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of this map without the `parent` key.
    pub fn without_parent(&self) -> Self {
        let mut data = self.clone();
        data.0.shift_remove("parent");
        data
    }

    /// Compound parent id.
    pub fn parent(&self) -> Option<ElementId> {
        self.id_at("parent")
    }

    /// Edge source id.
    pub fn source(&self) -> Option<ElementId> {
        self.id_at("source")
    }

    /// Edge target id.
    pub fn target(&self) -> Option<ElementId> {
        self.id_at("target")
    }

    /// Decoration anchor id.
    ///
    /// Accepts either a plain id or an entity object carrying an `id`.
    pub fn vertex(&self) -> Option<ElementId> {
        match self.get("vertex")? {
            Value::String(id) => Some(ElementId::new(id)),
            Value::Object(entity) => entity.get("id")?.as_str().map(ElementId::new),
            _ => None,
        }
    }

    /// Whether this element is a decoration.
    pub fn has_alignment(&self) -> bool {
        self.contains_key("alignment")
    }

    /// Parsed decoration alignment; `Ok(None)` when the key is absent.
    pub fn alignment(&self) -> Result<Option<Alignment>, DecorationError> {
        self.parse_at("alignment")
    }

    /// Parsed decoration padding; `Ok(None)` when the key is absent.
    pub fn padding(&self) -> Result<Option<Padding>, DecorationError> {
        self.parse_at("padding")
    }

    /// Whether this element is a ghost.
    pub fn has_animate_to(&self) -> bool {
        self.contains_key("animateTo")
    }

    /// Parsed ghost target, `None` when absent or malformed.
    pub fn animate_to(&self) -> Option<AnimateTo> {
        self.parse_at("animateTo").ok().flatten()
    }

    fn id_at(&self, key: &str) -> Option<ElementId> {
        self.get(key)?.as_str().map(ElementId::new)
    }

    fn parse_at<T: for<'de> Deserialize<'de>>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, DecorationError> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|err| {
                    DecorationError::InvalidAttribute {
                        key,
                        reason: err.to_string(),
                    }
                })
            })
            .transpose()
    }
}

/// Space-separated class (tag) set used as style and selector hooks.
///
/// Whitespace is normalized on construction, so two class strings that
/// differ only in spacing compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub struct Classes(String);

impl Classes {
    pub fn new(classes: &str) -> Self {
        Self(classes.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.0.split(' ').any(|existing| existing == class)
    }

    /// Appends `class` unless it is already present.
    pub fn add(&mut self, class: &str) {
        if class.is_empty() || self.contains(class) {
            return;
        }
        if !self.0.is_empty() {
            self.0.push(' ');
        }
        self.0.push_str(class);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Option<String>> for Classes {
    fn from(classes: Option<String>) -> Self {
        classes.map(|c| Self::new(&c)).unwrap_or_default()
    }
}

impl From<Classes> for String {
    fn from(classes: Classes) -> Self {
        classes.0
    }
}

impl From<&str> for Classes {
    fn from(classes: &str) -> Self {
        Self::new(classes)
    }
}

/// One node or edge entry of a snapshot.
///
/// Top-level keys the reconciler does not know about are kept in an
/// overflow map so that a change to them can be reported instead of being
/// silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    id: ElementId,
    #[serde(default)]
    data: ElementData,
    #[serde(default)]
    classes: Classes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered_position: Option<Point>,
    #[serde(default)]
    selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    grabbable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked: Option<bool>,
    #[serde(flatten)]
    extra: IndexMap<String, Value>,
}

impl Element {
    /// Creates an element with the given id and no attributes.
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self {
            id: id.into(),
            data: ElementData::default(),
            classes: Classes::default(),
            position: None,
            rendered_position: None,
            selected: false,
            grabbable: None,
            selectable: None,
            locked: None,
            extra: IndexMap::new(),
        }
    }

    /// Creates an edge element between `source` and `target`.
    pub fn edge(
        id: impl Into<ElementId>,
        source: impl Into<ElementId>,
        target: impl Into<ElementId>,
    ) -> Self {
        let (source, target) = (source.into(), target.into());
        let mut edge = Self::new(id);
        edge.data.insert("source", source.to_string());
        edge.data.insert("target", target.to_string());
        edge
    }

    /// Replaces the attribute map. Endpoints set through [`Element::edge`]
    /// are kept unless `data` carries its own.
    pub fn with_data(mut self, mut data: ElementData) -> Self {
        for key in ["source", "target"] {
            if let Some(value) = self.data.get(key).filter(|_| !data.contains_key(key)) {
                data.insert(key, value.clone());
            }
        }
        self.data = data;
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key, value);
        self
    }

    pub fn with_parent(self, parent: impl Into<ElementId>) -> Self {
        let parent = parent.into();
        self.with_attr("parent", parent.to_string())
    }

    pub fn with_classes(mut self, classes: impl Into<Classes>) -> Self {
        self.classes = classes.into();
        self
    }

    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_rendered_position(mut self, position: Point) -> Self {
        self.rendered_position = Some(position);
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_grabbable(mut self, grabbable: bool) -> Self {
        self.grabbable = Some(grabbable);
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = Some(selectable);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    /// Sets a top-level key outside the known element fields.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn data(&self) -> &ElementData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ElementData {
        &mut self.data
    }

    pub fn classes(&self) -> &Classes {
        &self.classes
    }

    pub fn classes_mut(&mut self) -> &mut Classes {
        &mut self.classes
    }

    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn rendered_position(&self) -> Option<Point> {
        self.rendered_position
    }

    pub fn selected(&self) -> bool {
        self.selected
    }

    /// Absent capabilities read as `false`.
    pub fn grabbable(&self) -> bool {
        self.grabbable.unwrap_or(false)
    }

    pub fn selectable(&self) -> bool {
        self.selectable.unwrap_or(false)
    }

    pub fn locked(&self) -> bool {
        self.locked.unwrap_or(false)
    }

    pub(crate) fn raw_grabbable(&self) -> Option<bool> {
        self.grabbable
    }

    pub(crate) fn raw_selectable(&self) -> Option<bool> {
        self.selectable
    }

    pub(crate) fn raw_locked(&self) -> Option<bool> {
        self.locked
    }

    pub(crate) fn extra(&self) -> &IndexMap<String, Value> {
        &self.extra
    }

    /// Whether this node is a decoration.
    pub fn is_decoration(&self) -> bool {
        self.data.has_alignment()
    }

    /// Whether this node is a ghost.
    pub fn is_ghost(&self) -> bool {
        self.data.has_animate_to()
    }
}

/// Declarative description of everything the graph should show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    #[serde(default)]
    nodes: Vec<Element>,
    #[serde(default)]
    edges: Vec<Element>,
}

impl ElementSnapshot {
    pub fn new(nodes: Vec<Element>, edges: Vec<Element>) -> Self {
        Self { nodes, edges }
    }

    pub fn with_node(mut self, node: Element) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Element) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn push_node(&mut self, node: Element) {
        self.nodes.push(node);
    }

    pub fn push_edge(&mut self, edge: Element) {
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> &[Element] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Element] {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut [Element] {
        &mut self.edges
    }

    pub fn elements(&self, group: Group) -> &[Element] {
        match group {
            Group::Nodes => &self.nodes,
            Group::Edges => &self.edges,
        }
    }

    pub fn node(&self, id: ElementId) -> Option<&Element> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Checks the snapshot invariants against the previously applied snapshot.
    ///
    /// Ids must be unique per sequence, and every edge endpoint must name a
    /// node of this snapshot or of `previous`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SnapshotError`] found.
    pub fn validate(&self, previous: &ElementSnapshot) -> Result<(), SnapshotError> {
        for group in [Group::Nodes, Group::Edges] {
            let mut seen = HashSet::new();
            for element in self.elements(group) {
                if !seen.insert(element.id) {
                    return Err(SnapshotError::DuplicateId {
                        group,
                        id: element.id,
                    });
                }
            }
        }

        let known: HashSet<ElementId> = self
            .nodes
            .iter()
            .chain(previous.nodes.iter())
            .map(Element::id)
            .collect();

        for edge in &self.edges {
            for (endpoint, node) in [
                ("source", edge.data.source()),
                ("target", edge.data.target()),
            ] {
                let node = node.ok_or(SnapshotError::MissingEndpoint {
                    id: edge.id,
                    endpoint,
                })?;
                if !known.contains(&node) {
                    return Err(SnapshotError::DanglingEdge { id: edge.id, node });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::decoration::{HorizontalAlign, VerticalAlign};

    #[test]
    fn test_element_deserialize_known_and_extra_fields() {
        let element: Element = serde_json::from_value(json!({
            "id": "v1",
            "data": { "parent": "p1", "label": "Alice" },
            "classes": "v  selected-ish",
            "position": { "x": 10, "y": 20 },
            "grabbable": true,
            "pannable": false
        }))
        .unwrap();

        assert_eq!(element.id(), "v1");
        assert_eq!(element.data().parent(), Some(ElementId::new("p1")));
        assert_eq!(element.classes().as_str(), "v selected-ish");
        assert_eq!(element.position(), Some(Point::new(10.0, 20.0)));
        assert!(element.grabbable());
        assert!(!element.selectable());
        assert_eq!(element.extra().get("pannable"), Some(&json!(false)));
    }

    #[test]
    fn test_null_classes_read_as_empty() {
        let element: Element = serde_json::from_value(json!({"id": "e", "classes": null})).unwrap();
        assert!(element.classes().is_empty());
    }

    #[test]
    fn test_classes_add_is_idempotent() {
        let mut classes = Classes::new("e");
        classes.add("path-edge");
        classes.add("path-edge");
        assert_eq!(classes.as_str(), "e path-edge");

        let mut empty = Classes::default();
        empty.add("path-edge");
        assert_eq!(empty.as_str(), "path-edge");
    }

    #[test]
    fn test_decoration_accessors() {
        let data = ElementData::new()
            .with("alignment", json!({"h": "right", "v": "top"}))
            .with("vertex", json!({"id": "v1", "title": "anything"}));

        let alignment = data.alignment().unwrap().unwrap();
        assert_eq!(alignment.h, HorizontalAlign::Right);
        assert_eq!(alignment.v, VerticalAlign::Top);
        assert_eq!(data.vertex(), Some(ElementId::new("v1")));
        assert_eq!(data.padding().unwrap(), None);
    }

    #[test]
    fn test_invalid_alignment_is_reported() {
        let data = ElementData::new().with("alignment", json!({"h": "sideways", "v": "top"}));
        assert!(matches!(
            data.alignment(),
            Err(DecorationError::InvalidAttribute { key: "alignment", .. })
        ));
    }

    #[test]
    fn test_animate_to() {
        let data = ElementData::new().with("animateTo", json!({"id": "v1", "pos": {"x": 5, "y": 6}}));
        let animate_to = data.animate_to().unwrap();
        assert_eq!(animate_to.id, "v1");
        assert_eq!(animate_to.pos, Point::new(5.0, 6.0));
    }

    #[test]
    fn test_without_parent() {
        let data = ElementData::new().with("parent", "p").with("label", "x");
        let detached = data.without_parent();
        assert_eq!(detached.parent(), None);
        assert!(detached.contains_key("label"));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let snapshot = ElementSnapshot::default()
            .with_node(Element::new("a"))
            .with_node(Element::new("a"));

        assert_eq!(
            snapshot.validate(&ElementSnapshot::default()),
            Err(SnapshotError::DuplicateId {
                group: Group::Nodes,
                id: ElementId::new("a"),
            })
        );
    }

    #[test]
    fn test_validate_same_id_across_groups_is_allowed() {
        let snapshot = ElementSnapshot::default()
            .with_node(Element::new("a"))
            .with_node(Element::new("b"))
            .with_edge(Element::edge("a", "a", "b"));

        assert!(snapshot.validate(&ElementSnapshot::default()).is_ok());
    }

    #[test]
    fn test_validate_edges_may_reference_previous_nodes() {
        let previous = ElementSnapshot::default().with_node(Element::new("gone"));
        let snapshot = ElementSnapshot::default()
            .with_node(Element::new("a"))
            .with_edge(Element::edge("e", "a", "gone"));

        assert!(snapshot.validate(&previous).is_ok());
        assert_eq!(
            snapshot.validate(&ElementSnapshot::default()),
            Err(SnapshotError::DanglingEdge {
                id: ElementId::new("e"),
                node: ElementId::new("gone"),
            })
        );
    }

    #[test]
    fn test_validate_missing_endpoint() {
        let snapshot = ElementSnapshot::default()
            .with_node(Element::new("a"))
            .with_edge(Element::new("e").with_attr("source", "a"));

        assert_eq!(
            snapshot.validate(&ElementSnapshot::default()),
            Err(SnapshotError::MissingEndpoint {
                id: ElementId::new("e"),
                endpoint: "target",
            })
        );
    }
}
