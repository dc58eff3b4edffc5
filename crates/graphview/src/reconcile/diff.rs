//! Snapshot classification and field-level diffs.

use std::collections::{HashMap, HashSet};

use log::trace;

use graphview_core::identifier::ElementId;

use crate::{error::ReconcileError, snapshot::Element};

/// Element fields the reconciler knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    Data,
    Grabbable,
    Selectable,
    Locked,
    Selected,
    Classes,
    Position,
    RenderedPosition,
}

/// An element present in both snapshots, with what changed.
#[derive(Debug)]
pub struct Modified<'a> {
    pub old: &'a Element,
    pub new: &'a Element,
    pub changes: Vec<FieldChange>,
}

impl Modified<'_> {
    pub fn has(&self, change: FieldChange) -> bool {
        self.changes.contains(&change)
    }
}

/// Classification of one snapshot sequence against its predecessor.
#[derive(Debug, Default)]
pub struct GroupPlan<'a> {
    pub added: Vec<&'a Element>,
    pub removed: Vec<ElementId>,
    pub modified: Vec<Modified<'a>>,
}

impl GroupPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.iter().all(|m| m.changes.is_empty())
    }
}

/// Splits `next` against `previous` into added, removed and modified
/// elements, diffing every modified one.
///
/// # Errors
///
/// Returns [`ReconcileError::UnhandledChange`] for the first element whose
/// change falls outside the known fields; nothing has been applied then.
pub fn classify<'a>(
    previous: &'a [Element],
    next: &'a [Element],
) -> Result<GroupPlan<'a>, ReconcileError> {
    let old_by_id: HashMap<ElementId, &Element> = previous.iter().map(|e| (e.id(), e)).collect();
    let next_ids: HashSet<ElementId> = next.iter().map(Element::id).collect();

    let mut plan = GroupPlan::default();
    for element in next {
        match old_by_id.get(&element.id()) {
            Some(&old) => {
                let changes = diff_element(old, element)?;
                if !changes.is_empty() {
                    trace!(id = element.id().to_string(), changes:?; "Element changed");
                }
                plan.modified.push(Modified {
                    old,
                    new: element,
                    changes,
                });
            }
            None => plan.added.push(element),
        }
    }
    plan.removed = previous
        .iter()
        .map(Element::id)
        .filter(|id| !next_ids.contains(id))
        .collect();

    Ok(plan)
}

/// Field-level diff of two versions of one element.
///
/// Optional fields that disappear are not changes: there is nothing to apply
/// for them. Top-level keys outside the known fields are fatal when they
/// appear or change.
///
/// # Errors
///
/// Returns [`ReconcileError::UnhandledChange`] naming the offending key.
pub fn diff_element(old: &Element, new: &Element) -> Result<Vec<FieldChange>, ReconcileError> {
    for (key, value) in new.extra() {
        if old.extra().get(key) != Some(value) {
            return Err(ReconcileError::UnhandledChange {
                id: new.id(),
                field: key.clone(),
            });
        }
    }

    fn appeared_or_changed<T: PartialEq>(old: Option<T>, new: Option<T>) -> bool {
        new.is_some() && old != new
    }

    let mut changes = Vec::new();
    if old.data() != new.data() {
        changes.push(FieldChange::Data);
    }
    if appeared_or_changed(old.raw_grabbable(), new.raw_grabbable()) {
        changes.push(FieldChange::Grabbable);
    }
    if appeared_or_changed(old.raw_selectable(), new.raw_selectable()) {
        changes.push(FieldChange::Selectable);
    }
    if appeared_or_changed(old.raw_locked(), new.raw_locked()) {
        changes.push(FieldChange::Locked);
    }
    if old.selected() != new.selected() {
        changes.push(FieldChange::Selected);
    }
    if old.classes() != new.classes() {
        changes.push(FieldChange::Classes);
    }
    if appeared_or_changed(old.position(), new.position()) {
        changes.push(FieldChange::Position);
    }
    if appeared_or_changed(old.rendered_position(), new.rendered_position()) {
        changes.push(FieldChange::RenderedPosition);
    }
    Ok(changes)
}
