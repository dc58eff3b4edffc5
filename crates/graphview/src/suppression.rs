//! Category-scoped gating of engine events.
//!
//! The engine emits the same events for a user dragging a node as for the
//! reconciler moving it. Before mutating, the reconciler takes a
//! [`SuppressionGuard`] for the affected categories; while any guard for a
//! category is alive the event dispatcher drops events of that category.
//!
//! Guards are counted rather than flagged, so nested or overlapping windows
//! (an instant move inside an animated one) only reopen the gate when the
//! last of them is dropped.

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use log::trace;

/// Named class of engine events that can be gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Position,
    Selection,
    Pan,
    Zoom,
    Data,
    Drag,
    Tap,
    Pointer,
    Layout,
    Structure,
    Viewport,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Position => "position",
            Self::Selection => "selection",
            Self::Pan => "pan",
            Self::Zoom => "zoom",
            Self::Data => "data",
            Self::Drag => "drag",
            Self::Tap => "tap",
            Self::Pointer => "pointer",
            Self::Layout => "layout",
            Self::Structure => "structure",
            Self::Viewport => "viewport",
        };
        f.write_str(name)
    }
}

type Counters = Rc<RefCell<HashMap<Category, usize>>>;

/// Shared suppression state.
///
/// Cloning is cheap and every clone observes the same counters, which lets
/// the reconciler, the viewport controller and the event dispatcher share one
/// gate.
#[derive(Debug, Clone, Default)]
pub struct SuppressionGate {
    counters: Counters,
}

impl SuppressionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `categories` suppressed until the returned guard is dropped.
    #[must_use = "events are only suppressed while the guard is alive"]
    pub fn suppress(&self, categories: &[Category]) -> SuppressionGuard {
        {
            let mut counters = self.counters.borrow_mut();
            for category in categories {
                *counters.entry(*category).or_default() += 1;
            }
        }
        trace!(categories:?; "Suppressing events");
        SuppressionGuard {
            counters: Rc::clone(&self.counters),
            categories: categories.to_vec(),
        }
    }

    /// Runs `f` with `categories` suppressed.
    ///
    /// The categories are released when `f` returns or unwinds.
    pub fn with_suppressed<R>(&self, categories: &[Category], f: impl FnOnce() -> R) -> R {
        let _guard = self.suppress(categories);
        f()
    }

    pub fn is_suppressed(&self, category: Category) -> bool {
        self.counters
            .borrow()
            .get(&category)
            .is_some_and(|count| *count > 0)
    }
}

/// Scope token returned by [`SuppressionGate::suppress`].
///
/// Dropping it releases its categories. A guard may be moved into an
/// animation completion to keep a category suppressed until the animation
/// finishes or is cancelled.
#[derive(Debug)]
pub struct SuppressionGuard {
    counters: Counters,
    categories: Vec<Category>,
}

impl SuppressionGuard {
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        let mut counters = self.counters.borrow_mut();
        for category in &self.categories {
            if let Some(count) = counters.get_mut(category) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = SuppressionGate::new();
        assert!(!gate.is_suppressed(Category::Position));

        let guard = gate.suppress(&[Category::Position, Category::Data]);
        assert!(gate.is_suppressed(Category::Position));
        assert!(gate.is_suppressed(Category::Data));
        assert!(!gate.is_suppressed(Category::Selection));

        drop(guard);
        assert!(!gate.is_suppressed(Category::Position));
        assert!(!gate.is_suppressed(Category::Data));
    }

    #[test]
    fn test_nested_guards_count() {
        let gate = SuppressionGate::new();
        let outer = gate.suppress(&[Category::Position]);
        let inner = gate.suppress(&[Category::Position]);

        drop(inner);
        assert!(gate.is_suppressed(Category::Position));
        drop(outer);
        assert!(!gate.is_suppressed(Category::Position));
    }

    #[test]
    fn test_with_suppressed_scopes_the_closure() {
        let gate = SuppressionGate::new();
        let seen = gate.with_suppressed(&[Category::Pan, Category::Zoom], || {
            (
                gate.is_suppressed(Category::Pan),
                gate.is_suppressed(Category::Zoom),
            )
        });
        assert_eq!(seen, (true, true));
        assert!(!gate.is_suppressed(Category::Pan));
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let gate = SuppressionGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gate.with_suppressed::<()>(&[Category::Selection], || panic!("boom"))
        }));
        assert!(result.is_err());
        assert!(!gate.is_suppressed(Category::Selection));
    }

    #[test]
    fn test_clones_share_state() {
        let gate = SuppressionGate::new();
        let other = gate.clone();
        let _guard = gate.suppress(&[Category::Layout]);
        assert!(other.is_suppressed(Category::Layout));
    }
}
