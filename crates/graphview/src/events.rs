//! Engine events and the boundary that forwards them to the host.
//!
//! Every engine event passes through an [`EventDispatcher`]. The dispatcher
//! keeps an inbox of everything it saw, which the view drains for its own
//! bookkeeping (drag tracking, decoration follow-up, preview requests), and
//! forwards an event to the host's [`GraphCallbacks`] only when its
//! [`Category`] is not suppressed at the moment the engine fires it.

use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use log::trace;

use graphview_core::{geometry::Point, identifier::ElementId};

use crate::{
    engine::RenderEngine,
    suppression::{Category, SuppressionGate},
};

/// Kind of engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Drag,
    Free,
    Grab,
    Position,
    LayoutStop,
    MouseOver,
    MouseOut,
    MouseMove,
    Add,
    Remove,
    Tap,
    TapStart,
    TapEnd,
    TapHold,
    ContextTap,
    Pan,
    Zoom,
    Fit,
    Change,
    Select,
    Unselect,
    Data,
}

impl EventKind {
    /// The suppression category that gates this kind of event.
    pub fn category(self) -> Category {
        match self {
            Self::Drag | Self::Free | Self::Grab => Category::Drag,
            Self::Position => Category::Position,
            Self::LayoutStop => Category::Layout,
            Self::MouseOver | Self::MouseOut | Self::MouseMove => Category::Pointer,
            Self::Add | Self::Remove => Category::Structure,
            Self::Tap | Self::TapStart | Self::TapEnd | Self::TapHold | Self::ContextTap => {
                Category::Tap
            }
            Self::Pan => Category::Pan,
            Self::Zoom => Category::Zoom,
            Self::Fit | Self::Change => Category::Viewport,
            Self::Select | Self::Unselect => Category::Selection,
            Self::Data => Category::Data,
        }
    }
}

/// What an event was fired on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// The canvas background.
    Canvas,
    Element(ElementId),
}

/// One event as emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub kind: EventKind,
    pub target: EventTarget,
    /// Pointer position relative to the page, for pointer and tap events.
    pub pointer: Option<Point>,
    pub ctrl_key: bool,
}

impl EngineEvent {
    pub fn new(kind: EventKind, target: EventTarget) -> Self {
        Self {
            kind,
            target,
            pointer: None,
            ctrl_key: false,
        }
    }

    pub fn on_canvas(kind: EventKind) -> Self {
        Self::new(kind, EventTarget::Canvas)
    }

    pub fn on_element(kind: EventKind, id: ElementId) -> Self {
        Self::new(kind, EventTarget::Element(id))
    }

    pub fn with_pointer(mut self, pointer: Point) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_ctrl_key(mut self, ctrl_key: bool) -> Self {
        self.ctrl_key = ctrl_key;
        self
    }

    pub fn element(&self) -> Option<ElementId> {
        match self.target {
            EventTarget::Element(id) => Some(id),
            EventTarget::Canvas => None,
        }
    }
}

/// Host-side receiver of widget output.
///
/// Every method defaults to a no-op so hosts implement only what they
/// listen to.
#[allow(unused_variables)]
pub trait GraphCallbacks {
    fn on_drag(&self, event: &EngineEvent) {}
    fn on_free(&self, event: &EngineEvent) {}
    fn on_grab(&self, event: &EngineEvent) {}
    fn on_position(&self, event: &EngineEvent) {}
    fn on_layout_stop(&self, event: &EngineEvent) {}
    fn on_mouse_over(&self, event: &EngineEvent) {}
    fn on_mouse_out(&self, event: &EngineEvent) {}
    fn on_remove(&self, event: &EngineEvent) {}
    fn on_tap(&self, event: &EngineEvent) {}
    fn on_tap_start(&self, event: &EngineEvent) {}
    fn on_tap_end(&self, event: &EngineEvent) {}
    fn on_tap_hold(&self, event: &EngineEvent) {}
    fn on_context_tap(&self, event: &EngineEvent) {}
    fn on_pan(&self, event: &EngineEvent) {}
    fn on_zoom(&self, event: &EngineEvent) {}
    fn on_fit(&self, event: &EngineEvent) {}
    fn on_change(&self, event: &EngineEvent) {}
    fn on_select(&self, event: &EngineEvent) {}
    fn on_unselect(&self, event: &EngineEvent) {}

    /// Called once the engine is mounted and listening.
    fn on_ready(&self, engine: &dyn RenderEngine) {}

    /// Called with a freshly captured preview image.
    fn on_update_preview(&self, image: &[u8]) {}

    /// Called when a ghost finished entering, with the entity it stood in for.
    fn on_ghost_finished(&self, entity: ElementId) {}

    /// Tap and hover events on decoration nodes.
    fn on_decoration_event(&self, event: &EngineEvent) {}

    /// Context tap (or ctrl-tap) on the canvas background, where the host
    /// shows its graph menu.
    fn on_show_menu(&self, event: &EngineEvent) {}
}

/// Callbacks that ignore everything.
#[derive(Debug, Default)]
pub struct NoopCallbacks;

impl GraphCallbacks for NoopCallbacks {}

fn forward(callbacks: &dyn GraphCallbacks, event: &EngineEvent) {
    match event.kind {
        EventKind::Drag => callbacks.on_drag(event),
        EventKind::Free => callbacks.on_free(event),
        EventKind::Grab => callbacks.on_grab(event),
        EventKind::Position => callbacks.on_position(event),
        EventKind::LayoutStop => callbacks.on_layout_stop(event),
        EventKind::MouseOver => callbacks.on_mouse_over(event),
        EventKind::MouseOut => callbacks.on_mouse_out(event),
        EventKind::Remove => callbacks.on_remove(event),
        EventKind::Tap => callbacks.on_tap(event),
        EventKind::TapStart => callbacks.on_tap_start(event),
        EventKind::TapEnd => callbacks.on_tap_end(event),
        EventKind::TapHold => callbacks.on_tap_hold(event),
        EventKind::ContextTap => callbacks.on_context_tap(event),
        EventKind::Pan => callbacks.on_pan(event),
        EventKind::Zoom => callbacks.on_zoom(event),
        EventKind::Fit => callbacks.on_fit(event),
        EventKind::Change => callbacks.on_change(event),
        EventKind::Select => callbacks.on_select(event),
        EventKind::Unselect => callbacks.on_unselect(event),
        // No host callback for these.
        EventKind::MouseMove | EventKind::Add | EventKind::Data => {}
    }
}

/// An event recorded by the dispatcher, with the gate state at emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    pub event: EngineEvent,
    /// Whether the event was withheld from the host.
    pub suppressed: bool,
}

/// Gate between engine-originated events and host callbacks.
pub struct EventDispatcher {
    gate: SuppressionGate,
    callbacks: Rc<dyn GraphCallbacks>,
    inbox: RefCell<VecDeque<ReceivedEvent>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("gate", &self.gate)
            .field("inbox", &self.inbox)
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    pub fn new(gate: SuppressionGate, callbacks: Rc<dyn GraphCallbacks>) -> Self {
        Self {
            gate,
            callbacks,
            inbox: RefCell::new(VecDeque::new()),
        }
    }

    /// Handles one event at the moment the engine emits it.
    pub fn dispatch(&self, event: &EngineEvent) {
        let suppressed = self.gate.is_suppressed(event.kind.category());
        if suppressed {
            trace!(kind:? = event.kind; "Dropping suppressed event");
        } else {
            forward(self.callbacks.as_ref(), event);
        }
        self.inbox.borrow_mut().push_back(ReceivedEvent {
            event: event.clone(),
            suppressed,
        });
    }

    /// Takes every event received since the last drain.
    pub fn drain(&self) -> Vec<ReceivedEvent> {
        self.inbox.borrow_mut().drain(..).collect()
    }

    pub fn callbacks(&self) -> &dyn GraphCallbacks {
        self.callbacks.as_ref()
    }

    pub fn gate(&self) -> &SuppressionGate {
        &self.gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<EventKind>>,
    }

    impl GraphCallbacks for Recorder {
        fn on_position(&self, event: &EngineEvent) {
            self.seen.borrow_mut().push(event.kind);
        }

        fn on_select(&self, event: &EngineEvent) {
            self.seen.borrow_mut().push(event.kind);
        }
    }

    #[test]
    fn test_suppressed_events_do_not_reach_callbacks() {
        let gate = SuppressionGate::new();
        let recorder = Rc::new(Recorder::default());
        let dispatcher = EventDispatcher::new(gate.clone(), recorder.clone());
        let v1 = ElementId::new("v1");

        {
            let _guard = gate.suppress(&[Category::Position]);
            dispatcher.dispatch(&EngineEvent::on_element(EventKind::Position, v1));
            dispatcher.dispatch(&EngineEvent::on_element(EventKind::Select, v1));
        }
        dispatcher.dispatch(&EngineEvent::on_element(EventKind::Position, v1));

        assert_eq!(
            *recorder.seen.borrow(),
            vec![EventKind::Select, EventKind::Position]
        );

        let received = dispatcher.drain();
        assert_eq!(received.len(), 3);
        assert!(received[0].suppressed);
        assert!(!received[1].suppressed);
        assert!(dispatcher.drain().is_empty());
    }

    #[test]
    fn test_event_categories() {
        assert_eq!(EventKind::Unselect.category(), Category::Selection);
        assert_eq!(EventKind::Grab.category(), Category::Drag);
        assert_eq!(EventKind::ContextTap.category(), Category::Tap);
        assert_eq!(EventKind::Pan.category(), Category::Pan);
    }

    #[test]
    fn test_event_element() {
        let id = ElementId::new("e1");
        assert_eq!(EngineEvent::on_element(EventKind::Tap, id).element(), Some(id));
        assert_eq!(EngineEvent::on_canvas(EventKind::Tap).element(), None);
    }
}
