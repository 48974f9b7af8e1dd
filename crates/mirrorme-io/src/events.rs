//! Host-side widget event surface.
//!
//! The host loader exposes a small pub/sub API (`on`/`off`) over the
//! events listed in [`EventKind`]. Handlers are plain `Fn`s here; the
//! JS bridge in the loader crate wraps page-supplied callbacks and
//! catches their exceptions individually, so one throwing subscriber
//! never blocks the others.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mirrorme_core::message::PhotoSource;
use mirrorme_core::types::{TryOnResult, WidgetError};

/// The events a host page can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The widget booted inside the iframe.
    Ready,
    /// The modal was opened.
    Open,
    /// The modal was closed.
    Close,
    /// A try-on run completed.
    Result,
    /// A try-on run failed, or `open()` preflight failed.
    Error,
    /// The shopper supplied a photo.
    PhotoSelected,
    /// The try-on submission started.
    ProcessingStart,
    /// A progress tick arrived while processing.
    ProcessingProgress,
}

impl EventKind {
    /// All subscribable events.
    pub const ALL: [Self; 8] = [
        Self::Ready,
        Self::Open,
        Self::Close,
        Self::Result,
        Self::Error,
        Self::PhotoSelected,
        Self::ProcessingStart,
        Self::ProcessingProgress,
    ];

    /// Name used by the public `on(event, ...)` API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Open => "open",
            Self::Close => "close",
            Self::Result => "result",
            Self::Error => "error",
            Self::PhotoSelected => "photoSelected",
            Self::ProcessingStart => "processingStart",
            Self::ProcessingProgress => "processingProgress",
        }
    }

    /// Parse a public event name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// A widget event with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// See [`EventKind::Ready`].
    Ready,
    /// See [`EventKind::Open`].
    Open,
    /// See [`EventKind::Close`].
    Close {
        /// Why the widget closed.
        reason: String,
    },
    /// See [`EventKind::Result`].
    Result(TryOnResult),
    /// See [`EventKind::Error`].
    Error(WidgetError),
    /// See [`EventKind::PhotoSelected`].
    PhotoSelected {
        /// Which acquisition path produced the photo.
        source: PhotoSource,
    },
    /// See [`EventKind::ProcessingStart`].
    ProcessingStart,
    /// See [`EventKind::ProcessingProgress`].
    ProcessingProgress {
        /// Percentage in `0..=100`.
        progress: u8,
    },
}

impl WidgetEvent {
    /// Which subscription list this event dispatches to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Ready => EventKind::Ready,
            Self::Open => EventKind::Open,
            Self::Close { .. } => EventKind::Close,
            Self::Result(_) => EventKind::Result,
            Self::Error(_) => EventKind::Error,
            Self::PhotoSelected { .. } => EventKind::PhotoSelected,
            Self::ProcessingStart => EventKind::ProcessingStart,
            Self::ProcessingProgress { .. } => EventKind::ProcessingProgress,
        }
    }
}

/// A registered event handler.
pub type EventHandler = Rc<dyn Fn(&WidgetEvent)>;

/// Simple per-event handler lists.
#[derive(Default)]
pub struct EventEmitter {
    handlers: RefCell<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventEmitter {
    /// Create an emitter with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an event.
    pub fn on(&self, kind: EventKind, handler: EventHandler) {
        self.handlers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Remove every handler for one event.
    pub fn off(&self, kind: EventKind) {
        self.handlers.borrow_mut().remove(&kind);
    }

    /// Remove every handler for every event.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Dispatch an event to its subscribers, in registration order.
    ///
    /// The handler list is cloned out before dispatch so a handler may
    /// subscribe or unsubscribe without poisoning the iteration.
    pub fn emit(&self, event: &WidgetEvent) {
        let handlers = self.handlers.borrow().get(&event.kind()).cloned();
        if let Some(handlers) = handlers {
            for handler in handlers {
                handler(event);
            }
        }
    }

    /// Number of handlers registered for one event.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.borrow().get(&kind).map_or(0, Vec::len)
    }
}
