//! Project events and notifications
//!
//! Observers (a canvas, item list widgets, a window title) register with the
//! [`EventBus`] under a [`ComponentId`] and receive every [`ProjectEvent`]
//! synchronously, in the order the engine mutated its state.
//!
//! User-facing messages go through the separate [`Notifier`] interface. The
//! engine reports failures there instead of leaving partial state behind.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::GraphsError;

/// Identifier of an event subscriber
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Something observable changed in the project
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    ItemAdded(Uuid),
    ItemRemoved(Uuid),
    ItemChanged { uuid: Uuid, property: String },
    ItemsSwapped(usize, usize),
    FigureSettingChanged(String),
    HistoryChanged { can_undo: bool, can_redo: bool },
    ViewHistoryChanged { can_view_back: bool, can_view_forward: bool },
    ProjectLoaded,
    ProjectSaved(PathBuf),
    UnsavedChanged(bool),
}

type Callback = Box<dyn FnMut(&ProjectEvent) + Send>;

/// Synchronous dispatcher of [`ProjectEvent`]s
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(ComponentId, Callback)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, replacing any earlier one under the same id
    pub fn subscribe<F>(&mut self, id: impl Into<ComponentId>, callback: F)
    where
        F: FnMut(&ProjectEvent) + Send + 'static,
    {
        let id = id.into();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.push((id, Box::new(callback)));
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: &ComponentId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| existing != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every subscriber in registration order
    pub fn emit(&mut self, event: &ProjectEvent) {
        for (_, callback) in self.subscribers.iter_mut() {
            callback(event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.subscribers.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("EventBus").field("subscribers", &ids).finish()
    }
}

/// How prominent a notification should be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A short user-facing message, typically shown as a toast
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: String::new(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &GraphsError) -> Self {
        Self {
            severity: Severity::Error,
            title: err.title().to_string(),
            message: err.user_message(),
        }
    }
}

/// External sink for user-facing notifications
pub trait Notifier: Send {
    fn notify(&self, notification: Notification);
}

/// Notifier that writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!("{}", notification.message),
            Severity::Warning => warn!("{}: {}", notification.title, notification.message),
            Severity::Error => error!("{}: {}", notification.title, notification.message),
        }
    }
}
