//! Event: immutable records of discrete occurrences.
//!
//! DESIGN
//! ======
//! `Event` is a tagged union over variant records. Each variant fixes its own
//! kind name; callers choose the payload but never the name. Dispatch is a
//! `match` on the variant, not a virtual call.
//!
//! An event's `Target` is a non-owning identifier for whatever raised it.
//! Holding an event never keeps its origin alive.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::socket::ConnectionState;

// =============================================================================
// NAMES
// =============================================================================

/// Kind name carried by every `NotifyEvent`.
pub const NOTIFY_EVENT: &str = "notify-event";

/// Kind name carried by every `ConnectionEvent`.
pub const CONNECTION_EVENT: &str = "connection-event";

// =============================================================================
// TARGET
// =============================================================================

/// Opaque back-reference to the entity that raised an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Target {
    /// No origin.
    #[default]
    None,
    Id(Uuid),
    Name(String),
}

impl Target {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<Uuid> for Target {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl<T: Into<Target>> From<Option<T>> for Target {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("-"),
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

// =============================================================================
// CAPABILITY
// =============================================================================

/// Anything that carries a kind name and a target.
pub trait Named {
    fn name(&self) -> &'static str;

    fn target(&self) -> &Target;
}

// =============================================================================
// NOTIFY
// =============================================================================

/// A message for observers, optionally surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyEvent {
    target: Target,
    message: Option<String>,
    notify: bool,
}

impl NotifyEvent {
    /// Full constructor. Total: every input is accepted as-is.
    pub fn new(target: impl Into<Target>, message: Option<String>, notify: bool) -> Self {
        Self { target: target.into(), message, notify }
    }

    /// Visible notification carrying `message`.
    pub fn create(target: impl Into<Target>, message: impl Into<String>) -> Self {
        Self::new(target, Some(message.into()), true)
    }

    /// Silent state update with no message.
    pub fn silent(target: impl Into<Target>) -> Self {
        Self::new(target, None, false)
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether observers should surface this to the user.
    #[must_use]
    pub fn notify(&self) -> bool {
        self.notify
    }
}

impl Named for NotifyEvent {
    fn name(&self) -> &'static str {
        NOTIFY_EVENT
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// A transport lifecycle change, reported as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    target: Target,
    state: ConnectionState,
    detail: Option<String>,
}

impl ConnectionEvent {
    pub fn new(target: impl Into<Target>, state: ConnectionState, detail: Option<String>) -> Self {
        Self { target: target.into(), state, detail }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Close reason or error text, when there is one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl Named for ConnectionEvent {
    fn name(&self) -> &'static str {
        CONNECTION_EVENT
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

// =============================================================================
// EVENT
// =============================================================================

/// Discriminant of `Event`, used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Notify,
    Connection,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notify => NOTIFY_EVENT,
            Self::Connection => CONNECTION_EVENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Notify(NotifyEvent),
    Connection(ConnectionEvent),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Notify(_) => EventKind::Notify,
            Self::Connection(_) => EventKind::Connection,
        }
    }
}

impl Named for Event {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn target(&self) -> &Target {
        match self {
            Self::Notify(e) => e.target(),
            Self::Connection(e) => e.target(),
        }
    }
}

impl From<NotifyEvent> for Event {
    fn from(event: NotifyEvent) -> Self {
        Self::Notify(event)
    }
}

impl From<ConnectionEvent> for Event {
    fn from(event: ConnectionEvent) -> Self {
        Self::Connection(event)
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
