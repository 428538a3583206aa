//! Cross-thread event relay.
//!
//! The session task pushes [`RelayEvent`]s; the host drains them on its own
//! tick and folds them into a [`HostState`]. The queue lock is held only for
//! a single push or drain.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::color::ColorToken;
use crate::identifiers::ClientId;

// ============================================================================
// RelayEvent
// ============================================================================

/// A host-facing notification.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Human-readable status line.
    Status(String),
    /// Pairing established (`true`) or lost (`false`).
    Connected(bool),
    /// Full replacement color list.
    Colors(Vec<ColorToken>),
    /// Server-assigned client identifier.
    ClientId(ClientId),
}

// ============================================================================
// EventRelay
// ============================================================================

/// FIFO queue shared between the session task and the host.
#[derive(Debug, Clone, Default)]
pub struct EventRelay {
    queue: Arc<Mutex<VecDeque<RelayEvent>>>,
}

impl EventRelay {
    /// Creates an empty relay.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one event.
    pub fn push(&self, event: RelayEvent) {
        self.queue.lock().push_back(event);
    }

    /// Appends a status line.
    #[inline]
    pub fn status(&self, text: impl Into<String>) {
        self.push(RelayEvent::Status(text.into()));
    }

    /// Removes and returns every queued event in arrival order.
    #[must_use]
    pub fn drain(&self) -> Vec<RelayEvent> {
        self.queue.lock().drain(..).collect()
    }

    /// Returns the number of queued events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns `true` when nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

// ============================================================================
// HostState
// ============================================================================

/// Latest state as seen by the host UI.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    /// Status line.
    pub status: String,
    /// Pairing flag.
    pub connected: bool,
    /// Colors from the most recent sync.
    pub colors: Vec<ColorToken>,
    /// Identifier from a `registered` message.
    pub client_id: Option<ClientId>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            status: "Disconnected".to_string(),
            connected: false,
            colors: Vec::new(),
            client_id: None,
        }
    }
}

impl HostState {
    /// Folds one event into the state.
    pub fn apply(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Status(text) => self.status = text,
            RelayEvent::Connected(connected) => {
                self.connected = connected;
                if !connected {
                    self.client_id = None;
                }
            }
            RelayEvent::Colors(colors) => self.colors = colors,
            RelayEvent::ClientId(id) => self.client_id = Some(id),
        }
    }

    /// Folds events in order and returns how many were applied.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = RelayEvent>) -> usize {
        let mut applied = 0;
        for event in events {
            self.apply(event);
            applied += 1;
        }
        applied
    }
}

// ============================================================================
// Tests
// ============================================================================
