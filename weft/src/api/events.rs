/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Diagnostic events emitted by computations.
//!
//! Events emitted during an activation that ends in `Step::Pending` are
//! dropped by the engine; only a clean completion hands the activation's
//! buffer to the evaluation listener. Computations that memoize intermediate
//! results across restarts must buffer the events belonging to those results
//! in a [`StoredEvents`] saved in scratch state, and replay them on every
//! successful completion.

use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use dupe::Dupe;
use parking_lot::Mutex;

#[derive(Allocative, Clone, Copy, Dupe, Debug, Eq, PartialEq)]
pub enum EventKind {
    Error,
    Warning,
    Info,
}

/// A single diagnostic, with an optional source location rendered into the
/// message prefix on display.
#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub location: Option<String>,
    pub message: String,
}

impl Event {
    pub fn error(location: Option<String>, message: impl Into<String>) -> Event {
        Event {
            kind: EventKind::Error,
            location,
            message: message.into(),
        }
    }

    pub fn warning(location: Option<String>, message: impl Into<String>) -> Event {
        Event {
            kind: EventKind::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Event {
        Event {
            kind: EventKind::Info,
            location: None,
            message: message.into(),
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {}", location, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A sink for events. The engine hands each computation a buffering sink and
/// forwards the buffer to the evaluation's sink on clean completion.
pub trait EventSink: Send + Sync {
    fn handle(&self, event: Event);
}

/// A sink that remembers everything, for later replay.
#[derive(Default)]
pub struct StoredEvents {
    events: Mutex<Vec<Event>>,
}

impl StoredEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay_on(&self, sink: &dyn EventSink) {
        for event in self.events.lock().iter() {
            sink.handle(event.clone());
        }
    }

    pub fn has_errors(&self) -> bool {
        self.events.lock().iter().any(|e| e.kind == EventKind::Error)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for StoredEvents {
    fn handle(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Discards everything.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn handle(&self, _event: Event) {}
}
