/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The capability object handed to every activation of a compute function.

use std::any::Any;

use dupe::Dupe;
use indexmap::IndexSet;

use crate::api::data::GlobalData;
use crate::api::events::EventSink;
use crate::api::events::StoredEvents;
use crate::api::key::Key;
use crate::cycles::CycleDetector;
use crate::erased::AnyValue;
use crate::erased::DynKey;
use crate::error::WeftError;
use crate::error::WeftResult;
use crate::incremental::Evaluation;
use crate::semaphore::CpuPermit;

/// Dependency access, event emission and scratch state for one activation.
///
/// Observable semantics: within one activation two reads of the same key
/// return the same value; across activations of one node the scratch state
/// is preserved but dependency values may change only between versions.
pub struct WeftComputations<'a, 'e> {
    eval: &'a Evaluation<'e>,
    key: &'a DynKey,
    path: Option<CycleDetector>,
    scratch: Option<Box<dyn Any + Send>>,
    requested: IndexSet<DynKey>,
    missing: IndexSet<DynKey>,
    events: StoredEvents,
    cpu_permit: Option<CpuPermit<'e>>,
}

impl<'a, 'e> WeftComputations<'a, 'e> {
    pub(crate) fn new(
        eval: &'a Evaluation<'e>,
        key: &'a DynKey,
        path: Option<CycleDetector>,
        scratch: Option<Box<dyn Any + Send>>,
    ) -> Self {
        Self {
            eval,
            key,
            path,
            scratch,
            requested: IndexSet::new(),
            missing: IndexSet::new(),
            events: StoredEvents::new(),
            cpu_permit: None,
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<Box<dyn Any + Send>>,
        IndexSet<DynKey>,
        IndexSet<DynKey>,
        Vec<crate::api::events::Event>,
    ) {
        let events = self.events.take();
        (self.scratch, self.requested, self.missing, events)
    }

    /// The key currently being computed.
    pub fn current_key(&self) -> &DynKey {
        self.key
    }

    /// Reads a dependency value. `Ok(None)` means the dependency has not
    /// been computed yet; it is recorded, and this activation is expected to
    /// finish with `Step::Pending`.
    pub fn get_value<K: Key>(&mut self, key: &K) -> WeftResult<Option<K::Value>> {
        let dyn_key = DynKey::new(key.clone());
        Ok(self
            .get_value_dyn(&dyn_key)?
            .map(|v| DynKey::unpack_value::<K>(&v)))
    }

    /// Reads several dependency values of one key type, recording all of
    /// them before returning so missing ones are fetched in parallel.
    pub fn get_values<K: Key>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> WeftResult<Vec<Option<K::Value>>> {
        let mut result = Vec::new();
        let mut first_error = None;
        for key in keys {
            match self.get_value(&key) {
                Ok(v) => result.push(v),
                Err(e) => {
                    // Keep recording the rest so one cycle edge doesn't hide
                    // the other requests of this round.
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    result.push(None);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn get_value_dyn(&mut self, dyn_key: &DynKey) -> WeftResult<Option<AnyValue>> {
        if let Some(path) = &self.path {
            path.check(dyn_key)?;
        }
        if let Some(e) = self.eval.error_for(dyn_key) {
            return Err(e);
        }
        self.requested.insert(dyn_key.dupe());
        let eval = self.eval;
        // A heavyweight computation configured to unblock CPU work hands
        // its permit back while it touches the graph.
        let value = match (&mut self.cpu_permit, eval.unblock_cpu_work_when_fetching_deps()) {
            (Some(permit), true) => permit.release_while(|| eval.lookup(dyn_key)),
            _ => eval.lookup(dyn_key),
        };
        match value {
            Some(value) => Ok(Some(value)),
            None => {
                self.missing.insert(dyn_key.dupe());
                Ok(None)
            }
        }
    }

    /// True iff any read in this activation returned `None`.
    pub fn values_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// The per-activation event sink. Forwarded to the evaluation listener
    /// only when this activation completes with `Step::Ready`.
    pub fn listener(&self) -> &dyn EventSink {
        &self.events
    }

    /// Takes the scratch state for this node, creating it on the first
    /// activation. An activation that returns `Pending` must hand the state
    /// back via [`save_state`](Self::save_state) or its progress is lost.
    pub fn take_state<S: Send + 'static>(&mut self, factory: impl FnOnce() -> S) -> S {
        match self.scratch.take() {
            Some(boxed) => match boxed.downcast::<S>() {
                Ok(state) => *state,
                Err(_) => factory(),
            },
            None => factory(),
        }
    }

    pub fn save_state<S: Send + 'static>(&mut self, state: S) {
        self.scratch = Some(Box::new(state));
    }

    pub fn ensure_not_interrupted(&self) -> WeftResult<()> {
        if self.eval.is_interrupted() {
            Err(WeftError::interrupted())
        } else {
            Ok(())
        }
    }

    pub fn global_data(&self) -> &GlobalData {
        self.eval.global_data()
    }

    /// Acquires a CPU-bound permit for the rest of this activation (a no-op
    /// when the evaluator has no semaphore, or one is already held). The
    /// permit is released when the activation ends, so a suspended
    /// computation never occupies a CPU slot; when the evaluator is
    /// configured to unblock CPU work around fetches, dependency reads also
    /// briefly hand it back.
    pub fn hold_cpu_permit(&mut self) {
        if self.cpu_permit.is_none() {
            if let Some(semaphore) = self.eval.cpu_semaphore() {
                self.cpu_permit = Some(semaphore.acquire(self.key));
            }
        }
    }
}

/// Saves `state` and reports a suspension, in one breath. The usual way for
/// a staged computation to return once it has observed missing deps.
pub fn suspend<T, S: Send + 'static>(
    env: &mut WeftComputations,
    state: S,
) -> WeftResult<crate::api::key::Step<T>> {
    env.save_state(state);
    Ok(crate::api::key::Step::Pending)
}
