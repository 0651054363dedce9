/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Errors produced by the engine itself.
//!
//! Failures of user computations are ordinary values stored in the graph;
//! the engine only ever reports cycles, interrupts, and misuse of injected
//! keys. These are transaction-scoped: they are never stored as node values.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use dupe::Dupe;
use thiserror::Error;

use crate::erased::DynKey;

#[derive(Clone, Dupe, Debug)]
pub struct WeftError(pub(crate) Arc<WeftErrorImpl>);

pub type WeftResult<T> = Result<T, WeftError>;

#[derive(Debug, Error)]
pub(crate) enum WeftErrorImpl {
    #[error("cycle detected when requesting key `{trigger}`")]
    Cycle {
        trigger: DynKey,
        cyclic_keys: Vec<DynKey>,
    },
    #[error("computation was interrupted")]
    Interrupted,
    #[error("injected key `{0}` was requested before a value was provided")]
    InjectedKeyComputed(DynKey),
}

impl WeftError {
    pub(crate) fn cycle(trigger: DynKey, cyclic_keys: Vec<DynKey>) -> Self {
        WeftError(Arc::new(WeftErrorImpl::Cycle {
            trigger,
            cyclic_keys,
        }))
    }

    pub(crate) fn interrupted() -> Self {
        WeftError(Arc::new(WeftErrorImpl::Interrupted))
    }

    pub(crate) fn injected_key_computed(key: DynKey) -> Self {
        WeftError(Arc::new(WeftErrorImpl::InjectedKeyComputed(key)))
    }

    pub fn is_cycle(&self) -> bool {
        matches!(&*self.0, WeftErrorImpl::Cycle { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(&*self.0, WeftErrorImpl::Interrupted)
    }

    /// The keys participating in the cycle, if this is a cycle failure.
    pub fn cyclic_keys(&self) -> Option<&[DynKey]> {
        match &*self.0 {
            WeftErrorImpl::Cycle { cyclic_keys, .. } => Some(cyclic_keys),
            _ => None,
        }
    }
}

impl Display for WeftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for WeftError {}
