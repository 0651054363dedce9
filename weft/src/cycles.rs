/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Cycle detection.
//!
//! Each in-flight node carries the request path that led to it. Requesting a
//! key already on the path is a cycle, reported with every key on the cyclic
//! segment. Cycles that span two independent request paths cannot be seen
//! this way; those are caught by the evaluation's stall scan over the
//! waits-for graph.

use std::str::FromStr;

use dupe::Dupe;
use dupe::IterDupedExt;
use indexmap::IndexSet;
use thiserror::Error;

use crate::erased::DynKey;
use crate::error::WeftError;
use crate::error::WeftResult;

#[derive(Clone, Dupe, Copy, Debug, Default)]
pub enum DetectCycles {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Error, Debug)]
#[error("Invalid type of DetectCycles: `{0}`")]
pub struct InvalidType(String);

impl FromStr for DetectCycles {
    type Err = InvalidType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ENABLED" => Ok(DetectCycles::Enabled),
            "DISABLED" => Ok(DetectCycles::Disabled),
            _ => Err(InvalidType(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct CycleDetector {
    stack: IndexSet<DynKey>,
}

impl CycleDetector {
    pub(crate) fn new() -> Self {
        Self {
            stack: IndexSet::new(),
        }
    }

    /// Checks that `key` is not already on the request path, returning the
    /// extended path for the child request.
    pub(crate) fn visit(&self, key: &DynKey) -> WeftResult<CycleDetector> {
        let mut stack = self.stack.clone();
        if !stack.insert(key.dupe()) {
            let start = stack.get_index_of(key).unwrap();
            let cyclic_keys = stack.iter().skip(start).duped().collect();
            Err(WeftError::cycle(key.dupe(), cyclic_keys))
        } else {
            Ok(Self { stack })
        }
    }

    /// Cycle check without extending the path, for reads that only need to
    /// know whether the edge would close a loop.
    pub(crate) fn check(&self, key: &DynKey) -> WeftResult<()> {
        if let Some(start) = self.stack.get_index_of(key) {
            let cyclic_keys = self.stack.iter().skip(start).duped().collect();
            Err(WeftError::cycle(key.dupe(), cyclic_keys))
        } else {
            Ok(())
        }
    }
}
