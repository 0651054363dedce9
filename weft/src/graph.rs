/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Versioned node storage.
//!
//! Each node remembers the value it last computed, the dependencies that
//! computation read, its reverse dependencies, and three version stamps:
//! `computed_at` (last verified), `changed_at` (last time the value actually
//! changed, which is what early cutoff compares against), and `dirtied_at`
//! (a pending invalidation that a request must resolve by verifying deps or
//! re-executing).

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dupe::Dupe;
use dupe::IterDupedExt;
use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::erased::AnyValue;
use crate::erased::DynKey;
use crate::versions::VersionNumber;

#[derive(Default)]
pub(crate) struct VersionedGraph {
    nodes: DashMap<DynKey, Arc<NodeCell>>,
}

#[derive(Default)]
pub(crate) struct NodeCell {
    pub(crate) data: Mutex<NodeData>,
}

#[derive(Default)]
pub(crate) struct NodeData {
    pub(crate) value: Option<AnyValue>,
    pub(crate) deps: Vec<DynKey>,
    pub(crate) rdeps: HashSet<DynKey>,
    pub(crate) computed_at: Option<VersionNumber>,
    pub(crate) changed_at: Option<VersionNumber>,
    pub(crate) dirtied_at: Option<VersionNumber>,
    pub(crate) force_dirty: bool,
    pub(crate) scratch: Option<Box<dyn Any + Send>>,
    /// Dependencies requested by earlier activations of an in-flight
    /// evaluation. A restarted computation skips its memoized stages (and
    /// their requests), so the final dependency list is the union of every
    /// activation's requests. Lives and dies with the scratch state.
    pub(crate) pending_deps: IndexSet<DynKey>,
}

impl NodeData {
    pub(crate) fn is_valid(&self) -> bool {
        self.value.is_some() && self.dirtied_at.is_none()
    }
}

impl VersionedGraph {
    pub(crate) fn node(&self, key: &DynKey) -> Arc<NodeCell> {
        self.nodes.entry(key.dupe()).or_default().value().clone()
    }

    pub(crate) fn get(&self, key: &DynKey) -> Option<Arc<NodeCell>> {
        self.nodes.get(key).map(|entry| entry.value().clone())
    }

    /// The stored value, if the node is computed and no invalidation is
    /// outstanding against it.
    pub(crate) fn lookup_valid(&self, key: &DynKey) -> Option<AnyValue> {
        let cell = self.get(key)?;
        let data = cell.data.lock();
        if data.is_valid() { data.value.clone() } else { None }
    }

    pub(crate) fn changed_at(&self, key: &DynKey) -> Option<VersionNumber> {
        let cell = self.get(key)?;
        let changed_at = cell.data.lock().changed_at;
        changed_at
    }

    /// Marks `key` for unconditional recomputation and walks its transitive
    /// reverse dependencies marking them for re-verification.
    pub(crate) fn invalidate(&self, key: &DynKey, version: VersionNumber) {
        let cell = self.node(key);
        let rdeps: Vec<DynKey> = {
            let mut data = cell.data.lock();
            data.force_dirty = true;
            data.dirtied_at = Some(version);
            data.scratch = None;
            data.pending_deps.clear();
            data.rdeps.iter().duped().collect()
        };
        self.mark_rdeps_dirty(rdeps, version);
    }

    /// Stores an injected value. Reverse dependencies are dirtied even when
    /// the value compares equal; their re-verification is then a cheap
    /// version-stamp check.
    pub(crate) fn inject(&self, key: &DynKey, value: AnyValue, version: VersionNumber) {
        let cell = self.node(key);
        let rdeps: Vec<DynKey> = {
            let mut data = cell.data.lock();
            let changed = match &data.value {
                Some(old) => !key.0.values_equal(old, &value),
                None => true,
            };
            data.value = Some(value);
            data.computed_at = Some(version);
            data.dirtied_at = None;
            data.force_dirty = false;
            if changed {
                data.changed_at = Some(version);
            }
            data.rdeps.iter().duped().collect()
        };
        self.mark_rdeps_dirty(rdeps, version);
    }

    fn mark_rdeps_dirty(&self, mut queue: Vec<DynKey>, version: VersionNumber) {
        while let Some(key) = queue.pop() {
            if let Some(cell) = self.get(&key) {
                let mut data = cell.data.lock();
                // Dirtying happens in increasing version order, so a node
                // already dirtied at this version has propagated to its own
                // rdeps.
                if data.dirtied_at.map_or(false, |d| d >= version) {
                    continue;
                }
                data.dirtied_at = Some(version);
                data.scratch = None;
                data.pending_deps.clear();
                queue.extend(data.rdeps.iter().duped());
            }
        }
    }
}
