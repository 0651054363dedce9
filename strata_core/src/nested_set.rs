/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A persistent, order-preserving, deduplicating set DAG.
//!
//! Transitive collections (packages read, root causes) are unioned at every
//! level of the target graph; building flat sets would be quadratic. A
//! `NestedSet` instead shares substructure: a node holds its direct items
//! plus handles to the transitive sets of its children. Flattening visits
//! every inner set once (by handle identity) and deduplicates items by
//! equality, preserving first-seen order.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

#[derive(Allocative, Debug)]
struct NestedSetData<T> {
    direct: Vec<T>,
    transitive: Vec<NestedSet<T>>,
    empty: bool,
}

#[derive(Allocative, Debug)]
pub struct NestedSet<T>(Arc<NestedSetData<T>>);

impl<T> Clone for NestedSet<T> {
    fn clone(&self) -> Self {
        NestedSet(self.0.clone())
    }
}

impl<T> Dupe for NestedSet<T> {}

impl<T: Clone + Eq + Hash> NestedSet<T> {
    pub fn empty() -> Self {
        NestedSet(Arc::new(NestedSetData {
            direct: Vec::new(),
            transitive: Vec::new(),
            empty: true,
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.0.empty
    }

    /// Flattens to a vector: direct items first, then children in order,
    /// deduplicated by equality with first-seen order preserved.
    pub fn to_vec(&self) -> Vec<T> {
        let mut seen_sets: HashSet<*const NestedSetData<T>> = HashSet::new();
        let mut seen_items: HashSet<T> = HashSet::new();
        let mut result = Vec::new();
        self.flatten_into(&mut seen_sets, &mut seen_items, &mut result);
        result
    }

    fn flatten_into(
        &self,
        seen_sets: &mut HashSet<*const NestedSetData<T>>,
        seen_items: &mut HashSet<T>,
        result: &mut Vec<T>,
    ) {
        if !seen_sets.insert(Arc::as_ptr(&self.0)) {
            return;
        }
        for item in &self.0.direct {
            if seen_items.insert(item.clone()) {
                result.push(item.clone());
            }
        }
        for child in &self.0.transitive {
            child.flatten_into(seen_sets, seen_items, result);
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.to_vec().contains(item)
    }
}

impl<T: Clone + Eq + Hash> Default for NestedSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct NestedSetBuilder<T> {
    direct: Vec<T>,
    transitive: Vec<NestedSet<T>>,
}

impl<T: Clone + Eq + Hash> NestedSetBuilder<T> {
    pub fn new() -> Self {
        Self {
            direct: Vec::new(),
            transitive: Vec::new(),
        }
    }

    pub fn add(&mut self, item: T) -> &mut Self {
        self.direct.push(item);
        self
    }

    pub fn add_transitive(&mut self, set: NestedSet<T>) -> &mut Self {
        if !set.is_empty() {
            self.transitive.push(set);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.transitive.is_empty()
    }

    /// Builds the set. The builder stays usable: later additions produce
    /// bigger sets sharing nothing with earlier snapshots' spine (the inner
    /// sets are shared by handle either way).
    pub fn build(&self) -> NestedSet<T> {
        let empty = self.direct.is_empty() && self.transitive.iter().all(NestedSet::is_empty);
        NestedSet(Arc::new(NestedSetData {
            direct: self.direct.clone(),
            transitive: self.transitive.clone(),
            empty,
        }))
    }
}

impl<T: Clone + Eq + Hash> Default for NestedSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::nested_set::NestedSet;
    use crate::nested_set::NestedSetBuilder;

    #[test]
    fn flattening_preserves_order_and_deduplicates() {
        let mut leaf = NestedSetBuilder::new();
        leaf.add("c").add("d");
        let leaf = leaf.build();

        let mut mid = NestedSetBuilder::new();
        mid.add("b").add_transitive(leaf.clone());
        let mid = mid.build();

        let mut top = NestedSetBuilder::new();
        top.add("a").add("c");
        top.add_transitive(mid);
        top.add_transitive(leaf);
        let top = top.build();

        // "c" appears as a direct item before the leaf set contributes it;
        // the leaf set itself is visited once.
        assert_eq!(vec!["a", "c", "b", "d"], top.to_vec());
    }

    #[test]
    fn empty_sets_are_dropped() {
        let mut builder: NestedSetBuilder<&str> = NestedSetBuilder::new();
        builder.add_transitive(NestedSet::empty());
        let set = builder.build();
        assert!(set.is_empty());
        assert!(set.to_vec().is_empty());
    }
}
