/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Per-evaluator global data.
//!
//! Collaborator handles (package loaders, toolchain resolvers, intern
//! tables, option structs) are registered here at evaluator construction and
//! looked up by type from inside computations. Nothing is ambient: a fresh
//! evaluator in a test carries exactly the data its builder was given.

use std::any::Any;
use std::any::TypeId;
use std::collections::HashMap;

/// Type-indexed storage set up at evaluator construction, immutable after.
#[derive(Default)]
pub struct GlobalData {
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl GlobalData {
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .map(|v| v.downcast_ref::<T>().unwrap())
    }

    /// Like `get`, but panics with the type name when absent. For data the
    /// embedder is required to have registered.
    pub fn expect<T: Send + Sync + 'static>(&self) -> &T {
        match self.get::<T>() {
            Some(v) => v,
            None => panic!(
                "global data of type `{}` was not set on the evaluator",
                std::any::type_name::<T>()
            ),
        }
    }
}

#[derive(Default)]
pub struct GlobalDataBuilder {
    data: GlobalData,
}

impl GlobalDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) {
        self.data.data.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub(crate) fn build(self) -> GlobalData {
        self.data
    }
}
