/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Type-erased keys and values.
//!
//! The graph stores nodes of many key types in a single map, so keys are
//! erased behind an object-safe vtable that preserves hashing, equality and
//! the typed `compute`/`equality` entry points of the underlying [`Key`].

use std::any::Any;
use std::any::TypeId;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use fnv::FnvHasher;

use crate::api::computations::WeftComputations;
use crate::api::key::Key;
use crate::api::key::Step;
use crate::error::WeftResult;

/// A type-erased value. The owning key's vtable knows the concrete type.
pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// Object-safe view of a [`Key`].
pub(crate) trait AnyKey: Allocative + Debug + Display + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;

    fn eq_any(&self, other: &dyn AnyKey) -> bool;

    /// Hash of the key, mixed with its `TypeId` so distinct key types with
    /// equal payloads occupy distinct graph entries.
    fn hash_value(&self) -> u64;

    fn key_type_name(&self) -> &'static str;

    fn compute_any(&self, env: &mut WeftComputations) -> WeftResult<Step<AnyValue>>;

    fn values_equal(&self, x: &AnyValue, y: &AnyValue) -> bool;
}

#[derive(Allocative)]
struct KeyHolder<K: Key>(K);

impl<K: Key> Debug for KeyHolder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl<K: Key> Display for KeyHolder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<K: Key> AnyKey for KeyHolder<K> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn eq_any(&self, other: &dyn AnyKey) -> bool {
        match other.as_any().downcast_ref::<K>() {
            Some(other) => &self.0 == other,
            None => false,
        }
    }

    fn hash_value(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        TypeId::of::<K>().hash(&mut hasher);
        self.0.hash(&mut hasher);
        hasher.finish()
    }

    fn key_type_name(&self) -> &'static str {
        K::key_type_name()
    }

    fn compute_any(&self, env: &mut WeftComputations) -> WeftResult<Step<AnyValue>> {
        Ok(match self.0.compute(env)? {
            Step::Ready(v) => Step::Ready(Arc::new(v) as AnyValue),
            Step::Pending => Step::Pending,
        })
    }

    fn values_equal(&self, x: &AnyValue, y: &AnyValue) -> bool {
        match (
            x.downcast_ref::<K::Value>(),
            y.downcast_ref::<K::Value>(),
        ) {
            (Some(x), Some(y)) => K::equality(x, y),
            _ => false,
        }
    }
}

/// A key that has been requested within the engine, with its type erased.
///
/// This is the identity the graph, the cycle detector and error payloads all
/// operate on.
#[derive(Clone, Dupe, Allocative)]
pub struct DynKey(pub(crate) Arc<dyn AnyKey>);

impl DynKey {
    pub(crate) fn new<K: Key>(key: K) -> Self {
        DynKey(Arc::new(KeyHolder(key)))
    }

    pub fn downcast_ref<K: Key>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }

    pub fn key_type_name(&self) -> &'static str {
        self.0.key_type_name()
    }

    pub(crate) fn unpack_value<K: Key>(value: &AnyValue) -> K::Value {
        value
            .downcast_ref::<K::Value>()
            .expect("value type mismatch for key type")
            .dupe()
    }
}

impl PartialEq for DynKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_any(&*other.0)
    }
}

impl Eq for DynKey {}

impl Hash for DynKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash_value())
    }
}

impl Debug for DynKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for DynKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
