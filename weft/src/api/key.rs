/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;

use allocative::Allocative;
use dupe::Dupe;

use crate::api::computations::WeftComputations;
use crate::error::WeftError;
use crate::error::WeftResult;

/// The outcome of a single activation of a compute function.
///
/// A computation that observed missing dependencies via
/// [`WeftComputations::get_value`] returns `Pending`; the engine waits for
/// the missing keys and re-invokes the function, which resumes from its
/// scratch state. Returning `Pending` without a missing dependency in the
/// same activation is a programming error.
#[derive(Debug)]
pub enum Step<T> {
    Ready(T),
    Pending,
}

/// The computation key that maps to a value. The key is used as an index for
/// caching the computed values.
///
/// ## Cloning
/// The key is cloned whenever it is recorded as a dependency edge, and the
/// value is cloned whenever it is requested, so both should be cheap to
/// clone.
pub trait Key: Allocative + Debug + Display + Clone + Eq + Hash + Send + Sync + 'static {
    type Value: Allocative + Dupe + Send + Sync + 'static;

    /// Provides a short informative name for this key type.
    fn key_type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// A single activation of the computation. May be invoked multiple times
    /// for one node; each invocation after the first sees the scratch state
    /// left behind by its predecessor.
    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>>;

    /// If the computed value is equal to the previously cached value, the
    /// engine won't invalidate graph nodes depending on this node.
    ///
    /// It is safe to return `false` when values are equal, but returning
    /// `true` when values are not equal results in inconsistent graph state.
    fn equality(x: &Self::Value, y: &Self::Value) -> bool;
}

/// A key whose value is provided through the transaction updater rather than
/// computed. Requesting an injected key before a value was supplied is an
/// error.
pub trait InjectedKey:
    Allocative + Debug + Display + Clone + Eq + Hash + Send + Sync + 'static
{
    type Value: Allocative + Dupe + Send + Sync + 'static;

    fn equality(x: &Self::Value, y: &Self::Value) -> bool;
}

impl<K> Key for K
where
    K: InjectedKey,
{
    type Value = <K as InjectedKey>::Value;

    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>> {
        Err(WeftError::injected_key_computed(env.current_key().dupe()))
    }

    fn equality(x: &Self::Value, y: &Self::Value) -> bool {
        <K as InjectedKey>::equality(x, y)
    }
}

/// Strips module paths from a type name, keeping generic parameters readable.
pub(crate) fn short_type_name(type_name: &str) -> &str {
    // Generic arguments also contain `::`, so only strip up to the first `<`.
    let end = type_name.find('<').unwrap_or(type_name.len());
    match type_name[..end].rfind("::") {
        Some(i) => &type_name[i + 2..],
        None => type_name,
    }
}
