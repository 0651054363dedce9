/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Configuration transitions.
//!
//! A transition is a pure function over build options applied along a
//! dependency edge. It receives the parent options already projected onto
//! the fragments the child requires, and may rewrite them or fan out into
//! several named option sets (a split transition, one dependency per key).

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;

use allocative::Allocative;
use dupe::Dupe;

use strata_core::configuration::BuildOptions;

use crate::attrs::coerced_attr::CoercedAttr;

/// Read access to a target's attribute map, for transitions that inspect
/// attributes. Values are raw: `select()`s are not resolved here.
pub trait AttrView {
    fn attr(&self, name: &str) -> Option<&CoercedAttr>;
}

/// The key distinguishing the branches of a split transition.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TransitionKey(pub String);

impl Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum TransitionApplied {
    Single(BuildOptions),
    Split(BTreeMap<TransitionKey, BuildOptions>),
}

pub trait Transition: Debug + Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Pure: equal inputs must produce equal outputs. The options are the
    /// parent's, already trimmed to the child's required fragments; the
    /// transition may add fragments of its own.
    fn apply(&self, options: &BuildOptions, attrs: &dyn AttrView)
        -> anyhow::Result<TransitionApplied>;
}

/// The identity transition: children inherit the (trimmed) parent options.
#[derive(Allocative, Clone, Dupe, Debug)]
pub struct NoTransition;

impl Transition for NoTransition {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(
        &self,
        options: &BuildOptions,
        _attrs: &dyn AttrView,
    ) -> anyhow::Result<TransitionApplied> {
        Ok(TransitionApplied::Single(options.clone()))
    }
}
