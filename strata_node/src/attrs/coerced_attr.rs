/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Coerced attribute values: literals plus unresolved `select()` chains, as
//! the package loader leaves them.

use allocative::Allocative;
use dupe::Dupe;

use strata_core::target::TargetLabel;

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub enum CoercedAttr {
    Bool(bool),
    Int(i64),
    String(String),
    Label(TargetLabel),
    List(Vec<CoercedAttr>),
    /// A conditional value chosen at analysis time from configured
    /// conditions. Entries are tried in order; `default` applies when none
    /// match.
    Select {
        entries: Vec<(TargetLabel, CoercedAttr)>,
        default: Option<Box<CoercedAttr>>,
    },
    /// Concatenation of values, e.g. `[":a"] + select(...)`.
    Concat(Vec<CoercedAttr>),
}

impl CoercedAttr {
    /// Collects every `select()` condition label in this value, in order.
    pub fn select_keys(&self, keys: &mut Vec<TargetLabel>) {
        match self {
            CoercedAttr::Bool(..)
            | CoercedAttr::Int(..)
            | CoercedAttr::String(..)
            | CoercedAttr::Label(..) => {}
            CoercedAttr::List(items) | CoercedAttr::Concat(items) => {
                for item in items {
                    item.select_keys(keys);
                }
            }
            CoercedAttr::Select { entries, default } => {
                for (condition, value) in entries {
                    keys.push(condition.dupe());
                    value.select_keys(keys);
                }
                if let Some(default) = default {
                    default.select_keys(keys);
                }
            }
        }
    }
}
