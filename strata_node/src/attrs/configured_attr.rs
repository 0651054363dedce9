/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Configured attribute values: `select()`s resolved, dependency labels
//! paired with the configuration their edge produced.

use allocative::Allocative;
use dupe::Dupe;

use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;

use crate::attrs::traversal::ConfiguredAttrTraversal;
use crate::transition::TransitionKey;

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub enum ConfiguredAttr {
    Bool(bool),
    Int(i64),
    String(String),
    /// A plain label that is not a dependency edge.
    Label(TargetLabel),
    /// A configured dependency edge.
    Dep(ConfiguredTargetLabel),
    /// One edge per split-transition branch, tagged with its key.
    SplitDep(Vec<(TransitionKey, ConfiguredTargetLabel)>),
    /// An edge to a non-configurable target (null configuration).
    Source(ConfiguredTargetLabel),
    List(Vec<ConfiguredAttr>),
}

impl ConfiguredAttr {
    pub fn traverse(&self, traversal: &mut dyn ConfiguredAttrTraversal) -> anyhow::Result<()> {
        match self {
            ConfiguredAttr::Bool(..)
            | ConfiguredAttr::Int(..)
            | ConfiguredAttr::String(..)
            | ConfiguredAttr::Label(..) => Ok(()),
            ConfiguredAttr::Dep(dep) => traversal.dep(dep),
            ConfiguredAttr::SplitDep(deps) => {
                for (key, dep) in deps {
                    traversal.split_dep(key, dep)?;
                }
                Ok(())
            }
            ConfiguredAttr::Source(source) => traversal.source(source),
            ConfiguredAttr::List(items) => {
                for item in items {
                    item.traverse(traversal)?;
                }
                Ok(())
            }
        }
    }

    /// Unpacks a list value; `None` if this is not a list.
    pub fn unpack_list(&self) -> Option<&[ConfiguredAttr]> {
        match self {
            ConfiguredAttr::List(items) => Some(items),
            _ => None,
        }
    }

    /// The labels of a configured `target_compatible_with`-style list.
    pub fn as_label_list(&self) -> Vec<TargetLabel> {
        match self {
            ConfiguredAttr::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    ConfiguredAttr::Label(label) => Some(label.dupe()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
