/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Calculations running on the graph: the package node and the
//! configured-target function with its dependency-resolution stages.

pub mod config_conditions;
pub mod configured_target;
pub mod deps;

use std::sync::Arc;

use anyhow::Context;

use strata_core::result::SharedResult;
use strata_core::result::ToSharedResultExt;
use strata_node::package::PackageValue;
use weft::Key;
use weft::Step;
use weft::WeftComputations;
use weft::WeftResult;

use crate::delegate::AnalysisDelegate;
use crate::keys::PackageKey;

impl Key for PackageKey {
    type Value = SharedResult<Arc<PackageValue>>;

    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>> {
        let delegate = AnalysisDelegate::get(env);
        let package = delegate
            .packages()
            .load(&self.0)
            .with_context(|| format!("loading package `{}`", self.0))
            .shared_error();
        Ok(Step::Ready(package))
    }

    fn equality(x: &Self::Value, y: &Self::Value) -> bool {
        match (x, y) {
            (Ok(x), Ok(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}
