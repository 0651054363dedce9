/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Options the analysis core itself recognizes. Engine-level knobs
//! (worker count, CPU permits, unblocking around fetches) live on the
//! evaluator builder.

use std::sync::Arc;

use strata_core::configuration::FragmentKey;
use strata_core::target::TargetLabel;

/// Observer notified as configured targets finish, for progress display.
pub trait ProgressReceiver: Send + Sync + 'static {
    fn done_configure_target(&self);
}

type DebugToolchainPredicate = Arc<dyn Fn(&TargetLabel) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct AnalysisOptions {
    /// When set, every configured target carries the set of packages it
    /// transitively read, for downstream consumers such as query.
    pub store_transitive_packages: bool,
    /// Targets for which toolchain resolution emits verbose diagnostics.
    pub debug_toolchain_resolution: Option<DebugToolchainPredicate>,
    /// Fragments stripped from the configuration once, at the boundary
    /// from a target to its toolchain context, so toolchain dependencies
    /// do not re-apply the trimming per edge.
    pub toolchain_excluded_fragments: Vec<FragmentKey>,
    pub progress: Option<Arc<dyn ProgressReceiver>>,
}

impl AnalysisOptions {
    pub fn debug_toolchain_resolution(&self, label: &TargetLabel) -> bool {
        match &self.debug_toolchain_resolution {
            Some(predicate) => predicate(label),
            None => false,
        }
    }
}
