/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The bundle of collaborators analysis computations reach through the
//! evaluator's global data: intern tables, the package loader, the
//! toolchain resolver and the analysis options. Registered once at
//! evaluator construction; nothing here is ambient.

use std::sync::Arc;

use dupe::Dupe;

use strata_core::Interners;
use strata_node::package::PackageProvider;
use strata_node::toolchain::ToolchainResolver;
use weft::WeftComputations;

use crate::options::AnalysisOptions;

#[derive(Clone, Dupe)]
pub struct AnalysisDelegate(Arc<AnalysisDelegateData>);

pub struct AnalysisDelegateData {
    pub interners: Arc<Interners>,
    pub packages: Arc<dyn PackageProvider>,
    pub toolchains: Arc<dyn ToolchainResolver>,
    pub options: AnalysisOptions,
}

impl AnalysisDelegate {
    pub fn new(
        interners: Arc<Interners>,
        packages: Arc<dyn PackageProvider>,
        toolchains: Arc<dyn ToolchainResolver>,
        options: AnalysisOptions,
    ) -> Self {
        AnalysisDelegate(Arc::new(AnalysisDelegateData {
            interners,
            packages,
            toolchains,
            options,
        }))
    }

    /// The delegate registered on the evaluator this computation runs in.
    pub fn get(env: &WeftComputations) -> AnalysisDelegate {
        env.global_data().expect::<AnalysisDelegate>().dupe()
    }

    pub fn interners(&self) -> &Interners {
        &self.0.interners
    }

    pub fn packages(&self) -> &dyn PackageProvider {
        &*self.0.packages
    }

    pub fn toolchains(&self) -> &dyn ToolchainResolver {
        &*self.0.toolchains
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.0.options
    }
}
