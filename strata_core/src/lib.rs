/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Core vocabulary of the analysis graph: labels, packages, configurations,
//! the interning machinery backing their identity, persistent nested sets,
//! and the shared error/cause types that flow through failing nodes.

pub mod causes;
pub mod configuration;
pub mod interner;
pub mod nested_set;
pub mod package;
pub mod result;
pub mod target;

use crate::configuration::ConfigurationData;
use crate::interner::Interner;
use crate::package::PackageIdData;
use crate::target::TargetLabelData;

/// The process-wide intern tables, created once at evaluator construction
/// and passed down explicitly. Handles from different `Interners` instances
/// never compare equal, so nothing may mix them.
pub struct Interners {
    pub packages: Interner<PackageIdData>,
    pub labels: Interner<TargetLabelData>,
    pub configurations: Interner<ConfigurationData>,
    pub fragments: Interner<String>,
    pub providers: Interner<String>,
    pub toolchain_types: Interner<String>,
}

impl Interners {
    pub fn new() -> Self {
        Self {
            packages: Interner::new(),
            labels: Interner::new(),
            configurations: Interner::new(),
            fragments: Interner::new(),
            providers: Interner::new(),
            toolchain_types: Interner::new(),
        }
    }
}

impl Default for Interners {
    fn default() -> Self {
        Self::new()
    }
}
