/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The node types of the analysis graph. The `Key` implementations live
//! next to their computations; this module only defines the key data.

use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

use allocative::Allocative;
use derive_more::Display;
use dupe::Dupe;

use strata_core::configuration::Configuration;
use strata_core::package::PackageId;
use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;
use strata_node::aspect::AspectDefinition;
use strata_node::toolchain::ToolchainRequest;

/// Requests the parsed package from the loader collaborator.
#[derive(Allocative, Clone, Dupe, Display, Debug, Eq, Hash, PartialEq)]
#[display(fmt = "Package({})", _0)]
pub struct PackageKey(pub PackageId);

/// The analysis node: one `(label, configuration)` pair, plus the forced
/// execution platform when the target is being evaluated as a toolchain of
/// a parent. A null configuration denotes a non-configurable target.
#[derive(Allocative, Clone, Dupe, Debug, Eq, Hash, PartialEq)]
pub struct ConfiguredTargetKey {
    pub label: TargetLabel,
    pub configuration: Option<Configuration>,
    pub forced_execution_platform: Option<TargetLabel>,
}

impl ConfiguredTargetKey {
    pub fn new(label: TargetLabel, configuration: Option<Configuration>) -> Self {
        Self {
            label,
            configuration,
            forced_execution_platform: None,
        }
    }

    pub fn with_forced_execution_platform(mut self, platform: TargetLabel) -> Self {
        self.forced_execution_platform = Some(platform);
        self
    }

    pub fn configured_label(&self) -> ConfiguredTargetLabel {
        match &self.configuration {
            Some(cfg) => self.label.configure(cfg.dupe()),
            None => self.label.unconfigured(),
        }
    }
}

impl Display for ConfiguredTargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.configured_label())?;
        if let Some(platform) = &self.forced_execution_platform {
            write!(f, " exec_on={}", platform)?;
        }
        Ok(())
    }
}

/// Requests a toolchain context for one execution group from the resolver
/// collaborator.
#[derive(Allocative, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ToolchainContextKey {
    pub request: ToolchainRequest,
}

impl Display for ToolchainContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ToolchainContext({}, {} types",
            self.request.configuration,
            self.request.toolchain_types.len()
        )?;
        if let Some(platform) = &self.request.forced_execution_platform {
            write!(f, ", exec_on={}", platform)?;
        }
        write!(f, ")")
    }
}

/// Requests the providers a stack of aspects contributes to one configured
/// target.
#[derive(Allocative, Clone, Debug, Eq, Hash, PartialEq)]
pub struct AspectKey {
    pub label: TargetLabel,
    pub configuration: Option<Configuration>,
    #[allocative(skip)]
    pub aspects: Vec<Arc<AspectDefinition>>,
}

impl Display for AspectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aspects([")?;
        for (i, aspect) in self.aspects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", aspect.name)?;
        }
        write!(f, "] on {}", self.label)?;
        match &self.configuration {
            Some(cfg) => write!(f, " ({}))", cfg),
            None => write!(f, " (null))"),
        }
    }
}
