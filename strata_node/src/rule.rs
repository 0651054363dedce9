/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Rule classes and the rule-implementation capability.
//!
//! Rule logic itself lives outside the core (in the embedded scripting
//! runtime); the core invokes it through the opaque [`RuleImplementation`]
//! object a rule class carries, handing it resolved attributes, dependency
//! values and toolchains, and taking back providers plus registered
//! actions.

use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use allocative::Allocative;
use indexmap::IndexMap;
use thiserror::Error;

use strata_core::configuration::Configuration;
use strata_core::configuration::FragmentKey;
use strata_core::target::TargetLabel;
use strata_core::Interners;
use weft::EventSink;

use crate::actions::ActionRegistry;
use crate::attrs::attr::Attribute;
use crate::attrs::configured_attr::ConfiguredAttr;
use crate::deps::DependencyKind;
use crate::nodes::configured::ConfiguredTargetAndData;
use crate::nodes::unconfigured::TargetNode;
use crate::provider::ConfigConditions;
use crate::provider::ProviderSet;
use crate::toolchain::ExecGroup;
use crate::toolchain::ResolvedToolchainContext;
use crate::toolchain::ToolchainCollection;
use crate::toolchain::ToolchainTypeId;

/// Raised by a rule implementation that observed a missing graph value.
/// The configured-target function restarts when its environment agrees
/// that values are missing, and treats it as a bug otherwise.
#[derive(Debug, Error)]
#[error("rule implementation observed missing dependency values")]
pub struct MissingDepError;

/// Raised by a rule implementation referring to an execution group the
/// rule never declared.
#[derive(Debug, Error)]
#[error("invalid execution group `{0}`")]
pub struct InvalidExecGroupError(pub String);

/// Deliberate analysis failure propagation (e.g. a testing rule asserting
/// on failures of its deps).
#[derive(Debug, Error)]
#[error("analysis failure propagated: {0}")]
pub struct AnalysisFailurePropagationError(pub String);

#[derive(Allocative, Clone, Copy, Debug, Eq, PartialEq)]
pub enum RuleKind {
    /// An ordinary configurable rule.
    Rule,
    /// A source file; never configurable.
    Source,
    /// A forwarding target: exposes the providers of its `actual` dep.
    Alias,
}

/// Everything a rule implementation may look at.
pub struct RuleAnalysisContext<'a> {
    pub target: &'a TargetNode,
    pub configuration: Option<&'a Configuration>,
    pub attrs: &'a IndexMap<String, ConfiguredAttr>,
    pub deps: &'a IndexMap<DependencyKind, Vec<ConfiguredTargetAndData>>,
    pub config_conditions: &'a ConfigConditions,
    pub toolchains: Option<&'a ToolchainCollection<ResolvedToolchainContext>>,
    pub actions: &'a mut ActionRegistry,
    pub events: &'a dyn EventSink,
    pub interners: &'a Interners,
}

impl<'a> RuleAnalysisContext<'a> {
    pub fn attr(&self, name: &str) -> Option<&ConfiguredAttr> {
        self.attrs.get(name)
    }

    /// The dependency values of one regular attribute.
    pub fn attr_deps(&self, name: &str) -> &[ConfiguredTargetAndData] {
        self.deps
            .get(&DependencyKind::Attribute(name.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn toolchain_context(&self, exec_group: &str) -> anyhow::Result<&ResolvedToolchainContext> {
        self.toolchains
            .and_then(|collection| collection.get(exec_group))
            .ok_or_else(|| InvalidExecGroupError(exec_group.to_owned()).into())
    }
}

pub trait RuleImplementation: Send + Sync + 'static {
    fn analyze(&self, ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet>;
}

/// The parsed definition of a rule: attribute schema, fragment
/// requirements, toolchain demands and the implementation capability.
#[derive(Allocative)]
pub struct RuleClass {
    pub name: String,
    pub kind: RuleKind,
    #[allocative(skip)]
    pub attrs: IndexMap<String, Attribute>,
    /// The option fragments rules of this class read. Dependency edges trim
    /// child configurations to this set.
    pub required_fragments: Vec<FragmentKey>,
    pub toolchain_types: Vec<ToolchainTypeId>,
    pub exec_groups: Vec<ExecGroup>,
    pub exec_compatible_with: Vec<TargetLabel>,
    pub use_toolchain_resolution: bool,
    /// Dependencies every target of this class has, independent of its
    /// attribute values.
    pub implicit_deps: Vec<(String, TargetLabel)>,
    #[allocative(skip)]
    pub implementation: Arc<dyn RuleImplementation>,
}

impl RuleClass {
    pub fn is_configurable(&self) -> bool {
        !matches!(self.kind, RuleKind::Source)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attrs.get(name)
    }
}

impl Debug for RuleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
