/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The configured target value: what analysis produces for one
//! `(label, configuration)` pair.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

use strata_core::configuration::Configuration;
use strata_core::nested_set::NestedSet;
use strata_core::package::PackageId;
use strata_core::target::ConfiguredTargetLabel;

use crate::actions::Action;
use crate::nodes::unconfigured::TargetNode;
use crate::provider::ProviderSet;
use crate::toolchain::ResolvedToolchainContext;
use crate::toolchain::ToolchainCollection;
use crate::transition::TransitionKey;

#[derive(Allocative, Clone, Copy, Dupe, Debug, Eq, PartialEq)]
pub enum ConfiguredTargetKind {
    /// Produced by running a rule implementation.
    Rule,
    /// A non-rule value (source file, alias forwarding node). Never owns
    /// actions.
    NonRule,
    /// The placeholder produced when a target's configurability does not
    /// match its requested configuration. No providers, no actions; the
    /// mismatch surfaces when something tries to use it.
    Empty,
}

#[derive(Allocative)]
pub struct ConfiguredTargetValue {
    label: ConfiguredTargetLabel,
    kind: ConfiguredTargetKind,
    providers: ProviderSet,
    actions: Vec<Action>,
    exec_group_bindings: Option<ToolchainCollection<ResolvedToolchainContext>>,
    /// Only populated when the evaluation opted into transitive-package
    /// tracking.
    transitive_packages: Option<NestedSet<PackageId>>,
    /// For alias targets: the configured label this one forwards to.
    actual: Option<ConfiguredTargetLabel>,
}

impl ConfiguredTargetValue {
    pub fn rule(
        label: ConfiguredTargetLabel,
        providers: ProviderSet,
        actions: Vec<Action>,
        exec_group_bindings: Option<ToolchainCollection<ResolvedToolchainContext>>,
        transitive_packages: Option<NestedSet<PackageId>>,
    ) -> Self {
        Self {
            label,
            kind: ConfiguredTargetKind::Rule,
            providers,
            actions,
            exec_group_bindings,
            transitive_packages,
            actual: None,
        }
    }

    pub fn non_rule(
        label: ConfiguredTargetLabel,
        providers: ProviderSet,
        transitive_packages: Option<NestedSet<PackageId>>,
    ) -> Self {
        Self {
            label,
            kind: ConfiguredTargetKind::NonRule,
            providers,
            actions: Vec::new(),
            exec_group_bindings: None,
            transitive_packages,
            actual: None,
        }
    }

    pub fn alias(
        label: ConfiguredTargetLabel,
        actual: ConfiguredTargetLabel,
        providers: ProviderSet,
        transitive_packages: Option<NestedSet<PackageId>>,
    ) -> Self {
        Self {
            label,
            kind: ConfiguredTargetKind::NonRule,
            providers,
            actions: Vec::new(),
            exec_group_bindings: None,
            transitive_packages,
            actual: Some(actual),
        }
    }

    pub fn empty(
        label: ConfiguredTargetLabel,
        transitive_packages: Option<NestedSet<PackageId>>,
    ) -> Self {
        Self {
            label,
            kind: ConfiguredTargetKind::Empty,
            providers: ProviderSet::new(),
            actions: Vec::new(),
            exec_group_bindings: None,
            transitive_packages,
            actual: None,
        }
    }

    pub fn label(&self) -> &ConfiguredTargetLabel {
        &self.label
    }

    /// The label this target actually denotes: the forwarded label for an
    /// alias, its own otherwise.
    pub fn actual_label(&self) -> &ConfiguredTargetLabel {
        self.actual.as_ref().unwrap_or(&self.label)
    }

    pub fn kind(&self) -> ConfiguredTargetKind {
        self.kind
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn exec_group_bindings(&self) -> Option<&ToolchainCollection<ResolvedToolchainContext>> {
        self.exec_group_bindings.as_ref()
    }

    pub fn transitive_packages(&self) -> Option<&NestedSet<PackageId>> {
        self.transitive_packages.as_ref()
    }

    /// A copy of this value with extra providers merged in (aspect
    /// application). Fails on a duplicate provider id.
    pub fn with_extra_providers(&self, extra: &ProviderSet) -> anyhow::Result<ConfiguredTargetValue> {
        let mut providers = self.providers.clone();
        providers.merge(extra)?;
        Ok(ConfiguredTargetValue {
            label: self.label.clone(),
            kind: self.kind,
            providers,
            actions: self.actions.clone(),
            exec_group_bindings: self.exec_group_bindings.clone(),
            transitive_packages: self.transitive_packages.clone(),
            actual: self.actual.clone(),
        })
    }
}

impl Debug for ConfiguredTargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredTargetValue")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A cheap handle to a configured target value, used everywhere the value
/// flows through dependency maps. Handle equality is identity; use
/// [`content_equal`](Self::content_equal) for the early-cutoff comparison.
#[derive(Allocative, Clone, Dupe, Debug)]
pub struct ConfiguredTargetHandle(Arc<ConfiguredTargetValue>);

impl ConfiguredTargetHandle {
    pub fn new(value: ConfiguredTargetValue) -> Self {
        ConfiguredTargetHandle(Arc::new(value))
    }

    /// Content comparison for incremental cutoff: providers, actions and
    /// identity, ignoring the transitive-package sidecar.
    pub fn content_equal(&self, other: &ConfiguredTargetHandle) -> bool {
        self.0.label == other.0.label
            && self.0.kind == other.0.kind
            && self.0.actual == other.0.actual
            && self.0.providers == other.0.providers
            && self.0.actions == other.0.actions
    }
}

impl std::ops::Deref for ConfiguredTargetHandle {
    type Target = ConfiguredTargetValue;

    fn deref(&self) -> &ConfiguredTargetValue {
        &self.0
    }
}

impl PartialEq for ConfiguredTargetHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ConfiguredTargetHandle {}

impl Hash for ConfiguredTargetHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state)
    }
}

/// A dependency's configured value paired with the data the parent needs
/// alongside it: the child's target node (from its actual package, which
/// for aliases differs from the requested label's), the configuration the
/// edge produced, and the split-transition key if any.
#[derive(Allocative, Clone, Debug)]
pub struct ConfiguredTargetAndData {
    pub configured: ConfiguredTargetHandle,
    pub target: TargetNode,
    pub configuration: Option<Configuration>,
    pub transition_key: Option<TransitionKey>,
}
