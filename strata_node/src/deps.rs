/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Dependency edges as the dependency resolver produces them.

use std::fmt;
use std::fmt::Display;

use allocative::Allocative;

use strata_core::configuration::Configuration;
use strata_core::target::TargetLabel;

use crate::transition::TransitionKey;

/// What kind of edge a dependency travels along.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DependencyKind {
    /// A regular attribute of the rule, by attribute name.
    Attribute(String),
    /// An implicit dependency added by the rule definition.
    Implicit(String),
    /// A toolchain of the named execution group.
    Toolchain(String),
    /// A package-group edge backing a visibility declaration.
    Visibility,
}

impl Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Attribute(name) => write!(f, "attr `{}`", name),
            DependencyKind::Implicit(name) => write!(f, "implicit `{}`", name),
            DependencyKind::Toolchain(group) => write!(f, "toolchain ({})", group),
            DependencyKind::Visibility => write!(f, "visibility"),
        }
    }
}

/// One resolved outgoing edge: the child label with its post-transition
/// configuration (`None` for non-configurable children), tagged with the
/// split-transition key when the edge came out of a split.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Dependency {
    pub label: TargetLabel,
    pub configuration: Option<Configuration>,
    pub kind: DependencyKind,
    pub transition_key: Option<TransitionKey>,
    /// For toolchain edges: the child is evaluated as a toolchain of this
    /// target, so the chosen execution platform is forced on it instead of
    /// re-resolved.
    pub forced_execution_platform: Option<TargetLabel>,
}

impl Dependency {
    pub fn new(
        label: TargetLabel,
        configuration: Option<Configuration>,
        kind: DependencyKind,
    ) -> Self {
        Dependency {
            label,
            configuration,
            kind,
            transition_key: None,
            forced_execution_platform: None,
        }
    }

    pub fn with_transition_key(mut self, key: TransitionKey) -> Self {
        self.transition_key = Some(key);
        self
    }

    pub fn with_forced_execution_platform(mut self, platform: TargetLabel) -> Self {
        self.forced_execution_platform = Some(platform);
        self
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.configuration {
            Some(cfg) => write!(f, "{} ({}) via {}", self.label, cfg, self.kind),
            None => write!(f, "{} (null) via {}", self.label, self.kind),
        }
    }
}
