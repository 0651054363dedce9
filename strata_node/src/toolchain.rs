/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Toolchain contexts and the resolver collaborator.
//!
//! The core does not perform toolchain resolution itself: it builds a
//! request per execution group, hands it to the injected
//! [`ToolchainResolver`], and wraps the answer. A target owns one context
//! per execution group (plus the default group), each possibly bound to a
//! different execution platform.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use dupe::Dupe;
use indexmap::IndexMap;

use strata_core::configuration::Configuration;
use strata_core::interner::Intern;
use strata_core::target::TargetLabel;
use strata_core::Interners;

/// The name of a declared execution group. The default group is unnamed.
pub const DEFAULT_EXEC_GROUP: &str = "default";

/// An interned toolchain type name (`"jvm"`, `"cc"`, ...).
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ToolchainTypeId(Intern<String>);

impl ToolchainTypeId {
    pub fn new(interners: &Interners, name: impl Into<String>) -> Self {
        ToolchainTypeId(interners.toolchain_types.intern(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for ToolchainTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named partition of a target's actions that may resolve an independent
/// toolchain set.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExecGroup {
    pub name: String,
    pub toolchain_types: Vec<ToolchainTypeId>,
    pub exec_compatible_with: Vec<TargetLabel>,
}

impl ExecGroup {
    /// The implicit group holding the rule's own toolchain requirements and
    /// default execution constraints.
    pub fn default_group(
        toolchain_types: Vec<ToolchainTypeId>,
        exec_compatible_with: Vec<TargetLabel>,
    ) -> Self {
        ExecGroup {
            name: DEFAULT_EXEC_GROUP.to_owned(),
            toolchain_types,
            exec_compatible_with,
        }
    }

    /// Group inheritance: a declared group without its own constraints
    /// copies the default group's.
    pub fn inheriting(mut self, default: &ExecGroup) -> Self {
        if self.exec_compatible_with.is_empty() {
            self.exec_compatible_with = default.exec_compatible_with.clone();
        }
        self
    }
}

/// An execution platform chosen by the resolver.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash)]
pub struct ExecutionPlatform {
    pub label: TargetLabel,
    pub cfg: Configuration,
}

/// What the toolchain resolver answers: resolved toolchain labels and the
/// chosen execution platform, or error data when no platform matched.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash)]
pub struct UnloadedToolchainContext {
    pub execution_platform: Option<ExecutionPlatform>,
    pub toolchains: BTreeMap<ToolchainTypeId, TargetLabel>,
    /// Present when no execution platform satisfied the request; the core
    /// wraps this into a `NoMatchingExecutionPlatform` failure.
    pub error_data: Option<String>,
}

/// An unloaded context plus the configured values of its toolchain
/// dependencies.
#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub struct ResolvedToolchainContext {
    pub execution_platform: Option<ExecutionPlatform>,
    pub toolchains: BTreeMap<ToolchainTypeId, crate::nodes::configured::ConfiguredTargetHandle>,
}

/// A target's toolchain contexts, one per execution group. The default
/// group is always present for rules that use toolchain resolution.
#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub struct ToolchainCollection<T> {
    #[allocative(skip)]
    contexts: IndexMap<String, T>,
}

impl<T> ToolchainCollection<T> {
    pub fn new() -> Self {
        Self {
            contexts: IndexMap::new(),
        }
    }

    pub fn add_default_context(&mut self, context: T) {
        self.contexts.insert(DEFAULT_EXEC_GROUP.to_owned(), context);
    }

    pub fn add_context(&mut self, exec_group: impl Into<String>, context: T) {
        self.contexts.insert(exec_group.into(), context);
    }

    pub fn default_context(&self) -> Option<&T> {
        self.contexts.get(DEFAULT_EXEC_GROUP)
    }

    pub fn get(&self, exec_group: &str) -> Option<&T> {
        self.contexts.get(exec_group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.contexts.iter().map(|(name, ctx)| (name.as_str(), ctx))
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl<T> Default for ToolchainCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The request the core sends to the resolver for one execution group.
#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ToolchainRequest {
    pub configuration: Configuration,
    pub toolchain_types: Vec<ToolchainTypeId>,
    pub exec_constraints: Vec<TargetLabel>,
    pub debug: bool,
    /// Set when this target is itself being evaluated as a toolchain of a
    /// parent: the parent's platform is forced instead of re-resolving.
    pub forced_execution_platform: Option<TargetLabel>,
}

/// External collaborator performing execution platform selection and
/// toolchain matching. Consumed through a graph node, never called
/// directly from rule code.
pub trait ToolchainResolver: Send + Sync + 'static {
    fn resolve(&self, request: &ToolchainRequest) -> anyhow::Result<UnloadedToolchainContext>;
}
