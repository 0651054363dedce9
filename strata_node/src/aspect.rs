/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Aspects: orthogonal computations attached along dependency edges to
//! contribute extra providers to targets of matching shape.

use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use allocative::Allocative;

use strata_core::Interners;

use crate::nodes::unconfigured::TargetNode;
use crate::provider::ProviderId;
use crate::provider::ProviderSet;

/// The aspect analysis capability, invoked with the base target's provider
/// set once that target is configured.
pub trait AspectImplementation: Send + Sync + 'static {
    fn analyze(
        &self,
        target: &TargetNode,
        base_providers: &ProviderSet,
        interners: &Interners,
    ) -> anyhow::Result<ProviderSet>;
}

/// An aspect's definition. Identity is the aspect name: two definitions
/// with the same name are the same aspect.
#[derive(Allocative)]
pub struct AspectDefinition {
    pub name: String,
    /// The aspect only applies to deps whose provider set contains all of
    /// these.
    pub required_providers: Vec<ProviderId>,
    #[allocative(skip)]
    pub implementation: Arc<dyn AspectImplementation>,
}

impl AspectDefinition {
    /// Whether the aspect applies to a dep exposing `providers`.
    pub fn applies_to(&self, providers: &ProviderSet) -> bool {
        self.required_providers.iter().all(|id| providers.contains(id))
    }
}

impl PartialEq for AspectDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AspectDefinition {}

impl Hash for AspectDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl Debug for AspectDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
