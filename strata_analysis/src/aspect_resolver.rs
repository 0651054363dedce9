/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Aspect application along dependency edges.
//!
//! For each `(edge, aspect)` pair whose `required_providers` are satisfied
//! by the dependency's providers, an `AspectKey` node computes the
//! providers the aspect stack contributes; the resolver then merges them
//! into the dependency's provider set, failing on a duplicate provider id.

use std::sync::Arc;

use anyhow::Context;
use dupe::Dupe;

use strata_core::causes::FailureKind;
use strata_core::result::SharedResult;
use strata_node::aspect::AspectDefinition;
use strata_node::compatibility::MaybeCompatible;
use strata_node::nodes::configured::ConfiguredTargetAndData;
use strata_node::nodes::configured::ConfiguredTargetHandle;
use strata_node::provider::ProviderSet;
use weft::Key;
use weft::Step;
use weft::WeftComputations;
use weft::WeftResult;

use crate::delegate::AnalysisDelegate;
use crate::error::ConfiguredValueCreationError;
use crate::keys::AspectKey;
use crate::keys::ConfiguredTargetKey;
use crate::keys::PackageKey;

impl Key for AspectKey {
    type Value = SharedResult<Arc<ProviderSet>>;

    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>> {
        let delegate = AnalysisDelegate::get(env);

        let base = match env.get_value(&ConfiguredTargetKey::new(
            self.label.dupe(),
            self.configuration.dupe(),
        ))? {
            Some(base) => base,
            None => return Ok(Step::Pending),
        };
        let base = match base {
            Ok(MaybeCompatible::Compatible(base)) => base,
            // Aspects contribute nothing to incompatible targets.
            Ok(MaybeCompatible::Incompatible(..)) => {
                return Ok(Step::Ready(Ok(Arc::new(ProviderSet::new()))));
            }
            Err(e) => return Ok(Step::Ready(Err(e))),
        };

        // The aspect implementation inspects the underlying target, which
        // for an alias lives in the actual label's package.
        let actual = base.actual_label().label().dupe();
        let package = match env.get_value(&PackageKey(actual.pkg().dupe()))? {
            Some(package) => package,
            None => return Ok(Step::Pending),
        };
        let package = match package {
            Ok(package) => package,
            Err(e) => return Ok(Step::Ready(Err(e))),
        };

        let result = apply_aspect_stack(&delegate, &base, &package, &actual, &self.aspects);
        Ok(Step::Ready(result.map(Arc::new).map_err(|e| {
            ConfiguredValueCreationError::own(
                self.label.dupe(),
                self.configuration.as_ref().map(|c| c.event_id().to_owned()),
                FailureKind::AspectCreationFailed,
                format!("aspect application failed: {:#}", e),
            )
            .into_shared()
        })))
    }

    fn equality(x: &Self::Value, y: &Self::Value) -> bool {
        match (x, y) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }
}

fn apply_aspect_stack(
    delegate: &AnalysisDelegate,
    base: &ConfiguredTargetHandle,
    package: &strata_node::package::PackageValue,
    actual: &strata_core::target::TargetLabel,
    aspects: &[Arc<AspectDefinition>],
) -> anyhow::Result<ProviderSet> {
    let target = package.target(actual.name())?;
    let mut contributed = ProviderSet::new();
    for aspect in aspects {
        if !aspect.applies_to(base.providers()) {
            continue;
        }
        let providers = aspect
            .implementation
            .analyze(target, base.providers(), delegate.interners())
            .with_context(|| format!("running aspect `{}`", aspect.name))?;
        contributed
            .merge(&providers)
            .with_context(|| format!("merging providers of aspect `{}`", aspect.name))?;
    }
    Ok(contributed)
}

/// The aspect stacks to request per dependency: aspects whose required
/// providers the dep satisfies. Empty when nothing applies.
pub fn applicable_aspects(
    aspects: &[Arc<AspectDefinition>],
    dep: &ConfiguredTargetAndData,
) -> Vec<Arc<AspectDefinition>> {
    aspects
        .iter()
        .filter(|aspect| aspect.applies_to(dep.configured.providers()))
        .map(Dupe::dupe)
        .collect()
}

/// Merges aspect-contributed providers into a dependency's value, failing
/// with a duplicate-provider error on collision.
pub fn merge_aspect_providers(
    dep: &ConfiguredTargetAndData,
    contributed: &ProviderSet,
) -> anyhow::Result<ConfiguredTargetAndData> {
    if contributed.is_empty() {
        return Ok(dep.clone());
    }
    let merged = dep.configured.with_extra_providers(contributed)?;
    Ok(ConfiguredTargetAndData {
        configured: ConfiguredTargetHandle::new(merged),
        target: dep.target.dupe(),
        configuration: dep.configuration.dupe(),
        transition_key: dep.transition_key.clone(),
    })
}
