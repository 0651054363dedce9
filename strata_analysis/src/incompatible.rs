/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Platform compatibility checks.
//!
//! Direct incompatibility comes from the target's own
//! `target_compatible_with` (all constraints must hold) or the legacy
//! `compatible_with` (any constraint may hold) resolved against the config
//! conditions. Indirect incompatibility propagates from any required
//! dependency that is itself incompatible.

use std::sync::Arc;

use anyhow::Context;
use dupe::Dupe;
use itertools::Either;
use itertools::Itertools;
use thiserror::Error;

use strata_core::configuration::Configuration;
use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;
use strata_node::attrs::configuration_context::configure_attr;
use strata_node::attrs::configuration_context::AttrConfigurationContext;
use strata_node::attrs::configuration_context::ConfiguredDep;
use strata_node::attrs::attr::DepAttrType;
use strata_node::attrs::internal::TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use strata_node::compatibility::IncompatiblePlatformReason;
use strata_node::compatibility::IncompatiblePlatformReasonCause;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::provider::ConfigConditions;

pub const LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD: &str = "compatible_with";

#[derive(Debug, Error)]
enum CompatibilityCheckError {
    #[error("expected `{0}` to be a list of labels")]
    NotALabelList(String),
    #[error(
        "`{0}` has both `{}` and `{}` attributes; it should only have one",
        TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD,
        LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD
    )]
    BothCompatibleWith(TargetLabel),
    #[error("select() condition `{0}` was not resolved as a config condition")]
    UnresolvedCondition(TargetLabel),
}

enum CompatibilityConstraints {
    /// All constraints must be satisfied (`target_compatible_with`).
    All(Vec<TargetLabel>),
    /// At least one constraint must be satisfied (`compatible_with`).
    Any(Vec<TargetLabel>),
}

/// A context good enough to resolve compatibility attributes: it can
/// answer select() matches but has no dependency edges to configure.
struct CompatibilityConfigurationContext<'a> {
    cfg: &'a Configuration,
    conditions: &'a ConfigConditions,
}

impl AttrConfigurationContext for CompatibilityConfigurationContext<'_> {
    fn matches(&self, label: &TargetLabel) -> anyhow::Result<bool> {
        match self.conditions.get(label) {
            Some(provider) => Ok(provider.matches),
            None => Err(CompatibilityCheckError::UnresolvedCondition(label.dupe()).into()),
        }
    }

    fn cfg(&self) -> &Configuration {
        self.cfg
    }

    fn configure_dep(
        &self,
        _label: &TargetLabel,
        _dep_type: &DepAttrType,
    ) -> anyhow::Result<ConfiguredDep> {
        unreachable!("compatibility attributes have no dependency edges")
    }
}

fn unpack_compatible_with_attr(
    node: &TargetNode,
    ctx: &dyn AttrConfigurationContext,
    attr_name: &str,
) -> anyhow::Result<Option<Vec<TargetLabel>>> {
    let (attribute, value) = match node
        .rule_class()
        .attribute(attr_name)
        .zip(node.attr_or_default(attr_name))
    {
        Some(found) => found,
        None => return Ok(None),
    };
    let configured = configure_attr(attribute.attr_type(), value, ctx)
        .with_context(|| format!("when configuring attribute `{}`", attr_name))?;
    match configured.unpack_list() {
        Some(_) => {
            let labels = configured.as_label_list();
            if labels.is_empty() {
                Ok(None)
            } else {
                Ok(Some(labels))
            }
        }
        None => Err(CompatibilityCheckError::NotALabelList(attr_name.to_owned()).into()),
    }
}

/// The direct check: resolves the compatibility attributes against the
/// config conditions and reports the first unsatisfied constraint.
pub fn check_direct_compatibility(
    label: &ConfiguredTargetLabel,
    node: &TargetNode,
    cfg: &Configuration,
    conditions: &ConfigConditions,
) -> anyhow::Result<Option<Arc<IncompatiblePlatformReason>>> {
    let ctx = CompatibilityConfigurationContext { cfg, conditions };
    let target_compatible =
        unpack_compatible_with_attr(node, &ctx, TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD)?;
    let legacy_compatible =
        unpack_compatible_with_attr(node, &ctx, LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD)?;

    let constraints = match (target_compatible, legacy_compatible) {
        (None, None) => return Ok(None),
        (Some(..), Some(..)) => {
            return Err(CompatibilityCheckError::BothCompatibleWith(node.label().dupe()).into());
        }
        (Some(all), None) => CompatibilityConstraints::All(all),
        (None, Some(any)) => CompatibilityConstraints::Any(any),
    };

    let check = |labels: Vec<TargetLabel>| -> anyhow::Result<(Vec<TargetLabel>, Vec<TargetLabel>)> {
        let matched = labels
            .into_iter()
            .map(|constraint| Ok((ctx.matches(&constraint)?, constraint)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(matched.into_iter().partition_map(|(matches, constraint)| {
            if matches {
                Either::Left(constraint)
            } else {
                Either::Right(constraint)
            }
        }))
    };

    // Only the first unsatisfied constraint is recorded, for either flavor.
    let unsatisfied = match constraints {
        CompatibilityConstraints::All(labels) => {
            let (_, unsatisfied) = check(labels)?;
            unsatisfied.into_iter().next()
        }
        CompatibilityConstraints::Any(labels) => {
            let (satisfied, unsatisfied) = check(labels)?;
            if satisfied.is_empty() {
                unsatisfied.into_iter().next()
            } else {
                None
            }
        }
    };

    Ok(unsatisfied.map(|constraint| {
        Arc::new(IncompatiblePlatformReason {
            target: label.clone(),
            cause: IncompatiblePlatformReasonCause::UnsatisfiedConfig(constraint),
        })
    }))
}

/// The indirect check: a target is incompatible when any required
/// dependency is.
pub fn incompatible_via_dependency(
    label: &ConfiguredTargetLabel,
    dep_reason: &Arc<IncompatiblePlatformReason>,
) -> Arc<IncompatiblePlatformReason> {
    Arc::new(IncompatiblePlatformReason {
        target: label.clone(),
        cause: IncompatiblePlatformReasonCause::Dependency(dep_reason.dupe()),
    })
}
