/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Config-condition evaluation.
//!
//! The targets keying a rule's configurable attributes (its `select()`
//! keys, plus the labels of its compatibility attributes) are configured
//! targets themselves, requested in the *parent's* configuration. Each
//! must expose a `ConfigMatchingProvider`. Condition labels are collected
//! from the raw attribute map; that is sound because the schema of
//! condition-list attributes is itself never configurable.

use dupe::Dupe;

use strata_core::causes::Cause;
use strata_core::causes::FailureKind;
use strata_core::configuration::Configuration;
use strata_core::target::TargetLabel;
use strata_node::attrs::coerced_attr::CoercedAttr;
use strata_node::attrs::internal::TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use strata_node::compatibility::MaybeCompatible;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::provider::ConfigConditions;
use weft::WeftComputations;
use weft::WeftResult;

use crate::calculation::configured_target::ConfiguredTargetState;
use crate::error::as_creation_error;
use crate::error::ConfiguredValueCreationError;
use crate::incompatible::LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use crate::keys::ConfiguredTargetKey;

/// Every label that keys configurable behavior of this target: `select()`
/// conditions plus the constraint labels of the compatibility attributes.
pub fn config_condition_labels(node: &TargetNode) -> Vec<TargetLabel> {
    let mut labels = node.select_keys();
    for attr_name in [
        TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD,
        LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD,
    ] {
        if let Some(value) = node.attr_or_default(attr_name) {
            collect_labels(value, &mut labels);
        }
    }
    let mut seen = std::collections::HashSet::new();
    labels.retain(|label| seen.insert(label.dupe()));
    labels
}

fn collect_labels(attr: &CoercedAttr, out: &mut Vec<TargetLabel>) {
    match attr {
        CoercedAttr::Label(label) => out.push(label.dupe()),
        CoercedAttr::List(items) | CoercedAttr::Concat(items) => {
            for item in items {
                collect_labels(item, out);
            }
        }
        CoercedAttr::Select { entries, default } => {
            for (_, value) in entries {
                collect_labels(value, out);
            }
            if let Some(default) = default {
                collect_labels(default, out);
            }
        }
        CoercedAttr::Bool(..) | CoercedAttr::Int(..) | CoercedAttr::String(..) => {}
    }
}

pub enum ConfigConditionsOutcome {
    Ready(ConfigConditions),
    Pending,
    Failed(ConfiguredValueCreationError),
}

/// Requests the configured targets behind every condition label, in the
/// parent's configuration, and validates their providers. Failing
/// conditions are merged into the state's root causes so more causes can
/// surface; an invalid condition (no matching provider) fails immediately.
pub(crate) fn get_config_conditions(
    env: &mut WeftComputations,
    node: &TargetNode,
    configuration: &Configuration,
    state: &mut ConfiguredTargetState,
) -> WeftResult<ConfigConditionsOutcome> {
    let labels = config_condition_labels(node);
    if labels.is_empty() {
        return Ok(ConfigConditionsOutcome::Ready(ConfigConditions::empty()));
    }

    let keys: Vec<ConfiguredTargetKey> = labels
        .iter()
        .map(|label| ConfiguredTargetKey::new(label.dupe(), Some(configuration.dupe())))
        .collect();
    let values = env.get_values(keys)?;
    if values.iter().any(Option::is_none) {
        return Ok(ConfigConditionsOutcome::Pending);
    }

    let mut conditions = ConfigConditions::empty();
    for (label, value) in labels.iter().zip(values) {
        match value.unwrap() {
            Err(e) => {
                // The condition's own error was reported by its node; record
                // the causes and keep going so siblings can add theirs.
                match as_creation_error(&e) {
                    Some(creation) => {
                        state
                            .transitive_root_causes
                            .add_transitive(creation.root_causes.dupe());
                    }
                    None => {
                        state.transitive_root_causes.add(Cause::new(
                            label.dupe(),
                            FailureKind::DependencyEvaluationFailed,
                        ));
                    }
                }
            }
            Ok(MaybeCompatible::Incompatible(..)) => {
                return Ok(ConfigConditionsOutcome::Failed(invalid_condition(
                    node,
                    configuration,
                    label,
                )));
            }
            Ok(MaybeCompatible::Compatible(handle)) => {
                if let Some(builder) = &mut state.transitive_packages {
                    if let Some(packages) = handle.transitive_packages() {
                        builder.add_transitive(packages.dupe());
                    }
                }
                match handle.providers().config_matching() {
                    Some(provider) => conditions.insert(label.dupe(), provider.clone()),
                    None => {
                        return Ok(ConfigConditionsOutcome::Failed(invalid_condition(
                            node,
                            configuration,
                            label,
                        )));
                    }
                }
            }
        }
    }

    Ok(ConfigConditionsOutcome::Ready(conditions))
}

fn invalid_condition(
    node: &TargetNode,
    configuration: &Configuration,
    condition: &TargetLabel,
) -> ConfiguredValueCreationError {
    ConfiguredValueCreationError::own(
        node.label().dupe(),
        Some(configuration.event_id().to_owned()),
        FailureKind::ConfigConditionsFailed,
        format!(
            "{} is not a valid select() condition for {}",
            condition,
            node.label()
        ),
    )
}
