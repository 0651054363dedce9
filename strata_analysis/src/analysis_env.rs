/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Rule implementation invocation.
//!
//! The analysis environment a rule implementation runs against is a
//! buffered event sink plus an action registry. Events are replayed onto
//! the evaluation listener only on completion; error events without an
//! accompanying exception become root causes of a failed value.

use indexmap::IndexMap;

use dupe::Dupe;

use strata_core::causes::Cause;
use strata_core::causes::FailureKind;
use strata_core::nested_set::NestedSet;
use strata_core::nested_set::NestedSetBuilder;
use strata_core::package::PackageId;
use strata_node::actions::ActionError;
use strata_node::actions::ActionRegistry;
use strata_node::attrs::configured_attr::ConfiguredAttr;
use strata_node::attrs::internal::ALIAS_ACTUAL_ATTRIBUTE_FIELD;
use strata_node::deps::DependencyKind;
use strata_node::nodes::configured::ConfiguredTargetAndData;
use strata_node::nodes::configured::ConfiguredTargetHandle;
use strata_node::nodes::configured::ConfiguredTargetValue;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::provider::ConfigConditions;
use strata_node::provider::ProviderError;
use strata_node::rule::MissingDepError;
use strata_node::rule::RuleAnalysisContext;
use strata_node::rule::RuleKind;
use strata_node::toolchain::ResolvedToolchainContext;
use strata_node::toolchain::ToolchainCollection;
use strata_node::toolchain::UnloadedToolchainContext;
use strata_core::configuration::Configuration;
use weft::EventSink;
use weft::StoredEvents;
use weft::WeftComputations;

use crate::delegate::AnalysisDelegate;
use crate::error::ConfiguredValueCreationError;
use crate::keys::ConfiguredTargetKey;

/// What invoking the rule implementation produced.
pub enum RuleAnalysisOutcome {
    Value(ConfiguredTargetHandle),
    /// The implementation observed missing graph values; restart.
    MissingDeps,
    Failed(ConfiguredValueCreationError),
}

/// Binds each unloaded toolchain context to the configured values of its
/// toolchains, found among the exec-group-tagged dependency edges.
pub fn resolve_toolchain_contexts(
    unloaded: &ToolchainCollection<std::sync::Arc<UnloadedToolchainContext>>,
    dep_value_map: &IndexMap<DependencyKind, Vec<ConfiguredTargetAndData>>,
) -> ToolchainCollection<ResolvedToolchainContext> {
    let mut resolved = ToolchainCollection::new();
    for (group, context) in unloaded.iter() {
        let group_deps = dep_value_map
            .get(&DependencyKind::Toolchain(group.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let mut toolchains = std::collections::BTreeMap::new();
        for (toolchain_type, toolchain_label) in &context.toolchains {
            if let Some(dep) = group_deps
                .iter()
                .find(|dep| dep.configured.label().label() == toolchain_label)
            {
                toolchains.insert(toolchain_type.dupe(), dep.configured.dupe());
            }
        }
        resolved.add_context(
            group.to_owned(),
            ResolvedToolchainContext {
                execution_platform: context.execution_platform.dupe(),
                toolchains,
            },
        );
    }
    resolved
}

/// Invokes the rule implementation and maps every outcome the capability
/// contract allows. Alias targets never run an implementation: they
/// forward the providers of their `actual` dependency.
#[allow(clippy::too_many_arguments)]
pub fn create_configured_target(
    env: &WeftComputations,
    delegate: &AnalysisDelegate,
    key: &ConfiguredTargetKey,
    node: &TargetNode,
    configuration: Option<&Configuration>,
    attrs: &IndexMap<String, ConfiguredAttr>,
    dep_value_map: &IndexMap<DependencyKind, Vec<ConfiguredTargetAndData>>,
    config_conditions: &ConfigConditions,
    toolchain_contexts: Option<&ToolchainCollection<std::sync::Arc<UnloadedToolchainContext>>>,
    transitive_packages: Option<NestedSet<PackageId>>,
) -> RuleAnalysisOutcome {
    let label = key.configured_label();
    let event_id = configuration.map(|c| c.event_id().to_owned());

    if node.is_alias() {
        let actual = dep_value_map
            .get(&DependencyKind::Attribute(
                ALIAS_ACTUAL_ATTRIBUTE_FIELD.to_owned(),
            ))
            .and_then(|deps| deps.first());
        return match actual {
            Some(actual) => RuleAnalysisOutcome::Value(ConfiguredTargetHandle::new(
                ConfiguredTargetValue::alias(
                    label,
                    actual.configured.actual_label().clone(),
                    actual.configured.providers().clone(),
                    transitive_packages,
                ),
            )),
            None => RuleAnalysisOutcome::Failed(ConfiguredValueCreationError::own(
                node.label().dupe(),
                event_id,
                FailureKind::AnalysisFailed,
                format!("alias `{}` has no `actual` dependency", node.label()),
            )),
        };
    }

    let resolved_toolchains = toolchain_contexts.map(|tc| resolve_toolchain_contexts(tc, dep_value_map));
    let events = StoredEvents::new();
    let mut registry = ActionRegistry::new(label.clone());

    let mut ctx = RuleAnalysisContext {
        target: node,
        configuration,
        attrs,
        deps: dep_value_map,
        config_conditions,
        toolchains: resolved_toolchains.as_ref(),
        actions: &mut registry,
        events: &events,
        interners: delegate.interners(),
    };

    let providers = match node.rule_class().implementation.analyze(&mut ctx) {
        Ok(providers) => providers,
        Err(e) => {
            if e.downcast_ref::<MissingDepError>().is_some() {
                if env.values_missing() {
                    return RuleAnalysisOutcome::MissingDeps;
                }
                return RuleAnalysisOutcome::Failed(ConfiguredValueCreationError::own(
                    node.label().dupe(),
                    event_id,
                    FailureKind::AnalysisFailed,
                    "rule implementation reported missing values but none were requested",
                ));
            }
            let kind = if e.downcast_ref::<ActionError>().is_some() {
                FailureKind::ActionConflict
            } else if matches!(
                e.downcast_ref::<ProviderError>(),
                Some(ProviderError::DuplicateProvider(..))
            ) {
                FailureKind::DuplicateProvider
            } else {
                // Invalid exec groups and propagated analysis failures land
                // here with everything else the capability may raise.
                FailureKind::AnalysisFailed
            };
            // Conflicts and exec-group misuse are reported here; the error
            // value is marked so callers do not print it again.
            let error = ConfiguredValueCreationError::own(
                node.label().dupe(),
                event_id,
                kind,
                format!("{:#}", e),
            );
            env.listener().handle(weft::Event::error(
                Some(node.location().to_owned()),
                error.message.clone(),
            ));
            return RuleAnalysisOutcome::Failed(error.reported());
        }
    };

    // A clean return still fails the node if the implementation emitted
    // error events; each one becomes a root cause.
    events.replay_on(env.listener());
    if events.has_errors() {
        let mut causes = NestedSetBuilder::new();
        causes.add(Cause::new(node.label().dupe(), FailureKind::AnalysisFailed));
        return RuleAnalysisOutcome::Failed(
            ConfiguredValueCreationError::aggregated(
                node.label().dupe(),
                event_id,
                FailureKind::AnalysisFailed,
                format!("Analysis of target '{}' failed", node.label()),
                causes.build(),
            )
            .reported(),
        );
    }

    match node.kind() {
        RuleKind::Source => {
            if !registry.is_empty() {
                return RuleAnalysisOutcome::Failed(ConfiguredValueCreationError::own(
                    node.label().dupe(),
                    event_id,
                    FailureKind::AnalysisFailed,
                    format!("non-rule `{}` cannot register actions", node.label()),
                ));
            }
            RuleAnalysisOutcome::Value(ConfiguredTargetHandle::new(
                ConfiguredTargetValue::non_rule(label, providers, transitive_packages),
            ))
        }
        RuleKind::Rule | RuleKind::Alias => {
            RuleAnalysisOutcome::Value(ConfiguredTargetHandle::new(ConfiguredTargetValue::rule(
                label,
                providers,
                registry.finalize(),
                resolved_toolchains,
                transitive_packages,
            )))
        }
    }
}
