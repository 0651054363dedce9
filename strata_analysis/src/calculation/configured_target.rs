/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The configured-target function: the graph computation behind a
//! `ConfiguredTargetKey`.
//!
//! A linear pipeline of stages, each able to suspend on missing graph
//! values and each memoizing its completed result in scratch state so a
//! restart re-enters at the first unfinished stage: load the package and
//! target, check configurability, compute toolchain contexts, evaluate
//! config conditions, check direct incompatibility, resolve dependencies
//! (configurations, children, aspects), check indirect incompatibility,
//! and finally invoke the rule implementation.

use std::sync::Arc;

use dupe::Dupe;
use indexmap::IndexMap;

use strata_core::causes::Cause;
use strata_core::causes::FailureKind;
use strata_core::configuration::Configuration;
use strata_core::nested_set::NestedSet;
use strata_core::nested_set::NestedSetBuilder;
use strata_core::package::PackageId;
use strata_core::result::SharedResult;
use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;
use strata_node::attrs::attr::DepAttrType;
use strata_node::attrs::configuration_context::configure_attr;
use strata_node::attrs::configuration_context::AttrConfigurationContext;
use strata_node::attrs::configuration_context::ConfiguredDep;
use strata_node::attrs::configured_attr::ConfiguredAttr;
use strata_node::compatibility::MaybeCompatible;
use strata_node::deps::DependencyKind;
use strata_node::nodes::configured::ConfiguredTargetHandle;
use strata_node::nodes::configured::ConfiguredTargetValue;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::provider::ConfigConditions;
use strata_node::toolchain::ToolchainCollection;
use strata_node::toolchain::UnloadedToolchainContext;
use strata_node::transition::TransitionKey;
use weft::suspend;
use weft::Event;
use weft::EventSink;
use weft::Key;
use weft::Step;
use weft::WeftComputations;
use weft::WeftResult;

use crate::analysis_env::create_configured_target;
use crate::analysis_env::RuleAnalysisOutcome;
use crate::calculation::config_conditions::get_config_conditions;
use crate::calculation::config_conditions::ConfigConditionsOutcome;
use crate::calculation::deps::compute_dependencies;
use crate::calculation::deps::ComputeDependenciesState;
use crate::calculation::deps::DepMap;
use crate::calculation::deps::StageOutcome;
use crate::delegate::AnalysisDelegate;
use crate::error::ConfiguredValueCreationError;
use crate::incompatible::check_direct_compatibility;
use crate::incompatible::incompatible_via_dependency;
use crate::keys::ConfiguredTargetKey;
use crate::keys::PackageKey;
use crate::toolchain_context::collect_toolchain_contexts;
use crate::toolchain_context::toolchain_context_requests;

type Value = SharedResult<MaybeCompatible<ConfiguredTargetHandle>>;

/// Scratch state preserved across restarts of one configured-target node.
pub struct ConfiguredTargetState {
    /// `Some` iff the evaluation opted into transitive-package tracking.
    pub(crate) transitive_packages: Option<NestedSetBuilder<PackageId>>,
    pub(crate) transitive_root_causes: NestedSetBuilder<Cause>,
    pub(crate) target: Option<TargetNode>,
    pub(crate) deps: ComputeDependenciesState,
}

impl ConfiguredTargetState {
    fn new(store_transitive_packages: bool) -> Self {
        Self {
            transitive_packages: store_transitive_packages.then(NestedSetBuilder::new),
            transitive_root_causes: NestedSetBuilder::new(),
            target: None,
            deps: ComputeDependenciesState::default(),
        }
    }

    fn transitive_packages_snapshot(&self) -> Option<NestedSet<PackageId>> {
        self.transitive_packages.as_ref().map(|builder| builder.build())
    }
}

impl Key for ConfiguredTargetKey {
    type Value = Value;

    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>> {
        let delegate = AnalysisDelegate::get(env);
        let mut state = env.take_state(|| {
            ConfiguredTargetState::new(delegate.options().store_transitive_packages)
        });
        // Configured-target functions are the CPU-heavy computations of the
        // graph; bound how many run at once.
        env.hold_cpu_permit();

        match compute_configured_target(self, &delegate, env, &mut state)? {
            Step::Pending => suspend(env, state),
            Step::Ready(value) => {
                if value.is_ok() {
                    if let Some(progress) = &delegate.options().progress {
                        progress.done_configure_target();
                    }
                }
                Ok(Step::Ready(value))
            }
        }
    }

    fn equality(x: &Self::Value, y: &Self::Value) -> bool {
        match (x, y) {
            (Ok(MaybeCompatible::Compatible(x)), Ok(MaybeCompatible::Compatible(y))) => {
                x.content_equal(y)
            }
            (Ok(MaybeCompatible::Incompatible(x)), Ok(MaybeCompatible::Incompatible(y))) => x == y,
            _ => false,
        }
    }
}

fn ready(value: MaybeCompatible<ConfiguredTargetHandle>) -> WeftResult<Step<Value>> {
    Ok(Step::Ready(Ok(value)))
}

/// Finishes with a failure, printing it unless it was already reported.
fn ready_err(
    env: &WeftComputations,
    location: Option<String>,
    error: ConfiguredValueCreationError,
) -> WeftResult<Step<Value>> {
    let error = if error.is_reported() {
        error
    } else {
        env.listener()
            .handle(Event::error(location, error.message.clone()));
        error.reported()
    };
    Ok(Step::Ready(Err(error.into_shared())))
}

fn compute_configured_target(
    key: &ConfiguredTargetKey,
    delegate: &AnalysisDelegate,
    env: &mut WeftComputations,
    state: &mut ConfiguredTargetState,
) -> WeftResult<Step<Value>> {
    let event_id = key
        .configuration
        .as_ref()
        .map(|cfg| cfg.event_id().to_owned());

    // Load package & target.
    let node = match &state.target {
        Some(node) => node.dupe(),
        None => {
            let package = match env.get_value(&PackageKey(key.label.pkg().dupe()))? {
                Some(package) => package,
                None => return Ok(Step::Pending),
            };
            let package = match package {
                Ok(package) => package,
                Err(e) => {
                    return ready_err(
                        env,
                        None,
                        ConfiguredValueCreationError::own(
                            key.label.dupe(),
                            event_id.clone(),
                            FailureKind::NoSuchPackage,
                            format!("{:#}", e.inner()),
                        ),
                    );
                }
            };
            let node = match package.target(key.label.name()) {
                Ok(node) => node.dupe(),
                Err(e) => {
                    return ready_err(
                        env,
                        Some(package.build_file_path().to_owned()),
                        ConfiguredValueCreationError::own(
                            key.label.dupe(),
                            event_id.clone(),
                            FailureKind::NoSuchTarget,
                            format!("{:#}", e),
                        ),
                    );
                }
            };
            if package.contains_errors() {
                // The target itself survived the parse; record the loading
                // failure and continue so more root causes can surface.
                state
                    .transitive_root_causes
                    .add(Cause::new(key.label.dupe(), FailureKind::NoSuchPackage));
            }
            if let Some(builder) = &mut state.transitive_packages {
                builder.add(key.label.pkg().dupe());
            }
            state.target = Some(node.dupe());
            node
        }
    };

    // Configurability check: a configurable target requested with a null
    // configuration (or the other way round) short-circuits to an empty
    // configured target; the mismatch surfaces at whoever uses it.
    if node.is_configurable() != key.configuration.is_some() {
        return ready(MaybeCompatible::Compatible(ConfiguredTargetHandle::new(
            ConfiguredTargetValue::empty(
                key.configured_label(),
                state.transitive_packages_snapshot(),
            ),
        )));
    }

    // Non-configurable targets (source files) have no conditions, deps or
    // toolchains; invoke their implementation directly.
    let cfg = match &key.configuration {
        Some(cfg) => cfg.dupe(),
        None => {
            return finish(
                key,
                delegate,
                env,
                state,
                &node,
                None,
                IndexMap::new(),
                &ConfigConditions::empty(),
                None,
            );
        }
    };

    // Toolchain context computation.
    let toolchain_contexts = if node.rule_class().use_toolchain_resolution {
        let requests = toolchain_context_requests(
            delegate,
            &node,
            &cfg,
            key.forced_execution_platform.as_ref(),
        );
        let values =
            env.get_values(requests.iter().map(|(_, request)| request.clone()))?;
        if values.iter().any(Option::is_none) {
            return Ok(Step::Pending);
        }
        let mut contexts = Vec::with_capacity(values.len());
        for ((group, request), value) in requests.iter().zip(values) {
            match value.unwrap() {
                Err(e) => {
                    return ready_err(
                        env,
                        Some(node.location().to_owned()),
                        ConfiguredValueCreationError::own(
                            key.label.dupe(),
                            event_id.clone(),
                            FailureKind::ToolchainResolutionFailed,
                            format!(
                                "While resolving toolchains for target {}: {:#}",
                                key.label,
                                e.inner()
                            ),
                        ),
                    );
                }
                Ok(context) => {
                    if let Some(error_data) = &context.error_data {
                        return ready_err(
                            env,
                            Some(node.location().to_owned()),
                            ConfiguredValueCreationError::own(
                                key.label.dupe(),
                                event_id.clone(),
                                FailureKind::NoMatchingExecutionPlatform,
                                format!(
                                    "While resolving toolchains for target {} (group `{}`, {}): {}",
                                    key.label, group, request.request.configuration, error_data
                                ),
                            ),
                        );
                    }
                    contexts.push(context);
                }
            }
        }
        Some(collect_toolchain_contexts(&requests, contexts))
    } else {
        None
    };

    // Config-condition evaluation, in this target's own configuration.
    let config_conditions = match get_config_conditions(env, &node, &cfg, state)? {
        ConfigConditionsOutcome::Pending => return Ok(Step::Pending),
        ConfigConditionsOutcome::Failed(error) => {
            return ready_err(env, Some(node.location().to_owned()), error);
        }
        ConfigConditionsOutcome::Ready(conditions) => conditions,
    };
    if !state.transitive_root_causes.is_empty() && !config_conditions.is_empty() {
        // The attribute map cannot be read safely with failed conditions.
        let causes = state.transitive_root_causes.build();
        return ready_err(
            env,
            Some(node.location().to_owned()),
            ConfiguredValueCreationError::aggregated(
                key.label.dupe(),
                event_id.clone(),
                FailureKind::ConfigConditionsFailed,
                "Cannot compute config conditions",
                causes,
            ),
        );
    }

    // Direct-incompatibility check.
    let configured_label = key.configured_label();
    match check_direct_compatibility(&configured_label, &node, &cfg, &config_conditions) {
        Ok(None) => {}
        Ok(Some(reason)) => {
            // Incompatible targets are skipped, not failed; tell the user.
            env.listener().handle(Event::warning(
                Some(node.location().to_owned()),
                reason.skipping_message(&configured_label),
            ));
            return ready(MaybeCompatible::Incompatible(reason));
        }
        Err(e) => {
            return ready_err(
                env,
                Some(node.location().to_owned()),
                ConfiguredValueCreationError::own(
                    key.label.dupe(),
                    event_id.clone(),
                    FailureKind::AnalysisFailed,
                    format!("{:#}", e),
                ),
            );
        }
    }

    // Dependency resolution, child fetches, aspect merging.
    let dep_value_map = match compute_dependencies(
        env,
        delegate,
        key,
        &node,
        &cfg,
        &config_conditions,
        toolchain_contexts.as_ref(),
        state,
    )? {
        StageOutcome::Pending => return Ok(Step::Pending),
        StageOutcome::Failed(error) => {
            return ready_err(env, Some(node.location().to_owned()), error);
        }
        StageOutcome::Ready(map) => map,
    };
    if !state.transitive_root_causes.is_empty() {
        let causes = state.transitive_root_causes.build();
        // The failing children already reported themselves; this summary is
        // left for the caller to print.
        return Ok(Step::Ready(Err(ConfiguredValueCreationError::aggregated(
            key.label.dupe(),
            event_id,
            FailureKind::DependencyEvaluationFailed,
            "Analysis failed",
            causes,
        )
        .into_shared())));
    }

    // Indirect-incompatibility check.
    if let Some(reason) = &state.deps.incompatible_dep {
        let reason = incompatible_via_dependency(&configured_label, reason);
        env.listener().handle(Event::warning(
            Some(node.location().to_owned()),
            reason.skipping_message(&configured_label),
        ));
        return ready(MaybeCompatible::Incompatible(reason));
    }

    // Final attribute configuration against the resolved edges, then the
    // rule implementation.
    let final_attrs = match configure_final_attrs(&node, &cfg, &config_conditions, &dep_value_map) {
        Ok(attrs) => attrs,
        Err(e) => {
            return ready_err(
                env,
                Some(node.location().to_owned()),
                ConfiguredValueCreationError::own(
                    key.label.dupe(),
                    event_id,
                    FailureKind::AnalysisFailed,
                    format!("{:#}", e),
                ),
            );
        }
    };

    finish_with_deps(
        key,
        delegate,
        env,
        state,
        &node,
        Some(&cfg),
        final_attrs,
        &config_conditions,
        toolchain_contexts.as_ref(),
        dep_value_map,
    )
}

#[allow(clippy::too_many_arguments)]
fn finish(
    key: &ConfiguredTargetKey,
    delegate: &AnalysisDelegate,
    env: &mut WeftComputations,
    state: &mut ConfiguredTargetState,
    node: &TargetNode,
    cfg: Option<&Configuration>,
    attrs: IndexMap<String, ConfiguredAttr>,
    config_conditions: &ConfigConditions,
    toolchain_contexts: Option<&ToolchainCollection<Arc<UnloadedToolchainContext>>>,
) -> WeftResult<Step<Value>> {
    finish_with_deps(
        key,
        delegate,
        env,
        state,
        node,
        cfg,
        attrs,
        config_conditions,
        toolchain_contexts,
        IndexMap::new(),
    )
}

#[allow(clippy::too_many_arguments)]
fn finish_with_deps(
    key: &ConfiguredTargetKey,
    delegate: &AnalysisDelegate,
    env: &mut WeftComputations,
    state: &mut ConfiguredTargetState,
    node: &TargetNode,
    cfg: Option<&Configuration>,
    attrs: IndexMap<String, ConfiguredAttr>,
    config_conditions: &ConfigConditions,
    toolchain_contexts: Option<&ToolchainCollection<Arc<UnloadedToolchainContext>>>,
    dep_value_map: DepMap,
) -> WeftResult<Step<Value>> {
    match create_configured_target(
        env,
        delegate,
        key,
        node,
        cfg,
        &attrs,
        &dep_value_map,
        config_conditions,
        toolchain_contexts,
        state.transitive_packages_snapshot(),
    ) {
        RuleAnalysisOutcome::MissingDeps => Ok(Step::Pending),
        RuleAnalysisOutcome::Failed(error) => {
            ready_err(env, Some(node.location().to_owned()), error)
        }
        RuleAnalysisOutcome::Value(handle) => ready(MaybeCompatible::Compatible(handle)),
    }
}

/// The attribute-configuration context used once dependency configurations
/// are final: dep labels configure to exactly what the resolver produced.
struct FinalAttrContext<'a> {
    cfg: &'a Configuration,
    conditions: &'a ConfigConditions,
    kind: DependencyKind,
    dep_value_map: &'a DepMap,
}

impl FinalAttrContext<'_> {
    fn resolved_for(
        &self,
        label: &TargetLabel,
    ) -> Vec<(Option<TransitionKey>, ConfiguredTargetLabel)> {
        self.dep_value_map
            .get(&self.kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .filter(|data| data.configured.label().label() == label)
            .map(|data| {
                (
                    data.transition_key.clone(),
                    data.configured.label().clone(),
                )
            })
            .collect()
    }
}

impl AttrConfigurationContext for FinalAttrContext<'_> {
    fn matches(&self, label: &TargetLabel) -> anyhow::Result<bool> {
        match self.conditions.get(label) {
            Some(provider) => Ok(provider.matches),
            None => Err(anyhow::anyhow!(
                "select() condition `{}` was not resolved as a config condition",
                label
            )),
        }
    }

    fn cfg(&self) -> &Configuration {
        self.cfg
    }

    fn configure_dep(
        &self,
        label: &TargetLabel,
        _dep_type: &DepAttrType,
    ) -> anyhow::Result<ConfiguredDep> {
        let mut resolved = self.resolved_for(label);
        match resolved.len() {
            0 => Err(anyhow::anyhow!(
                "dependency `{}` has no resolved configuration",
                label
            )),
            1 if resolved[0].0.is_none() => {
                Ok(ConfiguredDep::Single(resolved.remove(0).1))
            }
            _ => Ok(ConfiguredDep::Split(
                resolved
                    .into_iter()
                    .map(|(transition_key, configured)| {
                        (
                            transition_key.unwrap_or_else(|| TransitionKey(String::new())),
                            configured,
                        )
                    })
                    .collect(),
            )),
        }
    }
}

fn configure_final_attrs(
    node: &TargetNode,
    cfg: &Configuration,
    conditions: &ConfigConditions,
    dep_value_map: &DepMap,
) -> anyhow::Result<IndexMap<String, ConfiguredAttr>> {
    let mut attrs = IndexMap::new();
    for (name, attribute, value) in node.attrs() {
        let ctx = FinalAttrContext {
            cfg,
            conditions,
            kind: DependencyKind::Attribute(name.to_owned()),
            dep_value_map,
        };
        let configured = configure_attr(attribute.attr_type(), value, &ctx)
            .map_err(|e| e.context(format!("when configuring attribute `{}`", name)))?;
        attrs.insert(name.to_owned(), configured);
    }
    Ok(attrs)
}
