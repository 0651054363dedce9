/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Dependency resolution for one configured target.
//!
//! Runs as a sequence of stages, each memoized in scratch state across
//! restarts: enumerate outgoing edges from the attribute schema (selects
//! already resolved), apply the configuration resolver per edge, fetch the
//! child configured targets (with the two-pass package protocol for
//! aliases), attach aspects, and merge everything into the final
//! kind-keyed dependency map.

use std::cell::RefCell;
use std::sync::Arc;

use dupe::Dupe;
use indexmap::IndexMap;
use indexmap::IndexSet;

use strata_core::causes::Cause;
use strata_core::causes::FailureKind;
use strata_core::configuration::Configuration;
use strata_core::package::PackageId;
use strata_core::target::TargetLabel;
use strata_node::aspect::AspectDefinition;
use strata_node::attrs::attr::DepAttrType;
use strata_node::attrs::configuration_context::configure_attr;
use strata_node::attrs::configuration_context::AttrConfigurationContext;
use strata_node::attrs::configuration_context::ConfiguredDep;
use strata_node::attrs::internal::EXEC_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use strata_node::attrs::internal::TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use strata_node::compatibility::MaybeCompatible;
use strata_node::deps::Dependency;
use strata_node::deps::DependencyKind;
use strata_node::nodes::configured::ConfiguredTargetAndData;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::provider::ConfigConditions;
use strata_node::toolchain::ToolchainCollection;
use strata_node::toolchain::UnloadedToolchainContext;
use strata_node::visibility::VisibilityError;
use weft::Event;
use weft::EventSink;
use weft::StoredEvents;
use weft::WeftComputations;
use weft::WeftResult;

use crate::aspect_resolver::applicable_aspects;
use crate::aspect_resolver::merge_aspect_providers;
use crate::calculation::configured_target::ConfiguredTargetState;
use crate::configuration_resolver::resolve_dep_configuration;
use crate::configuration_resolver::toolchain_tagged_trimming;
use crate::configuration_resolver::ResolvedTransition;
use crate::delegate::AnalysisDelegate;
use crate::error::as_creation_error;
use crate::error::ConfiguredValueCreationError;
use crate::incompatible::LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use crate::keys::ConfiguredTargetKey;
use crate::keys::PackageKey;

/// One stage's verdict: done, waiting on graph values, or failed. Failures
/// are unreported here; the configured-target function decides whether to
/// print them.
pub enum StageOutcome<T> {
    Ready(T),
    Pending,
    Failed(ConfiguredValueCreationError),
}

pub type DepMap = IndexMap<DependencyKind, Vec<ConfiguredTargetAndData>>;

/// The memoized sub-results of dependency computation, kept in scratch
/// state between restarts. Later fields supersede earlier ones; a field is
/// cleared once the stage after it has memoized its own result.
#[derive(Default)]
pub struct ComputeDependenciesState {
    pub(crate) dependent_node_map: Option<Vec<EdgeSpec>>,
    pub(crate) resolve_configurations: Option<Vec<ResolvedEdge>>,
    pub(crate) resolved_deps: Option<Vec<(ResolvedEdge, ConfiguredTargetAndData)>>,
    pub(crate) result: Option<DepMap>,
    /// Events belonging to the memoized resolver result; replayed on every
    /// completion so a restarted node loses nothing.
    pub(crate) stored_events: Option<StoredEvents>,
    /// The first incompatible dependency seen, for the indirect check.
    pub(crate) incompatible_dep: Option<Arc<strata_node::compatibility::IncompatiblePlatformReason>>,
}

/// An outgoing edge before configurations are resolved.
#[derive(Clone, Debug)]
pub(crate) enum EdgeSpec {
    Dep {
        kind: DependencyKind,
        label: TargetLabel,
        dep_type: DepAttrType,
    },
    Source {
        kind: DependencyKind,
        label: TargetLabel,
    },
    Toolchain {
        group: String,
        label: TargetLabel,
        forced_execution_platform: Option<TargetLabel>,
    },
}

/// An edge with its post-transition configuration, still carrying the
/// aspects its attribute declared.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedEdge {
    pub(crate) dep: Dependency,
    pub(crate) aspects: Vec<Arc<AspectDefinition>>,
}

/// Collects dependency edges while attributes are configured. Dep labels
/// get the parent configuration as a placeholder; the real per-edge
/// configuration is computed by the resolver stage.
struct EdgeCollector<'a> {
    cfg: &'a Configuration,
    conditions: &'a ConfigConditions,
    kind: DependencyKind,
    collected: RefCell<Vec<EdgeSpec>>,
}

impl AttrConfigurationContext for EdgeCollector<'_> {
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
        dep_type: &DepAttrType,
    ) -> anyhow::Result<ConfiguredDep> {
        self.collected.borrow_mut().push(EdgeSpec::Dep {
            kind: self.kind.clone(),
            label: label.dupe(),
            dep_type: dep_type.clone(),
        });
        Ok(ConfiguredDep::Single(label.configure(self.cfg.dupe())))
    }

    fn configure_source(&self, label: &TargetLabel) -> strata_core::target::ConfiguredTargetLabel {
        self.collected.borrow_mut().push(EdgeSpec::Source {
            kind: self.kind.clone(),
            label: label.dupe(),
        });
        label.unconfigured()
    }
}

/// Stage one: the map from dependency kind to dependency edges, selects
/// resolved, no configurations applied yet.
pub(crate) fn dependent_node_map(
    node: &TargetNode,
    cfg: &Configuration,
    conditions: &ConfigConditions,
    toolchain_contexts: Option<&ToolchainCollection<Arc<UnloadedToolchainContext>>>,
) -> anyhow::Result<Vec<EdgeSpec>> {
    let mut edges = Vec::new();

    for (name, attribute, value) in node.attrs() {
        // Compatibility attributes resolve against config conditions, and
        // exec constraints go to the toolchain resolver; neither is a
        // dependency edge.
        if name == TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD
            || name == LEGACY_COMPATIBLE_WITH_ATTRIBUTE_FIELD
            || name == EXEC_COMPATIBLE_WITH_ATTRIBUTE_FIELD
        {
            continue;
        }
        let collector = EdgeCollector {
            cfg,
            conditions,
            kind: DependencyKind::Attribute(name.to_owned()),
            collected: RefCell::new(Vec::new()),
        };
        configure_attr(attribute.attr_type(), value, &collector)
            .map_err(|e| e.context(format!("when configuring attribute `{}`", name)))?;
        edges.append(&mut collector.collected.into_inner());
    }

    for (name, label) in &node.rule_class().implicit_deps {
        edges.push(EdgeSpec::Dep {
            kind: DependencyKind::Implicit(name.clone()),
            label: label.dupe(),
            dep_type: DepAttrType {
                required_providers: Vec::new(),
                transition: strata_node::attrs::attr::DepAttrTransition::Identity,
                aspects: Vec::new(),
            },
        });
    }

    if let Some(contexts) = toolchain_contexts {
        for (group, context) in contexts.iter() {
            let forced = context
                .execution_platform
                .as_ref()
                .map(|platform| platform.label.dupe());
            for toolchain_label in context.toolchains.values() {
                edges.push(EdgeSpec::Toolchain {
                    group: group.to_owned(),
                    label: toolchain_label.dupe(),
                    forced_execution_platform: forced.dupe(),
                });
            }
        }
    }

    Ok(edges)
}

/// Stage two: apply the configuration resolver per edge. Needs the child
/// rule classes (for fragment trimming), so it loads dependency packages
/// through the graph; a package that fails to load becomes a root cause
/// and its edges are dropped, letting more causes accumulate.
pub(crate) fn resolve_configurations(
    env: &mut WeftComputations,
    delegate: &AnalysisDelegate,
    node: &TargetNode,
    cfg: &Configuration,
    edges: &[EdgeSpec],
    state: &mut ConfiguredTargetState,
    events: &StoredEvents,
) -> WeftResult<StageOutcome<Vec<ResolvedEdge>>> {
    // Fetch every dep package in one round.
    let mut package_ids: IndexSet<PackageId> = IndexSet::new();
    for edge in edges {
        if let EdgeSpec::Dep { label, .. } = edge {
            package_ids.insert(label.pkg().dupe());
        }
    }
    let package_values = env.get_values(package_ids.iter().map(|id| PackageKey(id.dupe())))?;
    if package_values.iter().any(Option::is_none) {
        return Ok(StageOutcome::Pending);
    }
    let packages: IndexMap<_, _> = package_ids
        .iter()
        .zip(package_values.into_iter().map(Option::unwrap))
        .collect();

    let toolchain_cfg = toolchain_tagged_trimming(
        delegate.interners(),
        cfg,
        &delegate.options().toolchain_excluded_fragments,
    );

    let mut resolved = Vec::with_capacity(edges.len());
    for edge in edges {
        match edge {
            EdgeSpec::Source { kind, label } => resolved.push(ResolvedEdge {
                dep: Dependency::new(label.dupe(), None, kind.clone()),
                aspects: Vec::new(),
            }),
            EdgeSpec::Toolchain {
                group,
                label,
                forced_execution_platform,
            } => {
                let mut dep = Dependency::new(
                    label.dupe(),
                    Some(toolchain_cfg.dupe()),
                    DependencyKind::Toolchain(group.clone()),
                );
                if let Some(platform) = forced_execution_platform {
                    dep = dep.with_forced_execution_platform(platform.dupe());
                }
                resolved.push(ResolvedEdge {
                    dep,
                    aspects: Vec::new(),
                });
            }
            EdgeSpec::Dep {
                kind,
                label,
                dep_type,
            } => {
                let package = match packages.get(label.pkg()).unwrap() {
                    Ok(package) => package,
                    Err(e) => {
                        // Report through the stored buffer: these events
                        // belong to this stage's memoized result and must be
                        // replayed on the completion that finally uses it.
                        events.handle(Event::error(None, format!("{:#}", e.inner())));
                        state
                            .transitive_root_causes
                            .add(Cause::new(label.dupe(), FailureKind::NoSuchPackage));
                        continue;
                    }
                };
                let child = match package.target(label.name()) {
                    Ok(child) => child,
                    Err(e) => {
                        events.handle(Event::error(
                            Some(package.build_file_path().to_owned()),
                            format!("{:#}", e),
                        ));
                        state
                            .transitive_root_causes
                            .add(Cause::new(label.dupe(), FailureKind::NoSuchTarget));
                        continue;
                    }
                };
                let transition = match resolve_dep_configuration(
                    delegate.interners(),
                    cfg,
                    node,
                    child,
                    &dep_type.transition,
                ) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        return Ok(StageOutcome::Failed(ConfiguredValueCreationError::own(
                            node.label().dupe(),
                            Some(cfg.event_id().to_owned()),
                            FailureKind::AnalysisFailed,
                            format!("resolving configuration of `{}`: {:#}", label, e),
                        )));
                    }
                };
                match transition {
                    None => resolved.push(ResolvedEdge {
                        dep: Dependency::new(label.dupe(), None, kind.clone()),
                        aspects: dep_type.aspects.clone(),
                    }),
                    Some(ResolvedTransition::Single(child_cfg)) => resolved.push(ResolvedEdge {
                        dep: Dependency::new(label.dupe(), Some(child_cfg), kind.clone()),
                        aspects: dep_type.aspects.clone(),
                    }),
                    Some(ResolvedTransition::Split(branches)) => {
                        for (transition_key, child_cfg) in branches {
                            resolved.push(ResolvedEdge {
                                dep: Dependency::new(
                                    label.dupe(),
                                    Some(child_cfg),
                                    kind.clone(),
                                )
                                .with_transition_key(transition_key),
                                aspects: dep_type.aspects.clone(),
                            });
                        }
                    }
                }
            }
        }
    }
    Ok(StageOutcome::Ready(resolved))
}

fn configured_target_key(edge: &ResolvedEdge) -> ConfiguredTargetKey {
    let mut key = ConfiguredTargetKey::new(edge.dep.label.dupe(), edge.dep.configuration.dupe());
    if let Some(platform) = &edge.dep.forced_execution_platform {
        key = key.with_forced_execution_platform(platform.dupe());
    }
    key
}

/// Stage three: fetch the configured value of every child, plus the target
/// node behind it. Children can be aliases whose actual label lives in a
/// package outside the parent-expected set, so package fetches run in up
/// to two passes: first against the packages of the requested labels, then
/// a second round for whatever the alias answers point at. A package
/// missing in the second pass is treated as a transient miss and retried
/// via restart.
pub(crate) fn resolve_configured_target_dependencies(
    env: &mut WeftComputations,
    parent_key: &ConfiguredTargetKey,
    edges: &[ResolvedEdge],
    state: &mut ConfiguredTargetState,
) -> WeftResult<StageOutcome<Vec<(ResolvedEdge, ConfiguredTargetAndData)>>> {
    let ct_keys: Vec<ConfiguredTargetKey> = edges.iter().map(configured_target_key).collect();
    let ct_values = env.get_values(ct_keys)?;

    let expected_packages: IndexSet<PackageId> =
        edges.iter().map(|edge| edge.dep.label.pkg().dupe()).collect();
    let package_values =
        env.get_values(expected_packages.iter().map(|id| PackageKey(id.dupe())))?;
    let packages: IndexMap<_, _> = expected_packages
        .iter()
        .zip(package_values)
        .collect();

    let mut missing = false;
    let mut result = Vec::with_capacity(edges.len());
    let mut alias_redo = Vec::new();
    let mut alias_packages: IndexSet<PackageId> = IndexSet::new();

    for (edge, value) in edges.iter().zip(ct_values) {
        let value = match value {
            Some(value) => value,
            None => {
                missing = true;
                continue;
            }
        };
        let handle = match value {
            Err(e) => {
                // The child reported its own failure; fold its causes in
                // and keep fetching siblings for more.
                match as_creation_error(&e) {
                    Some(creation) => {
                        state
                            .transitive_root_causes
                            .add_transitive(creation.root_causes.dupe());
                    }
                    None => {
                        state.transitive_root_causes.add(Cause::new(
                            edge.dep.label.dupe(),
                            FailureKind::DependencyEvaluationFailed,
                        ));
                    }
                }
                continue;
            }
            Ok(MaybeCompatible::Incompatible(reason)) => {
                if state.deps.incompatible_dep.is_none() {
                    state.deps.incompatible_dep = Some(reason);
                }
                continue;
            }
            Ok(MaybeCompatible::Compatible(handle)) => handle,
        };

        let actual = handle.actual_label().label().dupe();
        let package_id = actual.pkg();
        let package = match packages.get(package_id) {
            Some(Some(Ok(package))) => package.dupe(),
            Some(Some(Err(..))) => {
                state
                    .transitive_root_causes
                    .add(Cause::new(actual.dupe(), FailureKind::NoSuchPackage));
                continue;
            }
            Some(None) => {
                missing = true;
                continue;
            }
            None => {
                // An alias answer pointing outside the expected set; mop up
                // in the second pass.
                alias_packages.insert(package_id.dupe());
                alias_redo.push((edge, handle));
                continue;
            }
        };
        match finish_dep(env, parent_key, edge, handle, &package, state)? {
            FinishedDep::Entry(item) => result.push(item),
            FinishedDep::Skipped => {}
            FinishedDep::NotVisible => {
                return Ok(StageOutcome::Failed(visibility_failure(parent_key, &actual)));
            }
        }
    }

    if !alias_redo.is_empty() {
        let alias_values =
            env.get_values(alias_packages.iter().map(|id| PackageKey(id.dupe())))?;
        let alias_map: IndexMap<_, _> = alias_packages.iter().zip(alias_values).collect();
        for (edge, handle) in alias_redo {
            let actual = handle.actual_label().label().dupe();
            let package = match alias_map.get(actual.pkg()) {
                Some(Some(Ok(package))) => package.dupe(),
                Some(Some(Err(..))) => {
                    state
                        .transitive_root_causes
                        .add(Cause::new(actual.dupe(), FailureKind::NoSuchPackage));
                    continue;
                }
                // The configured target exists, so its package should too;
                // that is not a guarantee the graph makes, so tolerate the
                // absence as a transient miss.
                Some(None) | None => {
                    missing = true;
                    continue;
                }
            };
            match finish_dep(env, parent_key, edge, handle, &package, state)? {
                FinishedDep::Entry(item) => result.push(item),
                FinishedDep::Skipped => {}
                FinishedDep::NotVisible => {
                    return Ok(StageOutcome::Failed(visibility_failure(parent_key, &actual)));
                }
            }
        }
    }

    if missing {
        return Ok(StageOutcome::Pending);
    }
    Ok(StageOutcome::Ready(result))
}

enum FinishedDep {
    Entry((ResolvedEdge, ConfiguredTargetAndData)),
    /// The edge contributed a root cause instead of a value.
    Skipped,
    NotVisible,
}

fn finish_dep(
    env: &mut WeftComputations,
    parent_key: &ConfiguredTargetKey,
    edge: &ResolvedEdge,
    handle: strata_node::nodes::configured::ConfiguredTargetHandle,
    package: &Arc<strata_node::package::PackageValue>,
    state: &mut ConfiguredTargetState,
) -> WeftResult<FinishedDep> {
    let actual = handle.actual_label().label().dupe();
    let target = match package.target(actual.name()) {
        Ok(target) => target.dupe(),
        Err(..) => {
            state
                .transitive_root_causes
                .add(Cause::new(actual.dupe(), FailureKind::NoSuchTarget));
            return Ok(FinishedDep::Skipped);
        }
    };

    if !target
        .visibility()
        .is_visible_to(actual.pkg(), &parent_key.label)
    {
        env.listener().handle(Event::error(
            Some(target.location().to_owned()),
            VisibilityError::NotVisibleTo(actual.dupe(), parent_key.label.dupe()).to_string(),
        ));
        return Ok(FinishedDep::NotVisible);
    }

    if let Some(builder) = &mut state.transitive_packages {
        builder.add(actual.pkg().dupe());
        if let Some(packages) = handle.transitive_packages() {
            builder.add_transitive(packages.dupe());
        }
    }

    Ok(FinishedDep::Entry((
        edge.clone(),
        ConfiguredTargetAndData {
            configured: handle,
            target,
            configuration: edge.dep.configuration.dupe(),
            transition_key: edge.dep.transition_key.clone(),
        },
    )))
}

fn visibility_failure(
    parent_key: &ConfiguredTargetKey,
    dep: &TargetLabel,
) -> ConfiguredValueCreationError {
    ConfiguredValueCreationError::own(
        parent_key.label.dupe(),
        parent_key
            .configuration
            .as_ref()
            .map(|c| c.event_id().to_owned()),
        FailureKind::AnalysisFailed,
        format!("`{}` is not visible to `{}`", dep, parent_key.label),
    )
    .reported()
}

/// Stage four: attach aspect providers to each dependency value.
pub(crate) fn resolve_aspect_dependencies(
    env: &mut WeftComputations,
    items: &[(ResolvedEdge, ConfiguredTargetAndData)],
) -> WeftResult<StageOutcome<Vec<(ResolvedEdge, ConfiguredTargetAndData)>>> {
    let mut merged = Vec::with_capacity(items.len());
    let mut missing = false;
    for (edge, data) in items {
        let applicable = applicable_aspects(&edge.aspects, data);
        if applicable.is_empty() {
            merged.push((edge.clone(), data.clone()));
            continue;
        }
        let key = crate::keys::AspectKey {
            label: edge.dep.label.dupe(),
            configuration: edge.dep.configuration.dupe(),
            aspects: applicable,
        };
        match env.get_value(&key)? {
            None => {
                missing = true;
            }
            Some(Err(e)) => {
                let error = match as_creation_error(&e) {
                    Some(creation) => creation.clone(),
                    None => ConfiguredValueCreationError::own(
                        edge.dep.label.dupe(),
                        None,
                        FailureKind::AspectCreationFailed,
                        e.to_string(),
                    ),
                };
                return Ok(StageOutcome::Failed(error));
            }
            Some(Ok(providers)) => match merge_aspect_providers(data, &providers) {
                Ok(data) => merged.push((edge.clone(), data)),
                Err(e) => {
                    return Ok(StageOutcome::Failed(ConfiguredValueCreationError::own(
                        edge.dep.label.dupe(),
                        None,
                        FailureKind::DuplicateProvider,
                        format!("{:#}", e),
                    )));
                }
            },
        }
    }
    if missing {
        return Ok(StageOutcome::Pending);
    }
    Ok(StageOutcome::Ready(merged))
}

/// The orchestration of all dependency stages, memoized stage by stage in
/// the scratch state. The stored events belonging to the memoized resolver
/// result are replayed on every path that returns `Ready`.
pub(crate) fn compute_dependencies(
    env: &mut WeftComputations,
    delegate: &AnalysisDelegate,
    key: &ConfiguredTargetKey,
    node: &TargetNode,
    cfg: &Configuration,
    conditions: &ConfigConditions,
    toolchain_contexts: Option<&ToolchainCollection<Arc<UnloadedToolchainContext>>>,
    state: &mut ConfiguredTargetState,
) -> WeftResult<StageOutcome<DepMap>> {
    if let Some(result) = &state.deps.result {
        if let Some(events) = &state.deps.stored_events {
            events.replay_on(env.listener());
        }
        return Ok(StageOutcome::Ready(result.clone()));
    }

    if state.deps.resolve_configurations.is_none() {
        if state.deps.dependent_node_map.is_none() {
            match dependent_node_map(node, cfg, conditions, toolchain_contexts) {
                Ok(edges) => state.deps.dependent_node_map = Some(edges),
                Err(e) => {
                    return Ok(StageOutcome::Failed(ConfiguredValueCreationError::own(
                        node.label().dupe(),
                        Some(cfg.event_id().to_owned()),
                        FailureKind::AnalysisFailed,
                        format!("{:#}", e),
                    )));
                }
            }
        }
        let events = StoredEvents::new();
        let edges = state.deps.dependent_node_map.clone().unwrap();
        match resolve_configurations(env, delegate, node, cfg, &edges, state, &events)? {
            StageOutcome::Pending => return Ok(StageOutcome::Pending),
            StageOutcome::Failed(error) => {
                events.replay_on(env.listener());
                return Ok(StageOutcome::Failed(error));
            }
            StageOutcome::Ready(resolved) => {
                state.deps.resolve_configurations = Some(resolved);
                state.deps.stored_events = Some(events);
                state.deps.dependent_node_map = None;
            }
        }
    }

    if state.deps.resolved_deps.is_none() {
        let edges = state.deps.resolve_configurations.clone().unwrap();
        match resolve_configured_target_dependencies(env, key, &edges, state)? {
            StageOutcome::Pending => return Ok(StageOutcome::Pending),
            StageOutcome::Failed(error) => return Ok(StageOutcome::Failed(error)),
            StageOutcome::Ready(items) => state.deps.resolved_deps = Some(items),
        }
    }

    let items = state.deps.resolved_deps.clone().unwrap();
    match resolve_aspect_dependencies(env, &items)? {
        StageOutcome::Pending => Ok(StageOutcome::Pending),
        StageOutcome::Failed(error) => Ok(StageOutcome::Failed(error)),
        StageOutcome::Ready(merged) => {
            let mut result: DepMap = IndexMap::new();
            for (edge, data) in merged {
                result.entry(edge.dep.kind.clone()).or_default().push(data);
            }
            state.deps.result = Some(result.clone());
            state.deps.resolve_configurations = None;
            state.deps.resolved_deps = None;
            if let Some(events) = &state.deps.stored_events {
                events.replay_on(env.listener());
            }
            Ok(StageOutcome::Ready(result))
        }
    }
}
