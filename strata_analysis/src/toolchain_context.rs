/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Toolchain-context nodes.
//!
//! One graph node per `(configuration, toolchain types, constraints,
//! forced platform)` request; the computation delegates to the injected
//! resolver. The configured-target function builds one request per
//! execution group, all against the toolchain-tagged-trimmed
//! configuration.

use std::sync::Arc;

use anyhow::Context;
use dupe::Dupe;
use dupe::OptionDupedExt;
use gazebo::prelude::*;
use tracing::debug;

use strata_core::result::SharedResult;
use strata_core::result::ToSharedResultExt;
use strata_core::target::TargetLabel;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::toolchain::ExecGroup;
use strata_node::toolchain::ToolchainCollection;
use strata_node::toolchain::ToolchainRequest;
use strata_node::toolchain::UnloadedToolchainContext;
use weft::Key;
use weft::Step;
use weft::WeftComputations;
use weft::WeftResult;

use strata_core::configuration::Configuration;

use crate::configuration_resolver::toolchain_tagged_trimming;
use crate::delegate::AnalysisDelegate;
use crate::keys::ToolchainContextKey;

impl Key for ToolchainContextKey {
    type Value = SharedResult<Arc<UnloadedToolchainContext>>;

    fn compute(&self, env: &mut WeftComputations) -> WeftResult<Step<Self::Value>> {
        let delegate = AnalysisDelegate::get(env);
        if self.request.debug {
            debug!("resolving toolchains for {:?}", self.request.toolchain_types);
        }
        let context = delegate
            .toolchains()
            .resolve(&self.request)
            .with_context(|| {
                format!(
                    "resolving toolchains in configuration `{}`",
                    self.request.configuration
                )
            })
            .shared_error()
            .map(Arc::new);
        if self.request.debug {
            if let Ok(context) = &context {
                debug!(
                    "resolved execution platform: {:?}",
                    context.execution_platform.as_ref().map(|p| p.label.dupe())
                );
            }
        }
        Ok(Step::Ready(context))
    }

    fn equality(x: &Self::Value, y: &Self::Value) -> bool {
        match (x, y) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        }
    }
}

/// The per-exec-group toolchain context requests for one target: the
/// default group (the rule's own toolchain types and constraints) plus
/// every declared group, with group inheritance applied.
pub fn toolchain_context_requests(
    delegate: &AnalysisDelegate,
    node: &TargetNode,
    configuration: &Configuration,
    forced_execution_platform: Option<&TargetLabel>,
) -> Vec<(String, ToolchainContextKey)> {
    let rule = node.rule_class();
    let toolchain_configuration = toolchain_tagged_trimming(
        delegate.interners(),
        configuration,
        &delegate.options().toolchain_excluded_fragments,
    );
    let debug = delegate.options().debug_toolchain_resolution(node.label());

    let default_group = ExecGroup::default_group(
        rule.toolchain_types.map(Dupe::dupe),
        rule.exec_compatible_with.map(Dupe::dupe),
    );

    let mut requests = Vec::with_capacity(1 + rule.exec_groups.len());
    requests.push((
        default_group.name.clone(),
        ToolchainContextKey {
            request: ToolchainRequest {
                configuration: toolchain_configuration.dupe(),
                toolchain_types: default_group.toolchain_types.clone(),
                exec_constraints: default_group.exec_compatible_with.clone(),
                debug,
                // Forced only for the default group: a toolchain target's
                // own deps resolve on the parent's platform.
                forced_execution_platform: OptionDupedExt::duped(forced_execution_platform),
            },
        },
    ));
    for group in &rule.exec_groups {
        let group = group.clone().inheriting(&default_group);
        requests.push((
            group.name.clone(),
            ToolchainContextKey {
                request: ToolchainRequest {
                    configuration: toolchain_configuration.dupe(),
                    toolchain_types: group.toolchain_types,
                    exec_constraints: group.exec_compatible_with,
                    debug,
                    forced_execution_platform: None,
                },
            },
        ));
    }
    requests
}

/// Assembles the resolved contexts into a collection keyed by exec group.
pub fn collect_toolchain_contexts(
    requests: &[(String, ToolchainContextKey)],
    values: Vec<Arc<UnloadedToolchainContext>>,
) -> ToolchainCollection<Arc<UnloadedToolchainContext>> {
    let mut collection = ToolchainCollection::new();
    for ((group, _), value) in requests.iter().zip(values) {
        collection.add_context(group.clone(), value);
    }
    collection
}
