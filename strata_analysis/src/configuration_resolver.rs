/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Per-edge child configurations.
//!
//! For every dependency edge the child configuration is derived from the
//! parent's by (1) projecting the parent options onto the fragments the
//! child rule actually requires, (2) applying the edge's transition to
//! that projection (a transition may write fragments of its own), and
//! (3) interning the result. Null configurations propagate unchanged:
//! edges to non-configurable targets ignore transitions entirely.

use std::collections::BTreeSet;

use dupe::Dupe;

use strata_core::configuration::BuildOptions;
use strata_core::configuration::Configuration;
use strata_core::configuration::FragmentKey;
use strata_core::Interners;
use strata_node::attrs::attr::DepAttrTransition;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::rule::RuleClass;
use strata_node::transition::AttrView;
use strata_node::transition::TransitionApplied;
use strata_node::transition::TransitionKey;

/// A resolved edge configuration: one child configuration, or one per
/// split-transition branch.
#[derive(Debug)]
pub enum ResolvedTransition {
    Single(Configuration),
    Split(Vec<(TransitionKey, Configuration)>),
}

/// The fragments a child's configuration keeps: what its rule class
/// declares, intersected with what the parent actually has. Fragments a
/// transition adds on top survive because transition output is never
/// re-trimmed.
pub fn required_fragments(
    child_rule: &RuleClass,
    parent_options: &BuildOptions,
) -> BTreeSet<FragmentKey> {
    child_rule
        .required_fragments
        .iter()
        .filter(|fragment| parent_options.has_fragment(fragment))
        .map(Dupe::dupe)
        .collect()
}

/// Computes the child configuration(s) for one edge. `None` when the child
/// is not configurable.
pub fn resolve_dep_configuration(
    interners: &Interners,
    parent: &Configuration,
    parent_attrs: &dyn AttrView,
    child: &TargetNode,
    transition: &DepAttrTransition,
) -> anyhow::Result<Option<ResolvedTransition>> {
    if !child.is_configurable() {
        return Ok(None);
    }

    let required = required_fragments(child.rule_class(), parent.options());
    let projected = parent.options().project(&required);

    let applied = match transition {
        DepAttrTransition::Identity => TransitionApplied::Single(projected),
        DepAttrTransition::Transition(transition) => {
            transition.apply(&projected, parent_attrs)?
        }
    };

    Ok(Some(match applied {
        TransitionApplied::Single(options) => {
            ResolvedTransition::Single(Configuration::new(interners, options))
        }
        TransitionApplied::Split(branches) => ResolvedTransition::Split(
            branches
                .into_iter()
                .map(|(key, options)| (key, Configuration::new(interners, options)))
                .collect(),
        ),
    }))
}

/// The toolchain-tagged trimming applied once at the boundary from a
/// target to its toolchain context. Stripping the excluded fragments here
/// (rather than on every toolchain dependency edge) keeps the expensive
/// trimming from being applied over and over below the boundary.
pub fn toolchain_tagged_trimming(
    interners: &Interners,
    configuration: &Configuration,
    excluded: &[FragmentKey],
) -> Configuration {
    if excluded.is_empty() {
        return configuration.dupe();
    }
    let excluded: BTreeSet<FragmentKey> = excluded.iter().map(Dupe::dupe).collect();
    Configuration::new(interners, configuration.options().project_out(&excluded))
}
