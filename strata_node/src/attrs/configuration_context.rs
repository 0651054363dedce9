/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The context for attribute configuration, plus the schema-driven
//! `configure` step turning coerced values into configured ones.

use anyhow::Context;
use dupe::Dupe;
use thiserror::Error;

use strata_core::configuration::Configuration;
use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;

use crate::attrs::attr::AttrType;
use crate::attrs::attr::DepAttrType;
use crate::attrs::coerced_attr::CoercedAttr;
use crate::attrs::configured_attr::ConfiguredAttr;
use crate::transition::TransitionKey;

#[derive(Debug, Error)]
enum AttrConfigurationError {
    #[error("select() has no matching condition and no default")]
    SelectHasNoMatch,
    #[error("select() has multiple matching conditions: `{0}` and `{1}`")]
    SelectAmbiguous(TargetLabel, TargetLabel),
    #[error("attribute value does not match its declared type")]
    TypeMismatch,
}

/// The per-edge result of asking the configuration resolver for a child
/// configuration.
#[derive(Debug)]
pub enum ConfiguredDep {
    Single(ConfiguredTargetLabel),
    Split(Vec<(TransitionKey, ConfiguredTargetLabel)>),
}

/// The context for attribute configuration. Implemented by the analysis
/// layer, where resolved config conditions and the configuration resolver
/// live.
pub trait AttrConfigurationContext {
    /// Whether the resolved `config_setting` behind `label` matches the
    /// current configuration.
    fn matches(&self, label: &TargetLabel) -> anyhow::Result<bool>;

    fn cfg(&self) -> &Configuration;

    /// The child configuration(s) for a dependency edge, with the edge's
    /// transition applied and trimming performed.
    fn configure_dep(
        &self,
        label: &TargetLabel,
        dep_type: &DepAttrType,
    ) -> anyhow::Result<ConfiguredDep>;

    /// Edges to non-configurable targets keep the null configuration
    /// regardless of transitions.
    fn configure_source(&self, label: &TargetLabel) -> ConfiguredTargetLabel {
        label.unconfigured()
    }
}

/// Configures `value` according to its declared type. `select()`s are
/// resolved first (against the parent's configuration), then dependency
/// labels are configured per edge.
pub fn configure_attr(
    attr_type: &AttrType,
    value: &CoercedAttr,
    ctx: &dyn AttrConfigurationContext,
) -> anyhow::Result<ConfiguredAttr> {
    match value {
        CoercedAttr::Select { entries, default } => {
            let chosen = resolve_select(entries, default.as_deref(), ctx)?;
            configure_attr(attr_type, chosen, ctx)
        }
        CoercedAttr::Concat(items) => {
            // Concatenation flattens into a single list after each part is
            // configured.
            let mut result = Vec::new();
            for item in items {
                match configure_attr(attr_type, item, ctx)? {
                    ConfiguredAttr::List(mut part) => result.append(&mut part),
                    other => result.push(other),
                }
            }
            Ok(ConfiguredAttr::List(result))
        }
        CoercedAttr::Bool(x) => Ok(ConfiguredAttr::Bool(*x)),
        CoercedAttr::Int(x) => Ok(ConfiguredAttr::Int(*x)),
        CoercedAttr::String(x) => Ok(ConfiguredAttr::String(x.clone())),
        CoercedAttr::Label(label) => configure_label(attr_type, label, ctx),
        CoercedAttr::List(items) => {
            let inner = match attr_type {
                AttrType::List(inner) => inner.as_ref(),
                // A bare list against a non-list schema is a loader bug.
                _ => return Err(AttrConfigurationError::TypeMismatch.into()),
            };
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                result.push(configure_attr(inner, item, ctx)?);
            }
            Ok(ConfiguredAttr::List(result))
        }
    }
}

fn configure_label(
    attr_type: &AttrType,
    label: &TargetLabel,
    ctx: &dyn AttrConfigurationContext,
) -> anyhow::Result<ConfiguredAttr> {
    match attr_type {
        AttrType::Label => Ok(ConfiguredAttr::Label(label.dupe())),
        AttrType::Source => Ok(ConfiguredAttr::Source(ctx.configure_source(label))),
        AttrType::Dep(dep) => match ctx
            .configure_dep(label, dep)
            .with_context(|| format!("when configuring dependency `{}`", label))?
        {
            ConfiguredDep::Single(dep) => Ok(ConfiguredAttr::Dep(dep)),
            ConfiguredDep::Split(deps) => Ok(ConfiguredAttr::SplitDep(deps)),
        },
        AttrType::List(inner) => configure_label(inner, label, ctx),
        _ => Err(AttrConfigurationError::TypeMismatch.into()),
    }
}

fn resolve_select<'a>(
    entries: &'a [(TargetLabel, CoercedAttr)],
    default: Option<&'a CoercedAttr>,
    ctx: &dyn AttrConfigurationContext,
) -> anyhow::Result<&'a CoercedAttr> {
    let mut matched: Option<(&TargetLabel, &CoercedAttr)> = None;
    for (condition, value) in entries {
        if ctx.matches(condition)? {
            if let Some((previous, _)) = matched {
                return Err(AttrConfigurationError::SelectAmbiguous(
                    previous.dupe(),
                    condition.dupe(),
                )
                .into());
            }
            matched = Some((condition, value));
        }
    }
    match (matched, default) {
        (Some((_, value)), _) => Ok(value),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(AttrConfigurationError::SelectHasNoMatch.into()),
    }
}
