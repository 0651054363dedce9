/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The unconfigured target node, as parsed out of a build file. Immutable;
//! shared between every configuration the target is analyzed in.

use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use indexmap::IndexMap;

use strata_core::target::TargetLabel;

use crate::attrs::attr::Attribute;
use crate::attrs::coerced_attr::CoercedAttr;
use crate::rule::RuleClass;
use crate::rule::RuleKind;
use crate::transition::AttrView;
use crate::visibility::VisibilitySpec;

#[derive(Allocative)]
struct TargetNodeData {
    label: TargetLabel,
    #[allocative(skip)]
    rule_class: Arc<RuleClass>,
    /// Values the build file set explicitly; schema defaults fill the rest.
    #[allocative(skip)]
    attrs: IndexMap<String, CoercedAttr>,
    visibility: VisibilitySpec,
    /// `path/BUILD:line`, for diagnostics.
    location: String,
}

#[derive(Allocative, Clone, Dupe)]
pub struct TargetNode(Arc<TargetNodeData>);

impl TargetNode {
    pub fn new(
        label: TargetLabel,
        rule_class: Arc<RuleClass>,
        attrs: IndexMap<String, CoercedAttr>,
        visibility: VisibilitySpec,
        location: String,
    ) -> Self {
        TargetNode(Arc::new(TargetNodeData {
            label,
            rule_class,
            attrs,
            visibility,
            location,
        }))
    }

    pub fn label(&self) -> &TargetLabel {
        &self.0.label
    }

    pub fn rule_class(&self) -> &Arc<RuleClass> {
        &self.0.rule_class
    }

    pub fn kind(&self) -> RuleKind {
        self.0.rule_class.kind
    }

    pub fn is_configurable(&self) -> bool {
        self.0.rule_class.is_configurable()
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind(), RuleKind::Alias)
    }

    pub fn visibility(&self) -> &VisibilitySpec {
        &self.0.visibility
    }

    pub fn location(&self) -> &str {
        &self.0.location
    }

    /// The explicit value, or the schema default.
    pub fn attr_or_default(&self, name: &str) -> Option<&CoercedAttr> {
        self.0
            .attrs
            .get(name)
            .or_else(|| self.0.rule_class.attribute(name).and_then(Attribute::default))
    }

    /// Iterates the attribute schema in declaration order, pairing each
    /// attribute with the value this target carries for it (explicit or
    /// default). Attributes with neither are skipped.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &Attribute, &CoercedAttr)> {
        self.0.rule_class.attrs.iter().filter_map(|(name, attribute)| {
            self.attr_or_default(name)
                .map(|value| (name.as_str(), attribute, value))
        })
    }

    /// Every `select()` condition label referenced by this target's
    /// attributes, deduplicated, in first-appearance order. Read from the
    /// raw attribute map: condition-list schemas are themselves
    /// non-configurable, so this never has to resolve a select to find the
    /// keys of another.
    pub fn select_keys(&self) -> Vec<TargetLabel> {
        let mut keys = Vec::new();
        for (_, _, value) in self.attrs() {
            value.select_keys(&mut keys);
        }
        let mut seen = std::collections::HashSet::new();
        keys.retain(|k| seen.insert(k.dupe()));
        keys
    }
}

impl AttrView for TargetNode {
    fn attr(&self, name: &str) -> Option<&CoercedAttr> {
        self.attr_or_default(name)
    }
}

impl PartialEq for TargetNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TargetNode {}

impl Debug for TargetNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetNode")
            .field("label", &self.0.label)
            .field("rule_class", &self.0.rule_class.name)
            .finish_non_exhaustive()
    }
}
