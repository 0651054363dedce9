/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Attribute schemas.
//!
//! An [`Attribute`] is the rule-class side of an attribute: its type, its
//! default, and for dependency attributes the transition the edge applies.
//! The values sitting in a target node are [`CoercedAttr`]s; configuring a
//! value is always driven by its schema.

use std::sync::Arc;

use allocative::Allocative;

use crate::attrs::coerced_attr::CoercedAttr;
use crate::transition::Transition;

#[derive(Allocative, Clone, Debug)]
pub struct Attribute {
    attr_type: AttrType,
    default: Option<CoercedAttr>,
}

impl Attribute {
    pub fn new(attr_type: AttrType, default: Option<CoercedAttr>) -> Self {
        Self { attr_type, default }
    }

    pub fn attr_type(&self) -> &AttrType {
        &self.attr_type
    }

    pub fn default(&self) -> Option<&CoercedAttr> {
        self.default.as_ref()
    }
}

#[derive(Allocative, Clone, Debug)]
pub enum AttrType {
    Bool,
    Int,
    String,
    /// A label that is not a dependency edge (e.g. a config-setting
    /// reference in `target_compatible_with`).
    Label,
    /// An edge to a non-configurable target: the child keeps the null
    /// configuration regardless of transitions.
    Source,
    /// A configured dependency edge.
    Dep(DepAttrType),
    List(Box<AttrType>),
}

impl AttrType {
    pub fn dep(transition: DepAttrTransition) -> AttrType {
        AttrType::Dep(DepAttrType {
            required_providers: Vec::new(),
            transition,
            aspects: Vec::new(),
        })
    }

    pub fn list(inner: AttrType) -> AttrType {
        AttrType::List(Box::new(inner))
    }

    /// Whether values of this type may contain `select()`s. The schema of
    /// condition-list attributes is itself never configurable, which is
    /// what makes collecting select keys from raw attributes sound.
    pub fn is_configurable(&self) -> bool {
        !matches!(self, AttrType::Label)
    }
}

#[derive(Allocative, Clone, Debug)]
pub struct DepAttrType {
    pub required_providers: Vec<crate::provider::ProviderId>,
    pub transition: DepAttrTransition,
    /// Aspects to apply to dependencies flowing through this attribute.
    #[allocative(skip)]
    pub aspects: Vec<std::sync::Arc<crate::aspect::AspectDefinition>>,
}

#[derive(Allocative, Clone, Debug)]
pub enum DepAttrTransition {
    /// The child inherits the parent configuration, trimmed to the child's
    /// required fragments.
    Identity,
    /// A configuration transition applied along the edge. May fan out into
    /// a split.
    Transition(#[allocative(skip)] Arc<dyn Transition>),
}
