/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Target labels.
//!
//! A [`TargetLabel`] uniquely identifies a target declared in a build file:
//! the package plus the target name. A [`ConfiguredTargetLabel`] pairs a
//! label with the configuration it is analyzed in; a null configuration
//! denotes a non-configurable target such as a source file.

use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use anyhow::Context;
use dupe::Dupe;

use crate::configuration::Configuration;
use crate::interner::Intern;
use crate::Interners;

/// The name of a target within a package.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetName(#[allocative(skip)] std::sync::Arc<str>);

impl TargetName {
    pub fn new(name: &str) -> anyhow::Result<Self> {
        if name.is_empty() || name.contains(':') || name.contains('/') {
            Err(anyhow::anyhow!("invalid target name `{}`", name))
        } else {
            Ok(Self::unchecked_new(name))
        }
    }

    pub fn unchecked_new(name: &str) -> Self {
        TargetName(std::sync::Arc::from(name))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetLabelData {
    pkg: crate::package::PackageId,
    name: TargetName,
}

impl Display for TargetLabelData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pkg, self.name)
    }
}

/// An interned `repo//package:name` label. Totally ordered by content;
/// equality and hashing are O(1) through the intern handle.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TargetLabel(Intern<TargetLabelData>);

impl TargetLabel {
    pub fn new(interners: &Interners, pkg: crate::package::PackageId, name: TargetName) -> Self {
        TargetLabel(interners.labels.intern(TargetLabelData { pkg, name }))
    }

    pub fn pkg(&self) -> &crate::package::PackageId {
        &self.0.pkg
    }

    pub fn name(&self) -> &TargetName {
        &self.0.name
    }

    /// Pairs this label with a configuration.
    pub fn configure(&self, cfg: Configuration) -> ConfiguredTargetLabel {
        ConfiguredTargetLabel {
            label: self.dupe(),
            cfg: Some(cfg),
        }
    }

    /// The configured form of a non-configurable target.
    pub fn unconfigured(&self) -> ConfiguredTargetLabel {
        ConfiguredTargetLabel {
            label: self.dupe(),
            cfg: None,
        }
    }

    /// Parses `repo//pkg:name`. The repository may be empty.
    pub fn parse(interners: &Interners, label: &str) -> anyhow::Result<Self> {
        let (repo, rest) = label
            .split_once("//")
            .with_context(|| format!("label `{}` is missing `//`", label))?;
        let (path, name) = rest
            .split_once(':')
            .with_context(|| format!("label `{}` is missing `:`", label))?;
        let name = TargetName::new(name)?;
        let pkg = crate::package::PackageId::new(interners, repo, path);
        Ok(TargetLabel::new(interners, pkg, name))
    }
}

impl Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// A label plus the configuration it is analyzed in. `None` is the null
/// configuration of non-configurable targets.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash)]
pub struct ConfiguredTargetLabel {
    label: TargetLabel,
    cfg: Option<Configuration>,
}

impl ConfiguredTargetLabel {
    pub fn label(&self) -> &TargetLabel {
        &self.label
    }

    pub fn cfg(&self) -> Option<&Configuration> {
        self.cfg.as_ref()
    }
}

impl Display for ConfiguredTargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cfg {
            Some(cfg) => write!(f, "{} ({})", self.label, cfg),
            None => write!(f, "{} (null)", self.label),
        }
    }
}

pub mod testing {
    use crate::target::TargetLabel;
    use crate::Interners;

    pub trait TargetLabelExt {
        /// Parses a label, panicking on malformed input. Only for tests.
        fn testing_parse(interners: &Interners, label: &str) -> TargetLabel;
    }

    impl TargetLabelExt for TargetLabel {
        fn testing_parse(interners: &Interners, label: &str) -> TargetLabel {
            TargetLabel::parse(interners, label).expect("invalid test label")
        }
    }
}
