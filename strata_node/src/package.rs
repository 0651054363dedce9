/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The parsed package as the loader hands it to the analysis phase.
//!
//! Loading is an external concern: the core requests packages through a
//! graph node backed by the injected [`PackageProvider`]. A package that
//! parsed with errors still exposes the targets that survived; analysis
//! records a loading root cause and keeps going so more causes can
//! surface in one pass.

use std::fmt;
use std::fmt::Debug;

use allocative::Allocative;
use indexmap::IndexMap;
use thiserror::Error;

use strata_core::package::PackageId;
use strata_core::target::TargetName;

use crate::nodes::unconfigured::TargetNode;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("no such package `{0}`: {1}")]
    NoSuchPackage(PackageId, String),
    #[error("no such target `{1}` in package `{0}` (declared in {2})")]
    NoSuchTarget(PackageId, TargetName, String),
}

#[derive(Allocative)]
pub struct PackageValue {
    id: PackageId,
    build_file_path: String,
    #[allocative(skip)]
    targets: IndexMap<TargetName, TargetNode>,
    contains_errors: bool,
    failure: Option<String>,
}

impl PackageValue {
    pub fn new(
        id: PackageId,
        build_file_path: String,
        targets: IndexMap<TargetName, TargetNode>,
    ) -> Self {
        Self {
            id,
            build_file_path,
            targets,
            contains_errors: false,
            failure: None,
        }
    }

    /// A package whose build file parsed with errors: the surviving targets
    /// are usable, and the failure detail is recorded as a root cause by
    /// whoever reads them.
    pub fn with_errors(mut self, failure: impl Into<String>) -> Self {
        self.contains_errors = true;
        self.failure = Some(failure.into());
        self
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn build_file_path(&self) -> &str {
        &self.build_file_path
    }

    pub fn contains_errors(&self) -> bool {
        self.contains_errors
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn targets(&self) -> impl Iterator<Item = (&TargetName, &TargetNode)> {
        self.targets.iter()
    }

    pub fn target(&self, name: &TargetName) -> anyhow::Result<&TargetNode> {
        self.targets.get(name).ok_or_else(|| {
            PackageError::NoSuchTarget(
                self.id.clone(),
                name.clone(),
                self.build_file_path.clone(),
            )
            .into()
        })
    }
}

impl Debug for PackageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageValue")
            .field("id", &self.id)
            .field("targets", &self.targets.len())
            .field("contains_errors", &self.contains_errors)
            .finish()
    }
}

/// The package-loader collaborator. An `Err` is a `NoSuchPackage`-class
/// failure; a parse error inside an existing package comes back as a
/// successful load with [`PackageValue::contains_errors`] set.
pub trait PackageProvider: Send + Sync + 'static {
    fn load(&self, id: &PackageId) -> anyhow::Result<std::sync::Arc<PackageValue>>;
}
