/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//!
//! Tracking of the global version number. Computed values are tagged with the
//! version they were verified at so that the engine can tell when a value is
//! out of date.

use allocative::Allocative;
use derive_more::Display;
use dupe::Dupe;

/// The incrementing version number associated with all cache entries.
#[derive(Copy, Eq, Debug, Display, Dupe)]
#[derive(PartialEq, Hash, Clone, Ord, PartialOrd, Allocative)]
#[display(fmt = "v{}", _0)]
pub struct VersionNumber(pub(crate) usize);

impl VersionNumber {
    /// The first transaction has version number zero.
    pub(crate) const ZERO: VersionNumber = VersionNumber(0);

    pub(crate) fn inc(&mut self) {
        self.0 += 1;
    }
}
