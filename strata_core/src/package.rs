/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//!
//! A package identifies the directory of a build file: every target declared
//! in that build file belongs to the package. Identified by the repository
//! it lives in plus the repository-relative path.

use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use dupe::Dupe;

use crate::interner::Intern;
use crate::Interners;

#[derive(Allocative, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PackageIdData {
    repository: String,
    path: String,
}

impl Display for PackageIdData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}//{}", self.repository, self.path)
    }
}

/// An interned package identifier. Cheap to clone, compare and hash.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PackageId(Intern<PackageIdData>);

impl PackageId {
    pub fn new(interners: &Interners, repository: impl Into<String>, path: impl Into<String>) -> Self {
        PackageId(interners.packages.intern(PackageIdData {
            repository: repository.into(),
            path: path.into(),
        }))
    }

    pub fn repository(&self) -> &str {
        &self.0.repository
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use crate::package::PackageId;
    use crate::Interners;

    #[test]
    fn display_and_identity() {
        let interners = Interners::new();
        let a = PackageId::new(&interners, "", "foo/bar");
        let b = PackageId::new(&interners, "", "foo/bar");
        let c = PackageId::new(&interners, "ext", "foo/bar");
        assert_eq!("//foo/bar", a.to_string());
        assert_eq!("ext//foo/bar", c.to_string());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
