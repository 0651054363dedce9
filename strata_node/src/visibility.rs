/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use allocative::Allocative;
use thiserror::Error;

use strata_core::package::PackageId;
use strata_core::target::TargetLabel;

#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error(
        "`{0}` is not visible to `{1}` (run `query --output=visibility {0}` to inspect visibility)"
    )]
    NotVisibleTo(TargetLabel, TargetLabel),
}

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub enum VisibilitySpec {
    Public,
    /// Visible only within the declaring package.
    Private,
    /// Visible to the listed packages.
    Packages(Vec<PackageId>),
}

impl VisibilitySpec {
    pub fn is_visible_to(&self, own_pkg: &PackageId, from: &TargetLabel) -> bool {
        match self {
            VisibilitySpec::Public => true,
            VisibilitySpec::Private => from.pkg() == own_pkg,
            VisibilitySpec::Packages(packages) => {
                from.pkg() == own_pkg || packages.contains(from.pkg())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_core::package::PackageId;
    use strata_core::target::testing::TargetLabelExt;
    use strata_core::target::TargetLabel;
    use strata_core::Interners;

    use crate::visibility::VisibilitySpec;

    #[test]
    fn private_is_package_scoped() {
        let interners = Interners::new();
        let own = PackageId::new(&interners, "", "a");
        let sibling = TargetLabel::testing_parse(&interners, "//a:x");
        let outsider = TargetLabel::testing_parse(&interners, "//b:y");

        assert!(VisibilitySpec::Private.is_visible_to(&own, &sibling));
        assert!(!VisibilitySpec::Private.is_visible_to(&own, &outsider));
        assert!(VisibilitySpec::Public.is_visible_to(&own, &outsider));
        assert!(
            VisibilitySpec::Packages(vec![PackageId::new(&interners, "", "b")])
                .is_visible_to(&own, &outsider)
        );
    }
}
