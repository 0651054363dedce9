/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use strata_core::target::ConfiguredTargetLabel;

use crate::transition::TransitionKey;

/// A visitor over the dependency edges buried in a configured attribute.
pub trait ConfiguredAttrTraversal {
    fn dep(&mut self, dep: &ConfiguredTargetLabel) -> anyhow::Result<()>;

    fn split_dep(
        &mut self,
        _key: &TransitionKey,
        dep: &ConfiguredTargetLabel,
    ) -> anyhow::Result<()> {
        self.dep(dep)
    }

    fn source(&mut self, dep: &ConfiguredTargetLabel) -> anyhow::Result<()> {
        self.dep(dep)
    }
}
