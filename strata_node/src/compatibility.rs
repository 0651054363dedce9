/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

use strata_core::target::ConfiguredTargetLabel;
use strata_core::target::TargetLabel;

/// MaybeCompatible is used to gracefully deal with things that are
/// incompatible with the target platform. Requested targets may be
/// incompatible with the default or requested platform and we want to skip
/// building those rather than have it be an error.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash)]
pub enum MaybeCompatible<T> {
    Incompatible(Arc<IncompatiblePlatformReason>),
    Compatible(T),
}

#[derive(Allocative, Debug, Eq, PartialEq, Hash, Clone, Dupe)]
pub enum IncompatiblePlatformReasonCause {
    /// Incompatible because of an unsatisfied config setting.
    UnsatisfiedConfig(TargetLabel),
    /// Incompatible because a required dependency is incompatible.
    Dependency(Arc<IncompatiblePlatformReason>),
}

#[derive(Allocative, Debug, Eq, PartialEq, Hash, Clone)]
pub struct IncompatiblePlatformReason {
    pub target: ConfiguredTargetLabel,
    pub cause: IncompatiblePlatformReasonCause,
}

impl IncompatiblePlatformReason {
    /// The diagnostic emitted when analysis skips an incompatible target
    /// instead of failing the build on it.
    pub fn skipping_message(&self, target: &ConfiguredTargetLabel) -> String {
        format!("Skipping target incompatible node `{}`", target)
    }
}

impl Display for IncompatiblePlatformReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            IncompatiblePlatformReasonCause::UnsatisfiedConfig(unsatisfied) => write!(
                f,
                "{} incompatible ({} unsatisfied)",
                self.target, unsatisfied
            ),
            IncompatiblePlatformReasonCause::Dependency(previous) => {
                if f.alternate() {
                    write!(f, "{}\n-> {:#}", self.target, previous)
                } else {
                    write!(f, "{} -> {}", self.target, previous)
                }
            }
        }
    }
}
