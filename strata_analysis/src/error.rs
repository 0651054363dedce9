/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The structured failure of a configured-target computation.
//!
//! Every failing node stores one of these (behind a `SharedError`):
//! the failure kind, the message, the set of leaf root causes, the merged
//! detailed exit code, and whether the error has already been printed to
//! the user's listener. Callers must not re-print a reported failure.

use dupe::Dupe;
use thiserror::Error;

use strata_core::causes::Cause;
use strata_core::causes::DetailedExitCode;
use strata_core::causes::FailureKind;
use strata_core::nested_set::NestedSet;
use strata_core::nested_set::NestedSetBuilder;
use strata_core::result::SharedError;
use strata_core::target::TargetLabel;

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct ConfiguredValueCreationError {
    pub message: String,
    pub label: TargetLabel,
    pub kind: FailureKind,
    /// The configuration's event id, when the failing node had one.
    pub configuration_event_id: Option<String>,
    pub root_causes: NestedSet<Cause>,
    pub detailed_exit_code: DetailedExitCode,
    /// Whether the error was already printed to the evaluation listener.
    /// An empty message is always classified as reported.
    pub reported: bool,
}

impl ConfiguredValueCreationError {
    /// A failure whose only root cause is the failing node itself.
    pub fn own(
        label: TargetLabel,
        configuration_event_id: Option<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        let mut causes = NestedSetBuilder::new();
        causes.add(Cause::new(label.dupe(), kind));
        Self {
            message: message.into(),
            label,
            kind,
            configuration_event_id,
            root_causes: causes.build(),
            detailed_exit_code: kind.to_detailed_exit_code(),
            reported: false,
        }
    }

    /// A failure aggregating causes collected from children; the exit code
    /// is the prioritized maximum over the causes.
    pub fn aggregated(
        label: TargetLabel,
        configuration_event_id: Option<String>,
        kind: FailureKind,
        message: impl Into<String>,
        root_causes: NestedSet<Cause>,
    ) -> Self {
        let detailed_exit_code = DetailedExitCode::prioritized(&root_causes)
            .unwrap_or_else(|| kind.to_detailed_exit_code());
        Self {
            message: message.into(),
            label,
            kind,
            configuration_event_id,
            root_causes,
            detailed_exit_code,
            reported: false,
        }
    }

    pub fn reported(mut self) -> Self {
        self.reported = true;
        self
    }

    pub fn is_reported(&self) -> bool {
        self.reported || self.message.is_empty()
    }

    pub fn into_shared(self) -> SharedError {
        SharedError::new(self)
    }
}

/// Reads the structured failure back out of a shared node error, when it
/// carries one.
pub fn as_creation_error(error: &SharedError) -> Option<&ConfiguredValueCreationError> {
    error.downcast_ref::<ConfiguredValueCreationError>()
}
