/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Failure kinds, root causes and exit codes.
//!
//! Every failing node carries a kind from a closed enumeration, and a
//! failure surfaced to the user carries the set of leaf causes that actually
//! failed plus a detailed exit code merged across causes: the most severe
//! wins, ties broken by the first seen.

use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use derive_more::Display;
use dupe::Dupe;

use crate::nested_set::NestedSet;
use crate::target::TargetLabel;

/// The closed set of ways an analysis node can fail.
#[derive(Allocative, Clone, Copy, Dupe, Debug, Display, Eq, PartialEq, Hash)]
pub enum FailureKind {
    NoSuchPackage,
    NoSuchTarget,
    ConfigConditionsFailed,
    DependencyEvaluationFailed,
    NoMatchingExecutionPlatform,
    ToolchainResolutionFailed,
    AspectCreationFailed,
    ActionConflict,
    DuplicateProvider,
    AnalysisFailed,
    Cycle,
    Interrupted,
}

impl FailureKind {
    pub fn exit_code(self) -> ExitCode {
        match self {
            FailureKind::NoSuchPackage | FailureKind::NoSuchTarget => ExitCode::LoadingFailure,
            FailureKind::Interrupted => ExitCode::InterruptedFailure,
            FailureKind::Cycle
            | FailureKind::ConfigConditionsFailed
            | FailureKind::DependencyEvaluationFailed
            | FailureKind::NoMatchingExecutionPlatform
            | FailureKind::ToolchainResolutionFailed
            | FailureKind::AspectCreationFailed
            | FailureKind::ActionConflict
            | FailureKind::DuplicateProvider
            | FailureKind::AnalysisFailed => ExitCode::AnalysisFailure,
        }
    }

    pub fn to_detailed_exit_code(self) -> DetailedExitCode {
        DetailedExitCode {
            exit_code: self.exit_code(),
            kind: self,
        }
    }
}

/// Numeric process exit codes, ranked for merging.
#[derive(Allocative, Clone, Copy, Dupe, Debug, Display, Eq, PartialEq, Hash)]
pub enum ExitCode {
    Success,
    BuildFailure,
    AnalysisFailure,
    LoadingFailure,
    InterruptedFailure,
    InternalError,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        match self {
            ExitCode::Success => 0,
            ExitCode::BuildFailure => 1,
            ExitCode::AnalysisFailure => 3,
            ExitCode::LoadingFailure => 4,
            ExitCode::InterruptedFailure => 8,
            ExitCode::InternalError => 37,
        }
    }

    /// The fixed severity order used when merging exit codes.
    fn severity(self) -> u8 {
        match self {
            ExitCode::Success => 0,
            ExitCode::BuildFailure => 1,
            ExitCode::AnalysisFailure => 2,
            ExitCode::LoadingFailure => 3,
            ExitCode::InterruptedFailure => 4,
            ExitCode::InternalError => 5,
        }
    }
}

/// An exit code with the failure kind that produced it.
#[derive(Allocative, Clone, Copy, Dupe, Debug, Eq, PartialEq, Hash)]
pub struct DetailedExitCode {
    pub exit_code: ExitCode,
    pub kind: FailureKind,
}

impl DetailedExitCode {
    /// Picks the more severe of the two; the first wins a tie. Merging a
    /// cause list left to right therefore keeps the first-seen maximum.
    pub fn choose_more_important_with_first_if_tie(
        first: Option<DetailedExitCode>,
        second: DetailedExitCode,
    ) -> DetailedExitCode {
        match first {
            None => second,
            Some(first) => {
                if second.exit_code.severity() > first.exit_code.severity() {
                    second
                } else {
                    first
                }
            }
        }
    }

    /// The merged exit code over a cause list, per the fixed comparator.
    pub fn prioritized(causes: &NestedSet<Cause>) -> Option<DetailedExitCode> {
        let mut result = None;
        for cause in causes.to_vec() {
            result = Some(Self::choose_more_important_with_first_if_tie(
                result,
                cause.exit_code,
            ));
        }
        result
    }
}

impl Display for DetailedExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.exit_code.code(), self.kind)
    }
}

/// A leaf failing node: the label whose own computation failed, with the
/// exit code it produced.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash)]
pub struct Cause {
    pub label: TargetLabel,
    pub exit_code: DetailedExitCode,
}

impl Cause {
    pub fn new(label: TargetLabel, kind: FailureKind) -> Self {
        Cause {
            label,
            exit_code: kind.to_detailed_exit_code(),
        }
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.exit_code.kind)
    }
}
