/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//!
//! An incremental caching computation engine.
//!
//! The engine outputs values corresponding to given [`Key`]s, reusing
//! previously computed values when possible. A `Key`'s computation is
//! allowed to request other `Key`s through its [`WeftComputations`]
//! environment; a request that is not computed yet is reported as missing,
//! the computation returns [`Step::Pending`], and the engine re-invokes it
//! once the missing keys are ready. Scratch state obtained from the
//! environment survives these restarts, so a re-invocation is cheap: it
//! skips every stage it already finished.
//!
//! There are deliberately no futures here. Computations are plain functions
//! and the restart protocol replaces suspension on a future: stacks stay
//! shallow, scheduling stays simple, and a fixed worker pool drains ready
//! nodes.
//!
//! Between requests, an updater records changed inputs; committing it bumps
//! the version and dirties the transitive reverse dependencies of the
//! changes. A dirtied node re-executes only if one of its dependencies
//! actually changed in value, and a re-execution that produces an equal
//! value (per [`Key::equality`]) leaves its reverse dependencies clean.

mod api;
pub mod cycles;
mod erased;
mod error;
mod evaluator;
mod graph;
mod incremental;
mod semaphore;
mod versions;

#[cfg(test)]
mod tests;

pub use crate::api::computations::suspend;
pub use crate::api::computations::WeftComputations;
pub use crate::api::data::GlobalData;
pub use crate::api::data::GlobalDataBuilder;
pub use crate::api::events::Event;
pub use crate::api::events::EventKind;
pub use crate::api::events::EventSink;
pub use crate::api::events::NullEventSink;
pub use crate::api::events::StoredEvents;
pub use crate::api::key::InjectedKey;
pub use crate::api::key::Key;
pub use crate::api::key::Step;
pub use crate::cycles::DetectCycles;
pub use crate::erased::DynKey;
pub use crate::error::WeftError;
pub use crate::error::WeftResult;
pub use crate::evaluator::Evaluator;
pub use crate::evaluator::EvaluatorBuilder;
pub use crate::evaluator::Transaction;
pub use crate::evaluator::TransactionUpdater;
pub use crate::semaphore::CpuPermit;
pub use crate::semaphore::CpuSemaphore;
pub use crate::versions::VersionNumber;
