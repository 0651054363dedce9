/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The configured-target analysis layer.
//!
//! Everything here runs as computations on the `weft` graph: the
//! configured-target function itself, the package and toolchain-context
//! nodes delegating to the injected collaborators, the per-edge
//! configuration resolver, and the aspect resolver. The entry point for an
//! embedder is [`AnalysisDelegate`], registered as evaluator global data,
//! plus a `request` of a [`keys::ConfiguredTargetKey`].

pub mod analysis_env;
pub mod aspect_resolver;
pub mod calculation;
pub mod configuration_resolver;
pub mod delegate;
pub mod error;
pub mod incompatible;
pub mod keys;
pub mod options;
pub mod toolchain_context;

#[cfg(test)]
mod tests;
