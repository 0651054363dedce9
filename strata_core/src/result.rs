/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Shared results.
//!
//! Node values containing errors are cached and cloned on every request, so
//! the error side must be cheaply cloneable: an `Arc`-shared
//! `anyhow::Error` that still supports downcasting to the structured
//! analysis error types.

use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;

#[derive(Allocative, Clone, Dupe)]
pub struct SharedError(#[allocative(skip)] Arc<anyhow::Error>);

pub type SharedResult<T> = Result<T, SharedError>;

impl SharedError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        SharedError(Arc::new(error.into()))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn downcast_ref<E: Display + Debug + Send + Sync + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedError {}

impl From<anyhow::Error> for SharedError {
    fn from(error: anyhow::Error) -> Self {
        SharedError(Arc::new(error))
    }
}

pub trait ToSharedResultExt<T> {
    fn shared_error(self) -> SharedResult<T>;
}

impl<T, E: Into<anyhow::Error>> ToSharedResultExt<T> for Result<T, E> {
    fn shared_error(self) -> SharedResult<T> {
        self.map_err(|e| SharedError(Arc::new(e.into())))
    }
}

#[cfg(test)]
mod tests {
    use crate::result::SharedError;
    use crate::result::ToSharedResultExt;

    #[derive(Debug, thiserror::Error)]
    #[error("structured: {0}")]
    struct Structured(usize);

    #[test]
    fn downcast_through_the_shared_wrapper() {
        let shared = SharedError::new(Structured(7));
        assert_eq!(7, shared.downcast_ref::<Structured>().unwrap().0);
        let cloned = shared.clone();
        assert_eq!(7, cloned.downcast_ref::<Structured>().unwrap().0);
    }

    #[test]
    fn shared_error_ext() {
        let r: Result<(), Structured> = Err(Structured(1));
        let shared = r.shared_error().unwrap_err();
        assert!(shared.to_string().contains("structured"));
    }
}
