/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! A counting semaphore bounding the number of concurrently executing
//! CPU-heavy activations.
//!
//! Heavyweight computations acquire a permit on entry and, when configured,
//! drop it around dependency fetches so that work waiting on other nodes
//! never holds a CPU slot. Long waits for a permit are logged, rate-limited
//! so a contended build does not flood the log.

use std::fmt::Display;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;

const LOGGED_WAIT_MILLIS: u128 = 5;
const LOG_EVERY_MILLIS: u64 = 10_000;

pub struct CpuSemaphore {
    permits: Mutex<usize>,
    permit_returned: Condvar,
    created: Instant,
    last_logged_at_millis: AtomicU64,
}

impl CpuSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            permit_returned: Condvar::new(),
            created: Instant::now(),
            last_logged_at_millis: AtomicU64::new(u64::MAX),
        }
    }

    /// Blocks until a permit is available. Waits above ~5ms are logged at
    /// most once per ten seconds.
    pub fn acquire(&self, what: &dyn Display) -> CpuPermit<'_> {
        let started = Instant::now();
        self.acquire_raw();
        let waited = started.elapsed();
        if waited.as_millis() > LOGGED_WAIT_MILLIS {
            let now = self.created.elapsed().as_millis() as u64;
            let last = self.last_logged_at_millis.load(Ordering::Relaxed);
            if last == u64::MAX || now.saturating_sub(last) >= LOG_EVERY_MILLIS {
                if self
                    .last_logged_at_millis
                    .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    tracing::info!(
                        "spent {}ms waiting for a cpu permit for {}",
                        waited.as_millis(),
                        what
                    );
                }
            }
        }
        CpuPermit { semaphore: self }
    }

    fn acquire_raw(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.permit_returned.wait(&mut permits);
        }
        *permits -= 1;
    }

    fn release(&self) {
        *self.permits.lock() += 1;
        self.permit_returned.notify_one();
    }

    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }
}

pub struct CpuPermit<'a> {
    semaphore: &'a CpuSemaphore,
}

impl CpuPermit<'_> {
    /// Runs `f` with the permit returned to the pool, re-acquiring it
    /// afterwards. Used around dependency fetches.
    pub fn release_while<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.semaphore.release();
        let result = f();
        self.semaphore.acquire_raw();
        result
    }
}

impl Drop for CpuPermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
