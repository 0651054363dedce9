/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The evaluator and its transaction flow.
//!
//! An [`Evaluator`] owns the versioned graph and everything process-wide
//! (worker count, the CPU-bound semaphore, global data); all of it is fixed
//! at construction so tests stay hermetic. Work happens through
//! transactions: an updater records invalidations and injected values,
//! `commit` bumps the version iff anything changed, and the resulting
//! [`Transaction`] serves `request` calls at that version.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;
use parking_lot::Mutex;

use crate::api::data::GlobalData;
use crate::api::data::GlobalDataBuilder;
use crate::api::events::EventSink;
use crate::api::events::NullEventSink;
use crate::api::key::InjectedKey;
use crate::api::key::Key;
use crate::cycles::DetectCycles;
use crate::erased::AnyValue;
use crate::erased::DynKey;
use crate::error::WeftResult;
use crate::graph::VersionedGraph;
use crate::incremental::Evaluation;
use crate::semaphore::CpuSemaphore;
use crate::versions::VersionNumber;

#[derive(Clone, Dupe)]
pub struct Evaluator(Arc<EvaluatorData>);

struct EvaluatorData {
    graph: VersionedGraph,
    version: Mutex<VersionNumber>,
    global_data: GlobalData,
    num_workers: usize,
    cpu_semaphore: Option<CpuSemaphore>,
    unblock_cpu_work_when_fetching_deps: bool,
    detect_cycles: DetectCycles,
}

impl Evaluator {
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::new()
    }

    pub fn updater(&self) -> TransactionUpdater {
        TransactionUpdater {
            evaluator: self.dupe(),
            changes: Vec::new(),
        }
    }

    pub fn global_data(&self) -> &GlobalData {
        &self.0.global_data
    }
}

pub struct EvaluatorBuilder {
    data: GlobalDataBuilder,
    num_workers: Option<usize>,
    cpu_heavy_permits: Option<usize>,
    unblock_cpu_work_when_fetching_deps: bool,
}

impl EvaluatorBuilder {
    pub fn new() -> Self {
        Self {
            data: GlobalDataBuilder::new(),
            num_workers: None,
            cpu_heavy_permits: None,
            unblock_cpu_work_when_fetching_deps: false,
        }
    }

    /// Registers global data, retrievable from any computation via
    /// `env.global_data().get::<T>()`.
    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.data.set(value);
        self
    }

    pub fn num_workers(&mut self, num_workers: usize) -> &mut Self {
        self.num_workers = Some(num_workers);
        self
    }

    /// Bounds the number of concurrently executing CPU-heavy activations.
    pub fn cpu_heavy_permits(&mut self, permits: usize) -> &mut Self {
        self.cpu_heavy_permits = Some(permits);
        self
    }

    pub fn unblock_cpu_work_when_fetching_deps(&mut self, unblock: bool) -> &mut Self {
        self.unblock_cpu_work_when_fetching_deps = unblock;
        self
    }

    pub fn build(self, detect_cycles: DetectCycles) -> Evaluator {
        let num_workers = self.num_workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(4, |n| n.get())
        });
        Evaluator(Arc::new(EvaluatorData {
            graph: VersionedGraph::default(),
            version: Mutex::new(VersionNumber::ZERO),
            global_data: self.data.build(),
            num_workers,
            cpu_semaphore: self.cpu_heavy_permits.map(CpuSemaphore::new),
            unblock_cpu_work_when_fetching_deps: self.unblock_cpu_work_when_fetching_deps,
            detect_cycles,
        }))
    }
}

impl Default for EvaluatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum Change {
    Invalidated(DynKey),
    Injected(DynKey, AnyValue),
}

/// Records changes to apply at the next version.
pub struct TransactionUpdater {
    evaluator: Evaluator,
    changes: Vec<Change>,
}

impl TransactionUpdater {
    /// Marks keys dirty: they and their transitive reverse dependencies are
    /// re-examined on the next request.
    pub fn changed<K: Key>(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.changes.push(Change::Invalidated(DynKey::new(key)));
        }
    }

    /// Injects values for keys that are not computed.
    pub fn changed_to<K: InjectedKey>(&mut self, changes: impl IntoIterator<Item = (K, K::Value)>) {
        for (key, value) in changes {
            self.changes
                .push(Change::Injected(DynKey::new(key), Arc::new(value)));
        }
    }

    /// Applies the recorded changes and returns a transaction at the
    /// resulting version. An updater with no changes does not create a new
    /// version, so subsequent requests are served entirely from cache.
    pub fn commit(self) -> Transaction {
        let data = &self.evaluator.0;
        let version = {
            let mut version = data.version.lock();
            if !self.changes.is_empty() {
                version.inc();
                for change in self.changes {
                    match change {
                        Change::Invalidated(key) => data.graph.invalidate(&key, *version),
                        Change::Injected(key, value) => data.graph.inject(&key, value, *version),
                    }
                }
            }
            *version
        };
        Transaction {
            evaluator: self.evaluator,
            version,
            sink: Arc::new(NullEventSink),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A consistent view of the graph at one version.
pub struct Transaction {
    evaluator: Evaluator,
    version: VersionNumber,
    sink: Arc<dyn EventSink>,
    interrupted: Arc<AtomicBool>,
}

impl Transaction {
    pub fn version(&self) -> VersionNumber {
        self.version
    }

    /// Installs the sink receiving diagnostic events from computations that
    /// complete cleanly during requests on this transaction.
    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = sink;
    }

    /// Requests cancellation. Workers notice between nodes; partially
    /// computed nodes are dropped and re-execute from scratch next time.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Computes `key` and its transitive dependencies in parallel, returning
    /// the value. Engine-level failures (cycles, interrupts) are the error
    /// case; failures of the computation itself are carried in the value.
    pub fn request<K: Key>(&self, key: &K) -> WeftResult<K::Value> {
        let data = &self.evaluator.0;
        let dyn_key = DynKey::new(key.clone());
        let evaluation = Evaluation::new(
            &data.graph,
            self.version,
            data.detect_cycles,
            &data.global_data,
            data.cpu_semaphore.as_ref(),
            data.unblock_cpu_work_when_fetching_deps,
            &*self.sink,
            &self.interrupted,
        );
        let value = evaluation.request(&dyn_key, data.num_workers)?;
        Ok(DynKey::unpack_value::<K>(&value))
    }
}
