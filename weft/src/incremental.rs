/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! The incremental evaluation of a single request.
//!
//! A fixed pool of workers drains a queue of ready nodes. Computations never
//! block on sibling nodes: an activation that observes missing dependencies
//! returns `Step::Pending`, the engine parks the node as a waiter on those
//! dependencies, and re-enqueues it when the last one completes. A dirtied
//! node with a previous value is first *verified* — its recorded deps are
//! brought up to date and compared by version stamp — and only re-executed
//! when a dep actually changed, which is what makes early cutoff work.
//!
//! Lock order is evaluation state before node data; nothing acquires the
//! state lock while holding a node lock.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;
use dupe::IterDupedExt;
use indexmap::IndexSet;
use parking_lot::Condvar;
use parking_lot::Mutex;

use crate::api::computations::WeftComputations;
use crate::api::data::GlobalData;
use crate::api::events::EventSink;
use crate::api::key::Step;
use crate::cycles::CycleDetector;
use crate::cycles::DetectCycles;
use crate::erased::AnyValue;
use crate::erased::DynKey;
use crate::error::WeftError;
use crate::error::WeftResult;
use crate::graph::NodeCell;
use crate::graph::VersionedGraph;
use crate::semaphore::CpuSemaphore;
use crate::versions::VersionNumber;

pub(crate) struct Evaluation<'a> {
    graph: &'a VersionedGraph,
    version: VersionNumber,
    detect_cycles: DetectCycles,
    global_data: &'a GlobalData,
    cpu_semaphore: Option<&'a CpuSemaphore>,
    unblock_cpu_work_when_fetching_deps: bool,
    sink: &'a dyn EventSink,
    interrupted: &'a AtomicBool,
    state: Mutex<EvalState>,
    work_available: Condvar,
}

#[derive(Default)]
struct EvalState {
    queue: VecDeque<DynKey>,
    /// Queued, active, or suspended nodes. At most one activation per key.
    in_flight: HashSet<DynKey>,
    /// Request path per in-flight node, when cycle detection is enabled.
    paths: HashMap<DynKey, CycleDetector>,
    /// Suspended node -> number of outstanding dependencies.
    waiting: HashMap<DynKey, usize>,
    /// Dependency -> suspended nodes to wake when it resolves.
    waiters: HashMap<DynKey, Vec<DynKey>>,
    /// Transaction-scoped failures (cycles); never stored as node values.
    errors: HashMap<DynKey, WeftError>,
    active: usize,
}

enum DepsOutcome {
    Ready,
    Suspended,
    Error(WeftError),
}

impl<'a> Evaluation<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        graph: &'a VersionedGraph,
        version: VersionNumber,
        detect_cycles: DetectCycles,
        global_data: &'a GlobalData,
        cpu_semaphore: Option<&'a CpuSemaphore>,
        unblock_cpu_work_when_fetching_deps: bool,
        sink: &'a dyn EventSink,
        interrupted: &'a AtomicBool,
    ) -> Self {
        Self {
            graph,
            version,
            detect_cycles,
            global_data,
            cpu_semaphore,
            unblock_cpu_work_when_fetching_deps,
            sink,
            interrupted,
            state: Mutex::new(EvalState::default()),
            work_available: Condvar::new(),
        }
    }

    pub(crate) fn global_data(&self) -> &GlobalData {
        self.global_data
    }

    pub(crate) fn cpu_semaphore(&self) -> Option<&'a CpuSemaphore> {
        self.cpu_semaphore
    }

    pub(crate) fn unblock_cpu_work_when_fetching_deps(&self) -> bool {
        self.unblock_cpu_work_when_fetching_deps
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    pub(crate) fn error_for(&self, key: &DynKey) -> Option<WeftError> {
        self.state.lock().errors.get(key).map(|e| e.dupe())
    }

    pub(crate) fn lookup(&self, key: &DynKey) -> Option<AnyValue> {
        self.graph.lookup_valid(key)
    }

    /// Top-level parallel traversal computing `key` and its transitive deps.
    pub(crate) fn request(&self, key: &DynKey, num_workers: usize) -> WeftResult<AnyValue> {
        {
            let mut st = self.state.lock();
            st.in_flight.insert(key.dupe());
            if let DetectCycles::Enabled = self.detect_cycles {
                let path = CycleDetector::new()
                    .visit(key)
                    .expect("empty path cannot contain the root");
                st.paths.insert(key.dupe(), path);
            }
            st.queue.push_back(key.dupe());
        }

        std::thread::scope(|scope| {
            for _ in 0..num_workers.max(1) {
                scope.spawn(|| self.worker_loop());
            }
        });

        if self.is_interrupted() {
            // Partially computed nodes re-execute from scratch on the next
            // request; their scratch state must not survive the interrupt.
            self.clear_in_flight_scratch();
            return Err(WeftError::interrupted());
        }

        if let Some(e) = self.error_for(key) {
            return Err(e);
        }
        match self.graph.lookup_valid(key) {
            Some(value) => Ok(value),
            None => panic!("evaluation quiesced without computing `{}`", key),
        }
    }

    fn worker_loop(&self) {
        loop {
            let key = {
                let mut st = self.state.lock();
                let key = loop {
                    if self.is_interrupted() {
                        self.work_available.notify_all();
                        return;
                    }
                    if let Some(key) = st.queue.pop_front() {
                        break key;
                    }
                    if st.active == 0 {
                        if st.waiting.is_empty() {
                            // Quiesced.
                            self.work_available.notify_all();
                            return;
                        }
                        // No runnable work but nodes are suspended: a cycle
                        // spanning independent request paths.
                        self.resolve_stalled(&mut st);
                        continue;
                    }
                    self.work_available.wait(&mut st);
                };
                st.active += 1;
                key
            };

            self.process(&key);

            let mut st = self.state.lock();
            st.active -= 1;
            self.work_available.notify_all();
        }
    }

    fn process(&self, key: &DynKey) {
        let cell = self.graph.node(key);
        {
            let data = cell.data.lock();
            if data.is_valid() {
                drop(data);
                self.complete(key);
                return;
            }
            // A dirtied node with a previous value is verified against its
            // recorded deps before re-executing.
            if !data.force_dirty && data.value.is_some() && !data.deps.is_empty() {
                let deps = data.deps.clone();
                let computed_at = data.computed_at;
                drop(data);
                match self.ensure_deps(key, &deps) {
                    DepsOutcome::Ready => {
                        let unchanged = deps.iter().all(|d| match self.graph.changed_at(d) {
                            Some(changed) => Some(changed) <= computed_at,
                            None => false,
                        });
                        if unchanged {
                            let mut data = cell.data.lock();
                            data.computed_at = Some(self.version);
                            data.dirtied_at = None;
                            drop(data);
                            self.complete(key);
                            return;
                        }
                    }
                    DepsOutcome::Suspended => return,
                    DepsOutcome::Error(_) => {
                        // Re-execute so the computation observes the failed
                        // dep and decides how to propagate it.
                    }
                }
                self.run_compute(key, &cell);
                return;
            }
        }
        self.run_compute(key, &cell);
    }

    fn run_compute(&self, key: &DynKey, cell: &Arc<NodeCell>) {
        let scratch = cell.data.lock().scratch.take();
        let path = match self.detect_cycles {
            DetectCycles::Enabled => {
                Some(self.state.lock().paths.get(key).expect("in-flight node has a path").clone())
            }
            DetectCycles::Disabled => None,
        };

        let mut env = WeftComputations::new(self, key, path, scratch);
        let result = key.0.compute_any(&mut env);
        let (scratch, requested, missing, events) = env.into_parts();

        match result {
            Ok(Step::Ready(value)) => {
                let (old_deps, new_deps) = {
                    let mut data = cell.data.lock();
                    let changed = match &data.value {
                        Some(old) => !key.0.values_equal(old, &value),
                        None => true,
                    };
                    if changed {
                        data.changed_at = Some(self.version);
                    }
                    data.value = Some(value);
                    data.computed_at = Some(self.version);
                    data.dirtied_at = None;
                    data.force_dirty = false;
                    data.scratch = None;
                    // The node's dependencies are the union of every
                    // activation's requests, not just the final one's:
                    // restarted computations skip memoized stages.
                    let mut new_deps = std::mem::take(&mut data.pending_deps);
                    new_deps.extend(requested.iter().duped());
                    let old_deps =
                        std::mem::replace(&mut data.deps, new_deps.iter().duped().collect());
                    (old_deps, new_deps)
                };
                self.update_rdeps(key, &old_deps, &new_deps);
                // Events survive only a clean completion.
                for event in events {
                    self.sink.handle(event);
                }
                self.complete(key);
            }
            Ok(Step::Pending) => {
                assert!(
                    !missing.is_empty(),
                    "`{}` returned Pending without observing a missing dependency",
                    key
                );
                {
                    let mut data = cell.data.lock();
                    data.scratch = scratch;
                    data.pending_deps.extend(requested.iter().duped());
                }
                let missing: Vec<DynKey> = missing.into_iter().collect();
                match self.ensure_deps(key, &missing) {
                    DepsOutcome::Suspended => {}
                    DepsOutcome::Ready | DepsOutcome::Error(_) => {
                        // Everything resolved (or failed) in the meantime;
                        // re-run immediately.
                        let mut st = self.state.lock();
                        st.queue.push_back(key.dupe());
                        self.work_available.notify_all();
                    }
                }
            }
            Err(e) => {
                {
                    let mut data = cell.data.lock();
                    data.scratch = None;
                    data.pending_deps.clear();
                }
                self.complete_with_error(key, e);
            }
        }
    }

    /// Registers `key` as a waiter on whichever of `deps` are not yet
    /// computed at this version, scheduling any that are not in flight.
    fn ensure_deps(&self, key: &DynKey, deps: &[DynKey]) -> DepsOutcome {
        let mut st = self.state.lock();

        for dep in deps {
            if let Some(e) = st.errors.get(dep) {
                return DepsOutcome::Error(e.dupe());
            }
        }
        if let DetectCycles::Enabled = self.detect_cycles {
            let path = st.paths.get(key).expect("in-flight node has a path").clone();
            for dep in deps {
                if let Err(e) = path.check(dep) {
                    return DepsOutcome::Error(e);
                }
            }
        }

        let mut outstanding = 0;
        for dep in deps {
            if self.graph.lookup_valid(dep).is_some() {
                continue;
            }
            st.waiters.entry(dep.dupe()).or_default().push(key.dupe());
            outstanding += 1;
            if st.in_flight.insert(dep.dupe()) {
                if let DetectCycles::Enabled = self.detect_cycles {
                    let path = st.paths.get(key).expect("in-flight node has a path");
                    let dep_path = path.visit(dep).expect("checked above");
                    st.paths.insert(dep.dupe(), dep_path);
                }
                st.queue.push_back(dep.dupe());
            }
        }

        if outstanding == 0 {
            DepsOutcome::Ready
        } else {
            st.waiting.insert(key.dupe(), outstanding);
            self.work_available.notify_all();
            DepsOutcome::Suspended
        }
    }

    fn complete(&self, key: &DynKey) {
        let mut st = self.state.lock();
        st.in_flight.remove(key);
        st.paths.remove(key);
        self.wake_waiters(&mut st, key);
        self.work_available.notify_all();
    }

    fn complete_with_error(&self, key: &DynKey, error: WeftError) {
        let mut st = self.state.lock();
        st.errors.insert(key.dupe(), error);
        st.in_flight.remove(key);
        st.paths.remove(key);
        self.wake_waiters(&mut st, key);
        self.work_available.notify_all();
    }

    fn wake_waiters(&self, st: &mut EvalState, key: &DynKey) {
        if let Some(parents) = st.waiters.remove(key) {
            for parent in parents {
                // A parent that already failed (e.g. as a cycle member) has
                // no waiting entry left; skip it.
                if let Some(remaining) = st.waiting.get_mut(&parent) {
                    *remaining -= 1;
                    if *remaining == 0 {
                        st.waiting.remove(&parent);
                        st.queue.push_back(parent);
                    }
                }
            }
        }
    }

    /// Every worker is idle, the queue is empty, and nodes are still
    /// suspended: the waits-for graph contains a cycle that per-path
    /// detection cannot see. Fail all its participants as one failure.
    fn resolve_stalled(&self, st: &mut EvalState) {
        let cycle = match find_waits_for_cycle(st) {
            Some(cycle) => cycle,
            None => panic!("evaluation stalled without a detectable cycle"),
        };
        let error = WeftError::cycle(cycle[0].dupe(), cycle.clone());
        let members: HashSet<DynKey> = cycle.iter().duped().collect();

        for key in &cycle {
            st.errors.insert(key.dupe(), error.dupe());
            st.in_flight.remove(key);
            st.paths.remove(key);
            st.waiting.remove(key);
            if let Some(cell) = self.graph.get(key) {
                let mut data = cell.data.lock();
                data.scratch = None;
                data.pending_deps.clear();
            }
        }
        for key in &cycle {
            if let Some(parents) = st.waiters.remove(key) {
                for parent in parents {
                    if members.contains(&parent) {
                        continue;
                    }
                    if let Some(remaining) = st.waiting.get_mut(&parent) {
                        *remaining -= 1;
                        if *remaining == 0 {
                            st.waiting.remove(&parent);
                            st.queue.push_back(parent);
                        }
                    }
                }
            }
        }
        self.work_available.notify_all();
    }

    fn update_rdeps(&self, key: &DynKey, old_deps: &[DynKey], new_deps: &IndexSet<DynKey>) {
        for dep in old_deps {
            if !new_deps.contains(dep) {
                if let Some(cell) = self.graph.get(dep) {
                    cell.data.lock().rdeps.remove(key);
                }
            }
        }
        for dep in new_deps {
            let cell = self.graph.node(dep);
            cell.data.lock().rdeps.insert(key.dupe());
        }
    }

    fn clear_in_flight_scratch(&self) {
        let st = self.state.lock();
        for key in &st.in_flight {
            if let Some(cell) = self.graph.get(key) {
                let mut data = cell.data.lock();
                data.scratch = None;
                data.pending_deps.clear();
            }
        }
    }
}

/// Finds a cycle among suspended nodes, following parent -> awaited-child
/// edges. Only suspended nodes can participate: at stall time everything in
/// flight is suspended.
fn find_waits_for_cycle(st: &EvalState) -> Option<Vec<DynKey>> {
    let mut adjacency: HashMap<&DynKey, Vec<&DynKey>> = HashMap::new();
    for (child, parents) in &st.waiters {
        if !st.waiting.contains_key(child) {
            continue;
        }
        for parent in parents {
            if st.waiting.contains_key(parent) {
                adjacency.entry(parent).or_default().push(child);
            }
        }
    }

    let mut visited: HashSet<&DynKey> = HashSet::new();
    for start in st.waiting.keys() {
        if visited.contains(start) {
            continue;
        }
        visited.insert(start);
        let mut stack: Vec<(&DynKey, usize)> = vec![(start, 0)];
        let mut on_stack: IndexSet<&DynKey> = IndexSet::new();
        on_stack.insert(start);
        while let Some((node, next_child)) = stack.last_mut() {
            let children = adjacency.get(*node).map(|v| v.as_slice()).unwrap_or(&[]);
            if *next_child < children.len() {
                let child = children[*next_child];
                *next_child += 1;
                if let Some(pos) = on_stack.get_index_of(child) {
                    return Some(on_stack.iter().skip(pos).map(|k| (*k).dupe()).collect());
                }
                if visited.insert(child) {
                    on_stack.insert(child);
                    stack.push((child, 0));
                }
            } else {
                stack.pop();
                on_stack.pop();
            }
        }
    }
    None
}
