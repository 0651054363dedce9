/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Lock-striped intern tables.
//!
//! Labels, configurations and provider ids are content-interned so that hot
//! equality checks are pointer comparisons and hash codes are memoized at
//! interning time. Tables are instances, not statics: the embedder creates
//! an [`Interners`] at evaluator construction and passes it down explicitly,
//! which keeps tests hermetic.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::BuildHasherDefault;
use std::hash::Hash;
use std::hash::Hasher;
use std::ops::Deref;
use std::sync::Arc;

use allocative::Allocative;
use dupe::Dupe;
use fnv::FnvHasher;
use parking_lot::RwLock;

const SHARDS: usize = 64;

type Shard<T> = RwLock<HashMap<T, Arc<T>, BuildHasherDefault<FnvHasher>>>;

pub struct Interner<T> {
    shards: Vec<Shard<T>>,
}

impl<T> Interner<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::default())).collect(),
        }
    }

    fn hash_of(value: &T) -> u64 {
        let mut hasher = FnvHasher::default();
        value.hash(&mut hasher);
        hasher.finish()
    }

    pub fn intern(&self, value: T) -> Intern<T> {
        let hash = Self::hash_of(&value);
        let shard = &self.shards[(hash as usize) % SHARDS];
        {
            let read = shard.read();
            if let Some(existing) = read.get(&value) {
                return Intern {
                    data: existing.clone(),
                    hash,
                };
            }
        }
        let mut write = shard.write();
        let data = write
            .entry(value)
            .or_insert_with_key(|key| Arc::new(key.clone()))
            .clone();
        Intern { data, hash }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Interner<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A handle to an interned value.
///
/// Equality is pointer identity and the hash was memoized at interning
/// time, so both are O(1). Handles from different [`Interner`] instances
/// never compare equal, which is exactly the hermeticity the intern tables
/// exist to provide.
#[derive(Allocative)]
pub struct Intern<T> {
    data: Arc<T>,
    hash: u64,
}

impl<T> Intern<T> {
    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl<T> Deref for Intern<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> Clone for Intern<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            hash: self.hash,
        }
    }
}

impl<T> Dupe for Intern<T> {}

impl<T> PartialEq for Intern<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl<T> Eq for Intern<T> {}

impl<T> Hash for Intern<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash)
    }
}

impl<T: PartialOrd> PartialOrd for Intern<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.data.partial_cmp(&other.data)
    }
}

impl<T: Ord> Ord for Intern<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.data.cmp(&other.data)
    }
}

impl<T: Debug> Debug for Intern<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.data, f)
    }
}

impl<T: Display> Display for Intern<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.data, f)
    }
}
