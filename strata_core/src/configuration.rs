/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Build configurations.
//!
//! Options are grouped into fragments so that trimming is meaningful: a
//! dependency edge projects the parent's options onto the fragments the
//! child rule actually reads. Configurations intern their options, so two
//! equal option sets always yield the same configuration handle, and
//! configuration equality in hot paths is pointer identity.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;

use allocative::Allocative;
use dupe::Dupe;
use fnv::FnvHasher;

use crate::interner::Intern;
use crate::Interners;

/// The interned name of an option fragment type (`"cpp"`, `"jvm"`,
/// `"platform"`, ...).
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FragmentKey(Intern<String>);

impl FragmentKey {
    pub fn new(interners: &Interners, name: impl Into<String>) -> Self {
        FragmentKey(interners.fragments.intern(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The options of one fragment, as a sorted option name -> value map.
#[derive(Allocative, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FragmentOptions {
    values: BTreeMap<String, String>,
}

impl FragmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, option: &str) -> Option<&str> {
        self.values.get(option).map(String::as_str)
    }

    pub fn set(&mut self, option: impl Into<String>, value: impl Into<String>) {
        self.values.insert(option.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An immutable mapping from fragment type to fragment options. Two
/// `BuildOptions` are equal iff their fragment sets are equal element-wise.
#[derive(Allocative, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct BuildOptions {
    fragments: BTreeMap<FragmentKey, FragmentOptions>,
}

impl BuildOptions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn fragment(&self, key: &FragmentKey) -> Option<&FragmentOptions> {
        self.fragments.get(key)
    }

    pub fn has_fragment(&self, key: &FragmentKey) -> bool {
        self.fragments.contains_key(key)
    }

    pub fn fragment_keys(&self) -> impl Iterator<Item = &FragmentKey> {
        self.fragments.keys()
    }

    pub fn get(&self, fragment: &FragmentKey, option: &str) -> Option<&str> {
        self.fragments.get(fragment).and_then(|f| f.get(option))
    }

    pub fn set(&mut self, fragment: FragmentKey, option: impl Into<String>, value: impl Into<String>) {
        self.fragments.entry(fragment).or_default().set(option, value)
    }

    pub fn insert_fragment(&mut self, key: FragmentKey, options: FragmentOptions) {
        self.fragments.insert(key, options);
    }

    /// Projects onto the given fragments, dropping everything else. This is
    /// the trimming operation of the configuration resolver.
    pub fn project(&self, fragments: &BTreeSet<FragmentKey>) -> BuildOptions {
        BuildOptions {
            fragments: self
                .fragments
                .iter()
                .filter(|(key, _)| fragments.contains(key))
                .map(|(key, options)| (key.dupe(), options.clone()))
                .collect(),
        }
    }

    /// The complement of [`project`](Self::project): the fragments *not* in
    /// the given set. Used to state the trimming law in tests.
    pub fn project_out(&self, fragments: &BTreeSet<FragmentKey>) -> BuildOptions {
        BuildOptions {
            fragments: self
                .fragments
                .iter()
                .filter(|(key, _)| !fragments.contains(key))
                .map(|(key, options)| (key.dupe(), options.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn content_hash(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Allocative, Debug, Eq, PartialEq, Hash, Clone)]
pub struct ConfigurationData {
    options: BuildOptions,
    event_id: String,
}

/// An interned configuration: build options plus a memoized hash and an
/// event id for diagnostics. The interned handle doubles as the
/// configuration key: equal options always produce the same handle.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash)]
pub struct Configuration(Intern<ConfigurationData>);

/// In the data model the configuration key is the interned options hash;
/// with in-process interning the handle itself is that key.
pub type ConfigurationKey = Configuration;

impl Configuration {
    pub fn new(interners: &Interners, options: BuildOptions) -> Self {
        let event_id = format!("{:016x}", options.content_hash());
        Configuration(interners.configurations.intern(ConfigurationData { options, event_id }))
    }

    /// The empty configuration, used where no options apply.
    pub fn unspecified(interners: &Interners) -> Self {
        Self::new(interners, BuildOptions::empty())
    }

    pub fn options(&self) -> &BuildOptions {
        &self.0.options
    }

    pub fn event_id(&self) -> &str {
        &self.0.event_id
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cfg:{}", &self.0.event_id[..12])
    }
}

pub mod testing {
    use crate::configuration::BuildOptions;
    use crate::configuration::Configuration;
    use crate::configuration::FragmentKey;
    use crate::Interners;

    pub trait ConfigurationExt {
        /// A configuration with a single `platform` fragment, for tests.
        fn testing_new(interners: &Interners, platform: &str) -> Configuration;
    }

    impl ConfigurationExt for Configuration {
        fn testing_new(interners: &Interners, platform: &str) -> Configuration {
            let mut options = BuildOptions::empty();
            options.set(FragmentKey::new(interners, "platform"), "name", platform);
            Configuration::new(interners, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::configuration::BuildOptions;
    use crate::configuration::Configuration;
    use crate::configuration::FragmentKey;
    use crate::Interners;

    fn options(interners: &Interners, entries: &[(&str, &str, &str)]) -> BuildOptions {
        let mut options = BuildOptions::empty();
        for (fragment, key, value) in entries {
            options.set(FragmentKey::new(interners, *fragment), *key, *value);
        }
        options
    }

    #[test]
    fn equal_options_intern_to_the_same_configuration() {
        let interners = Interners::new();
        let a = Configuration::new(&interners, options(&interners, &[("cpp", "opt", "3")]));
        let b = Configuration::new(&interners, options(&interners, &[("cpp", "opt", "3")]));
        let c = Configuration::new(&interners, options(&interners, &[("cpp", "opt", "2")]));
        assert_eq!(a, b);
        assert_eq!(a.event_id(), b.event_id());
        assert_ne!(a, c);
    }

    #[test]
    fn projection_trims_fragments() {
        let interners = Interners::new();
        let opts = options(
            &interners,
            &[("cpp", "opt", "3"), ("jvm", "target", "17"), ("platform", "name", "linux")],
        );
        let keep: BTreeSet<_> = [FragmentKey::new(&interners, "cpp")].into_iter().collect();
        let trimmed = opts.project(&keep);
        assert!(trimmed.has_fragment(&FragmentKey::new(&interners, "cpp")));
        assert!(!trimmed.has_fragment(&FragmentKey::new(&interners, "jvm")));
        let rest = opts.project_out(&keep);
        assert!(!rest.has_fragment(&FragmentKey::new(&interners, "cpp")));
        assert!(rest.has_fragment(&FragmentKey::new(&interners, "jvm")));
    }
}
