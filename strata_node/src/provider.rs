/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Providers: named bags of data a rule exposes to its consumers.
//!
//! The provider set is an open mapping from interned provider id to
//! provider; built-in providers that the analysis core itself inspects are
//! tagged variants, everything else is an opaque struct of fields. Merging
//! two sets fails on a duplicate id, which is how aspect collisions are
//! detected.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Display;

use allocative::Allocative;
use dupe::Dupe;
use thiserror::Error;

use strata_core::configuration::BuildOptions;
use strata_core::configuration::FragmentKey;
use strata_core::interner::Intern;
use strata_core::target::TargetLabel;
use strata_core::Interners;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider `{0}` provided twice")]
    DuplicateProvider(ProviderId),
}

/// An interned provider name.
#[derive(Allocative, Clone, Dupe, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ProviderId(Intern<String>);

impl ProviderId {
    pub fn new(interners: &Interners, name: impl Into<String>) -> Self {
        ProviderId(interners.providers.intern(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub enum ProviderValue {
    Bool(bool),
    Int(i64),
    String(String),
    StringList(Vec<String>),
    Label(TargetLabel),
}

/// An open struct of fields, for providers the core does not interpret.
#[derive(Allocative, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProviderStruct {
    fields: BTreeMap<String, ProviderValue>,
}

impl ProviderStruct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: ProviderValue) -> &mut Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&ProviderValue> {
        self.fields.get(field)
    }
}

/// Answers "does this target's configuration match me?". Produced by
/// config-setting rules, evaluated in the configuration of the target whose
/// `select()` references them, so the match result is precomputed.
#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub struct ConfigMatchingProvider {
    pub label: TargetLabel,
    pub settings: Vec<(FragmentKey, String, String)>,
    pub matches: bool,
}

impl ConfigMatchingProvider {
    /// Whether `options` satisfies every required setting. Used by the
    /// config-setting rule implementation to precompute `matches`.
    pub fn settings_match(settings: &[(FragmentKey, String, String)], options: &BuildOptions) -> bool {
        settings
            .iter()
            .all(|(fragment, option, expected)| options.get(fragment, option) == Some(expected))
    }
}

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub enum Provider {
    ConfigMatching(ConfigMatchingProvider),
    Struct(ProviderStruct),
}

/// The open provider map of a configured target.
#[derive(Allocative, Clone, Debug, Default, Eq, PartialEq)]
pub struct ProviderSet {
    providers: BTreeMap<ProviderId, Provider>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ProviderId, provider: Provider) -> anyhow::Result<()> {
        if self.providers.contains_key(&id) {
            return Err(ProviderError::DuplicateProvider(id).into());
        }
        self.providers.insert(id, provider);
        Ok(())
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.providers.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// The config-matching provider, if this target is a valid `select()`
    /// condition.
    pub fn config_matching(&self) -> Option<&ConfigMatchingProvider> {
        self.providers.values().find_map(|p| match p {
            Provider::ConfigMatching(provider) => Some(provider),
            Provider::Struct(..) => None,
        })
    }

    /// Merges `other` into this set, failing on a duplicate provider id.
    pub fn merge(&mut self, other: &ProviderSet) -> anyhow::Result<()> {
        for (id, provider) in &other.providers {
            self.insert(id.dupe(), provider.clone())?;
        }
        Ok(())
    }
}

/// The resolved `select()` conditions of one target: condition label to the
/// provider its configured target exposed.
#[derive(Allocative, Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigConditions {
    conditions: BTreeMap<TargetLabel, ConfigMatchingProvider>,
}

impl ConfigConditions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: TargetLabel, provider: ConfigMatchingProvider) {
        self.conditions.insert(label, provider);
    }

    pub fn get(&self, label: &TargetLabel) -> Option<&ConfigMatchingProvider> {
        self.conditions.get(label)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use strata_core::Interners;

    use crate::provider::Provider;
    use crate::provider::ProviderId;
    use crate::provider::ProviderSet;
    use crate::provider::ProviderStruct;

    #[test]
    fn merge_detects_duplicates() {
        let interners = Interners::new();
        let id = ProviderId::new(&interners, "JvmInfo");

        let mut a = ProviderSet::new();
        a.insert(id.clone(), Provider::Struct(ProviderStruct::new()))
            .unwrap();
        let mut b = ProviderSet::new();
        b.insert(id.clone(), Provider::Struct(ProviderStruct::new()))
            .unwrap();

        let e = a.merge(&b).unwrap_err();
        assert!(e.to_string().contains("provided twice"));
    }
}
