/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Registered actions.
//!
//! Actions are opaque to the analysis core: it only records them against
//! their owning configured target and rejects two actions claiming the same
//! output.

use allocative::Allocative;
use thiserror::Error;

use strata_core::target::ConfiguredTargetLabel;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("two actions of `{owner}` produce the same output `{output}` ({first} and {second})")]
    ConflictingOutputs {
        owner: ConfiguredTargetLabel,
        output: String,
        first: String,
        second: String,
    },
}

#[derive(Allocative, Clone, Debug, Eq, PartialEq)]
pub struct Action {
    pub mnemonic: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Collects the actions one rule implementation registers, detecting
/// output conflicts as they are added.
#[derive(Allocative, Debug)]
pub struct ActionRegistry {
    owner: ConfiguredTargetLabel,
    actions: Vec<Action>,
}

impl ActionRegistry {
    pub fn new(owner: ConfiguredTargetLabel) -> Self {
        Self {
            owner,
            actions: Vec::new(),
        }
    }

    pub fn owner(&self) -> &ConfiguredTargetLabel {
        &self.owner
    }

    pub fn register(&mut self, action: Action) -> anyhow::Result<()> {
        for output in &action.outputs {
            if let Some(existing) = self
                .actions
                .iter()
                .find(|a| a.outputs.contains(output))
            {
                return Err(ActionError::ConflictingOutputs {
                    owner: self.owner.clone(),
                    output: output.clone(),
                    first: existing.mnemonic.clone(),
                    second: action.mnemonic.clone(),
                }
                .into());
            }
        }
        self.actions.push(action);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn finalize(self) -> Vec<Action> {
        self.actions
    }
}

#[cfg(test)]
mod tests {
    use strata_core::configuration::testing::ConfigurationExt;
    use strata_core::configuration::Configuration;
    use strata_core::target::testing::TargetLabelExt;
    use strata_core::target::TargetLabel;
    use strata_core::Interners;

    use crate::actions::Action;
    use crate::actions::ActionRegistry;

    #[test]
    fn conflicting_outputs_are_rejected() {
        let interners = Interners::new();
        let owner = TargetLabel::testing_parse(&interners, "//a:bin")
            .configure(Configuration::testing_new(&interners, "linux"));
        let mut registry = ActionRegistry::new(owner);
        registry
            .register(Action {
                mnemonic: "Javac".to_owned(),
                inputs: vec!["Foo.java".to_owned()],
                outputs: vec!["Foo.class".to_owned()],
            })
            .unwrap();
        let e = registry
            .register(Action {
                mnemonic: "Copy".to_owned(),
                inputs: vec![],
                outputs: vec!["Foo.class".to_owned()],
            })
            .unwrap_err();
        assert!(e.to_string().contains("same output"));
    }
}
