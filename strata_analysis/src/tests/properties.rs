/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Property tests beyond the literal scenarios: alias resolution,
//! incompatibility propagation, aspect merging, early cutoff, event
//! replay, and the failure catalog.

use std::sync::Arc;

use dupe::Dupe;

use strata_core::causes::FailureKind;
use strata_core::result::SharedResult;
use strata_node::attrs::coerced_attr::CoercedAttr;
use strata_node::compatibility::IncompatiblePlatformReasonCause;
use strata_node::compatibility::MaybeCompatible;
use strata_node::nodes::configured::ConfiguredTargetHandle;
use strata_node::nodes::configured::ConfiguredTargetKind;
use strata_node::provider::Provider;
use strata_node::provider::ProviderId;
use strata_node::provider::ProviderValue;
use weft::EventKind;
use weft::StoredEvents;

use crate::error::as_creation_error;
use crate::keys::ConfiguredTargetKey;
use crate::keys::PackageKey;
use crate::tests::fixtures::labels;
use crate::tests::fixtures::AnalysisFixture;

fn compatible(value: SharedResult<MaybeCompatible<ConfiguredTargetHandle>>) -> ConfiguredTargetHandle {
    match value.expect("expected a successful analysis") {
        MaybeCompatible::Compatible(handle) => handle,
        MaybeCompatible::Incompatible(reason) => panic!("unexpectedly incompatible: {}", reason),
    }
}

fn incompatible(
    value: SharedResult<MaybeCompatible<ConfiguredTargetHandle>>,
) -> Arc<strata_node::compatibility::IncompatiblePlatformReason> {
    match value.expect("expected a successful analysis") {
        MaybeCompatible::Incompatible(reason) => reason,
        MaybeCompatible::Compatible(handle) => {
            panic!("unexpectedly compatible: {}", handle.label())
        }
    }
}

fn jvm_string_list(
    fixture: &AnalysisFixture,
    handle: &ConfiguredTargetHandle,
    field: &str,
) -> Vec<String> {
    let id = ProviderId::new(&fixture.interners(), "JvmInfo");
    match handle.providers().get(&id) {
        Some(Provider::Struct(info)) => match info.get(field) {
            Some(ProviderValue::StringList(values)) => values.clone(),
            other => panic!("unexpected {} field: {:?}", field, other),
        },
        _ => panic!("missing JvmInfo provider"),
    }
}

/// Property 7: an alias pointing into a package outside the parent's
/// expected set still resolves to its underlying target in the dep map.
#[test]
fn alias_underlying_target_appears_via_the_second_package_pass() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let real = fixture.target(&fixture.rules.jvm_library.dupe(), "//other:real", vec![]);
    fixture.set_package("other", vec![real]);
    let alias = fixture.target(
        &fixture.rules.alias.dupe(),
        "//a:al",
        vec![(
            "actual",
            CoercedAttr::Label(fixture.label("//other:real")),
        )],
    );
    fixture.set_package("a", vec![alias]);
    let top = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//top:bin",
        vec![("deps", labels(&fixture, &["//a:al"]))],
    );
    fixture.set_package("top", vec![top]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let handle = compatible(fixture.analyze(&txn, "//top:bin", &fixture.cfg("linux"))?);

    // The dep entry's target is the alias's underlying target, whose
    // package (`//other`) was not in the parent-expected set.
    let deps = jvm_string_list(&fixture, &handle, "deps");
    assert!(
        deps.iter().any(|d| d.contains("//other:real")),
        "got: {:?}",
        deps
    );
    Ok(())
}

/// Property 8, direct flavor: an unsatisfied `target_compatible_with`
/// constraint makes the target incompatible.
#[test]
fn direct_incompatibility_short_circuits() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let never = fixture.target(
        &fixture.rules.config_setting.dupe(),
        "//a:never",
        vec![(
            "values",
            CoercedAttr::List(vec![CoercedAttr::String(
                "platform:name=macos".to_owned(),
            )]),
        )],
    );
    let lib = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//a:lib",
        vec![(
            "target_compatible_with",
            labels(&fixture, &["//a:never"]),
        )],
    );
    fixture.set_package("a", vec![lib, never]);

    let evaluator = fixture.evaluator();
    let mut txn = evaluator.updater().commit();
    let sink = Arc::new(StoredEvents::new());
    txn.set_event_sink(sink.clone());

    let reason = incompatible(fixture.analyze(&txn, "//a:lib", &fixture.cfg("linux"))?);
    match &reason.cause {
        IncompatiblePlatformReasonCause::UnsatisfiedConfig(label) => {
            assert_eq!("//a:never", label.to_string());
        }
        other => panic!("unexpected cause: {:?}", other),
    }

    // The skip is surfaced to the user as a warning, not an error.
    let skips: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| {
            e.kind == EventKind::Warning
                && e.message.contains("Skipping target incompatible node")
        })
        .collect();
    assert_eq!(1, skips.len(), "got: {:?}", skips);
    assert!(skips[0].message.contains("//a:lib"));
    Ok(())
}

/// Property 8, indirect flavor: a required incompatible dependency makes
/// the parent incompatible too.
#[test]
fn indirect_incompatibility_propagates() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let never = fixture.target(
        &fixture.rules.config_setting.dupe(),
        "//a:never",
        vec![(
            "values",
            CoercedAttr::List(vec![CoercedAttr::String(
                "platform:name=macos".to_owned(),
            )]),
        )],
    );
    let leaf = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//a:leaf",
        vec![(
            "target_compatible_with",
            labels(&fixture, &["//a:never"]),
        )],
    );
    let top = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//a:top",
        vec![("deps", labels(&fixture, &["//a:leaf"]))],
    );
    fixture.set_package("a", vec![top, leaf, never]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let reason = incompatible(fixture.analyze(&txn, "//a:top", &fixture.cfg("linux"))?);
    assert!(matches!(
        reason.cause,
        IncompatiblePlatformReasonCause::Dependency(..)
    ));
    assert!(reason.to_string().contains("//a:leaf"));
    Ok(())
}

/// Invariant 2: a configurability mismatch yields an empty configured
/// target with no providers and no actions.
#[test]
fn configurability_mismatch_yields_an_empty_target() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let lib = fixture.target(&fixture.rules.jvm_library.dupe(), "//a:lib", vec![]);
    let src = fixture.source_target("//a:file.java");
    fixture.set_package("a", vec![lib, src]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();

    // Configurable target with a null configuration.
    let value = txn.request(&ConfiguredTargetKey::new(fixture.label("//a:lib"), None))?;
    let handle = compatible(value);
    assert_eq!(ConfiguredTargetKind::Empty, handle.kind());
    assert!(handle.providers().is_empty());
    assert!(handle.actions().is_empty());

    // Non-configurable target with a configuration.
    let value = fixture.analyze(&txn, "//a:file.java", &fixture.cfg("linux"))?;
    let handle = compatible(value);
    assert_eq!(ConfiguredTargetKind::Empty, handle.kind());
    Ok(())
}

/// Aspects with satisfied required providers contribute their providers to
/// the dependency's set.
#[test]
fn aspects_merge_providers_into_dependencies() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let x = fixture.target(&fixture.rules.jvm_library.dupe(), "//a:x", vec![]);
    let top = fixture.target(
        &fixture.rules.aspected_jvm_library.dupe(),
        "//a:top",
        vec![("deps", labels(&fixture, &["//a:x"]))],
    );
    fixture.set_package("a", vec![top, x]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let handle = compatible(fixture.analyze(&txn, "//a:top", &fixture.cfg("linux"))?);
    let dep_providers = jvm_string_list(&fixture, &handle, "dep_providers");
    assert!(
        dep_providers.contains(&"AspectInfo".to_owned()),
        "got: {:?}",
        dep_providers
    );
    assert!(dep_providers.contains(&"JvmInfo".to_owned()));
    Ok(())
}

/// Two contributors of one provider id fail with a duplicate-provider
/// error.
#[test]
fn duplicate_providers_from_aspects_fail() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let x = fixture.target(&fixture.rules.jvm_library.dupe(), "//a:x", vec![]);
    let top = fixture.target(
        &fixture.rules.duplicating_jvm_library.dupe(),
        "//a:top",
        vec![("deps", labels(&fixture, &["//a:x"]))],
    );
    fixture.set_package("a", vec![top, x]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let error = fixture
        .analyze(&txn, "//a:top", &fixture.cfg("linux"))?
        .expect_err("duplicate provider must fail");
    let creation = as_creation_error(&error).expect("structured analysis error");
    assert_eq!(FailureKind::DuplicateProvider, creation.kind);
    Ok(())
}

/// A `select()` key whose target is not a valid condition fails with
/// `ConfigConditionsFailed`.
#[test]
fn invalid_select_condition_fails() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let not_a_condition = fixture.target(&fixture.rules.jvm_library.dupe(), "//a:plain", vec![]);
    let lib = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//a:lib",
        vec![(
            "deps",
            CoercedAttr::Select {
                entries: vec![(fixture.label("//a:plain"), labels(&fixture, &[]))],
                default: Some(Box::new(labels(&fixture, &[]))),
            },
        )],
    );
    fixture.set_package("a", vec![lib, not_a_condition]);

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let error = fixture
        .analyze(&txn, "//a:lib", &fixture.cfg("linux"))?
        .expect_err("invalid condition must fail");
    let creation = as_creation_error(&error).expect("structured analysis error");
    assert_eq!(FailureKind::ConfigConditionsFailed, creation.kind);
    assert!(creation.message.contains("not a valid select() condition"));
    Ok(())
}

/// The toolchain resolver finding no platform surfaces as
/// `NoMatchingExecutionPlatform`.
#[test]
fn no_matching_execution_platform_is_reported() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let bin = fixture.target(&fixture.rules.jvm_binary.dupe(), "//a:bin", vec![]);
    fixture.set_package("a", vec![bin]);
    fixture.fail_toolchain_resolution("no execution platform satisfies the constraints");

    let evaluator = fixture.evaluator();
    let txn = evaluator.updater().commit();
    let error = fixture
        .analyze(&txn, "//a:bin", &fixture.cfg("linux"))?
        .expect_err("toolchain resolution must fail");
    let creation = as_creation_error(&error).expect("structured analysis error");
    assert_eq!(FailureKind::NoMatchingExecutionPlatform, creation.kind);
    Ok(())
}

/// Property 2 at the analysis level: invalidating a leaf package with
/// equivalent contents recomputes the leaf (and its direct dependents,
/// whose package dep changed by identity), but content-equal results stop
/// the wave there.
#[test]
fn early_cutoff_stops_the_recomputation_wave() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let make_leaf = || {
        vec![fixture.target(&fixture.rules.jvm_library.dupe(), "//leaf:leaf", vec![])]
    };
    fixture.set_package("leaf", make_leaf());
    let mid = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//mid:mid",
        vec![("deps", labels(&fixture, &["//leaf:leaf"]))],
    );
    fixture.set_package("mid", vec![mid]);
    let top = fixture.target(
        &fixture.rules.jvm_library.dupe(),
        "//top:top",
        vec![("deps", labels(&fixture, &["//mid:mid"]))],
    );
    fixture.set_package("top", vec![top]);

    let evaluator = fixture.evaluator();
    let cfg = fixture.cfg("linux");
    compatible(fixture.analyze(&evaluator.updater().commit(), "//top:top", &cfg)?);
    let after_build = fixture.progress.count();
    assert_eq!(3, after_build);

    // Reload the leaf package with equal content (a fresh instance).
    fixture.set_package("leaf", make_leaf());
    let mut updater = evaluator.updater();
    updater.changed(vec![PackageKey(fixture.label("//leaf:leaf").pkg().dupe())]);
    let txn = updater.commit();
    compatible(fixture.analyze(&txn, "//top:top", &cfg)?);

    // The leaf and its direct dependent re-ran; the top verified clean by
    // version stamps without re-executing.
    assert_eq!(after_build + 2, fixture.progress.count());
    Ok(())
}

/// Property 4: events buffered across restarts are observed exactly once
/// on the successful completion.
#[test]
fn rule_events_are_observed_exactly_once() -> anyhow::Result<()> {
    let fixture = AnalysisFixture::new();
    let dep = fixture.target(&fixture.rules.jvm_library.dupe(), "//a:dep", vec![]);
    let noisy = fixture.target(
        &fixture.rules.noisy_jvm_library.dupe(),
        "//a:noisy",
        vec![("deps", labels(&fixture, &["//a:dep"]))],
    );
    fixture.set_package("a", vec![noisy, dep]);

    let evaluator = fixture.evaluator();
    let mut txn = evaluator.updater().commit();
    let sink = Arc::new(StoredEvents::new());
    txn.set_event_sink(sink.clone());

    compatible(fixture.analyze(&txn, "//a:noisy", &fixture.cfg("linux"))?);
    let warnings: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|e| e.kind == EventKind::Warning)
        .collect();
    assert_eq!(1, warnings.len(), "got: {:?}", warnings);
    assert_eq!("deprecated rule flavor", warnings[0].message);
    Ok(())
}
