/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! An in-memory build universe for analysis tests: a mutable package
//! provider, a canned toolchain resolver, and a small JVM-flavored rule
//! registry.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dupe::Dupe;
use indexmap::IndexMap;
use parking_lot::Mutex;

use strata_core::configuration::BuildOptions;
use strata_core::configuration::Configuration;
use strata_core::configuration::FragmentKey;
use strata_core::package::PackageId;
use strata_core::result::SharedResult;
use strata_core::target::testing::TargetLabelExt;
use strata_core::target::TargetLabel;
use strata_core::target::TargetName;
use strata_core::Interners;
use strata_node::actions::Action;
use strata_node::aspect::AspectDefinition;
use strata_node::aspect::AspectImplementation;
use strata_node::attrs::attr::AttrType;
use strata_node::attrs::attr::Attribute;
use strata_node::attrs::attr::DepAttrTransition;
use strata_node::attrs::attr::DepAttrType;
use strata_node::attrs::coerced_attr::CoercedAttr;
use strata_node::attrs::configured_attr::ConfiguredAttr;
use strata_node::attrs::internal::ALIAS_ACTUAL_ATTRIBUTE_FIELD;
use strata_node::attrs::internal::TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD;
use strata_node::attrs::testing::AttributeExt;
use strata_node::compatibility::MaybeCompatible;
use strata_node::nodes::configured::ConfiguredTargetHandle;
use strata_node::nodes::unconfigured::TargetNode;
use strata_node::package::PackageError;
use strata_node::package::PackageProvider;
use strata_node::package::PackageValue;
use strata_node::provider::ConfigMatchingProvider;
use strata_node::provider::Provider;
use strata_node::provider::ProviderId;
use strata_node::provider::ProviderSet;
use strata_node::provider::ProviderStruct;
use strata_node::provider::ProviderValue;
use strata_node::rule::RuleAnalysisContext;
use strata_node::rule::RuleClass;
use strata_node::rule::RuleImplementation;
use strata_node::rule::RuleKind;
use strata_node::toolchain::ExecutionPlatform;
use strata_node::toolchain::ToolchainRequest;
use strata_node::toolchain::ToolchainResolver;
use strata_node::toolchain::ToolchainTypeId;
use strata_node::toolchain::UnloadedToolchainContext;
use strata_node::transition::AttrView;
use strata_node::transition::Transition;
use strata_node::transition::TransitionApplied;
use strata_node::transition::TransitionKey;
use strata_node::visibility::VisibilitySpec;
use weft::DetectCycles;
use weft::Evaluator;
use weft::EventSink;
use weft::WeftResult;

use crate::delegate::AnalysisDelegate;
use crate::keys::ConfiguredTargetKey;
use crate::options::AnalysisOptions;
use crate::options::ProgressReceiver;

pub(crate) const PLATFORM_FRAGMENT: &str = "platform";
pub(crate) const JVM_FRAGMENT: &str = "jvm";

#[derive(Default)]
struct TestPackages {
    packages: Mutex<HashMap<PackageId, Result<Arc<PackageValue>, String>>>,
}

impl PackageProvider for TestPackages {
    fn load(&self, id: &PackageId) -> anyhow::Result<Arc<PackageValue>> {
        match self.packages.lock().get(id) {
            Some(Ok(package)) => Ok(package.dupe()),
            Some(Err(message)) => {
                Err(PackageError::NoSuchPackage(id.clone(), message.clone()).into())
            }
            None => Err(PackageError::NoSuchPackage(id.clone(), "not found".to_owned()).into()),
        }
    }
}

struct TestToolchains {
    platform: ExecutionPlatform,
    toolchains: BTreeMap<ToolchainTypeId, TargetLabel>,
    fail_with: Mutex<Option<String>>,
}

impl ToolchainResolver for TestToolchains {
    fn resolve(&self, request: &ToolchainRequest) -> anyhow::Result<UnloadedToolchainContext> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Ok(UnloadedToolchainContext {
                execution_platform: None,
                toolchains: BTreeMap::new(),
                error_data: Some(message),
            });
        }
        let platform = match &request.forced_execution_platform {
            Some(label) => ExecutionPlatform {
                label: label.dupe(),
                cfg: self.platform.cfg.dupe(),
            },
            None => self.platform.dupe(),
        };
        let toolchains = self
            .toolchains
            .iter()
            .filter(|(ty, _)| request.toolchain_types.contains(ty))
            .map(|(ty, label)| (ty.dupe(), label.dupe()))
            .collect();
        Ok(UnloadedToolchainContext {
            execution_platform: Some(platform),
            toolchains,
            error_data: None,
        })
    }
}

/// Counts configured-target completions, for cutoff assertions.
#[derive(Default)]
pub(crate) struct CountingProgress {
    done: AtomicUsize,
}

impl CountingProgress {
    pub(crate) fn count(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }
}

impl ProgressReceiver for CountingProgress {
    fn done_configure_target(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }
}

/// Rule implementation used for `jvm_library` / `jvm_binary`: registers a
/// compile action and exposes a `JvmInfo` provider describing what it saw,
/// which is what the tests assert against.
struct JvmImpl {
    binary: bool,
    warn: bool,
}

impl RuleImplementation for JvmImpl {
    fn analyze(&self, ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet> {
        if self.warn {
            ctx.events
                .handle(weft::Event::warning(None, "deprecated rule flavor"));
        }
        let name = ctx.target.label().name().value().to_owned();

        let mut inputs = Vec::new();
        for dep in ctx.attr_deps("srcs") {
            inputs.push(dep.target.label().to_string());
        }

        let mut dep_entries = Vec::new();
        let mut dep_providers = Vec::new();
        for dep in ctx.attr_deps("deps") {
            let prefix = dep
                .transition_key
                .as_ref()
                .map(|key| format!("{}:", key))
                .unwrap_or_default();
            let cfg = dep
                .configuration
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "null".to_owned());
            dep_entries.push(format!("{}{} in {}", prefix, dep.target.label(), cfg));
            for id in dep.configured.providers().ids() {
                let id = id.to_string();
                if !dep_providers.contains(&id) {
                    dep_providers.push(id);
                }
            }
        }

        ctx.actions.register(Action {
            mnemonic: "Javac".to_owned(),
            inputs,
            outputs: vec![format!("{}.jar", name)],
        })?;

        let mut info = ProviderStruct::new();
        info.set("deps", ProviderValue::StringList(dep_entries));
        info.set("dep_providers", ProviderValue::StringList(dep_providers));
        if self.binary {
            if let Some(ConfiguredAttr::String(main_class)) = ctx.attr("main_class") {
                info.set("main_class", ProviderValue::String(main_class.clone()));
            }
        }
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(ctx.interners, "JvmInfo"),
            Provider::Struct(info),
        )?;
        Ok(providers)
    }
}

/// `config_setting`: parses `values` entries of the form
/// `fragment:option=value` and precomputes the match against its own
/// configuration (which is the parent's, by construction).
struct ConfigSettingImpl;

impl RuleImplementation for ConfigSettingImpl {
    fn analyze(&self, ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet> {
        let configuration = ctx
            .configuration
            .ok_or_else(|| anyhow::anyhow!("config_setting requires a configuration"))?;
        let mut settings = Vec::new();
        if let Some(ConfiguredAttr::List(items)) = ctx.attr("values") {
            for item in items {
                if let ConfiguredAttr::String(spec) = item {
                    let (fragment, rest) = spec
                        .split_once(':')
                        .ok_or_else(|| anyhow::anyhow!("bad setting `{}`", spec))?;
                    let (option, value) = rest
                        .split_once('=')
                        .ok_or_else(|| anyhow::anyhow!("bad setting `{}`", spec))?;
                    settings.push((
                        FragmentKey::new(ctx.interners, fragment),
                        option.to_owned(),
                        value.to_owned(),
                    ));
                }
            }
        }
        let matches = ConfigMatchingProvider::settings_match(&settings, configuration.options());
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(ctx.interners, "ConfigurationInfo"),
            Provider::ConfigMatching(ConfigMatchingProvider {
                label: ctx.target.label().dupe(),
                settings,
                matches,
            }),
        )?;
        Ok(providers)
    }
}

struct SourceImpl;

impl RuleImplementation for SourceImpl {
    fn analyze(&self, ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet> {
        let mut info = ProviderStruct::new();
        info.set(
            "path",
            ProviderValue::String(ctx.target.label().to_string()),
        );
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(ctx.interners, "FileInfo"),
            Provider::Struct(info),
        )?;
        Ok(providers)
    }
}

/// Aliases are forwarded structurally; this should never run.
struct AliasImpl;

impl RuleImplementation for AliasImpl {
    fn analyze(&self, _ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet> {
        Err(anyhow::anyhow!("alias targets are analyzed structurally"))
    }
}

struct ToolchainRuleImpl;

impl RuleImplementation for ToolchainRuleImpl {
    fn analyze(&self, ctx: &mut RuleAnalysisContext<'_>) -> anyhow::Result<ProviderSet> {
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(ctx.interners, "ToolchainInfo"),
            Provider::Struct(ProviderStruct::new()),
        )?;
        Ok(providers)
    }
}

/// The split transition of the scenarios: one branch per platform.
#[derive(Debug)]
struct PlatformSplit {
    fragment: FragmentKey,
    platforms: Vec<&'static str>,
}

impl Transition for PlatformSplit {
    fn name(&self) -> &str {
        "platform_split"
    }

    fn apply(
        &self,
        options: &BuildOptions,
        _attrs: &dyn AttrView,
    ) -> anyhow::Result<TransitionApplied> {
        let mut split = BTreeMap::new();
        for platform in &self.platforms {
            let mut branch = options.clone();
            branch.set(self.fragment.dupe(), "name", *platform);
            split.insert(TransitionKey((*platform).to_owned()), branch);
        }
        Ok(TransitionApplied::Split(split))
    }
}

/// An aspect contributing an `AspectInfo` provider to every `JvmInfo` dep.
struct CountingAspect;

impl AspectImplementation for CountingAspect {
    fn analyze(
        &self,
        target: &TargetNode,
        base_providers: &ProviderSet,
        interners: &Interners,
    ) -> anyhow::Result<ProviderSet> {
        let mut info = ProviderStruct::new();
        info.set(
            "base_provider_count",
            ProviderValue::Int(base_providers.ids().count() as i64),
        );
        info.set("on", ProviderValue::String(target.label().to_string()));
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(interners, "AspectInfo"),
            Provider::Struct(info),
        )?;
        Ok(providers)
    }
}

/// An aspect that collides with the rule's own `JvmInfo`.
struct DuplicatingAspect;

impl AspectImplementation for DuplicatingAspect {
    fn analyze(
        &self,
        _target: &TargetNode,
        _base_providers: &ProviderSet,
        interners: &Interners,
    ) -> anyhow::Result<ProviderSet> {
        let mut providers = ProviderSet::new();
        providers.insert(
            ProviderId::new(interners, "JvmInfo"),
            Provider::Struct(ProviderStruct::new()),
        )?;
        Ok(providers)
    }
}

pub(crate) struct Rules {
    pub(crate) jvm_binary: Arc<RuleClass>,
    pub(crate) jvm_library: Arc<RuleClass>,
    pub(crate) noisy_jvm_library: Arc<RuleClass>,
    pub(crate) split_jvm_binary: Arc<RuleClass>,
    pub(crate) aspected_jvm_library: Arc<RuleClass>,
    pub(crate) duplicating_jvm_library: Arc<RuleClass>,
    pub(crate) config_setting: Arc<RuleClass>,
    pub(crate) source: Arc<RuleClass>,
    pub(crate) alias: Arc<RuleClass>,
    pub(crate) jvm_toolchain: Arc<RuleClass>,
}

pub(crate) struct AnalysisFixture {
    interners: Arc<Interners>,
    packages: Arc<TestPackages>,
    toolchains: Arc<TestToolchains>,
    pub(crate) rules: Rules,
    pub(crate) progress: Arc<CountingProgress>,
}

impl AnalysisFixture {
    pub(crate) fn new() -> Self {
        let interners = Arc::new(Interners::new());
        let jvm_type = ToolchainTypeId::new(&interners, "jvm");
        let platform_label = TargetLabel::testing_parse(&interners, "//platforms:linux_exec");
        let toolchain_label = TargetLabel::testing_parse(&interners, "//toolchains:jvm");

        let platform_cfg = {
            let mut options = BuildOptions::empty();
            options.set(FragmentKey::new(&interners, PLATFORM_FRAGMENT), "name", "linux");
            Configuration::new(&interners, options)
        };

        let toolchains = Arc::new(TestToolchains {
            platform: ExecutionPlatform {
                label: platform_label,
                cfg: platform_cfg,
            },
            toolchains: [(jvm_type.dupe(), toolchain_label.dupe())].into_iter().collect(),
            fail_with: Mutex::new(None),
        });

        let rules = Rules::new(&interners, jvm_type);
        let fixture = Self {
            interners,
            packages: Arc::new(TestPackages::default()),
            toolchains,
            rules,
            progress: Arc::new(CountingProgress::default()),
        };

        // The toolchain package exists in every universe the tests build.
        let toolchain_target = fixture.target(
            &fixture.rules.jvm_toolchain.dupe(),
            "//toolchains:jvm",
            vec![],
        );
        fixture.set_package("toolchains", vec![toolchain_target]);
        fixture
    }

    pub(crate) fn interners(&self) -> Arc<Interners> {
        self.interners.dupe()
    }

    pub(crate) fn label(&self, label: &str) -> TargetLabel {
        TargetLabel::testing_parse(&self.interners, label)
    }

    /// A configuration carrying the jvm and platform fragments.
    pub(crate) fn cfg(&self, platform: &str) -> Configuration {
        let mut options = BuildOptions::empty();
        options.set(FragmentKey::new(&self.interners, JVM_FRAGMENT), "target", "17");
        options.set(
            FragmentKey::new(&self.interners, PLATFORM_FRAGMENT),
            "name",
            platform,
        );
        Configuration::new(&self.interners, options)
    }

    pub(crate) fn target(
        &self,
        rule_class: &Arc<RuleClass>,
        label: &str,
        attrs: Vec<(&str, CoercedAttr)>,
    ) -> TargetNode {
        let label = self.label(label);
        let location = format!("{}/BUILD:1", label.pkg().path());
        TargetNode::new(
            label,
            rule_class.dupe(),
            attrs
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
            VisibilitySpec::Public,
            location,
        )
    }

    pub(crate) fn source_target(&self, label: &str) -> TargetNode {
        self.target(&self.rules.source.dupe(), label, vec![])
    }

    pub(crate) fn set_package(&self, path: &str, targets: Vec<TargetNode>) {
        let id = PackageId::new(&self.interners, "", path);
        let build_file = format!("{}/BUILD", path);
        let targets: IndexMap<TargetName, TargetNode> = targets
            .into_iter()
            .map(|t| (t.label().name().dupe(), t))
            .collect();
        let package = Arc::new(PackageValue::new(id.clone(), build_file, targets));
        self.packages.packages.lock().insert(id, Ok(package));
    }

    /// A package whose build file parsed with errors but still yields its
    /// targets.
    pub(crate) fn set_package_with_errors(
        &self,
        path: &str,
        targets: Vec<TargetNode>,
        failure: &str,
    ) {
        let id = PackageId::new(&self.interners, "", path);
        let build_file = format!("{}/BUILD", path);
        let targets: IndexMap<TargetName, TargetNode> = targets
            .into_iter()
            .map(|t| (t.label().name().dupe(), t))
            .collect();
        let package =
            Arc::new(PackageValue::new(id.clone(), build_file, targets).with_errors(failure));
        self.packages.packages.lock().insert(id, Ok(package));
    }

    pub(crate) fn set_broken_package(&self, path: &str, message: &str) {
        let id = PackageId::new(&self.interners, "", path);
        self.packages
            .packages
            .lock()
            .insert(id, Err(message.to_owned()));
    }

    pub(crate) fn fail_toolchain_resolution(&self, message: &str) {
        *self.toolchains.fail_with.lock() = Some(message.to_owned());
    }

    pub(crate) fn node(&self, label: &str) -> TargetNode {
        let label = self.label(label);
        let package = self
            .packages
            .load(label.pkg())
            .expect("package must exist in the fixture");
        package
            .target(label.name())
            .expect("target must exist in the fixture")
            .dupe()
    }

    pub(crate) fn evaluator(&self) -> Evaluator {
        let delegate = AnalysisDelegate::new(
            self.interners.dupe(),
            self.packages.dupe() as Arc<dyn PackageProvider>,
            self.toolchains.dupe() as Arc<dyn ToolchainResolver>,
            AnalysisOptions {
                store_transitive_packages: true,
                debug_toolchain_resolution: None,
                toolchain_excluded_fragments: vec![FragmentKey::new(&self.interners, "flags")],
                progress: Some(self.progress.dupe() as Arc<dyn ProgressReceiver>),
            },
        );
        let mut builder = Evaluator::builder();
        builder.set(delegate);
        builder.cpu_heavy_permits(2);
        builder.unblock_cpu_work_when_fetching_deps(true);
        builder.build(DetectCycles::Enabled)
    }

    pub(crate) fn analyze(
        &self,
        txn: &weft::Transaction,
        label: &str,
        cfg: &Configuration,
    ) -> WeftResult<SharedResult<MaybeCompatible<ConfiguredTargetHandle>>> {
        txn.request(&ConfiguredTargetKey::new(
            self.label(label),
            Some(cfg.dupe()),
        ))
    }
}

impl Rules {
    fn new(interners: &Arc<Interners>, jvm_type: ToolchainTypeId) -> Self {
        let jvm_fragments = vec![
            FragmentKey::new(interners, JVM_FRAGMENT),
            FragmentKey::new(interners, PLATFORM_FRAGMENT),
        ];

        let jvm_attrs = |deps: AttrType| {
            let mut attrs: IndexMap<String, Attribute> = IndexMap::new();
            attrs.insert(
                "srcs".to_owned(),
                Attribute::testing_new(AttrType::list(AttrType::Source)),
            );
            attrs.insert("deps".to_owned(), Attribute::testing_new(deps));
            attrs.insert(
                "main_class".to_owned(),
                Attribute::testing_new(AttrType::String),
            );
            attrs.insert(
                TARGET_COMPATIBLE_WITH_ATTRIBUTE_FIELD.to_owned(),
                Attribute::testing_new(AttrType::list(AttrType::Label)),
            );
            attrs
        };
        let identity_deps = || AttrType::list(AttrType::dep(DepAttrTransition::Identity));

        let rule = |name: &str,
                    kind: RuleKind,
                    attrs: IndexMap<String, Attribute>,
                    required_fragments: Vec<FragmentKey>,
                    toolchain_types: Vec<ToolchainTypeId>,
                    use_toolchain_resolution: bool,
                    implementation: Arc<dyn RuleImplementation>| {
            Arc::new(RuleClass {
                name: name.to_owned(),
                kind,
                attrs,
                required_fragments,
                toolchain_types,
                exec_groups: Vec::new(),
                exec_compatible_with: Vec::new(),
                use_toolchain_resolution,
                implicit_deps: Vec::new(),
                implementation,
            })
        };

        let jvm_binary = rule(
            "jvm_binary",
            RuleKind::Rule,
            jvm_attrs(identity_deps()),
            jvm_fragments.clone(),
            vec![jvm_type.dupe()],
            true,
            Arc::new(JvmImpl {
                binary: true,
                warn: false,
            }),
        );
        let jvm_library = rule(
            "jvm_library",
            RuleKind::Rule,
            jvm_attrs(identity_deps()),
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(JvmImpl {
                binary: false,
                warn: false,
            }),
        );
        let noisy_jvm_library = rule(
            "noisy_jvm_library",
            RuleKind::Rule,
            jvm_attrs(identity_deps()),
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(JvmImpl {
                binary: false,
                warn: true,
            }),
        );

        let split_deps = AttrType::list(AttrType::dep(DepAttrTransition::Transition(Arc::new(
            PlatformSplit {
                fragment: FragmentKey::new(interners, PLATFORM_FRAGMENT),
                platforms: vec!["linux", "macos"],
            },
        ))));
        let split_jvm_binary = rule(
            "split_jvm_binary",
            RuleKind::Rule,
            jvm_attrs(split_deps),
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(JvmImpl {
                binary: true,
                warn: false,
            }),
        );

        let aspect_deps = |aspect: Arc<dyn AspectImplementation>,
                           name: &str,
                           required: Vec<ProviderId>| {
            AttrType::list(AttrType::Dep(DepAttrType {
                required_providers: Vec::new(),
                transition: DepAttrTransition::Identity,
                aspects: vec![Arc::new(AspectDefinition {
                    name: name.to_owned(),
                    required_providers: required,
                    implementation: aspect,
                })],
            }))
        };
        let aspected_jvm_library = rule(
            "aspected_jvm_library",
            RuleKind::Rule,
            jvm_attrs(aspect_deps(
                Arc::new(CountingAspect),
                "counting_aspect",
                vec![ProviderId::new(interners, "JvmInfo")],
            )),
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(JvmImpl {
                binary: false,
                warn: false,
            }),
        );
        let duplicating_jvm_library = rule(
            "duplicating_jvm_library",
            RuleKind::Rule,
            jvm_attrs(aspect_deps(
                Arc::new(DuplicatingAspect),
                "duplicating_aspect",
                vec![ProviderId::new(interners, "JvmInfo")],
            )),
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(JvmImpl {
                binary: false,
                warn: false,
            }),
        );

        let mut config_setting_attrs: IndexMap<String, Attribute> = IndexMap::new();
        config_setting_attrs.insert(
            "values".to_owned(),
            Attribute::testing_new(AttrType::list(AttrType::String)),
        );
        let config_setting = rule(
            "config_setting",
            RuleKind::Rule,
            config_setting_attrs,
            vec![FragmentKey::new(interners, PLATFORM_FRAGMENT)],
            Vec::new(),
            false,
            Arc::new(ConfigSettingImpl),
        );

        let source = rule(
            "source",
            RuleKind::Source,
            IndexMap::new(),
            Vec::new(),
            Vec::new(),
            false,
            Arc::new(SourceImpl),
        );

        let mut alias_attrs: IndexMap<String, Attribute> = IndexMap::new();
        alias_attrs.insert(
            ALIAS_ACTUAL_ATTRIBUTE_FIELD.to_owned(),
            Attribute::testing_new(AttrType::dep(DepAttrTransition::Identity)),
        );
        let alias = rule(
            "alias",
            RuleKind::Alias,
            alias_attrs,
            jvm_fragments.clone(),
            Vec::new(),
            false,
            Arc::new(AliasImpl),
        );

        let jvm_toolchain = rule(
            "jvm_toolchain",
            RuleKind::Rule,
            IndexMap::new(),
            jvm_fragments,
            Vec::new(),
            false,
            Arc::new(ToolchainRuleImpl),
        );

        Rules {
            jvm_binary,
            jvm_library,
            noisy_jvm_library,
            split_jvm_binary,
            aspected_jvm_library,
            duplicating_jvm_library,
            config_setting,
            source,
            alias,
            jvm_toolchain,
        }
    }
}

/// Shorthand for list-of-label dep attr values.
pub(crate) fn labels(fixture: &AnalysisFixture, labels: &[&str]) -> CoercedAttr {
    CoercedAttr::List(
        labels
            .iter()
            .map(|l| CoercedAttr::Label(fixture.label(l)))
            .collect(),
    )
}
