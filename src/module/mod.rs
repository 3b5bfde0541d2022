//! In-memory model of one bundle module.

mod configs;
mod entry;
mod metadata;

pub use configs::{
    ApexImages, Assets, AssetsDirectoryTargeting, NativeLibraries, RuntimeEnabledSdk, RuntimeEnabledSdkConfig,
    TargetedApexImage, TargetedAssetsDirectory, TargetedNativeDirectory,
};
pub use entry::{ByteSource, InMemoryByteSource, ModuleEntry};
pub use metadata::{ModuleMetadata, RuntimeEnabledSdkDependency};

use crate::config::BundleContext;
use crate::error::BundleResult;
use crate::manifest::{AndroidManifest, ManifestDeliveryElement, ModuleType};
use crate::path::ZipPath;
use crate::resources::ResourceTable;
use crate::targeting::ModuleTargeting;
use crate::xml::values::is_identifier;
use configs::{decode_config, encode_config};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BASE_MODULE_NAME: &str = "base";

pub const MANIFEST_PATH: &str = "manifest/AndroidManifest.xml";
pub const ASSETS_CONFIG_PATH: &str = "assets.pb";
pub const NATIVE_CONFIG_PATH: &str = "native.pb";
pub const RESOURCE_TABLE_PATH: &str = "resources.pb";
pub const APEX_CONFIG_PATH: &str = "apex.pb";
pub const RUNTIME_ENABLED_SDK_CONFIG_PATH: &str = "runtime_enabled_sdk_config.pb";

/// Paths whose content is parsed into a typed field instead of kept as an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpecialEntry {
    Manifest,
    Assets,
    Native,
    ResourceTable,
    Apex,
    RuntimeEnabledSdk,
}

impl SpecialEntry {
    fn for_path(path: &ZipPath) -> Option<SpecialEntry> {
        let special = match path.to_string().as_str() {
            MANIFEST_PATH => SpecialEntry::Manifest,
            ASSETS_CONFIG_PATH => SpecialEntry::Assets,
            NATIVE_CONFIG_PATH => SpecialEntry::Native,
            RESOURCE_TABLE_PATH => SpecialEntry::ResourceTable,
            APEX_CONFIG_PATH => SpecialEntry::Apex,
            RUNTIME_ENABLED_SDK_CONFIG_PATH => SpecialEntry::RuntimeEnabledSdk,
            _ => return None,
        };
        Some(special)
    }
}

/// When a module is installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleDeliveryType {
    AlwaysInitialInstall,
    ConditionalInitialInstall,
    NoInitialInstall,
}

/// A module: its manifest, typed configs, and every other file keyed by path.
#[derive(Clone, Debug)]
pub struct BundleModule {
    name: String,
    context: BundleContext,
    entries: BTreeMap<ZipPath, ModuleEntry>,
    manifest: AndroidManifest,
    resource_table: Option<ResourceTable>,
    native_config: Option<NativeLibraries>,
    assets_config: Option<Assets>,
    apex_config: Option<ApexImages>,
    runtime_enabled_sdk_config: Option<RuntimeEnabledSdkConfig>,
}

impl BundleModule {
    pub fn builder(name: impl Into<String>, context: BundleContext) -> BundleModuleBuilder {
        BundleModuleBuilder {
            name: name.into(),
            context,
            entries: BTreeMap::new(),
            manifest: None,
            resource_table: None,
            native_config: None,
            assets_config: None,
            apex_config: None,
            runtime_enabled_sdk_config: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &BundleContext {
        &self.context
    }

    pub fn manifest(&self) -> &AndroidManifest {
        &self.manifest
    }

    pub fn resource_table(&self) -> Option<&ResourceTable> {
        self.resource_table.as_ref()
    }

    pub fn native_config(&self) -> Option<&NativeLibraries> {
        self.native_config.as_ref()
    }

    pub fn assets_config(&self) -> Option<&Assets> {
        self.assets_config.as_ref()
    }

    pub fn apex_config(&self) -> Option<&ApexImages> {
        self.apex_config.as_ref()
    }

    pub fn runtime_enabled_sdk_config(&self) -> Option<&RuntimeEnabledSdkConfig> {
        self.runtime_enabled_sdk_config.as_ref()
    }

    /// Generic entries, in path order. Well-known config paths are never included.
    pub fn entries(&self) -> impl Iterator<Item = &ModuleEntry> {
        self.entries.values()
    }

    pub fn entry(&self, path: &ZipPath) -> Option<&ModuleEntry> {
        self.entries.get(path)
    }

    pub fn find_entries<'a>(
        &'a self,
        predicate: impl Fn(&ZipPath) -> bool + 'a,
    ) -> impl Iterator<Item = &'a ModuleEntry> + 'a {
        self.entries.values().filter(move |entry| predicate(entry.path()))
    }

    /// Entries under `prefix`, compared segment by segment.
    pub fn find_entries_under_path<'a>(&'a self, prefix: &'a ZipPath) -> impl Iterator<Item = &'a ModuleEntry> + 'a {
        self.find_entries(move |path| path.starts_with(prefix))
    }

    /// Asset-only bundles have no base module, whatever their modules are called.
    pub fn is_base_module(&self) -> bool {
        !self.context.is_asset_only() && self.name == BASE_MODULE_NAME
    }

    pub fn module_type(&self) -> BundleResult<ModuleType> {
        self.manifest.module_type()
    }

    pub fn delivery_element(&self) -> BundleResult<Option<ManifestDeliveryElement>> {
        self.manifest
            .manifest_delivery_element(self.context.is_fast_follow_enabled())
    }

    pub fn delivery_type(&self) -> BundleResult<ModuleDeliveryType> {
        if self.is_base_module() {
            return Ok(ModuleDeliveryType::AlwaysInitialInstall);
        }
        let Some(delivery) = self.delivery_element()? else {
            return match self.manifest.on_demand_attribute()? {
                Some(true) => Ok(ModuleDeliveryType::NoInitialInstall),
                _ => Ok(ModuleDeliveryType::AlwaysInitialInstall),
            };
        };
        if !delivery.is_well_formed() {
            fail!(
                InvalidBundle,
                "The '<dist:delivery>' element of module '{}' declares no delivery mode.",
                self.name
            );
        }
        if delivery.has_module_conditions() {
            Ok(ModuleDeliveryType::ConditionalInitialInstall)
        } else if delivery.has_install_time_element() {
            Ok(ModuleDeliveryType::AlwaysInitialInstall)
        } else {
            Ok(ModuleDeliveryType::NoInitialInstall)
        }
    }

    /// Targeting from the install-time conditions. Without conditions the
    /// targeting is empty; with conditions but no `<dist:min-sdk>`, the
    /// manifest `minSdkVersion` is used as the minimum.
    pub fn module_targeting(&self) -> BundleResult<ModuleTargeting> {
        let Some(delivery) = self.delivery_element()? else {
            return Ok(ModuleTargeting::default());
        };
        if !delivery.has_module_conditions() {
            return Ok(ModuleTargeting::default());
        }
        let mut targeting = delivery.module_conditions()?.to_targeting();
        if targeting.min_sdk_version.is_none() {
            targeting.min_sdk_version = self.manifest.min_sdk_version()?;
        }
        Ok(targeting)
    }

    /// Derived metadata. Runtime-enabled SDK dependencies are reported only
    /// for the SDK-runtime variant.
    pub fn module_metadata(&self, is_sdk_runtime_variant: bool) -> BundleResult<ModuleMetadata> {
        let runtime_enabled_sdk_dependencies = match (&self.runtime_enabled_sdk_config, is_sdk_runtime_variant) {
            (Some(config), true) => config
                .runtime_enabled_sdks
                .iter()
                .map(|sdk| RuntimeEnabledSdkDependency {
                    package_name: sdk.package_name.clone(),
                    major_version: sdk.version_major,
                    minor_version: sdk.version_minor,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(ModuleMetadata {
            name: self.name.clone(),
            module_type: self.module_type()?,
            delivery_type: self.delivery_type()?,
            is_instant: self.manifest.is_instant_module()?,
            dependencies: self.manifest.uses_splits()?.into_iter().collect(),
            targeting: self.module_targeting()?,
            runtime_enabled_sdk_dependencies,
        })
    }

    /// Same module with its resource package id set to `package_id`, and every
    /// XML reference into the old package rewritten.
    pub fn remap_package_id(&self, package_id: u32) -> BundleResult<BundleModule> {
        crate::resources::remap_module_package_id(self, package_id)
    }

    /// Bytes of each typed config, keyed by its well-known path.
    pub fn config_entries(&self) -> BundleResult<Vec<ModuleEntry>> {
        let mut out = vec![entry_at(MANIFEST_PATH, self.manifest.to_bytes()?)?];
        if let Some(table) = &self.resource_table {
            out.push(entry_at(RESOURCE_TABLE_PATH, table.to_bytes()?)?);
        }
        if let Some(config) = &self.native_config {
            out.push(entry_at(NATIVE_CONFIG_PATH, encode_config(config)?)?);
        }
        if let Some(config) = &self.assets_config {
            out.push(entry_at(ASSETS_CONFIG_PATH, encode_config(config)?)?);
        }
        if let Some(config) = &self.apex_config {
            out.push(entry_at(APEX_CONFIG_PATH, encode_config(config)?)?);
        }
        if let Some(config) = &self.runtime_enabled_sdk_config {
            out.push(entry_at(RUNTIME_ENABLED_SDK_CONFIG_PATH, encode_config(config)?)?);
        }
        Ok(out)
    }

    pub fn to_builder(&self) -> BundleModuleBuilder {
        BundleModuleBuilder {
            name: self.name.clone(),
            context: self.context.clone(),
            entries: self.entries.clone(),
            manifest: Some(self.manifest.clone()),
            resource_table: self.resource_table.clone(),
            native_config: self.native_config.clone(),
            assets_config: self.assets_config.clone(),
            apex_config: self.apex_config.clone(),
            runtime_enabled_sdk_config: self.runtime_enabled_sdk_config.clone(),
        }
    }
}

fn entry_at(path: &str, bytes: Vec<u8>) -> BundleResult<ModuleEntry> {
    Ok(ModuleEntry::from_bytes(ZipPath::create(path)?, bytes))
}

/// Collects entries and configs for a [`BundleModule`].
#[derive(Clone, Debug)]
pub struct BundleModuleBuilder {
    name: String,
    context: BundleContext,
    entries: BTreeMap<ZipPath, ModuleEntry>,
    manifest: Option<AndroidManifest>,
    resource_table: Option<ResourceTable>,
    native_config: Option<NativeLibraries>,
    assets_config: Option<Assets>,
    apex_config: Option<ApexImages>,
    runtime_enabled_sdk_config: Option<RuntimeEnabledSdkConfig>,
}

impl BundleModuleBuilder {
    /// Adds an entry. Content at a well-known path is decoded right away into
    /// its typed field, failing with a decode error that names the path.
    pub fn add_entry(&mut self, entry: ModuleEntry) -> BundleResult<&mut Self> {
        let Some(special) = SpecialEntry::for_path(entry.path()) else {
            self.entries.insert(entry.path().clone(), entry);
            return Ok(self);
        };
        let path = entry.path();
        let bytes = entry.content()?;
        match special {
            SpecialEntry::Manifest => {
                self.manifest = Some(AndroidManifest::from_bytes(&bytes).map_err(|err| err.with_path(path))?);
            }
            SpecialEntry::ResourceTable => {
                self.resource_table = Some(ResourceTable::from_bytes(&bytes).map_err(|err| err.with_path(path))?);
            }
            SpecialEntry::Assets => self.assets_config = Some(decode_config(path, &bytes)?),
            SpecialEntry::Native => self.native_config = Some(decode_config(path, &bytes)?),
            SpecialEntry::Apex => self.apex_config = Some(decode_config(path, &bytes)?),
            SpecialEntry::RuntimeEnabledSdk => self.runtime_enabled_sdk_config = Some(decode_config(path, &bytes)?),
        }
        Ok(self)
    }

    pub fn add_entries(&mut self, entries: impl IntoIterator<Item = ModuleEntry>) -> BundleResult<&mut Self> {
        for entry in entries {
            self.add_entry(entry)?;
        }
        Ok(self)
    }

    /// Adds or replaces a generic entry without inspecting its path.
    pub(crate) fn replace_entry(&mut self, entry: ModuleEntry) -> &mut Self {
        self.entries.insert(entry.path().clone(), entry);
        self
    }

    pub fn remove_entry(&mut self, path: &ZipPath) -> &mut Self {
        self.entries.remove(path);
        self
    }

    pub fn set_manifest(&mut self, manifest: AndroidManifest) -> &mut Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn set_resource_table(&mut self, table: ResourceTable) -> &mut Self {
        self.resource_table = Some(table);
        self
    }

    pub fn set_native_config(&mut self, config: NativeLibraries) -> &mut Self {
        self.native_config = Some(config);
        self
    }

    pub fn set_assets_config(&mut self, config: Assets) -> &mut Self {
        self.assets_config = Some(config);
        self
    }

    pub fn set_apex_config(&mut self, config: ApexImages) -> &mut Self {
        self.apex_config = Some(config);
        self
    }

    pub fn set_runtime_enabled_sdk_config(&mut self, config: RuntimeEnabledSdkConfig) -> &mut Self {
        self.runtime_enabled_sdk_config = Some(config);
        self
    }

    pub fn build(&self) -> BundleResult<BundleModule> {
        if !is_identifier(&self.name) {
            fail!(
                InvalidBundle,
                "Module names must start with a letter and can contain only letters, numbers and underscores. Found: '{}'.",
                self.name
            );
        }
        let Some(manifest) = self.manifest.clone() else {
            fail!(InvalidBundle, "Module '{}' is missing the mandatory file '{}'.", self.name, MANIFEST_PATH)
        };
        debug!("Built module '{}' with {} entries", self.name, self.entries.len());
        Ok(BundleModule {
            name: self.name.clone(),
            context: self.context.clone(),
            entries: self.entries.clone(),
            manifest,
            resource_table: self.resource_table.clone(),
            native_config: self.native_config.clone(),
            assets_config: self.assets_config.clone(),
            apex_config: self.apex_config.clone(),
            runtime_enabled_sdk_config: self.runtime_enabled_sdk_config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundleType;
    use crate::error::BundleError;

    fn manifest_entry(xml: &str) -> ModuleEntry {
        let manifest = AndroidManifest::from_xml_text(xml).unwrap();
        ModuleEntry::from_bytes(ZipPath::create(MANIFEST_PATH).unwrap(), manifest.to_bytes().unwrap())
    }

    fn plain_manifest() -> ModuleEntry {
        manifest_entry(r#"<manifest package="com.test.app"/>"#)
    }

    fn file(path: &str) -> ModuleEntry {
        ModuleEntry::from_bytes(ZipPath::create(path).unwrap(), path.as_bytes().to_vec())
    }

    fn module(name: &str, entries: Vec<ModuleEntry>) -> BundleResult<BundleModule> {
        BundleModule::builder(name, BundleContext::default())
            .add_entries(entries)?
            .build()
    }

    #[test]
    fn well_known_paths_are_not_entries() {
        let native = NativeLibraries {
            directories: vec![TargetedNativeDirectory {
                path: "lib/x86".into(),
                abi: crate::targeting::Abi::X86,
            }],
        };
        let module = module(
            "base",
            vec![
                plain_manifest(),
                ModuleEntry::from_bytes(ZipPath::create(NATIVE_CONFIG_PATH).unwrap(), encode_config(&native).unwrap()),
                file("lib/x86/libfoo.so"),
                file("assets/a.txt"),
            ],
        )
        .unwrap();
        assert_eq!(module.native_config(), Some(&native));
        assert_eq!(module.entries().count(), 2);
        assert!(module.entry(&ZipPath::create(MANIFEST_PATH).unwrap()).is_none());
        assert!(module.entry(&ZipPath::create(NATIVE_CONFIG_PATH).unwrap()).is_none());
        assert!(module.is_base_module());
        assert_eq!(module.config_entries().unwrap().len(), 2);
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let err = module("feature", vec![file("assets/a.txt")]).unwrap_err();
        assert!(err.is_invalid_bundle());
        assert!(err.to_string().contains(MANIFEST_PATH));
    }

    #[test]
    fn malformed_config_fails_with_path() {
        let mut builder = BundleModule::builder("base", BundleContext::default());
        let err = builder
            .add_entry(ModuleEntry::from_bytes(ZipPath::create(RESOURCE_TABLE_PATH).unwrap(), vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(&err, BundleError::Decode { path: Some(path), .. } if path == RESOURCE_TABLE_PATH));

        let err = builder
            .add_entry(ModuleEntry::from_bytes(ZipPath::create(MANIFEST_PATH).unwrap(), vec![0xde, 0xad]))
            .unwrap_err();
        assert!(err.to_string().contains(MANIFEST_PATH), "{err}");
    }

    #[test]
    fn asset_only_bundle_has_no_base_module() {
        let xml = r#"<manifest xmlns:dist="http://schemas.android.com/apk/distribution" package="com.test.app">
                       <dist:module dist:type="asset-pack"><dist:delivery><dist:on-demand/></dist:delivery></dist:module>
                     </manifest>"#;
        let regular = module("base", vec![manifest_entry(xml)]).unwrap();
        assert!(regular.is_base_module());
        assert_eq!(regular.delivery_type().unwrap(), ModuleDeliveryType::AlwaysInitialInstall);

        let context = BundleContext {
            bundle_type: BundleType::AssetOnly,
            ..BundleContext::default()
        };
        let asset_only = BundleModule::builder("base", context)
            .add_entry(manifest_entry(xml))
            .unwrap()
            .build()
            .unwrap();
        assert!(!asset_only.is_base_module());
        assert_eq!(asset_only.delivery_type().unwrap(), ModuleDeliveryType::NoInitialInstall);
    }

    #[test]
    fn invalid_module_name() {
        assert!(module("1feature", vec![plain_manifest()]).is_err());
    }

    #[test]
    fn entries_under_path_respect_segments() {
        let module = module(
            "base",
            vec![plain_manifest(), file("dir1/a"), file("dir1/sub/b"), file("dir1longer/c")],
        )
        .unwrap();
        let prefix = ZipPath::create("dir1").unwrap();
        let found: Vec<String> = module
            .find_entries_under_path(&prefix)
            .map(|entry| entry.path().to_string())
            .collect();
        assert_eq!(found, vec!["dir1/a", "dir1/sub/b"]);
    }

    const FEATURE: &str = r#"
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
          xmlns:dist="http://schemas.android.com/apk/distribution" package="com.test.app" split="feature">
  <uses-sdk android:minSdkVersion="21"/>
  <uses-split android:name="base_lib"/>
  <dist:module dist:type="feature">
    <dist:delivery>
      <dist:install-time>
        <dist:conditions>CONDITIONS</dist:conditions>
      </dist:install-time>
    </dist:delivery>
  </dist:module>
</manifest>"#;

    fn feature(conditions: &str) -> BundleModule {
        module("feature", vec![manifest_entry(&FEATURE.replace("CONDITIONS", conditions))]).unwrap()
    }

    #[test]
    fn min_sdk_condition_preferred() {
        let module = feature(r#"<dist:min-sdk dist:value="24"/>"#);
        let metadata = module.module_metadata(false).unwrap();
        assert_eq!(metadata.delivery_type, ModuleDeliveryType::ConditionalInitialInstall);
        assert_eq!(metadata.targeting.min_sdk_version, Some(24));
        assert_eq!(metadata.dependencies, vec!["base_lib"]);
    }

    #[test]
    fn manifest_min_sdk_propagated_when_conditions_exist() {
        let module = feature(r#"<dist:device-feature dist:name="android.hardware.camera.ar"/>"#);
        let targeting = module.module_targeting().unwrap();
        assert_eq!(targeting.min_sdk_version, Some(21));
        assert_eq!(targeting.device_features.len(), 1);
    }

    #[test]
    fn no_conditions_means_default_targeting() {
        let module = module(
            "feature",
            vec![manifest_entry(
                r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="p">
                     <uses-sdk android:minSdkVersion="21"/></manifest>"#,
            )],
        )
        .unwrap();
        assert!(module.module_targeting().unwrap().is_empty());
        assert_eq!(module.delivery_type().unwrap(), ModuleDeliveryType::AlwaysInitialInstall);
    }

    #[test]
    fn legacy_on_demand() {
        let module = module(
            "feature",
            vec![manifest_entry(
                r#"<manifest xmlns:dist="http://schemas.android.com/apk/distribution" package="p">
                     <dist:module dist:onDemand="true"/></manifest>"#,
            )],
        )
        .unwrap();
        assert_eq!(module.delivery_type().unwrap(), ModuleDeliveryType::NoInitialInstall);
    }

    #[test]
    fn runtime_sdk_dependencies_only_for_sdk_runtime_variant() {
        let config = RuntimeEnabledSdkConfig {
            runtime_enabled_sdks: vec![RuntimeEnabledSdk {
                package_name: "com.sdk".into(),
                version_major: 2,
                version_minor: 1,
                certificate_digest: "AA:BB".into(),
                resources_package_id: 0x80,
            }],
        };
        let module = BundleModule::builder("base", BundleContext::default())
            .add_entry(plain_manifest())
            .unwrap()
            .set_runtime_enabled_sdk_config(config)
            .build()
            .unwrap();
        assert!(module.module_metadata(false).unwrap().runtime_enabled_sdk_dependencies.is_empty());
        let deps = module.module_metadata(true).unwrap().runtime_enabled_sdk_dependencies;
        assert_eq!(
            deps,
            vec![RuntimeEnabledSdkDependency {
                package_name: "com.sdk".into(),
                major_version: 2,
                minor_version: 1,
            }]
        );
    }

    #[test]
    fn to_builder_round_trip() {
        let module = module("base", vec![plain_manifest(), file("assets/a.txt")]).unwrap();
        let rebuilt = module.to_builder().build().unwrap();
        assert_eq!(rebuilt.name(), module.name());
        assert_eq!(rebuilt.manifest(), module.manifest());
        assert_eq!(rebuilt.entries().count(), 1);
    }
}
