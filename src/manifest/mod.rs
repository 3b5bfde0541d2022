//! Read-mostly view over an `AndroidManifest.xml` tree.

mod delivery;
mod editor;
mod mutators;

pub use delivery::{
    DeviceFeatureCondition, DeviceGroupsCondition, ManifestDeliveryElement, ModuleConditions,
    UserCountriesCondition,
};
pub use editor::ManifestEditor;
pub use mutators::ManifestMutator;

use crate::error::BundleResult;
use crate::xml::binary::{decode_xml, encode_xml};
use crate::xml::platform::*;
use crate::xml::text::parse_xml;
use crate::xml::{CompiledItem, XmlAttribute, XmlElement, XmlNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const MANIFEST_ELEMENT: &str = "manifest";
pub const APPLICATION_ELEMENT: &str = "application";
pub const USES_SDK_ELEMENT: &str = "uses-sdk";
pub const USES_SPLIT_ELEMENT: &str = "uses-split";
pub const META_DATA_ELEMENT: &str = "meta-data";
pub const MODULE_ELEMENT: &str = "module";
pub const FUSING_ELEMENT: &str = "fusing";

pub const SPLITS_REQUIRED_META_DATA: &str = "com.android.vending.splits.required";
pub const FUSED_MODULE_NAMES_META_DATA: &str = "com.android.dynamic.apk.fused.modules";

/// The kind of module a manifest declares through `<dist:module dist:type=...>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    Feature,
    AssetPack,
    MlPack,
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleType::Feature => "feature",
            ModuleType::AssetPack => "asset-pack",
            ModuleType::MlPack => "ml-pack",
        };
        write!(f, "{name}")
    }
}

/// A validated manifest. The root element is always `<manifest>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AndroidManifest {
    root: XmlElement,
}

impl AndroidManifest {
    pub fn create(root: XmlNode) -> BundleResult<Self> {
        match root {
            XmlNode::Element(element)
                if element.name() == MANIFEST_ELEMENT && element.namespace_uri().is_empty() =>
            {
                Ok(AndroidManifest { root: element })
            }
            XmlNode::Element(element) => fail!(
                InvalidBundle,
                "Expected the manifest root element to be '<manifest>' but found '<{}>'.",
                element.name()
            ),
            XmlNode::Text(_) => fail!(InvalidBundle, "The manifest root must be an element."),
        }
    }

    /// Wraps an element already known to be `<manifest>`.
    pub(crate) fn from_element(root: XmlElement) -> Self {
        AndroidManifest { root }
    }

    /// Decodes a binary (compiled) manifest.
    pub fn from_bytes(bytes: &[u8]) -> BundleResult<Self> {
        AndroidManifest::create(decode_xml(bytes)?)
    }

    /// Parses a text manifest.
    pub fn from_xml_text(xml: &str) -> BundleResult<Self> {
        AndroidManifest::create(parse_xml(xml)?)
    }

    pub fn to_bytes(&self) -> BundleResult<Vec<u8>> {
        Ok(encode_xml(&self.to_node())?)
    }

    pub fn to_node(&self) -> XmlNode {
        XmlNode::Element(self.root.clone())
    }

    pub fn manifest_element(&self) -> &XmlElement {
        &self.root
    }

    pub fn package_name(&self) -> BundleResult<String> {
        match self.manifest_element().attribute("", "package") {
            Some(attr) => Ok(attr.value_as_string()?.to_string()),
            None => fail!(InvalidBundle, "Package name not found in the manifest."),
        }
    }

    pub fn split_id(&self) -> Option<String> {
        self.manifest_element()
            .attribute("", "split")
            .and_then(|attr| attr.value_as_string().ok())
            .map(str::to_string)
    }

    pub fn version_code(&self) -> BundleResult<Option<i32>> {
        self.manifest_element()
            .android_attribute(VERSION_CODE_RESOURCE_ID)
            .map(integer_value)
            .transpose()
    }

    pub fn min_sdk_version(&self) -> BundleResult<Option<i32>> {
        self.uses_sdk_value(MIN_SDK_VERSION_RESOURCE_ID)
    }

    pub fn max_sdk_version(&self) -> BundleResult<Option<i32>> {
        self.uses_sdk_value(MAX_SDK_VERSION_RESOURCE_ID)
    }

    pub fn target_sdk_version(&self) -> BundleResult<Option<i32>> {
        self.uses_sdk_value(TARGET_SDK_VERSION_RESOURCE_ID)
    }

    fn uses_sdk_value(&self, resource_id: u32) -> BundleResult<Option<i32>> {
        self.manifest_element()
            .optional_child_element(USES_SDK_ELEMENT)
            .and_then(|uses_sdk| uses_sdk.android_attribute(resource_id))
            .map(integer_value)
            .transpose()
    }

    pub fn application(&self) -> Option<&XmlElement> {
        self.manifest_element().optional_child_element(APPLICATION_ELEMENT)
    }

    /// `android:hasCode`, defaulting to true.
    pub fn has_code(&self) -> BundleResult<bool> {
        match self
            .application()
            .and_then(|app| app.android_attribute(HAS_CODE_RESOURCE_ID))
        {
            Some(attr) => attr.value_as_boolean(),
            None => Ok(true),
        }
    }

    pub fn extract_native_libs(&self) -> BundleResult<Option<bool>> {
        self.application()
            .and_then(|app| app.android_attribute(EXTRACT_NATIVE_LIBS_RESOURCE_ID))
            .map(XmlAttribute::value_as_boolean)
            .transpose()
    }

    pub fn is_feature_split(&self) -> BundleResult<bool> {
        match self.manifest_element().android_attribute(IS_FEATURE_SPLIT_RESOURCE_ID) {
            Some(attr) => attr.value_as_boolean(),
            None => Ok(false),
        }
    }

    pub fn version_name(&self) -> Option<String> {
        self.manifest_element()
            .android_attribute(VERSION_NAME_RESOURCE_ID)
            .map(XmlAttribute::debug_string)
    }

    fn dist_module(&self) -> Option<&XmlElement> {
        self.manifest_element()
            .optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, MODULE_ELEMENT)
    }

    fn dist_module_attribute(&self, name: &str) -> Option<&XmlAttribute> {
        self.dist_module()
            .and_then(|module| module.attribute(DISTRIBUTION_NAMESPACE_URI, name))
    }

    pub fn module_type(&self) -> BundleResult<ModuleType> {
        let Some(attr) = self.dist_module_attribute("type") else {
            return Ok(ModuleType::Feature);
        };
        match attr.value_as_string()? {
            "feature" => Ok(ModuleType::Feature),
            "asset-pack" => Ok(ModuleType::AssetPack),
            "ml-pack" => Ok(ModuleType::MlPack),
            other => fail!(InvalidBundle, "Found invalid module type '{}' in the manifest.", other),
        }
    }

    pub fn is_instant_module(&self) -> BundleResult<bool> {
        match self.dist_module_attribute("instant") {
            Some(attr) => attr.value_as_boolean(),
            None => Ok(false),
        }
    }

    /// Legacy `dist:onDemand` attribute on `<dist:module>`.
    pub fn on_demand_attribute(&self) -> BundleResult<Option<bool>> {
        self.dist_module_attribute("onDemand")
            .map(XmlAttribute::value_as_boolean)
            .transpose()
    }

    pub fn module_title_ref_id(&self) -> BundleResult<Option<u32>> {
        self.dist_module_attribute("title")
            .map(XmlAttribute::value_as_ref_id)
            .transpose()
    }

    /// `<dist:fusing dist:include=...>` under `<dist:module>`.
    pub fn is_module_included_in_fusing(&self) -> BundleResult<Option<bool>> {
        self.dist_module()
            .and_then(|module| module.optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, FUSING_ELEMENT))
            .and_then(|fusing| fusing.attribute(DISTRIBUTION_NAMESPACE_URI, "include"))
            .map(XmlAttribute::value_as_boolean)
            .transpose()
    }

    /// The `<dist:delivery>` element, structurally validated. `None` when absent.
    pub fn manifest_delivery_element(
        &self,
        fast_follow_enabled: bool,
    ) -> BundleResult<Option<ManifestDeliveryElement>> {
        ManifestDeliveryElement::from_manifest_root(self.manifest_element(), fast_follow_enabled)
    }

    /// Names declared through `<uses-split android:name=...>`.
    pub fn uses_splits(&self) -> BundleResult<BTreeSet<String>> {
        self.manifest_element()
            .children_elements_named(USES_SPLIT_ELEMENT)
            .filter_map(|element| element.android_attribute(NAME_RESOURCE_ID))
            .map(|attr| attr.value_as_string().map(str::to_string))
            .collect()
    }

    pub fn meta_data(&self, name: &str) -> Option<&XmlElement> {
        self.application()?
            .children_elements_named(META_DATA_ELEMENT)
            .find(|meta| {
                meta.android_attribute(NAME_RESOURCE_ID)
                    .and_then(|attr| attr.value_as_string().ok())
                    == Some(name)
            })
    }

    pub fn meta_data_value(&self, name: &str) -> Option<&XmlAttribute> {
        self.meta_data(name)
            .and_then(|meta| meta.android_attribute(VALUE_RESOURCE_ID))
    }

    pub fn splits_required(&self) -> BundleResult<bool> {
        match self.meta_data_value(SPLITS_REQUIRED_META_DATA) {
            Some(attr) => attr.value_as_boolean(),
            None => Ok(false),
        }
    }

    pub fn fused_module_names(&self) -> Vec<String> {
        self.meta_data_value(FUSED_MODULE_NAMES_META_DATA)
            .and_then(|attr| attr.value_as_string().ok())
            .map(|names| {
                names
                    .split(',')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every resource id referenced by an attribute anywhere in the manifest.
    pub fn referenced_resource_ids(&self) -> BTreeSet<u32> {
        self.manifest_element()
            .all_elements()
            .into_iter()
            .flat_map(|element| element.attributes())
            .filter_map(|attr| match attr.compiled_item() {
                Some(CompiledItem::Reference { id, .. }) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn to_editor(&self) -> ManifestEditor {
        ManifestEditor::new(self.manifest_element().to_builder())
    }

    /// Returns a new manifest with `mutators` applied in order.
    pub fn apply_mutators(&self, mutators: &[ManifestMutator]) -> AndroidManifest {
        let mut builder = self.manifest_element().to_builder();
        for mutator in mutators {
            mutator.apply(&mut builder);
        }
        AndroidManifest::from_element(builder.build())
    }
}

/// Integer attribute value: decimal, hex, or a numeric string.
fn integer_value(attr: &XmlAttribute) -> BundleResult<i32> {
    match attr.compiled_item() {
        Some(CompiledItem::DecimalInt(num)) => Ok(*num),
        Some(CompiledItem::HexInt(num)) => Ok(*num as i32),
        _ => {
            let text = attr.value_as_string()?;
            text.trim().parse::<i32>().map_err(|_| {
                err!(
                    InvalidBundle,
                    "Expected an integer value for attribute '{}' but found '{}'.",
                    attr.name(),
                    text
                )
            })
        }
    }
}
