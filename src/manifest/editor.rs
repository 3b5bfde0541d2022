use super::mutators::meta_data_mut;
use super::{AndroidManifest, ManifestMutator, APPLICATION_ELEMENT, FUSED_MODULE_NAMES_META_DATA, USES_SDK_ELEMENT};
use crate::xml::platform::*;
use crate::xml::XmlElementBuilder;

/// Staged edits over a copy of a manifest. Nothing is visible until [`ManifestEditor::save`].
#[derive(Clone, Debug)]
pub struct ManifestEditor {
    root: XmlElementBuilder,
}

impl ManifestEditor {
    pub(crate) fn new(root: XmlElementBuilder) -> Self {
        ManifestEditor { root }
    }

    pub fn set_package_name(&mut self, package_name: &str) -> &mut Self {
        self.root
            .get_or_create_attribute("", "package")
            .set_value_as_string(package_name);
        self
    }

    pub fn set_split_id(&mut self, split_id: &str) -> &mut Self {
        self.root
            .get_or_create_attribute("", "split")
            .set_value_as_string(split_id);
        self
    }

    pub fn remove_split_id(&mut self) -> &mut Self {
        self.root.remove_attribute("", "split");
        self
    }

    pub fn set_version_code(&mut self, version_code: i32) -> &mut Self {
        self.root
            .get_or_create_android_attribute("versionCode", VERSION_CODE_RESOURCE_ID)
            .set_value_as_decimal_integer(version_code);
        self
    }

    pub fn set_min_sdk_version(&mut self, version: i32) -> &mut Self {
        self.uses_sdk()
            .get_or_create_android_attribute("minSdkVersion", MIN_SDK_VERSION_RESOURCE_ID)
            .set_value_as_decimal_integer(version);
        self
    }

    pub fn set_target_sdk_version(&mut self, version: i32) -> &mut Self {
        self.uses_sdk()
            .get_or_create_android_attribute("targetSdkVersion", TARGET_SDK_VERSION_RESOURCE_ID)
            .set_value_as_decimal_integer(version);
        self
    }

    pub fn set_has_code(&mut self, has_code: bool) -> &mut Self {
        self.application()
            .get_or_create_android_attribute("hasCode", HAS_CODE_RESOURCE_ID)
            .set_value_as_boolean(has_code);
        self
    }

    pub fn set_feature_split(&mut self, is_feature_split: bool) -> &mut Self {
        self.root
            .get_or_create_android_attribute("isFeatureSplit", IS_FEATURE_SPLIT_RESOURCE_ID)
            .set_value_as_boolean(is_feature_split);
        self
    }

    /// Records which modules were fused into this (base) manifest.
    pub fn set_fused_module_names(&mut self, names: &[String]) -> &mut Self {
        meta_data_mut(self.application(), FUSED_MODULE_NAMES_META_DATA)
            .get_or_create_android_attribute("value", VALUE_RESOURCE_ID)
            .set_value_as_string(names.join(","));
        self
    }

    pub fn apply(&mut self, mutator: ManifestMutator) -> &mut Self {
        mutator.apply(&mut self.root);
        self
    }

    pub fn save(&self) -> AndroidManifest {
        AndroidManifest::from_element(self.root.build())
    }

    fn application(&mut self) -> &mut XmlElementBuilder {
        self.root.get_or_create_child_element(APPLICATION_ELEMENT)
    }

    fn uses_sdk(&mut self) -> &mut XmlElementBuilder {
        self.root.get_or_create_child_element(USES_SDK_ELEMENT)
    }
}
