use super::matchers::*;
use super::{ApkSet, ApkTargeting, DeviceSpec, ModuleTargeting, Targeting, Variant, VariantTargeting};
use crate::error::BundleResult;
use crate::module::ModuleDeliveryType;
use crate::path::ZipPath;
use log::debug;
use std::collections::BTreeSet;

/// Decides whether a module's install conditions hold on a device.
#[derive(Clone, Debug, Default)]
pub struct ModuleTargetingMatcher {
    sdk_version: i32,
    features: DeviceFeatureMatcher,
    groups: DeviceGroupMatcher,
}

impl ModuleTargetingMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        ModuleTargetingMatcher {
            sdk_version: device.sdk_version,
            features: DeviceFeatureMatcher::new(device),
            groups: DeviceGroupMatcher::new(device),
        }
    }

    /// User-country conditions are not evaluated: a device spec has no country.
    pub fn matches(&self, targeting: &ModuleTargeting) -> BundleResult<bool> {
        if self.sdk_version > 0 {
            if targeting.min_sdk_version.is_some_and(|min| self.sdk_version < min) {
                return Ok(false);
            }
            if targeting.max_sdk_version.is_some_and(|max| self.sdk_version > max) {
                return Ok(false);
            }
        }
        if !targeting
            .device_features
            .iter()
            .all(|feature| self.features.matches(feature))
        {
            return Ok(false);
        }
        if targeting.device_groups.is_empty() {
            return Ok(true);
        }
        self.groups
            .matches_targeting(&Targeting::new(targeting.device_groups.iter().cloned(), []))
    }
}

/// Combines all dimension matchers to pick the variant and APKs for a device.
#[derive(Clone, Debug, Default)]
pub struct ApkMatcher {
    abi: AbiMatcher,
    screen_density: ScreenDensityMatcher,
    language: LanguageMatcher,
    sdk_version: SdkVersionMatcher,
    texture_compression_format: TextureCompressionFormatMatcher,
    country_set: CountrySetMatcher,
    module_matcher: ModuleTargetingMatcher,
    requested_modules: Option<BTreeSet<String>>,
}

impl ApkMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        ApkMatcher {
            abi: AbiMatcher::new(device),
            screen_density: ScreenDensityMatcher::new(device),
            language: LanguageMatcher::new(device),
            sdk_version: SdkVersionMatcher::new(device),
            texture_compression_format: TextureCompressionFormatMatcher::new(device),
            country_set: CountrySetMatcher::new(device),
            module_matcher: ModuleTargetingMatcher::new(device),
            requested_modules: None,
        }
    }

    /// Also installs these modules, whatever their delivery type.
    pub fn with_requested_modules(mut self, modules: impl IntoIterator<Item = String>) -> Self {
        self.requested_modules = Some(modules.into_iter().collect());
        self
    }

    pub fn matches_apk(&self, targeting: &ApkTargeting) -> BundleResult<bool> {
        Ok(self.abi.matches_optional(targeting.abi.as_ref())?
            && self.screen_density.matches_optional(targeting.screen_density.as_ref())?
            && self.language.matches_optional(targeting.language.as_ref())?
            && self.sdk_version.matches_optional(targeting.sdk_version.as_ref())?
            && self
                .texture_compression_format
                .matches_optional(targeting.texture_compression_format.as_ref())?
            && self.country_set.matches_optional(targeting.country_set.as_ref())?)
    }

    pub fn check_compatible(&self, targeting: &ApkTargeting) -> BundleResult<()> {
        if let Some(abi) = &targeting.abi {
            self.abi.check_compatible(abi)?;
        }
        if let Some(density) = &targeting.screen_density {
            self.screen_density.check_compatible(density)?;
        }
        if let Some(language) = &targeting.language {
            self.language.check_compatible(language)?;
        }
        if let Some(sdk) = &targeting.sdk_version {
            self.sdk_version.check_compatible(sdk)?;
        }
        if let Some(format) = &targeting.texture_compression_format {
            self.texture_compression_format.check_compatible(format)?;
        }
        if let Some(country_set) = &targeting.country_set {
            self.country_set.check_compatible(country_set)?;
        }
        Ok(())
    }

    pub fn matches_variant(&self, targeting: &VariantTargeting) -> BundleResult<bool> {
        Ok(self.sdk_version.matches_optional(targeting.sdk_version.as_ref())?
            && self.abi.matches_optional(targeting.abi.as_ref())?
            && self.screen_density.matches_optional(targeting.screen_density.as_ref())?
            && self
                .texture_compression_format
                .matches_optional(targeting.texture_compression_format.as_ref())?)
    }

    /// The matching variant with the highest variant number.
    pub fn select_variant<'a>(&self, variants: &'a [Variant]) -> BundleResult<Option<&'a Variant>> {
        let mut best: Option<&Variant> = None;
        for variant in variants {
            if !self.matches_variant(&variant.targeting)? {
                continue;
            }
            if best.map_or(true, |current| variant.variant_number > current.variant_number) {
                best = Some(variant);
            }
        }
        Ok(best)
    }

    fn should_install(&self, apk_set: &ApkSet) -> BundleResult<bool> {
        if self
            .requested_modules
            .as_ref()
            .is_some_and(|modules| modules.contains(&apk_set.module_name))
        {
            return Ok(true);
        }
        match apk_set.delivery_type {
            ModuleDeliveryType::AlwaysInitialInstall => Ok(true),
            ModuleDeliveryType::ConditionalInitialInstall => self.module_matcher.matches(&apk_set.module_targeting),
            ModuleDeliveryType::NoInitialInstall => Ok(false),
        }
    }

    /// Paths of the APKs of `variant` this device should install.
    pub fn matching_apk_paths(&self, variant: &Variant) -> BundleResult<Vec<ZipPath>> {
        let mut paths = Vec::new();
        for apk_set in &variant.apk_sets {
            if !self.should_install(apk_set)? {
                debug!("Skipping module '{}'", apk_set.module_name);
                continue;
            }
            for apk in &apk_set.apks {
                if self.matches_apk(&apk.targeting)? {
                    paths.push(apk.path.clone());
                }
            }
        }
        Ok(paths)
    }

    /// Selects the best variant and returns its matching APKs.
    pub fn matching_apks(&self, variants: &[Variant]) -> BundleResult<Vec<ZipPath>> {
        match self.select_variant(variants)? {
            Some(variant) => {
                debug!("Selected variant {}", variant.variant_number);
                self.matching_apk_paths(variant)
            }
            None => fail!(IncompatibleDevice, "No variant of the app matches the device."),
        }
    }
}
