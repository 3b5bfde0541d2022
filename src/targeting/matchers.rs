//! Per-dimension device matchers.
//!
//! Each matcher captures the relevant value(s) of one [`DeviceSpec`] and
//! answers two questions about a [`Targeting`]: does the artifact it describes
//! serve this device, and can the device be served by any artifact at all.

use super::{join, Abi, DeviceSpec, Targeting, TextureCompressionFormat};
use crate::error::BundleResult;
use crate::manifest::DeviceFeatureCondition;
use log::warn;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

pub trait TargetingDimensionMatcher {
    type Value: Ord + fmt::Display;

    fn dimension_name(&self) -> &'static str;

    /// The device spec carries a value for this dimension.
    fn is_dimension_present(&self) -> bool;

    /// Dimension-specific matching. Called only with disjoint, non-empty
    /// targeting and a device value present.
    fn matches_present(&self, targeting: &Targeting<Self::Value>) -> bool;

    /// Matching when the device has no value for this dimension.
    fn matches_absent(&self, _targeting: &Targeting<Self::Value>) -> bool {
        true
    }

    /// Fails when no artifact can serve the device. Called only with
    /// disjoint, non-empty targeting and a device value present.
    fn check_compatible_present(&self, _targeting: &Targeting<Self::Value>) -> BundleResult<()> {
        Ok(())
    }

    fn matches_targeting(&self, targeting: &Targeting<Self::Value>) -> BundleResult<bool> {
        targeting.check_disjoint(self.dimension_name())?;
        if targeting.is_empty() {
            return Ok(true);
        }
        if !self.is_dimension_present() {
            return Ok(self.matches_absent(targeting));
        }
        Ok(self.matches_present(targeting))
    }

    /// `None` targeting matches everything.
    fn matches_optional(&self, targeting: Option<&Targeting<Self::Value>>) -> BundleResult<bool> {
        match targeting {
            Some(targeting) => self.matches_targeting(targeting),
            None => Ok(true),
        }
    }

    fn check_compatible(&self, targeting: &Targeting<Self::Value>) -> BundleResult<()> {
        targeting.check_disjoint(self.dimension_name())?;
        if targeting.is_empty() || !self.is_dimension_present() {
            return Ok(());
        }
        self.check_compatible_present(targeting)
    }
}

/// Picks the device's most preferred ABI among all targeted ones.
#[derive(Clone, Debug, Default)]
pub struct AbiMatcher {
    abis: Vec<Abi>,
}

impl AbiMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        let abis = device
            .supported_abis
            .iter()
            .filter_map(|name| match name.parse::<Abi>() {
                Ok(abi) => Some(abi),
                Err(_) => {
                    warn!("Ignoring unrecognized device ABI '{}'", name);
                    None
                }
            })
            .collect();
        AbiMatcher { abis }
    }
}

impl TargetingDimensionMatcher for AbiMatcher {
    type Value = Abi;

    fn dimension_name(&self) -> &'static str {
        "ABI"
    }

    fn is_dimension_present(&self) -> bool {
        !self.abis.is_empty()
    }

    fn matches_present(&self, targeting: &Targeting<Abi>) -> bool {
        self.abis
            .iter()
            .find(|abi| targeting.contains(abi))
            .is_some_and(|best| targeting.values().contains(best))
    }

    fn check_compatible_present(&self, targeting: &Targeting<Abi>) -> BundleResult<()> {
        if !self.abis.iter().any(|abi| targeting.contains(abi)) {
            fail!(
                IncompatibleDevice,
                "The app doesn't support ABI architectures of the device. Device ABIs: {}, app ABIs: {}.",
                join(&self.abis),
                join(targeting.all_values())
            );
        }
        Ok(())
    }
}

/// Picks the smallest targeted density not below the device's, else the largest one.
#[derive(Clone, Debug, Default)]
pub struct ScreenDensityMatcher {
    dpi: u32,
}

impl ScreenDensityMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        ScreenDensityMatcher {
            dpi: device.screen_density,
        }
    }
}

impl TargetingDimensionMatcher for ScreenDensityMatcher {
    type Value = u32;

    fn dimension_name(&self) -> &'static str {
        "screen density"
    }

    fn is_dimension_present(&self) -> bool {
        self.dpi > 0
    }

    fn matches_present(&self, targeting: &Targeting<u32>) -> bool {
        let best = targeting
            .all_values()
            .filter(|&&density| density >= self.dpi)
            .min()
            .or_else(|| targeting.all_values().max());
        best.is_some_and(|best| targeting.values().contains(best))
    }
}

/// Matches on the language part of the device locales.
#[derive(Clone, Debug, Default)]
pub struct LanguageMatcher {
    languages: BTreeSet<String>,
}

impl LanguageMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        let languages = device
            .supported_locales
            .iter()
            .filter_map(|locale| locale.split(['-', '_']).next())
            .filter(|language| !language.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        LanguageMatcher { languages }
    }
}

impl TargetingDimensionMatcher for LanguageMatcher {
    type Value = String;

    fn dimension_name(&self) -> &'static str {
        "language"
    }

    fn is_dimension_present(&self) -> bool {
        !self.languages.is_empty()
    }

    fn matches_present(&self, targeting: &Targeting<String>) -> bool {
        if targeting.values().is_empty() {
            // Fallback split: serves devices none of whose languages has its own split.
            return self
                .languages
                .iter()
                .all(|language| !targeting.alternatives().contains(language));
        }
        self.languages
            .iter()
            .any(|language| targeting.values().contains(language))
    }
}

/// Picks the highest targeted minimum SDK not above the device's SDK.
#[derive(Clone, Debug, Default)]
pub struct SdkVersionMatcher {
    sdk_version: i32,
}

impl SdkVersionMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        SdkVersionMatcher {
            sdk_version: device.sdk_version,
        }
    }
}

impl TargetingDimensionMatcher for SdkVersionMatcher {
    type Value = i32;

    fn dimension_name(&self) -> &'static str {
        "SDK version"
    }

    fn is_dimension_present(&self) -> bool {
        self.sdk_version > 0
    }

    fn matches_present(&self, targeting: &Targeting<i32>) -> bool {
        targeting
            .all_values()
            .filter(|&&min_sdk| min_sdk <= self.sdk_version)
            .max()
            .is_some_and(|best| targeting.values().contains(best))
    }

    fn check_compatible_present(&self, targeting: &Targeting<i32>) -> BundleResult<()> {
        if !targeting.all_values().any(|&min_sdk| min_sdk <= self.sdk_version) {
            fail!(
                IncompatibleDevice,
                "The app targets SDK versions {} but the device has SDK version {}.",
                join(targeting.all_values()),
                self.sdk_version
            );
        }
        Ok(())
    }
}

static GL_EXTENSION_FORMATS: Lazy<HashMap<&'static str, TextureCompressionFormat>> = Lazy::new(|| {
    HashMap::from([
        ("GL_OES_compressed_ETC1_RGB8_texture", TextureCompressionFormat::Etc1Rgb8),
        ("GL_OES_compressed_paletted_texture", TextureCompressionFormat::Paletted),
        ("GL_AMD_compressed_3DC_texture", TextureCompressionFormat::ThreeDc),
        ("GL_AMD_compressed_ATC_texture", TextureCompressionFormat::Atc),
        ("GL_ATI_texture_compression_atitc", TextureCompressionFormat::Atc),
        ("GL_EXT_texture_compression_latc", TextureCompressionFormat::Latc),
        ("GL_EXT_texture_compression_dxt1", TextureCompressionFormat::Dxt1),
        ("GL_EXT_texture_compression_s3tc", TextureCompressionFormat::S3tc),
        ("GL_IMG_texture_compression_pvrtc", TextureCompressionFormat::Pvrtc),
        ("GL_KHR_texture_compression_astc_ldr", TextureCompressionFormat::Astc),
    ])
});

/// Picks the highest priority targeted format the device's GL extensions support.
#[derive(Clone, Debug, Default)]
pub struct TextureCompressionFormatMatcher {
    has_gl_extensions: bool,
    supported: BTreeSet<TextureCompressionFormat>,
}

impl TextureCompressionFormatMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        let supported = device
            .gl_extensions
            .iter()
            .filter_map(|extension| GL_EXTENSION_FORMATS.get(extension.as_str()).copied())
            .collect();
        TextureCompressionFormatMatcher {
            has_gl_extensions: !device.gl_extensions.is_empty(),
            supported,
        }
    }
}

impl TargetingDimensionMatcher for TextureCompressionFormatMatcher {
    type Value = TextureCompressionFormat;

    fn dimension_name(&self) -> &'static str {
        "texture compression format"
    }

    fn is_dimension_present(&self) -> bool {
        self.has_gl_extensions
    }

    fn matches_present(&self, targeting: &Targeting<TextureCompressionFormat>) -> bool {
        match targeting
            .all_values()
            .filter(|format| self.supported.contains(format))
            .max_by_key(|format| format.priority())
        {
            Some(best) => targeting.values().contains(best),
            None => targeting.values().is_empty(),
        }
    }
}

/// Matches the device's country set. Devices without one are served by the fallback.
#[derive(Clone, Debug, Default)]
pub struct CountrySetMatcher {
    country_set: Option<String>,
}

impl CountrySetMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        CountrySetMatcher {
            country_set: device.country_set.clone(),
        }
    }

    pub fn for_country_set(country_set: impl Into<String>) -> Self {
        CountrySetMatcher {
            country_set: Some(country_set.into()),
        }
    }
}

impl TargetingDimensionMatcher for CountrySetMatcher {
    type Value = String;

    fn dimension_name(&self) -> &'static str {
        "country set"
    }

    fn is_dimension_present(&self) -> bool {
        self.country_set.is_some()
    }

    fn matches_present(&self, targeting: &Targeting<String>) -> bool {
        let Some(country_set) = &self.country_set else {
            return self.matches_absent(targeting);
        };
        if targeting.values().is_empty() {
            return !targeting.alternatives().contains(country_set);
        }
        targeting.values().contains(country_set)
    }

    fn matches_absent(&self, targeting: &Targeting<String>) -> bool {
        targeting.values().is_empty()
    }

    /// A fallback artifact (no values) serves any country set its siblings do not.
    fn check_compatible_present(&self, targeting: &Targeting<String>) -> BundleResult<()> {
        if targeting.values().is_empty() {
            return Ok(());
        }
        if let Some(country_set) = &self.country_set {
            if !targeting.contains(country_set) {
                fail!(
                    IncompatibleDevice,
                    "The specified country set '{}' does not match any of the available values: {}.",
                    country_set,
                    join(targeting.all_values())
                );
            }
        }
        Ok(())
    }
}

/// Matches the device groups a device belongs to.
#[derive(Clone, Debug, Default)]
pub struct DeviceGroupMatcher {
    groups: BTreeSet<String>,
}

impl DeviceGroupMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        DeviceGroupMatcher {
            groups: device.device_groups.iter().cloned().collect(),
        }
    }

    fn any_in(&self, set: &BTreeSet<String>) -> bool {
        self.groups.iter().any(|group| set.contains(group))
    }
}

impl TargetingDimensionMatcher for DeviceGroupMatcher {
    type Value = String;

    fn dimension_name(&self) -> &'static str {
        "device group"
    }

    fn is_dimension_present(&self) -> bool {
        !self.groups.is_empty()
    }

    fn matches_present(&self, targeting: &Targeting<String>) -> bool {
        if targeting.values().is_empty() {
            return !self.any_in(targeting.alternatives());
        }
        self.any_in(targeting.values())
    }

    fn matches_absent(&self, targeting: &Targeting<String>) -> bool {
        targeting.values().is_empty()
    }

    fn check_compatible_present(&self, targeting: &Targeting<String>) -> BundleResult<()> {
        if !self.any_in(targeting.values()) && !self.any_in(targeting.alternatives()) {
            fail!(
                IncompatibleDevice,
                "The specified device groups {} do not match any of the available values: {}.",
                join(&self.groups),
                join(targeting.all_values())
            );
        }
        Ok(())
    }
}

/// Matches `<dist:device-feature>` module conditions against the device's system features.
#[derive(Clone, Debug, Default)]
pub struct DeviceFeatureMatcher {
    features: BTreeMap<String, Option<i64>>,
}

fn parse_feature_version(text: &str) -> Option<i64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

impl DeviceFeatureMatcher {
    pub fn new(device: &DeviceSpec) -> Self {
        let features = device
            .device_features
            .iter()
            .map(|feature| match feature.split_once('=') {
                Some((name, version)) => (name.to_string(), parse_feature_version(version)),
                None => (feature.clone(), None),
            })
            .collect();
        DeviceFeatureMatcher { features }
    }

    pub fn is_dimension_present(&self) -> bool {
        !self.features.is_empty()
    }

    pub fn matches(&self, condition: &DeviceFeatureCondition) -> bool {
        match (self.features.get(&condition.name), condition.version) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(available), Some(required)) => available.is_some_and(|version| version >= i64::from(required)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn device() -> DeviceSpec {
        DeviceSpec {
            supported_abis: strings(&["arm64-v8a", "armeabi-v7a"]),
            supported_locales: strings(&["fr-FR", "en_GB"]),
            screen_density: 420,
            sdk_version: 28,
            gl_extensions: strings(&["GL_OES_compressed_ETC1_RGB8_texture", "GL_EXT_texture_compression_s3tc"]),
            device_features: strings(&["android.hardware.camera", "reqGlEsVersion=0x30001"]),
            country_set: Some("latam".into()),
            device_groups: strings(&["high_end"]),
        }
    }

    #[test]
    fn abi_prefers_device_order() {
        let matcher = AbiMatcher::new(&device());
        assert!(matcher.matches_targeting(&Targeting::new([Abi::Arm64V8a], [Abi::ArmeabiV7a])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([Abi::ArmeabiV7a], [Abi::Arm64V8a])).unwrap());
        assert!(matcher.matches_targeting(&Targeting::new([Abi::ArmeabiV7a], [Abi::X86])).unwrap());
        let err = matcher.check_compatible(&Targeting::new([Abi::X86], [Abi::X86_64])).unwrap_err();
        assert!(matches!(err, BundleError::IncompatibleDevice(_)));
        assert!(err.to_string().contains("arm64-v8a"));
    }

    #[test]
    fn density_picks_closest_higher() {
        let matcher = ScreenDensityMatcher::new(&device());
        assert!(matcher.matches_targeting(&Targeting::new([480], [320, 640])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([640], [320, 480])).unwrap());
        assert!(matcher.matches_targeting(&Targeting::new([320], [240])).unwrap());
    }

    #[test]
    fn language_with_fallback() {
        let matcher = LanguageMatcher::new(&device());
        let fr = Targeting::new(["fr".to_string()], ["de".to_string()]);
        assert!(matcher.matches_targeting(&fr).unwrap());
        let de = Targeting::new(["de".to_string()], ["fr".to_string()]);
        assert!(!matcher.matches_targeting(&de).unwrap());
        let fallback = Targeting::new([], ["de".to_string()]);
        assert!(matcher.matches_targeting(&fallback).unwrap());
        let covered = Targeting::new([], ["en".to_string()]);
        assert!(!matcher.matches_targeting(&covered).unwrap());
    }

    #[test]
    fn sdk_picks_highest_not_above_device() {
        let matcher = SdkVersionMatcher::new(&device());
        assert!(matcher.matches_targeting(&Targeting::new([26], [21, 29])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([21], [26])).unwrap());
        assert!(matcher.check_compatible(&Targeting::new([29], [30])).is_err());
    }

    #[test]
    fn texture_format_priority() {
        let matcher = TextureCompressionFormatMatcher::new(&device());
        use TextureCompressionFormat::*;
        assert!(matcher.matches_targeting(&Targeting::new([S3tc], [Etc1Rgb8, Astc])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([Etc1Rgb8], [S3tc])).unwrap());
        assert!(matcher.matches_targeting(&Targeting::new([], [Astc])).unwrap());
    }

    #[test]
    fn country_set() {
        let matcher = CountrySetMatcher::for_country_set("latam");
        let latam = || "latam".to_string();
        let sea = || "sea".to_string();
        assert!(matcher.matches_targeting(&Targeting::new([latam()], [])).unwrap());
        assert!(matcher.matches_targeting(&Targeting::new([latam()], [sea()])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([sea()], [latam()])).unwrap());
        assert!(matcher.matches_targeting(&Targeting::new([], [sea()])).unwrap());
        assert!(matcher.check_compatible(&Targeting::new([sea()], [])).is_err());

        let fallback = Targeting::new([], [sea()]);
        assert!(matcher.matches_targeting(&fallback).unwrap());
        assert!(matcher.check_compatible(&fallback).is_ok());

        let overlapping = Targeting::new([latam()], [latam()]);
        let err = matcher.check_compatible(&overlapping).unwrap_err();
        assert!(matches!(err, BundleError::InvalidArgument(_)));
        assert!(matcher.matches_targeting(&overlapping).is_err());

        let no_country = CountrySetMatcher::default();
        assert!(!no_country.matches_targeting(&Targeting::new([latam()], [])).unwrap());
        assert!(no_country.matches_targeting(&Targeting::new([], [latam()])).unwrap());
    }

    #[test]
    fn device_group() {
        let matcher = DeviceGroupMatcher::new(&device());
        let group = |name: &str| name.to_string();
        assert!(matcher.matches_targeting(&Targeting::new([group("high_end")], [group("low")])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([group("low")], [group("high_end")])).unwrap());
        assert!(!matcher.matches_targeting(&Targeting::new([], [group("high_end")])).unwrap());
        assert!(matcher.check_compatible(&Targeting::new([group("low")], [])).is_err());
    }

    #[test]
    fn device_features() {
        let matcher = DeviceFeatureMatcher::new(&device());
        let condition = |name: &str, version| DeviceFeatureCondition {
            name: name.to_string(),
            version,
        };
        assert!(matcher.matches(&condition("android.hardware.camera", None)));
        assert!(!matcher.matches(&condition("android.hardware.nfc", None)));
        assert!(matcher.matches(&condition("reqGlEsVersion", Some(0x30000))));
        assert!(!matcher.matches(&condition("reqGlEsVersion", Some(0x30002))));
        assert!(!matcher.matches(&condition("android.hardware.camera", Some(1))));
    }

    #[test]
    fn absent_dimension_matches() {
        let matcher = SdkVersionMatcher::new(&DeviceSpec::default());
        assert!(matcher.matches_targeting(&Targeting::new([30], [21])).unwrap());
        assert!(matcher.check_compatible(&Targeting::new([30], [])).is_ok());
    }
}
