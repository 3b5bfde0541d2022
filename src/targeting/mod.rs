//! Targeting descriptors and the device matchers that resolve them.

mod apk_matcher;
mod device_spec;
mod matchers;
mod variant;

pub use apk_matcher::{ApkMatcher, ModuleTargetingMatcher};
pub use device_spec::DeviceSpec;
pub use matchers::{
    AbiMatcher, CountrySetMatcher, DeviceFeatureMatcher, DeviceGroupMatcher, LanguageMatcher,
    ScreenDensityMatcher, SdkVersionMatcher, TargetingDimensionMatcher, TextureCompressionFormatMatcher,
};
pub use variant::{ApkDescription, ApkSet, Variant};

use crate::error::BundleResult;
use crate::manifest::{DeviceFeatureCondition, UserCountriesCondition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Values an artifact covers along one dimension (`values`) and the values
/// covered by its sibling artifacts (`alternatives`). The two sets must not overlap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Targeting<T: Ord> {
    values: BTreeSet<T>,
    alternatives: BTreeSet<T>,
}

impl<T: Ord> Default for Targeting<T> {
    fn default() -> Self {
        Targeting {
            values: BTreeSet::new(),
            alternatives: BTreeSet::new(),
        }
    }
}

impl<T: Ord + fmt::Display> Targeting<T> {
    pub fn new(values: impl IntoIterator<Item = T>, alternatives: impl IntoIterator<Item = T>) -> Self {
        Targeting {
            values: values.into_iter().collect(),
            alternatives: alternatives.into_iter().collect(),
        }
    }

    pub fn of(value: T) -> Self {
        Targeting::new([value], [])
    }

    pub fn values(&self) -> &BTreeSet<T> {
        &self.values
    }

    pub fn alternatives(&self) -> &BTreeSet<T> {
        &self.alternatives
    }

    /// No values and no alternatives: matches every device.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.alternatives.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value) || self.alternatives.contains(value)
    }

    pub fn all_values(&self) -> impl Iterator<Item = &T> {
        self.values.iter().chain(&self.alternatives)
    }

    pub fn check_disjoint(&self, dimension: &str) -> BundleResult<()> {
        if let Some(shared) = self.values.intersection(&self.alternatives).next() {
            fail!(
                InvalidArgument,
                "Expected {} targeting values and alternatives to be mutually exclusive, but both contain '{}'.",
                dimension,
                shared
            );
        }
        Ok(())
    }

    /// The single selected value, if any. Fails when more than one is selected.
    pub fn single_value(&self, dimension: &str) -> BundleResult<Option<&T>> {
        let mut iter = self.values.iter();
        match (iter.next(), iter.next()) {
            (Some(_), Some(_)) => fail!(
                InvalidArgument,
                "Expected at most one {} value, but found {}.",
                dimension,
                join(&self.values)
            ),
            (value, _) => Ok(value),
        }
    }
}

pub(crate) fn join<'a, T: fmt::Display + 'a>(values: impl IntoIterator<Item = &'a T>) -> String {
    let parts: Vec<String> = values.into_iter().map(|value| value.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

/// Android native ABIs, in no particular preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Abi {
    Armeabi,
    ArmeabiV7a,
    Arm64V8a,
    X86,
    X86_64,
    Mips,
    Mips64,
    Riscv64,
}

impl Abi {
    pub const ALL: [Abi; 8] = [
        Abi::Armeabi,
        Abi::ArmeabiV7a,
        Abi::Arm64V8a,
        Abi::X86,
        Abi::X86_64,
        Abi::Mips,
        Abi::Mips64,
        Abi::Riscv64,
    ];

    /// The name used in `lib/<abi>/` directories and device specs.
    pub fn platform_name(&self) -> &'static str {
        match self {
            Abi::Armeabi => "armeabi",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::Arm64V8a => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
            Abi::Mips => "mips",
            Abi::Mips64 => "mips64",
            Abi::Riscv64 => "riscv64",
        }
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.platform_name())
    }
}

impl FromStr for Abi {
    type Err = crate::error::BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Abi::ALL.iter().find(|abi| abi.platform_name() == s) {
            Some(abi) => Ok(*abi),
            None => Err(err!(InvalidArgument, "Unrecognized ABI '{}'.", s)),
        }
    }
}

/// GPU texture compression formats, as used for asset directory targeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TextureCompressionFormat {
    Etc1Rgb8,
    Paletted,
    ThreeDc,
    Atc,
    Latc,
    Dxt1,
    S3tc,
    Pvrtc,
    Astc,
    /// Part of OpenGL ES 3.0, which the device spec does not record.
    Etc2,
}

impl TextureCompressionFormat {
    /// Higher is preferred when a device supports several formats.
    pub fn priority(&self) -> u8 {
        match self {
            TextureCompressionFormat::Astc => 10,
            TextureCompressionFormat::Etc2 => 9,
            TextureCompressionFormat::S3tc => 8,
            TextureCompressionFormat::Pvrtc => 7,
            TextureCompressionFormat::Atc => 6,
            TextureCompressionFormat::Latc => 5,
            TextureCompressionFormat::Dxt1 => 4,
            TextureCompressionFormat::ThreeDc => 3,
            TextureCompressionFormat::Etc1Rgb8 => 2,
            TextureCompressionFormat::Paletted => 1,
        }
    }

    /// Suffix used in `#tcf_<name>` asset directory names.
    pub fn directory_name(&self) -> &'static str {
        match self {
            TextureCompressionFormat::Etc1Rgb8 => "etc1",
            TextureCompressionFormat::Paletted => "paletted",
            TextureCompressionFormat::ThreeDc => "3dc",
            TextureCompressionFormat::Atc => "atc",
            TextureCompressionFormat::Latc => "latc",
            TextureCompressionFormat::Dxt1 => "dxt1",
            TextureCompressionFormat::S3tc => "s3tc",
            TextureCompressionFormat::Pvrtc => "pvrtc",
            TextureCompressionFormat::Astc => "astc",
            TextureCompressionFormat::Etc2 => "etc2",
        }
    }
}

impl fmt::Display for TextureCompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.directory_name())
    }
}

/// Targeting of a single generated APK (a split or a standalone APK).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkTargeting {
    pub abi: Option<Targeting<Abi>>,
    /// Screen density in dpi.
    pub screen_density: Option<Targeting<u32>>,
    pub language: Option<Targeting<String>>,
    /// Minimum SDK version of each alternative.
    pub sdk_version: Option<Targeting<i32>>,
    pub texture_compression_format: Option<Targeting<TextureCompressionFormat>>,
    pub country_set: Option<Targeting<String>>,
}

fn single_name<T: Ord + fmt::Display>(targeting: &Option<Targeting<T>>, dimension: &str) -> BundleResult<Option<String>> {
    match targeting {
        Some(targeting) => Ok(targeting.single_value(dimension)?.map(|value| value.to_string())),
        None => Ok(None),
    }
}

impl ApkTargeting {
    pub fn abi_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.abi, "ABI")
    }

    pub fn screen_density_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.screen_density, "screen density")
    }

    pub fn language_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.language, "language")
    }

    pub fn sdk_version_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.sdk_version, "SDK version")
    }

    pub fn texture_compression_format_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.texture_compression_format, "texture compression format")
    }

    pub fn country_set_name(&self) -> BundleResult<Option<String>> {
        single_name(&self.country_set, "country set")
    }
}

/// Targeting shared by all APKs of one variant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTargeting {
    pub sdk_version: Option<Targeting<i32>>,
    pub abi: Option<Targeting<Abi>>,
    pub screen_density: Option<Targeting<u32>>,
    pub texture_compression_format: Option<Targeting<TextureCompressionFormat>>,
}

/// Install conditions of a module, resolved against device specs at install time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTargeting {
    pub min_sdk_version: Option<i32>,
    pub max_sdk_version: Option<i32>,
    pub device_features: Vec<DeviceFeatureCondition>,
    pub user_countries: Option<UserCountriesCondition>,
    pub device_groups: BTreeSet<String>,
}

impl ModuleTargeting {
    pub fn is_empty(&self) -> bool {
        self == &ModuleTargeting::default()
    }
}
