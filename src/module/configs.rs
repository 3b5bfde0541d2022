//! Typed configs stored at well-known paths of a module.

use crate::error::{BundleError, BundleResult};
use crate::path::ZipPath;
use crate::targeting::{Abi, Targeting, TextureCompressionFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub(crate) fn decode_config<T: DeserializeOwned>(path: &ZipPath, bytes: &[u8]) -> BundleResult<T> {
    bincode::deserialize(bytes).map_err(|err| BundleError::decode(path, err))
}

pub(crate) fn encode_config<T: Serialize>(config: &T) -> BundleResult<Vec<u8>> {
    Ok(bincode::serialize(config)?)
}

/// `native.pb`: native library directories and the ABI each one targets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLibraries {
    pub directories: Vec<TargetedNativeDirectory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedNativeDirectory {
    /// E.g. `lib/arm64-v8a`.
    pub path: String,
    pub abi: Abi,
}

/// `assets.pb`: asset directories and their targeting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    pub directories: Vec<TargetedAssetsDirectory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedAssetsDirectory {
    /// E.g. `assets/textures#tcf_astc`.
    pub path: String,
    pub targeting: AssetsDirectoryTargeting,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsDirectoryTargeting {
    pub language: Option<Targeting<String>>,
    pub texture_compression_format: Option<Targeting<TextureCompressionFormat>>,
    pub country_set: Option<Targeting<String>>,
}

/// `apex.pb`: APEX system images and the ABIs each one supports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApexImages {
    pub images: Vec<TargetedApexImage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetedApexImage {
    /// E.g. `apex/x86_64.x86.img`.
    pub path: String,
    pub abis: Vec<Abi>,
}

/// `runtime_enabled_sdk_config.pb`: SDKs the app depends on through the SDK runtime.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnabledSdkConfig {
    pub runtime_enabled_sdks: Vec<RuntimeEnabledSdk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnabledSdk {
    pub package_name: String,
    pub version_major: i32,
    pub version_minor: i32,
    pub certificate_digest: String,
    /// Package id the SDK's resources are remapped to inside the app.
    pub resources_package_id: u32,
}
