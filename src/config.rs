use crate::error::BundleResult;
use semver::Version;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BundleType {
    #[default]
    Regular,
    AssetOnly,
}

/// Bundle-wide settings every module is built with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleContext {
    #[serde(default)]
    pub bundle_type: BundleType,
    /// Version of the tool that built the bundle.
    pub bundletool_version: Version,
    /// Overrides the version-based default for `<dist:fast-follow>` support.
    #[serde(default)]
    pub fast_follow_enabled: Option<bool>,
}

/// First version that understands `<dist:fast-follow>`.
const FAST_FOLLOW_MIN_VERSION: Version = Version::new(0, 13, 0);

impl Default for BundleContext {
    fn default() -> Self {
        BundleContext {
            bundle_type: BundleType::Regular,
            bundletool_version: Version::new(1, 15, 6),
            fast_follow_enabled: None,
        }
    }
}

impl BundleContext {
    pub fn new(bundle_type: BundleType, bundletool_version: Version) -> Self {
        BundleContext {
            bundle_type,
            bundletool_version,
            fast_follow_enabled: None,
        }
    }

    pub fn is_fast_follow_enabled(&self) -> bool {
        self.fast_follow_enabled
            .unwrap_or(self.bundletool_version >= FAST_FOLLOW_MIN_VERSION)
    }

    pub fn is_asset_only(&self) -> bool {
        self.bundle_type == BundleType::AssetOnly
    }

    pub fn from_json(json: &str) -> BundleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
