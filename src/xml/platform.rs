//! Namespace URIs and the framework resource ids of the `android:` attributes the crate reads or writes.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

pub const ANDROID_NAMESPACE_URI: &str = "http://schemas.android.com/apk/res/android";
pub const DISTRIBUTION_NAMESPACE_URI: &str = "http://schemas.android.com/apk/distribution";
pub const TOOLS_NAMESPACE_URI: &str = "http://schemas.android.com/tools";

pub const THEME_RESOURCE_ID: u32 = 0x0101_0000;
pub const LABEL_RESOURCE_ID: u32 = 0x0101_0001;
pub const ICON_RESOURCE_ID: u32 = 0x0101_0002;
pub const NAME_RESOURCE_ID: u32 = 0x0101_0003;
pub const HAS_CODE_RESOURCE_ID: u32 = 0x0101_000c;
pub const VALUE_RESOURCE_ID: u32 = 0x0101_0024;
pub const RESOURCE_RESOURCE_ID: u32 = 0x0101_0025;
pub const MIN_SDK_VERSION_RESOURCE_ID: u32 = 0x0101_020c;
pub const VERSION_CODE_RESOURCE_ID: u32 = 0x0101_021b;
pub const VERSION_NAME_RESOURCE_ID: u32 = 0x0101_021c;
pub const TARGET_SDK_VERSION_RESOURCE_ID: u32 = 0x0101_0270;
pub const MAX_SDK_VERSION_RESOURCE_ID: u32 = 0x0101_0271;
pub const GL_ES_VERSION_RESOURCE_ID: u32 = 0x0101_0281;
pub const REQUIRED_RESOURCE_ID: u32 = 0x0101_028e;
pub const EXTRACT_NATIVE_LIBS_RESOURCE_ID: u32 = 0x0101_04ea;
pub const SPLIT_NAME_RESOURCE_ID: u32 = 0x0101_0549;
pub const ISOLATED_SPLITS_RESOURCE_ID: u32 = 0x0101_054b;
pub const IS_FEATURE_SPLIT_RESOURCE_ID: u32 = 0x0101_055b;
pub const IS_SPLIT_REQUIRED_RESOURCE_ID: u32 = 0x0101_0591;

static ATTRIBUTE_IDS: Lazy<HashMap<&'static str, u32>> = Lazy::new(|| {
    HashMap::from([
        ("theme", THEME_RESOURCE_ID),
        ("label", LABEL_RESOURCE_ID),
        ("icon", ICON_RESOURCE_ID),
        ("name", NAME_RESOURCE_ID),
        ("hasCode", HAS_CODE_RESOURCE_ID),
        ("value", VALUE_RESOURCE_ID),
        ("resource", RESOURCE_RESOURCE_ID),
        ("minSdkVersion", MIN_SDK_VERSION_RESOURCE_ID),
        ("versionCode", VERSION_CODE_RESOURCE_ID),
        ("versionName", VERSION_NAME_RESOURCE_ID),
        ("targetSdkVersion", TARGET_SDK_VERSION_RESOURCE_ID),
        ("maxSdkVersion", MAX_SDK_VERSION_RESOURCE_ID),
        ("glEsVersion", GL_ES_VERSION_RESOURCE_ID),
        ("required", REQUIRED_RESOURCE_ID),
        ("extractNativeLibs", EXTRACT_NATIVE_LIBS_RESOURCE_ID),
        ("splitName", SPLIT_NAME_RESOURCE_ID),
        ("isolatedSplits", ISOLATED_SPLITS_RESOURCE_ID),
        ("isFeatureSplit", IS_FEATURE_SPLIT_RESOURCE_ID),
        ("isSplitRequired", IS_SPLIT_REQUIRED_RESOURCE_ID),
    ])
});

/// Framework resource id of `android:<name>`, if known.
pub fn android_attribute_id(name: &str) -> Option<u32> {
    ATTRIBUTE_IDS.get(name).copied()
}

/// `android:` attributes whose framework format is `string` or `reference`.
static STRING_ATTRIBUTES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "name",
        "label",
        "icon",
        "theme",
        "resource",
        "versionName",
        "splitName",
        "process",
        "taskAffinity",
        "permission",
        "authorities",
        "targetPackage",
    ])
});

/// `android:<name>` holds text or a reference, never a number or boolean.
pub fn is_string_android_attribute(name: &str) -> bool {
    STRING_ATTRIBUTES.contains(name)
}
