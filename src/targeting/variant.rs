use super::{ApkTargeting, ModuleTargeting, VariantTargeting};
use crate::module::ModuleDeliveryType;
use crate::path::ZipPath;
use serde::{Deserialize, Serialize};

/// One generated APK and what it targets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkDescription {
    pub path: ZipPath,
    pub targeting: ApkTargeting,
}

/// The APKs generated for one module within a variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApkSet {
    pub module_name: String,
    pub delivery_type: ModuleDeliveryType,
    pub module_targeting: ModuleTargeting,
    pub apks: Vec<ApkDescription>,
}

/// A set of APKs for one device configuration family (e.g. one SDK range).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub variant_number: u32,
    pub targeting: VariantTargeting,
    pub apk_sets: Vec<ApkSet>,
}
