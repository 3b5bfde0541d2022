use super::ModuleDeliveryType;
use crate::manifest::ModuleType;
use crate::targeting::ModuleTargeting;
use serde::{Deserialize, Serialize};

/// A runtime-enabled SDK the module depends on, as recorded in module metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEnabledSdkDependency {
    pub package_name: String,
    pub major_version: i32,
    pub minor_version: i32,
}

/// Facts about a module derived from its manifest and configs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub module_type: ModuleType,
    pub delivery_type: ModuleDeliveryType,
    pub is_instant: bool,
    /// Modules declared through `<uses-split>`.
    pub dependencies: Vec<String>,
    pub targeting: ModuleTargeting,
    pub runtime_enabled_sdk_dependencies: Vec<RuntimeEnabledSdkDependency>,
}
