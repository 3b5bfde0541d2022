use crate::error::BundleResult;
use serde::{Deserialize, Serialize};

/// Properties of a concrete device, as written in a device-spec JSON file.
///
/// Missing keys take their zero value; a zero `screen_density` or
/// `sdk_version` means the dimension is unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSpec {
    /// ABIs in order of preference.
    pub supported_abis: Vec<String>,
    /// BCP-47 locales such as `en-US`.
    pub supported_locales: Vec<String>,
    pub screen_density: u32,
    pub sdk_version: i32,
    pub gl_extensions: Vec<String>,
    /// System features, optionally with a version (`name=version`).
    pub device_features: Vec<String>,
    pub country_set: Option<String>,
    pub device_groups: Vec<String>,
}

impl DeviceSpec {
    pub fn from_json(json: &str) -> BundleResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> BundleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_spec_json() {
        let spec = DeviceSpec::from_json(
            r#"{
                "supportedAbis": ["arm64-v8a", "armeabi-v7a"],
                "supportedLocales": ["en-US", "fr-FR"],
                "screenDensity": 480,
                "sdkVersion": 30,
                "countrySet": "latam"
            }"#,
        )
        .unwrap();
        assert_eq!(spec.supported_abis, vec!["arm64-v8a", "armeabi-v7a"]);
        assert_eq!(spec.screen_density, 480);
        assert_eq!(spec.sdk_version, 30);
        assert_eq!(spec.country_set.as_deref(), Some("latam"));
        assert!(spec.gl_extensions.is_empty());
        assert_eq!(DeviceSpec::from_json(&spec.to_json().unwrap()).unwrap(), spec);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = DeviceSpec::from_json("{\"sdkVersion\": \"thirty\"}").unwrap_err();
        assert!(err.is_invalid_bundle());
    }
}
