//! Validation of the `<dist:delivery>` sub-tree of a module manifest.
//!
//! Grammar (all elements in the distribution namespace):
//!
//! ```text
//! delivery      := install-time? on-demand? fast-follow?
//! install-time  := conditions? removable?
//! conditions    := min-sdk? max-sdk? device-feature* user-countries? device-groups?
//! user-countries:= country+
//! device-groups := device-group+
//! ```
//!
//! Each child is classified by name into a closed set of kinds; anything
//! else is rejected. Structure is checked when the element is built, condition
//! content only when [`ManifestDeliveryElement::module_conditions`] is called.

use super::MODULE_ELEMENT;
use crate::error::BundleResult;
use crate::targeting::ModuleTargeting;
use crate::xml::values::is_identifier;
use crate::xml::{CompiledItem, XmlAttribute, XmlElement, DISTRIBUTION_NAMESPACE_URI};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DELIVERY_ELEMENT: &str = "delivery";
const INSTALL_TIME_ELEMENT: &str = "install-time";
const ON_DEMAND_ELEMENT: &str = "on-demand";
const FAST_FOLLOW_ELEMENT: &str = "fast-follow";
const CONDITIONS_ELEMENT: &str = "conditions";
const REMOVABLE_ELEMENT: &str = "removable";
const MIN_SDK_ELEMENT: &str = "min-sdk";
const MAX_SDK_ELEMENT: &str = "max-sdk";
const DEVICE_FEATURE_ELEMENT: &str = "device-feature";
const USER_COUNTRIES_ELEMENT: &str = "user-countries";
const COUNTRY_ELEMENT: &str = "country";
const DEVICE_GROUPS_ELEMENT: &str = "device-groups";
const DEVICE_GROUP_ELEMENT: &str = "device-group";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryKind {
    InstallTime,
    OnDemand,
    FastFollow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstallTimeKind {
    Conditions,
    Removable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConditionKind {
    MinSdk,
    MaxSdk,
    DeviceFeature,
    UserCountries,
    DeviceGroups,
}

const INSTALL_TIME_KINDS: &[(&str, InstallTimeKind)] = &[
    (CONDITIONS_ELEMENT, InstallTimeKind::Conditions),
    (REMOVABLE_ELEMENT, InstallTimeKind::Removable),
];

const CONDITION_KINDS: &[(&str, ConditionKind)] = &[
    (MIN_SDK_ELEMENT, ConditionKind::MinSdk),
    (MAX_SDK_ELEMENT, ConditionKind::MaxSdk),
    (DEVICE_FEATURE_ELEMENT, ConditionKind::DeviceFeature),
    (USER_COUNTRIES_ELEMENT, ConditionKind::UserCountries),
    (DEVICE_GROUPS_ELEMENT, ConditionKind::DeviceGroups),
];

fn describe_namespace(namespace_uri: &str) -> String {
    if namespace_uri.is_empty() {
        "namespace not provided".to_string()
    } else {
        format!("namespace '{namespace_uri}'")
    }
}

/// Maps `element` onto one of `kinds` by local name, then checks its namespace.
fn classify<K: Copy>(element: &XmlElement, parent: &str, kinds: &[(&str, K)]) -> BundleResult<K> {
    let Some(&(_, kind)) = kinds.iter().find(|(name, _)| *name == element.name()) else {
        fail!(
            InvalidBundle,
            "Found unexpected element '{}' ({}) in '<dist:{}>'.",
            element.name(),
            describe_namespace(element.namespace_uri()),
            parent
        )
    };
    if element.namespace_uri() != DISTRIBUTION_NAMESPACE_URI {
        fail!(
            InvalidBundle,
            "Expected element 'dist:{}' in '<dist:{}>' to be in namespace '{}' but found {}.",
            element.name(),
            parent,
            DISTRIBUTION_NAMESPACE_URI,
            describe_namespace(element.namespace_uri())
        );
    }
    Ok(kind)
}

fn expect_no_children(element: &XmlElement) -> BundleResult<()> {
    if let Some(child) = element.child_elements().next() {
        fail!(
            InvalidBundle,
            "Expected no child elements in '<dist:{}>' but found '{}'.",
            element.name(),
            child.name()
        );
    }
    Ok(())
}

fn optional_dist_attribute<'a>(element: &'a XmlElement, name: &str) -> BundleResult<Option<&'a XmlAttribute>> {
    if let Some(attr) = element.attribute(DISTRIBUTION_NAMESPACE_URI, name) {
        return Ok(Some(attr));
    }
    match element.attribute_ignoring_namespace(name) {
        Some(attr) => fail!(
            InvalidBundle,
            "Expected attribute 'dist:{}' of element '{}' to be in namespace '{}' but found {}.",
            name,
            element.name(),
            DISTRIBUTION_NAMESPACE_URI,
            describe_namespace(attr.namespace_uri())
        ),
        None => Ok(None),
    }
}

fn required_dist_attribute<'a>(element: &'a XmlElement, name: &str) -> BundleResult<&'a XmlAttribute> {
    match optional_dist_attribute(element, name)? {
        Some(attr) => Ok(attr),
        None => fail!(
            InvalidBundle,
            "Missing required 'dist:{}' attribute in the '{}' condition element.",
            name,
            element.name()
        ),
    }
}

fn integer_attribute(element: &XmlElement, attr: &XmlAttribute) -> BundleResult<i32> {
    match attr.compiled_item() {
        Some(CompiledItem::DecimalInt(value)) => return Ok(*value),
        Some(CompiledItem::HexInt(value)) => return Ok(*value as i32),
        _ => {}
    }
    let text = attr.value_as_string()?;
    text.trim().parse::<i32>().map_err(|_| {
        err!(
            InvalidBundle,
            "Expected an integer for 'dist:{}' in '{}' but found '{}'.",
            attr.name(),
            element.name(),
            text
        )
    })
}

fn boolean_attribute(element: &XmlElement, attr: &XmlAttribute) -> BundleResult<bool> {
    if let Ok(value) = attr.value_as_boolean() {
        return Ok(value);
    }
    match attr.value_as_string()? {
        "true" => Ok(true),
        "false" => Ok(false),
        other => fail!(
            InvalidBundle,
            "Expected a boolean for 'dist:{}' in '{}' but found '{}'.",
            attr.name(),
            element.name(),
            other
        ),
    }
}

/// A `<dist:device-feature>` requirement.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceFeatureCondition {
    pub name: String,
    pub version: Option<i32>,
}

/// A `<dist:user-countries>` requirement: the device's country must be in
/// `country_codes`, or outside it when `exclude` is set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserCountriesCondition {
    pub country_codes: Vec<String>,
    pub exclude: bool,
}

/// A non-empty set of `<dist:device-group>` names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceGroupsCondition {
    group_names: BTreeSet<String>,
}

impl DeviceGroupsCondition {
    pub fn group_names(&self) -> &BTreeSet<String> {
        &self.group_names
    }
}

/// Validated install conditions of a module.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConditions {
    min_sdk_version: Option<i32>,
    max_sdk_version: Option<i32>,
    device_features: Vec<DeviceFeatureCondition>,
    user_countries: Option<UserCountriesCondition>,
    device_groups: Option<DeviceGroupsCondition>,
}

impl ModuleConditions {
    pub fn min_sdk_version(&self) -> Option<i32> {
        self.min_sdk_version
    }

    pub fn max_sdk_version(&self) -> Option<i32> {
        self.max_sdk_version
    }

    pub fn device_features(&self) -> &[DeviceFeatureCondition] {
        &self.device_features
    }

    pub fn user_countries(&self) -> Option<&UserCountriesCondition> {
        self.user_countries.as_ref()
    }

    pub fn device_groups(&self) -> Option<&DeviceGroupsCondition> {
        self.device_groups.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self == &ModuleConditions::default()
    }

    pub fn to_targeting(&self) -> ModuleTargeting {
        ModuleTargeting {
            min_sdk_version: self.min_sdk_version,
            max_sdk_version: self.max_sdk_version,
            device_features: self.device_features.clone(),
            user_countries: self.user_countries.clone(),
            device_groups: self
                .device_groups
                .as_ref()
                .map(|groups| groups.group_names.clone())
                .unwrap_or_default(),
        }
    }

    fn parse(conditions: &XmlElement) -> BundleResult<ModuleConditions> {
        let mut result = ModuleConditions::default();
        for child in conditions.child_elements() {
            match classify(child, CONDITIONS_ELEMENT, CONDITION_KINDS)? {
                ConditionKind::MinSdk => {
                    let value = integer_attribute(child, required_dist_attribute(child, "value")?)?;
                    set_once(&mut result.min_sdk_version, value, MIN_SDK_ELEMENT)?;
                }
                ConditionKind::MaxSdk => {
                    let value = integer_attribute(child, required_dist_attribute(child, "value")?)?;
                    set_once(&mut result.max_sdk_version, value, MAX_SDK_ELEMENT)?;
                }
                ConditionKind::DeviceFeature => {
                    let name = required_dist_attribute(child, "name")?.value_as_string()?.to_string();
                    let version = optional_dist_attribute(child, "version")?
                        .map(|attr| integer_attribute(child, attr))
                        .transpose()?;
                    result.device_features.push(DeviceFeatureCondition { name, version });
                }
                ConditionKind::UserCountries => {
                    let countries = parse_user_countries(child)?;
                    set_once(&mut result.user_countries, countries, USER_COUNTRIES_ELEMENT)?;
                }
                ConditionKind::DeviceGroups => {
                    let groups = parse_device_groups(child)?;
                    set_once(&mut result.device_groups, groups, DEVICE_GROUPS_ELEMENT)?;
                }
            }
        }
        if let (Some(min), Some(max)) = (result.min_sdk_version, result.max_sdk_version) {
            if min > max {
                fail!(
                    InvalidBundle,
                    "Illegal SDK-based conditional module targeting (min SDK must be less than or equal to max SDK). Provided min and max values, respectively: {}, {}",
                    min,
                    max
                );
            }
        }
        Ok(result)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, element: &str) -> BundleResult<()> {
    if slot.is_some() {
        fail!(
            InvalidBundle,
            "Multiple '<dist:{}>' conditions are not supported.",
            element
        );
    }
    *slot = Some(value);
    Ok(())
}

fn parse_user_countries(element: &XmlElement) -> BundleResult<UserCountriesCondition> {
    let exclude = match optional_dist_attribute(element, "exclude")? {
        Some(attr) => boolean_attribute(element, attr)?,
        None => false,
    };
    let mut country_codes = Vec::new();
    for child in element.child_elements() {
        classify(child, USER_COUNTRIES_ELEMENT, &[(COUNTRY_ELEMENT, ())])?;
        let code = required_dist_attribute(child, "code")?.value_as_string()?;
        country_codes.push(code.to_ascii_uppercase());
    }
    Ok(UserCountriesCondition { country_codes, exclude })
}

fn parse_device_groups(element: &XmlElement) -> BundleResult<DeviceGroupsCondition> {
    let mut group_names = BTreeSet::new();
    for child in element.child_elements() {
        classify(child, DEVICE_GROUPS_ELEMENT, &[(DEVICE_GROUP_ELEMENT, ())])?;
        let name = required_dist_attribute(child, "name")?.value_as_string()?;
        if !is_identifier(name) {
            fail!(
                InvalidBundle,
                "Device group names should start with a letter and contain only letters, numbers and underscores. Found group named '{}' in '<dist:{}>' element.",
                name,
                DEVICE_GROUP_ELEMENT
            );
        }
        group_names.insert(name.to_string());
    }
    if group_names.is_empty() {
        fail!(
            InvalidBundle,
            "At least one device group should be specified in '<dist:{}>' element.",
            DEVICE_GROUPS_ELEMENT
        );
    }
    Ok(DeviceGroupsCondition { group_names })
}

/// The `<dist:delivery>` element of a module manifest, structurally validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestDeliveryElement {
    delivery: XmlElement,
    fast_follow_allowed: bool,
}

impl ManifestDeliveryElement {
    /// Finds `<dist:module><dist:delivery>` under the manifest root. `Ok(None)`
    /// when either element is absent.
    pub fn from_manifest_root(root: &XmlElement, fast_follow_allowed: bool) -> BundleResult<Option<Self>> {
        let delivery = root
            .optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, MODULE_ELEMENT)
            .and_then(|module| module.optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, DELIVERY_ELEMENT));
        match delivery {
            Some(delivery) => Self::create(delivery.clone(), fast_follow_allowed).map(Some),
            None => Ok(None),
        }
    }

    pub fn create(delivery: XmlElement, fast_follow_allowed: bool) -> BundleResult<Self> {
        let element = ManifestDeliveryElement {
            delivery,
            fast_follow_allowed,
        };
        element.validate_structure()?;
        Ok(element)
    }

    fn delivery_kinds(&self) -> Vec<(&'static str, DeliveryKind)> {
        let mut kinds = vec![
            (INSTALL_TIME_ELEMENT, DeliveryKind::InstallTime),
            (ON_DEMAND_ELEMENT, DeliveryKind::OnDemand),
        ];
        if self.fast_follow_allowed {
            kinds.push((FAST_FOLLOW_ELEMENT, DeliveryKind::FastFollow));
        }
        kinds
    }

    fn validate_structure(&self) -> BundleResult<()> {
        let kinds = self.delivery_kinds();
        for child in self.delivery.child_elements() {
            match classify(child, DELIVERY_ELEMENT, &kinds)? {
                DeliveryKind::InstallTime => {
                    for grandchild in child.child_elements() {
                        classify(grandchild, INSTALL_TIME_ELEMENT, INSTALL_TIME_KINDS)?;
                    }
                }
                DeliveryKind::OnDemand | DeliveryKind::FastFollow => expect_no_children(child)?,
            }
        }
        Ok(())
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.delivery
            .optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, name)
    }

    fn install_time_child(&self, name: &str) -> Option<&XmlElement> {
        self.child(INSTALL_TIME_ELEMENT)
            .and_then(|install_time| install_time.optional_child_element_ns(DISTRIBUTION_NAMESPACE_URI, name))
    }

    pub fn has_install_time_element(&self) -> bool {
        self.child(INSTALL_TIME_ELEMENT).is_some()
    }

    pub fn has_on_demand_element(&self) -> bool {
        self.child(ON_DEMAND_ELEMENT).is_some()
    }

    pub fn has_fast_follow_element(&self) -> bool {
        self.fast_follow_allowed && self.child(FAST_FOLLOW_ELEMENT).is_some()
    }

    /// At least one delivery mode is declared.
    pub fn is_well_formed(&self) -> bool {
        self.has_install_time_element() || self.has_on_demand_element() || self.has_fast_follow_element()
    }

    pub fn has_module_conditions(&self) -> bool {
        self.install_time_child(CONDITIONS_ELEMENT).is_some()
    }

    /// `<dist:removable dist:value=...>` under `<dist:install-time>`.
    pub fn is_install_time_removable(&self) -> BundleResult<Option<bool>> {
        let Some(removable) = self.install_time_child(REMOVABLE_ELEMENT) else {
            return Ok(None);
        };
        let attr = required_dist_attribute(removable, "value")?;
        boolean_attribute(removable, attr).map(Some)
    }

    /// Fully validates and returns the install-time conditions. Empty when none are declared.
    pub fn module_conditions(&self) -> BundleResult<ModuleConditions> {
        match self.install_time_child(CONDITIONS_ELEMENT) {
            Some(conditions) => ModuleConditions::parse(conditions),
            None => Ok(ModuleConditions::default()),
        }
    }
}
