use super::module_from_manifest;
use crate::manifest::AndroidManifest;
use crate::module::ModuleDeliveryType;
use crate::targeting::ModuleTargeting;

fn manifest_with_module(module_body: &str) -> String {
    format!(
        r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
                     xmlns:dist="http://schemas.android.com/apk/distribution"
                     package="com.example.app" split="feature">
             <dist:module dist:type="feature">{module_body}</dist:module>
           </manifest>"#
    )
}

fn manifest_with_sdk(min_sdk: Option<i32>, conditions: &str) -> String {
    let uses_sdk = min_sdk
        .map(|version| format!(r#"<uses-sdk android:minSdkVersion="{version}"/>"#))
        .unwrap_or_default();
    format!(
        r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
                     xmlns:dist="http://schemas.android.com/apk/distribution"
                     package="com.example.app" split="feature">
             {uses_sdk}
             <dist:module dist:type="feature">
               <dist:delivery><dist:install-time>{conditions}</dist:install-time></dist:delivery>
             </dist:module>
           </manifest>"#
    )
}

fn targeting(min_sdk: Option<i32>, conditions: &str) -> ModuleTargeting {
    module_from_manifest("feature", &manifest_with_sdk(min_sdk, conditions))
        .module_targeting()
        .unwrap()
}

#[test]
fn no_conditions_ignores_manifest_min_sdk() {
    assert_eq!(targeting(Some(21), ""), ModuleTargeting::default());
}

#[test]
fn empty_conditions_carry_manifest_min_sdk() {
    let module = module_from_manifest("feature", &manifest_with_sdk(Some(21), "<dist:conditions/>"));
    assert_eq!(
        module.module_targeting().unwrap(),
        ModuleTargeting {
            min_sdk_version: Some(21),
            ..ModuleTargeting::default()
        }
    );
    assert_eq!(module.delivery_type().unwrap(), ModuleDeliveryType::ConditionalInitialInstall);
}

#[test]
fn max_sdk_condition_keeps_manifest_min_sdk() {
    let conditions = r#"<dist:conditions><dist:max-sdk dist:value="30"/></dist:conditions>"#;
    assert_eq!(
        targeting(Some(21), conditions),
        ModuleTargeting {
            min_sdk_version: Some(21),
            max_sdk_version: Some(30),
            ..ModuleTargeting::default()
        }
    );
}

#[test]
fn max_sdk_condition_without_manifest_min_sdk() {
    let conditions = r#"<dist:conditions><dist:max-sdk dist:value="30"/></dist:conditions>"#;
    assert_eq!(
        targeting(None, conditions),
        ModuleTargeting {
            max_sdk_version: Some(30),
            ..ModuleTargeting::default()
        }
    );
}

#[test]
fn min_sdk_condition_overrides_manifest() {
    let conditions = r#"<dist:conditions><dist:min-sdk dist:value="26"/></dist:conditions>"#;
    assert_eq!(targeting(Some(21), conditions).min_sdk_version, Some(26));
    assert_eq!(targeting(None, conditions).min_sdk_version, Some(26));
}

#[test]
fn on_demand_only() {
    let manifest = AndroidManifest::from_xml_text(&manifest_with_module(
        "<dist:delivery><dist:on-demand/></dist:delivery>",
    ))
    .unwrap();
    let delivery = manifest.manifest_delivery_element(true).unwrap().unwrap();
    assert!(delivery.has_on_demand_element());
    assert!(!delivery.has_install_time_element());
    assert!(delivery.is_well_formed());

    let module = module_from_manifest(
        "feature",
        &manifest_with_module("<dist:delivery><dist:on-demand/></dist:delivery>"),
    );
    assert_eq!(module.delivery_type().unwrap(), ModuleDeliveryType::NoInitialInstall);
}

#[test]
fn empty_delivery_is_not_well_formed() {
    let xml = manifest_with_module("<dist:delivery/>");
    let manifest = AndroidManifest::from_xml_text(&xml).unwrap();
    let delivery = manifest.manifest_delivery_element(true).unwrap().unwrap();
    assert!(!delivery.is_well_formed());

    let module = module_from_manifest("feature", &xml);
    assert!(module.delivery_type().unwrap_err().is_invalid_bundle());
}

#[test]
fn min_sdk_value_without_namespace() {
    let module = module_from_manifest(
        "feature",
        &manifest_with_module(
            r#"<dist:delivery><dist:install-time><dist:conditions>
                 <dist:min-sdk value="21"/>
               </dist:conditions></dist:install-time></dist:delivery>"#,
        ),
    );
    let err = module.module_targeting().unwrap_err();
    let message = err.to_string();
    assert!(err.is_invalid_bundle());
    assert!(message.contains("'dist:value'"), "{message}");
    assert!(message.contains("'min-sdk'"), "{message}");
}

#[test]
fn unknown_condition_is_rejected() {
    let module = module_from_manifest(
        "feature",
        &manifest_with_module(
            r#"<dist:delivery><dist:install-time><dist:conditions>
                 <dist:screen-size dist:value="large"/>
               </dist:conditions></dist:install-time></dist:delivery>"#,
        ),
    );
    let message = module.module_targeting().unwrap_err().to_string();
    assert!(message.contains("'screen-size'"), "{message}");
    assert!(message.contains("'<dist:conditions>'"), "{message}");
}

#[test]
fn install_time_conditions_in_metadata() {
    let module = module_from_manifest(
        "feature",
        &manifest_with_module(
            r#"<dist:delivery><dist:install-time><dist:conditions>
                 <dist:device-feature dist:name="android.hardware.camera.ar"/>
                 <dist:user-countries dist:exclude="true">
                   <dist:country dist:code="fr"/>
                 </dist:user-countries>
                 <dist:min-sdk dist:value="24"/>
               </dist:conditions></dist:install-time></dist:delivery>"#,
        ),
    );
    let metadata = module.module_metadata(false).unwrap();
    assert_eq!(metadata.delivery_type, ModuleDeliveryType::ConditionalInitialInstall);
    assert_eq!(metadata.targeting.min_sdk_version, Some(24));
    let countries = metadata.targeting.user_countries.unwrap();
    assert_eq!(countries.country_codes, vec!["FR"]);
    assert!(countries.exclude);
}

#[test]
fn fast_follow_depends_on_context() {
    let xml = manifest_with_module("<dist:delivery><dist:fast-follow/></dist:delivery>");
    let manifest = AndroidManifest::from_xml_text(&xml).unwrap();
    assert!(manifest
        .manifest_delivery_element(true)
        .unwrap()
        .unwrap()
        .has_fast_follow_element());
    assert!(manifest.manifest_delivery_element(false).is_err());
}
