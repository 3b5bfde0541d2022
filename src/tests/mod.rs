mod allocation;
mod delivery;
mod remap;

use crate::config::BundleContext;
use crate::manifest::AndroidManifest;
use crate::module::{BundleModule, ModuleEntry, MANIFEST_PATH};
use crate::path::ZipPath;

pub(crate) fn zip_path(text: &str) -> ZipPath {
    ZipPath::create(text).expect("valid zip path")
}

pub(crate) fn manifest_entry(xml: &str) -> ModuleEntry {
    let manifest = AndroidManifest::from_xml_text(xml).expect("parse manifest text");
    ModuleEntry::from_bytes(zip_path(MANIFEST_PATH), manifest.to_bytes().expect("encode manifest"))
}

pub(crate) fn module_from_manifest(name: &str, xml: &str) -> BundleModule {
    BundleModule::builder(name, BundleContext::default())
        .add_entry(manifest_entry(xml))
        .expect("add manifest")
        .build()
        .expect("build module")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_survives_module_bytes() {
        let module = module_from_manifest("base", r#"<manifest package="com.example.app" split="base"/>"#);
        assert_eq!(module.manifest().package_name().unwrap(), "com.example.app");
        let rebuilt = BundleModule::builder("base", BundleContext::default())
            .add_entries(module.config_entries().unwrap())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(rebuilt.manifest(), module.manifest());
    }
}
