use super::{manifest_entry, zip_path};
use crate::config::BundleContext;
use crate::error::BundleError;
use crate::module::{BundleModule, ModuleEntry};
use crate::resources::{Entry, FileKind, ResourceInjector, ResourceTable};
use crate::xml::binary::{decode_xml, encode_xml};
use crate::xml::{XmlAttributeBuilder, XmlElementBuilder, XmlNode, ANDROID_NAMESPACE_URI};

const LAYOUT: &str = "res/layout/main.xml";
const MENU: &str = "res/menu/options.xml";
const RAW: &str = "res/raw/blob.bin";
const MISSING: &str = "res/xml/missing.xml";

fn reference(name: &str, id: u32) -> XmlAttributeBuilder {
    let mut attr = XmlAttributeBuilder::create_with_namespace(ANDROID_NAMESPACE_URI, name);
    attr.set_value_as_ref_id(id);
    attr
}

fn layout_bytes() -> Vec<u8> {
    let mut root = XmlElementBuilder::create("LinearLayout");
    root.add_namespace_declaration("android", ANDROID_NAMESPACE_URI)
        .add_attribute(reference("background", 0x0102_0000));
    let mut child = XmlElementBuilder::create("TextView");
    child
        .add_attribute(reference("text", 0x0103_0001))
        .add_attribute(reference("textAppearance", 0x0301_0005));
    root.add_child_element(child);
    encode_xml(&XmlNode::Element(root.build())).unwrap()
}

fn resource_table() -> ResourceTable {
    let mut injector = ResourceInjector::new(ResourceTable::with_package(1, "com.example.sdk").unwrap()).unwrap();
    injector
        .add_resource("layout", Entry::file("main", &zip_path(LAYOUT), FileKind::Xml))
        .unwrap();
    injector
        .add_resource("menu", Entry::file("options", &zip_path(MENU), FileKind::Xml))
        .unwrap();
    injector
        .add_resource("raw", Entry::file("blob", &zip_path(RAW), FileKind::Other))
        .unwrap();
    injector
        .add_resource("xml", Entry::file("missing", &zip_path(MISSING), FileKind::Xml))
        .unwrap();
    injector.build()
}

fn sdk_module(menu: Vec<u8>) -> BundleModule {
    let mut builder = BundleModule::builder("base", BundleContext::default());
    builder
        .add_entry(manifest_entry(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example.sdk"/>"#,
        ))
        .unwrap()
        .add_entry(ModuleEntry::from_bytes(zip_path(LAYOUT), layout_bytes()))
        .unwrap()
        .add_entry(ModuleEntry::from_bytes(zip_path(MENU), menu))
        .unwrap()
        .add_entry(ModuleEntry::from_bytes(zip_path(RAW), vec![0x01, 0x01, 0x00, 0x00]))
        .unwrap()
        .add_entry(ModuleEntry::from_bytes(zip_path("assets/data.bin"), vec![0x01; 8]))
        .unwrap()
        .set_resource_table(resource_table());
    builder.build().unwrap()
}

fn reference_ids(bytes: &[u8]) -> Vec<u32> {
    let node = decode_xml(bytes).unwrap();
    node.element()
        .unwrap()
        .all_elements()
        .into_iter()
        .flat_map(|element| element.attributes())
        .filter_map(|attr| attr.value_as_ref_id().ok())
        .collect()
}

#[test]
fn package_one_to_two() {
    let module = sdk_module(layout_bytes());
    let remapped = module.remap_package_id(2).unwrap();

    let table = remapped.resource_table().unwrap();
    assert_eq!(table.packages.len(), 1);
    assert_eq!(table.packages[0].package_id, 2);
    let mut expected = resource_table();
    expected.packages[0].package_id = 2;
    assert_eq!(table, &expected);

    for path in [LAYOUT, MENU] {
        let content = remapped.entry(&zip_path(path)).unwrap().content().unwrap();
        assert_eq!(reference_ids(&content), vec![0x0202_0000, 0x0203_0001, 0x0301_0005]);
    }

    for path in [RAW, "assets/data.bin"] {
        let before = module.entry(&zip_path(path)).unwrap();
        let after = remapped.entry(&zip_path(path)).unwrap();
        assert!(before.content_equals(after).unwrap());
    }
    assert!(remapped.entry(&zip_path(MISSING)).is_none());
    assert_eq!(remapped.entries().count(), module.entries().count());

    // The original module is left as it was.
    assert_eq!(module.resource_table().unwrap().packages[0].package_id, 1);
    let original = module.entry(&zip_path(LAYOUT)).unwrap().content().unwrap();
    assert_eq!(reference_ids(&original), vec![0x0102_0000, 0x0103_0001, 0x0301_0005]);
}

#[test]
fn unparseable_xml_names_path() {
    let module = sdk_module(b"not binary xml".to_vec());
    let err = module.remap_package_id(2).unwrap_err();
    assert!(matches!(&err, BundleError::Decode { path: Some(path), .. } if path == MENU), "{err}");
}

#[test]
fn invalid_target_package() {
    let module = sdk_module(layout_bytes());
    assert!(matches!(module.remap_package_id(0), Err(BundleError::InvalidArgument(_))));
    assert!(module.remap_package_id(0x100).is_err());
}
