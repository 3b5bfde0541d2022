use super::zip_path;
use crate::error::BundleError;
use crate::resources::{Entry, FileKind, ResourceInjector, ResourceTable, ResourceType, ResourceValue};

fn empty_app_table() -> ResourceTable {
    ResourceTable::with_package(0x7f, "com.example.app").expect("app package id")
}

#[test]
fn first_xml_resource_in_empty_table() {
    let mut injector = ResourceInjector::new(empty_app_table()).unwrap();
    let id = injector
        .add_xml_resource("network_security_config", &zip_path("res/xml/network_security_config.xml"))
        .unwrap();
    assert_eq!(id.full_resource_id(), 0x7f01_0000);
    assert_eq!(id.decompose(), (0x7f, 1, 0));

    let second = injector
        .add_xml_resource("splits0", &zip_path("res/xml/splits0.xml"))
        .unwrap();
    assert_eq!(second.full_resource_id(), 0x7f01_0001);

    let table = injector.build();
    assert_eq!(table.packages[0].types.len(), 1);
    assert_eq!(table.packages[0].types[0].name, "xml");
    assert_eq!(table.find_resource_id("xml", "splits0"), Some(second));
    assert!(matches!(
        &table.entry(second).unwrap().config_values[0].value,
        ResourceValue::File { path, kind: FileKind::Xml } if path == "res/xml/splits0.xml"
    ));
}

#[test]
fn existing_ids_are_never_reused() {
    let mut table = empty_app_table();
    table.packages[0].types.push(ResourceType {
        type_id: 1,
        name: "xml".into(),
        entries: vec![Entry {
            entry_id: 0,
            ..Entry::new("existing", vec![])
        }],
    });
    let mut injector = ResourceInjector::new(table).unwrap();
    let id = injector.add_resource("xml", Entry::new("fresh", vec![])).unwrap();
    assert_eq!(id.entry_id(), 1);
    assert_eq!(injector.table().resource_ids().len(), 2);
}

#[test]
fn full_type_is_exhausted() {
    let mut table = empty_app_table();
    table.packages[0].types.push(ResourceType {
        type_id: 1,
        name: "xml".into(),
        entries: vec![Entry {
            entry_id: 0xffff,
            ..Entry::new("last", vec![])
        }],
    });
    let mut injector = ResourceInjector::new(table).unwrap();
    let err = injector.add_resource("xml", Entry::new("overflow", vec![])).unwrap_err();
    assert!(matches!(err, BundleError::ResourceExhausted(_)), "{err}");
    // Other types still have room.
    let id = injector.add_resource("raw", Entry::new("ok", vec![])).unwrap();
    assert_eq!(id.type_id(), 2);
}

#[test]
fn full_package_is_exhausted() {
    let mut table = empty_app_table();
    table.packages[0].types = (1..=255)
        .map(|type_id| ResourceType {
            type_id,
            name: format!("type{type_id}"),
            entries: vec![],
        })
        .collect();
    let mut injector = ResourceInjector::new(table).unwrap();
    let err = injector.add_xml_resource("x", &zip_path("res/xml/x.xml")).unwrap_err();
    assert!(matches!(err, BundleError::ResourceExhausted(_)), "{err}");
    assert!(!err.is_invalid_bundle());
}
