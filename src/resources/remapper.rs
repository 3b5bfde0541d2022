//! Moving a module's resources to another package id.

use super::{check_package_id, ResourceTable};
use crate::error::{BundleError, BundleResult};
use crate::manifest::AndroidManifest;
use crate::module::{BundleModule, ModuleEntry};
use crate::xml::binary::{decode_xml, encode_xml};
use crate::xml::{XmlAttributeBuilder, XmlNode};
use log::{debug, trace, warn};
use rayon::prelude::*;
use std::collections::BTreeSet;

fn remap_id(id: u32, old_ids: &BTreeSet<u32>, new_id: u32) -> u32 {
    if old_ids.contains(&(id >> 24)) {
        (new_id << 24) | (id & 0x00ff_ffff)
    } else {
        id
    }
}

/// Copy of `table` with every package id set to `new_id`. Values inside the
/// table, references included, are left alone.
pub fn remap_table_package_id(table: &ResourceTable, new_id: u32) -> BundleResult<ResourceTable> {
    check_package_id(new_id)?;
    let mut remapped = table.clone();
    for package in &mut remapped.packages {
        package.package_id = new_id;
    }
    Ok(remapped)
}

/// Copy of `node` where every reference attribute into one of `old_ids` now
/// points into `new_id`. Other references are kept.
pub fn remap_xml_package_id(node: &XmlNode, old_ids: &BTreeSet<u32>, new_id: u32) -> XmlNode {
    let XmlNode::Element(root) = node else {
        return node.clone();
    };
    let mut builder = root.to_builder();
    builder.for_each_attribute_recursive(&mut |attr: &mut XmlAttributeBuilder| {
        attr.map_ref_id(|id| remap_id(id, old_ids, new_id))
    });
    XmlNode::Element(builder.build())
}

fn remap_xml_entry(entry: &ModuleEntry, old_ids: &BTreeSet<u32>, new_id: u32) -> BundleResult<ModuleEntry> {
    trace!("Remapping resource references in '{}'", entry.path());
    let node = decode_xml(&entry.content()?).map_err(|err| BundleError::decode(entry.path(), err))?;
    let bytes = encode_xml(&remap_xml_package_id(&node, old_ids, new_id))?;
    Ok(entry.with_bytes(bytes))
}

/// Copy of `module` whose resource table, XML resources, and manifest all use
/// `new_id` instead of the table's current package ids. Files referenced by the
/// table but missing from the module are skipped.
pub fn remap_module_package_id(module: &BundleModule, new_id: u32) -> BundleResult<BundleModule> {
    check_package_id(new_id)?;
    let Some(table) = module.resource_table() else {
        debug!("Module '{}' has no resource table, nothing to remap", module.name());
        return Ok(module.clone());
    };
    let old_ids: BTreeSet<u32> = table.packages.iter().map(|package| package.package_id).collect();
    let remapped_table = remap_table_package_id(table, new_id)?;

    let xml_paths: Vec<_> = table.xml_file_paths()?.into_iter().collect();
    let remapped_entries = xml_paths
        .par_iter()
        .filter_map(|path| match module.entry(path) {
            Some(entry) => Some(remap_xml_entry(entry, &old_ids, new_id)),
            None => {
                warn!("Resource file '{}' is not present in module '{}'", path, module.name());
                None
            }
        })
        .collect::<BundleResult<Vec<_>>>()?;

    let manifest = AndroidManifest::create(remap_xml_package_id(&module.manifest().to_node(), &old_ids, new_id))?;

    debug!(
        "Remapped module '{}' from package ids {:?} to 0x{:02x} ({} XML files)",
        module.name(),
        old_ids,
        new_id,
        remapped_entries.len()
    );
    let mut builder = module.to_builder();
    builder.set_resource_table(remapped_table).set_manifest(manifest);
    for entry in remapped_entries {
        builder.replace_entry(entry);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ConfigValue, Entry, Package, ResourceType, ResourceValue};
    use crate::xml::{XmlElementBuilder, ANDROID_NAMESPACE_URI};

    fn layout(refs: &[u32]) -> XmlNode {
        let mut root = XmlElementBuilder::create("LinearLayout");
        root.add_namespace_declaration("android", ANDROID_NAMESPACE_URI);
        for (i, id) in refs.iter().enumerate() {
            let mut attr = XmlAttributeBuilder::create_with_namespace(ANDROID_NAMESPACE_URI, format!("attr{i}"));
            attr.set_value_as_ref_id(*id);
            root.add_attribute(attr);
        }
        XmlNode::Element(root.build())
    }

    fn ref_ids(node: &XmlNode) -> Vec<u32> {
        node.element()
            .unwrap()
            .attributes()
            .iter()
            .map(|attr| attr.value_as_ref_id().unwrap())
            .collect()
    }

    #[test]
    fn xml_references_follow_old_package_only() {
        let node = layout(&[0x0101_0002, 0x0102_0000, 0x7f01_0000]);
        let remapped = remap_xml_package_id(&node, &BTreeSet::from([0x7f]), 0x02);
        assert_eq!(ref_ids(&remapped), vec![0x0101_0002, 0x0102_0000, 0x0201_0000]);
        assert_eq!(ref_ids(&node), vec![0x0101_0002, 0x0102_0000, 0x7f01_0000]);
    }

    #[test]
    fn table_remap_only_moves_package_id() {
        let table = ResourceTable {
            packages: vec![Package {
                package_id: 1,
                package_name: "sdk".into(),
                types: vec![ResourceType {
                    type_id: 1,
                    name: "style".into(),
                    entries: vec![Entry::new(
                        "parent",
                        vec![
                            ConfigValue {
                                config: String::new(),
                                value: ResourceValue::Reference(0x0101_0003),
                            },
                            ConfigValue {
                                config: "fr".into(),
                                value: ResourceValue::Reference(0x7f01_0003),
                            },
                        ],
                    )],
                }],
            }],
        };
        let remapped = remap_table_package_id(&table, 2).unwrap();
        let mut expected = table.clone();
        expected.packages[0].package_id = 2;
        assert_eq!(remapped, expected);
        assert!(remap_table_package_id(&table, 0).is_err());
    }
}
