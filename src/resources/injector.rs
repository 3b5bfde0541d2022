use super::{Entry, FileKind, ResourceId, ResourceTable, ResourceType, MAX_ENTRY_ID, MAX_TYPE_ID, MIN_ENTRY_ID, MIN_TYPE_ID};
use crate::error::BundleResult;
use crate::path::ZipPath;
use log::debug;
use rangemap::RangeInclusiveSet;
use std::ops::RangeInclusive;

/// Lowest id in `range` not taken by `used`.
fn lowest_free_id(used: impl Iterator<Item = u32>, range: RangeInclusive<u32>) -> Option<u32> {
    let occupied: RangeInclusiveSet<u32> = used.map(|id| id..=id).collect();
    occupied.gaps(&range).next().map(|gap| *gap.start())
}

/// Id after the highest entry id of `res_type`, so ids freed below it are never handed out again.
fn next_entry_id(res_type: &ResourceType) -> Option<u32> {
    match res_type.entries.iter().map(|entry| entry.entry_id).max() {
        Some(last) if last >= MAX_ENTRY_ID => None,
        Some(last) => Some(last + 1),
        None => Some(MIN_ENTRY_ID),
    }
}

/// Adds entries to the first package of a resource table, allocating type and
/// entry ids that are not yet in use.
#[derive(Clone, Debug)]
pub struct ResourceInjector {
    table: ResourceTable,
}

impl ResourceInjector {
    pub fn new(table: ResourceTable) -> BundleResult<Self> {
        if table.packages.is_empty() {
            fail!(InvalidArgument, "Cannot inject resources into a table without packages.");
        }
        Ok(ResourceInjector { table })
    }

    pub fn package_id(&self) -> u32 {
        self.table.packages[0].package_id
    }

    /// Stores `entry` under type `type_name`, creating the type if needed, and
    /// returns its new id. The entry id of `entry` is overwritten.
    pub fn add_resource(&mut self, type_name: &str, mut entry: Entry) -> BundleResult<ResourceId> {
        let package = &mut self.table.packages[0];
        let package_id = package.package_id;

        let type_idx = match package.types.iter().position(|res_type| res_type.name == type_name) {
            Some(idx) => idx,
            None => {
                let Some(type_id) = lowest_free_id(
                    package.types.iter().map(|res_type| res_type.type_id),
                    MIN_TYPE_ID..=MAX_TYPE_ID,
                ) else {
                    fail!(
                        ResourceExhausted,
                        "No free type id left in package 0x{:02x} for type '{}'.",
                        package_id,
                        type_name
                    )
                };
                debug!("Allocated type id 0x{:02x} for type '{}'", type_id, type_name);
                let idx = package
                    .types
                    .partition_point(|res_type| res_type.type_id < type_id);
                package.types.insert(
                    idx,
                    ResourceType {
                        type_id,
                        name: type_name.to_string(),
                        entries: Vec::new(),
                    },
                );
                idx
            }
        };

        let res_type = &mut package.types[type_idx];
        let Some(entry_id) = next_entry_id(res_type) else {
            fail!(
                ResourceExhausted,
                "No free entry id left in type '{}' of package 0x{:02x}.",
                type_name,
                package_id
            )
        };
        entry.entry_id = entry_id;
        let id = ResourceId::compose(package_id, res_type.type_id, entry_id)?;
        debug!("Injected resource '{}/{}' with id {}", type_name, entry.name, id);
        let idx = res_type.entries.partition_point(|existing| existing.entry_id < entry_id);
        res_type.entries.insert(idx, entry);
        Ok(id)
    }

    /// Adds an `xml/<name>` resource pointing at a binary XML file of the module.
    pub fn add_xml_resource(&mut self, entry_name: &str, path: &ZipPath) -> BundleResult<ResourceId> {
        self.add_resource("xml", Entry::file(entry_name, path, FileKind::Xml))
    }

    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    pub fn build(self) -> ResourceTable {
        self.table
    }
}
