//! Resource table model and packed resource identifiers.

mod injector;
mod remapper;

pub use injector::ResourceInjector;
pub use remapper::{remap_module_package_id, remap_table_package_id, remap_xml_package_id};

use crate::error::BundleResult;
use crate::path::ZipPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const MIN_PACKAGE_ID: u32 = 0x01;
pub const MAX_PACKAGE_ID: u32 = 0xff;
pub const MIN_TYPE_ID: u32 = 0x01;
pub const MAX_TYPE_ID: u32 = 0xff;
pub const MIN_ENTRY_ID: u32 = 0x0000;
pub const MAX_ENTRY_ID: u32 = 0xffff;

/// Package id that aapt2 assigns to the app's own resources.
pub const APP_PACKAGE_ID: u32 = 0x7f;

/// A packed `package << 24 | type << 16 | entry` identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn compose(package_id: u32, type_id: u32, entry_id: u32) -> BundleResult<ResourceId> {
        check_package_id(package_id)?;
        if !(MIN_TYPE_ID..=MAX_TYPE_ID).contains(&type_id) {
            fail!(InvalidArgument, "Type id must be in range [1, 255], got {}.", type_id);
        }
        if entry_id > MAX_ENTRY_ID {
            fail!(InvalidArgument, "Entry id must be in range [0, 65535], got {}.", entry_id);
        }
        Ok(ResourceId(package_id << 24 | type_id << 16 | entry_id))
    }

    pub fn from_full_id(full_id: u32) -> BundleResult<ResourceId> {
        ResourceId::compose(full_id >> 24, (full_id >> 16) & 0xff, full_id & 0xffff)
    }

    pub fn full_resource_id(&self) -> u32 {
        self.0
    }

    pub fn package_id(&self) -> u32 {
        self.0 >> 24
    }

    pub fn type_id(&self) -> u32 {
        (self.0 >> 16) & 0xff
    }

    pub fn entry_id(&self) -> u32 {
        self.0 & 0xffff
    }

    pub fn decompose(&self) -> (u32, u32, u32) {
        (self.package_id(), self.type_id(), self.entry_id())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

pub(crate) fn check_package_id(package_id: u32) -> BundleResult<()> {
    if !(MIN_PACKAGE_ID..=MAX_PACKAGE_ID).contains(&package_id) {
        fail!(InvalidArgument, "Package id must be in range [1, 255], got {}.", package_id);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Xml,
    Png,
    Other,
}

/// The value of one entry under one configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceValue {
    /// A file inside the module, e.g. `res/layout/main.xml`.
    File { path: String, kind: FileKind },
    String(String),
    Reference(u32),
    Boolean(bool),
    Integer(i32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    /// Configuration qualifiers, empty for the default configuration.
    pub config: String,
    pub value: ResourceValue,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: u32,
    pub name: String,
    pub config_values: Vec<ConfigValue>,
}

impl Entry {
    pub fn new(name: impl Into<String>, config_values: Vec<ConfigValue>) -> Self {
        Entry {
            entry_id: 0,
            name: name.into(),
            config_values,
        }
    }

    /// A single default-configuration file value.
    pub fn file(name: impl Into<String>, path: &ZipPath, kind: FileKind) -> Self {
        Entry::new(
            name,
            vec![ConfigValue {
                config: String::new(),
                value: ResourceValue::File {
                    path: path.to_string(),
                    kind,
                },
            }],
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub type_id: u32,
    pub name: String,
    pub entries: Vec<Entry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub package_id: u32,
    pub package_name: String,
    pub types: Vec<ResourceType>,
}

/// Compiled resources of one module: packages, their types, and their entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTable {
    pub packages: Vec<Package>,
}

impl ResourceTable {
    /// A table with a single empty package.
    pub fn with_package(package_id: u32, package_name: impl Into<String>) -> BundleResult<Self> {
        check_package_id(package_id)?;
        Ok(ResourceTable {
            packages: vec![Package {
                package_id,
                package_name: package_name.into(),
                types: Vec::new(),
            }],
        })
    }

    pub fn entry(&self, id: ResourceId) -> Option<&Entry> {
        self.packages
            .iter()
            .filter(|package| package.package_id == id.package_id())
            .flat_map(|package| &package.types)
            .filter(|res_type| res_type.type_id == id.type_id())
            .flat_map(|res_type| &res_type.entries)
            .find(|entry| entry.entry_id == id.entry_id())
    }

    /// Id of `type_name/entry_name`, searching packages in order.
    pub fn find_resource_id(&self, type_name: &str, entry_name: &str) -> Option<ResourceId> {
        self.resources()
            .find(|(_, res_type, entry)| res_type.name == type_name && entry.name == entry_name)
            .and_then(|(id, _, _)| id)
    }

    /// Every entry with its id, in table order. The id is `None` when the
    /// stored components are out of range.
    pub fn resources(&self) -> impl Iterator<Item = (Option<ResourceId>, &ResourceType, &Entry)> {
        self.packages.iter().flat_map(|package| {
            package.types.iter().flat_map(move |res_type| {
                res_type.entries.iter().map(move |entry| {
                    let id = ResourceId::compose(package.package_id, res_type.type_id, entry.entry_id).ok();
                    (id, res_type, entry)
                })
            })
        })
    }

    pub fn resource_ids(&self) -> BTreeSet<ResourceId> {
        self.resources().filter_map(|(id, _, _)| id).collect()
    }

    fn file_values(&self) -> impl Iterator<Item = (&str, FileKind)> {
        self.resources()
            .flat_map(|(_, _, entry)| &entry.config_values)
            .filter_map(|config_value| match &config_value.value {
                ResourceValue::File { path, kind } => Some((path.as_str(), *kind)),
                _ => None,
            })
    }

    /// Paths of all files referenced by the table.
    pub fn referenced_file_paths(&self) -> BundleResult<BTreeSet<ZipPath>> {
        self.file_values().map(|(path, _)| ZipPath::create(path)).collect()
    }

    /// Paths of referenced files compiled as binary XML.
    pub fn xml_file_paths(&self) -> BundleResult<BTreeSet<ZipPath>> {
        self.file_values()
            .filter(|(_, kind)| *kind == FileKind::Xml)
            .map(|(path, _)| ZipPath::create(path))
            .collect()
    }

    pub fn from_bytes(bytes: &[u8]) -> BundleResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn to_bytes(&self) -> BundleResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}
