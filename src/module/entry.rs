use crate::error::BundleResult;
use crate::path::ZipPath;
use std::fmt;
use std::sync::Arc;

/// Supplies the bytes of an entry. Implementations backed by an archive or a
/// file fail with a decode error when the backing data is gone.
pub trait ByteSource: fmt::Debug + Send + Sync {
    fn content(&self) -> BundleResult<Vec<u8>>;

    fn size(&self) -> BundleResult<u64> {
        Ok(self.content()?.len() as u64)
    }
}

/// Bytes already resident in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InMemoryByteSource {
    bytes: Arc<[u8]>,
}

impl InMemoryByteSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        InMemoryByteSource {
            bytes: Arc::from(bytes),
        }
    }
}

impl ByteSource for InMemoryByteSource {
    fn content(&self) -> BundleResult<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }

    fn size(&self) -> BundleResult<u64> {
        Ok(self.bytes.len() as u64)
    }
}

/// A file or directory inside a module, keyed by its path.
#[derive(Clone, Debug)]
pub struct ModuleEntry {
    path: ZipPath,
    content: Arc<dyn ByteSource>,
    is_directory: bool,
    force_uncompressed: bool,
}

impl ModuleEntry {
    pub fn new(path: ZipPath, content: Arc<dyn ByteSource>) -> Self {
        ModuleEntry {
            path,
            content,
            is_directory: false,
            force_uncompressed: false,
        }
    }

    pub fn from_bytes(path: ZipPath, bytes: impl Into<Vec<u8>>) -> Self {
        ModuleEntry::new(path, Arc::new(InMemoryByteSource::new(bytes)))
    }

    pub fn directory(path: ZipPath) -> Self {
        ModuleEntry {
            is_directory: true,
            ..ModuleEntry::from_bytes(path, Vec::new())
        }
    }

    pub fn with_force_uncompressed(mut self, force_uncompressed: bool) -> Self {
        self.force_uncompressed = force_uncompressed;
        self
    }

    /// Same entry at another path.
    pub fn with_path(&self, path: ZipPath) -> Self {
        ModuleEntry {
            path,
            ..self.clone()
        }
    }

    /// Same path and flags, new bytes.
    pub fn with_bytes(&self, bytes: impl Into<Vec<u8>>) -> Self {
        ModuleEntry {
            content: Arc::new(InMemoryByteSource::new(bytes)),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &ZipPath {
        &self.path
    }

    pub fn content(&self) -> BundleResult<Vec<u8>> {
        self.content.content()
    }

    pub fn content_size(&self) -> BundleResult<u64> {
        self.content.size()
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn force_uncompressed(&self) -> bool {
        self.force_uncompressed
    }

    /// Path, flags and bytes are all equal.
    pub fn content_equals(&self, other: &ModuleEntry) -> BundleResult<bool> {
        Ok(self.path == other.path
            && self.is_directory == other.is_directory
            && self.force_uncompressed == other.force_uncompressed
            && self.content()? == other.content()?)
    }
}
