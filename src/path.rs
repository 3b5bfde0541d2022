//! Slash separated, normalized paths used to key entries inside a module.
//!
//! A [`ZipPath`] never touches the filesystem. Leading, trailing and doubled
//! separators are collapsed at construction; `.` and `..` segments are
//! rejected everywhere a path can be built.

use crate::error::BundleResult;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '/';

/// An immutable, normalized path. The empty path is the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZipPath {
    names: Vec<String>,
}

impl ZipPath {
    pub const ROOT: ZipPath = ZipPath { names: Vec::new() };

    /// Parses `path`, splitting on `/` and dropping empty segments.
    pub fn create(path: &str) -> BundleResult<ZipPath> {
        ZipPath::from_names(path.split(SEPARATOR).filter(|name| !name.is_empty()))
    }

    /// Builds a path from already-split segments. Segments must not contain `/`.
    pub fn from_names<I, S>(names: I) -> BundleResult<ZipPath>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collected = Vec::new();
        for name in names {
            let name = name.into();
            check_name(&name)?;
            collected.push(name);
        }
        Ok(ZipPath { names: collected })
    }

    pub fn is_root(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Appends all segments of `other` to this path.
    pub fn resolve(&self, other: &ZipPath) -> ZipPath {
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        ZipPath { names }
    }

    pub fn resolve_str(&self, other: &str) -> BundleResult<ZipPath> {
        Ok(self.resolve(&ZipPath::create(other)?))
    }

    /// Replaces the file name of this path with `other`.
    pub fn resolve_sibling(&self, other: &ZipPath) -> BundleResult<ZipPath> {
        match self.parent() {
            Some(parent) => Ok(parent.resolve(other)),
            None => fail!(InvalidArgument, "Root has no sibling."),
        }
    }

    pub fn resolve_sibling_str(&self, other: &str) -> BundleResult<ZipPath> {
        self.resolve_sibling(&ZipPath::create(other)?)
    }

    /// Returns segments `[begin, end)`.
    pub fn subpath(&self, begin: usize, end: usize) -> BundleResult<ZipPath> {
        if begin >= end || end > self.names.len() {
            fail!(
                InvalidArgument,
                "Invalid subpath [{}, {}) of path '{}' with {} segments.",
                begin,
                end,
                self,
                self.names.len()
            );
        }
        Ok(ZipPath {
            names: self.names[begin..end].to_vec(),
        })
    }

    /// The parent path, or `None` for the root. A single segment path has the root as parent.
    pub fn parent(&self) -> Option<ZipPath> {
        if self.is_root() {
            return None;
        }
        Some(ZipPath {
            names: self.names[..self.names.len() - 1].to_vec(),
        })
    }

    /// The segment at `index` as a single segment path.
    pub fn name(&self, index: usize) -> BundleResult<ZipPath> {
        self.subpath(index, index + 1)
    }

    pub fn file_name(&self) -> Option<ZipPath> {
        self.names.last().map(|name| ZipPath {
            names: vec![name.clone()],
        })
    }

    /// Segment-wise prefix check: `dir1longer` does not start with `dir1`.
    pub fn starts_with(&self, prefix: &ZipPath) -> bool {
        self.names.len() >= prefix.names.len() && self.names[..prefix.names.len()] == prefix.names[..]
    }

    pub fn starts_with_str(&self, prefix: &str) -> bool {
        ZipPath::create(prefix).map_or(false, |prefix| self.starts_with(&prefix))
    }

    pub fn ends_with(&self, suffix: &ZipPath) -> bool {
        self.names.len() >= suffix.names.len()
            && self.names[self.names.len() - suffix.names.len()..] == suffix.names[..]
    }

    pub fn ends_with_str(&self, suffix: &str) -> bool {
        ZipPath::create(suffix).map_or(false, |suffix| self.ends_with(&suffix))
    }
}

fn check_name(name: &str) -> BundleResult<()> {
    if name.is_empty() {
        fail!(InvalidArgument, "Path segments must not be empty.");
    }
    if name.contains(SEPARATOR) {
        fail!(InvalidArgument, "Path segment '{}' contains a separator.", name);
    }
    if name == "." || name == ".." {
        fail!(InvalidArgument, "Path segments '.' and '..' are not allowed, found '{}'.", name);
    }
    Ok(())
}

impl fmt::Display for ZipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join("/"))
    }
}

impl FromStr for ZipPath {
    type Err = crate::error::BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZipPath::create(s)
    }
}

impl Serialize for ZipPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ZipPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ZipPath::create(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn path(s: &str) -> ZipPath {
        ZipPath::create(s).unwrap()
    }

    #[test]
    fn separators_are_normalized() {
        assert_eq!(path("/foo//bar/"), path("foo/bar"));
        assert_eq!(path("foo/bar").to_string(), "foo/bar");
        assert!(path("").is_root());
        assert!(path("///").is_root());
    }

    #[test]
    fn traversal_segments_rejected() {
        assert!(ZipPath::create("foo/../bar").is_err());
        assert!(ZipPath::create("./foo").is_err());
        assert!(path("foo").resolve_str("..").is_err());
        assert!(path("foo/bar").resolve_sibling_str(".").is_err());
        assert!(ZipPath::from_names(["a", "b/c"]).is_err());
    }

    #[test]
    fn subpath_bounds() {
        assert_eq!(path("foo/bar").subpath(0, 1).unwrap(), path("foo"));
        assert_eq!(path("a/b/c").subpath(1, 3).unwrap(), path("b/c"));
        assert!(path("a/b").subpath(1, 1).is_err());
        assert!(path("a/b").subpath(0, 3).is_err());
        assert!(ZipPath::ROOT.subpath(0, 1).is_err());
        assert!(ZipPath::ROOT.name(0).is_err());
    }

    #[test]
    fn parent_and_file_name() {
        assert_eq!(path("a/b/c").parent(), Some(path("a/b")));
        assert_eq!(path("a").parent(), Some(ZipPath::ROOT));
        assert_eq!(ZipPath::ROOT.parent(), None);
        assert_eq!(ZipPath::ROOT.file_name(), None);
        assert_eq!(path("a/b/c").file_name(), Some(path("c")));
        assert_eq!(path("a/b/c").name(1).unwrap(), path("b"));
    }

    #[test]
    fn resolve_sibling_of_root_fails() {
        assert!(ZipPath::ROOT.resolve_sibling(&path("x")).is_err());
        assert_eq!(path("a/b").resolve_sibling_str("c").unwrap(), path("a/c"));
        assert_eq!(path("a").resolve_sibling_str("c").unwrap(), path("c"));
    }

    #[test]
    fn prefix_matching_is_segment_wise() {
        let p = path("dir1longer/file");
        assert!(!p.starts_with(&path("dir1")));
        assert!(p.starts_with(&path("dir1longer")));
        assert!(p.starts_with(&ZipPath::ROOT));
        assert!(p.ends_with(&path("file")));
        assert!(!p.ends_with(&path("ile")));
    }

    #[test]
    fn ordering_puts_root_first() {
        let mut paths = vec![path("b"), path("a/b"), ZipPath::ROOT, path("a")];
        paths.sort();
        assert_eq!(paths, vec![ZipPath::ROOT, path("a"), path("a/b"), path("b")]);
    }

    proptest! {
        #[test]
        fn equal_iff_segments_equal(
            segs in proptest::collection::vec("[a-z]{1,4}", 0..5),
            pad in proptest::collection::vec(0usize..3, 0..6),
        ) {
            let plain = segs.join("/");
            let mut padded = String::from("/");
            for (i, seg) in segs.iter().enumerate() {
                padded.push_str(seg);
                let extra = pad.get(i).copied().unwrap_or(0);
                padded.push_str(&"/".repeat(extra + 1));
            }
            let a = ZipPath::create(&plain).unwrap();
            let b = ZipPath::create(&padded).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.name_count(), segs.len());
        }
    }
}
