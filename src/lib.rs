//! # Bundlecore
//!
//! Modeling and device-targeting resolution for Android app bundles: paths
//! inside an archive, compiled XML trees, the manifest, delivery conditions,
//! resource tables, bundle modules, and APK selection for a device.
//!
//! ```no_run
//!  use bundlecore::manifest::AndroidManifest;
//!
//!  let bytes = std::fs::read("base/manifest/AndroidManifest.xml").unwrap();
//!  let manifest = AndroidManifest::from_bytes(&bytes).unwrap();
//!  println!("{}", manifest.package_name().unwrap());
//! ```
#[macro_use]
mod error;

pub mod config;
pub mod manifest;
pub mod module;
pub mod path;
pub mod resources;
pub mod targeting;
pub mod xml;

#[cfg(test)]
mod tests;

pub use config::{BundleContext, BundleType};
pub use error::{BundleError, BundleResult};
pub use manifest::AndroidManifest;
pub use module::{BundleModule, ModuleDeliveryType, ModuleEntry};
pub use path::ZipPath;
pub use resources::{ResourceId, ResourceInjector, ResourceTable};
pub use targeting::{ApkMatcher, DeviceSpec};
