use super::{APPLICATION_ELEMENT, META_DATA_ELEMENT, SPLITS_REQUIRED_META_DATA};
use crate::xml::platform::{EXTRACT_NATIVE_LIBS_RESOURCE_ID, NAME_RESOURCE_ID, VALUE_RESOURCE_ID};
use crate::xml::XmlElementBuilder;

/// A single edit applied to a manifest. Applying the same mutator twice
/// gives the same tree as applying it once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ManifestMutator {
    /// Sets `android:extractNativeLibs` on `<application>`.
    ExtractNativeLibs(bool),
    /// Sets the `com.android.vending.splits.required` meta-data value.
    SplitsRequired(bool),
}

impl ManifestMutator {
    pub(crate) fn apply(&self, manifest: &mut XmlElementBuilder) {
        let application = manifest.get_or_create_child_element(APPLICATION_ELEMENT);
        match *self {
            ManifestMutator::ExtractNativeLibs(value) => {
                application
                    .get_or_create_android_attribute("extractNativeLibs", EXTRACT_NATIVE_LIBS_RESOURCE_ID)
                    .set_value_as_boolean(value);
            }
            ManifestMutator::SplitsRequired(value) => {
                meta_data_mut(application, SPLITS_REQUIRED_META_DATA)
                    .get_or_create_android_attribute("value", VALUE_RESOURCE_ID)
                    .set_value_as_boolean(value);
            }
        }
    }
}

/// The `<meta-data>` child named `name`, created when missing.
pub(crate) fn meta_data_mut<'a>(application: &'a mut XmlElementBuilder, name: &str) -> &'a mut XmlElementBuilder {
    application.get_or_create_child_element_matching(
        |child| is_meta_data_named(child, name),
        || {
            let mut meta = XmlElementBuilder::create(META_DATA_ELEMENT);
            meta.get_or_create_android_attribute("name", NAME_RESOURCE_ID)
                .set_value_as_string(name);
            meta
        },
    )
}

fn is_meta_data_named(element: &XmlElementBuilder, name: &str) -> bool {
    element.name() == META_DATA_ELEMENT
        && element
            .android_attribute(NAME_RESOURCE_ID)
            .map(|attr| attr.build().value_as_string().ok() == Some(name))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::AndroidManifest;

    fn manifest() -> AndroidManifest {
        AndroidManifest::from_xml_text(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.test.app">
                 <application android:hasCode="true"/>
               </manifest>"#,
        )
        .unwrap()
    }

    #[test]
    fn extract_native_libs() {
        let m = manifest().apply_mutators(&[ManifestMutator::ExtractNativeLibs(false)]);
        assert_eq!(m.extract_native_libs().unwrap(), Some(false));
        assert!(m.has_code().unwrap());
        let flipped = m.apply_mutators(&[ManifestMutator::ExtractNativeLibs(true)]);
        assert_eq!(flipped.extract_native_libs().unwrap(), Some(true));
    }

    #[test]
    fn splits_required() {
        let m = manifest().apply_mutators(&[ManifestMutator::SplitsRequired(true)]);
        assert!(m.splits_required().unwrap());
    }

    #[test]
    fn mutators_are_idempotent() {
        let mutators = [
            ManifestMutator::ExtractNativeLibs(false),
            ManifestMutator::SplitsRequired(true),
        ];
        let once = manifest().apply_mutators(&mutators);
        let twice = once.apply_mutators(&mutators);
        assert_eq!(once, twice);
        assert_eq!(
            twice
                .application()
                .unwrap()
                .children_elements_named("meta-data")
                .count(),
            1
        );
    }

    #[test]
    fn original_is_untouched() {
        let original = manifest();
        let _ = original.apply_mutators(&[ManifestMutator::ExtractNativeLibs(false)]);
        assert_eq!(original.extract_native_libs().unwrap(), None);
    }
}
