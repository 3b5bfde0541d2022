//! Immutable XML tree with typed attribute values and its staging builders.
//!
//! [`XmlNode`], [`XmlElement`] and [`XmlAttribute`] are plain values: once
//! built they never change. Edits go through [`XmlElementBuilder`] (obtained
//! from [`XmlElement::to_builder`]), which owns a private copy of the tree and
//! produces a fresh immutable value on `build()`.

pub mod binary;
pub mod platform;
pub mod text;
pub(crate) mod values;

use crate::error::{BundleError, BundleResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use platform::{ANDROID_NAMESPACE_URI, DISTRIBUTION_NAMESPACE_URI, TOOLS_NAMESPACE_URI};

/// The typed ("compiled") value of an attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompiledItem {
    String(String),
    Boolean(bool),
    DecimalInt(i32),
    HexInt(u32),
    Reference { id: u32, name: Option<String> },
    /// Any other `Res_value` kind (float, dimension, color, ...) kept verbatim.
    Primitive { data_type: u8, data: u32 },
}

impl CompiledItem {
    pub fn kind_name(&self) -> &'static str {
        match self {
            CompiledItem::String(_) => "string",
            CompiledItem::Boolean(_) => "boolean",
            CompiledItem::DecimalInt(_) => "decimal integer",
            CompiledItem::HexInt(_) => "hex integer",
            CompiledItem::Reference { .. } => "reference",
            CompiledItem::Primitive { .. } => "primitive",
        }
    }
}

impl fmt::Display for CompiledItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledItem::String(s) => write!(f, "{s}"),
            CompiledItem::Boolean(b) => write!(f, "{b}"),
            CompiledItem::DecimalInt(i) => write!(f, "{i}"),
            CompiledItem::HexInt(h) => write!(f, "0x{h:x}"),
            CompiledItem::Reference { name: Some(name), .. } => write!(f, "@{name}"),
            CompiledItem::Reference { id, name: None } => write!(f, "0x{id:08x}"),
            CompiledItem::Primitive { data_type, data } => write!(f, "(0x{data_type:02x}) 0x{data:08x}"),
        }
    }
}

/// A namespace declaration (`xmlns:prefix="uri"`) carried by an element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlNamespace {
    pub prefix: String,
    pub uri: String,
}

impl XmlNamespace {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        XmlNamespace {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// An attribute. The namespace uri is empty when the attribute has none.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct XmlAttribute {
    namespace_uri: String,
    name: String,
    resource_id: Option<u32>,
    value: String,
    compiled_item: Option<CompiledItem>,
}

impl XmlAttribute {
    pub fn create(name: impl Into<String>, value: impl Into<String>) -> Self {
        XmlAttribute::create_with_namespace("", name, value)
    }

    pub fn create_with_namespace(
        namespace_uri: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        XmlAttribute {
            namespace_uri: namespace_uri.into(),
            name: name.into(),
            resource_id: None,
            value: value.into(),
            compiled_item: None,
        }
    }

    /// An `android:` attribute identified by its framework resource id.
    pub fn create_android(name: impl Into<String>, resource_id: u32, value: impl Into<String>) -> Self {
        XmlAttribute {
            resource_id: Some(resource_id),
            ..XmlAttribute::create_with_namespace(ANDROID_NAMESPACE_URI, name, value)
        }
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_id(&self) -> Option<u32> {
        self.resource_id
    }

    /// The raw textual value, possibly empty.
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    pub fn compiled_item(&self) -> Option<&CompiledItem> {
        self.compiled_item.as_ref()
    }

    pub fn value_as_string(&self) -> BundleResult<&str> {
        match &self.compiled_item {
            None => Ok(&self.value),
            Some(CompiledItem::String(s)) => Ok(s),
            Some(other) => Err(self.unexpected("string", other)),
        }
    }

    pub fn value_as_boolean(&self) -> BundleResult<bool> {
        match &self.compiled_item {
            Some(CompiledItem::Boolean(b)) => Ok(*b),
            other => Err(self.unexpected_opt("boolean", other.as_ref())),
        }
    }

    pub fn value_as_decimal_integer(&self) -> BundleResult<i32> {
        match &self.compiled_item {
            Some(CompiledItem::DecimalInt(i)) => Ok(*i),
            other => Err(self.unexpected_opt("decimal integer", other.as_ref())),
        }
    }

    pub fn value_as_hex_integer(&self) -> BundleResult<u32> {
        match &self.compiled_item {
            Some(CompiledItem::HexInt(h)) => Ok(*h),
            other => Err(self.unexpected_opt("hex integer", other.as_ref())),
        }
    }

    pub fn value_as_ref_id(&self) -> BundleResult<u32> {
        match &self.compiled_item {
            Some(CompiledItem::Reference { id, .. }) => Ok(*id),
            other => Err(self.unexpected_opt("reference", other.as_ref())),
        }
    }

    /// Human-readable value: the compiled item when present, otherwise the raw text.
    pub fn debug_string(&self) -> String {
        match &self.compiled_item {
            Some(item) => item.to_string(),
            None => self.value.clone(),
        }
    }

    pub fn to_builder(&self) -> XmlAttributeBuilder {
        XmlAttributeBuilder {
            attribute: self.clone(),
        }
    }

    fn unexpected(&self, expected: &'static str, actual: &CompiledItem) -> BundleError {
        BundleError::unexpected_type(
            expected,
            format!("{} in attribute '{}'", actual.kind_name(), self.name),
        )
    }

    fn unexpected_opt(&self, expected: &'static str, actual: Option<&CompiledItem>) -> BundleError {
        match actual {
            Some(item) => self.unexpected(expected, item),
            None => BundleError::unexpected_type(
                expected,
                format!("raw string in attribute '{}'", self.name),
            ),
        }
    }

    fn matches(&self, namespace_uri: &str, name: &str) -> bool {
        self.namespace_uri == namespace_uri && self.name == name
    }
}

/// Staging copy of an [`XmlAttribute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlAttributeBuilder {
    attribute: XmlAttribute,
}

impl XmlAttributeBuilder {
    pub fn create(name: impl Into<String>) -> Self {
        XmlAttribute::create(name, "").to_builder()
    }

    pub fn create_with_namespace(namespace_uri: impl Into<String>, name: impl Into<String>) -> Self {
        XmlAttribute::create_with_namespace(namespace_uri, name, "").to_builder()
    }

    pub fn create_android(name: impl Into<String>, resource_id: u32) -> Self {
        XmlAttribute::create_android(name, resource_id, "").to_builder()
    }

    pub fn namespace_uri(&self) -> &str {
        &self.attribute.namespace_uri
    }

    pub fn name(&self) -> &str {
        &self.attribute.name
    }

    pub fn resource_id(&self) -> Option<u32> {
        self.attribute.resource_id
    }

    pub fn compiled_item(&self) -> Option<&CompiledItem> {
        self.attribute.compiled_item.as_ref()
    }

    pub fn set_namespace_uri(&mut self, namespace_uri: impl Into<String>) -> &mut Self {
        self.attribute.namespace_uri = namespace_uri.into();
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.attribute.name = name.into();
        self
    }

    pub fn set_resource_id(&mut self, resource_id: u32) -> &mut Self {
        self.attribute.resource_id = Some(resource_id);
        self
    }

    /// Sets a raw string value and drops any compiled item.
    pub fn set_value_as_string(&mut self, value: impl Into<String>) -> &mut Self {
        self.attribute.value = value.into();
        self.attribute.compiled_item = None;
        self
    }

    /// Sets a compiled string, leaving the raw value in place. The compiled string wins on read.
    pub fn set_value_as_compiled_string(&mut self, value: impl Into<String>) -> &mut Self {
        self.attribute.compiled_item = Some(CompiledItem::String(value.into()));
        self
    }

    pub fn set_value_as_boolean(&mut self, value: bool) -> &mut Self {
        self.set_typed(CompiledItem::Boolean(value))
    }

    pub fn set_value_as_decimal_integer(&mut self, value: i32) -> &mut Self {
        self.set_typed(CompiledItem::DecimalInt(value))
    }

    pub fn set_value_as_hex_integer(&mut self, value: u32) -> &mut Self {
        self.set_typed(CompiledItem::HexInt(value))
    }

    pub fn set_value_as_ref_id(&mut self, id: u32) -> &mut Self {
        self.set_typed(CompiledItem::Reference { id, name: None })
    }

    pub fn set_value_as_ref_id_with_name(&mut self, id: u32, name: impl Into<String>) -> &mut Self {
        self.set_typed(CompiledItem::Reference {
            id,
            name: Some(name.into()),
        })
    }

    /// Replaces the id of a reference value, keeping its symbolic name. No-op for other values.
    pub(crate) fn map_ref_id(&mut self, f: impl Fn(u32) -> u32) {
        if let Some(CompiledItem::Reference { id, .. }) = &mut self.attribute.compiled_item {
            *id = f(*id);
        }
    }

    pub(crate) fn set_value_as_primitive(&mut self, data_type: u8, data: u32) -> &mut Self {
        self.set_typed(CompiledItem::Primitive { data_type, data })
    }

    fn set_typed(&mut self, item: CompiledItem) -> &mut Self {
        self.attribute.value.clear();
        self.attribute.compiled_item = Some(item);
        self
    }

    pub fn build(&self) -> XmlAttribute {
        self.attribute.clone()
    }
}

/// A child of an element: either a nested element or a text run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlNode {
    pub fn element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            XmlNode::Text(text) => Some(text),
            XmlNode::Element(_) => None,
        }
    }

    pub fn to_builder(&self) -> XmlNodeBuilder {
        match self {
            XmlNode::Element(element) => XmlNodeBuilder::Element(element.to_builder()),
            XmlNode::Text(text) => XmlNodeBuilder::Text(text.clone()),
        }
    }
}

impl From<XmlElement> for XmlNode {
    fn from(value: XmlElement) -> Self {
        XmlNode::Element(value)
    }
}

/// An element. Children keep document order; attributes compare as a set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlElement {
    namespace_uri: String,
    name: String,
    namespace_declarations: Vec<XmlNamespace>,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlNode>,
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.namespace_uri == other.namespace_uri
            && self.name == other.name
            && self.namespace_declarations == other.namespace_declarations
            && self.children == other.children
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|attr| other.attributes.contains(attr))
    }
}

impl Eq for XmlElement {}

impl XmlElement {
    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace_declarations(&self) -> &[XmlNamespace] {
        &self.namespace_declarations
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn attribute(&self, namespace_uri: &str, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|attr| attr.matches(namespace_uri, name))
    }

    pub fn attribute_ignoring_namespace(&self, name: &str) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Looks an `android:` attribute up by framework resource id.
    pub fn android_attribute(&self, resource_id: u32) -> Option<&XmlAttribute> {
        self.attributes
            .iter()
            .find(|attr| attr.resource_id == Some(resource_id))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::element)
    }

    pub fn children_elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements().filter(move |child| child.name == name)
    }

    pub fn children_elements_named_ns<'a>(
        &'a self,
        namespace_uri: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.child_elements()
            .filter(move |child| child.name == name && child.namespace_uri == namespace_uri)
    }

    pub fn optional_child_element(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|child| child.name == name)
    }

    pub fn optional_child_element_ns(&self, namespace_uri: &str, name: &str) -> Option<&XmlElement> {
        self.child_elements()
            .find(|child| child.name == name && child.namespace_uri == namespace_uri)
    }

    /// Concatenated text children.
    pub fn text(&self) -> String {
        self.children.iter().filter_map(XmlNode::text).collect()
    }

    /// This element and every descendant element, depth first in document order.
    pub fn all_elements(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            out.push(element);
            let children: Vec<&XmlElement> = element.child_elements().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    pub fn to_builder(&self) -> XmlElementBuilder {
        XmlElementBuilder {
            namespace_uri: self.namespace_uri.clone(),
            name: self.name.clone(),
            namespace_declarations: self.namespace_declarations.clone(),
            attributes: self.attributes.iter().map(XmlAttribute::to_builder).collect(),
            children: self.children.iter().map(XmlNode::to_builder).collect(),
        }
    }
}

/// Staging copy of an [`XmlNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlNodeBuilder {
    Element(XmlElementBuilder),
    Text(String),
}

impl XmlNodeBuilder {
    pub fn build(&self) -> XmlNode {
        match self {
            XmlNodeBuilder::Element(element) => XmlNode::Element(element.build()),
            XmlNodeBuilder::Text(text) => XmlNode::Text(text.clone()),
        }
    }

    fn element_mut(&mut self) -> Option<&mut XmlElementBuilder> {
        match self {
            XmlNodeBuilder::Element(element) => Some(element),
            XmlNodeBuilder::Text(_) => None,
        }
    }
}

/// Staging copy of an [`XmlElement`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlElementBuilder {
    namespace_uri: String,
    name: String,
    namespace_declarations: Vec<XmlNamespace>,
    attributes: Vec<XmlAttributeBuilder>,
    children: Vec<XmlNodeBuilder>,
}

impl XmlElementBuilder {
    pub fn create(name: impl Into<String>) -> Self {
        XmlElementBuilder::create_with_namespace("", name)
    }

    pub fn create_with_namespace(namespace_uri: impl Into<String>, name: impl Into<String>) -> Self {
        XmlElementBuilder {
            namespace_uri: namespace_uri.into(),
            name: name.into(),
            namespace_declarations: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn set_namespace_uri(&mut self, namespace_uri: impl Into<String>) -> &mut Self {
        self.namespace_uri = namespace_uri.into();
        self
    }

    pub fn add_namespace_declaration(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> &mut Self {
        let decl = XmlNamespace::new(prefix, uri);
        if !self.namespace_declarations.contains(&decl) {
            self.namespace_declarations.push(decl);
        }
        self
    }

    pub fn attribute(&self, namespace_uri: &str, name: &str) -> Option<&XmlAttributeBuilder> {
        self.attributes
            .iter()
            .find(|attr| attr.attribute.matches(namespace_uri, name))
    }

    pub fn android_attribute(&self, resource_id: u32) -> Option<&XmlAttributeBuilder> {
        self.attributes
            .iter()
            .find(|attr| attr.attribute.resource_id == Some(resource_id))
    }

    pub fn attribute_mut(&mut self, namespace_uri: &str, name: &str) -> Option<&mut XmlAttributeBuilder> {
        self.attributes
            .iter_mut()
            .find(|attr| attr.attribute.matches(namespace_uri, name))
    }

    pub fn android_attribute_mut(&mut self, resource_id: u32) -> Option<&mut XmlAttributeBuilder> {
        self.attributes
            .iter_mut()
            .find(|attr| attr.attribute.resource_id == Some(resource_id))
    }

    /// Adds `attribute`, replacing one with the same namespace and name.
    pub fn add_attribute(&mut self, attribute: XmlAttributeBuilder) -> &mut Self {
        let (namespace_uri, name) = (attribute.namespace_uri().to_string(), attribute.name().to_string());
        match self.attribute_mut(&namespace_uri, &name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
        self
    }

    pub fn get_or_create_attribute(&mut self, namespace_uri: &str, name: &str) -> &mut XmlAttributeBuilder {
        let idx = match self
            .attributes
            .iter()
            .position(|attr| attr.attribute.matches(namespace_uri, name))
        {
            Some(idx) => idx,
            None => {
                self.attributes
                    .push(XmlAttributeBuilder::create_with_namespace(namespace_uri, name));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[idx]
    }

    /// Finds an `android:` attribute by resource id (falling back to its name), creating it if absent.
    pub fn get_or_create_android_attribute(&mut self, name: &str, resource_id: u32) -> &mut XmlAttributeBuilder {
        let idx = self
            .attributes
            .iter()
            .position(|attr| attr.attribute.resource_id == Some(resource_id))
            .or_else(|| {
                self.attributes
                    .iter()
                    .position(|attr| attr.attribute.matches(ANDROID_NAMESPACE_URI, name))
            });
        let idx = match idx {
            Some(idx) => idx,
            None => {
                self.attributes
                    .push(XmlAttributeBuilder::create_android(name, resource_id));
                self.attributes.len() - 1
            }
        };
        let attr = &mut self.attributes[idx];
        attr.set_resource_id(resource_id);
        attr
    }

    pub fn remove_attribute(&mut self, namespace_uri: &str, name: &str) -> &mut Self {
        self.attributes
            .retain(|attr| !attr.attribute.matches(namespace_uri, name));
        self
    }

    pub fn remove_android_attribute(&mut self, resource_id: u32) -> &mut Self {
        self.attributes
            .retain(|attr| attr.attribute.resource_id != Some(resource_id));
        self
    }

    pub fn add_child_element(&mut self, child: XmlElementBuilder) -> &mut Self {
        self.children.push(XmlNodeBuilder::Element(child));
        self
    }

    pub fn add_child_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.children.push(XmlNodeBuilder::Text(text.into()));
        self
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElementBuilder> {
        self.children.iter_mut().filter_map(XmlNodeBuilder::element_mut)
    }

    pub fn optional_child_element_mut(&mut self, name: &str) -> Option<&mut XmlElementBuilder> {
        self.child_elements_mut().find(|child| child.name == name)
    }

    pub fn get_or_create_child_element(&mut self, name: &str) -> &mut XmlElementBuilder {
        self.get_or_create_child_element_ns("", name)
    }

    pub fn get_or_create_child_element_ns(&mut self, namespace_uri: &str, name: &str) -> &mut XmlElementBuilder {
        self.get_or_create_child_element_matching(
            |e| e.name == name && e.namespace_uri == namespace_uri,
            || XmlElementBuilder::create_with_namespace(namespace_uri, name),
        )
    }

    /// The first child element accepted by `predicate`, appending `create()` when there is none.
    pub fn get_or_create_child_element_matching(
        &mut self,
        predicate: impl Fn(&XmlElementBuilder) -> bool,
        create: impl FnOnce() -> XmlElementBuilder,
    ) -> &mut XmlElementBuilder {
        let existing = self
            .children
            .iter()
            .position(|child| matches!(child, XmlNodeBuilder::Element(e) if predicate(e)));
        let idx = match existing {
            Some(idx) => idx,
            None => {
                self.children.push(XmlNodeBuilder::Element(create()));
                self.children.len() - 1
            }
        };
        match &mut self.children[idx] {
            XmlNodeBuilder::Element(element) => element,
            XmlNodeBuilder::Text(_) => unreachable!("position matched an element"),
        }
    }

    pub fn remove_child_elements_if(&mut self, predicate: impl Fn(&XmlElementBuilder) -> bool) -> &mut Self {
        self.children.retain(|child| match child {
            XmlNodeBuilder::Element(element) => !predicate(element),
            XmlNodeBuilder::Text(_) => true,
        });
        self
    }

    /// Applies `f` to every attribute of this element and of all descendants.
    pub fn for_each_attribute_recursive(&mut self, f: &mut impl FnMut(&mut XmlAttributeBuilder)) {
        for attr in &mut self.attributes {
            f(attr);
        }
        for child in self.child_elements_mut() {
            child.for_each_attribute_recursive(f);
        }
    }

    pub fn build(&self) -> XmlElement {
        XmlElement {
            namespace_uri: self.namespace_uri.clone(),
            name: self.name.clone(),
            namespace_declarations: self.namespace_declarations.clone(),
            attributes: self.attributes.iter().map(XmlAttributeBuilder::build).collect(),
            children: self.children.iter().map(XmlNodeBuilder::build).collect(),
        }
    }
}
