//! Text XML reader/writer for [`XmlNode`] trees.
//!
//! Parsing infers compiled values from the literals of namespaced attributes
//! (see [`values`](super::values)) and attaches framework resource ids to known
//! `android:` attributes. Attributes without a namespace, and `android:`
//! attributes of string format, keep their text unless it is a reference. A
//! prefix with no `xmlns` declaration in scope leaves the attribute without a
//! namespace.

use crate::xml::binary::{XmlCodecError, XmlCodecResult};
use crate::xml::platform::{android_attribute_id, is_string_android_attribute};
use crate::xml::values::parse_compiled_literal;
use crate::xml::{
    CompiledItem, XmlAttribute, XmlAttributeBuilder, XmlElement, XmlElementBuilder, XmlNode,
    ANDROID_NAMESPACE_URI,
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

fn xml_error(err: impl std::fmt::Display) -> XmlCodecError {
    XmlCodecError::Xml(err.to_string())
}

fn malformed(msg: &str) -> XmlCodecError {
    XmlCodecError::MalformedDocument(msg.to_string())
}

struct PendingAttribute {
    prefix: Option<String>,
    local_name: String,
    value: String,
}

fn split_qname(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

fn lookup_namespace_uri(stack: &[BTreeMap<String, String>], prefix: Option<&str>) -> Option<String> {
    let key = prefix.unwrap_or("");
    stack.iter().rev().find_map(|frame| frame.get(key).cloned())
}

fn extract_attributes(
    start: &BytesStart<'_>,
) -> XmlCodecResult<(BTreeMap<String, String>, Vec<PendingAttribute>)> {
    let mut namespaces = BTreeMap::new();
    let mut attrs = Vec::new();
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        if key == "xmlns" {
            namespaces.insert(String::new(), value);
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.insert(prefix.to_string(), value);
        } else {
            let (prefix, local_name) = split_qname(key);
            attrs.push(PendingAttribute {
                prefix,
                local_name,
                value,
            });
        }
    }
    Ok((namespaces, attrs))
}

fn build_attribute(attr: PendingAttribute, ns_stack: &[BTreeMap<String, String>]) -> XmlAttributeBuilder {
    // Unprefixed attributes never inherit the default namespace.
    let namespace_uri = attr
        .prefix
        .as_deref()
        .and_then(|prefix| lookup_namespace_uri(ns_stack, Some(prefix)))
        .unwrap_or_default();
    let mut builder = XmlAttributeBuilder::create_with_namespace(namespace_uri.as_str(), attr.local_name.as_str());
    if namespace_uri == ANDROID_NAMESPACE_URI {
        if let Some(id) = android_attribute_id(&attr.local_name) {
            builder.set_resource_id(id);
        }
    }
    let string_only = namespace_uri.is_empty()
        || (namespace_uri == ANDROID_NAMESPACE_URI && is_string_android_attribute(&attr.local_name));
    let literal = parse_compiled_literal(&attr.value)
        .filter(|item| !string_only || matches!(item, CompiledItem::Reference { .. }));
    match literal {
        Some(CompiledItem::Boolean(flag)) => builder.set_value_as_boolean(flag),
        Some(CompiledItem::DecimalInt(num)) => builder.set_value_as_decimal_integer(num),
        Some(CompiledItem::HexInt(num)) => builder.set_value_as_hex_integer(num),
        Some(CompiledItem::Reference { id, .. }) => builder.set_value_as_ref_id(id),
        _ => builder.set_value_as_string(attr.value),
    };
    builder
}

fn build_element(
    start: &BytesStart<'_>,
    ns_stack: &mut Vec<BTreeMap<String, String>>,
) -> XmlCodecResult<XmlElementBuilder> {
    let (decls, attrs) = extract_attributes(start)?;
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let (prefix, local) = split_qname(&raw_name);
    ns_stack.push(decls.clone());
    let namespace_uri = lookup_namespace_uri(ns_stack, prefix.as_deref()).unwrap_or_default();
    let mut element = XmlElementBuilder::create_with_namespace(namespace_uri, local);
    for (prefix, uri) in decls {
        element.add_namespace_declaration(prefix, uri);
    }
    for attr in attrs {
        element.add_attribute(build_attribute(attr, ns_stack));
    }
    Ok(element)
}

fn attach(
    stack: &mut Vec<XmlElementBuilder>,
    root: &mut Option<XmlElement>,
    element: XmlElementBuilder,
) -> XmlCodecResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.add_child_element(element);
    } else if root.is_none() {
        *root = Some(element.build());
    } else {
        return Err(malformed("Multiple root elements in document"));
    }
    Ok(())
}

/// Parses a text XML document into its root element node.
pub fn parse_xml(xml: &str) -> XmlCodecResult<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buffer = Vec::new();
    let mut stack: Vec<XmlElementBuilder> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut ns_stack: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];

    loop {
        match reader.read_event_into(&mut buffer).map_err(xml_error)? {
            Event::Start(start) => {
                let element = build_element(&start, &mut ns_stack)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = build_element(&start, &mut ns_stack)?;
                ns_stack.pop();
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("Unbalanced end tag in document"))?;
                if ns_stack.len() <= 1 {
                    return Err(malformed("Namespace stack underflow"));
                }
                ns_stack.pop();
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let content = text.unescape().map_err(xml_error)?;
                if let Some(current) = stack.last_mut() {
                    if !content.trim().is_empty() {
                        current.add_child_text(content.trim());
                    }
                }
            }
            Event::CData(text) => {
                let content = std::str::from_utf8(&text).map_err(xml_error)?;
                if let Some(current) = stack.last_mut() {
                    current.add_child_text(content);
                }
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
        buffer.clear();
    }

    if !stack.is_empty() {
        return Err(malformed("Unclosed XML elements in document"));
    }
    root.map(XmlNode::Element)
        .ok_or_else(|| malformed("Document does not have a root element"))
}

fn attribute_text(attr: &XmlAttribute) -> String {
    match attr.compiled_item() {
        None => attr.raw_value().to_string(),
        Some(CompiledItem::String(s)) => s.clone(),
        Some(CompiledItem::Reference { id, .. }) => format!("@0x{id:08x}"),
        Some(CompiledItem::Primitive { data, .. }) if attr.raw_value().is_empty() => format!("0x{data:x}"),
        Some(CompiledItem::Primitive { .. }) => attr.raw_value().to_string(),
        Some(other) => other.to_string(),
    }
}

fn qualified(prefixes: &[(String, String)], uri: &str, local: &str) -> String {
    if uri.is_empty() {
        return local.to_string();
    }
    match prefixes.iter().rev().find(|(_, u)| u == uri) {
        Some((prefix, _)) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn write_element(
    element: &XmlElement,
    writer: &mut Writer<Vec<u8>>,
    prefixes: &mut Vec<(String, String)>,
) -> XmlCodecResult<()> {
    let scope = prefixes.len();
    for decl in element.namespace_declarations() {
        prefixes.push((decl.prefix.clone(), decl.uri.clone()));
    }
    let name = qualified(prefixes, element.namespace_uri(), element.name());
    let mut start = BytesStart::new(name.as_str());
    for decl in element.namespace_declarations() {
        let key = if decl.prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{}", decl.prefix)
        };
        start.push_attribute((key.as_str(), decl.uri.as_str()));
    }
    for attr in element.attributes() {
        let key = qualified(prefixes, attr.namespace_uri(), attr.name());
        let value = attribute_text(attr);
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children().is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        for child in element.children() {
            match child {
                XmlNode::Element(child) => write_element(child, writer, prefixes)?,
                XmlNode::Text(text) => writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(xml_error)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_error)?;
    }
    prefixes.truncate(scope);
    Ok(())
}

/// Renders the element tree rooted at `node` as text XML.
pub fn write_xml(node: &XmlNode) -> XmlCodecResult<String> {
    let root = node
        .element()
        .ok_or_else(|| malformed("Root node must be an element"))?;
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    write_element(root, &mut writer, &mut Vec::new())?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}
