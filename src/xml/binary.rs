//! Android binary XML (`ResXMLTree`) codec for [`XmlNode`] trees.
//!
//! Decoding keeps the attribute raw value and the typed `Res_value` apart so
//! the compiled/raw precedence of [`XmlAttribute`](crate::xml::XmlAttribute)
//! survives an encode/decode cycle. Attribute names carrying a framework
//! resource id are placed first in the string pool and listed in the
//! resource map chunk, as aapt2 does.

use crate::error::BundleError;
use crate::xml::{
    CompiledItem, XmlAttribute, XmlAttributeBuilder, XmlElement, XmlElementBuilder, XmlNamespace,
    XmlNode,
};
use std::collections::{BTreeMap, BTreeSet};

const RES_XML_TYPE: u16 = 0x0003;
const RES_STRING_POOL_TYPE: u16 = 0x0001;
const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
const RES_XML_CDATA_TYPE: u16 = 0x0104;

const STRING_POOL_HEADER_SIZE: u16 = 28;
const NODE_HEADER_SIZE: u16 = 16;
const ATTRIBUTE_SIZE: u16 = 20;
const VALUE_SIZE: u16 = 8;

const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
const STRING_FLAG_UTF8: u32 = 0x0000_0100;

const TYPE_NULL: u8 = 0x00;
const TYPE_REFERENCE: u8 = 0x01;
const TYPE_STRING: u8 = 0x03;
const TYPE_INT_DEC: u8 = 0x10;
const TYPE_INT_HEX: u8 = 0x11;
const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Result alias for XML codec operations.
pub type XmlCodecResult<T> = Result<T, XmlCodecError>;

/// Errors surfaced by the binary and text XML codecs.
#[derive(Debug)]
pub enum XmlCodecError {
    /// The document is missing the expected structure.
    MalformedDocument(String),
    /// Text XML parsing/generation failure.
    Xml(String),
}

impl std::fmt::Display for XmlCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XmlCodecError::MalformedDocument(msg) => write!(f, "Malformed XML document: {msg}"),
            XmlCodecError::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

impl std::error::Error for XmlCodecError {}

impl From<XmlCodecError> for BundleError {
    fn from(value: XmlCodecError) -> Self {
        BundleError::Decode {
            path: None,
            message: value.to_string(),
        }
    }
}

fn malformed(msg: impl Into<String>) -> XmlCodecError {
    XmlCodecError::MalformedDocument(msg.into())
}

fn truncated(what: &str) -> XmlCodecError {
    malformed(format!("Truncated {what}"))
}

/// Little-endian reads over the whole document.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self) -> XmlCodecResult<[u8; N]> {
        let end = self.pos + N;
        let taken = self
            .bytes
            .get(self.pos..end)
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or_else(|| truncated("binary XML"))?;
        self.pos = end;
        Ok(taken)
    }

    fn u8(&mut self) -> XmlCodecResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> XmlCodecResult<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> XmlCodecResult<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn index(&mut self) -> XmlCodecResult<usize> {
        Ok(self.u32()? as usize)
    }

    fn jump(&mut self, pos: usize) -> XmlCodecResult<()> {
        if pos > self.bytes.len() {
            return Err(malformed("Attempted to seek past end of document"));
        }
        self.pos = pos;
        Ok(())
    }
}

/// Bounds of one `ResChunk_header` chunk: `body` is where the header ends.
struct Chunk {
    kind: u16,
    start: usize,
    body: usize,
    end: usize,
}

impl Chunk {
    fn read(cursor: &mut Cursor<'_>) -> XmlCodecResult<Chunk> {
        let start = cursor.pos;
        let kind = cursor.u16()?;
        let header_size = usize::from(cursor.u16()?);
        let size = cursor.index()?;
        if header_size < 8 || size < header_size {
            return Err(malformed("Invalid chunk sizing in binary XML"));
        }
        let end = start
            .checked_add(size)
            .filter(|end| *end <= cursor.bytes.len())
            .ok_or_else(|| malformed("Chunk extends past end of document"))?;
        Ok(Chunk {
            kind,
            start,
            body: start + header_size,
            end,
        })
    }
}

/// The decoded `ResStringPool`. Styles are skipped.
struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn decode(cursor: &mut Cursor<'_>, chunk: &Chunk) -> XmlCodecResult<Self> {
        let count = cursor.index()?;
        cursor.u32()?; // styleCount
        let utf8 = cursor.u32()? & STRING_FLAG_UTF8 != 0;
        let strings_start = cursor.index()?;
        cursor.jump(chunk.body)?;

        let bytes = cursor.bytes;
        let region = bytes
            .get(chunk.start + strings_start..chunk.end)
            .ok_or_else(|| malformed("String data exceeds chunk bounds"))?;
        let strings = (0..count)
            .map(|_| {
                let offset = cursor.index()?;
                let entry = region
                    .get(offset..)
                    .ok_or_else(|| malformed("String offset exceeds chunk bounds"))?;
                if utf8 {
                    utf8_entry(entry)
                } else {
                    utf16_entry(entry)
                }
            })
            .collect::<XmlCodecResult<Vec<_>>>()?;
        Ok(StringPool { strings })
    }

    fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(String::as_str)
    }

    fn require(&self, idx: u32, what: &str) -> XmlCodecResult<&str> {
        self.get(idx)
            .ok_or_else(|| malformed(format!("{what} references invalid string index {idx}")))
    }
}

/// One or two bytes; the high bit of the first marks the long form.
fn utf8_length(bytes: &[u8]) -> XmlCodecResult<(usize, &[u8])> {
    match bytes {
        [high, low, rest @ ..] if high & 0x80 != 0 => {
            Ok(((usize::from(high & 0x7f) << 8) | usize::from(*low), rest))
        }
        [len, rest @ ..] if len & 0x80 == 0 => Ok((usize::from(*len), rest)),
        _ => Err(truncated("UTF-8 string length")),
    }
}

/// UTF-8 pool entry: character count, byte count, then the bytes.
fn utf8_entry(entry: &[u8]) -> XmlCodecResult<String> {
    let (_chars, rest) = utf8_length(entry)?;
    let (byte_len, rest) = utf8_length(rest)?;
    let text = rest.get(..byte_len).ok_or_else(|| truncated("UTF-8 string"))?;
    String::from_utf8(text.to_vec()).map_err(|err| malformed(err.to_string()))
}

/// UTF-16 pool entry: unit count (one or two units), then the units.
fn utf16_entry(entry: &[u8]) -> XmlCodecResult<String> {
    let mut units = entry
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    let first = units.next().ok_or_else(|| truncated("UTF-16 string length"))?;
    let len = if first & 0x8000 == 0 {
        usize::from(first)
    } else {
        let second = units.next().ok_or_else(|| truncated("UTF-16 string length"))?;
        (usize::from(first & 0x7fff) << 16) | usize::from(second)
    };
    let text: Vec<u16> = units.take(len).collect();
    if text.len() != len {
        return Err(truncated("UTF-16 string"));
    }
    String::from_utf16(&text).map_err(|err| malformed(err.to_string()))
}

fn decode_attribute_value(
    attr: &mut XmlAttributeBuilder,
    pool: &StringPool,
    raw: Option<&str>,
    data_type: u8,
    data: u32,
) -> XmlCodecResult<()> {
    if let Some(raw) = raw {
        attr.set_value_as_string(raw);
    }
    match data_type {
        TYPE_NULL => {}
        TYPE_STRING => {
            let typed = pool.require(data, "String value")?;
            if raw != Some(typed) {
                attr.set_value_as_compiled_string(typed);
            }
        }
        TYPE_REFERENCE => {
            attr.set_value_as_ref_id(data);
        }
        TYPE_INT_BOOLEAN => {
            attr.set_value_as_boolean(data != 0);
        }
        TYPE_INT_DEC => {
            attr.set_value_as_decimal_integer(data as i32);
        }
        TYPE_INT_HEX => {
            attr.set_value_as_hex_integer(data);
        }
        other => {
            attr.set_value_as_primitive(other, data);
        }
    }
    Ok(())
}

fn loaded<'p>(pool: &'p Option<StringPool>, what: &str) -> XmlCodecResult<&'p StringPool> {
    pool.as_ref()
        .ok_or_else(|| malformed(format!("{what} encountered before string pool")))
}

/// Rebuilds the element tree chunk by chunk.
struct Decoder<'a> {
    cursor: Cursor<'a>,
    pool: Option<StringPool>,
    resource_map: Vec<u32>,
    pending_namespaces: Vec<XmlNamespace>,
    open: Vec<XmlElementBuilder>,
    root: Option<XmlElement>,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Decoder {
            cursor: Cursor { bytes, pos: 0 },
            pool: None,
            resource_map: Vec::new(),
            pending_namespaces: Vec::new(),
            open: Vec::new(),
            root: None,
        }
    }

    fn run(mut self) -> XmlCodecResult<XmlNode> {
        let document = Chunk::read(&mut self.cursor)?;
        if document.kind != RES_XML_TYPE {
            return Err(malformed("Binary XML does not start with RES_XML_TYPE header"));
        }
        self.cursor.jump(document.body)?;
        while self.cursor.pos < document.end {
            let chunk = Chunk::read(&mut self.cursor)?;
            if chunk.kind == RES_STRING_POOL_TYPE {
                // Pool header fields follow the chunk header directly.
                self.pool = Some(StringPool::decode(&mut self.cursor, &chunk)?);
            } else {
                self.cursor.jump(chunk.body)?;
                match chunk.kind {
                    RES_XML_RESOURCE_MAP_TYPE => self.resource_map(&chunk)?,
                    RES_XML_START_NAMESPACE_TYPE => self.start_namespace()?,
                    RES_XML_START_ELEMENT_TYPE => self.start_element(&chunk)?,
                    RES_XML_END_ELEMENT_TYPE => self.end_element()?,
                    RES_XML_CDATA_TYPE => self.cdata()?,
                    // End-namespace and unknown chunks carry nothing the tree needs.
                    _ => {}
                }
            }
            self.cursor.jump(chunk.end)?;
        }

        if !self.open.is_empty() {
            return Err(malformed("Unclosed XML elements at end of document"));
        }
        self.root
            .map(XmlNode::Element)
            .ok_or_else(|| malformed("Document has no root element"))
    }

    fn resource_map(&mut self, chunk: &Chunk) -> XmlCodecResult<()> {
        self.resource_map.clear();
        while self.cursor.pos + 4 <= chunk.end {
            self.resource_map.push(self.cursor.u32()?);
        }
        Ok(())
    }

    fn start_namespace(&mut self) -> XmlCodecResult<()> {
        let pool = loaded(&self.pool, "Namespace chunk")?;
        let prefix = pool.get(self.cursor.u32()?).unwrap_or_default();
        let uri = pool.require(self.cursor.u32()?, "Namespace")?;
        self.pending_namespaces.push(XmlNamespace::new(prefix, uri));
        Ok(())
    }

    fn start_element(&mut self, chunk: &Chunk) -> XmlCodecResult<()> {
        let pool = loaded(&self.pool, "Start element")?;
        let namespace = pool.get(self.cursor.u32()?).unwrap_or_default();
        let name = pool.require(self.cursor.u32()?, "Element")?;
        let attribute_start = usize::from(self.cursor.u16()?);
        let attribute_size = usize::from(self.cursor.u16()?);
        let attribute_count = usize::from(self.cursor.u16()?);
        if attribute_size < usize::from(ATTRIBUTE_SIZE) {
            return Err(malformed("Attribute size must be at least 20"));
        }

        let mut element = XmlElementBuilder::create_with_namespace(namespace, name);
        for decl in self.pending_namespaces.drain(..) {
            element.add_namespace_declaration(decl.prefix, decl.uri);
        }
        for i in 0..attribute_count {
            self.cursor.jump(chunk.body + attribute_start + i * attribute_size)?;
            let namespace = pool.get(self.cursor.u32()?).unwrap_or_default();
            let name_idx = self.cursor.u32()?;
            let raw = pool.get(self.cursor.u32()?);
            if self.cursor.u16()? != VALUE_SIZE {
                return Err(malformed("Attribute value size must be 8"));
            }
            self.cursor.u8()?; // res0
            let data_type = self.cursor.u8()?;
            let data = self.cursor.u32()?;

            let mut attr = XmlAttributeBuilder::create_with_namespace(
                namespace,
                pool.require(name_idx, "Attribute name")?,
            );
            if let Some(&id) = self
                .resource_map
                .get(name_idx as usize)
                .filter(|id| **id != 0)
            {
                attr.set_resource_id(id);
            }
            decode_attribute_value(&mut attr, pool, raw, data_type, data)?;
            element.add_attribute(attr);
        }
        self.open.push(element);
        Ok(())
    }

    fn end_element(&mut self) -> XmlCodecResult<()> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| malformed("End element without matching start"))?;
        if let Some(parent) = self.open.last_mut() {
            parent.add_child_element(element);
        } else if self.root.is_none() {
            self.root = Some(element.build());
        } else {
            return Err(malformed("Multiple root elements in document"));
        }
        Ok(())
    }

    fn cdata(&mut self) -> XmlCodecResult<()> {
        let pool = loaded(&self.pool, "CDATA")?;
        let text = pool.require(self.cursor.u32()?, "CDATA")?;
        if let Some(current) = self.open.last_mut() {
            current.add_child_text(text);
        }
        Ok(())
    }
}

/// Decodes a binary XML document into its root element node.
pub fn decode_xml(bytes: &[u8]) -> XmlCodecResult<XmlNode> {
    Decoder::new(bytes).run()
}

/// Index fields and typed value of one `ResXMLTree_attribute`.
struct EncodedAttribute {
    namespace: u32,
    name: u32,
    raw: u32,
    data_type: u8,
    data: u32,
}

struct StringPoolBuilder {
    strings: Vec<String>,
    indices: BTreeMap<String, u32>,
    attribute_indices: BTreeMap<(String, u32), u32>,
    resource_map: Vec<u32>,
}

impl StringPoolBuilder {
    /// Attribute names with resource ids come first so their indices line up with the resource map.
    fn new(resource_names: BTreeSet<(u32, String)>) -> Self {
        let mut pool = StringPoolBuilder {
            strings: Vec::new(),
            indices: BTreeMap::new(),
            attribute_indices: BTreeMap::new(),
            resource_map: Vec::new(),
        };
        for (id, name) in resource_names {
            let idx = pool.strings.len() as u32;
            pool.strings.push(name.clone());
            pool.attribute_indices.insert((name, id), idx);
            pool.resource_map.push(id);
        }
        pool
    }

    fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.indices.get(value) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.indices.insert(value.to_string(), idx);
        idx
    }

    fn index_of(&self, value: &str) -> XmlCodecResult<u32> {
        self.indices
            .get(value)
            .copied()
            .ok_or_else(|| malformed(format!("Missing pool string '{value}'")))
    }

    fn attribute_name_index(&self, name: &str, resource_id: Option<u32>) -> XmlCodecResult<u32> {
        match resource_id {
            Some(id) => self
                .attribute_indices
                .get(&(name.to_string(), id))
                .copied()
                .ok_or_else(|| malformed(format!("Missing pool string for attribute '{name}'"))),
            None => self.index_of(name),
        }
    }

    fn optional_index(&self, value: &str) -> XmlCodecResult<u32> {
        if value.is_empty() {
            Ok(NO_ENTRY_INDEX)
        } else {
            self.index_of(value)
        }
    }

    fn encode_attribute(&self, attr: &XmlAttribute) -> XmlCodecResult<EncodedAttribute> {
        let (raw, data_type, data) = match attr.compiled_item() {
            None => {
                let idx = self.index_of(attr.raw_value())?;
                (idx, TYPE_STRING, idx)
            }
            Some(CompiledItem::String(typed)) => {
                (self.optional_index(attr.raw_value())?, TYPE_STRING, self.index_of(typed)?)
            }
            Some(CompiledItem::Boolean(flag)) => {
                (NO_ENTRY_INDEX, TYPE_INT_BOOLEAN, if *flag { 0xFFFF_FFFF } else { 0 })
            }
            Some(CompiledItem::DecimalInt(num)) => (NO_ENTRY_INDEX, TYPE_INT_DEC, *num as u32),
            Some(CompiledItem::HexInt(num)) => (NO_ENTRY_INDEX, TYPE_INT_HEX, *num),
            Some(CompiledItem::Reference { id, .. }) => (NO_ENTRY_INDEX, TYPE_REFERENCE, *id),
            Some(CompiledItem::Primitive { data_type, data }) => (NO_ENTRY_INDEX, *data_type, *data),
        };
        Ok(EncodedAttribute {
            namespace: self.optional_index(attr.namespace_uri())?,
            name: self.attribute_name_index(attr.name(), attr.resource_id())?,
            raw,
            data_type,
            data,
        })
    }

    /// Per-string offsets and the UTF-16 string data they point into.
    fn utf16_data(&self) -> (Vec<u32>, Vec<u8>) {
        let mut offsets = Vec::with_capacity(self.strings.len());
        let mut data = Vec::new();
        for text in &self.strings {
            offsets.push(data.len() as u32);
            let units: Vec<u16> = text.encode_utf16().collect();
            let len = units.len();
            let mut entry = if len < 0x8000 {
                vec![len as u16]
            } else {
                vec![0x8000 | ((len >> 16) & 0x7fff) as u16, (len & 0xffff) as u16]
            };
            entry.extend(units);
            entry.push(0);
            data.extend(entry.iter().flat_map(|unit| unit.to_le_bytes()));
        }
        (offsets, data)
    }
}

/// Writes chunks into one output buffer; nested chunks patch their own sizes.
struct Encoder {
    pool: StringPoolBuilder,
    out: Vec<u8>,
}

impl Encoder {
    fn put_u16(&mut self, value: u16) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn put_value(&mut self, data_type: u8, data: u32) {
        self.put_u16(VALUE_SIZE);
        self.out.extend_from_slice(&[0, data_type]);
        self.put_u32(data);
    }

    fn chunk(
        &mut self,
        kind: u16,
        header_size: u16,
        body: impl FnOnce(&mut Self) -> XmlCodecResult<()>,
    ) -> XmlCodecResult<()> {
        let start = self.out.len();
        self.put_u16(kind);
        self.put_u16(header_size);
        self.put_u32(0);
        body(self)?;
        while self.out.len() % 4 != 0 {
            self.out.push(0);
        }
        let size = u32::try_from(self.out.len() - start)
            .map_err(|_| malformed("Binary XML chunk larger than 4 GiB"))?;
        self.out[start + 4..start + 8].copy_from_slice(&size.to_le_bytes());
        Ok(())
    }

    /// Tree node chunks: line number and comment index, then the extension.
    fn node(&mut self, kind: u16, body: impl FnOnce(&mut Self) -> XmlCodecResult<()>) -> XmlCodecResult<()> {
        self.chunk(kind, NODE_HEADER_SIZE, |enc| {
            enc.put_u32(0);
            enc.put_u32(NO_ENTRY_INDEX);
            body(enc)
        })
    }

    fn string_pool(&mut self) -> XmlCodecResult<()> {
        let (offsets, data) = self.pool.utf16_data();
        let count = offsets.len() as u32;
        self.chunk(RES_STRING_POOL_TYPE, STRING_POOL_HEADER_SIZE, |enc| {
            enc.put_u32(count);
            enc.put_u32(0); // styleCount
            enc.put_u32(0); // flags: UTF-16
            enc.put_u32(u32::from(STRING_POOL_HEADER_SIZE) + count * 4);
            enc.put_u32(0); // stylesStart
            for offset in offsets {
                enc.put_u32(offset);
            }
            enc.out.extend_from_slice(&data);
            Ok(())
        })
    }

    fn resource_map(&mut self) -> XmlCodecResult<()> {
        if self.pool.resource_map.is_empty() {
            return Ok(());
        }
        let ids = self.pool.resource_map.clone();
        self.chunk(RES_XML_RESOURCE_MAP_TYPE, 8, |enc| {
            for id in ids {
                enc.put_u32(id);
            }
            Ok(())
        })
    }

    fn namespace(&mut self, kind: u16, decl: &XmlNamespace) -> XmlCodecResult<()> {
        let prefix = self.pool.index_of(&decl.prefix)?;
        let uri = self.pool.index_of(&decl.uri)?;
        self.node(kind, |enc| {
            enc.put_u32(prefix);
            enc.put_u32(uri);
            Ok(())
        })
    }

    fn element(&mut self, element: &XmlElement) -> XmlCodecResult<()> {
        for decl in element.namespace_declarations() {
            self.namespace(RES_XML_START_NAMESPACE_TYPE, decl)?;
        }

        let namespace = self.pool.optional_index(element.namespace_uri())?;
        let name = self.pool.index_of(element.name())?;
        let attributes = element
            .attributes()
            .iter()
            .map(|attr| self.pool.encode_attribute(attr))
            .collect::<XmlCodecResult<Vec<_>>>()?;
        let count = u16::try_from(attributes.len())
            .map_err(|_| malformed(format!("Too many attributes on element '{}'", element.name())))?;
        self.node(RES_XML_START_ELEMENT_TYPE, |enc| {
            enc.put_u32(namespace);
            enc.put_u32(name);
            enc.put_u16(ATTRIBUTE_SIZE); // attributeStart
            enc.put_u16(ATTRIBUTE_SIZE);
            enc.put_u16(count);
            enc.put_u16(0); // idIndex
            enc.put_u16(0); // classIndex
            enc.put_u16(0); // styleIndex
            for attr in attributes {
                enc.put_u32(attr.namespace);
                enc.put_u32(attr.name);
                enc.put_u32(attr.raw);
                enc.put_value(attr.data_type, attr.data);
            }
            Ok(())
        })?;

        for child in element.children() {
            match child {
                XmlNode::Element(child) => self.element(child)?,
                XmlNode::Text(text) => {
                    let idx = self.pool.index_of(text)?;
                    self.node(RES_XML_CDATA_TYPE, |enc| {
                        enc.put_u32(idx);
                        enc.put_value(TYPE_NULL, 0);
                        Ok(())
                    })?;
                }
            }
        }

        self.node(RES_XML_END_ELEMENT_TYPE, |enc| {
            enc.put_u32(namespace);
            enc.put_u32(name);
            Ok(())
        })?;
        for decl in element.namespace_declarations().iter().rev() {
            self.namespace(RES_XML_END_NAMESPACE_TYPE, decl)?;
        }
        Ok(())
    }
}

fn collect_resource_names(element: &XmlElement, names: &mut BTreeSet<(u32, String)>) {
    for attr in element.attributes() {
        if let Some(id) = attr.resource_id() {
            names.insert((id, attr.name().to_string()));
        }
    }
    for child in element.child_elements() {
        collect_resource_names(child, names);
    }
}

fn collect_element_strings(element: &XmlElement, pool: &mut StringPoolBuilder) {
    for decl in element.namespace_declarations() {
        pool.intern(&decl.prefix);
        pool.intern(&decl.uri);
    }
    if !element.namespace_uri().is_empty() {
        pool.intern(element.namespace_uri());
    }
    pool.intern(element.name());
    for attr in element.attributes() {
        if !attr.namespace_uri().is_empty() {
            pool.intern(attr.namespace_uri());
        }
        if attr.resource_id().is_none() {
            pool.intern(attr.name());
        }
        match attr.compiled_item() {
            None => {
                pool.intern(attr.raw_value());
            }
            Some(CompiledItem::String(typed)) => {
                pool.intern(typed);
                if !attr.raw_value().is_empty() {
                    pool.intern(attr.raw_value());
                }
            }
            Some(_) => {}
        }
    }
    for child in element.children() {
        match child {
            XmlNode::Element(child) => collect_element_strings(child, pool),
            XmlNode::Text(text) => {
                pool.intern(text);
            }
        }
    }
}

/// Encodes the element tree rooted at `node` as a binary XML document.
pub fn encode_xml(node: &XmlNode) -> XmlCodecResult<Vec<u8>> {
    let root = node
        .element()
        .ok_or_else(|| malformed("Root node must be an element"))?;

    let mut resource_names = BTreeSet::new();
    collect_resource_names(root, &mut resource_names);
    let mut pool = StringPoolBuilder::new(resource_names);
    collect_element_strings(root, &mut pool);

    let mut encoder = Encoder {
        pool,
        out: Vec::new(),
    };
    encoder.chunk(RES_XML_TYPE, 8, |enc| {
        enc.string_pool()?;
        enc.resource_map()?;
        enc.element(root)
    })?;
    Ok(encoder.out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::platform::{HAS_CODE_RESOURCE_ID, LABEL_RESOURCE_ID, NAME_RESOURCE_ID};
    use crate::xml::ANDROID_NAMESPACE_URI;

    fn sample_tree() -> XmlNode {
        let mut root = XmlElementBuilder::create("manifest");
        root.add_namespace_declaration("android", ANDROID_NAMESPACE_URI);
        root.get_or_create_attribute("", "package")
            .set_value_as_string("com.test.app");
        let app = root.get_or_create_child_element("application");
        app.get_or_create_android_attribute("hasCode", HAS_CODE_RESOURCE_ID)
            .set_value_as_boolean(false);
        app.get_or_create_android_attribute("label", LABEL_RESOURCE_ID)
            .set_value_as_ref_id(0x7f01_0003);
        app.get_or_create_android_attribute("name", NAME_RESOURCE_ID)
            .set_value_as_string("com.test.App");
        let meta = app.get_or_create_child_element("meta-data");
        meta.get_or_create_attribute("", "name").set_value_as_string("plain");
        meta.get_or_create_attribute("", "color")
            .set_value_as_primitive(0x1c, 0xff00_ff00);
        meta.get_or_create_attribute("", "count")
            .set_value_as_decimal_integer(-4);
        meta.get_or_create_attribute("", "mask").set_value_as_hex_integer(0xff);
        let compiled = meta.get_or_create_attribute("", "both");
        compiled.set_value_as_string("raw");
        compiled.set_value_as_compiled_string("compiled");
        root.get_or_create_child_element("text-holder").add_child_text("some text");
        XmlNode::Element(root.build())
    }

    #[test]
    fn encode_decode_preserves_tree() {
        let tree = sample_tree();
        let bytes = encode_xml(&tree).expect("encode");
        let decoded = decode_xml(&bytes).expect("decode");
        assert_eq!(decoded, tree);
    }

    #[test]
    fn resource_map_assigns_ids_to_android_attributes() {
        let bytes = encode_xml(&sample_tree()).unwrap();
        let decoded = decode_xml(&bytes).unwrap();
        let app = decoded
            .element()
            .and_then(|root| root.optional_child_element("application"))
            .unwrap();
        let name = app.attribute(ANDROID_NAMESPACE_URI, "name").unwrap();
        assert_eq!(name.resource_id(), Some(NAME_RESOURCE_ID));
        let meta = app.optional_child_element("meta-data").unwrap();
        assert_eq!(meta.attribute("", "name").unwrap().resource_id(), None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_xml(b"not xml at all").is_err());
        assert!(decode_xml(&[]).is_err());
        let mut bytes = encode_xml(&sample_tree()).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(decode_xml(&bytes).is_err());
    }

    fn raw_chunk(kind: u16, header_size: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&header_size.to_le_bytes());
        out.extend_from_slice(&((8 + body.len()) as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_utf8_string_pool() {
        let mut pool = words(&[1, 0, STRING_FLAG_UTF8, 32, 0, 0]);
        pool.extend_from_slice(&[8, 8]);
        pool.extend_from_slice(b"manifest\0\0");
        let mut start = words(&[0, NO_ENTRY_INDEX, NO_ENTRY_INDEX, 0]);
        start.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let end = words(&[0, NO_ENTRY_INDEX, NO_ENTRY_INDEX, 0]);

        let mut body = raw_chunk(RES_STRING_POOL_TYPE, 28, &pool);
        body.extend(raw_chunk(RES_XML_START_ELEMENT_TYPE, 16, &start));
        body.extend(raw_chunk(RES_XML_END_ELEMENT_TYPE, 16, &end));
        let document = raw_chunk(RES_XML_TYPE, 8, &body);

        let node = decode_xml(&document).unwrap();
        assert_eq!(node.element().unwrap().name(), "manifest");
        assert!(node.element().unwrap().attributes().is_empty());
    }

    #[test]
    fn long_string_lengths() {
        let (len, rest) = utf8_length(&[0x81, 0x02, 0xaa]).unwrap();
        assert_eq!((len, rest), (0x102, &[0xaa][..]));
        assert!(utf8_length(&[0x81]).is_err());

        let long = "x".repeat(0x8001);
        let mut entry = Vec::new();
        for unit in [0x8000u16, 0x8001] {
            entry.extend_from_slice(&unit.to_le_bytes());
        }
        entry.extend(long.encode_utf16().flat_map(|unit| unit.to_le_bytes()));
        assert_eq!(utf16_entry(&entry).unwrap(), long);
        assert!(utf16_entry(&entry[..entry.len() - 2]).is_err());
    }

    #[test]
    fn text_root_is_not_encodable() {
        assert!(encode_xml(&XmlNode::Text("x".into())).is_err());
    }
}
