//! Namespace-aware XML element tree.
//!
//! The codec builds outbound messages as an [`XmlElement`] tree and reads
//! inbound messages from one. The reader is hardened for attacker-controlled
//! input:
//!
//! - any `<!DOCTYPE>` is rejected, so neither internal entity definitions nor
//!   external DTD or entity fetches can ever take effect
//! - references to undefined entities are errors
//! - undeclared namespace prefixes and mismatched end tags are errors
//! - document size and element depth are bounded by [`CodecConfig`]

use std::borrow::Cow;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, PrefixDeclaration, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::config::CodecConfig;
use crate::error::{SamlError, SamlResult};

/// An XML element with its attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    prefix: Option<String>,
    namespace: Option<String>,
    local_name: String,
    namespace_declarations: Vec<(String, String)>,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// Creates an element in `namespace`, written with `prefix`.
    ///
    /// The prefix must be declared on this element or an ancestor before the
    /// tree is written.
    #[must_use]
    pub fn new(namespace: &str, prefix: &str, local_name: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            namespace: Some(namespace.to_string()),
            local_name: local_name.to_string(),
            ..Self::default()
        }
    }

    /// Declares `prefix` as bound to `uri` on this element.
    #[must_use]
    pub fn with_namespace_declaration(mut self, prefix: &str, uri: &str) -> Self {
        self.namespace_declarations
            .push((prefix.to_string(), uri.to_string()));
        self
    }

    /// Sets an attribute, returning the element.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Sets the text content, returning the element.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Appends a child element, returning the element.
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// The local (unprefixed) name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// The resolved namespace URI, if the element is in a namespace.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The prefix the element is written with.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns true if the element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name == local_name
    }

    /// Looks up an unqualified attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in document order, excluding namespace declarations.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Namespace declarations made on this element, as `(prefix, uri)`.
    ///
    /// A default namespace declaration has an empty prefix.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespace_declarations
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Child elements in document order.
    #[must_use]
    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// The first child element with the given namespace and local name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| child.is(namespace, local_name))
    }

    /// The text content directly inside this element, exactly as written.
    ///
    /// For an element with children this includes the whitespace between
    /// them.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn qualified_name(&self) -> Cow<'_, str> {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                Cow::Owned(format!("{prefix}:{}", self.local_name))
            }
            _ => Cow::Borrowed(&self.local_name),
        }
    }

    /// Writes the tree as XML text, without an XML declaration.
    pub fn to_xml_string(&self) -> SamlResult<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(write_error)
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let name = self.qualified_name();
        let mut start = BytesStart::new(name.as_ref());

        for (prefix, uri) in &self.namespace_declarations {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{prefix}")
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            return writer.write_event(Event::Empty(start)).map_err(write_error);
        }

        writer.write_event(Event::Start(start)).map_err(write_error)?;
        if !self.text.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.text)))
                .map_err(write_error)?;
        }
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_ref())))
            .map_err(write_error)
    }

    /// Parses a complete document and returns its root element.
    pub fn parse(xml: &str, config: &CodecConfig) -> SamlResult<Self> {
        if xml.len() > config.max_document_size {
            return Err(SamlError::malformed(format!(
                "document exceeds maximum size ({} > {} bytes)",
                xml.len(),
                config.max_document_size
            )));
        }

        let mut reader = NsReader::from_str(xml);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            let namespace = match event {
                Event::Start(_) | Event::Empty(_) => namespace_uri(resolved)?,
                _ => None,
            };

            match event {
                Event::Start(start) => {
                    check_open(&stack, root.is_some(), config)?;
                    stack.push(Self::from_start(namespace, &start)?);
                }
                Event::Empty(start) => {
                    check_open(&stack, root.is_some(), config)?;
                    let element = Self::from_start(namespace, &start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SamlError::malformed("unexpected end tag"))?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    match stack.last_mut() {
                        Some(current) => current.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(SamlError::malformed("text outside the root element")),
                    }
                }
                Event::CData(data) => {
                    let data = utf8(&data)?;
                    match stack.last_mut() {
                        Some(current) => current.text.push_str(data),
                        None => return Err(SamlError::malformed("CDATA outside the root element")),
                    }
                }
                Event::DocType(_) => {
                    return Err(SamlError::malformed(
                        "document type declarations are not permitted",
                    ));
                }
                Event::Eof => break,
                // Declarations, comments and processing instructions carry no message data.
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SamlError::malformed("unexpected end of document"));
        }
        root.ok_or_else(|| SamlError::malformed("document has no root element"))
    }

    fn from_start(namespace: Option<String>, start: &BytesStart<'_>) -> SamlResult<Self> {
        let prefix = match start.name().prefix() {
            Some(prefix) => Some(utf8(prefix.as_ref())?.to_string()),
            None => None,
        };
        let mut element = Self {
            prefix,
            namespace,
            local_name: utf8(start.local_name().as_ref())?.to_string(),
            ..Self::default()
        };

        for attr in start.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            match attr.key.as_namespace_binding() {
                Some(PrefixDeclaration::Default) => {
                    element.namespace_declarations.push((String::new(), value));
                }
                Some(PrefixDeclaration::Named(prefix)) => {
                    element
                        .namespace_declarations
                        .push((utf8(prefix)?.to_string(), value));
                }
                None => {
                    element
                        .attributes
                        .push((utf8(attr.key.as_ref())?.to_string(), value));
                }
            }
        }

        Ok(element)
    }
}

fn check_open(stack: &[XmlElement], has_root: bool, config: &CodecConfig) -> SamlResult<()> {
    if has_root {
        return Err(SamlError::malformed("content after the root element"));
    }
    if stack.len() >= config.max_element_depth {
        return Err(SamlError::malformed(format!(
            "element nesting exceeds maximum depth of {}",
            config.max_element_depth
        )));
    }
    Ok(())
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn namespace_uri(resolved: ResolveResult<'_>) -> SamlResult<Option<String>> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => Ok(Some(utf8(uri)?.to_string())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(SamlError::malformed(format!(
            "undeclared namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::malformed(format!("invalid UTF-8: {e}")))
}

fn write_error(err: impl std::fmt::Display) -> SamlError {
    SamlError::XmlWrite(err.to_string())
}
