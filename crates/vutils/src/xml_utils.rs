//! XML utilities using quick-xml for libvirt descriptors
//!
//! Domain and volume descriptors are small, so they are parsed into a simple
//! owned DOM and walked by element path. [`XmlWriter`] is the matching
//! builder used to generate descriptors.

use color_eyre::{eyre::eyre, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::collections::HashMap;
use std::io::Cursor;

/// A builder for creating XML documents with quick-xml
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for XmlWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlWriter")
            .field("len", &self.writer.get_ref().get_ref().len())
            .finish_non_exhaustive()
    }
}

impl XmlWriter {
    /// Create a new XML writer
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    /// Start an XML element with attributes
    pub fn start_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Start(element_with_attrs(name, attributes)))
            .map_err(|e| eyre!("Failed to write start element <{}>: {}", name, e))?;
        Ok(())
    }

    /// Write a simple element with text content and attributes
    pub fn write_text_element(
        &mut self,
        name: &str,
        text: &str,
        attributes: &[(&str, &str)],
    ) -> Result<()> {
        self.start_element(name, attributes)?;
        if !text.is_empty() {
            self.writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| eyre!("Failed to write text of <{}>: {}", name, e))?;
        }
        self.end_element(name)
    }

    /// Write a self-closing element with attributes
    pub fn write_empty_element(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        self.writer
            .write_event(Event::Empty(element_with_attrs(name, attributes)))
            .map_err(|e| eyre!("Failed to write empty element <{}/>: {}", name, e))?;
        Ok(())
    }

    /// End an XML element
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(|e| eyre!("Failed to write end element </{}>: {}", name, e))?;
        Ok(())
    }

    /// Get the generated XML as a string
    pub fn into_string(self) -> Result<String> {
        let bytes = self.writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| eyre!("Failed to convert XML to string: {}", e))
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn element_with_attrs<'a>(name: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for (key, value) in attributes {
        elem.push_attribute((*key, *value));
    }
    elem
}

/// Simple DOM node for XML parsing
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    /// Element name, including any namespace prefix
    pub name: String,
    /// Attribute values keyed by attribute name
    pub attributes: HashMap<String, String>,
    /// Concatenated (trimmed) text content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attributes = e
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
                (key, value)
            })
            .collect();
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Walk a `/`-separated path of direct children, like ElementTree's
    /// `findall("devices/interface")`, relative to this node.
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<&'a XmlNode> {
        let mut current = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|node| node.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        current
    }

    /// Attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Get text content of this node
    pub fn text_content(&self) -> &str {
        &self.text
    }
}

/// Parse XML string into a simple DOM structure
pub fn parse_xml_dom(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(XmlNode::from_start(&e)),
            Ok(Event::Empty(e)) => {
                let node = XmlNode::from_start(&e);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                } else if root.is_none() {
                    root = Some(node);
                }
            }
            Ok(Event::End(_)) => {
                if let Some(completed_node) = stack.pop() {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(completed_node);
                    } else {
                        root = Some(completed_node);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Ok(text), Some(current)) = (e.unescape(), stack.last_mut()) {
                    current.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(eyre!("Failed to parse XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(eyre!("Failed to parse XML: unclosed element <{}>", stack[0].name));
    }
    root.ok_or_else(|| eyre!("No root element found in XML"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_writer_debug() {
        let mut writer = XmlWriter::new();
        writer.write_empty_element("a", &[]).unwrap();
        assert_eq!(format!("{:?}", writer), "XmlWriter { len: 4, .. }");
    }

    #[test]
    fn test_xml_writer_nested() {
        let mut writer = XmlWriter::new();
        writer.start_element("domain", &[("type", "kvm")]).unwrap();
        writer.write_text_element("name", "vm1", &[]).unwrap();
        writer
            .write_text_element("memory", "1024", &[("unit", "MiB")])
            .unwrap();
        writer.start_element("devices", &[]).unwrap();
        writer
            .write_empty_element("source", &[("network", "br0_net")])
            .unwrap();
        writer.end_element("devices").unwrap();
        writer.end_element("domain").unwrap();

        let xml = writer.into_string().unwrap();
        assert!(xml.contains("<domain type=\"kvm\">"));
        assert!(xml.contains("<name>vm1</name>"));
        assert!(xml.contains("<memory unit=\"MiB\">1024</memory>"));
        assert!(xml.contains("<source network=\"br0_net\"/>"));
        assert!(xml.ends_with("</domain>"));
    }

    #[test]
    fn test_xml_writer_empty_text() {
        let mut writer = XmlWriter::new();
        writer.start_element("root", &[]).unwrap();
        writer.write_text_element("empty", "", &[("type", "test")]).unwrap();
        writer.end_element("root").unwrap();

        let xml = writer.into_string().unwrap();
        assert!(xml.contains("<empty type=\"test\"></empty>"));
    }

    #[test]
    fn test_find_all_is_relative_to_node() {
        let xml = r#"
            <domain>
                <devices>
                    <interface type="network"><mac address="a"/></interface>
                    <disk type="file"/>
                    <interface type="bridge"><mac address="b"/></interface>
                </devices>
                <metadata>
                    <devices><interface/></devices>
                </metadata>
            </domain>
        "#;

        let dom = parse_xml_dom(xml).unwrap();
        let ifaces = dom.find_all("devices/interface");
        assert_eq!(ifaces.len(), 2);
        assert_eq!(ifaces[0].attr("type"), Some("network"));
        assert_eq!(
            ifaces[1].child("mac").and_then(|m| m.attr("address")),
            Some("b")
        );
        assert!(dom.find_all("nonexistent/interface").is_empty());
    }

    #[test]
    fn test_text_and_entities() {
        let dom = parse_xml_dom("<volume><name>a&amp;b</name></volume>").unwrap();
        assert_eq!(dom.child("name").unwrap().text_content(), "a&b");
        assert_eq!(dom.find_all("name").len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_xml_dom("").is_err());
        assert!(parse_xml_dom("<domain><devices></domain>").is_err());
        assert!(parse_xml_dom("<domain>").is_err());
    }
}
