//! Serialization of an [`Element`] tree.

use std::fs;
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::Element;
use crate::util::Result;

/// Serialize a document, including the XML declaration.
pub fn to_bytes(root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

/// Serialize a single element without declaration.
pub fn to_string(elem: &Element) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, elem)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

/// Write a document file.
pub fn write_file(path: &Path, root: &Element) -> Result<()> {
    let bytes = to_bytes(root)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn write_element<W: Write>(writer: &mut Writer<W>, elem: &Element) -> Result<()> {
    let mut start = BytesStart::new(elem.tag.as_str());
    for (key, value) in &elem.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let has_text = elem.text.as_deref().is_some_and(|t| !t.is_empty());
    if elem.children.is_empty() && !has_text {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        if let Some(text) = elem.text.as_deref().filter(|t| !t.is_empty()) {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &elem.children {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(elem.tag.as_str())))?;
    }

    if let Some(tail) = elem.tail.as_deref().filter(|t| !t.is_empty()) {
        writer.write_event(Event::Text(BytesText::new(tail)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{indent, parse_str};

    #[test]
    fn test_write_and_reparse() {
        let mut root = Element::new("unisens")
            .with_attr("xmlns", "http://www.unisens.org/unisens2.0")
            .with_attr("comment", "a \"quoted\" <comment> & more");
        let mut signal = Element::new("signalEntry").with_attr("id", "ecg.bin");
        signal.children.push(Element::new("binFileFormat").with_attr("endianess", "LITTLE"));
        root.children.push(signal);
        indent(&mut root);

        let bytes = to_bytes(&root).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<binFileFormat endianess=\"LITTLE\"/>"));

        let parsed = parse_str(&text).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn test_to_string_empty_element() {
        let elem = Element::new("channel").with_attr("name", "ch_0");
        assert_eq!(to_string(&elem).unwrap(), "<channel name=\"ch_0\"/>");
    }
}
