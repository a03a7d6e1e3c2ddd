//! Conversion between the entry tree and XML elements.

use tracing::warn;

use super::Element;
use crate::core::{Attributes, Entry, EntryKind, METADATA_TAGS};
use crate::util::{strip_namespace, valid_filename, Error, Result};

/// Default namespace of Unisens 2.0 documents.
pub const UNISENS_NS: &str = "http://www.unisens.org/unisens2.0";

const CUSTOM_ATTRIBUTE_TAG: &str = "customAttribute";

/// Encode an entry subtree.
///
/// Custom attributes are expanded into `<customAttribute key=.. value=../>`
/// children; everything else maps one to one.
pub fn encode(entry: &Entry) -> Element {
    let mut elem = Element::new(entry.name());
    let attrs = entry.attrs();
    if entry.kind() == EntryKind::CustomAttributes {
        for (key, value) in attrs.iter() {
            elem.children.push(
                Element::new(CUSTOM_ATTRIBUTE_TAG)
                    .with_attr("key", key)
                    .with_attr("value", value),
            );
        }
    } else {
        elem.attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
    }
    elem.text = entry.text();
    for child in entry.children() {
        elem.children.push(encode(&child));
    }
    elem
}

/// Encode a container root, registering the default namespace.
pub fn encode_document(root: &Entry) -> Element {
    let mut elem = encode(root);
    if elem.get("xmlns").is_none() {
        elem.attributes
            .insert(0, ("xmlns".to_string(), UNISENS_NS.to_string()));
    }
    elem
}

/// Decode an element subtree into detached entries.
///
/// The tag (without namespace) selects the entry kind. Unknown tags become
/// generic metadata nodes.
pub fn decode(elem: &Element) -> Result<Entry> {
    let tag = strip_namespace(&elem.tag);
    let kind = EntryKind::from_tag(tag);
    if kind == EntryKind::Misc && !METADATA_TAGS.contains(&tag) {
        warn!(tag, "unknown entry type, keeping it as a metadata node");
    }
    let entry = Entry::new(kind, tag);

    let mut attrs: Attributes = elem.attributes.iter().cloned().collect();
    let mut children = elem.children.iter().collect::<Vec<_>>();

    if kind == EntryKind::CustomAttributes {
        children.retain(|child| {
            if strip_namespace(&child.tag) != CUSTOM_ATTRIBUTE_TAG {
                return true;
            }
            match (child.get("key"), child.get("value")) {
                (Some(key), value) => {
                    attrs.insert_raw(key.to_string(), value.unwrap_or_default().to_string());
                }
                (None, _) => warn!("customAttribute without key ignored"),
            }
            false
        });
    }

    if kind.is_file() {
        let id = attrs
            .get("id")
            .ok_or_else(|| Error::malformed(format!("<{tag}> without id")))?;
        valid_filename(id)?;
    }
    entry.set_attrs_raw(attrs);
    entry.set_text_raw(elem.text.clone().filter(|t| !t.trim().is_empty()));

    for child in children {
        entry.add_entry(decode(child)?)?;
    }
    Ok(entry)
}

/// Split a document root into its attributes and child elements.
///
/// The default namespace declaration is dropped, so documents with and
/// without it produce the same tree.
pub fn decode_root(elem: &Element) -> Result<(Attributes, Vec<&Element>)> {
    let tag = strip_namespace(&elem.tag);
    if tag != "unisens" {
        return Err(Error::malformed(format!("root element is <{tag}>, expected <unisens>")));
    }
    let attrs = elem
        .attributes
        .iter()
        .filter(|(k, _)| k != "xmlns")
        .cloned()
        .collect();
    Ok((attrs, elem.children.iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<unisens xmlns="http://www.unisens.org/unisens2.0" version="2.0" measurementId="Example_001">
  <customAttributes>
    <customAttribute key="weight" value="73kg"/>
    <customAttribute key="height" value="1.74m"/>
  </customAttributes>
  <signalEntry id="imp200.bin" dataType="int16" sampleRate="200">
    <binFileFormat endianess="LITTLE"/>
    <channel name="imp_left"/>
    <channel name="imp_right"/>
  </signalEntry>
  <futureEntry foo="bar"/>
</unisens>
"#;

    #[test]
    fn test_decode_dispatch() {
        let root = parse_str(DOC).unwrap();
        let (attrs, children) = decode_root(&root).unwrap();
        assert_eq!(attrs.get("measurementId"), Some("Example_001"));
        assert!(!attrs.contains("xmlns"));

        let custom = decode(children[0]).unwrap();
        assert_eq!(custom.kind(), EntryKind::CustomAttributes);
        assert_eq!(custom.attr("weight").as_deref(), Some("73kg"));
        assert_eq!(custom.attr("height").as_deref(), Some("1.74m"));
        assert_eq!(custom.len(), 0);

        let signal = decode(children[1]).unwrap();
        assert_eq!(signal.kind(), EntryKind::Signal);
        assert_eq!(signal.channel_names(), ["imp_left", "imp_right"]);
        assert_eq!(
            signal.get("binFileFormat").unwrap().attr("endianess").as_deref(),
            Some("LITTLE")
        );

        let unknown = decode(children[2]).unwrap();
        assert_eq!(unknown.kind(), EntryKind::Misc);
        assert_eq!(unknown.name(), "futureEntry");
    }

    #[test]
    fn test_custom_attributes_roundtrip() {
        let root = parse_str(DOC).unwrap();
        let custom = decode(&root.children[0]).unwrap();
        let elem = encode(&custom);
        assert_eq!(elem.len(), 2);
        assert_eq!(elem.children[0].get("key"), Some("weight"));
        assert_eq!(elem.children[1].get("value"), Some("1.74m"));
        assert!(elem.attributes.is_empty());
    }

    #[test]
    fn test_namespace_prefix_is_stripped() {
        let doc = r#"<ns0:unisens xmlns:ns0="http://www.unisens.org/unisens2.0">
<ns0:eventEntry id="t.csv"/></ns0:unisens>"#;
        let root = parse_str(doc).unwrap();
        let (_, children) = decode_root(&root).unwrap();
        let event = decode(children[0]).unwrap();
        assert_eq!(event.kind(), EntryKind::Event);
        assert_eq!(event.name(), "eventEntry");
    }

    #[test]
    fn test_text_roundtrip() {
        let root = parse_str(
            r#"<group id="g"><context schemaUrl="x">patient note</context>
  <channel name="a"/>
</group>"#,
        )
        .unwrap();
        let group = decode(&root).unwrap();
        assert_eq!(group.text(), None);
        let context = group.get("context").unwrap();
        assert_eq!(context.text().as_deref(), Some("patient note"));

        let elem = encode(&group);
        assert_eq!(elem.children[0].text.as_deref(), Some("patient note"));
        assert_eq!(decode(&elem).unwrap(), group);
    }

    #[test]
    fn test_file_entry_requires_valid_id() {
        let root = parse_str(r#"<signalEntry id="/etc/passwd"/>"#).unwrap();
        assert!(matches!(decode(&root), Err(Error::InvalidFilename(_))));
        let root = parse_str(r#"<valuesEntry/>"#).unwrap();
        assert!(matches!(decode(&root), Err(Error::MalformedDocument(_))));
    }
}
