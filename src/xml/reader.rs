//! XML document parsing into an [`Element`] tree.

use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::Element;
use crate::util::{Error, Result};

/// Parse a document file.
pub fn read_file(path: &Path) -> Result<Element> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    parse_str(&content)
}

/// Parse a document from a string.
///
/// Whitespace is kept as element text and tail. Comments, processing
/// instructions and the declaration are dropped.
pub fn parse_str(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::malformed(format!("{} at byte {}", e, reader.buffer_position()))
        })?;
        match event {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let elem = start_element(&e)?;
                close_element(elem, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| Error::malformed("unbalanced end tag"))?;
                close_element(elem, &mut stack, &mut root)?;
            }
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::malformed(e.to_string()))?;
                push_text(&text, &mut stack, &mut root);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&text, &mut stack, &mut root);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::malformed(format!(
            "unexpected end of document inside <{}>",
            stack.last().map(|e| e.tag.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| Error::malformed("document has no root element"))
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let mut elem = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::malformed(e.to_string()))?
            .into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

fn close_element(
    elem: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(elem);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(elem);
            Ok(())
        }
        None => Err(Error::malformed("more than one root element")),
    }
}

fn push_text(text: &str, stack: &mut [Element], root: &mut Option<Element>) {
    let slot = match stack.last_mut() {
        Some(parent) => match parent.children.last_mut() {
            Some(last) => &mut last.tail,
            None => &mut parent.text,
        },
        // Character data after the root element closes.
        None => match root.as_mut() {
            Some(r) => &mut r.tail,
            None => return,
        },
    };
    slot.get_or_insert_with(String::new).push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_and_tail() {
        let doc = "<?xml version=\"1.0\"?>\n<a x=\"1\">\n  <b/>\n  <c>hi</c>\n</a>\n";
        let root = parse_str(doc).unwrap();
        assert_eq!(root.tag, "a");
        assert_eq!(root.get("x"), Some("1"));
        assert_eq!(root.text.as_deref(), Some("\n  "));
        assert_eq!(root.tail.as_deref(), Some("\n"));
        assert_eq!(root.children[0].tail.as_deref(), Some("\n  "));
        assert_eq!(root.children[1].text.as_deref(), Some("hi"));
        assert_eq!(root.children[1].tail.as_deref(), Some("\n"));
    }

    #[test]
    fn test_parse_escapes() {
        let root = parse_str("<a v=\"x &amp; &lt;y&gt;\">1 &lt; 2</a>").unwrap();
        assert_eq!(root.get("v"), Some("x & <y>"));
        assert_eq!(root.text.as_deref(), Some("1 < 2"));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_str("<a><b></a>"), Err(Error::MalformedDocument(_))));
        assert!(matches!(parse_str("<a>"), Err(Error::MalformedDocument(_))));
        assert!(matches!(parse_str(""), Err(Error::MalformedDocument(_))));
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_file(Path::new("/nonexistent/unisens.xml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
