//! Generic XML element tree.
//!
//! Text and tail follow the ElementTree convention: `text` is the character
//! data right after the start tag, `tail` the character data after the end
//! tag, up to the next sibling.

/// A parsed or to-be-written XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified tag name as written in the document.
    pub tag: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Character data before the first child.
    pub text: Option<String>,
    /// Character data after the end tag.
    pub tail: Option<String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Add an attribute (builder style).
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an attribute, keeping the position of an existing key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Get an attribute value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Number of child elements.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of elements in this subtree, including self.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }
}

fn is_blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |t| t.trim().is_empty())
}

/// Insert newline/indent text and tails, two spaces per level.
///
/// Whitespace-only text is replaced, real character data is left alone.
/// Applying this to an already indented tree changes nothing, so documents
/// stay byte-identical over repeated save/load cycles.
pub fn indent(elem: &mut Element) {
    indent_level(elem, 0);
}

fn indent_level(elem: &mut Element, level: usize) {
    let i = format!("\n{}", "  ".repeat(level));
    if !elem.children.is_empty() {
        if is_blank(&elem.text) {
            elem.text = Some(format!("{i}  "));
        }
        if is_blank(&elem.tail) {
            elem.tail = Some(i.clone());
        }
        for child in &mut elem.children {
            indent_level(child, level + 1);
        }
        if let Some(last) = elem.children.last_mut() {
            if is_blank(&last.tail) {
                last.tail = Some(i);
            }
        }
    } else if level > 0 && is_blank(&elem.tail) {
        elem.tail = Some(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Element {
        let mut root = Element::new("unisens").with_attr("version", "2.0");
        let mut signal = Element::new("signalEntry").with_attr("id", "ecg.bin");
        signal.children.push(Element::new("channel").with_attr("name", "a"));
        signal.children.push(Element::new("channel").with_attr("name", "b"));
        root.children.push(signal);
        root.children.push(Element::new("context"));
        root
    }

    #[test]
    fn test_indent_layout() {
        let mut root = sample_tree();
        indent(&mut root);

        assert_eq!(root.text.as_deref(), Some("\n  "));
        assert_eq!(root.tail.as_deref(), Some("\n"));
        let signal = &root.children[0];
        assert_eq!(signal.text.as_deref(), Some("\n    "));
        assert_eq!(signal.tail.as_deref(), Some("\n  "));
        assert_eq!(signal.children[0].tail.as_deref(), Some("\n    "));
        assert_eq!(signal.children[1].tail.as_deref(), Some("\n  "));
        assert_eq!(root.children[1].tail.as_deref(), Some("\n"));
    }

    #[test]
    fn test_indent_idempotent() {
        let mut once = sample_tree();
        indent(&mut once);
        let mut twice = once.clone();
        indent(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_indent_keeps_real_text() {
        let mut root = Element::new("a");
        let mut b = Element::new("b");
        b.text = Some("payload".into());
        root.children.push(b);
        indent(&mut root);
        assert_eq!(root.children[0].text.as_deref(), Some("payload"));
        assert_eq!(root.count(), 2);
    }
}
