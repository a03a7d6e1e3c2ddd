//! Identifier and filename helpers.

use super::{Error, Result};

/// Characters that may not appear in an entry id on any supported filesystem.
const RESERVED_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Check that a tag or attribute key is valid.
///
/// In XML this mostly means the key must not start with a digit.
pub fn valid_key(key: &str) -> Result<&str> {
    match key.chars().next() {
        None => Err(Error::InvalidKey(key.to_string())),
        Some(c) if c.is_ascii_digit() => Err(Error::InvalidKey(key.to_string())),
        Some(_) => Ok(key),
    }
}

/// Check that an entry id is a legal relative filename.
///
/// Sub-directories are allowed with either `/` or `\`, but the id may not
/// start with a separator, contain `..` components or reserved characters.
pub fn valid_filename(id: &str) -> Result<&str> {
    let invalid = || Error::InvalidFilename(id.to_string());
    if id.is_empty() || id.starts_with(['/', '\\']) {
        return Err(invalid());
    }
    if id.contains(RESERVED_FILENAME_CHARS) || id.chars().any(char::is_control) {
        return Err(invalid());
    }
    if id.split(['/', '\\']).any(|part| part.is_empty() || part == "..") {
        return Err(invalid());
    }
    Ok(id)
}

/// Turn any string into an identifier-safe key.
///
/// Characters other than `a-z`, `A-Z`, `0-9` and `_` become `_`; a leading
/// digit gets an `x_` prefix.
pub fn make_key(s: &str) -> String {
    let mut key = String::with_capacity(s.len() + 2);
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        key.push_str("x_");
    }
    key.extend(
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }),
    );
    key
}

/// Strip an XML namespace qualifier (`{uri}tag` or `prefix:tag`).
pub fn strip_namespace(tag: &str) -> &str {
    let tag = tag.rsplit('}').next().unwrap_or(tag);
    tag.rsplit(':').next().unwrap_or(tag)
}

/// Lower-case the first character (`SignalEntry` -> `signalEntry`).
pub fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Use `/` as the only separator of an id.
pub fn normalize_separators(id: &str) -> String {
    id.replace('\\', "/")
}

/// Split `name.ext` into `("name", Some("ext"))`. Leading dots are not extensions.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    let base_start = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    match name[base_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = base_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
        _ => (name, None),
    }
}

/// Last path component of an id, with either separator.
pub fn basename(id: &str) -> &str {
    id.rsplit(['/', '\\']).next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        assert_eq!(make_key("abcde12345"), "abcde12345");
        assert_eq!(make_key("12abcde12345"), "x_12abcde12345");
        assert_eq!(make_key("1#$%^&*()[]"), "x_1__________");
        assert_eq!(make_key("FEAT1.bin"), "FEAT1_bin");
    }

    #[test]
    fn test_valid_filename() {
        for c in ['<', '>', ':', '|', '?', '*'] {
            assert!(valid_filename(&c.to_string()).is_err());
        }
        assert!(valid_filename("/test.bin").is_err());
        assert!(valid_filename("\\test.bin").is_err());
        assert!(valid_filename("../test.bin").is_err());
        assert!(valid_filename("").is_err());
        assert!(valid_filename("asd/asd\\asd2$.bin").is_ok());
    }

    #[test]
    fn test_valid_key() {
        assert!(matches!(valid_key("4a"), Err(Error::InvalidKey(_))));
        assert!(valid_key("").is_err());
        assert_eq!(valid_key("abC").unwrap(), "abC");
    }

    #[test]
    fn test_strip_namespace() {
        assert_eq!(strip_namespace("abc"), "abc");
        assert_eq!(strip_namespace("{https:////}{{{{}}}}abc"), "abc");
        assert_eq!(
            strip_namespace("{http://www.unisens.org/unisens2.0}signalEntry"),
            "signalEntry"
        );
        assert_eq!(strip_namespace("ns0:unisens"), "unisens");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("test.csv"), ("test", Some("csv")));
        assert_eq!(split_extension("sub/feat1.txt"), ("sub/feat1", Some("txt")));
        assert_eq!(split_extension("sub.d/feat1"), ("sub.d/feat1", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
        assert_eq!(basename("sub\\feat2.txt"), "feat2.txt");
        assert_eq!(lowercase_first("SignalEntry"), "signalEntry");
    }
}
