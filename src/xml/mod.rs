//! XML document layer.
//!
//! A small element tree with ElementTree-style text/tail, a reader and
//! writer built on quick-xml, and the codec between elements and entries.

pub mod codec;
pub mod element;
pub mod reader;
pub mod writer;

pub use codec::{decode, decode_root, encode, encode_document, UNISENS_NS};
pub use element::{indent, Element};
pub use reader::{parse_str, read_file};
pub use writer::{to_bytes, to_string, write_file};
