//! Loader for the property-list (plist) XML subset used by TextMate grammar
//! and theme files: `plist`, `dict`, `key`, `string`, `integer`, `array`.
//!
//! Grounded on `PlistReader` in the original C++ implementation, which reads
//! the same five element kinds and warns and skips anything else. Rather
//! than hand-rolling an XML event loop, parsing itself is delegated to the
//! `plist` crate — the dedicated plist reader `trishume-syntect` and
//! `rhysd-syntect` both depend on for this exact file format — and its
//! general `plist::Value` tree is narrowed down to the five-kind subset this
//! crate actually recognises.

use snafu::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("malformed plist xml: {source}"))]
    Xml { source: plist::Error },
    #[snafu(display("malformed plist xml: {message}"))]
    Malformed { message: String },
}

/// A parsed plist value: string, integer, ordered list, or key/value map.
///
/// `true`/`false`/`real`/`date`/`data` are outside the recognised subset
/// (section 6); they are never produced, only warned about and skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Array(Vec<Value>),
    Dict(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Dict(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up `key` if this value is a dict, else `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?.get(key)
    }

    /// Convenience for `get(key).and_then(Value::as_str)`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Convenience for `get(key).and_then(Value::as_array)`.
    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key)?.as_array()
    }

    /// Convenience for `get(key).and_then(Value::as_dict)`.
    pub fn get_dict(&self, key: &str) -> Option<&HashMap<String, Value>> {
        self.get(key)?.as_dict()
    }
}

/// Parses a complete plist XML document into a single root [`Value`].
pub fn parse_str(xml: &str) -> Result<Value, Error> {
    let raw = plist::Value::from_reader_xml(Cursor::new(xml.as_bytes())).context(XmlSnafu)?;
    narrow(&raw).ok_or_else(|| Error::Malformed {
        message: "plist document has no recognised root element".to_string(),
    })
}

/// Reads a plist file from disk and parses it.
pub fn parse_path(path: &Path) -> Result<Value, Error> {
    let raw = plist::Value::from_file(path).context(XmlSnafu)?;
    narrow(&raw).ok_or_else(|| Error::Malformed {
        message: format!("{} has no recognised root element", path.display()),
    })
}

/// Narrows a general `plist::Value` down to the five-kind subset (section 6),
/// warning and dropping anything outside it — `real`/`date`/`data`/booleans
/// at leaf position, and any dict entry or array element built from them.
fn narrow(value: &plist::Value) -> Option<Value> {
    match value {
        plist::Value::String(s) => Some(Value::String(s.clone())),
        plist::Value::Integer(n) => match n.as_signed() {
            Some(n) => Some(Value::Integer(n)),
            None => {
                tracing::warn!(?n, "plist integer out of i64 range, defaulting to 0");
                Some(Value::Integer(0))
            }
        },
        plist::Value::Array(items) => Some(Value::Array(items.iter().filter_map(narrow).collect())),
        plist::Value::Dictionary(dict) => Some(Value::Dict(
            dict.iter().filter_map(|(k, v)| narrow(v).map(|v| (k.clone(), v))).collect(),
        )),
        other => {
            tracing::warn!(kind = ?other, "skipping unrecognised plist element");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parses_flat_dict() {
        let xml = r#"<?xml version="1.0"?>
<plist version="1.0">
<dict>
    <key>scopeName</key>
    <string>source.abc</string>
    <key>count</key>
    <integer>3</integer>
</dict>
</plist>"#;
        let value = parse_str(xml).unwrap();
        assert_eq!(value.get_str("scopeName"), Some("source.abc"));
        assert_eq!(value.get("count").and_then(Value::as_integer), Some(3));
    }

    #[test]
    fn parses_nested_array_of_dicts() {
        let xml = r#"<plist><dict>
            <key>patterns</key>
            <array>
                <dict><key>match</key><string>a|b|c</string></dict>
                <dict><key>include</key><string>#expr</string></dict>
            </array>
        </dict></plist>"#;
        let value = parse_str(xml).unwrap();
        let patterns = value.get_array("patterns").unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].get_str("match"), Some("a|b|c"));
        assert_eq!(patterns[1].get_str("include"), Some("#expr"));
    }

    #[test]
    fn empty_elements_default_sensibly() {
        let xml = "<plist><dict><key>name</key><string></string><key>n</key><integer>0</integer></dict></plist>";
        let value = parse_str(xml).unwrap();
        assert_eq!(value.get_str("name"), Some(""));
        assert_eq!(value.get("n").and_then(Value::as_integer), Some(0));
    }

    #[test]
    fn unknown_elements_are_skipped_not_fatal() {
        let xml = r#"<plist><dict>
            <key>real</key><real>1.5</real>
            <key>kept</key><string>yes</string>
        </dict></plist>"#;
        let value = parse_str(xml).unwrap();
        assert_eq!(value.get_str("kept"), Some("yes"));
        assert!(value.get("real").is_none());
    }

    #[test_case("<plist><dict>" ; "unterminated dict")]
    #[test_case("" ; "empty document")]
    fn malformed_documents_error(xml: &str) {
        assert!(parse_str(xml).is_err());
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = "<plist><dict><key>k</key><string>a &amp; b &lt;c&gt;</string></dict></plist>";
        let value = parse_str(xml).unwrap();
        assert_eq!(value.get_str("k"), Some("a & b <c>"));
    }
}
