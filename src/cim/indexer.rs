//! Key extraction strategies for managed object records.

use serde_json::Value;
use std::fmt;

use super::correlate::CorrelationError;
use super::record::Record;

/// Key is the comparable identity extracted from a record.
///
/// Instrumentation keys are case-insensitive, so keys are kept upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Key(raw.as_ref().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Indexer extracts a key from a record. It must yield a non-empty key for every record
/// of the kind it is applied to.
pub trait Indexer: Send + Sync {
    fn index(&self, record: &Record) -> Result<Key, CorrelationError>;
}

impl<F> Indexer for F
where
    F: Fn(&Record) -> Result<Key, CorrelationError> + Send + Sync,
{
    fn index(&self, record: &Record) -> Result<Key, CorrelationError> {
        self(record)
    }
}

/// Indexes records by a named scalar property.
#[derive(Debug, Clone, Copy)]
pub struct StringPropertyIndexer {
    property: &'static str,
}

pub const fn string_property(property: &'static str) -> StringPropertyIndexer {
    StringPropertyIndexer { property }
}

impl Indexer for StringPropertyIndexer {
    fn index(&self, record: &Record) -> Result<Key, CorrelationError> {
        let raw = scalar(record.get(self.property)).ok_or_else(|| {
            CorrelationError::key_extraction(record, format!("property {} is not a scalar value", self.property))
        })?;
        non_empty(record, raw, self.property)
    }
}

/// Indexes association records by the object reference stored in one of their properties.
///
/// The property holds either a reference path such as
/// `\\HOST\ROOT/Microsoft/Windows/Storage:MSFT_iSCSITarget.NodeAddress="iqn.1991-05.com.microsoft:t1"`
/// or the referenced object itself, in which case `ref_property` is read from it.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRefIndexer {
    property: &'static str,
    class: &'static str,
    ref_property: &'static str,
}

pub const fn object_ref(property: &'static str, class: &'static str, ref_property: &'static str) -> ObjectRefIndexer {
    ObjectRefIndexer {
        property,
        class,
        ref_property,
    }
}

impl Indexer for ObjectRefIndexer {
    fn index(&self, record: &Record) -> Result<Key, CorrelationError> {
        let raw = match record.get(self.property) {
            Some(Value::String(reference)) => parse_object_ref(reference, self.class, self.ref_property)
                .ok_or_else(|| {
                    CorrelationError::key_extraction(
                        record,
                        format!("invalid {} reference in {}: {}", self.class, self.property, reference),
                    )
                })?,
            Some(Value::Object(embedded)) => {
                let value = embedded
                    .get(self.ref_property)
                    .or_else(|| {
                        embedded
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(self.ref_property))
                            .map(|(_, v)| v)
                    });
                scalar(value).ok_or_else(|| {
                    CorrelationError::key_extraction(
                        record,
                        format!("embedded {} has no {}", self.property, self.ref_property),
                    )
                })?
            }
            _ => {
                return Err(CorrelationError::key_extraction(
                    record,
                    format!("property {} holds no object reference", self.property),
                ))
            }
        };
        non_empty(record, raw, self.property)
    }
}

/// Extracts the value of `ref_property` from a reference path to an instance of `class`.
///
/// Key values are either quoted, with `\\` escapes, or bare (numbers).
pub fn parse_object_ref(input: &str, class: &str, ref_property: &str) -> Option<String> {
    let marker = format!("{}.", class);
    let (start, _) = input.match_indices(&marker).find(|(i, _)| {
        input[..*i]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })?;

    let mut rest = &input[start + marker.len()..];
    loop {
        let (name, tail) = rest.split_once('=')?;
        let (value, tail) = key_value(tail)?;
        if name.trim().eq_ignore_ascii_case(ref_property) {
            return Some(value);
        }
        rest = tail.strip_prefix(',')?;
    }
}

fn key_value(input: &str) -> Option<(String, &str)> {
    let Some(quoted) = input.strip_prefix('"') else {
        let end = input.find(',').unwrap_or(input.len());
        return Some((input[..end].to_string(), &input[end..]));
    };

    let mut value = String::new();
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => value.push(chars.next()?.1),
            '"' => return Some((value, &quoted[i + 1..])),
            _ => value.push(c),
        }
    }
    None
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(record: &Record, raw: String, property: &str) -> Result<Key, CorrelationError> {
    if raw.trim().is_empty() {
        return Err(CorrelationError::key_extraction(
            record,
            format!("property {} yields an empty key", property),
        ));
    }
    Ok(Key::new(raw))
}
