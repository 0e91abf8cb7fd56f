//! Ledger records returned by queries, and composite keys.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ShimError, ShimResult};

/// Separates the segments of a composite key.
pub const COMPOSITE_KEY_DELIMITER: char = '\u{0}';

/// Highest code point; never legal inside a key segment, used as the open
/// upper bound of partial key range scans.
pub const MAX_UNICODE_RUNE: char = '\u{10FFFF}';

/// A key/value pair yielded by range and rich queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyValue {
    pub namespace: String,
    pub key: String,
    pub value: Bytes,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            namespace: String::new(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string_value(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// One entry of a key's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KeyModification {
    pub tx_id: String,
    pub value: Bytes,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_delete: bool,
}

impl KeyModification {
    pub fn string_value(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// An object type plus ordered attributes, encoded into a single key as
/// `\0 type \0 attr1 \0 attr2 \0 ...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    object_type: String,
    attributes: Vec<String>,
}

impl CompositeKey {
    pub fn new<I, S>(object_type: impl Into<String>, attributes: I) -> ShimResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let object_type = object_type.into();
        let attributes: Vec<String> = attributes.into_iter().map(Into::into).collect();
        validate_segment(&object_type)?;
        for attribute in &attributes {
            validate_segment(attribute)?;
        }
        Ok(Self {
            object_type,
            attributes,
        })
    }

    /// Splits an encoded key back into its parts.
    pub fn parse(key: &str) -> ShimResult<Self> {
        let body = key.strip_prefix(COMPOSITE_KEY_DELIMITER).unwrap_or(key);
        let mut segments: Vec<&str> = body.split(COMPOSITE_KEY_DELIMITER).collect();
        if segments.len() > 1 && segments.last().is_some_and(|last| last.is_empty()) {
            segments.pop();
        }
        if body.is_empty() {
            return Err(ShimError::InvalidCompositeKey {
                message: "composite key is empty".to_string(),
            });
        }

        let object_type = segments.remove(0);
        Self::new(object_type, segments)
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn into_parts(self) -> (String, Vec<String>) {
        (self.object_type, self.attributes)
    }

    /// Half-open range covering every key that extends this one.
    pub fn range(&self) -> (String, String) {
        let start = self.to_string();
        let mut end = start.clone();
        end.push(MAX_UNICODE_RUNE);
        (start, end)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", COMPOSITE_KEY_DELIMITER, self.object_type, COMPOSITE_KEY_DELIMITER)?;
        for attribute in &self.attributes {
            write!(f, "{}{}", attribute, COMPOSITE_KEY_DELIMITER)?;
        }
        Ok(())
    }
}

impl FromStr for CompositeKey {
    type Err = ShimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_segment(segment: &str) -> ShimResult<()> {
    let found = segment
        .chars()
        .enumerate()
        .find(|(_, c)| *c == COMPOSITE_KEY_DELIMITER || *c == MAX_UNICODE_RUNE);
    match found {
        Some((index, c)) => Err(ShimError::InvalidCompositeKey {
            message: format!(
                "For input string '{}', found 'U+{:06X}' at index {}.",
                segment, c as u32, index
            ),
        }),
        None => Ok(()),
    }
}
