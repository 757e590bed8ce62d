//! Extraction records

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Value of one category in a text-mode record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The selector matched nothing
    Missing,
    /// Exactly one matched element had text
    Single(String),
    /// Zero or several matched elements had text
    Many(Vec<String>),
}

impl FieldValue {
    /// Builds a value from the per-element texts of a non-empty match
    pub fn from_texts(mut texts: Vec<String>) -> Self {
        if texts.len() == 1 {
            Self::Single(texts.remove(0))
        } else {
            Self::Many(texts)
        }
    }

    /// Text pieces in order; empty for `Missing`
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Self::Missing => Vec::new(),
            Self::Single(s) => vec![s.as_str()],
            Self::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_none(),
            Self::Single(s) => serializer.serialize_str(s),
            Self::Many(v) => v.serialize(serializer),
        }
    }
}

/// One URL's outcome
///
/// Serialized as a flat JSON object: `url` first, then either the template
/// categories in order, `urls` for link harvesting, or a single `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Extracted {
        url: String,
        fields: Vec<(String, FieldValue)>,
    },
    Links {
        url: String,
        urls: Vec<String>,
    },
    Failed {
        url: String,
        error: String,
    },
}

impl Record {
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed {
            url: url.into(),
            error: error.into(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Extracted { url, .. } | Self::Links { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Looks up a category value of an extracted record
    pub fn field(&self, category: &str) -> Option<&FieldValue> {
        match self {
            Self::Extracted { fields, .. } => fields
                .iter()
                .find(|(name, _)| name == category)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// True if no category produced any text
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Extracted { fields, .. } => fields.iter().all(|(_, v)| v.parts().is_empty()),
            Self::Links { urls, .. } => urls.is_empty(),
            Self::Failed { .. } => false,
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Extracted { url, fields } => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("url", url)?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Self::Links { url, urls } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("url", url)?;
                map.serialize_entry("urls", urls)?;
                map.end()
            }
            Self::Failed { url, error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("url", url)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracted_serializes_in_order() {
        let record = Record::Extracted {
            url: "https://x.com/p".to_string(),
            fields: vec![
                ("title".to_string(), FieldValue::Single("Hello".to_string())),
                ("tags".to_string(), FieldValue::Many(vec!["a".into(), "b".into()])),
                ("author".to_string(), FieldValue::Missing),
            ],
        };
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(
            text,
            r#"{"url":"https://x.com/p","title":"Hello","tags":["a","b"],"author":null}"#
        );
    }

    #[test]
    fn test_failed_has_only_url_and_error() {
        let record = Record::failed("https://x.com", "Disallowed by robots.txt");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"url": "https://x.com", "error": "Disallowed by robots.txt"})
        );
        assert!(record.is_error());
        assert!(record.field("title").is_none());
    }

    #[test]
    fn test_from_texts() {
        assert_eq!(
            FieldValue::from_texts(vec!["one".into()]),
            FieldValue::Single("one".into())
        );
        assert_eq!(FieldValue::from_texts(vec![]), FieldValue::Many(vec![]));
    }

    #[test]
    fn test_is_empty() {
        let record = Record::Extracted {
            url: "u".into(),
            fields: vec![
                ("a".into(), FieldValue::Missing),
                ("b".into(), FieldValue::Many(vec![])),
            ],
        };
        assert!(record.is_empty());
    }
}
