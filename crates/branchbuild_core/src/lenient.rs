//! Tolerant deserializers for fields that hand-edited projects author
//! inconsistently (`"min": "2"`, `"tags": "magic, fire"`).

use serde::{Deserialize, Deserializer};

/// A number that may have been written as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Deserializes an optional number, accepting numeric strings.
///
/// Unparseable strings become `None`, the same as an absent field.
pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Number(n)) => Some(n),
        Some(NumberOrText::Text(text)) => text.trim().parse::<f64>().ok(),
        None => None,
    })
}

/// A list that may have been written as a single comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrText {
    List(Vec<String>),
    Text(String),
}

/// Deserializes a string list, accepting `"a, b"` as well as `["a", "b"]`.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<ListOrText>::deserialize(deserializer)?;
    Ok(match raw {
        Some(ListOrText::List(list)) => list
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(ListOrText::Text(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "opt_number")]
        n: Option<f64>,
        #[serde(default, deserialize_with = "string_list")]
        tags: Vec<String>,
    }

    #[test]
    fn test_numeric_string_accepted() {
        let probe: Probe = serde_json::from_str(r#"{"n": " 4 ", "tags": []}"#).unwrap();
        assert_eq!(probe.n, Some(4.0));
    }

    #[test]
    fn test_garbage_number_is_absent() {
        let probe: Probe = serde_json::from_str(r#"{"n": "lots"}"#).unwrap();
        assert_eq!(probe.n, None);
    }

    #[test]
    fn test_comma_string_tags() {
        let probe: Probe = serde_json::from_str(r#"{"tags": "magic, fire,,"}"#).unwrap();
        assert_eq!(probe.tags, vec!["magic".to_string(), "fire".to_string()]);
    }

    #[test]
    fn test_missing_fields_default() {
        let probe: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(probe.n, None);
        assert!(probe.tags.is_empty());
    }
}
