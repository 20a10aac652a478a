//! Variable-name extraction from chunk-level model responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FIRST_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*?\]").unwrap());

/// Pull variable names out of a response shaped like
/// `[{"text": "name", ...}, ...]`, tolerating surrounding prose.
///
/// Items without a string `"text"` field are skipped; an unparseable or
/// missing array yields an empty list.
#[must_use]
pub fn extract_variable_names(response: &str) -> Vec<String> {
    let Some(span) = FIRST_ARRAY.find(response) else {
        return Vec::new();
    };

    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(span.as_str()) else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| {
            item.as_object()
                .and_then(|obj| obj.get("text"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_fields_in_order() {
        let response = r#"Found these: [{"text": "user_name"}, {"text": "age", "type": "int"}]"#;
        assert_eq!(extract_variable_names(response), vec!["user_name", "age"]);
    }

    #[test]
    fn skips_items_without_text() {
        let response = r#"[{"text": "a"}, {"name": "b"}, 3, {"text": "c"}]"#;
        assert_eq!(extract_variable_names(response), vec!["a", "c"]);
    }

    #[test]
    fn no_array_yields_empty() {
        assert!(extract_variable_names("no array here").is_empty());
        assert!(extract_variable_names("").is_empty());
    }

    #[test]
    fn unparseable_array_yields_empty() {
        assert!(extract_variable_names("[not json at all").is_empty());
        assert!(extract_variable_names("[{broken]").is_empty());
    }
}
