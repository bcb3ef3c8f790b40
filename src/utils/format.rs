use serde_json::Value;

/// Case-insensitive substring check.
/// Both sides are lowercased, so the needle may arrive in any case.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Render a single table cell as display text.
///
/// Strings pass through unquoted, null renders empty, and anything else
/// (numbers, booleans, nested structures) falls back to its JSON form.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Signal Relay Units", "relay"));
        assert!(contains_ignore_case("Signal Relay Units", "RELAY"));
        assert!(!contains_ignore_case("Signal Relay Units", "breaker"));
        assert!(contains_ignore_case("anything", ""));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("x")), "x");
        assert_eq!(cell_text(&json!(1)), "1");
        assert_eq!(cell_text(&json!(2.5)), "2.5");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!(["a", 1])), r#"["a",1]"#);
    }
}
