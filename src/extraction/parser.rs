use serde_json::{Map, Value};

/// Pull the JSON object out of a model answer.
///
/// Takes everything from the first `{` to the last `}`, so prose or code
/// fences around the object do not matter. Anything that is not a JSON
/// object yields `None`.
pub fn parse_structured_text(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "model output is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OBJECT: &str = r#"{"netto_a_pagare": "1.234,56", "periodo": "Giugno 2025"}"#;

    #[test]
    fn fenced_and_bare_objects_parse_the_same() {
        let fenced = format!("Ecco i dati:\n```json\n{OBJECT}\n```\nFine.");
        let bare = parse_structured_text(OBJECT).unwrap();
        assert_eq!(parse_structured_text(&fenced).unwrap(), bare);
        assert_eq!(bare["periodo"], "Giugno 2025");
    }

    #[test]
    fn nested_objects_survive() {
        let map = parse_structured_text(r#"note {"a": {"b": 1}, "c": [1, 2]} end"#).unwrap();
        assert_eq!(map["a"]["b"], 1);
    }

    #[test]
    fn no_brace_is_none() {
        assert!(parse_structured_text("Non ho trovato dati").is_none());
        assert!(parse_structured_text("").is_none());
    }

    #[test]
    fn malformed_or_misordered_is_none() {
        assert!(parse_structured_text(r#"{"netto": 1,}"#).is_none());
        assert!(parse_structured_text("} backwards {").is_none());
        assert!(parse_structured_text("{").is_none());
    }
}
