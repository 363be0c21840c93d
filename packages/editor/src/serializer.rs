//! String encoding of serialized tree data

use crate::errors::EditorError;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

/// Pretty JSON, indented with tabs
pub fn to_data_string(data: &Value) -> Result<String, EditorError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut serializer)?;

    String::from_utf8(buf).map_err(|e| EditorError::Serialization(e.to_string()))
}

/// Parse a string record. Empty input means no data.
pub fn parse_data_string(input: &str) -> Result<Option<Value>, EditorError> {
    if input.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tab_indentation() {
        let out = to_data_string(&json!({ "a": [1] })).unwrap();
        assert_eq!(out, "{\n\t\"a\": [\n\t\t1\n\t]\n}");
    }

    #[test]
    fn test_parse_data_string() {
        assert_eq!(parse_data_string("").unwrap(), None);
        assert!(parse_data_string("  ").is_err());
        assert_eq!(parse_data_string("[1]").unwrap(), Some(json!([1])));
        assert!(matches!(
            parse_data_string("{bad json"),
            Err(EditorError::Serialization(_))
        ));
    }
}
