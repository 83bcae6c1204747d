pub mod auth;
pub mod cart;
pub mod categories;
pub mod feedback;
pub mod orders;
pub mod payments;
pub mod profile;

use serde_json::Value;

/// Reads an integer from a JSON number or a numeric string.
pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Treats missing and whitespace-only strings the same way.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_int_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_int(&json!(3)), Some(3));
        assert_eq!(parse_int(&json!(" 7 ")), Some(7));
        assert_eq!(parse_int(&json!(-2)), Some(-2));
    }

    #[test]
    fn parse_int_rejects_everything_else() {
        assert_eq!(parse_int(&json!("abc")), None);
        assert_eq!(parse_int(&json!(2.5)), None);
        assert_eq!(parse_int(&json!(null)), None);
        assert_eq!(parse_int(&json!([1])), None);
    }

    #[test]
    fn non_blank_trims_and_drops_empty() {
        assert_eq!(non_blank(Some("  x ".into())), Some("x".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }
}
