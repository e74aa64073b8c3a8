use serde_json::Value;

use crate::{GenError, GeneratedWork, Hierarchy};

/// Models wrap JSON in markdown fences often enough to be worth stripping
/// before the strict parse.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn parse_hierarchy(text: &str) -> Result<Hierarchy, GenError> {
    let value: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| GenError::Malformed(format!("hierarchy is not valid JSON: {e}")))?;
    let hierarchy: Hierarchy = serde_json::from_value(value)
        .map_err(|e| GenError::Malformed(format!("hierarchy has unexpected shape: {e}")))?;
    if hierarchy.is_empty() {
        return Err(GenError::Malformed("hierarchy is empty".to_string()));
    }
    Ok(hierarchy)
}

pub fn parse_works(text: &str) -> Result<Vec<GeneratedWork>, GenError> {
    let works: Vec<GeneratedWork> = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| GenError::Malformed(format!("works are not a valid JSON array: {e}")))?;
    if works.is_empty() {
        return Err(GenError::Malformed("works array is empty".to_string()));
    }
    Ok(works)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_is_accepted() {
        let text = "```json\n{\"Platform\": {\"Auth\": [\"SSO\"]}}\n```";
        let hierarchy = parse_hierarchy(text).unwrap();
        assert_eq!(hierarchy["Platform"]["Auth"], vec!["SSO".to_string()]);
    }

    #[test]
    fn plain_json_is_accepted() {
        let works = parse_works(
            r#"[{"title": "t", "body": "b", "severity": "low", "stage": "queued"}]"#,
        )
        .unwrap();
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].severity.as_deref(), Some("low"));
        assert!(works[0].priority.is_none());
    }

    #[test]
    fn prose_around_json_is_malformed() {
        let err = parse_works("Sure! Here are your tickets: []").unwrap_err();
        assert!(matches!(err, GenError::Malformed(_)));
    }

    #[test]
    fn empty_hierarchy_is_rejected() {
        assert!(matches!(
            parse_hierarchy("{}"),
            Err(GenError::Malformed(_))
        ));
    }
}
