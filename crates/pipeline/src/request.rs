use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Recognized configuration toggles. Unknown keys in the incoming map are
/// ignored; absent toggles keep the defaults the original form ships with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub clean_org: bool,
    #[serde(default = "default_true")]
    pub deactivate_auto_reply: bool,
    #[serde(default = "default_true", rename = "set_SLA")]
    pub set_sla: bool,
    #[serde(default = "default_true")]
    pub crawl_site: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            clean_org: false,
            deactivate_auto_reply: true,
            set_sla: true,
            crawl_site: true,
        }
    }
}

/// One generation run. Immutable once created; owned by the orchestrator
/// for the duration of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub devorg_pat: String,
    pub website_url: String,
    #[serde(default)]
    pub knowledgebase_url: Option<String>,
    pub num_articles: u32,
    pub num_issues: u32,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub devorg_pat: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_toggles_match_the_form() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(!settings.clean_org);
        assert!(settings.deactivate_auto_reply);
        assert!(settings.set_sla);
        assert!(settings.crawl_site);
    }

    #[test]
    fn sla_key_uses_the_wire_spelling() {
        let settings: Settings =
            serde_json::from_str(r#"{"set_SLA": false, "clean_org": true}"#).unwrap();
        assert!(!settings.set_sla);
        assert!(settings.clean_org);
    }

    #[test]
    fn generation_request_is_camel_cased() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{
                "devorgPat": "eyJ0",
                "websiteUrl": "https://acme.test",
                "numArticles": 3,
                "numIssues": 2,
                "settings": {}
            }"#,
        )
        .unwrap();
        assert_eq!(request.num_articles, 3);
        assert!(request.knowledgebase_url.is_none());
    }
}
