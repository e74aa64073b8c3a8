use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};

use crate::{DevApiError, ObjectKind, redact_pat};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability contract against the target product's management API.
///
/// Every call is an independent external operation scoped to the
/// credential's organization; there are no cross-object transactions.
#[async_trait]
pub trait ManagementApi: Send + Sync {
    async fn create_object(&self, kind: ObjectKind, payload: Value) -> Result<Value, DevApiError>;

    async fn delete_object(&self, kind: ObjectKind, id: &str) -> Result<(), DevApiError>;

    /// Lists all objects of a kind, paging through cursors.
    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<Value>, DevApiError>;

    /// Identity of the authenticated caller (the "creator").
    async fn current_user(&self) -> Result<String, DevApiError>;

    /// Numeric org identifier, as used inside SLA metric references.
    async fn rev_oid(&self) -> Result<String, DevApiError>;

    async fn list_snap_ins(&self) -> Result<Vec<Value>, DevApiError>;

    async fn deactivate_snap_in(&self, display_id: &str) -> Result<(), DevApiError>;

    /// Creates an SLA draft, returning its id.
    async fn create_sla(&self, payload: Value) -> Result<String, DevApiError>;

    async fn transition_sla(&self, id: &str, status: &str) -> Result<(), DevApiError>;

    /// Kicks off a crawler job for a URL; returns the job id.
    async fn start_web_crawl(&self, url: &str, depth: u32) -> Result<String, DevApiError>;
}

pub struct HttpManagementApi {
    http: reqwest::Client,
    base_url: String,
    pat: String,
}

impl HttpManagementApi {
    pub fn new(base_url: &str, pat: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        tracing::debug!(pat = %redact_pat(pat), "management api client created");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            pat: pat.to_string(),
        }
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.base_url)
    }

    async fn post(&self, suffix: &str, payload: &Value) -> Result<Value, DevApiError> {
        let url = self.endpoint(suffix);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.pat))
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| DevApiError::from_reqwest(e, suffix))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(endpoint = suffix, %status, body, "api call failed");
            return Err(DevApiError::from_status(status, suffix));
        }
        response
            .json()
            .await
            .map_err(|e| DevApiError::Malformed(format!("{suffix}: {e}")))
    }

    async fn get(&self, suffix: &str, query: &[(&str, &str)]) -> Result<Value, DevApiError> {
        let url = self.endpoint(suffix);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.pat))
            .query(query)
            .send()
            .await
            .map_err(|e| DevApiError::from_reqwest(e, suffix))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DevApiError::from_status(status, suffix));
        }
        response
            .json()
            .await
            .map_err(|e| DevApiError::Malformed(format!("{suffix}: {e}")))
    }
}

#[async_trait]
impl ManagementApi for HttpManagementApi {
    async fn create_object(&self, kind: ObjectKind, payload: Value) -> Result<Value, DevApiError> {
        let suffix = format!("{}.create", kind.path());
        self.post(&suffix, &payload).await
    }

    async fn delete_object(&self, kind: ObjectKind, id: &str) -> Result<(), DevApiError> {
        let suffix = format!("{}.delete", kind.path());
        self.post(&suffix, &json!({ "id": id })).await.map(|_| ())
    }

    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<Value>, DevApiError> {
        let suffix = format!("{}.list", kind.path());
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match cursor.as_deref() {
                Some(c) => vec![("cursor", c)],
                None => vec![],
            };
            let page = self.get(&suffix, &query).await?;

            let items = page
                .get(kind.list_key())
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    DevApiError::Malformed(format!("{suffix}: missing `{}` array", kind.list_key()))
                })?;
            objects.extend(items.iter().cloned());

            match page.get(kind.cursor_key()).and_then(Value::as_str) {
                Some(next) if !next.is_empty() => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn current_user(&self) -> Result<String, DevApiError> {
        let body = self.get("dev-users.self", &[]).await?;
        body.pointer("/dev_user/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DevApiError::Malformed("dev-users.self: missing dev_user.id".into()))
    }

    async fn rev_oid(&self) -> Result<String, DevApiError> {
        let body = self.get("dev-orgs.self", &[]).await?;
        body.pointer("/dev_org/display_id")
            .and_then(Value::as_str)
            .map(|display_id| display_id.trim_start_matches("DEV-").to_string())
            .ok_or_else(|| DevApiError::Malformed("dev-orgs.self: missing display_id".into()))
    }

    async fn list_snap_ins(&self) -> Result<Vec<Value>, DevApiError> {
        let body = self.get("snap-ins.list", &[]).await?;
        body.get("snap_ins")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| DevApiError::Malformed("snap-ins.list: missing snap_ins array".into()))
    }

    async fn deactivate_snap_in(&self, display_id: &str) -> Result<(), DevApiError> {
        let payload = json!({ "force": false, "id": display_id });
        match self.post("snap-ins.deactivate", &payload).await {
            Ok(_) => Ok(()),
            // Already-inactive snap-ins report a 400; that is success for us.
            Err(DevApiError::Permanent(msg)) if msg.contains("HTTP 400") => {
                tracing::debug!(display_id, "snap-in already inactive");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn create_sla(&self, payload: Value) -> Result<String, DevApiError> {
        let body = self.post("slas.create", &payload).await?;
        body.pointer("/sla/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DevApiError::Malformed("slas.create: missing sla.id".into()))
    }

    async fn transition_sla(&self, id: &str, status: &str) -> Result<(), DevApiError> {
        self.post("slas.transition", &json!({ "id": id, "status": status }))
            .await
            .map(|_| ())
    }

    async fn start_web_crawl(&self, url: &str, depth: u32) -> Result<String, DevApiError> {
        let payload = json!({
            "urls": [url],
            "applies_to_parts": ["PROD-1"],
            "max_depth": depth,
            "frequency": 0,
        });
        let body = self.post("web-crawler-jobs.create", &payload).await?;
        body.pointer("/web_crawler_job/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DevApiError::Malformed("web-crawler-jobs.create: missing job id".into())
            })
    }
}
