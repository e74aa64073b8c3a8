//! In-memory fakes for the pipeline's external adapters.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devapi::{DevApiError, ManagementApi, ObjectKind};
use genai::{ContentGenerator, ContentKind, GenError, GeneratedWork, Hierarchy};
use pipeline::AdapterFactory;
use serde_json::{Value, json};

/// Every stage name the generation pipeline can reference, id `stage/<name>`.
pub const STAGE_NAMES: &[&str] = &[
    "resolved",
    "queued",
    "in_development",
    "awaiting_customer_response",
    "triage",
    "in_review",
    "completed",
    "qualification",
    "stalled",
    "validation",
    "negotiation",
    "contract",
    "closed_won",
    "closed_lost",
];

fn default_stage_catalog() -> Vec<Value> {
    STAGE_NAMES
        .iter()
        .map(|name| json!({ "name": name, "id": format!("stage/{name}") }))
        .collect()
}

#[derive(Default)]
struct FakeApiState {
    next_id: u64,
    created: Vec<(ObjectKind, Value)>,
    deleted: Vec<(ObjectKind, String)>,
    listings: HashMap<ObjectKind, Vec<Value>>,
    snap_ins: Vec<Value>,
    deactivated_snap_ins: Vec<String>,
    sla_payloads: Vec<Value>,
    sla_transitions: Vec<(String, String)>,
    crawls: Vec<(String, u32)>,
    failures: HashMap<String, VecDeque<DevApiError>>,
    pats: Vec<String>,
}

/// Scriptable stand-in for the management API. Creates return envelopes
/// shaped like the real wire responses; `queue_failure` injects one error
/// for the next call to the named operation.
#[derive(Default)]
pub struct FakeManagementApi {
    state: Mutex<FakeApiState>,
}

impl FakeManagementApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_failure(&self, operation: &str, error: DevApiError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Preloads what `list_objects` returns for a kind. Without a preload,
    /// listings reflect the objects created through this fake.
    pub fn set_listing(&self, kind: ObjectKind, objects: Vec<Value>) {
        self.state.lock().unwrap().listings.insert(kind, objects);
    }

    pub fn set_snap_ins(&self, snap_ins: Vec<Value>) {
        self.state.lock().unwrap().snap_ins = snap_ins;
    }

    pub fn record_pat(&self, pat: &str) {
        self.state.lock().unwrap().pats.push(pat.to_string());
    }

    /// PATs handed to `management_api`, in call order.
    pub fn pats(&self) -> Vec<String> {
        self.state.lock().unwrap().pats.clone()
    }

    pub fn created(&self, kind: ObjectKind) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .created
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn deleted(&self, kind: ObjectKind) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn deactivated_snap_ins(&self) -> Vec<String> {
        self.state.lock().unwrap().deactivated_snap_ins.clone()
    }

    pub fn sla_payloads(&self) -> Vec<Value> {
        self.state.lock().unwrap().sla_payloads.clone()
    }

    pub fn sla_transitions(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sla_transitions.clone()
    }

    pub fn crawls(&self) -> Vec<(String, u32)> {
        self.state.lock().unwrap().crawls.clone()
    }

    fn take_failure(&self, operation: &str) -> Option<DevApiError> {
        self.state
            .lock()
            .unwrap()
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ManagementApi for FakeManagementApi {
    async fn create_object(&self, kind: ObjectKind, payload: Value) -> Result<Value, DevApiError> {
        if let Some(error) = self.take_failure(&format!("{kind}.create")) {
            return Err(error);
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("{}/{}", kind.create_key(), state.next_id);

        let response = match kind {
            ObjectKind::Accounts => {
                let name = payload
                    .get("display_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                json!({
                    "account": {
                        "id": id,
                        "display_name": name,
                        "display_id": format!("ACC-{}", state.next_id),
                    },
                    "default_rev_org": {
                        "id": format!("rev_org/{}", state.next_id),
                        "display_name": name,
                        "display_id": format!("REV-{}", state.next_id),
                    },
                })
            }
            ObjectKind::Parts => {
                let owner = payload
                    .pointer("/owned_by/0")
                    .and_then(Value::as_str)
                    .unwrap_or("devu/1");
                json!({
                    "part": {
                        "id": id,
                        "name": payload.get("name").cloned().unwrap_or_default(),
                        "type": payload.get("type").cloned().unwrap_or_default(),
                        "owned_by": [{ "id": owner }],
                    }
                })
            }
            _ => {
                let mut object = payload.clone();
                if let Some(map) = object.as_object_mut() {
                    map.insert("id".to_string(), json!(id));
                }
                json!({ kind.create_key(): object })
            }
        };

        state.created.push((kind, payload));
        Ok(response)
    }

    async fn delete_object(&self, kind: ObjectKind, id: &str) -> Result<(), DevApiError> {
        if let Some(error) = self.take_failure(&format!("{kind}.delete")) {
            return Err(error);
        }
        self.state
            .lock()
            .unwrap()
            .deleted
            .push((kind, id.to_string()));
        Ok(())
    }

    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<Value>, DevApiError> {
        if let Some(error) = self.take_failure(&format!("{kind}.list")) {
            return Err(error);
        }
        let state = self.state.lock().unwrap();
        if let Some(preloaded) = state.listings.get(&kind) {
            return Ok(preloaded.clone());
        }
        if kind == ObjectKind::CustomStages {
            return Ok(default_stage_catalog());
        }
        Ok(state
            .created
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn current_user(&self) -> Result<String, DevApiError> {
        if let Some(error) = self.take_failure("dev-users.self") {
            return Err(error);
        }
        Ok("devu/1".to_string())
    }

    async fn rev_oid(&self) -> Result<String, DevApiError> {
        Ok("123".to_string())
    }

    async fn list_snap_ins(&self) -> Result<Vec<Value>, DevApiError> {
        if let Some(error) = self.take_failure("snap-ins.list") {
            return Err(error);
        }
        Ok(self.state.lock().unwrap().snap_ins.clone())
    }

    async fn deactivate_snap_in(&self, display_id: &str) -> Result<(), DevApiError> {
        if let Some(error) = self.take_failure("snap-ins.deactivate") {
            return Err(error);
        }
        self.state
            .lock()
            .unwrap()
            .deactivated_snap_ins
            .push(display_id.to_string());
        Ok(())
    }

    async fn create_sla(&self, payload: Value) -> Result<String, DevApiError> {
        if let Some(error) = self.take_failure("slas.create") {
            return Err(error);
        }
        self.state.lock().unwrap().sla_payloads.push(payload);
        Ok("sla/1".to_string())
    }

    async fn transition_sla(&self, id: &str, status: &str) -> Result<(), DevApiError> {
        self.state
            .lock()
            .unwrap()
            .sla_transitions
            .push((id.to_string(), status.to_string()));
        Ok(())
    }

    async fn start_web_crawl(&self, url: &str, depth: u32) -> Result<String, DevApiError> {
        if let Some(error) = self.take_failure("web-crawler-jobs.create") {
            return Err(error);
        }
        let mut state = self.state.lock().unwrap();
        state.crawls.push((url.to_string(), depth));
        Ok(format!("web_crawler_job/{}", state.crawls.len()))
    }
}

#[derive(Default)]
struct FakeGeneratorState {
    hierarchy_failures: VecDeque<GenError>,
    works_failures: VecDeque<GenError>,
    forced_stage: Option<String>,
    calls: usize,
}

/// Deterministic stand-in for the AI content adapter.
#[derive(Default)]
pub struct FakeContentGenerator {
    state: Mutex<FakeGeneratorState>,
}

impl FakeContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_hierarchy_failure(&self, error: GenError) {
        self.state
            .lock()
            .unwrap()
            .hierarchy_failures
            .push_back(error);
    }

    pub fn queue_works_failure(&self, error: GenError) {
        self.state.lock().unwrap().works_failures.push_back(error);
    }

    /// Forces every generated work to carry this stage name.
    pub fn force_stage(&self, stage: &str) {
        self.state.lock().unwrap().forced_stage = Some(stage.to_string());
    }

    pub fn generation_calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl ContentGenerator for FakeContentGenerator {
    async fn generate_hierarchy(&self, website: &str) -> Result<Hierarchy, GenError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(error) = state.hierarchy_failures.pop_front() {
            return Err(error);
        }
        let _ = website;
        let mut features = std::collections::BTreeMap::new();
        features.insert(
            "Dashboards".to_string(),
            vec!["Saved Views".to_string()],
        );
        features.insert("Alerting".to_string(), Vec::new());
        let mut hierarchy = Hierarchy::new();
        hierarchy.insert("Observability Platform".to_string(), features);
        Ok(hierarchy)
    }

    async fn generate_works(
        &self,
        kind: ContentKind,
        part: &str,
        website: &str,
        count: u32,
    ) -> Result<Vec<GeneratedWork>, GenError> {
        if count < 2 {
            return Err(GenError::InvalidArgument(format!(
                "count must be at least 2, got {count}"
            )));
        }
        let _ = website;
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(error) = state.works_failures.pop_front() {
            return Err(error);
        }

        let works = (0..count)
            .map(|n| {
                let (severity, priority, stage) = match kind {
                    ContentKind::Tickets => (Some("medium".to_string()), None, "queued"),
                    ContentKind::Issues => (None, Some("p2".to_string()), "triage"),
                };
                let stage = state
                    .forced_stage
                    .clone()
                    .unwrap_or_else(|| stage.to_string());
                GeneratedWork {
                    title: format!("{} for {part} #{}", kind.label(), n + 1),
                    body: format!("Generated {} content for {part}.", kind.label()),
                    severity,
                    priority,
                    stage,
                }
            })
            .collect();
        Ok(works)
    }
}

/// Hands out shared fakes regardless of the PAT, recording each PAT seen.
pub struct FakeAdapterFactory {
    pub api: Arc<FakeManagementApi>,
    pub generator: Arc<FakeContentGenerator>,
}

impl FakeAdapterFactory {
    pub fn new() -> Self {
        Self {
            api: Arc::new(FakeManagementApi::new()),
            generator: Arc::new(FakeContentGenerator::new()),
        }
    }
}

impl Default for FakeAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory for FakeAdapterFactory {
    fn management_api(&self, pat: &str) -> Arc<dyn ManagementApi> {
        self.api.record_pat(pat);
        self.api.clone()
    }

    fn content_generator(&self) -> Arc<dyn ContentGenerator> {
        self.generator.clone()
    }
}
