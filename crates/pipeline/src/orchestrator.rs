use std::collections::HashMap;
use std::sync::Arc;

use devapi::{DevApiError, ManagementApi, ObjectKind};
use genai::{ContentGenerator, ContentKind};
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use sessions::{Phase, SessionStore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::phases::{RunProgress, cleanup_plan, generation_plan};
use crate::request::{CleanupRequest, GenerationRequest};
use crate::retry::retry_with_backoff;
use crate::{AdapterFactory, PipelineError, cleanup, opportunities, seeds, sla};

/// Session-scoped handle the run uses to publish progress and log lines.
///
/// All store failures are swallowed here: once a run is in flight, a swept
/// session must not abort the work mid-phase.
#[derive(Clone)]
pub struct RunCtx {
    store: Arc<SessionStore>,
    session_id: Uuid,
}

impl RunCtx {
    pub fn new(store: Arc<SessionStore>, session_id: Uuid) -> Self {
        Self { store, session_id }
    }

    pub fn log(&self, line: &str) {
        if self.store.append_log(self.session_id, line).is_err() {
            tracing::debug!(session_id = %self.session_id, "log append on expired session");
        }
    }

    pub fn update(&self, phase: Phase, progress: u8, message: &str) {
        self.log(message);
        if self
            .store
            .update(self.session_id, phase, progress, message)
            .is_err()
        {
            tracing::debug!(session_id = %self.session_id, "update on expired session");
        }
    }
}

/// An account plus the default rev-org the target system attaches to it.
#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub id: String,
    pub name: String,
    pub rev_org_id: String,
}

#[derive(Debug, Clone)]
struct PartInfo {
    id: String,
    owner: String,
}

/// Runs the full generation pipeline in a background task. The task owns the
/// terminal transition: it marks the session complete or errored, never both.
pub fn spawn_generation(
    store: Arc<SessionStore>,
    adapters: Arc<dyn AdapterFactory>,
    session_id: Uuid,
    request: GenerationRequest,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctx = RunCtx::new(store.clone(), session_id);
        let api = adapters.management_api(&request.devorg_pat);
        let generator = adapters.content_generator();

        match run_generation(&ctx, api.as_ref(), generator.as_ref(), &request).await {
            Ok(()) => {
                ctx.log("Generation run completed");
                let _ = store.mark_complete(session_id);
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "generation run failed");
                ctx.log(&format!("Run failed: {e}"));
                let _ = store.mark_error(session_id, &e.to_string());
            }
        }
    })
}

/// Runs a standalone cleanup in a background task.
pub fn spawn_cleanup(
    store: Arc<SessionStore>,
    adapters: Arc<dyn AdapterFactory>,
    session_id: Uuid,
    request: CleanupRequest,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctx = RunCtx::new(store.clone(), session_id);
        let api = adapters.management_api(&request.devorg_pat);

        let mut progress = RunProgress::new(&cleanup_plan());
        progress.begin(Phase::Cleanup);
        match cleanup::run_cleanup(&ctx, api.as_ref(), &progress).await {
            Ok(report) => {
                ctx.log(&report.summary());
                let _ = store.mark_complete(session_id);
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "cleanup run failed");
                ctx.log(&format!("Cleanup failed: {e}"));
                let _ = store.mark_error(session_id, &e.to_string());
            }
        }
    })
}

async fn run_generation(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    generator: &dyn ContentGenerator,
    request: &GenerationRequest,
) -> Result<(), PipelineError> {
    let plan = generation_plan(&request.settings);
    let mut progress = RunProgress::new(&plan);

    if request.settings.clean_org {
        progress.begin(Phase::Cleanup);
        let report = cleanup::run_cleanup(ctx, api, &progress).await?;
        ctx.log(&report.summary());
        progress.finish();
    }

    progress.begin(Phase::CreateUsers);
    let dev_user_ids = create_dev_users(ctx, api, &progress).await?;
    progress.finish();

    progress.begin(Phase::CreateAccounts);
    let accounts = create_accounts(ctx, api, &dev_user_ids, &progress).await?;
    create_rev_users(ctx, api, &accounts, &progress).await?;
    progress.finish();

    progress.begin(Phase::BuildProductHierarchy);
    let parts = build_product_hierarchy(
        ctx,
        api,
        generator,
        &request.website_url,
        &dev_user_ids,
        &progress,
    )
    .await?;
    progress.finish();

    progress.begin(Phase::GenerateTickets);
    let stages = load_stage_catalog(ctx, api).await?;
    generate_tickets(
        ctx,
        api,
        generator,
        &request.website_url,
        request.num_articles,
        &parts,
        &accounts,
        &stages,
        &progress,
    )
    .await?;
    progress.finish();

    progress.begin(Phase::GenerateIssues);
    generate_issues(
        ctx,
        api,
        generator,
        &request.website_url,
        request.num_issues,
        &parts,
        &dev_user_ids,
        &stages,
        &progress,
    )
    .await?;
    progress.finish();

    progress.begin(Phase::GenerateOpportunities);
    generate_opportunities(ctx, api, &accounts, &dev_user_ids, &stages, &progress).await?;
    progress.finish();

    progress.begin(Phase::ApplySettings);
    apply_settings(ctx, api, request, &progress).await?;
    progress.finish();

    Ok(())
}

/// Random pick that never holds an rng across an await point.
fn pick<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::thread_rng())
}

fn pick_count(max: u32) -> u32 {
    rand::thread_rng().gen_range(2..=max.max(2))
}

fn pick_owner(dev_user_ids: &[String]) -> Result<String, PipelineError> {
    pick(dev_user_ids)
        .cloned()
        .ok_or_else(|| PipelineError::Failed("no developer users available".to_string()))
}

/// Id of the object a `.create` response carries under the kind's envelope
/// key, e.g. `dev_user.id`.
fn created_id(kind: ObjectKind, response: &Value) -> Result<String, DevApiError> {
    response
        .pointer(&format!("/{}/id", kind.create_key()))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            DevApiError::Malformed(format!("{kind}.create: missing {}.id", kind.create_key()))
        })
}

async fn create_dev_users(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    progress: &RunProgress,
) -> Result<Vec<String>, PipelineError> {
    let seeds = seeds::dev_users()?;
    let total = seeds.len();
    ctx.update(
        Phase::CreateUsers,
        progress.at(0.0),
        &format!("Creating {total} developer users..."),
    );

    let mut ids = Vec::with_capacity(total);
    for (index, seed) in seeds.iter().enumerate() {
        let payload = json!({
            "email": seed.email(),
            "full_name": seed.full_name,
            "state": "shadow",
        });
        let response = retry_with_backoff("dev-users.create", |line| ctx.log(&line), || {
            api.create_object(ObjectKind::DevUsers, payload.clone())
        })
        .await?;
        ids.push(created_id(ObjectKind::DevUsers, &response)?);

        ctx.update(
            Phase::CreateUsers,
            progress.units(index + 1, total),
            &format!("Created developer user {}/{total}", index + 1),
        );
    }
    Ok(ids)
}

/// Creates the seeded accounts. An account that already exists is skipped;
/// when every account already exists, the org's existing accounts are
/// adopted from the rev-orgs listing instead.
async fn create_accounts(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    dev_user_ids: &[String],
    progress: &RunProgress,
) -> Result<Vec<CreatedAccount>, PipelineError> {
    let seeds = seeds::accounts()?;
    let total = seeds.len();
    let mut accounts = Vec::with_capacity(total);

    for (index, seed) in seeds.iter().enumerate() {
        let owner = pick(dev_user_ids)
            .cloned()
            .ok_or_else(|| PipelineError::Failed("no developer users available".to_string()))?;
        let payload = json!({
            "display_name": seed.name,
            "external_refs": [seed.name],
            "owned_by": [owner],
        });

        let result = retry_with_backoff("accounts.create", |line| ctx.log(&line), || {
            api.create_object(ObjectKind::Accounts, payload.clone())
        })
        .await;
        match result {
            Ok(response) => {
                let id = created_id(ObjectKind::Accounts, &response)?;
                let rev_org_id = response
                    .pointer("/default_rev_org/id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DevApiError::Malformed(
                            "accounts.create: missing default_rev_org.id".to_string(),
                        )
                    })?
                    .to_string();
                accounts.push(CreatedAccount {
                    id,
                    name: seed.name.clone(),
                    rev_org_id,
                });
            }
            Err(DevApiError::Conflict(_)) => {
                ctx.log(&format!("Account already exists, skipping: {}", seed.name));
            }
            Err(e) => return Err(e.into()),
        }

        ctx.update(
            Phase::CreateAccounts,
            progress.at((index + 1) as f64 / total as f64 * 0.5),
            &format!("Creating accounts ({}/{total})", index + 1),
        );
    }

    if accounts.is_empty() {
        ctx.log("All accounts already exist, adopting the organization's accounts");
        let rev_orgs = retry_with_backoff("rev-orgs.list", |line| ctx.log(&line), || {
            api.list_objects(ObjectKind::RevOrgs)
        })
        .await?;
        for rev_org in &rev_orgs {
            let (Some(account_id), Some(name), Some(rev_org_id)) = (
                rev_org.pointer("/account/id").and_then(Value::as_str),
                rev_org
                    .pointer("/account/display_name")
                    .and_then(Value::as_str),
                rev_org.get("id").and_then(Value::as_str),
            ) else {
                continue;
            };
            accounts.push(CreatedAccount {
                id: account_id.to_string(),
                name: name.to_string(),
                rev_org_id: rev_org_id.to_string(),
            });
        }
        if accounts.is_empty() {
            return Err(PipelineError::Failed(
                "no accounts available in the organization".to_string(),
            ));
        }
    }

    Ok(accounts)
}

/// Creates the seeded customer users against random rev-orgs. Existing users
/// are skipped; the run proceeds as long as the phase itself can.
async fn create_rev_users(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    accounts: &[CreatedAccount],
    progress: &RunProgress,
) -> Result<(), PipelineError> {
    let seeds = seeds::rev_users()?;
    let total = seeds.len();

    for (index, seed) in seeds.iter().enumerate() {
        let rev_org = pick(accounts)
            .map(|account| account.rev_org_id.clone())
            .ok_or_else(|| PipelineError::Failed("no rev-orgs available".to_string()))?;
        let payload = json!({
            "display_name": seed.display_name,
            "rev_org": rev_org,
        });

        let result = retry_with_backoff("rev-users.create", |line| ctx.log(&line), || {
            api.create_object(ObjectKind::RevUsers, payload.clone())
        })
        .await;
        match result {
            Ok(_) => {}
            Err(DevApiError::Conflict(_)) => {
                ctx.log(&format!(
                    "Customer user already exists, skipping: {}",
                    seed.display_name
                ));
            }
            Err(e) => return Err(e.into()),
        }

        ctx.update(
            Phase::CreateAccounts,
            progress.at(0.5 + (index + 1) as f64 / total as f64 * 0.5),
            &format!("Creating customer users ({}/{total})", index + 1),
        );
    }
    Ok(())
}

async fn create_part(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    name: &str,
    part_type: &str,
    owner: &str,
    parent: Value,
) -> Result<PartInfo, PipelineError> {
    let payload = json!({
        "name": name,
        "type": part_type,
        "owned_by": [owner],
        "parent_part": parent,
    });
    let response = retry_with_backoff("parts.create", |line| ctx.log(&line), || {
        api.create_object(ObjectKind::Parts, payload.clone())
    })
    .await?;

    let id = created_id(ObjectKind::Parts, &response)?;
    let owner = response
        .pointer("/part/owned_by/0/id")
        .and_then(Value::as_str)
        .unwrap_or(owner)
        .to_string();
    Ok(PartInfo { id, owner })
}

/// Materializes the AI-generated capability/feature/subfeature tree as parts,
/// strictly top-down so every child references a created parent.
async fn build_product_hierarchy(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    generator: &dyn ContentGenerator,
    website: &str,
    dev_user_ids: &[String],
    progress: &RunProgress,
) -> Result<HashMap<String, PartInfo>, PipelineError> {
    ctx.update(
        Phase::BuildProductHierarchy,
        progress.at(0.0),
        "Generating product structure...",
    );
    let hierarchy = retry_with_backoff("hierarchy generation", |line| ctx.log(&line), || {
        generator.generate_hierarchy(website)
    })
    .await?;

    let total: usize = hierarchy
        .iter()
        .map(|(_, features)| {
            1 + features.len() + features.values().map(Vec::len).sum::<usize>()
        })
        .sum();
    ctx.log(&format!("Creating {total} parts"));

    let mut parts = HashMap::with_capacity(total);
    let mut done = 0usize;

    for (capability, features) in &hierarchy {
        let capability_part = create_part(
            ctx,
            api,
            capability,
            "capability",
            &pick_owner(dev_user_ids)?,
            json!(["PROD-1"]),
        )
        .await?;
        done += 1;
        ctx.update(
            Phase::BuildProductHierarchy,
            progress.units(done, total),
            &format!("Created capability: {capability}"),
        );

        for (feature, subfeatures) in features {
            let feature_part = create_part(
                ctx,
                api,
                feature,
                "feature",
                &pick_owner(dev_user_ids)?,
                json!([capability_part.id]),
            )
            .await?;
            done += 1;
            ctx.update(
                Phase::BuildProductHierarchy,
                progress.units(done, total),
                &format!("Created feature: {feature}"),
            );

            for subfeature in subfeatures {
                let subfeature_part = create_part(
                    ctx,
                    api,
                    subfeature,
                    "feature",
                    &pick_owner(dev_user_ids)?,
                    json!([feature_part.id]),
                )
                .await?;
                done += 1;
                ctx.update(
                    Phase::BuildProductHierarchy,
                    progress.units(done, total),
                    &format!("Created subfeature: {subfeature}"),
                );
                parts.insert(subfeature.clone(), subfeature_part);
            }
            parts.insert(feature.clone(), feature_part);
        }
        parts.insert(capability.clone(), capability_part);
    }

    Ok(parts)
}

/// Custom stage catalog, name → id. Works creation references stages by id.
async fn load_stage_catalog(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
) -> Result<HashMap<String, String>, PipelineError> {
    let stages = retry_with_backoff("stages.custom.list", |line| ctx.log(&line), || {
        api.list_objects(ObjectKind::CustomStages)
    })
    .await?;

    let catalog: HashMap<String, String> = stages
        .iter()
        .filter_map(|stage| {
            let name = stage.get("name").and_then(Value::as_str)?;
            let id = stage.get("id").and_then(Value::as_str)?;
            Some((name.to_string(), id.to_string()))
        })
        .collect();
    ctx.log(&format!("Loaded {} custom stages", catalog.len()));
    Ok(catalog)
}

async fn create_work(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    payload: Value,
) -> Result<Value, PipelineError> {
    retry_with_backoff("works.create", |line| ctx.log(&line), || {
        api.create_object(ObjectKind::Works, payload.clone())
    })
    .await
    .map_err(PipelineError::from)
}

#[allow(clippy::too_many_arguments)]
async fn generate_tickets(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    generator: &dyn ContentGenerator,
    website: &str,
    num_articles: u32,
    parts: &HashMap<String, PartInfo>,
    accounts: &[CreatedAccount],
    stages: &HashMap<String, String>,
    progress: &RunProgress,
) -> Result<(), PipelineError> {
    let total_parts = parts.len();
    let mut created = 0usize;

    for (index, (part_name, part)) in parts.iter().enumerate() {
        let count = pick_count(num_articles);
        ctx.update(
            Phase::GenerateTickets,
            progress.units(index, total_parts),
            &format!("Generating {count} tickets for {part_name}..."),
        );
        let works = retry_with_backoff("ticket generation", |line| ctx.log(&line), || {
            generator.generate_works(ContentKind::Tickets, part_name, website, count)
        })
        .await?;

        for work in &works {
            let Some(stage_id) = stages.get(&work.stage) else {
                ctx.log(&format!(
                    "Skipping ticket with unknown stage `{}`: {}",
                    work.stage, work.title
                ));
                continue;
            };
            let rev_org = pick(accounts)
                .map(|account| account.rev_org_id.clone())
                .ok_or_else(|| PipelineError::Failed("no rev-orgs available".to_string()))?;

            let payload = json!({
                "type": "ticket",
                "title": work.title,
                "body": work.body,
                "severity": work.severity.as_deref().unwrap_or("low"),
                "stage": { "id": stage_id },
                "applies_to_part": part.id,
                "owned_by": [part.owner],
                "rev_org": rev_org,
            });
            create_work(ctx, api, payload).await?;
            created += 1;
            ctx.log(&format!("Created ticket: {}", work.title));
        }

        ctx.update(
            Phase::GenerateTickets,
            progress.units(index + 1, total_parts),
            &format!("Tickets done for {part_name} ({created} total)"),
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn generate_issues(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    generator: &dyn ContentGenerator,
    website: &str,
    num_issues: u32,
    parts: &HashMap<String, PartInfo>,
    dev_user_ids: &[String],
    stages: &HashMap<String, String>,
    progress: &RunProgress,
) -> Result<(), PipelineError> {
    let total_parts = parts.len();
    let mut created = 0usize;

    for (index, (part_name, part)) in parts.iter().enumerate() {
        let count = pick_count(num_issues);
        ctx.update(
            Phase::GenerateIssues,
            progress.units(index, total_parts),
            &format!("Generating {count} issues for {part_name}..."),
        );
        let works = retry_with_backoff("issue generation", |line| ctx.log(&line), || {
            generator.generate_works(ContentKind::Issues, part_name, website, count)
        })
        .await?;

        for work in &works {
            let Some(stage_id) = stages.get(&work.stage) else {
                ctx.log(&format!(
                    "Skipping issue with unknown stage `{}`: {}",
                    work.stage, work.title
                ));
                continue;
            };
            let owner = pick(dev_user_ids)
                .cloned()
                .ok_or_else(|| PipelineError::Failed("no developer users available".to_string()))?;

            let payload = json!({
                "type": "issue",
                "title": work.title,
                "body": work.body,
                "priority": work.priority.as_deref().unwrap_or("p2"),
                "stage": { "id": stage_id },
                "applies_to_part": part.id,
                "owned_by": [owner],
            });
            create_work(ctx, api, payload).await?;
            created += 1;
            ctx.log(&format!("Created issue: {}", work.title));
        }

        ctx.update(
            Phase::GenerateIssues,
            progress.units(index + 1, total_parts),
            &format!("Issues done for {part_name} ({created} total)"),
        );
    }
    Ok(())
}

async fn generate_opportunities(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    accounts: &[CreatedAccount],
    dev_user_ids: &[String],
    stages: &HashMap<String, String>,
    progress: &RunProgress,
) -> Result<(), PipelineError> {
    let payloads = {
        let mut rng = rand::thread_rng();
        opportunities::build_opportunities(&mut rng, accounts, dev_user_ids, stages)
    };
    let total = payloads.len();
    ctx.update(
        Phase::GenerateOpportunities,
        progress.at(0.0),
        &format!("Creating {total} opportunities..."),
    );

    for (index, payload) in payloads.into_iter().enumerate() {
        let title = payload
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        create_work(ctx, api, payload).await?;
        ctx.update(
            Phase::GenerateOpportunities,
            progress.units(index + 1, total),
            &format!("Created opportunity: {title}"),
        );
    }
    Ok(())
}

/// Applies the configuration toggles. Crawl kickoff is best-effort; the
/// snap-in and SLA steps fail the run when their calls do.
async fn apply_settings(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    request: &GenerationRequest,
    progress: &RunProgress,
) -> Result<(), PipelineError> {
    let settings = &request.settings;

    if settings.deactivate_auto_reply {
        ctx.update(
            Phase::ApplySettings,
            progress.at(0.0),
            "Deactivating auto-reply snap-in...",
        );
        let snap_ins = retry_with_backoff("snap-ins.list", |line| ctx.log(&line), || {
            api.list_snap_ins()
        })
        .await?;

        let auto_reply = snap_ins.iter().find(|snap_in| {
            snap_in.pointer("/automations/0/name").and_then(Value::as_str) == Some("auto_reply")
        });
        match auto_reply {
            Some(snap_in) => {
                let is_active = snap_in
                    .get("is_active")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let state = snap_in
                    .get("state")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase();
                if !is_active || state == "disabled" {
                    ctx.log("Auto-reply snap-in is already inactive");
                } else if let Some(display_id) =
                    snap_in.get("display_id").and_then(Value::as_str)
                {
                    retry_with_backoff("snap-ins.deactivate", |line| ctx.log(&line), || {
                        api.deactivate_snap_in(display_id)
                    })
                    .await?;
                    ctx.log("Deactivated auto-reply snap-in");
                } else {
                    ctx.log("Auto-reply snap-in has no display_id, skipping");
                }
            }
            None => ctx.log("No auto-reply snap-in found"),
        }
    }

    if settings.set_sla {
        ctx.update(
            Phase::ApplySettings,
            progress.at(0.4),
            "Configuring default SLA...",
        );
        let rev_oid = retry_with_backoff("dev-orgs.self", |line| ctx.log(&line), || {
            api.rev_oid()
        })
        .await?;
        let payload = sla::default_sla_payload(&rev_oid);
        let sla_id = retry_with_backoff("slas.create", |line| ctx.log(&line), || {
            api.create_sla(payload.clone())
        })
        .await?;
        retry_with_backoff("slas.transition", |line| ctx.log(&line), || {
            api.transition_sla(&sla_id, "published")
        })
        .await?;
        ctx.log(&format!("Default SLA published ({sla_id})"));
    }

    if settings.crawl_site {
        ctx.update(
            Phase::ApplySettings,
            progress.at(0.7),
            "Starting web crawls...",
        );
        match api.start_web_crawl(&request.website_url, 2).await {
            Ok(job_id) => ctx.log(&format!("Website crawl started ({job_id})")),
            Err(e) => ctx.log(&format!("Website crawl failed to start: {e}")),
        }
        if let Some(kb_url) = &request.knowledgebase_url {
            match api.start_web_crawl(kb_url, 4).await {
                Ok(job_id) => ctx.log(&format!("Knowledge-base crawl started ({job_id})")),
                Err(e) => ctx.log(&format!("Knowledge-base crawl failed to start: {e}")),
            }
        }
    }

    ctx.update(
        Phase::ApplySettings,
        progress.at(1.0),
        "Settings applied",
    );
    Ok(())
}
