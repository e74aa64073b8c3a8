use devapi::{ManagementApi, ObjectKind};
use serde_json::Value;
use sessions::Phase;

use crate::PipelineError;
use crate::orchestrator::RunCtx;
use crate::phases::RunProgress;
use crate::retry::retry_with_backoff;

/// Deletion order matters: works reference parts and rev-users, accounts own
/// rev-orgs, and the authenticated dev-user must survive to finish the run.
const PASSES: [ObjectKind; 5] = [
    ObjectKind::Parts,
    ObjectKind::Works,
    ObjectKind::RevUsers,
    ObjectKind::Accounts,
    ObjectKind::DevUsers,
];

#[derive(Debug, Default)]
pub struct PassOutcome {
    pub total: usize,
    pub deleted: usize,
    pub failed: usize,
    pub protected: usize,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub passes: Vec<(ObjectKind, PassOutcome)>,
}

impl CleanupReport {
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .passes
            .iter()
            .map(|(kind, outcome)| {
                format!("{kind}: {}/{} deleted", outcome.deleted, outcome.total)
            })
            .collect();
        format!("Cleanup finished ({})", parts.join(", "))
    }
}

/// Ids eligible for deletion in one pass. The `product` root part and the
/// authenticated caller are never deleted.
fn deletable_ids(kind: ObjectKind, objects: &[Value], creator: &str) -> Vec<String> {
    objects
        .iter()
        .filter(|object| match kind {
            ObjectKind::Parts => object.get("type").and_then(Value::as_str) != Some("product"),
            ObjectKind::DevUsers => object.get("id").and_then(Value::as_str) != Some(creator),
            _ => true,
        })
        .filter_map(|object| object.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Empties the organization pass by pass. Per-object failures are logged and
/// counted; a pass only fails the run when a majority of its deletions fail.
pub async fn run_cleanup(
    ctx: &RunCtx,
    api: &dyn ManagementApi,
    progress: &RunProgress,
) -> Result<CleanupReport, PipelineError> {
    let creator = retry_with_backoff("dev-users.self", |line| ctx.log(&line), || {
        api.current_user()
    })
    .await?;
    ctx.log(&format!("Cleanup started (keeping caller {creator})"));

    let mut report = CleanupReport::default();

    for (pass, kind) in PASSES.iter().enumerate() {
        let pass_base = pass as f64 / PASSES.len() as f64;
        ctx.update(
            Phase::Cleanup,
            progress.at(pass_base),
            &format!("Loading {kind}..."),
        );

        let label = format!("{kind}.list");
        let objects = retry_with_backoff(&label, |line| ctx.log(&line), || {
            api.list_objects(*kind)
        })
        .await?;

        let ids = deletable_ids(*kind, &objects, &creator);
        let mut outcome = PassOutcome {
            total: ids.len(),
            protected: objects.len() - ids.len(),
            ..PassOutcome::default()
        };
        ctx.log(&format!(
            "Found {} {kind} ({} protected)",
            ids.len(),
            outcome.protected
        ));

        let label = format!("{kind}.delete");
        for (index, id) in ids.iter().enumerate() {
            let result = retry_with_backoff(&label, |line| ctx.log(&line), || {
                api.delete_object(*kind, id)
            })
            .await;
            match result {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    outcome.failed += 1;
                    ctx.log(&format!("Failed to delete {kind} {id}: {e}"));
                }
            }

            let within_pass = (index + 1) as f64 / ids.len() as f64;
            ctx.update(
                Phase::Cleanup,
                progress.at(pass_base + within_pass / PASSES.len() as f64),
                &format!("Deleting {kind} ({}/{})", index + 1, ids.len()),
            );
        }

        if outcome.failed * 2 > outcome.total && outcome.total > 0 {
            report.passes.push((*kind, outcome));
            return Err(PipelineError::Failed(format!(
                "cleanup aborted: most {kind} deletions failed"
            )));
        }
        report.passes.push((*kind, outcome));
    }

    Ok(report)
}
