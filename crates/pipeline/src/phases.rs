use sessions::Phase;

use crate::request::Settings;

/// Relative weight of each phase in the overall progress bar. The run plan
/// normalizes over the phases it actually contains, so any combination
/// still spans 0-100.
fn weight(phase: Phase) -> u32 {
    match phase {
        Phase::Cleanup => 20,
        Phase::CreateUsers => 10,
        Phase::CreateAccounts => 10,
        Phase::BuildProductHierarchy => 15,
        Phase::GenerateTickets => 20,
        Phase::GenerateIssues => 15,
        Phase::GenerateOpportunities => 5,
        Phase::ApplySettings => 5,
        Phase::Init | Phase::Done | Phase::Error => 0,
    }
}

pub fn generation_plan(settings: &Settings) -> Vec<Phase> {
    let mut plan = Vec::with_capacity(8);
    if settings.clean_org {
        plan.push(Phase::Cleanup);
    }
    plan.extend([
        Phase::CreateUsers,
        Phase::CreateAccounts,
        Phase::BuildProductHierarchy,
        Phase::GenerateTickets,
        Phase::GenerateIssues,
        Phase::GenerateOpportunities,
        Phase::ApplySettings,
    ]);
    plan
}

pub fn cleanup_plan() -> Vec<Phase> {
    vec![Phase::Cleanup]
}

/// Weighted progress accumulator for one run.
///
/// `begin` opens a phase; `at` maps a completion fraction of the current
/// phase to the overall 0-100 scale; `finish` banks the phase's weight.
/// Values are monotone as long as phases are opened in plan order.
pub struct RunProgress {
    total_weight: u32,
    completed_weight: u32,
    current_weight: u32,
}

impl RunProgress {
    pub fn new(plan: &[Phase]) -> Self {
        let total_weight = plan.iter().map(|p| weight(*p)).sum::<u32>().max(1);
        Self {
            total_weight,
            completed_weight: 0,
            current_weight: 0,
        }
    }

    pub fn begin(&mut self, phase: Phase) {
        self.current_weight = weight(phase);
    }

    /// Overall progress with `fraction` (0.0-1.0) of the current phase done.
    pub fn at(&self, fraction: f64) -> u8 {
        let fraction = fraction.clamp(0.0, 1.0);
        let done = self.completed_weight as f64 + fraction * self.current_weight as f64;
        ((done / self.total_weight as f64) * 100.0).round() as u8
    }

    /// Overall progress after `done` of `total` units of the current phase.
    pub fn units(&self, done: usize, total: usize) -> u8 {
        if total == 0 {
            self.at(1.0)
        } else {
            self.at(done as f64 / total as f64)
        }
    }

    pub fn finish(&mut self) {
        self.completed_weight += self.current_weight;
        self.current_weight = 0;
    }
}
