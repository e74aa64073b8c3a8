use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};

use crate::orchestrator::CreatedAccount;

/// Sales stage → forecast category, per the target product's pipeline model.
const STAGE_FORECAST: &[(&str, &str)] = &[
    ("qualification", "pipeline"),
    ("stalled", "pipeline"),
    ("validation", "upside"),
    ("negotiation", "strong_upside"),
    ("contract", "commit"),
    ("closed_won", "won"),
    ("closed_lost", "omitted"),
];

fn forecast_for(stage: &str) -> &'static str {
    STAGE_FORECAST
        .iter()
        .find(|(s, _)| *s == stage)
        .map(|(_, f)| *f)
        .unwrap_or("pipeline")
}

/// One opportunity per account, plus an upsell follow-on for every
/// `closed_won` deal. Amount spreads the ARR over a 12-36 month term.
pub fn build_opportunities<R: Rng>(
    rng: &mut R,
    accounts: &[CreatedAccount],
    dev_user_ids: &[String],
    stages: &HashMap<String, String>,
) -> Vec<Value> {
    let mut opportunities = Vec::with_capacity(accounts.len() * 2);

    for account in accounts {
        let (stage, _) = STAGE_FORECAST[rng.gen_range(0..STAGE_FORECAST.len())];
        let Some(stage_id) = stages.get(stage) else {
            continue;
        };
        let owner = match dev_user_ids.choose(rng) {
            Some(owner) => owner.clone(),
            None => continue,
        };
        let arr: u32 = rng.gen_range(10_000..=100_000);
        let term_months: u32 = rng.gen_range(12..=36);
        let amount = (arr as f64 * (term_months as f64 / 12.0) * 100.0).round() / 100.0;

        opportunities.push(json!({
            "type": "opportunity",
            "title": account.name,
            "annual_recurring_revenue": arr,
            "amount": amount,
            "forecast_category": forecast_for(stage),
            "owned_by": [owner.clone()],
            "account": account.id,
            "stage": { "id": stage_id },
        }));

        if stage == "closed_won" {
            let upsell_stage = if rng.gen_bool(0.5) {
                "negotiation"
            } else {
                "contract"
            };
            let Some(upsell_stage_id) = stages.get(upsell_stage) else {
                continue;
            };
            let upsell_arr: u32 = rng.gen_range(10_000..=50_000);
            let upsell_term: u32 = rng.gen_range(12..=36);
            let upsell_amount =
                (upsell_arr as f64 * (upsell_term as f64 / 12.0) * 100.0).round() / 100.0;

            opportunities.push(json!({
                "type": "opportunity",
                "title": format!("{} - Upsell", account.name),
                "annual_recurring_revenue": upsell_arr,
                "amount": upsell_amount,
                "forecast_category": forecast_for(upsell_stage),
                "owned_by": [owner],
                "account": account.id,
                "stage": { "id": upsell_stage_id },
            }));
        }
    }

    opportunities
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn stage_map() -> HashMap<String, String> {
        STAGE_FORECAST
            .iter()
            .map(|(s, _)| (s.to_string(), format!("stage/{s}")))
            .collect()
    }

    fn account(name: &str) -> CreatedAccount {
        CreatedAccount {
            id: format!("acct/{name}"),
            name: name.to_string(),
            rev_org_id: format!("revo/{name}"),
        }
    }

    #[test]
    fn every_account_gets_at_least_one_opportunity() {
        let mut rng = StdRng::seed_from_u64(7);
        let accounts = vec![account("northwind"), account("lumen")];
        let owners = vec!["devu/1".to_string()];
        let opportunities = build_opportunities(&mut rng, &accounts, &owners, &stage_map());
        assert!(opportunities.len() >= accounts.len());
        for opportunity in &opportunities {
            assert_eq!(opportunity["type"], "opportunity");
            assert!(opportunity["annual_recurring_revenue"].as_u64().unwrap() >= 10_000);
        }
    }

    #[test]
    fn closed_won_deals_spawn_an_upsell() {
        // Scan seeds until one draws closed_won for the single account.
        for seed in 0..256u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let accounts = vec![account("cascade")];
            let owners = vec!["devu/1".to_string()];
            let opportunities = build_opportunities(&mut rng, &accounts, &owners, &stage_map());
            if opportunities
                .first()
                .is_some_and(|o| o["stage"]["id"] == "stage/closed_won")
            {
                assert_eq!(opportunities.len(), 2);
                assert!(
                    opportunities[1]["title"]
                        .as_str()
                        .unwrap()
                        .ends_with("Upsell")
                );
                let upsell_stage = opportunities[1]["stage"]["id"].as_str().unwrap();
                assert!(
                    upsell_stage == "stage/negotiation" || upsell_stage == "stage/contract"
                );
                return;
            }
        }
        panic!("no seed produced a closed_won opportunity");
    }
}
