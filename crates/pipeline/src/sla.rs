use serde_json::{Value, json};

/// Response-time targets (minutes) for ticket severities plus first-response
/// and next-response targets for conversations.
const TICKET_TARGETS: &[(&str, u32, u32)] = &[
    ("low", 25_920, 12_960),
    ("medium", 11_880, 5_940),
    ("high", 5_400, 2_700),
    ("blocker", 2_700, 1_380),
];

fn metric(rev_oid: &str, definition: u8, target: u32, warning: u32) -> Value {
    json!({
        "metric": format!("don:core:dvrv-us-1:devo/{rev_oid}:metric_definition/{definition}"),
        "performance": 0,
        "target": target,
        "warning_target": warning,
    })
}

/// The "Default" external SLA applied to every fresh demo org: one ticket
/// policy per severity plus a conversation policy. Created as a draft; the
/// caller transitions it to published.
pub fn default_sla_payload(rev_oid: &str) -> Value {
    let mut policies: Vec<Value> = TICKET_TARGETS
        .iter()
        .map(|(severity, target, warning)| {
            let mut selector = json!({
                "applies_to": "ticket",
                "custom_fields": {},
                "severity": [severity],
            });
            if *severity != "low" {
                selector["tag_operation"] = json!("any");
            }
            json!({
                "metrics": [metric(rev_oid, 3, *target, *warning)],
                "name": "New ticket policy",
                "selector": selector,
            })
        })
        .collect();

    policies.push(json!({
        "metrics": [
            metric(rev_oid, 1, 30, 20),
            metric(rev_oid, 2, 10, 5),
        ],
        "name": "New conversation policy",
        "selector": {
            "applies_to": "conversation",
            "custom_fields": {},
            "tag_operation": "any",
        },
    }));

    json!({
        "applies_to": ["conversation", "ticket"],
        "name": "Default",
        "sla_type": "external",
        "policies": policies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_covers_all_severities_and_conversations() {
        let payload = default_sla_payload("123");
        assert_eq!(payload["name"], "Default");
        assert_eq!(payload["sla_type"], "external");

        let policies = payload["policies"].as_array().unwrap();
        assert_eq!(policies.len(), 5);

        let blocker = &policies[3];
        assert_eq!(blocker["selector"]["severity"][0], "blocker");
        assert_eq!(blocker["metrics"][0]["target"], 2_700);
        assert_eq!(blocker["metrics"][0]["warning_target"], 1_380);
        assert_eq!(
            blocker["metrics"][0]["metric"],
            "don:core:dvrv-us-1:devo/123:metric_definition/3"
        );

        let conversation = &policies[4];
        assert_eq!(conversation["selector"]["applies_to"], "conversation");
        assert_eq!(conversation["metrics"].as_array().unwrap().len(), 2);
    }
}
