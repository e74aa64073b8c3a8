use crate::ContentKind;

const TICKET_SEVERITIES: &str = "low, medium, high, blocker";
const TICKET_STAGES: &str = "resolved, queued, in_development, awaiting_customer_response";
const ISSUE_PRIORITIES: &str = "p3, p2, p1, p0";
const ISSUE_STAGES: &str = "triage, in_development, in_review, completed";

pub fn hierarchy_system() -> String {
    "Your task is to represent the hierarchy of a company's product by looking at its \
     website, as a JSON object of capabilities, features and subfeatures. Use public \
     information; where specific data is unavailable, infer the type of business and \
     invent believable product details.\n\
     CRITICAL: return ONLY a valid JSON object, no other text, no markdown.\n\
     Use exactly this shape:\n\
     {\n  \"capability name\": {\n    \"feature name\": [\"subfeature name\"]\n  }\n}\n\
     Use only double quotes and ensure the JSON parses directly."
        .to_string()
}

pub fn hierarchy_user(website: &str) -> String {
    format!("Produce the detailed product hierarchy for {website} without placeholders.")
}

pub fn works_system(kind: ContentKind, website: &str, part: &str, count: u32) -> String {
    match kind {
        ContentKind::Tickets => format!(
            "You have been trained on all products from {website}. Create {count} support \
             tickets for the part {part}. Each ticket must have:\n\
             - a descriptive title of approximately 10 words\n\
             - a relevant description of 80 words\n\
             - a severity from this list: {TICKET_SEVERITIES}\n\
             - a stage from this list: {TICKET_STAGES}\n\
             CRITICAL: return ONLY a valid JSON array, no other text, no markdown.\n\
             Each element must exactly match:\n\
             {{\"title\": \"...\", \"body\": \"...\", \"severity\": \"...\", \"stage\": \"...\"}}"
        ),
        ContentKind::Issues => format!(
            "You have been trained on all products from {website}. Create {count} engineering \
             issues for the part {part}. Each issue must have:\n\
             - a descriptive title of approximately 10 words\n\
             - a relevant description of 80 words\n\
             - a priority from this list (lowest to highest): {ISSUE_PRIORITIES}\n\
             - a stage from this list: {ISSUE_STAGES}\n\
             CRITICAL: return ONLY a valid JSON array, no other text, no markdown.\n\
             Each element must exactly match:\n\
             {{\"title\": \"...\", \"body\": \"...\", \"priority\": \"...\", \"stage\": \"...\"}}"
        ),
    }
}

pub fn works_user(kind: ContentKind, part: &str, count: u32) -> String {
    format!(
        "Create {count} {} for part {part} and provide the JSON output.",
        kind.label()
    )
}
