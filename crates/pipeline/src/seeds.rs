use serde::Deserialize;

use crate::PipelineError;

/// Template rows describing the demo org's people and companies. The rows
/// ship embedded in the binary; generation input, not durable state.
const DEV_USERS_CSV: &str = include_str!("../data/dev_users.csv");
const ACCOUNTS_CSV: &str = include_str!("../data/accounts.csv");
const REV_USERS_CSV: &str = include_str!("../data/rev_users.csv");

#[derive(Debug, Clone, Deserialize)]
pub struct DevUserSeed {
    pub full_name: String,
}

impl DevUserSeed {
    /// `Jane Doe` -> `jane.doe@example.co`, as the org expects.
    pub fn email(&self) -> String {
        format!(
            "{}@example.co",
            self.full_name.to_lowercase().replace(' ', ".")
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RevUserSeed {
    pub display_name: String,
}

fn parse<T: for<'de> Deserialize<'de>>(raw: &str, what: &str) -> Result<Vec<T>, PipelineError> {
    let mut reader = csv::Reader::from_reader(raw.as_bytes());
    let rows: Result<Vec<T>, _> = reader.deserialize().collect();
    rows.map_err(|e| PipelineError::Seed(format!("{what}: {e}")))
}

pub fn dev_users() -> Result<Vec<DevUserSeed>, PipelineError> {
    parse(DEV_USERS_CSV, "dev_users.csv")
}

pub fn accounts() -> Result<Vec<AccountSeed>, PipelineError> {
    parse(ACCOUNTS_CSV, "accounts.csv")
}

pub fn rev_users() -> Result<Vec<RevUserSeed>, PipelineError> {
    parse(REV_USERS_CSV, "rev_users.csv")
}
