use serde::{Deserialize, Serialize};

/// Object kinds addressable through the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    DevUsers,
    RevUsers,
    RevOrgs,
    Accounts,
    Parts,
    Works,
    CustomStages,
}

impl ObjectKind {
    /// Path segment on the wire, e.g. `dev-users` in `dev-users.list`.
    pub fn path(&self) -> &'static str {
        match self {
            ObjectKind::DevUsers => "dev-users",
            ObjectKind::RevUsers => "rev-users",
            ObjectKind::RevOrgs => "rev-orgs",
            ObjectKind::Accounts => "accounts",
            ObjectKind::Parts => "parts",
            ObjectKind::Works => "works",
            ObjectKind::CustomStages => "stages.custom",
        }
    }

    /// Key holding the object array in a `.list` response. Custom stages use
    /// a generic `result` envelope instead of the kind name.
    pub fn list_key(&self) -> &'static str {
        match self {
            ObjectKind::DevUsers => "dev_users",
            ObjectKind::RevUsers => "rev_users",
            ObjectKind::RevOrgs => "rev_orgs",
            ObjectKind::Accounts => "accounts",
            ObjectKind::Parts => "parts",
            ObjectKind::Works => "works",
            ObjectKind::CustomStages => "result",
        }
    }

    /// Pagination cursor key; the `result` envelope calls it `cursor`.
    pub fn cursor_key(&self) -> &'static str {
        match self {
            ObjectKind::CustomStages => "cursor",
            _ => "next_cursor",
        }
    }

    /// Key holding the created object in a `.create` response.
    pub fn create_key(&self) -> &'static str {
        match self {
            ObjectKind::DevUsers => "dev_user",
            ObjectKind::RevUsers => "rev_user",
            ObjectKind::RevOrgs => "rev_org",
            ObjectKind::Accounts => "account",
            ObjectKind::Parts => "part",
            ObjectKind::Works => "work",
            ObjectKind::CustomStages => "result",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_paths_are_hyphenated_and_keys_snake_cased() {
        assert_eq!(ObjectKind::DevUsers.path(), "dev-users");
        assert_eq!(ObjectKind::DevUsers.list_key(), "dev_users");
        assert_eq!(ObjectKind::Works.create_key(), "work");
    }

    #[test]
    fn custom_stages_use_the_result_envelope() {
        assert_eq!(ObjectKind::CustomStages.path(), "stages.custom");
        assert_eq!(ObjectKind::CustomStages.list_key(), "result");
        assert_eq!(ObjectKind::CustomStages.cursor_key(), "cursor");
        assert_eq!(ObjectKind::Parts.cursor_key(), "next_cursor");
    }
}
