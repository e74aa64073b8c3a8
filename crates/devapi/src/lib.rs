pub mod client;
pub mod error;
pub mod kinds;

pub use client::{HttpManagementApi, ManagementApi};
pub use error::DevApiError;
pub use kinds::ObjectKind;

/// Shortens a credential for log output. PATs are never logged in full.
pub fn redact_pat(pat: &str) -> String {
    if pat.chars().count() <= 8 {
        "********".to_string()
    } else {
        let prefix: String = pat.chars().take(8).collect();
        format!("{prefix}…")
    }
}
