pub mod activities;
pub mod registrations;
pub mod role;
pub mod users;

pub use activities::{ActivityRecord, ActivityStatus, ViewerRegistration};
pub use registrations::{ActivityRef, RegistrationRecord, RegistrationStatus, StudentRef};
pub use role::Role;
pub use users::{NewUser, StudentProfile, UserCategory, UserRecord};

/// Label shown for any status value the portal does not know.
pub const UNKNOWN_STATUS_LABEL: &str = "Không xác định";

/// Looks up a raw status value in a synonym table. Matching ignores case and
/// surrounding whitespace; `-` and spaces count as `_`.
pub fn lookup_status<C: Copy>(table: &[(&str, C)], raw: &str) -> Option<C> {
    let key = normalize_status_key(raw);
    if key.is_empty() {
        return None;
    }
    table
        .iter()
        .find(|(value, _)| *value == key)
        .map(|(_, status)| *status)
}

pub fn normalize_status_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}
