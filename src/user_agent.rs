//! Shared User-Agent string for listing and download requests.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/autoindex-mirror";

/// Default User-Agent for every request the mirror issues (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("autoindex-mirror/{version} (+{PROJECT_UA_URL})")
}
