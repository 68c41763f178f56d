//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

/// (key, default, secret, required, description)
type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("SERVER_PORT", "8093", false, false, "Control API port for the menu-bar shell"),
    ("DEFAULT_SERVER_URL", "https://ntfy.sh", false, false, "Server used when a new topic names none"),
    ("NOTIFICATION_ENABLED", "true", false, false, "Present a notification for each new message"),
    ("NOTIFICATION_MIN_PRIORITY", "1", false, false, "Lowest message priority (1-5) that is presented"),
    ("NOTIFICATION_ALLOWED_TOPICS", "", false, false, "Comma-separated topic ids to notify for; empty allows all"),
    ("MESSAGE_RETENTION_DAYS", "30", false, false, "Delete stored messages older than this many days (0 keeps all)"),
    ("KEEPALIVE_TIMEOUT_SECS", "120", false, false, "Drop a stream after this long without data (applied on restart)"),
    ("MANAGED_TOPICS", "[]", false, false, "Administrator-provided topics that cannot be deleted (JSON array)"),
    ("LAUNCH_AT_LOGIN", "false", false, false, "Start the menu-bar app at login"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}
