use serde::{Deserialize, Serialize};

/// The caller on whose behalf an operation runs.
///
/// Carried alongside every search so the builder can pick locale-aware
/// ordering and the data layer can stamp "last modified by".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Caller identity, if authenticated.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Language code used for locale-aware ordering (e.g. "en", "de").
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl UserContext {
    pub fn new(user_id: &str, language: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            language: language.to_string(),
        }
    }

    /// A caller without identity, using the default language.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            language: default_language(),
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }

    #[test]
    fn epoch_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_epoch_millis() > 1_577_836_800_000);
    }

    #[test]
    fn user_context_defaults() {
        let user: UserContext = serde_json::from_str("{}").unwrap();
        assert_eq!(user, UserContext::anonymous());
        assert_eq!(user.language, "en");

        let user = UserContext::new("alice", "fr");
        assert_eq!(user.user_id.as_deref(), Some("alice"));
    }
}
