use serde::{Deserialize, Serialize};

/// Identity of the caller as established by the authentication layer in
/// front of the registry. Recorded as the author of branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_name: None,
        }
    }

    pub fn with_name(user_id: String, user_name: Option<String>) -> Self {
        Self { user_id, user_name }
    }

    /// Identity used for work the registry does on its own behalf
    /// (initial branches, startup recovery).
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_name: Some("System".to_string()),
        }
    }

    pub fn author(&self) -> Option<String> {
        Some(self.user_id.clone())
    }
}
