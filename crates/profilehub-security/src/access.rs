use crate::secret::constant_time_eq;
use serde::{Deserialize, Serialize};

/// What a caller is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Browse and search profiles, see unblurred dashboard statistics.
    Viewer,
    /// Everything a viewer can do, plus profile CRUD and document upload.
    Admin,
}

impl Role {
    /// Whether this role includes the permissions of `required`.
    pub fn allows(&self, required: Role) -> bool {
        *self >= required
    }
}

/// One configured API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    /// The secret presented by callers.
    pub key: String,
    /// What the key may do.
    pub role: Role,
}

/// Maps API keys to roles.
///
/// With no keys configured, authentication is disabled and every caller
/// is treated as an admin.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    keys: Vec<ApiKeyEntry>,
}

impl AccessControl {
    /// Blank keys are ignored. No keys disables authentication.
    pub fn new(keys: Vec<ApiKeyEntry>) -> Self {
        Self {
            keys: keys.into_iter().filter(|k| !k.key.is_empty()).collect(),
        }
    }

    /// Whether any key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Role granted to a presented key, if any.
    ///
    /// Every configured key is compared, so timing does not reveal which
    /// entry matched.
    pub fn resolve(&self, presented: Option<&str>) -> Option<Role> {
        if !self.is_enabled() {
            return Some(Role::Admin);
        }
        let presented = presented?;
        let mut granted = None;
        for entry in &self.keys {
            if constant_time_eq(entry.key.as_bytes(), presented.as_bytes()) {
                granted = granted.max(Some(entry.role));
            }
        }
        granted
    }
}
