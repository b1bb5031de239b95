use std::env;

use tracing::info;
use valdore_common::identity::DEFAULT_GUEST_LABEL;

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:3020";
pub const DEFAULT_ADMIN_EMAILS: &str = "administrador@cafevaldore.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of a `valdore-node` server.
    pub node_url: String,
    /// Lowercased allow-list of back-office accounts.
    pub admin_emails: Vec<String>,
    /// Owner label written on conversations started by guests.
    pub guest_label: String,
}

impl ClientConfig {
    /// Read `VALDORE_NODE_URL`, `VALDORE_ADMIN_EMAILS` (comma-separated) and
    /// `VALDORE_GUEST_LABEL`, logging every default used.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };
        Self {
            node_url: var("VALDORE_NODE_URL", DEFAULT_NODE_URL),
            admin_emails: parse_emails(&var("VALDORE_ADMIN_EMAILS", DEFAULT_ADMIN_EMAILS)),
            guest_label: var("VALDORE_GUEST_LABEL", DEFAULT_GUEST_LABEL),
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|a| *a == email)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            admin_emails: parse_emails(DEFAULT_ADMIN_EMAILS),
            guest_label: DEFAULT_GUEST_LABEL.to_string(),
        }
    }
}

fn parse_emails(list: &str) -> Vec<String> {
    list.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn admin_list_is_case_insensitive() {
        let config = ClientConfig::from_lookup(|key| {
            (key == "VALDORE_ADMIN_EMAILS").then(|| " Jefe@Valdore.com, ,caja@valdore.com".to_string())
        });
        assert_eq!(config.admin_emails, vec!["jefe@valdore.com", "caja@valdore.com"]);
        assert!(config.is_admin_email("JEFE@valdore.com"));
        assert!(!config.is_admin_email("cliente@valdore.com"));
    }
}
