use derive_builder::Builder;

use crate::config::{SINK_API_BASE_URL, SINK_AUTH_BASE_URL};

pub const ENV_TENANT_ID: &str = "POWER_BI_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "POWER_BI_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "POWER_BI_CLIENT_SECRET";
pub const ENV_WORKSPACE_ID: &str = "POWER_BI_WORKSPACE_ID";

/// Credentials and endpoints of the analytics sink
#[derive(Debug, Clone, Builder)]
pub struct SinkConfig {
    /// Directory tenant; `common` is used when absent
    #[builder(setter(into, strip_option), default)]
    pub tenant_id: Option<String>,
    #[builder(setter(into))]
    pub client_id: String,
    #[builder(setter(into))]
    pub client_secret: String,
    /// Target workspace; the caller's own workspace when absent
    #[builder(setter(into, strip_option), default)]
    pub workspace_id: Option<String>,
    #[builder(setter(into), default = "SINK_AUTH_BASE_URL.to_string()")]
    pub auth_base_url: String,
    #[builder(setter(into), default = "SINK_API_BASE_URL.to_string()")]
    pub api_base_url: String,
}

impl SinkConfig {
    /// Read credentials from the process environment.
    ///
    /// Returns `None` unless both client id and secret are set and non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = SinkConfig {
            tenant_id: non_empty(ENV_TENANT_ID),
            client_id: non_empty(ENV_CLIENT_ID)?,
            client_secret: non_empty(ENV_CLIENT_SECRET)?,
            workspace_id: non_empty(ENV_WORKSPACE_ID),
            auth_base_url: SINK_AUTH_BASE_URL.to_string(),
            api_base_url: SINK_API_BASE_URL.to_string(),
        };
        Some(config)
    }

    /// Replication runs only with a complete client credential pair
    pub fn is_enabled(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }

    pub fn token_url(&self) -> String {
        let tenant = self.tenant_id.as_deref().unwrap_or("common");
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.auth_base_url.trim_end_matches('/'),
            tenant
        )
    }

    /// Base URL for dataset operations, scoped to the workspace if one is set
    pub fn api_url(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        match &self.workspace_id {
            Some(workspace) => format!("{}/groups/{}", base, workspace),
            None => format!("{}/myorg", base),
        }
    }
}
