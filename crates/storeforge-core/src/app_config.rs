use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Public base URL of the application, used to build OAuth redirect URIs.
    pub app_url: String,
    /// Base64-encoded 32-byte key for encrypting stored OAuth tokens.
    pub token_key: String,
    pub shopify_client_id: Option<String>,
    pub shopify_client_secret: Option<String>,
    pub etsy_client_id: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// Wall-clock budget for one pipeline invocation, chosen to stay under a
    /// 300s host execution ceiling with a safety margin.
    pub pipeline_budget_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("app_url", &self.app_url)
            .field("database_url", &"[redacted]")
            .field("token_key", &"[redacted]")
            .field("shopify_client_id", &self.shopify_client_id)
            .field(
                "shopify_client_secret",
                &self.shopify_client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("etsy_client_id", &self.etsy_client_id)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("pipeline_budget_secs", &self.pipeline_budget_secs)
            .finish()
    }
}

impl AppConfig {
    /// Shopify OAuth credentials, failing fast with the missing variable name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::MissingEnvVar`] naming the absent
    /// variable.
    pub fn shopify_credentials(&self) -> Result<(&str, &str), crate::ConfigError> {
        let id = self
            .shopify_client_id
            .as_deref()
            .ok_or_else(|| crate::ConfigError::MissingEnvVar("SHOPIFY_CLIENT_ID".to_string()))?;
        let secret = self.shopify_client_secret.as_deref().ok_or_else(|| {
            crate::ConfigError::MissingEnvVar("SHOPIFY_CLIENT_SECRET".to_string())
        })?;
        Ok((id, secret))
    }

    /// Etsy OAuth client id, failing fast with the missing variable name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::MissingEnvVar`] naming the absent
    /// variable.
    pub fn etsy_client_id(&self) -> Result<&str, crate::ConfigError> {
        self.etsy_client_id
            .as_deref()
            .ok_or_else(|| crate::ConfigError::MissingEnvVar("ETSY_CLIENT_ID".to_string()))
    }
}
