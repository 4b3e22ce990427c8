//! JSON configuration, loaded once at startup.

use serde::Deserialize;

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres` or `sqlite`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Database user, when applicable.
    #[serde(default)]
    pub user: String,
    /// Database password, when applicable.
    #[serde(default)]
    pub password: String,
    /// Database host, when applicable.
    #[serde(default)]
    pub host: String,
    /// Database port, when applicable.
    #[serde(default)]
    pub port: u16,
    /// Database name, or file path for the file-embedded dialect.
    pub name: String,
}

impl DatabaseConfig {
    /// Renders this configuration as an `sqlx::Any` connection URL.
    #[must_use]
    pub fn to_url(&self) -> String {
        match self.kind.as_str() {
            "sqlite" => format!("sqlite://{}", self.name),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

/// Top-level policy-service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// External API bind host.
    pub listen_host: String,
    /// External API bind port.
    pub listen_port: u16,
    /// Internal (mTLS) API bind port.
    pub internal_listen_port: u16,
    /// CA bundle for internal mTLS.
    pub ca_cert_file: String,
    /// Server certificate for internal mTLS.
    pub server_cert_file: String,
    /// Server key for internal mTLS.
    pub server_key_file: String,
    /// UAA OAuth client id used for this service's own CC calls.
    pub uaa_client: String,
    /// UAA OAuth client secret.
    pub uaa_client_secret: String,
    /// UAA base URL (token introspection).
    pub uaa_url: String,
    /// Cloud controller base URL (app/space metadata).
    pub cc_url: String,
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Width, in bytes, of assigned tags.
    #[serde(default = "default_tag_length")]
    pub tag_length: u32,
    /// Metrics sink address (external collaborator; address only).
    #[serde(default)]
    pub metron_address: String,
    /// Scope string that grants admin (bypasses per-space checks).
    #[serde(default = "default_admin_scope")]
    pub admin_scope: String,
}

fn default_tag_length() -> u32 {
    2
}

fn default_admin_scope() -> String {
    "network.admin".to_string()
}

impl ServiceConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(std::io::Error::other)
    }
}
