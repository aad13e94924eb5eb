use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub jsonapi: JsonApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonApiConfig {
    /// Path every resource route is mounted under and hrefs are resolved against.
    pub base_url: String,
    /// JSON file listing the served resource schemas.
    pub schema_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for JsonApiConfig {
    fn default() -> Self {
        Self {
            base_url: "/api/v1".to_string(),
            schema_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables, e.g. JSONAPI_SERVER__PORT=8080
        config = config.add_source(
            config::Environment::with_prefix("JSONAPI")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Schema file to serve, falling back to the bundled demo schema
    pub fn schema_path(&self) -> &str {
        self.jsonapi
            .schema_path
            .as_deref()
            .unwrap_or("demos/schema.json")
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
