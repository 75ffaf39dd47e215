//! Application configuration.
//!
//! Settings are layered: `config/default.toml`, then an optional
//! environment-specific file selected by `CARECONTROL_ENV`, then
//! `CARECONTROL_*` environment variables.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret the identity provider signs session tokens with.
    pub jwt_secret: String,
}

/// Load configuration from files and environment.
pub fn load_config() -> Result<Settings, config::ConfigError> {
    let env = std::env::var("CARECONTROL_ENV").unwrap_or_else(|_| "development".into());

    config::Config::builder()
        .add_source(config::File::with_name("config/default"))
        .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
        .add_source(config::Environment::with_prefix("CARECONTROL").separator("__"))
        .build()?
        .try_deserialize()
}
