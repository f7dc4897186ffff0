//! Layered settings: built-in defaults, then an optional `farmlog.toml`, then
//! `FARMLOG__SECTION__KEY` environment variables.

use config::{Config, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// Signs session cookies and captcha tokens. No default.
    #[serde(deserialize_with = "secret_string")]
    pub session_secret: SecretString,
    pub secure_cookies: bool,
    pub session_ttl_hours: u64,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

fn secret_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:farmlog.db")?
            .set_default("media.root", "./data/uploads")?
            .set_default("media.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("auth.secure_cookies", true)?
            .set_default("auth.session_ttl_hours", 24 * 7)?
            .set_default("log.json", false)?
            .add_source(File::with_name("farmlog").required(false))
            .add_source(Environment::with_prefix("FARMLOG").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
