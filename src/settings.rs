//! Runtime settings: built-in defaults, then an optional TOML file, then
//! `HATCHLY_*` environment variables

use crate::config::MAX_PAYLOAD_BYTES;
use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

/// The default settings file, looked up in the working directory
pub const DEFAULT_FILE: &str = "hatchly.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    /// TorchScript file of the days-until-hatch regression model
    pub regression_model: String,

    /// TorchScript file of the egg/no-egg classifier
    pub classifier_model: String,

    /// Where accepted prediction photos are written
    pub upload_dir: String,

    pub database_url: String,
    pub log_level: String,
    pub max_payload_bytes: usize,
}

impl Settings {
    /// Load settings, reading `file` if it exists
    pub fn load(file: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("regression_model", "models/latest_model.pt")?
            .set_default("classifier_model", "models/classifier.pt")?
            .set_default("upload_dir", "static/uploads")?
            .set_default("database_url", "sqlite://hatchly.db?mode=rwc")?
            .set_default("log_level", "info")?
            .set_default("max_payload_bytes", MAX_PAYLOAD_BYTES as i64)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("HATCHLY"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
