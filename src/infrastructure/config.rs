use crate::application::channel_source::SourceLayout;
use crate::application::view_registry::DEFAULT_MAX_SESSIONS;
use crate::application::view_service::BudgetLimits;
use anyhow::ensure;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub view: ViewSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewSettings {
    #[serde(default = "default_budget")]
    pub default_budget: usize,
    #[serde(default = "max_budget")]
    pub max_budget: usize,
    #[serde(default)]
    pub timestamp_format: TimestampFormat,
    /// Sessions kept before the least recently used one is dropped.
    #[serde(default = "max_sessions")]
    pub max_sessions: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            default_budget: default_budget(),
            max_budget: max_budget(),
            timestamp_format: TimestampFormat::default(),
            max_sessions: max_sessions(),
        }
    }
}

fn default_budget() -> usize {
    3000
}

fn max_budget() -> usize {
    20_000
}

fn max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

/// How timestamps are rendered on the wire.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    #[default]
    Iso8601,
    EpochMs,
}

impl From<&ViewSettings> for BudgetLimits {
    fn from(settings: &ViewSettings) -> Self {
        Self {
            default_budget: settings.default_budget,
            max_budget: settings.max_budget,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub source: SourceSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub data_dir: PathBuf,
    #[serde(default = "timestamp_group")]
    pub timestamp_group: String,
    /// An empty name reads every group except the timestamp group.
    #[serde(default = "data_group")]
    pub data_group: String,
    #[serde(default = "axis_property")]
    pub axis_property: String,
}

fn timestamp_group() -> String {
    "TimeStamps".to_string()
}

fn data_group() -> String {
    SourceLayout::default().data_group.unwrap_or_default()
}

fn axis_property() -> String {
    "Xaxis".to_string()
}

impl From<&SourceSettings> for SourceLayout {
    fn from(settings: &SourceSettings) -> Self {
        Self {
            timestamp_group: settings.timestamp_group.clone(),
            data_group: Some(settings.data_group.clone()).filter(|g| !g.is_empty()),
        }
    }
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server"))
        .build()?;

    validate_server_config(settings.try_deserialize()?)
}

pub fn load_source_config() -> anyhow::Result<SourceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/source"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn validate_server_config(config: ServerConfig) -> anyhow::Result<ServerConfig> {
    let view = &config.view;
    ensure!(view.default_budget >= 1, "view.default_budget must be at least 1");
    ensure!(view.max_sessions >= 1, "view.max_sessions must be at least 1");
    ensure!(
        view.max_budget >= view.default_budget,
        "view.max_budget ({}) is below view.default_budget ({})",
        view.max_budget,
        view.default_budget
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse<T: serde::de::DeserializeOwned>(toml: &str) -> anyhow::Result<T> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    #[test]
    fn test_server_config_defaults() {
        let config: ServerConfig = parse("[server]\nbind = \"127.0.0.1:8050\"\n").unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:8050");
        assert_eq!(config.view.default_budget, 3000);
        assert_eq!(config.view.timestamp_format, TimestampFormat::Iso8601);
        assert_eq!(config.view.max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(validate_server_config(config).is_ok());
    }

    #[test]
    fn test_server_config_rejects_inverted_budgets() {
        let config: ServerConfig = parse(
            "[server]\nbind = \"0.0.0.0:8050\"\n[view]\ndefault_budget = 500\nmax_budget = 100\ntimestamp_format = \"epoch_ms\"\n",
        )
        .unwrap();

        assert_eq!(config.view.timestamp_format, TimestampFormat::EpochMs);
        assert!(validate_server_config(config).is_err());
    }

    #[test]
    fn test_source_config_layout() {
        let config: SourceConfig = parse("[source]\ndata_dir = \"uploads\"\n").unwrap();
        let layout = SourceLayout::from(&config.source);

        assert_eq!(config.source.axis_property, "Xaxis");
        assert_eq!(layout, SourceLayout::default());
        assert!(layout.is_data_group("RTAC Data"));
        assert!(!layout.is_data_group("Anything"));

        let config: SourceConfig =
            parse("[source]\ndata_dir = \"uploads\"\ndata_group = \"\"\n").unwrap();
        let layout = SourceLayout::from(&config.source);
        assert_eq!(layout.timestamp_group, "TimeStamps");
        assert!(layout.is_data_group("Anything"));
        assert!(!layout.is_data_group("TimeStamps"));
    }
}
