use std::path::Path;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};

/// One retention rule as declared in the configuration file.
///
/// The fields are kept as raw strings here; the engine compiles them into a
/// policy and decides whether the entry is usable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    /// Diagnostic label, unique within a configuration.
    pub name: String,
    /// Index name template containing a `%{date-format}` placeholder.
    ///
    /// Example: `logstash-%{YYYY.MM.dd}`
    pub pattern: String,
    /// Age past which matching indices are closed, e.g. "3 days".
    pub close: String,
    /// Age past which matching indices are deleted, e.g. "7 days".
    pub delete: String,
}

/// Cluster endpoint configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster HTTP API.
    ///
    /// Env: CURATOR__ELASTICSEARCH__URL
    pub url: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9200"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// Retention rules, evaluated in declaration order.
    #[serde(default)]
    pub curator: Vec<RetentionRule>,
    /// Delay before the first cleanup cycle (period expression).
    ///
    /// Env: CURATOR__INITIAL_DELAY
    pub initial_delay: String,
    /// Delay between cleanup cycles (period expression).
    ///
    /// Env: CURATOR__REPEAT_DELAY
    pub repeat_delay: String,
    /// Cluster endpoint.
    pub elasticsearch: ElasticsearchConfig,
    /// Log close/delete decisions without executing them.
    ///
    /// Env: CURATOR__DRY_RUN
    pub dry_run: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            curator: Vec::new(),
            initial_delay: String::from("10 seconds"),
            repeat_delay: String::from("1 hour"),
            elasticsearch: ElasticsearchConfig::default(),
            // Disabled actions by default for safety
            dry_run: true,
        }
    }
}

impl Configuration {
    /// Loads configuration from `curator.yml` in the working directory,
    /// overridden by `CURATOR__*` environment variables, on top of defaults.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from_path(Path::new("curator.yml"))
    }

    /// Loads configuration from an explicit file path.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("CURATOR__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
