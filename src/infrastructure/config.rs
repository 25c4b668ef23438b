use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::domain::aggregate::Granularity;
use crate::domain::record::{ITEM_ID_FIELD, ITEM_NAME_FIELD};

const ENV_PREFIX: &str = "DASHBOARDS";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub monday: MondaySettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MondaySettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl MondaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.monday.com/v2".to_string()
}

fn default_api_version() -> String {
    "2024-10".to_string()
}

fn default_page_limit() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardsConfig {
    #[serde(default)]
    pub dashboards: Vec<PipelineConfig>,
}

/// One dashboard: where its items come from and how they are reshaped
#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub id: String,
    pub title: String,
    pub board_ids: Vec<u64>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub derived: Vec<DerivedFieldSpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Records pass when any of these fields is non-negative or all are null
    #[serde(default)]
    pub non_negative_any_of: Vec<String>,
    pub metric: String,
    pub date_field: String,
    #[serde(default)]
    pub dimensions: Vec<DimensionSpec>,
    #[serde(default)]
    pub granularity: Granularity,
}

impl PipelineConfig {
    pub fn dimension(&self, key: &str) -> Option<&DimensionSpec> {
        self.dimensions
            .iter()
            .find(|d| d.field == key || d.label.eq_ignore_ascii_case(key))
    }

    /// Every canonical field name a record of this pipeline carries
    pub fn field_names(&self) -> HashSet<&str> {
        let mut names: HashSet<&str> = [ITEM_ID_FIELD, ITEM_NAME_FIELD].into_iter().collect();
        names.extend(self.fields.iter().map(|f| f.name.as_str()));
        names.extend(self.derived.iter().map(|d| d.name.as_str()));
        names
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.board_ids.is_empty() {
            bail!("dashboard '{}' has no board_ids", self.id);
        }

        let names = self.field_names();
        let mut referenced = vec![self.metric.as_str(), self.date_field.as_str()];
        referenced.extend(self.dimensions.iter().map(|d| d.field.as_str()));
        referenced.extend(self.filters.iter().map(|f| f.field.as_str()));
        referenced.extend(self.non_negative_any_of.iter().map(String::as_str));
        referenced.extend(self.derived.iter().flat_map(|d| d.first_nonzero_of.iter().map(String::as_str)));

        for name in referenced {
            if !names.contains(name) {
                bail!("dashboard '{}' references unknown field '{}'", self.id, name);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Text,
    Date,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldDefault {
    #[default]
    Null,
    Zero,
}

/// Maps board columns (by id or title) onto a canonical field
#[derive(Debug, Deserialize, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: FieldDefault,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DerivedFieldSpec {
    pub name: String,
    pub first_nonzero_of: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterSpec {
    pub field: String,
    pub equals: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DimensionSpec {
    pub field: String,
    pub label: String,
    #[serde(default = "default_empty_label")]
    pub empty_label: String,
}

fn default_empty_label() -> String {
    "Unassigned".to_string()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__")
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    app_config_from(config::File::with_name("config/monday"), environment())
}

fn app_config_from<S>(file: S, env: config::Environment) -> anyhow::Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder().add_source(file).add_source(env).build()?;
    Ok(settings.try_deserialize()?)
}

pub fn load_dashboards_config() -> anyhow::Result<DashboardsConfig> {
    dashboards_config_from(config::File::with_name("config/dashboards"), environment())
}

fn dashboards_config_from<S>(file: S, env: config::Environment) -> anyhow::Result<DashboardsConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = config::Config::builder().add_source(file).add_source(env).build()?;
    let dashboards: DashboardsConfig = settings.try_deserialize()?;
    dashboards.validate()?;
    Ok(dashboards)
}

impl DashboardsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for dashboard in &self.dashboards {
            if !seen.insert(dashboard.id.as_str()) {
                bail!("duplicate dashboard id '{}'", dashboard.id);
            }
            dashboard
                .validate()
                .with_context(|| format!("invalid dashboard '{}'", dashboard.id))?;
        }
        Ok(())
    }
}
