use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::audit::EligibilityFilter;
use crate::engine::DiffOptions;

pub const DEFAULT_CONFIG_FILE: &str = "plandiff.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanDiffConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl PlanDiffConfig {
    /// Load `path`, falling back to defaults when it does not exist. Relative
    /// output paths resolve against the directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Self::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            tracing::info!(
                "No config file found at {}. Using PlanDiffConfig::default().",
                path.display()
            );
            PlanDiffConfig::default()
        };
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str::<PlanDiffConfig>(text)?)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.output.dir = absolutize(root, &self.output.dir);
    }

    pub fn replay_log_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.replay_log)
    }

    pub fn summary_log_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.summary_log)
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            collect_result_data: self.collect.result_data,
            slow_profile: self.collect.slow_profile,
            slow_explain: self.collect.slow_explain,
        }
    }

    pub fn eligibility(&self) -> EligibilityFilter {
        EligibilityFilter::new(self.filter.min_hour)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "ConnectionConfig::default_host")]
    pub host: String,
    #[serde(default = "ConnectionConfig::default_query_port")]
    pub query_port: u16,
    #[serde(default = "ConnectionConfig::default_http_port")]
    pub http_port: u16,
    #[serde(default = "ConnectionConfig::default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub fragment_instances: Option<u32>,
}

impl ConnectionConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_query_port() -> u16 {
        9030
    }

    fn default_http_port() -> u16 {
        8030
    }

    fn default_user() -> String {
        "root".to_string()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            query_port: Self::default_query_port(),
            http_port: Self::default_http_port(),
            user: Self::default_user(),
            password: String::new(),
            database: None,
            fragment_instances: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "OutputConfig::default_replay_log")]
    pub replay_log: PathBuf,
    #[serde(default = "OutputConfig::default_summary_log")]
    pub summary_log: PathBuf,
    #[serde(default = "OutputConfig::default_clean_on_start")]
    pub clean_on_start: bool,
}

impl OutputConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("output/result")
    }

    fn default_replay_log() -> PathBuf {
        PathBuf::from("replay.log")
    }

    fn default_summary_log() -> PathBuf {
        PathBuf::from("summary.jsonl")
    }

    fn default_clean_on_start() -> bool {
        true
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            replay_log: Self::default_replay_log(),
            summary_log: Self::default_summary_log(),
            clean_on_start: Self::default_clean_on_start(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
    #[serde(default)]
    pub result_data: bool,
    #[serde(default)]
    pub statistics: bool,
    #[serde(default = "CollectConfig::default_true")]
    pub slow_profile: bool,
    #[serde(default = "CollectConfig::default_true")]
    pub slow_explain: bool,
}

impl CollectConfig {
    fn default_true() -> bool {
        true
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            result_data: false,
            statistics: false,
            slow_profile: true,
            slow_explain: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "FilterConfig::default_min_hour")]
    pub min_hour: u32,
}

impl FilterConfig {
    fn default_min_hour() -> u32 {
        8
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_hour: Self::default_min_hour(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "ProgressConfig::default_every")]
    pub every: u64,
}

impl ProgressConfig {
    fn default_every() -> u64 {
        1000
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            every: Self::default_every(),
        }
    }
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
