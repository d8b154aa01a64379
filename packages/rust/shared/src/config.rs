//! Application configuration for jobdigest.
//!
//! User config lives at `~/.jobdigest/jobdigest.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{JobDigestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobdigest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobdigest";

/// Year-less dates resolve to within the past year, so wider windows are meaningless.
pub const MAX_WINDOW_DAYS: u32 = 365;

// ---------------------------------------------------------------------------
// Config structs (matching jobdigest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Audience keys (chat rooms/topics) to harvest for.
    #[serde(default = "default_rooms")]
    pub rooms: Vec<String>,

    /// Job sources to harvest from.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            rooms: default_rooms(),
            sources: default_sources(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Keep postings at most this many days old.
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// Postings per rendered message.
    #[serde(default = "default_jobs_per_message")]
    pub jobs_per_message: u32,

    /// Root directory for sent records.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Request timeout when fetching a source.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Maximum pipelines running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Minutes between harvests in `watch` mode.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_minutes: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_days: default_max_days(),
            jobs_per_message: default_jobs_per_message(),
            data_dir: default_data_dir(),
            fetch_timeout_secs: default_fetch_timeout(),
            concurrency: default_concurrency(),
            watch_interval_minutes: default_watch_interval(),
        }
    }
}

fn default_max_days() -> u32 {
    7
}
fn default_jobs_per_message() -> u32 {
    10
}
fn default_data_dir() -> String {
    "~/.jobdigest/data".into()
}
fn default_fetch_timeout() -> u64 {
    30
}
fn default_concurrency() -> u32 {
    4
}
fn default_watch_interval() -> u64 {
    60
}
fn default_rooms() -> Vec<String> {
    vec!["general".into()]
}

/// Which table layout and message format a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Internship listings.
    Internships,
    /// New-grad position listings.
    NewGrad,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internships => f.write_str("internships"),
            Self::NewGrad => f.write_str("new-grad"),
        }
    }
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique short name, used on the command line.
    pub name: String,
    /// Table layout/format variant.
    pub kind: SourceKind,
    /// Label used in message headers.
    pub job_type: String,
    /// Raw markdown document URL.
    pub url: String,
    /// File holding this source's sent records inside each room directory.
    pub sent_file: String,
}

fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "internships".into(),
            kind: SourceKind::Internships,
            job_type: "Internships".into(),
            url: "https://raw.githubusercontent.com/SimplifyJobs/Summer2025-Internships/dev/README.md"
                .into(),
            sent_file: "sent_internships.json".into(),
        },
        SourceConfig {
            name: "new-grad".into(),
            kind: SourceKind::NewGrad,
            job_type: "New Grad Positions".into(),
            url: "https://raw.githubusercontent.com/SimplifyJobs/New-Grad-Positions/dev/README.md"
                .into(),
            sent_file: "sent_new_grad.json".into(),
        },
    ]
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, validated)
// ---------------------------------------------------------------------------

/// Validated runtime configuration for a harvest.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Filter window width in days.
    pub max_days: u32,
    /// Batch size for rendered messages (always >= 1).
    pub jobs_per_message: usize,
    /// Root directory for sent records (home-expanded).
    pub data_dir: PathBuf,
    /// Fetch timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Maximum concurrently running pipelines (always >= 1).
    pub concurrency: usize,
    /// Audience keys.
    pub rooms: Vec<String>,
    /// Sources, names unique.
    pub sources: Vec<SourceConfig>,
}

impl TryFrom<&AppConfig> for HarvestConfig {
    type Error = JobDigestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let defaults = &config.defaults;

        if defaults.jobs_per_message == 0 {
            return Err(JobDigestError::config("jobs_per_message must be at least 1"));
        }
        if defaults.max_days > MAX_WINDOW_DAYS {
            return Err(JobDigestError::config(format!(
                "max_days must be at most {MAX_WINDOW_DAYS}, got {}",
                defaults.max_days
            )));
        }
        if defaults.concurrency == 0 {
            return Err(JobDigestError::config("concurrency must be at least 1"));
        }
        if config.sources.is_empty() {
            return Err(JobDigestError::config("no sources configured"));
        }
        if config.rooms.is_empty() {
            return Err(JobDigestError::config("no rooms configured"));
        }
        if config.rooms.iter().any(|r| r.trim().is_empty()) {
            return Err(JobDigestError::config("room names must not be empty"));
        }

        let mut names = HashSet::new();
        for source in &config.sources {
            if !names.insert(source.name.as_str()) {
                return Err(JobDigestError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            Url::parse(&source.url).map_err(|e| {
                JobDigestError::config(format!("source '{}' has invalid url: {e}", source.name))
            })?;
            if source.sent_file.is_empty()
                || source.sent_file.contains(['/', '\\'])
                || source.sent_file.starts_with('.')
            {
                return Err(JobDigestError::config(format!(
                    "source '{}' has invalid sent_file '{}'",
                    source.name, source.sent_file
                )));
            }
        }

        Ok(Self {
            max_days: defaults.max_days,
            jobs_per_message: defaults.jobs_per_message as usize,
            data_dir: expand_home(&defaults.data_dir)?,
            fetch_timeout_secs: defaults.fetch_timeout_secs,
            concurrency: defaults.concurrency as usize,
            rooms: config.rooms.clone(),
            sources: config.sources.clone(),
        })
    }
}

impl HarvestConfig {
    /// Look up a source by name.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobdigest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| JobDigestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobdigest/jobdigest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobDigestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| JobDigestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobDigestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| JobDigestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobDigestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| JobDigestError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None if path == "~" => {
            dirs::home_dir().ok_or_else(|| JobDigestError::config("could not determine home directory"))
        }
        None => Ok(PathBuf::from(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_days, 7);
        assert_eq!(parsed.defaults.jobs_per_message, 10);
        assert_eq!(parsed.sources.len(), 2);
        assert_eq!(parsed.sources[1].kind, SourceKind::NewGrad);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
rooms = ["swe-jobs", "data-jobs"]

[defaults]
jobs_per_message = 5

[[sources]]
name = "interns"
kind = "internships"
job_type = "Internships"
url = "https://example.com/README.md"
sent_file = "sent.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.rooms, vec!["swe-jobs", "data-jobs"]);
        assert_eq!(config.defaults.jobs_per_message, 5);
        assert_eq!(config.defaults.max_days, 7);
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn harvest_config_from_defaults() {
        let harvest = HarvestConfig::try_from(&AppConfig::default()).expect("valid");
        assert_eq!(harvest.jobs_per_message, 10);
        assert_eq!(harvest.concurrency, 4);
        assert!(harvest.source("new-grad").is_some());
        assert!(harvest.source("missing").is_none());
    }

    #[test]
    fn zero_jobs_per_message_is_rejected() {
        let mut config = AppConfig::default();
        config.defaults.jobs_per_message = 0;
        let err = HarvestConfig::try_from(&config).unwrap_err();
        assert!(matches!(err, JobDigestError::Config { .. }));
    }

    #[test]
    fn empty_room_list_is_rejected() {
        let mut config = AppConfig::default();
        config.rooms.clear();
        let err = HarvestConfig::try_from(&config).unwrap_err();
        assert!(err.to_string().contains("no rooms"));
    }

    #[test]
    fn oversized_window_is_rejected() {
        let mut config = AppConfig::default();
        config.defaults.max_days = 400;
        let err = HarvestConfig::try_from(&config).unwrap_err();
        assert!(err.to_string().contains("max_days"));
    }

    #[test]
    fn duplicate_source_names_are_rejected() {
        let mut config = AppConfig::default();
        let dup = config.sources[0].clone();
        config.sources.push(dup);
        let err = HarvestConfig::try_from(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate source"));
    }

    #[test]
    fn sent_file_must_be_a_plain_name() {
        let mut config = AppConfig::default();
        config.sources[0].sent_file = "../escape.json".into();
        assert!(HarvestConfig::try_from(&config).is_err());
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/jobs").unwrap(), PathBuf::from("/var/lib/jobs"));
        assert_eq!(expand_home("data").unwrap(), PathBuf::from("data"));
    }
}
