use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::trace;

use crate::error::ConfigError;
use crate::monitors::state::Thresholds;
use crate::{AccessScope, Recipient, ReportOptions, Target};

/// Probe log backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Keep records in memory only (no persistence)
    None,

    /// Append-only CSV file (default)
    Csv {
        #[serde(default = "default_log_path")]
        path: PathBuf,
    },

    /// SQLite database file
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

fn default_log_path() -> PathBuf {
    PathBuf::from("ip_monitor_log.csv")
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("ip_monitor.db")
}

fn default_prom_path() -> PathBuf {
    PathBuf::from("ip_monitor.prom")
}

fn default_warn_threshold() -> u32 {
    1
}

fn default_fail_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    2
}

fn default_check_interval() -> u64 {
    30
}

fn default_ping_timeout() -> u64 {
    3
}

fn default_max_parallel_probes() -> usize {
    1
}

fn default_command_poll_timeout() -> u64 {
    10
}

fn default_report_command() -> String {
    String::from("/usr/local/bin/ipwatch-report")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram_token: String,

    /// Override for the Bot API base URL (defaults to api.telegram.org)
    pub telegram_api_url: Option<String>,

    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: u32,
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds between the starts of two probe rounds
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,

    #[serde(default = "default_max_parallel_probes")]
    pub max_parallel_probes: usize,

    /// Long-poll duration for inbound commands in seconds
    #[serde(default = "default_command_poll_timeout")]
    pub command_poll_timeout: u64,

    #[serde(default = "default_prom_path")]
    pub prom_metrics_path: PathBuf,

    #[serde(default = "default_log_path")]
    pub log_csv: PathBuf,

    /// Probe log backend (optional - defaults to CSV at `log_csv`)
    pub storage: Option<StorageConfig>,

    /// Command scheduled by the generated cron rules
    #[serde(default = "default_report_command")]
    pub report_command: String,

    #[serde(default)]
    pub recipients: Vec<RecipientConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipientConfig {
    pub chat_id: ChatId,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub reports: BTreeMap<String, ReportOptions>,
}

fn default_role() -> String {
    String::from("user")
}

fn default_timezone() -> String {
    String::from("UTC")
}

/// Telegram chat ids show up both as numbers and as strings in the wild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Number(i64),
    Text(String),
}

impl ChatId {
    fn resolve(&self) -> String {
        match self {
            ChatId::Number(id) => id.to_string(),
            ChatId::Text(id) => id.trim().to_string(),
        }
    }
}

/// Raw `resources` value: either the `"*"` wildcard or a list of hosts/names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Resources {
    Single(String),
    List(Vec<String>),
}

impl Default for Resources {
    fn default() -> Self {
        Resources::Single(String::from("*"))
    }
}

impl Resources {
    fn resolve(&self) -> Result<AccessScope, ConfigError> {
        let entries: Vec<&str> = match self {
            Resources::Single(entry) => vec![entry.trim()],
            Resources::List(entries) => entries.iter().map(|e| e.trim()).collect(),
        };

        if entries.contains(&"*") {
            return Ok(AccessScope::All);
        }

        if entries.iter().any(|e| e.is_empty()) {
            return Err(ConfigError::Invalid(String::from(
                "recipient resources must not contain empty entries",
            )));
        }

        let mut allowed: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            if !allowed.iter().any(|e| e == entry) {
                allowed.push(entry.to_string());
            }
        }
        Ok(AccessScope::Only(allowed))
    }
}

impl Config {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            warn: self.warn_threshold,
            fail: self.fail_threshold,
            success: self.success_threshold,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout)
    }

    pub fn command_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.command_poll_timeout)
    }

    pub fn storage(&self) -> StorageConfig {
        self.storage.clone().unwrap_or_else(|| StorageConfig::Csv {
            path: self.log_csv.clone(),
        })
    }

    /// Check every setting that does not depend on the target list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from(
                "telegram_token must be set",
            )));
        }

        let Thresholds {
            warn,
            fail,
            success,
        } = self.thresholds();
        if warn == 0 || fail == 0 || success == 0 {
            return Err(ConfigError::Invalid(format!(
                "thresholds must be at least 1 (warn: {warn}, fail: {fail}, success: {success})"
            )));
        }
        if fail < warn {
            return Err(ConfigError::Invalid(format!(
                "fail_threshold ({fail}) must not be lower than warn_threshold ({warn})"
            )));
        }

        if self.check_interval == 0 {
            return Err(ConfigError::Invalid(String::from(
                "check_interval must be at least 1 second",
            )));
        }
        if self.ping_timeout == 0 {
            return Err(ConfigError::Invalid(String::from(
                "ping_timeout must be at least 1 second",
            )));
        }
        if self.max_parallel_probes == 0 {
            return Err(ConfigError::Invalid(String::from(
                "max_parallel_probes must be at least 1",
            )));
        }

        self.resolve_recipients().map(|_| ())
    }

    /// Turn the raw recipient entries into validated recipients.
    pub fn resolve_recipients(&self) -> Result<Vec<Recipient>, ConfigError> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::with_capacity(self.recipients.len());

        for raw in &self.recipients {
            let id = raw.chat_id.resolve();
            if id.is_empty() {
                return Err(ConfigError::Invalid(String::from(
                    "recipient chat_id must not be empty",
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "recipient {id} is configured more than once"
                )));
            }

            let role = raw
                .role
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("recipient {id}: {e}")))?;

            recipients.push(Recipient {
                id,
                role,
                scope: raw.resources.resolve()?,
                timezone: raw.timezone.clone(),
                reports: raw.reports.clone(),
            });
        }

        Ok(recipients)
    }
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&file_content)
        .map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
        // the config carries the bot token, so only its shape is logged
        .inspect(|config: &Config| {
            trace!(
                "loaded config from {} ({} recipients)",
                path.display(),
                config.recipients.len()
            )
        })
}

pub fn read_targets_file(path: impl AsRef<Path>) -> Result<Vec<Target>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_targets(&content)
}

/// Parse a `;`-separated target list with an `IP;Name;SLA_Target` header.
pub fn parse_targets(content: &str) -> Result<Vec<Target>, ConfigError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let Some((header_line, header)) = lines.next() else {
        return Err(ConfigError::Targets {
            line: 0,
            message: String::from("target list is empty"),
        });
    };

    let columns: Vec<&str> = header
        .trim_start_matches('\u{feff}')
        .split(';')
        .map(str::trim)
        .collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| ConfigError::Targets {
                line: header_line,
                message: format!("missing column '{name}'"),
            })
    };
    let host_idx = column("IP")?;
    let name_idx = column("Name")?;
    let sla_idx = column("SLA_Target")?;

    let mut hosts = HashSet::new();
    let mut targets = vec![];

    for (line, row) in lines {
        let fields: Vec<&str> = row.split(';').map(str::trim).collect();
        let field = |idx: usize| {
            fields.get(idx).copied().ok_or_else(|| ConfigError::Targets {
                line,
                message: format!("expected {} fields, found {}", columns.len(), fields.len()),
            })
        };

        let host = field(host_idx)?;
        let name = field(name_idx)?;
        let sla = field(sla_idx)?;

        if host.is_empty() || host.starts_with('-') || host.contains(char::is_whitespace) {
            return Err(ConfigError::Targets {
                line,
                message: format!("invalid host '{host}'"),
            });
        }

        let sla_target: f64 = sla.parse().map_err(|_| ConfigError::Targets {
            line,
            message: format!("invalid SLA target '{sla}'"),
        })?;
        if !sla_target.is_finite() || sla_target < 0.0 {
            return Err(ConfigError::Targets {
                line,
                message: format!("invalid SLA target '{sla}'"),
            });
        }

        if !hosts.insert(host.to_string()) {
            return Err(ConfigError::Targets {
                line,
                message: format!("duplicate host '{host}'"),
            });
        }

        targets.push(Target {
            host: host.to_string(),
            name: if name.is_empty() {
                host.to_string()
            } else {
                name.to_string()
            },
            sla_target,
        });
    }

    if targets.is_empty() {
        return Err(ConfigError::Targets {
            line: header_line,
            message: String::from("no targets defined"),
        });
    }

    Ok(targets)
}
