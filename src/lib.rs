pub mod actors;
pub mod alerts;
pub mod channel;
pub mod config;
pub mod cron;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod monitors;
pub mod storage;
pub mod util;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A host that is probed for reachability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub name: String,
    pub sla_target: f64,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.host)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// The set of targets a recipient may see and receive alerts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    /// Target hosts or display names, in configured order without duplicates.
    Only(Vec<String>),
}

impl AccessScope {
    pub fn covers(&self, target: &Target) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Only(allowed) => {
                allowed.iter().any(|e| *e == target.host || *e == target.name)
            }
        }
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessScope::All => write!(f, "*"),
            AccessScope::Only(allowed) => {
                let entries = allowed.iter().map(String::as_str).collect::<Vec<_>>();
                write!(f, "{}", entries.join(", "))
            }
        }
    }
}

/// Schedule options for one report period (`daily`, `weekly`, `monthly`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub minute: u8,
    #[serde(default = "default_report_hour")]
    pub hour: u8,
    #[serde(default = "default_report_day")]
    pub dow: u8,
    #[serde(default = "default_report_day")]
    pub day: u8,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            minute: 0,
            hour: default_report_hour(),
            dow: default_report_day(),
            day: default_report_day(),
        }
    }
}

fn default_report_hour() -> u8 {
    9
}

fn default_report_day() -> u8 {
    1
}

/// A notification recipient from the static allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub id: String,
    pub role: Role,
    pub scope: AccessScope,
    pub timezone: String,
    pub reports: BTreeMap<String, ReportOptions>,
}

impl Recipient {
    pub fn can_access(&self, target: &Target) -> bool {
        self.scope.covers(target)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
