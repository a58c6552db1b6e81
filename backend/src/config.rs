use std::collections::HashMap;
use std::env;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub engine: EngineConfig,
    pub jobs: JobConfig,
    pub roles: RoleRoster,
}

/// Workflow engine policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Unknown workflow type names resolve to the standard template instead of failing
    pub fallback_to_standard: bool,
    pub approval_timeout_minutes: u32,
    pub manual_timeout_minutes: u32,
    /// Reservations with at least this many rooms are handled as group bookings
    pub group_room_threshold: u32,
    pub high_value_amount: Decimal,
    pub urgent_value_amount: Decimal,
    /// Recipient of escalations for roles without an explicit contact
    pub default_escalation_role: String,
    pub escalation_contacts: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_to_standard: false,
            approval_timeout_minutes: 120,
            manual_timeout_minutes: 60,
            group_room_threshold: 5,
            high_value_amount: Decimal::from(5_000),
            urgent_value_amount: Decimal::from(20_000),
            default_escalation_role: "duty_manager".to_string(),
            escalation_contacts: HashMap::from([
                ("finance".to_string(), "finance_manager".to_string()),
                ("front_office_manager".to_string(), "general_manager".to_string()),
                ("front_desk".to_string(), "front_office_manager".to_string()),
                ("sales".to_string(), "sales_manager".to_string()),
            ]),
        }
    }
}

impl EngineConfig {
    pub fn escalation_contact(&self, role: Option<&str>) -> String {
        role.and_then(|r| self.escalation_contacts.get(r))
            .cloned()
            .unwrap_or_else(|| self.default_escalation_role.clone())
    }
}

/// Background job cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub timeout_check_interval_minutes: u32,
    /// Lead time for the one-shot "approaching timeout" warning
    pub timeout_warning_lead_minutes: u32,
    pub history_retention_days: u32,
    pub history_cleanup_interval_hours: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            timeout_check_interval_minutes: 1,
            timeout_warning_lead_minutes: 15,
            history_retention_days: 90,
            history_cleanup_interval_hours: 24,
        }
    }
}

/// Static staff roster keyed by role tag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRoster {
    pub members: HashMap<String, Vec<String>>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine_defaults = EngineConfig::default();
        let job_defaults = JobConfig::default();

        let mut escalation_contacts = engine_defaults.escalation_contacts.clone();
        if let Some(raw) = lookup("ESCALATION_CONTACTS") {
            escalation_contacts.extend(parse_pairs(&raw, ',')?);
        }

        let engine = EngineConfig {
            fallback_to_standard: parse_or(&lookup, "WORKFLOW_FALLBACK_TO_STANDARD", false),
            approval_timeout_minutes: parse_or(
                &lookup,
                "APPROVAL_TIMEOUT_MINUTES",
                engine_defaults.approval_timeout_minutes,
            ),
            manual_timeout_minutes: parse_or(
                &lookup,
                "MANUAL_TIMEOUT_MINUTES",
                engine_defaults.manual_timeout_minutes,
            ),
            group_room_threshold: parse_or(
                &lookup,
                "GROUP_ROOM_THRESHOLD",
                engine_defaults.group_room_threshold,
            ),
            high_value_amount: parse_or(
                &lookup,
                "HIGH_VALUE_AMOUNT",
                engine_defaults.high_value_amount,
            ),
            urgent_value_amount: parse_or(
                &lookup,
                "URGENT_VALUE_AMOUNT",
                engine_defaults.urgent_value_amount,
            ),
            default_escalation_role: lookup("DEFAULT_ESCALATION_ROLE")
                .unwrap_or(engine_defaults.default_escalation_role),
            escalation_contacts,
        };

        if engine.high_value_amount > engine.urgent_value_amount {
            anyhow::bail!(
                "HIGH_VALUE_AMOUNT ({}) must not exceed URGENT_VALUE_AMOUNT ({})",
                engine.high_value_amount,
                engine.urgent_value_amount
            );
        }

        let jobs = JobConfig {
            timeout_check_interval_minutes: parse_or(
                &lookup,
                "TIMEOUT_CHECK_INTERVAL_MINUTES",
                job_defaults.timeout_check_interval_minutes,
            )
            .max(1),
            timeout_warning_lead_minutes: parse_or(
                &lookup,
                "TIMEOUT_WARNING_LEAD_MINUTES",
                job_defaults.timeout_warning_lead_minutes,
            ),
            history_retention_days: parse_or(
                &lookup,
                "HISTORY_RETENTION_DAYS",
                job_defaults.history_retention_days,
            ),
            history_cleanup_interval_hours: parse_or(
                &lookup,
                "HISTORY_CLEANUP_INTERVAL_HOURS",
                job_defaults.history_cleanup_interval_hours,
            )
            .max(1),
        };

        let roles = match lookup("ROLE_ROSTER") {
            Some(raw) => RoleRoster::parse(&raw)?,
            None => RoleRoster::default(),
        };

        Ok(Config {
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            engine,
            jobs,
            roles,
        })
    }
}

impl RoleRoster {
    /// Parse `role=staff1,staff2;role2=staff3`
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut members: HashMap<String, Vec<String>> = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (role, staff) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("invalid ROLE_ROSTER entry '{}'", entry))?;
            let staff = staff
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            members.entry(role.trim().to_string()).or_default().extend(staff);
        }
        Ok(Self { members })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_pairs(raw: &str, separator: char) -> anyhow::Result<HashMap<String, String>> {
    raw.split(separator)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow::anyhow!("invalid key=value pair '{}'", entry))
        })
        .collect()
}
