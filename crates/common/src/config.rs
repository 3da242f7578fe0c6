use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EscribaError, Result};

const DEFAULT_DB_URI: &str = ":memory:";
const DEFAULT_BROKER_ENDPOINT: &str = "tcp://127.0.0.1:5555";
const DEFAULT_LOG_LEVEL: &str = "info";

/// One entry of `ESCRIBA_SERVICES`: `name:concurrency:program_path`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub concurrency: u32,
    pub program_path: String,
}

impl ServiceConfig {
    fn parse(entry: &str) -> Result<Self> {
        let mut parts = entry.splitn(3, ':');
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EscribaError::Config(format!("missing service name in {entry:?}")))?;
        let concurrency = parts
            .next()
            .ok_or_else(|| EscribaError::Config(format!("missing concurrency in {entry:?}")))?
            .parse::<u32>()
            .map_err(|e| EscribaError::Config(format!("bad concurrency in {entry:?}: {e}")))?;
        let program_path = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EscribaError::Config(format!("missing program path in {entry:?}")))?;

        Ok(Self {
            name: name.to_string(),
            concurrency,
            program_path: program_path.to_string(),
        })
    }

    /// Parse the full `ESCRIBA_SERVICES` value (comma-separated entries).
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

/// Configuration shared by every process that talks to the store and the bus.
#[derive(Clone, Debug)]
pub struct EscribaConfig {
    /// `ESCRIBA_DB_URI` — sqlite connection string. Default `:memory:`.
    pub db_uri: String,
    /// `ESCRIBA_BROKER_ENDPOINT` — ZeroMQ endpoint the engine/agents connect to.
    pub broker_endpoint: String,
    /// `ESCRIBA_LOG_LEVEL` — passed through to the tracing env filter.
    pub log_level: String,
}

impl EscribaConfig {
    /// Load from the process environment, failing loudly on malformed values.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            db_uri: env::var("ESCRIBA_DB_URI").unwrap_or_else(|_| DEFAULT_DB_URI.to_string()),
            broker_endpoint: env::var("ESCRIBA_BROKER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_BROKER_ENDPOINT.to_string()),
            log_level: env::var("ESCRIBA_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

/// Configuration for the agent process (C10): broker endpoint plus the set of
/// services it fronts.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub broker_endpoint: String,
    pub log_level: String,
    pub services: Vec<ServiceConfig>,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let raw_services = env::var("ESCRIBA_SERVICES").map_err(|_| {
            EscribaError::Config("ESCRIBA_SERVICES is required for the agent process".into())
        })?;

        Ok(Self {
            broker_endpoint: env::var("ESCRIBA_BROKER_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_BROKER_ENDPOINT.to_string()),
            log_level: env::var("ESCRIBA_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string()),
            services: ServiceConfig::parse_list(&raw_services)?,
        })
    }
}

/// Poll-loop intervals, compiled-in defaults overridable only for tests.
#[derive(Clone, Copy, Debug)]
pub struct LoopIntervals {
    pub transfer_job: Duration,
    pub webpage_job: Duration,
    pub snapshot_dispatch: Duration,
    pub title_derivation: Duration,
    pub archive_derivation: Duration,
}

impl Default for LoopIntervals {
    fn default() -> Self {
        Self {
            transfer_job: Duration::from_secs(3),
            webpage_job: Duration::from_secs(3),
            snapshot_dispatch: Duration::from_secs(1),
            title_derivation: Duration::from_secs(5),
            archive_derivation: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_service_entry() {
        let parsed = ServiceConfig::parse_list("curl:4:/usr/bin/curl-helper").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "curl");
        assert_eq!(parsed[0].concurrency, 4);
        assert_eq!(parsed[0].program_path, "/usr/bin/curl-helper");
    }

    #[test]
    fn parses_multiple_entries_and_trims_whitespace() {
        let parsed =
            ServiceConfig::parse_list(" curl:4:/bin/curl , wget:2:/bin/wget-helper ").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].name, "wget");
        assert_eq!(parsed[1].concurrency, 2);
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(ServiceConfig::parse_list("curl:4").is_err());
        assert!(ServiceConfig::parse_list("curl:notanumber:/bin/curl").is_err());
    }
}
