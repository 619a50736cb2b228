use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cli::Args;
use crate::error::TraceError;

/// Destination port unlikely to have a listener
pub const DEFAULT_PORT: u16 = 32456;
/// Default maximum TTL
pub const DEFAULT_MAX_TTL: u8 = 64;
/// Default probe payload size in bytes
pub const DEFAULT_PAYLOAD_SIZE: usize = 40;
/// Default attempts per TTL
pub const DEFAULT_RETRIES: u8 = 3;
/// Default per-attempt wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Longest per-attempt wait accepted
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum TTL
    pub max_ttl: u8,
    /// Destination UDP port for probes
    pub port: u16,
    /// Filler bytes per probe datagram
    pub payload_size: usize,
    /// Attempts per TTL
    pub retries: u8,
    /// Per-attempt receive wait
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            port: DEFAULT_PORT,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    /// Reject values the prober cannot run with
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.max_ttl == 0 {
            return Err(TraceError::InvalidConfig("max TTL must be at least 1".into()));
        }
        if self.retries == 0 {
            return Err(TraceError::InvalidConfig("at least one attempt per TTL is required".into()));
        }
        if self.timeout.is_zero() {
            return Err(TraceError::InvalidConfig("timeout must be positive".into()));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(TraceError::InvalidConfig(format!(
                "timeout cannot exceed {} seconds",
                MAX_TIMEOUT.as_secs()
            )));
        }
        Ok(())
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            max_ttl: args.max_ttl,
            port: args.port,
            payload_size: args.packet_size,
            retries: args.queries,
            timeout: args.timeout_duration(),
        }
    }
}

/// Serde helper for Duration
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
