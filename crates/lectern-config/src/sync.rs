//! Permission propagation failure handling.
//!
//! - `PERMISSION_SYNC_POLICY`: `lenient` (default) or `strict`
//!
//! Under `lenient`, a failed propagation is logged and counted, its partial
//! staff writes are rolled back, and the structural change still commits.
//! Under `strict`, the failure aborts the whole transaction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    #[default]
    Lenient,
    Strict,
}

impl SyncPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPolicy::Lenient => "lenient",
            SyncPolicy::Strict => "strict",
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(SyncPolicy::Lenient),
            "strict" => Ok(SyncPolicy::Strict),
            _ => Err(ConfigError::Invalid {
                var: "PERMISSION_SYNC_POLICY",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncConfig {
    pub policy: SyncPolicy,
}

impl SyncConfig {
    pub fn strict() -> Self {
        Self {
            policy: SyncPolicy::Strict,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self {
            policy: std::env::var("PERMISSION_SYNC_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.policy == SyncPolicy::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_lenient() {
        assert_eq!(SyncConfig::default().policy, SyncPolicy::Lenient);
        assert!(!SyncConfig::default().is_strict());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("strict".parse::<SyncPolicy>(), Ok(SyncPolicy::Strict));
        assert_eq!(" Lenient ".parse::<SyncPolicy>(), Ok(SyncPolicy::Lenient));
        assert!(matches!(
            "panic".parse::<SyncPolicy>(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_policy_display_round_trips() {
        for policy in [SyncPolicy::Lenient, SyncPolicy::Strict] {
            assert_eq!(policy.to_string().parse::<SyncPolicy>(), Ok(policy));
        }
    }
}
