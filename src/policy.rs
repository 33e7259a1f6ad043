//! What to do when the store cannot produce a decision.
//!
//! Strategies never guess an outcome on a store fault. The HTTP layer asks a
//! `FailurePolicy` instead.
//!
//! # Example
//!
//! ```ignore
//! use ipgate::policy::{FailurePolicy, FailureAction};
//!
//! let policy: FailurePolicy = "open".parse()?;
//! assert_eq!(policy.action(), FailureAction::Admit);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Handling of store faults at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Answer with a server error (503).
    #[default]
    Error,
    /// Fail open: let the request through.
    Open,
    /// Fail closed: treat the request as over the limit (429).
    Closed,
}

/// Outcome of applying a [`FailurePolicy`] to a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Serve the request as if it had been admitted.
    Admit,
    /// Reject as rate limited.
    Reject,
    /// Reject as a server-side failure.
    Fail,
}

impl FailurePolicy {
    /// The action taken for a store fault.
    pub fn action(&self) -> FailureAction {
        match self {
            Self::Error => FailureAction::Fail,
            Self::Open => FailureAction::Admit,
            Self::Closed => FailureAction::Reject,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" | "fail" => Ok(Self::Error),
            "open" | "fail-open" | "allow" => Ok(Self::Open),
            "closed" | "fail-closed" | "deny" => Ok(Self::Closed),
            other => Err(ConfigError::InvalidPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_error() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Error);
        assert_eq!(FailurePolicy::default().action(), FailureAction::Fail);
    }

    #[test]
    fn test_actions() {
        assert_eq!(FailurePolicy::Open.action(), FailureAction::Admit);
        assert_eq!(FailurePolicy::Closed.action(), FailureAction::Reject);
    }

    #[test]
    fn test_parse() {
        assert_eq!("open".parse::<FailurePolicy>().unwrap(), FailurePolicy::Open);
        assert_eq!(" Fail-Closed ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Closed);
        assert!(matches!(
            "sometimes".parse::<FailurePolicy>(),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_display_parses_back() {
        for policy in [FailurePolicy::Error, FailurePolicy::Open, FailurePolicy::Closed] {
            assert_eq!(policy.to_string().parse::<FailurePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&FailurePolicy::Closed).unwrap(), "\"closed\"");
    }
}
