//! Combining algorithm identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vigil_core::ConfigError;

/// The rule used to reduce several policy decisions to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CombiningAlgorithm {
    DenyOverrides,
    PermitOverrides,
    OnlyOneApplicable,
    #[default]
    FirstApplicable,
    DenyUnlessPermit,
    PermitUnlessDeny,
}

impl CombiningAlgorithm {
    pub const ALL: [CombiningAlgorithm; 6] = [
        CombiningAlgorithm::DenyOverrides,
        CombiningAlgorithm::PermitOverrides,
        CombiningAlgorithm::OnlyOneApplicable,
        CombiningAlgorithm::FirstApplicable,
        CombiningAlgorithm::DenyUnlessPermit,
        CombiningAlgorithm::PermitUnlessDeny,
    ];

    /// The configuration identifier of this algorithm.
    pub fn identifier(&self) -> &'static str {
        match self {
            CombiningAlgorithm::DenyOverrides => "deny-overrides",
            CombiningAlgorithm::PermitOverrides => "permit-overrides",
            CombiningAlgorithm::OnlyOneApplicable => "only-one-applicable",
            CombiningAlgorithm::FirstApplicable => "first-applicable",
            CombiningAlgorithm::DenyUnlessPermit => "deny-unless-permit",
            CombiningAlgorithm::PermitUnlessDeny => "permit-unless-deny",
        }
    }

    /// Resolve an identifier, falling back to first-applicable for unknown
    /// identifiers.
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.parse() {
            Ok(algorithm) => algorithm,
            Err(err) => {
                tracing::warn!("{}, using first-applicable", err);
                CombiningAlgorithm::FirstApplicable
            }
        }
    }
}

impl FromStr for CombiningAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        CombiningAlgorithm::ALL
            .into_iter()
            .find(|a| a.identifier() == normalized)
            .ok_or_else(|| ConfigError::UnknownAlgorithm(s.to_string()))
    }
}

impl From<String> for CombiningAlgorithm {
    fn from(identifier: String) -> Self {
        CombiningAlgorithm::from_identifier(&identifier)
    }
}

impl From<CombiningAlgorithm> for String {
    fn from(algorithm: CombiningAlgorithm) -> Self {
        algorithm.identifier().to_string()
    }
}

impl fmt::Display for CombiningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_round_trip() {
        for algorithm in CombiningAlgorithm::ALL {
            assert_eq!(algorithm.identifier().parse::<CombiningAlgorithm>(), Ok(algorithm));
        }
        assert_eq!(
            "DENY_OVERRIDES".parse::<CombiningAlgorithm>(),
            Ok(CombiningAlgorithm::DenyOverrides)
        );
    }

    #[test]
    fn test_unknown_identifier_defaults_to_first_applicable() {
        assert!("most-specific".parse::<CombiningAlgorithm>().is_err());
        assert_eq!(
            CombiningAlgorithm::from_identifier("most-specific"),
            CombiningAlgorithm::FirstApplicable
        );

        let parsed: CombiningAlgorithm = serde_json::from_str("\"bogus\"").unwrap();
        assert_eq!(parsed, CombiningAlgorithm::FirstApplicable);
        assert_eq!(
            serde_json::to_string(&CombiningAlgorithm::PermitUnlessDeny).unwrap(),
            "\"permit-unless-deny\""
        );
    }
}
