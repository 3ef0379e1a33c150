//! Operation categories providers can fulfil

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of financial operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fiat to crypto
    OnRamp,
    /// Crypto to fiat
    OffRamp,
    /// Payout to a beneficiary
    Payout,
    /// Virtual IBAN issuance
    IbanIssuance,
    /// Card issuance
    CardIssuance,
}

impl Capability {
    /// All capabilities
    pub const ALL: [Capability; 5] = [
        Capability::OnRamp,
        Capability::OffRamp,
        Capability::Payout,
        Capability::IbanIssuance,
        Capability::CardIssuance,
    ];

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnRamp => "on_ramp",
            Self::OffRamp => "off_ramp",
            Self::Payout => "payout",
            Self::IbanIssuance => "iban_issuance",
            Self::CardIssuance => "card_issuance",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "on_ramp" | "onramp" => Ok(Self::OnRamp),
            "off_ramp" | "offramp" => Ok(Self::OffRamp),
            "payout" | "payouts" => Ok(Self::Payout),
            "iban_issuance" | "iban" => Ok(Self::IbanIssuance),
            "card_issuance" | "card" | "cards" => Ok(Self::CardIssuance),
            _ => Err(format!("unknown capability: {}", s)),
        }
    }
}
