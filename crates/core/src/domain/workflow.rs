use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StepError;

/// One of the workflow verticals, listed in the order the orchestrator admits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Connection,
    SolarRetail,
    SolarService,
    Subsidy,
}

impl Domain {
    pub const ALL: [Domain; 4] =
        [Domain::Connection, Domain::SolarRetail, Domain::SolarService, Domain::Subsidy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::SolarRetail => "solar_retail",
            Self::SolarService => "solar_service",
            Self::Subsidy => "subsidy",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Connection => 0,
            Self::SolarRetail => 1,
            Self::SolarService => 2,
            Self::Subsidy => 3,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Connection => "User Onboarding",
            Self::SolarRetail => "Solar Retail",
            Self::SolarService => "Solar Service",
            Self::Subsidy => "Subsidy Subscription",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = StepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "connection" => Ok(Self::Connection),
            "solar_retail" | "retail" => Ok(Self::SolarRetail),
            "solar_service" | "service" => Ok(Self::SolarService),
            "subsidy" => Ok(Self::Subsidy),
            _ => Err(StepError::UnknownDomain(value.to_string())),
        }
    }
}
