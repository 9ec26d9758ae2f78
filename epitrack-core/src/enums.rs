//! Dataset discriminators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EpiError;

/// Which cumulative dataset a query or build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Confirmed,
    Deaths,
    Recovered,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Confirmed, DataType::Deaths, DataType::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Confirmed => "confirmed",
            DataType::Deaths => "deaths",
            DataType::Recovered => "recovered",
        }
    }

    /// Whether upstream publishes a US county-level source for this dataset.
    pub fn has_us_source(&self) -> bool {
        !matches!(self, DataType::Recovered)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = EpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmed" => Ok(DataType::Confirmed),
            "deaths" => Ok(DataType::Deaths),
            "recovered" => Ok(DataType::Recovered),
            _ => Err(EpiError::InvalidDataType {
                value: s.to_string(),
            }),
        }
    }
}
