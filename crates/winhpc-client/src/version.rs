//! Web API protocol revisions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HpcClientError;

/// Protocol revision sent in the `api-version` header.
///
/// Variants are declared oldest first so that `Ord` follows release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    /// HPC Pack 2008 R2 SP3
    #[serde(rename = "2011-11-01")]
    HpcPack2008R2Sp3,
    /// HPC Pack 2008 R2 SP4
    #[serde(rename = "2012-03-31.3.4")]
    HpcPack2008R2Sp4,
    /// HPC Pack 2012
    #[serde(rename = "2012-11-01.4.0")]
    HpcPack2012,
}

impl ApiVersion {
    pub const ALL: [ApiVersion; 3] = [
        ApiVersion::HpcPack2008R2Sp3,
        ApiVersion::HpcPack2008R2Sp4,
        ApiVersion::HpcPack2012,
    ];

    /// Header value for this revision
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HpcPack2008R2Sp3 => "2011-11-01",
            Self::HpcPack2008R2Sp4 => "2012-03-31.3.4",
            Self::HpcPack2012 => "2012-11-01.4.0",
        }
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::HpcPack2008R2Sp3
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiVersion {
    type Err = HpcClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| {
                HpcClientError::Configuration(format!(
                    "Unknown api-version '{}' (expected one of 2011-11-01, 2012-03-31.3.4, 2012-11-01.4.0)",
                    s
                ))
            })
    }
}
