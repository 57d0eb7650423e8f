// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scan parameter tables, as configured by the application.
//!
//! A table holds several parameter sets (for instance one per product state),
//! only one of them being selected at a time. Each set gives the interval and
//! window to use for every scan type. Tables can be loaded from JSON:
//!
//! ```json
//! { "sets": [ { "fast": { "interval": 512, "window": 18 },
//!               "slow": { "interval": 2048, "window": 18 } } ] }
//! ```

use crate::error::ScanError;
use serde::{Deserialize, Serialize};

/// Scan activity requested by a client. When clients disagree, the greatest
/// requested type is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Client registered, not requesting any scan
    None,
    Fast,
    Slow,
    /// Reduced activity, substituted while the page scan bandwidth is throttled
    Throttle,
}

/// Interval and window of a scan, in baseband slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanParameters {
    pub interval: u16,
    pub window: u16,
}

impl ScanParameters {
    /// Zero interval or window means the scan type is not configured.
    pub fn is_valid(&self) -> bool {
        self.interval != 0 && self.window != 0
    }
}

/// Parameters of each scan type. Missing types are left zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParameterSet {
    pub fast: ScanParameters,
    pub slow: ScanParameters,
    pub throttle: ScanParameters,
}

impl ScanParameterSet {
    /// Configured parameters of `scan_type`, if any.
    pub fn get(&self, scan_type: ScanType) -> Option<ScanParameters> {
        let params = match scan_type {
            ScanType::None => return None,
            ScanType::Fast => self.fast,
            ScanType::Slow => self.slow,
            ScanType::Throttle => self.throttle,
        };
        Some(params).filter(ScanParameters::is_valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanParameterTable {
    pub sets: Vec<ScanParameterSet>,
}

impl ScanParameterTable {
    /// Parse a table, rejecting one without any parameter set.
    pub fn from_json(json: &str) -> Result<Self, ScanError> {
        let table: Self = serde_json::from_str(json)?;
        if table.sets.is_empty() {
            return Err(ScanError::NoParameters);
        }
        Ok(table)
    }
}
