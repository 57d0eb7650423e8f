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

use crate::ScanKind;
use bt_bandwidth_manager::BandwidthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Selected index outside of the registered table
    #[error("no parameter set {index} for {kind:?} scan")]
    InvalidParameterSet { kind: ScanKind, index: usize },
    /// Scanning requested before a parameter table is registered, or empty table
    #[error("no scan parameters")]
    NoParameters,
    #[error("invalid scan parameter configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Bandwidth(#[from] BandwidthError),
}
