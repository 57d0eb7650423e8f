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

use crate::params::ScanParameters;
use crate::ScanKind;

/// Controller commands issued by the scan manager.
///
/// Every `write_scan_enable` is expected to be confirmed, asynchronously, by a
/// call to `BredrScanManager::on_scan_enable_confirmed`.
pub trait ScanDriver: Send + Sync {
    /// Write Scan Enable, with the combined goal of page and inquiry scan.
    fn write_scan_enable(&self, page: bool, inquiry: bool);

    /// Write Page / Inquiry Scan Activity.
    fn write_scan_activity(&self, kind: ScanKind, params: ScanParameters);
}
