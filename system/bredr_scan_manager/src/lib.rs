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

//! BR/EDR scan manager
//!
//! Arbitrates the page and inquiry scan requests of several clients, drives
//! the controller scan enable and scan activity, and reacts to the bandwidth
//! manager throttling page scan.

mod clients;
mod driver;
mod error;
mod instance;
mod manager;
mod params;


pub use clients::{ClientId, ScanClient, ScanIndication};
pub use driver::ScanDriver;
pub use error::ScanError;
pub use instance::ScanState;
pub use manager::BredrScanManager;
pub use params::{ScanParameterSet, ScanParameterTable, ScanParameters, ScanType};

/// Kind of BR/EDR scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Page,
    Inquiry,
}
