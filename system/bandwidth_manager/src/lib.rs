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

//! Bluetooth bandwidth manager
//!
//! Features sharing the radio (A2DP, eSCO, page scan, voice assistant, DFU...)
//! tell the manager when they start and stop using bandwidth. The manager
//! keeps only the best running priority tier unthrottled, and asks every
//! running feature of a worse tier to reduce its bandwidth usage:
//!
//! ```text
//!     feature_start /           ____________              ______________
//!     feature_stop             |  registry  |   Action   |  arbitration |
//!     -----------------------> |            | ---------> |     task     |
//!                              |____________|  (queued)  |______________|
//!                                 ^      |                      |
//!           handover: unmarshal   |      | marshal              | throttle
//!           (secondary)           |      v (primary)            v callbacks
//!                              ______________                features
//!                             |     peer     |
//!                             |______________|
//! ```
//!
//! The registry keeps the running features packed at the front of its table,
//! so that only those need to be transferred on a handover.

mod arbiter;
mod error;
mod feature;
mod handover;
mod manager;
mod marshal;
mod registry;
pub mod utils;


pub use error::{BandwidthError, HandoverError};
pub use feature::{
    FeatureBitfields, FeatureId, Priority, ThrottleCallback, INVALID_FEATURE_ID, MAX_FEATURES,
};
pub use handover::{ComponentId, HandoverDispatcher, HandoverInterface};
pub use manager::{ArbitrationTask, BandwidthManager};
pub use marshal::RegistrySnapshot;
