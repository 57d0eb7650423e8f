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

use crate::feature::{FeatureId, Priority, MAX_FEATURES};
use crate::handover::ComponentId;
use thiserror::Error;

/// Misuse of the registry or arbitration operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BandwidthError {
    /// All `MAX_FEATURES` slots are already taken
    #[error("registry full ({max} features)", max = MAX_FEATURES)]
    CapacityExhausted,
    /// A non-`High` priority needs a throttle callback
    #[error("{0:?} priority feature registered without callback")]
    MissingCallback(Priority),
    /// The identifier was never registered
    #[error("{0:?} not registered")]
    NotRegistered(FeatureId),
    /// Start requested on a running feature
    #[error("{0:?} already running")]
    AlreadyRunning(FeatureId),
    /// Stop requested on a stopped feature
    #[error("{0:?} not running")]
    NotRunning(FeatureId),
    /// Priority change requested on a running feature
    #[error("{0:?} is running, priority cannot change")]
    RunningPriorityChange(FeatureId),
    /// The arbitration task has been dropped
    #[error("arbitration task stopped")]
    TaskStopped,
}

/// Failures of the handover protocol and of the snapshot codec
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandoverError {
    #[error("snapshot truncated")]
    Truncated,
    #[error("invalid feature identifier {0:#x}")]
    InvalidFeatureId(u8),
    #[error("invalid priority {0}")]
    InvalidPriority(u8),
    #[error("snapshot holds {0} features, capacity is {max}", max = MAX_FEATURES)]
    TooManyFeatures(usize),
    #[error("{0:?} vetoed the handover")]
    Vetoed(ComponentId),
    #[error("no component registered as {0:?}")]
    UnknownComponent(ComponentId),
    #[error("{0:?} registered twice")]
    DuplicateComponent(ComponentId),
}
