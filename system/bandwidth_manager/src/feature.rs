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

//! Feature identifiers, priorities and the per-feature state kept by the registry.

use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;
use std::sync::Arc;

/// Number of distinct feature identifiers, which is also the registry capacity.
pub const MAX_FEATURES: usize = 6;

/// Wire value reserved for "no feature". Never decoded into a [`FeatureId`].
pub const INVALID_FEATURE_ID: u8 = 0x0f;

/// Firmware features consuming Bluetooth radio bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum FeatureId {
    /// A2DP streaming in low-latency (gaming) mode
    A2dpLowLatency = 0,
    /// A2DP streaming with a high-bandwidth codec
    A2dpHighBandwidth = 1,
    /// eSCO voice link
    Esco = 2,
    /// BR/EDR page scan
    PageScan = 3,
    /// Voice assistant capture
    VoiceAssistant = 4,
    /// Device firmware upgrade transfer
    Dfu = 5,
}

impl FeatureId {
    /// All identifiers, in wire order.
    pub const ALL: [FeatureId; MAX_FEATURES] = [
        FeatureId::A2dpLowLatency,
        FeatureId::A2dpHighBandwidth,
        FeatureId::Esco,
        FeatureId::PageScan,
        FeatureId::VoiceAssistant,
        FeatureId::Dfu,
    ];

    /// Priority the firmware registers each feature with.
    pub fn default_priority(self) -> Priority {
        match self {
            FeatureId::A2dpLowLatency | FeatureId::A2dpHighBandwidth | FeatureId::Esco => {
                Priority::High
            }
            FeatureId::VoiceAssistant => Priority::Medium,
            FeatureId::PageScan | FeatureId::Dfu => Priority::Low,
        }
    }
}

/// Priority tier of a feature. Smaller ordinal means higher priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive,
)]
#[repr(u8)]
pub enum Priority {
    /// Never throttled
    High = 0,
    /// Throttled only by `High`
    Medium = 1,
    /// Throttled by anything above it
    Low = 2,
}

impl Priority {
    pub(crate) const COUNT: usize = 3;

    /// All tiers, best first.
    pub const ALL: [Priority; Priority::COUNT] = [Priority::High, Priority::Medium, Priority::Low];

    /// Wire value of the sentinel tier that is never assigned to a feature.
    pub const UNUSED: u8 = Priority::COUNT as u8;
}

/// Notification capability invoked with the new throttle requirement.
pub type ThrottleCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Arbitration state of a feature, as transferred on handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureBitfields {
    /// Stable key of the feature
    pub identifier: FeatureId,
    /// Priority tier
    pub priority: Priority,
    /// Set by feature start / stop
    pub running: bool,
    /// Set by the arbiter only
    pub throttle_required: bool,
}

impl FeatureBitfields {
    pub(crate) fn new(identifier: FeatureId, priority: Priority) -> Self {
        Self { identifier, priority, running: false, throttle_required: false }
    }
}

#[derive(Clone)]
pub(crate) struct Feature {
    pub(crate) bitfields: FeatureBitfields,
    pub(crate) callback: Option<ThrottleCallback>,
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("bitfields", &self.bitfields)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn priority_order() {
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert_eq!(Priority::from_u8(Priority::UNUSED), None);
    }

    #[test]
    fn invalid_identifier_is_not_a_feature() {
        assert_eq!(FeatureId::from_u8(INVALID_FEATURE_ID), None);
        for (i, id) in FeatureId::ALL.iter().enumerate() {
            assert_eq!(FeatureId::from_usize(i), Some(*id));
        }
    }
}
