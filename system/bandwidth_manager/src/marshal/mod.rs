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

//! Wire format of the registry state carried across a handover.
//!
//! Only the running prefix of the registry is sent: a count byte, followed by
//! one byte per feature packing, from the least significant bit, the
//! identifier (4 bits), the priority (2 bits), the running and the throttle
//! required flags.

mod reader;
mod writer;

use crate::error::HandoverError;
use crate::feature::{FeatureBitfields, FeatureId, Priority, MAX_FEATURES};
use num_traits::{FromPrimitive, ToPrimitive};
use reader::{unpack, Read, Reader};
use writer::{pack, Write, Writer};

/// Running features of a registry, as handed over to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// First `active_count` slots of the registry
    pub features: Vec<FeatureBitfields>,
}

impl RegistrySnapshot {
    /// Number of running features transferred.
    pub fn active_count(&self) -> usize {
        self.features.len()
    }

    /// Output the snapshot
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new(Vec::with_capacity(1 + self.features.len()));
        w.write(self.features.as_slice());
        w.into_vec()
    }

    /// Read a snapshot, rejecting out of range identifiers or priorities
    pub fn from_bytes(data: &[u8]) -> Result<Self, HandoverError> {
        let mut r = Reader::new(data);
        let count = r.read_u8()? as usize;
        if count > MAX_FEATURES {
            return Err(HandoverError::TooManyFeatures(count));
        }
        let features = (0..count).map(|_| r.read()).collect::<Result<Vec<_>, _>>()?;
        if r.remaining() > 0 {
            log::warn!("RegistrySnapshot: ignoring {} trailing bytes", r.remaining());
        }
        Ok(Self { features })
    }
}

impl Write for FeatureBitfields {
    fn write(&self, w: &mut Writer) {
        let identifier = self.identifier.to_u8().unwrap();
        let priority = self.priority.to_u8().unwrap();
        let running = u8::from(self.running);
        let throttle_required = u8::from(self.throttle_required);
        w.write_u8(pack!((identifier, 4), (priority, 2), (running, 1), (throttle_required, 1)));
    }
}

impl Read for FeatureBitfields {
    fn read(r: &mut Reader) -> Result<Self, HandoverError> {
        let (identifier, priority, running, throttle_required) =
            unpack!(r.read_u8()?, (4, 2, 1, 1));
        Ok(Self {
            identifier: FeatureId::from_u8(identifier)
                .ok_or(HandoverError::InvalidFeatureId(identifier))?,
            priority: Priority::from_u8(priority).ok_or(HandoverError::InvalidPriority(priority))?,
            running: running != 0,
            throttle_required: throttle_required != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::INVALID_FEATURE_ID;

    fn bitfields(identifier: FeatureId, priority: Priority, throttle_required: bool) -> FeatureBitfields {
        FeatureBitfields { identifier, priority, running: true, throttle_required }
    }

    #[test]
    fn layout() {
        let snapshot = RegistrySnapshot {
            features: vec![
                bitfields(FeatureId::Esco, Priority::High, false),
                bitfields(FeatureId::Dfu, Priority::Low, true),
            ],
        };
        assert_eq!(snapshot.to_bytes(), vec![2, 0x42, 0xe5]);
        assert_eq!(RegistrySnapshot::from_bytes(&[2, 0x42, 0xe5]), Ok(snapshot));
    }

    #[test]
    fn empty() {
        let snapshot = RegistrySnapshot::from_bytes(&[0]).unwrap();
        assert_eq!(snapshot.active_count(), 0);
        assert_eq!(RegistrySnapshot::from_bytes(&[]), Err(HandoverError::Truncated));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(RegistrySnapshot::from_bytes(&[2, 0x42]), Err(HandoverError::Truncated));
        assert_eq!(
            RegistrySnapshot::from_bytes(&[1, 0x40 | INVALID_FEATURE_ID]),
            Err(HandoverError::InvalidFeatureId(INVALID_FEATURE_ID))
        );
        assert_eq!(
            RegistrySnapshot::from_bytes(&[1, 0x72]),
            Err(HandoverError::InvalidPriority(Priority::UNUSED))
        );
        assert_eq!(
            RegistrySnapshot::from_bytes(&[7, 0, 0, 0, 0, 0, 0, 0]),
            Err(HandoverError::TooManyFeatures(7))
        );
    }
}
