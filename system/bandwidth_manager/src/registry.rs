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

use crate::error::BandwidthError;
use crate::feature::{
    Feature, FeatureBitfields, FeatureId, Priority, ThrottleCallback, MAX_FEATURES,
};

/// Fixed-capacity table of registered features.
///
/// Slots `[0, active)` hold exactly the running features and
/// `[active, registered)` the stopped ones. Every mutation keeps this packed
/// prefix, so a handover only needs to carry the first `active` slots.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: [Option<Feature>; MAX_FEATURES],
    registered: usize,
    active: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn registered_count(&self) -> usize {
        self.registered
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active
    }

    pub(crate) fn features(&self) -> impl Iterator<Item = &Feature> {
        self.slots[..self.registered].iter().flatten()
    }

    pub(crate) fn features_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.slots[..self.registered].iter_mut().flatten()
    }

    pub(crate) fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features().find(|f| f.bitfields.identifier == id)
    }

    fn position(&self, id: FeatureId) -> Option<usize> {
        self.features().position(|f| f.bitfields.identifier == id)
    }

    fn slot(&self, idx: usize) -> &Feature {
        self.slots[idx].as_ref().expect("registered slots are populated")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Feature {
        self.slots[idx].as_mut().expect("registered slots are populated")
    }

    /// Adds a feature, or replaces the priority and callback of an already
    /// registered one without moving it. The priority of a running feature
    /// is fixed until it stops.
    pub(crate) fn register(
        &mut self,
        id: FeatureId,
        priority: Priority,
        callback: Option<ThrottleCallback>,
    ) -> Result<(), BandwidthError> {
        if priority != Priority::High && callback.is_none() {
            return Err(BandwidthError::MissingCallback(priority));
        }

        if let Some(idx) = self.position(id) {
            let feature = self.slot_mut(idx);
            if feature.bitfields.running && feature.bitfields.priority != priority {
                return Err(BandwidthError::RunningPriorityChange(id));
            }
            feature.bitfields.priority = priority;
            feature.callback = callback;
            log::debug!("Registry: {:?} re-registered in slot {}", id, idx);
            return Ok(());
        }

        if self.registered >= MAX_FEATURES {
            return Err(BandwidthError::CapacityExhausted);
        }
        self.slots[self.registered] =
            Some(Feature { bitfields: FeatureBitfields::new(id, priority), callback });
        log::debug!("Registry: {:?} registered in slot {}", id, self.registered);
        self.registered += 1;
        Ok(())
    }

    /// Marks the feature running and moves it into the running prefix.
    /// Returns the priority it started at.
    pub(crate) fn start(&mut self, id: FeatureId) -> Result<Priority, BandwidthError> {
        let idx = self.position(id).ok_or(BandwidthError::NotRegistered(id))?;
        let bitfields = &mut self.slot_mut(idx).bitfields;
        if bitfields.running {
            return Err(BandwidthError::AlreadyRunning(id));
        }
        bitfields.running = true;
        bitfields.throttle_required = false;
        let priority = bitfields.priority;
        self.active += 1;
        self.arrange(idx);
        Ok(priority)
    }

    /// Marks the feature stopped and moves it out of the running prefix.
    /// Returns the priority it stopped at.
    pub(crate) fn stop(&mut self, id: FeatureId) -> Result<Priority, BandwidthError> {
        let idx = self.position(id).ok_or(BandwidthError::NotRegistered(id))?;
        let bitfields = &mut self.slot_mut(idx).bitfields;
        if !bitfields.running {
            return Err(BandwidthError::NotRunning(id));
        }
        bitfields.running = false;
        bitfields.throttle_required = false;
        let priority = bitfields.priority;
        self.active -= 1;
        self.arrange(idx);
        Ok(priority)
    }

    /// Restores the packed prefix after the running flag of slot `idx` changed.
    fn arrange(&mut self, idx: usize) -> usize {
        let arranged = if self.slot(idx).bitfields.running {
            // Swap into the first stopped slot if it comes earlier.
            match (0..self.registered).find(|&i| !self.slot(i).bitfields.running) {
                Some(first_stopped) if first_stopped < idx => {
                    self.slots.swap(first_stopped, idx);
                    first_stopped
                }
                _ => idx,
            }
        } else {
            // Shift the running slots that follow down by one, and place this
            // feature right after them.
            let running_after = self.slots[idx + 1..self.registered]
                .iter()
                .flatten()
                .take_while(|f| f.bitfields.running)
                .count();
            self.slots[idx..=idx + running_after].rotate_left(1);
            idx + running_after
        };
        log::debug!("Registry: slot {} arranged to {}", idx, arranged);
        arranged
    }

    /// Clears the running and throttle flags of every feature.
    pub(crate) fn reset(&mut self) {
        for feature in self.features_mut() {
            feature.bitfields.running = false;
            feature.bitfields.throttle_required = false;
        }
        self.active = 0;
    }

    /// Overwrites the state of a registered feature, keeping its callback.
    /// The active count is left to the caller, see [`Registry::set_active_count`].
    pub(crate) fn update(&mut self, bitfields: &FeatureBitfields) -> bool {
        let Some(idx) = self.position(bitfields.identifier) else {
            log::warn!("Registry: {:?} not registered locally", bitfields.identifier);
            return false;
        };
        self.slot_mut(idx).bitfields = *bitfields;
        self.arrange(idx);
        true
    }

    /// Only used when adopting a peer's state.
    pub(crate) fn set_active_count(&mut self, active: usize) {
        log::debug!("Registry: active features {} -> {}", self.active, active);
        self.active = active;
    }

    pub(crate) fn running_count(&self) -> usize {
        self.features().filter(|f| f.bitfields.running).count()
    }

    pub(crate) fn running_at_priority(&self) -> [usize; Priority::COUNT] {
        let mut running = [0; Priority::COUNT];
        for feature in self.features().filter(|f| f.bitfields.running) {
            running[feature.bitfields.priority as usize] += 1;
        }
        running
    }

    /// State of the running prefix.
    pub(crate) fn active_bitfields(&self) -> Vec<FeatureBitfields> {
        self.slots[..self.active].iter().flatten().map(|f| f.bitfields).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;

    pub(crate) fn assert_packed(registry: &Registry) {
        for (idx, feature) in registry.features().enumerate() {
            assert_eq!(
                feature.bitfields.running,
                idx < registry.active_count(),
                "slot {} breaks the running prefix: {:?}",
                idx,
                registry
            );
        }
        assert_eq!(registry.running_count(), registry.active_count());
    }

    fn noop() -> Option<ThrottleCallback> {
        Some(Arc::new(|_| {}))
    }

    fn registry_with_all() -> Registry {
        let mut registry = Registry::new();
        for id in FeatureId::ALL {
            registry.register(id, id.default_priority(), noop()).unwrap();
        }
        registry
    }

    fn order(registry: &Registry) -> Vec<FeatureId> {
        registry.features().map(|f| f.bitfields.identifier).collect()
    }

    #[test]
    fn callback_is_mandatory_below_high() {
        let mut registry = Registry::new();
        assert_eq!(registry.register(FeatureId::Esco, Priority::High, None), Ok(()));
        assert_eq!(
            registry.register(FeatureId::Dfu, Priority::Low, None),
            Err(BandwidthError::MissingCallback(Priority::Low))
        );
        assert_eq!(
            registry.register(FeatureId::VoiceAssistant, Priority::Medium, None),
            Err(BandwidthError::MissingCallback(Priority::Medium))
        );
        assert_eq!(registry.registered_count(), 1);
    }

    #[test]
    fn re_register_keeps_slot() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::Dfu).unwrap();
        let before = order(&registry);
        registry.register(FeatureId::Dfu, Priority::Low, noop()).unwrap();
        registry.register(FeatureId::PageScan, Priority::Medium, noop()).unwrap();

        let dfu = registry.get(FeatureId::Dfu).unwrap();
        assert!(dfu.bitfields.running);
        assert_eq!(registry.get(FeatureId::PageScan).unwrap().bitfields.priority, Priority::Medium);
        assert_eq!(registry.registered_count(), MAX_FEATURES);
        assert_eq!(order(&registry), before);
        assert_packed(&registry);
    }

    #[test]
    fn running_feature_keeps_priority() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::Dfu).unwrap();
        assert_eq!(
            registry.register(FeatureId::Dfu, Priority::Medium, noop()),
            Err(BandwidthError::RunningPriorityChange(FeatureId::Dfu))
        );
        assert_eq!(registry.get(FeatureId::Dfu).unwrap().bitfields.priority, Priority::Low);

        registry.stop(FeatureId::Dfu).unwrap();
        registry.register(FeatureId::Dfu, Priority::Medium, noop()).unwrap();
        assert_eq!(registry.get(FeatureId::Dfu).unwrap().bitfields.priority, Priority::Medium);
    }

    #[test]
    fn start_swaps_into_first_stopped_slot() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::Dfu).unwrap();
        assert_eq!(order(&registry)[0], FeatureId::Dfu);
        assert_eq!(order(&registry)[MAX_FEATURES - 1], FeatureId::A2dpLowLatency);

        registry.start(FeatureId::Esco).unwrap();
        assert_eq!(order(&registry)[..2], [FeatureId::Dfu, FeatureId::Esco]);
        assert_eq!(registry.active_count(), 2);
        assert_packed(&registry);
    }

    #[test]
    fn stop_moves_to_tail_of_running_prefix() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::A2dpLowLatency).unwrap();
        registry.start(FeatureId::A2dpHighBandwidth).unwrap();
        registry.start(FeatureId::Esco).unwrap();

        registry.stop(FeatureId::A2dpLowLatency).unwrap();
        assert_eq!(
            order(&registry)[..3],
            [FeatureId::A2dpHighBandwidth, FeatureId::Esco, FeatureId::A2dpLowLatency]
        );
        assert_eq!(registry.active_count(), 2);
        assert_packed(&registry);
    }

    #[test]
    fn start_stop_misuse() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.start(FeatureId::Esco),
            Err(BandwidthError::NotRegistered(FeatureId::Esco))
        );
        registry.register(FeatureId::Esco, Priority::High, None).unwrap();
        assert_eq!(registry.stop(FeatureId::Esco), Err(BandwidthError::NotRunning(FeatureId::Esco)));
        assert_eq!(registry.start(FeatureId::Esco), Ok(Priority::High));
        assert_eq!(
            registry.start(FeatureId::Esco),
            Err(BandwidthError::AlreadyRunning(FeatureId::Esco))
        );
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn update_rebuilds_prefix() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::Esco).unwrap();
        registry.reset();
        assert_eq!(registry.active_count(), 0);

        let mut voice = FeatureBitfields::new(FeatureId::VoiceAssistant, Priority::Medium);
        voice.running = true;
        let mut dfu = FeatureBitfields::new(FeatureId::Dfu, Priority::Low);
        dfu.running = true;
        dfu.throttle_required = true;
        assert!(registry.update(&voice));
        assert!(registry.update(&dfu));
        registry.set_active_count(2);

        assert_eq!(registry.active_bitfields(), vec![voice, dfu]);
        assert_packed(&registry);
    }

    #[test]
    fn running_at_priority_counts() {
        let mut registry = registry_with_all();
        registry.start(FeatureId::Esco).unwrap();
        registry.start(FeatureId::Dfu).unwrap();
        registry.start(FeatureId::PageScan).unwrap();
        assert_eq!(registry.running_at_priority(), [1, 0, 2]);
    }
}
