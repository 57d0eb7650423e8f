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

use crate::feature::{FeatureId, Priority, ThrottleCallback};
use crate::registry::Registry;

/// Arbitration event, queued by feature start / stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Start { id: FeatureId, priority: Priority },
    Stop { id: FeatureId, priority: Priority },
}

/// Callback to invoke once the registry is released.
pub(crate) struct Notification {
    pub(crate) id: FeatureId,
    pub(crate) callback: ThrottleCallback,
    pub(crate) throttle_required: bool,
}

impl Notification {
    pub(crate) fn deliver(self) {
        log::debug!("Arbiter: notify {:?} throttle_required={}", self.id, self.throttle_required);
        (self.callback)(self.throttle_required);
    }
}

/// Best tier with a running feature, `default` when none is better.
fn highest_running_priority(running: &[usize; Priority::COUNT], default: Priority) -> Priority {
    Priority::ALL
        .into_iter()
        .find(|&priority| running[priority as usize] > 0 && priority < default)
        .unwrap_or(default)
}

/// Recomputes throttling after `action`, and returns the notifications
/// for every running feature whose throttle requirement changed.
pub(crate) fn arbitrate(registry: &mut Registry, action: Action) -> Vec<Notification> {
    let running = registry.running_at_priority();
    let total_running: usize = running.iter().sum();
    log::debug!("Arbiter: {:?}, running by priority {:?}", action, running);

    match action {
        Action::Start { priority, .. } => {
            if total_running <= 1 {
                log::debug!("Arbiter: only one feature running");
                return vec![];
            }
            let best = match priority {
                Priority::High => Priority::High,
                _ => highest_running_priority(&running, priority),
            };
            throttle_below(registry, best)
        }
        Action::Stop { priority, .. } => {
            if total_running == 0 {
                log::debug!("Arbiter: last feature stopped");
                return vec![];
            }
            let best = highest_running_priority(&running, Priority::Low);
            if best > priority {
                unthrottle_at(registry, best)
            } else {
                vec![]
            }
        }
    }
}

fn throttle_below(registry: &mut Registry, best: Priority) -> Vec<Notification> {
    set_throttle(registry, |p| p > best, true)
}

fn unthrottle_at(registry: &mut Registry, tier: Priority) -> Vec<Notification> {
    set_throttle(registry, |p| p == tier, false)
}

fn set_throttle(
    registry: &mut Registry,
    selected: impl Fn(Priority) -> bool,
    throttle_required: bool,
) -> Vec<Notification> {
    let mut notifications = vec![];
    for feature in registry.features_mut() {
        let bitfields = &mut feature.bitfields;
        if !bitfields.running || !selected(bitfields.priority) {
            continue;
        }
        if bitfields.throttle_required == throttle_required {
            log::debug!(
                "Arbiter: {:?} at {:?} already has throttle_required={}",
                bitfields.identifier,
                bitfields.priority,
                throttle_required
            );
            continue;
        }
        bitfields.throttle_required = throttle_required;
        match &feature.callback {
            Some(callback) => notifications.push(Notification {
                id: bitfields.identifier,
                callback: callback.clone(),
                throttle_required,
            }),
            None => log::warn!("Arbiter: {:?} has no callback", bitfields.identifier),
        }
    }
    notifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::assert_packed;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(FeatureId, bool)>>>;

    fn recorder(log: &Log, id: FeatureId) -> Option<ThrottleCallback> {
        let log = log.clone();
        Some(Arc::new(move |throttle| log.lock().unwrap().push((id, throttle))))
    }

    fn start(registry: &mut Registry, id: FeatureId) {
        let priority = registry.start(id).unwrap();
        for n in arbitrate(registry, Action::Start { id, priority }) {
            n.deliver();
        }
    }

    fn stop(registry: &mut Registry, id: FeatureId) {
        let priority = registry.stop(id).unwrap();
        for n in arbitrate(registry, Action::Stop { id, priority }) {
            n.deliver();
        }
    }

    fn throttled(registry: &Registry, id: FeatureId) -> bool {
        registry.get(id).unwrap().bitfields.throttle_required
    }

    fn setup(log: &Log) -> Registry {
        let mut registry = Registry::new();
        for id in FeatureId::ALL {
            let priority = id.default_priority();
            let callback = if priority == Priority::High { None } else { recorder(log, id) };
            registry.register(id, priority, callback).unwrap();
        }
        registry
    }

    #[test]
    fn highest_running() {
        assert_eq!(highest_running_priority(&[0, 1, 1], Priority::Low), Priority::Medium);
        assert_eq!(highest_running_priority(&[0, 0, 0], Priority::Low), Priority::Low);
        assert_eq!(highest_running_priority(&[0, 0, 2], Priority::Medium), Priority::Medium);
        assert_eq!(highest_running_priority(&[1, 0, 0], Priority::Medium), Priority::High);
    }

    #[test]
    fn single_feature_is_not_throttled() {
        let log = Log::default();
        let mut registry = setup(&log);
        start(&mut registry, FeatureId::Dfu);
        assert!(log.lock().unwrap().is_empty());
        assert!(!throttled(&registry, FeatureId::Dfu));
    }

    #[test]
    fn low_feature_starting_under_medium_is_throttled() {
        let log = Log::default();
        let mut registry = setup(&log);
        start(&mut registry, FeatureId::VoiceAssistant);
        start(&mut registry, FeatureId::Dfu);
        assert_eq!(*log.lock().unwrap(), vec![(FeatureId::Dfu, true)]);
        assert!(!throttled(&registry, FeatureId::VoiceAssistant));
        assert_packed(&registry);
    }

    #[test]
    fn high_stop_only_unthrottles_next_tier() {
        let log = Log::default();
        let mut registry = setup(&log);
        start(&mut registry, FeatureId::PageScan);
        start(&mut registry, FeatureId::VoiceAssistant);
        start(&mut registry, FeatureId::Esco);
        assert!(throttled(&registry, FeatureId::PageScan));
        assert!(throttled(&registry, FeatureId::VoiceAssistant));

        log.lock().unwrap().clear();
        stop(&mut registry, FeatureId::Esco);
        assert_eq!(*log.lock().unwrap(), vec![(FeatureId::VoiceAssistant, false)]);
        assert!(throttled(&registry, FeatureId::PageScan));

        log.lock().unwrap().clear();
        stop(&mut registry, FeatureId::VoiceAssistant);
        assert_eq!(*log.lock().unwrap(), vec![(FeatureId::PageScan, false)]);
    }

    #[test]
    fn stopping_lower_tier_changes_nothing() {
        let log = Log::default();
        let mut registry = setup(&log);
        start(&mut registry, FeatureId::VoiceAssistant);
        start(&mut registry, FeatureId::PageScan);
        start(&mut registry, FeatureId::Dfu);
        log.lock().unwrap().clear();

        stop(&mut registry, FeatureId::Dfu);
        assert!(log.lock().unwrap().is_empty());
        assert!(throttled(&registry, FeatureId::PageScan));
    }
}
