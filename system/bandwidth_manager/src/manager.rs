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

use crate::arbiter::{self, Action, Notification};
use crate::error::BandwidthError;
use crate::feature::{FeatureBitfields, FeatureId, Priority, ThrottleCallback};
use crate::registry::Registry;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

pub(crate) struct State {
    pub(crate) registry: Registry,

    /// Arbitration events queued and not yet fully handled.
    pending: usize,
}

/// Handle to the bandwidth manager.
///
/// Feature start / stop update the registry immediately, so that queries made
/// right after see the new running state, but the throttle recomputation and
/// the callbacks run later on the [`ArbitrationTask`]. This keeps a feature's
/// callback off another feature's call stack, and totally orders arbitration
/// decisions.
#[derive(Clone)]
pub struct BandwidthManager {
    state: Arc<Mutex<State>>,
    tx: mpsc::UnboundedSender<Action>,
}

/// Single consumer of the arbitration events.
pub struct ArbitrationTask {
    state: Arc<Mutex<State>>,
    rx: mpsc::UnboundedReceiver<Action>,
}

impl BandwidthManager {
    /// Creates an empty registry, along with the task processing its events.
    pub fn new() -> (Self, ArbitrationTask) {
        let state = Arc::new(Mutex::new(State { registry: Registry::new(), pending: 0 }));
        let (tx, rx) = mpsc::unbounded_channel();
        debug!("BandwidthManager: initialised");
        (Self { state: state.clone(), tx }, ArbitrationTask { state, rx })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Registers `id` at `priority`. A callback is mandatory unless `priority`
    /// is [`Priority::High`]. Registering an already known identifier replaces
    /// its priority and callback in place.
    pub fn register_feature(
        &self,
        id: FeatureId,
        priority: Priority,
        callback: Option<ThrottleCallback>,
    ) -> Result<(), BandwidthError> {
        debug!(
            "BandwidthManager: register {:?} at {:?}, callback {}",
            id,
            priority,
            callback.is_some()
        );
        self.lock().registry.register(id, priority, callback).inspect_err(|e| {
            error!("BandwidthManager: cannot register {:?}: {}", id, e);
        })
    }

    /// Marks `id` as using bandwidth, and queues the arbitration.
    pub fn feature_start(&self, id: FeatureId) -> Result<(), BandwidthError> {
        self.act(id, |registry| {
            let priority = registry.start(id)?;
            Ok(Action::Start { id, priority })
        })
    }

    /// Marks `id` as no longer using bandwidth, and queues the arbitration.
    pub fn feature_stop(&self, id: FeatureId) -> Result<(), BandwidthError> {
        self.act(id, |registry| {
            let priority = registry.stop(id)?;
            Ok(Action::Stop { id, priority })
        })
    }

    fn act(
        &self,
        id: FeatureId,
        f: impl FnOnce(&mut Registry) -> Result<Action, BandwidthError>,
    ) -> Result<(), BandwidthError> {
        let mut state = self.lock();
        if self.tx.is_closed() {
            error!("BandwidthManager: {:?} ignored, arbitration task stopped", id);
            return Err(BandwidthError::TaskStopped);
        }
        let action = f(&mut state.registry).inspect_err(|e| {
            error!("BandwidthManager: {}", e);
        })?;
        state.pending += 1;
        if self.tx.send(action).is_err() {
            state.pending -= 1;
            return Err(BandwidthError::TaskStopped);
        }
        debug!("BandwidthManager: queued {:?}, active {}", action, state.registry.active_count());
        Ok(())
    }

    /// Returns the throttle requirement of `id`. A stopped feature is reported
    /// as throttled.
    ///
    /// Panics if `id` is not registered.
    pub fn is_throttle_required(&self, id: FeatureId) -> bool {
        let state = self.lock();
        let Some(feature) = state.registry.get(id) else {
            panic!("Feature {:?} is not registered", id);
        };
        !feature.bitfields.running || feature.bitfields.throttle_required
    }

    /// Panics if `id` is not registered.
    pub fn is_feature_running(&self, id: FeatureId) -> bool {
        let state = self.lock();
        let Some(feature) = state.registry.get(id) else {
            panic!("Feature {:?} is not registered", id);
        };
        feature.bitfields.running
    }

    /// Panics if `id` is not registered.
    pub fn feature_priority(&self, id: FeatureId) -> Priority {
        let state = self.lock();
        let Some(feature) = state.registry.get(id) else {
            panic!("Feature {:?} is not registered", id);
        };
        feature.bitfields.priority
    }

    /// Number of running features.
    pub fn active_features_num(&self) -> usize {
        self.lock().registry.active_count()
    }

    /// Number of registered features.
    pub fn registered_features_num(&self) -> usize {
        self.lock().registry.registered_count()
    }

    /// True while arbitration events are queued or being handled.
    pub fn has_pending_actions(&self) -> bool {
        self.lock().pending > 0
    }

    /// Stops every feature and clears its throttle requirement, without
    /// notifying anyone.
    pub fn reset_all_features_info(&self) {
        debug!("BandwidthManager: reset all features");
        self.lock().registry.reset();
    }

    /// Overwrites the state of a registered feature, keeping the running
    /// features packed. Returns false if `bitfields` names an unknown feature.
    pub fn update_feature_info(&self, bitfields: &FeatureBitfields) -> bool {
        self.lock().registry.update(bitfields)
    }

    pub(crate) fn set_active_features_num(&self, active: usize) {
        self.lock().registry.set_active_count(active);
    }

    /// Replays the callback of every running and throttled feature.
    pub fn refresh_feature_throttle_status(&self) {
        let notifications: Vec<_> = self
            .lock()
            .registry
            .features()
            .filter(|f| f.bitfields.running && f.bitfields.throttle_required)
            .filter_map(|f| {
                Some(Notification {
                    id: f.bitfields.identifier,
                    callback: f.callback.clone()?,
                    throttle_required: true,
                })
            })
            .collect();
        for notification in notifications {
            notification.deliver();
        }
    }

    /// State of each registered feature, in slot order.
    pub fn features(&self) -> Vec<FeatureBitfields> {
        self.lock().registry.features().map(|f| f.bitfields).collect()
    }
}

impl ArbitrationTask {
    /// Handles arbitration events until every [`BandwidthManager`] handle is dropped.
    pub async fn run(mut self) {
        info!("BandwidthManager: starting arbitration task");
        while let Some(action) = self.rx.recv().await {
            self.handle(action);
        }
        warn!("BandwidthManager: arbitration task has stopped");
    }

    /// Handles the events queued so far, without waiting. Returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(action) = self.rx.try_recv() {
            self.handle(action);
            handled += 1;
        }
        handled
    }

    fn handle(&self, action: Action) {
        let notifications = arbiter::arbitrate(&mut self.state.lock().unwrap().registry, action);
        // The registry is unlocked while callbacks run: they may start or stop
        // features, which only queues new events behind this one.
        for notification in notifications {
            notification.deliver();
        }
        self.state.lock().unwrap().pending -= 1;
    }
}
