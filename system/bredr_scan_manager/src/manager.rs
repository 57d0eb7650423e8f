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

use crate::clients::{ClientId, ScanClient};
use crate::driver::ScanDriver;
use crate::error::ScanError;
use crate::instance::{Effect, ScanInstance, ScanState};
use crate::params::{ScanParameterTable, ScanParameters, ScanType};
use crate::ScanKind;
use bt_bandwidth_manager::{BandwidthManager, FeatureId, Priority};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

struct State {
    page: ScanInstance,
    inquiry: ScanInstance,
    /// Set by `disable_all`
    disabled: bool,
    /// Set by `pause`
    paused: bool,
    /// Write Scan Enable commands not confirmed yet
    outstanding: usize,
    driver: Arc<dyn ScanDriver>,
    bandwidth: BandwidthManager,
}

/// BR/EDR page and inquiry scan manager.
///
/// Clients request a scan type for each scan kind. Scanning is enabled while
/// at least one client wants it, with the parameters of the greatest type
/// requested. Page scan takes part in the bandwidth arbitration: when it is
/// throttled, its throttle parameters replace the requested ones.
#[derive(Clone)]
pub struct BredrScanManager {
    state: Arc<Mutex<State>>,
}

impl State {
    fn is_disabled(&self) -> bool {
        self.disabled || self.paused
    }

    fn instance(&mut self, kind: ScanKind) -> &mut ScanInstance {
        match kind {
            ScanKind::Page => &mut self.page,
            ScanKind::Inquiry => &mut self.inquiry,
        }
    }

    fn with_instance<R>(
        &mut self,
        kind: ScanKind,
        f: impl FnOnce(&mut ScanInstance, bool, &mut Vec<Effect>) -> R,
    ) -> R {
        let disabled = self.is_disabled();
        let mut effects = vec![];
        let result = f(self.instance(kind), disabled, &mut effects);
        self.apply(effects);
        result
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::WriteScanEnable => {
                    let page = self.page.state().intersects(ScanState::GOAL_ENABLED);
                    let inquiry = self.inquiry.state().intersects(ScanState::GOAL_ENABLED);
                    self.outstanding += 1;
                    debug!("BredrScanManager: write scan enable page {} inquiry {}", page, inquiry);
                    self.driver.write_scan_enable(page, inquiry);
                }
                Effect::WriteScanActivity(kind, params) => {
                    self.driver.write_scan_activity(kind, params);
                }
                Effect::Entered(ScanKind::Page, state) => self.page_scan_entered(state),
                Effect::Entered(ScanKind::Inquiry, _) => (),
            }
        }
    }

    fn page_scan_entered(&self, state: ScanState) {
        let running = self.bandwidth.is_feature_running(FeatureId::PageScan);
        let result = if state == ScanState::ENABLED && !running {
            self.bandwidth.feature_start(FeatureId::PageScan)
        } else if state == ScanState::DISABLED && running {
            self.bandwidth.feature_stop(FeatureId::PageScan)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            error!("BredrScanManager: page scan {:?} not reported: {}", state, e);
        }
    }

    /// Updates the global disable flags, resuming the instances when they
    /// are both cleared.
    fn set_disabled(&mut self, disabled: bool, paused: bool) {
        let was_disabled = self.is_disabled();
        self.disabled = disabled;
        self.paused = paused;
        let resumed = was_disabled && !self.is_disabled();
        for kind in [ScanKind::Page, ScanKind::Inquiry] {
            self.with_instance(kind, |instance, disabled, effects| {
                if resumed {
                    instance.resume(effects);
                } else {
                    instance.refresh(disabled, effects);
                }
            });
        }
    }
}

impl BredrScanManager {
    /// Creates the manager, registering page scan with the bandwidth manager.
    pub fn new(driver: Arc<dyn ScanDriver>, bandwidth: BandwidthManager) -> Result<Self, ScanError> {
        let state = Arc::new(Mutex::new(State {
            page: ScanInstance::new(ScanKind::Page),
            inquiry: ScanInstance::new(ScanKind::Inquiry),
            disabled: false,
            paused: false,
            outstanding: 0,
            driver,
            bandwidth: bandwidth.clone(),
        }));

        let weak = Arc::downgrade(&state);
        bandwidth.register_feature(
            FeatureId::PageScan,
            Priority::Low,
            Some(Arc::new(move |throttle| {
                if let Some(state) = weak.upgrade() {
                    debug!("BredrScanManager: page scan throttle {}", throttle);
                    state.lock().unwrap().with_instance(ScanKind::Page, |page, _, effects| {
                        page.adjust_bandwidth(throttle, effects)
                    });
                }
            })),
        )?;
        info!("BredrScanManager: initialised");
        Ok(Self { state })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Registers the parameter table of `kind`, selecting its first set.
    pub fn register_parameters(
        &self,
        kind: ScanKind,
        table: ScanParameterTable,
    ) -> Result<(), ScanError> {
        if table.sets.is_empty() {
            return Err(ScanError::NoParameters);
        }
        self.lock().instance(kind).register_parameters(table);
        Ok(())
    }

    /// Selects the parameter set of `kind` in use.
    pub fn select_parameter_set(&self, kind: ScanKind, index: usize) -> Result<(), ScanError> {
        self.lock()
            .with_instance(kind, |instance, _, effects| instance.select_parameter_set(index, effects))
            .inspect_err(|e| warn!("BredrScanManager: {}", e))
    }

    /// Adds `client` to the `kind` scan, or updates the scan type it requests.
    pub fn enable(
        &self,
        kind: ScanKind,
        client: &ScanClient,
        scan_type: ScanType,
    ) -> Result<(), ScanError> {
        let mut state = self.lock();
        if !state.instance(kind).has_parameters() {
            error!("BredrScanManager: {:?} scan requested without parameters", kind);
            return Err(ScanError::NoParameters);
        }
        state.with_instance(kind, |instance, disabled, effects| {
            instance.add_client(client, scan_type, disabled, effects)
        });
        Ok(())
    }

    /// Removes `client` from the `kind` scan.
    pub fn disable(&self, kind: ScanKind, client: ClientId) {
        let removed = self.lock().with_instance(kind, |instance, disabled, effects| {
            instance.remove_client(client, disabled, effects)
        });
        if !removed {
            warn!("BredrScanManager: {:?} is not a {:?} scan client", client, kind);
        }
    }

    /// True if `client` requested a fast or slow `kind` scan.
    pub fn is_enabled_for_client(&self, kind: ScanKind, client: ClientId) -> bool {
        self.lock().instance(kind).is_enabled_for_client(client)
    }

    /// Disables both scans whatever the clients request.
    pub fn disable_all(&self) {
        info!("BredrScanManager: disable all");
        let mut state = self.lock();
        let paused = state.paused;
        state.set_disabled(true, paused);
    }

    pub fn enable_all(&self) {
        info!("BredrScanManager: enable all");
        let mut state = self.lock();
        let paused = state.paused;
        state.set_disabled(false, paused);
    }

    /// Temporarily stops both scans. Clients are told with a paused indication.
    pub fn pause(&self) {
        info!("BredrScanManager: pause");
        let mut state = self.lock();
        let disabled = state.disabled;
        state.set_disabled(disabled, true);
    }

    /// Undoes `pause`. Clients told about the pause get a resumed indication.
    pub fn resume(&self) {
        info!("BredrScanManager: resume");
        let mut state = self.lock();
        let disabled = state.disabled;
        state.set_disabled(disabled, false);
    }

    /// True while paused or disabled.
    pub fn is_disabled(&self) -> bool {
        self.lock().is_disabled()
    }

    /// Write Scan Enable completed. Transitions complete once every
    /// outstanding command is confirmed.
    pub fn on_scan_enable_confirmed(&self) {
        let mut state = self.lock();
        if state.outstanding == 0 {
            warn!("BredrScanManager: unexpected scan enable confirmation");
            return;
        }
        state.outstanding -= 1;
        if state.outstanding > 0 {
            debug!("BredrScanManager: {} scan enable outstanding", state.outstanding);
            return;
        }
        for kind in [ScanKind::Page, ScanKind::Inquiry] {
            state.with_instance(kind, |instance, disabled, effects| {
                instance.complete_transition(disabled, effects)
            });
        }
    }

    pub fn state(&self, kind: ScanKind) -> ScanState {
        self.lock().instance(kind).state()
    }

    /// Parameters last written for `kind`, if any.
    pub fn active_parameters(&self, kind: ScanKind) -> Option<ScanParameters> {
        self.lock().instance(kind).active_parameters()
    }
}
