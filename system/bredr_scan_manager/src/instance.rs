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

//! State machine of a single scan kind (page or inquiry).
//!
//! ```text
//!               goal enabled                  confirmed
//!   DISABLED ----------------> ENABLING ----------------> ENABLED
//!       ^                       |    ^                       |
//!       |            goal       |    |  goal                 | goal
//!       |          disabled     v    |  enabled              | disabled
//!       +-------------------- DISABLING <--------------------+
//!              confirmed
//! ```
//!
//! The instance does not talk to the controller itself: the commands it needs
//! are returned as [`Effect`]s, because Write Scan Enable carries the goal of
//! both instances at once.

use crate::clients::{ClientId, ClientList, ScanClient, ScanIndication};
use crate::error::ScanError;
use crate::params::{ScanParameterTable, ScanParameters, ScanType};
use crate::ScanKind;
use bitflags::bitflags;
use log::{debug, info, warn};

bitflags! {
    /// Scan state. A single state bit is set at a time, combined masks are
    /// used to test for a set of states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScanState: u8 {
        const DISABLED = 1 << 0;
        const ENABLING = 1 << 1;
        const ENABLED = 1 << 2;
        const DISABLING = 1 << 3;

        /// Scanning, or about to
        const GOAL_ENABLED = Self::ENABLING.bits() | Self::ENABLED.bits();
        /// Not scanning, or about to stop
        const GOAL_DISABLED = Self::DISABLING.bits() | Self::DISABLED.bits();
        /// Waiting for the controller confirmation
        const IN_TRANSITION = Self::ENABLING.bits() | Self::DISABLING.bits();
    }
}

/// Side effects of an instance operation, to be applied by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Write Scan Enable with the current goal of both instances
    WriteScanEnable,
    WriteScanActivity(ScanKind, ScanParameters),
    Entered(ScanKind, ScanState),
}

#[derive(Debug)]
pub(crate) struct ScanInstance {
    kind: ScanKind,
    state: ScanState,
    clients: ClientList,
    table: Option<ScanParameterTable>,
    selected: usize,
    /// Greatest type requested by the clients when scanning was last enabled
    requested: ScanType,
    /// Parameters last written to the controller
    active: ScanParameters,
    /// Bandwidth manager asked for page scan to be throttled
    throttled: bool,
    /// A paused indication was sent and no resumed indication since
    paused_indicated: bool,
}

impl ScanInstance {
    pub(crate) fn new(kind: ScanKind) -> Self {
        Self {
            kind,
            state: ScanState::DISABLED,
            clients: ClientList::default(),
            table: None,
            selected: 0,
            requested: ScanType::None,
            active: ScanParameters::default(),
            throttled: false,
            paused_indicated: false,
        }
    }

    pub(crate) fn state(&self) -> ScanState {
        self.state
    }

    /// Parameters last written to the controller, if any.
    pub(crate) fn active_parameters(&self) -> Option<ScanParameters> {
        Some(self.active).filter(ScanParameters::is_valid)
    }

    pub(crate) fn has_parameters(&self) -> bool {
        self.table.is_some()
    }

    fn parameters(&self, scan_type: ScanType) -> Option<ScanParameters> {
        self.table.as_ref()?.sets.get(self.selected)?.get(scan_type)
    }

    fn effective_type(&self) -> ScanType {
        if self.throttled && self.parameters(ScanType::Throttle).is_some() {
            ScanType::Throttle
        } else {
            self.requested
        }
    }

    pub(crate) fn register_parameters(&mut self, table: ScanParameterTable) {
        debug!("{:?} scan: {} parameter sets registered", self.kind, table.sets.len());
        self.table = Some(table);
        self.selected = 0;
    }

    /// Selects the parameter set in use, applying it right away if scanning.
    pub(crate) fn select_parameter_set(
        &mut self,
        index: usize,
        effects: &mut Vec<Effect>,
    ) -> Result<(), ScanError> {
        let table = self.table.as_ref().ok_or(ScanError::NoParameters)?;
        if index >= table.sets.len() {
            return Err(ScanError::InvalidParameterSet { kind: self.kind, index });
        }
        info!("{:?} scan: select parameter set {}", self.kind, index);
        self.selected = index;
        if self.state.intersects(ScanState::GOAL_ENABLED) {
            self.update_activity(self.effective_type(), effects);
        }
        Ok(())
    }

    /// Returns true if the parameters written to the controller changed.
    fn update_activity(&mut self, scan_type: ScanType, effects: &mut Vec<Effect>) -> bool {
        let Some(params) = self.parameters(scan_type) else {
            warn!("{:?} scan: no {:?} parameters in set {}", self.kind, scan_type, self.selected);
            return false;
        };
        if params == self.active {
            return false;
        }
        debug!("{:?} scan: {:?} activity {:?}", self.kind, scan_type, params);
        self.active = params;
        effects.push(Effect::WriteScanActivity(self.kind, params));
        true
    }

    fn set_state(&mut self, state: ScanState, disabled: bool, effects: &mut Vec<Effect>) {
        debug!("{:?} scan: {:?} -> {:?}", self.kind, self.state, state);
        self.state = state;
        if state.intersects(ScanState::IN_TRANSITION) {
            effects.push(Effect::WriteScanEnable);
        }
        if state == ScanState::DISABLED {
            self.throttled = false;
            if disabled {
                self.paused_indicated = true;
                self.clients.broadcast(ScanIndication::Paused(self.kind));
            }
        }
        effects.push(Effect::Entered(self.kind, state));
    }

    fn set_goal(&mut self, goal: Option<ScanType>, disabled: bool, effects: &mut Vec<Effect>) {
        match goal {
            Some(scan_type) => {
                self.requested = scan_type;
                self.update_activity(self.effective_type(), effects);
                if self.state.intersects(ScanState::GOAL_DISABLED) {
                    self.set_state(ScanState::ENABLING, disabled, effects);
                }
            }
            None => {
                if self.state.intersects(ScanState::GOAL_ENABLED) {
                    self.set_state(ScanState::DISABLING, disabled, effects);
                }
            }
        }
    }

    /// Recomputes the goal from the clients and the global disable state.
    pub(crate) fn refresh(&mut self, disabled: bool, effects: &mut Vec<Effect>) {
        let goal = if disabled { None } else { self.clients.max_type() };
        self.set_goal(goal, disabled, effects);
    }

    pub(crate) fn add_client(
        &mut self,
        client: &ScanClient,
        scan_type: ScanType,
        disabled: bool,
        effects: &mut Vec<Effect>,
    ) {
        debug!("{:?} scan: client {:?} requests {:?}", self.kind, client.id(), scan_type);
        if self.clients.add_or_update(client, scan_type)
            && disabled
            && self.state == ScanState::DISABLED
        {
            self.paused_indicated = true;
            self.clients.send(client.id(), ScanIndication::Paused(self.kind));
        }
        self.refresh(disabled, effects);
    }

    /// Returns false if `id` was not a client.
    pub(crate) fn remove_client(
        &mut self,
        id: ClientId,
        disabled: bool,
        effects: &mut Vec<Effect>,
    ) -> bool {
        if !self.clients.remove(id) {
            return false;
        }
        debug!("{:?} scan: client {:?} released", self.kind, id);
        self.refresh(disabled, effects);
        true
    }

    pub(crate) fn is_enabled_for_client(&self, id: ClientId) -> bool {
        matches!(self.clients.scan_type(id), Some(ScanType::Fast | ScanType::Slow))
    }

    /// Scanning is allowed again.
    pub(crate) fn resume(&mut self, effects: &mut Vec<Effect>) {
        if self.paused_indicated && self.state == ScanState::DISABLED {
            self.clients.broadcast(ScanIndication::Resumed(self.kind));
        }
        self.paused_indicated = false;
        self.refresh(false, effects);
    }

    /// The controller confirmed the last Write Scan Enable.
    pub(crate) fn complete_transition(&mut self, disabled: bool, effects: &mut Vec<Effect>) {
        if self.state == ScanState::ENABLING {
            self.set_state(ScanState::ENABLED, disabled, effects);
        } else if self.state == ScanState::DISABLING {
            self.set_state(ScanState::DISABLED, disabled, effects);
        }
    }

    /// Switches between the throttle parameters and the requested ones.
    /// Page scan is still reported running while disabling, so the request is
    /// applied there too and carried over if the goal flips back to enabled.
    pub(crate) fn adjust_bandwidth(&mut self, throttle: bool, effects: &mut Vec<Effect>) {
        if self.state == ScanState::DISABLED {
            debug!("{:?} scan: disabled, throttle {} ignored", self.kind, throttle);
            return;
        }
        self.throttled = throttle;
        if throttle {
            if self.parameters(ScanType::Throttle).is_none() {
                debug!("{:?} scan: no throttle parameters, keep {:?}", self.kind, self.requested);
            } else if self.update_activity(ScanType::Throttle, effects) {
                self.clients.broadcast(ScanIndication::PageScanThrottled);
            }
        } else if self.update_activity(self.requested, effects) {
            self.clients.broadcast(ScanIndication::PageScanUnthrottled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ScanParameterSet;

    const FAST: ScanParameters = ScanParameters { interval: 512, window: 18 };
    const SLOW: ScanParameters = ScanParameters { interval: 2048, window: 18 };

    fn instance() -> ScanInstance {
        let mut instance = ScanInstance::new(ScanKind::Page);
        instance.register_parameters(ScanParameterTable {
            sets: vec![
                ScanParameterSet { fast: FAST, slow: SLOW, ..Default::default() },
                ScanParameterSet { slow: FAST, ..Default::default() },
            ],
        });
        instance
    }

    #[test]
    fn enable_then_disable() {
        let mut instance = instance();
        let (client, _rx) = ScanClient::new(ClientId(1));
        let mut effects = vec![];

        instance.add_client(&client, ScanType::Fast, false, &mut effects);
        assert_eq!(
            effects,
            vec![
                Effect::WriteScanActivity(ScanKind::Page, FAST),
                Effect::WriteScanEnable,
                Effect::Entered(ScanKind::Page, ScanState::ENABLING),
            ]
        );
        assert!(instance.is_enabled_for_client(ClientId(1)));

        effects.clear();
        instance.complete_transition(false, &mut effects);
        assert_eq!(effects, vec![Effect::Entered(ScanKind::Page, ScanState::ENABLED)]);

        effects.clear();
        assert!(instance.remove_client(ClientId(1), false, &mut effects));
        assert!(!instance.remove_client(ClientId(1), false, &mut effects));
        assert_eq!(
            effects,
            vec![Effect::WriteScanEnable, Effect::Entered(ScanKind::Page, ScanState::DISABLING)]
        );
        instance.complete_transition(false, &mut effects);
        assert_eq!(instance.state(), ScanState::DISABLED);
    }

    #[test]
    fn goal_flips_before_confirmation() {
        let mut instance = instance();
        let (client, _rx) = ScanClient::new(ClientId(1));
        let mut effects = vec![];

        instance.add_client(&client, ScanType::Slow, false, &mut effects);
        instance.remove_client(ClientId(1), false, &mut effects);
        assert_eq!(instance.state(), ScanState::DISABLING);
        instance.add_client(&client, ScanType::Slow, false, &mut effects);
        assert_eq!(instance.state(), ScanState::ENABLING);

        let enables = effects.iter().filter(|e| **e == Effect::WriteScanEnable).count();
        assert_eq!(enables, 3);
        // Parameters are only written once, they did not change.
        assert_eq!(effects[0], Effect::WriteScanActivity(ScanKind::Page, SLOW));
        assert_eq!(
            effects.iter().filter(|e| matches!(e, Effect::WriteScanActivity(..))).count(),
            1
        );
    }

    #[test]
    fn select_parameter_set() {
        let mut instance = instance();
        let (client, _rx) = ScanClient::new(ClientId(1));
        let mut effects = vec![];

        assert!(matches!(
            instance.select_parameter_set(2, &mut effects),
            Err(ScanError::InvalidParameterSet { kind: ScanKind::Page, index: 2 })
        ));

        instance.add_client(&client, ScanType::Slow, false, &mut effects);
        effects.clear();
        instance.select_parameter_set(1, &mut effects).unwrap();
        assert_eq!(effects, vec![Effect::WriteScanActivity(ScanKind::Page, FAST)]);
        assert_eq!(instance.active_parameters(), Some(FAST));
    }

    #[test]
    fn no_table() {
        let mut instance = ScanInstance::new(ScanKind::Inquiry);
        assert!(!instance.has_parameters());
        assert!(matches!(
            instance.select_parameter_set(0, &mut vec![]),
            Err(ScanError::NoParameters)
        ));
        assert_eq!(instance.active_parameters(), None);
    }
}
