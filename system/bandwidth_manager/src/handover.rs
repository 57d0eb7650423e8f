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

//! Role handover between the two earbuds.
//!
//! Around a role switch, the role manager asks every component whether the
//! handover may proceed (`veto`), collects their state on the primary
//! (`marshal`), applies it on the secondary (`unmarshal`), and finally tells
//! both sides their new role (`commit`).

use crate::error::HandoverError;
use crate::manager::BandwidthManager;
use crate::marshal::RegistrySnapshot;
use log::{debug, info, warn};

/// Identifier of a component taking part in the handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId(pub u8);

impl ComponentId {
    /// Bandwidth manager
    pub const BANDWIDTH_MANAGER: ComponentId = ComponentId(0x0b);
}

/// Interface of a component whose state follows the primary role
pub trait HandoverInterface: Send + Sync {
    /// Identifier the component is registered under
    fn component(&self) -> ComponentId;

    /// Returns true to abort the handover. Expected to be retried later.
    fn veto(&self) -> bool;

    /// Returns the state to transfer, or `None` when there is nothing to transfer.
    fn marshal(&self) -> Option<Vec<u8>>;

    /// Replaces the local state with the one transferred from the peer.
    fn unmarshal(&self, data: &[u8]) -> Result<(), HandoverError>;

    /// Called on both sides once the roles are settled.
    fn commit(&self, is_primary: bool);
}

impl BandwidthManager {
    /// Snapshot of the running features, `None` when none is running.
    pub fn snapshot(&self) -> Option<RegistrySnapshot> {
        let state = self.lock();
        if state.registry.active_count() == 0 {
            debug!("BandwidthManager: no running feature to marshal");
            return None;
        }
        Some(RegistrySnapshot { features: state.registry.active_bitfields() })
    }

    /// Adopts the state of the peer. Local features missing from `snapshot`
    /// stay registered but stopped.
    pub fn adopt_snapshot(&self, snapshot: &RegistrySnapshot) {
        self.reset_all_features_info();
        let adopted =
            snapshot.features.iter().filter(|&bitfields| self.update_feature_info(bitfields)).count();
        if adopted != snapshot.active_count() {
            warn!(
                "BandwidthManager: adopted {} of {} transferred features",
                adopted,
                snapshot.active_count()
            );
        }
        // Counts what the registry actually holds, so that unknown identifiers
        // in the snapshot cannot make the active count diverge.
        let running = self.features().iter().filter(|f| f.running).count();
        self.set_active_features_num(running);
    }
}

impl HandoverInterface for BandwidthManager {
    fn component(&self) -> ComponentId {
        ComponentId::BANDWIDTH_MANAGER
    }

    fn veto(&self) -> bool {
        let veto = self.has_pending_actions();
        if veto {
            info!("BandwidthManager: veto handover, arbitration in progress");
        }
        veto
    }

    fn marshal(&self) -> Option<Vec<u8>> {
        self.snapshot().map(|snapshot| snapshot.to_bytes())
    }

    fn unmarshal(&self, data: &[u8]) -> Result<(), HandoverError> {
        let snapshot = RegistrySnapshot::from_bytes(data)?;
        debug!("BandwidthManager: unmarshal {:?}", snapshot);
        self.adopt_snapshot(&snapshot);
        Ok(())
    }

    fn commit(&self, is_primary: bool) {
        debug!("BandwidthManager: commit, primary {}", is_primary);
        if is_primary {
            // Throttling was only tracked so far, engage it for real.
            self.refresh_feature_throttle_status();
        } else {
            self.reset_all_features_info();
        }
    }
}

/// Runs the handover sequence over a set of components.
#[derive(Default)]
pub struct HandoverDispatcher {
    components: Vec<Box<dyn HandoverInterface>>,
}

impl HandoverDispatcher {
    /// Create a dispatcher without components
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a component. Each identifier can only be registered once.
    pub fn register(&mut self, component: Box<dyn HandoverInterface>) -> Result<(), HandoverError> {
        let id = component.component();
        if self.components.iter().any(|c| c.component() == id) {
            return Err(HandoverError::DuplicateComponent(id));
        }
        self.components.push(component);
        Ok(())
    }

    /// Fails with the first component vetoing the handover.
    pub fn veto(&self) -> Result<(), HandoverError> {
        match self.components.iter().find(|c| c.veto()) {
            Some(c) => Err(HandoverError::Vetoed(c.component())),
            None => Ok(()),
        }
    }

    /// State of every component having something to transfer.
    pub fn marshal(&self) -> Vec<(ComponentId, Vec<u8>)> {
        self.components.iter().filter_map(|c| Some((c.component(), c.marshal()?))).collect()
    }

    /// Routes each transferred state to its component.
    pub fn unmarshal(&self, data: &[(ComponentId, Vec<u8>)]) -> Result<(), HandoverError> {
        for (id, bytes) in data {
            let component = self
                .components
                .iter()
                .find(|c| c.component() == *id)
                .ok_or(HandoverError::UnknownComponent(*id))?;
            component.unmarshal(bytes)?;
        }
        Ok(())
    }

    pub fn commit(&self, is_primary: bool) {
        for component in &self.components {
            component.commit(is_primary);
        }
    }
}
