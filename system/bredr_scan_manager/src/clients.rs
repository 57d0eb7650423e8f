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

use crate::params::ScanType;
use crate::ScanKind;
use log::debug;
use tokio::sync::mpsc;

/// Indications sent to the clients of a scan instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanIndication {
    /// Scanning stopped by `pause` or `disable_all`, while the client wanted it
    Paused(ScanKind),
    /// Scanning allowed again after a `Paused` indication
    Resumed(ScanKind),
    /// Page scan switched to its throttle parameters
    PageScanThrottled,
    /// Page scan back to the parameters requested by the clients
    PageScanUnthrottled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

/// Handle identifying a client, and routing indications to it.
#[derive(Debug, Clone)]
pub struct ScanClient {
    id: ClientId,
    tx: mpsc::UnboundedSender<ScanIndication>,
}

impl ScanClient {
    /// Creates a client, along with the receiving end of its indications.
    pub fn new(id: ClientId) -> (Self, mpsc::UnboundedReceiver<ScanIndication>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    fn send(&self, indication: ScanIndication) {
        if self.tx.send(indication).is_err() {
            debug!("ScanClient {:?}: receiver dropped, {:?} lost", self.id, indication);
        }
    }
}

/// Clients of a scan instance, with the scan type each one requested.
#[derive(Debug, Default)]
pub(crate) struct ClientList {
    clients: Vec<(ScanClient, ScanType)>,
}

impl ClientList {
    /// Returns true if the client was not known yet.
    pub(crate) fn add_or_update(&mut self, client: &ScanClient, scan_type: ScanType) -> bool {
        match self.clients.iter_mut().find(|(c, _)| c.id == client.id) {
            Some(entry) => {
                *entry = (client.clone(), scan_type);
                false
            }
            None => {
                self.clients.push((client.clone(), scan_type));
                true
            }
        }
    }

    /// Returns true if the client was known.
    pub(crate) fn remove(&mut self, id: ClientId) -> bool {
        let len = self.clients.len();
        self.clients.retain(|(c, _)| c.id != id);
        self.clients.len() != len
    }

    pub(crate) fn scan_type(&self, id: ClientId) -> Option<ScanType> {
        self.clients.iter().find(|(c, _)| c.id == id).map(|(_, scan_type)| *scan_type)
    }

    /// Greatest scan type requested, `None` when no client wants scanning.
    pub(crate) fn max_type(&self) -> Option<ScanType> {
        self.clients
            .iter()
            .map(|(_, scan_type)| *scan_type)
            .filter(|&scan_type| scan_type != ScanType::None)
            .max()
    }

    pub(crate) fn send(&self, client: ClientId, indication: ScanIndication) {
        if let Some((c, _)) = self.clients.iter().find(|(c, _)| c.id == client) {
            c.send(indication);
        }
    }

    pub(crate) fn broadcast(&self, indication: ScanIndication) {
        for (client, _) in &self.clients {
            client.send(indication);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_type_ignores_idle_clients() {
        let mut clients = ClientList::default();
        let (a, _rx_a) = ScanClient::new(ClientId(1));
        let (b, _rx_b) = ScanClient::new(ClientId(2));
        assert_eq!(clients.max_type(), None);

        assert!(clients.add_or_update(&a, ScanType::None));
        assert_eq!(clients.max_type(), None);
        assert!(clients.add_or_update(&b, ScanType::Fast));
        assert_eq!(clients.max_type(), Some(ScanType::Fast));
        assert!(!clients.add_or_update(&a, ScanType::Slow));
        assert_eq!(clients.max_type(), Some(ScanType::Slow));
        assert_eq!(clients.scan_type(ClientId(1)), Some(ScanType::Slow));

        assert!(clients.remove(ClientId(1)));
        assert!(!clients.remove(ClientId(1)));
        assert_eq!(clients.max_type(), Some(ScanType::Fast));
    }

    #[test]
    fn broadcast_skips_dropped_receivers() {
        let mut clients = ClientList::default();
        let (a, mut rx_a) = ScanClient::new(ClientId(1));
        let (b, rx_b) = ScanClient::new(ClientId(2));
        clients.add_or_update(&a, ScanType::Fast);
        clients.add_or_update(&b, ScanType::Fast);
        drop(rx_b);

        clients.broadcast(ScanIndication::PageScanThrottled);
        assert_eq!(rx_a.try_recv(), Ok(ScanIndication::PageScanThrottled));
        assert!(rx_a.try_recv().is_err());
    }
}
