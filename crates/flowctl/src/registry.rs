// Copyright 2024-2026 Farlight Networks, LLC
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

// Mutex::lock().unwrap() is the standard pattern in Rust. The lock only fails
// if the mutex is poisoned (a thread panicked while holding it), which indicates
// a bug elsewhere that should propagate. We also suppress the "missing # Panics"
// warning since these are not user-actionable panics.
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

//! Session registry.
//!
//! The registry maps peer ids to the handles of their connection tasks and
//! datapath ids to peers. It is the only state shared between connection
//! tasks; the lock is held for single lookups and updates only.

use crate::ConnectionHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Identifies one controller connection for its whole life, across
/// reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[derive(Debug)]
struct PeerEntry {
    handle: ConnectionHandle,
    datapath_id: Option<u64>,
    auxiliaries: HashMap<u8, ConnectionHandle>,
}

#[derive(Debug, Default)]
struct Peers {
    peers: HashMap<PeerId, PeerEntry>,
    by_datapath: HashMap<u64, PeerId>,
}

/// Registry of live connections.
#[derive(Debug)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    inner: Mutex<Peers>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(Peers::default()),
        }
    }

    /// Generates a new unique peer id.
    pub fn next_peer_id(&self) -> PeerId {
        PeerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a connection under its peer id.
    pub fn insert(&self, handle: ConnectionHandle) {
        let peer = handle.peer();
        let entry = PeerEntry {
            handle,
            datapath_id: None,
            auxiliaries: HashMap::new(),
        };
        if self.inner.lock().unwrap().peers.insert(peer, entry).is_some() {
            warn!(%peer, "peer registered twice");
        }
    }

    /// Unregisters a connection. Returns the handles of its auxiliary
    /// channels so the caller can close them.
    pub fn remove(&self, peer: PeerId) -> Vec<ConnectionHandle> {
        let mut inner = self.inner.lock().unwrap();
        let Some(entry) = inner.peers.remove(&peer) else {
            return Vec::new();
        };
        if let Some(dpid) = entry.datapath_id {
            if inner.by_datapath.get(&dpid) == Some(&peer) {
                inner.by_datapath.remove(&dpid);
            }
        }
        debug!(%peer, "peer removed");
        entry.auxiliaries.into_values().collect()
    }

    /// Returns the handle of a connection.
    #[must_use]
    pub fn get(&self, peer: PeerId) -> Option<ConnectionHandle> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .get(&peer)
            .map(|entry| entry.handle.clone())
    }

    /// Returns the handle of an auxiliary channel of `peer`.
    #[must_use]
    pub fn auxiliary(&self, peer: PeerId, auxiliary_id: u8) -> Option<ConnectionHandle> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .get(&peer)
            .and_then(|entry| entry.auxiliaries.get(&auxiliary_id).cloned())
    }

    /// Records the datapath behind `peer`.
    ///
    /// A datapath that reconnects on a new connection moves to it; the
    /// peer it was previously mapped to is returned.
    pub fn set_datapath(&self, peer: PeerId, datapath_id: u64) -> Option<PeerId> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.peers.get_mut(&peer)?;
        entry.datapath_id = Some(datapath_id);
        let previous = inner
            .by_datapath
            .insert(datapath_id, peer)
            .filter(|&p| p != peer);
        if let Some(previous) = previous {
            warn!(
                %peer,
                %previous,
                datapath_id = format_args!("{datapath_id:016x}"),
                "datapath moved to a new connection"
            );
        }
        previous
    }

    /// Forgets the datapath behind `peer`, e.g. after its link dropped.
    pub fn clear_datapath(&self, peer: PeerId) {
        let mut inner = self.inner.lock().unwrap();
        let Some(dpid) = inner
            .peers
            .get_mut(&peer)
            .and_then(|entry| entry.datapath_id.take())
        else {
            return;
        };
        if inner.by_datapath.get(&dpid) == Some(&peer) {
            inner.by_datapath.remove(&dpid);
        }
    }

    /// Returns the datapath behind `peer`, once its handshake completed.
    #[must_use]
    pub fn datapath_id(&self, peer: PeerId) -> Option<u64> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .get(&peer)
            .and_then(|entry| entry.datapath_id)
    }

    /// Returns the main connection of a datapath.
    #[must_use]
    pub fn find_datapath(&self, datapath_id: u64) -> Option<PeerId> {
        self.inner
            .lock()
            .unwrap()
            .by_datapath
            .get(&datapath_id)
            .copied()
    }

    /// Moves the connection `channel` under the main connection of
    /// `datapath_id` as auxiliary channel `auxiliary_id`.
    ///
    /// Returns the main connection's peer id, or `None` if the datapath
    /// has no main connection; `channel` then stays registered as is.
    pub fn attach_auxiliary(
        &self,
        channel: PeerId,
        datapath_id: u64,
        auxiliary_id: u8,
    ) -> Option<PeerId> {
        let mut inner = self.inner.lock().unwrap();
        let main = *inner.by_datapath.get(&datapath_id)?;
        if main == channel || !inner.peers.contains_key(&main) {
            return None;
        }
        let handle = inner.peers.remove(&channel)?.handle;
        let replaced = inner
            .peers
            .get_mut(&main)?
            .auxiliaries
            .insert(auxiliary_id, handle);
        drop(inner);

        if let Some(old) = replaced {
            warn!(%main, auxiliary_id, replaced = %old.peer(), "auxiliary channel replaced");
            old.close_now();
        }
        debug!(%main, %channel, auxiliary_id, "auxiliary channel attached");
        Some(main)
    }

    /// Removes auxiliary channel `auxiliary_id` from `main`.
    pub fn detach_auxiliary(
        &self,
        main: PeerId,
        channel: PeerId,
        auxiliary_id: u8,
    ) -> Option<ConnectionHandle> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.peers.get_mut(&main)?;
        // A newer channel may have taken the slot already.
        if entry.auxiliaries.get(&auxiliary_id)?.peer() != channel {
            return None;
        }
        entry.auxiliaries.remove(&auxiliary_id)
    }

    /// Removes and returns every auxiliary channel of `main`.
    pub fn take_auxiliaries(&self, main: PeerId) -> Vec<ConnectionHandle> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .get_mut(&main)
            .map(|entry| entry.auxiliaries.drain().map(|(_, handle)| handle).collect())
            .unwrap_or_default()
    }

    /// Returns the ids of all registered connections, in creation order.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.lock().unwrap().peers.keys().copied().collect();
        peers.sort_unstable();
        peers
    }

    /// Returns the handles of all registered connections.
    #[must_use]
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.inner
            .lock()
            .unwrap()
            .peers
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().peers.len()
    }

    /// Returns true if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(registry: &SessionRegistry) -> (PeerId, crate::connection::CommandReceiver) {
        let peer = registry.next_peer_id();
        let (handle, commands) = ConnectionHandle::detached(peer);
        registry.insert(handle);
        (peer, commands)
    }

    #[test]
    fn peer_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.next_peer_id();
        let b = registry.next_peer_id();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "peer-1");
    }

    #[test]
    fn insert_get_remove() {
        let registry = SessionRegistry::new();
        let (peer, _commands) = register(&registry);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(peer).map(|h| h.peer()), Some(peer));
        assert!(registry.remove(peer).is_empty());
        assert!(registry.get(peer).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn datapath_lookup_follows_newest_connection() {
        let registry = SessionRegistry::new();
        let (first, _c1) = register(&registry);
        let (second, _c2) = register(&registry);

        assert_eq!(registry.set_datapath(first, 0xabc), None);
        assert_eq!(registry.find_datapath(0xabc), Some(first));
        assert_eq!(registry.set_datapath(second, 0xabc), Some(first));
        assert_eq!(registry.find_datapath(0xabc), Some(second));

        // Removing the stale connection keeps the new mapping.
        registry.remove(first);
        assert_eq!(registry.find_datapath(0xabc), Some(second));
        registry.clear_datapath(second);
        assert_eq!(registry.find_datapath(0xabc), None);
        assert_eq!(registry.datapath_id(second), None);
    }

    #[test]
    fn auxiliary_channels_attach_to_main() {
        let registry = SessionRegistry::new();
        let (main, _c1) = register(&registry);
        let (channel, _c2) = register(&registry);

        assert_eq!(registry.attach_auxiliary(channel, 0x1, 1), None);
        registry.set_datapath(main, 0x1);
        assert_eq!(registry.attach_auxiliary(channel, 0x1, 1), Some(main));

        assert_eq!(registry.peers(), vec![main]);
        assert_eq!(registry.auxiliary(main, 1).map(|h| h.peer()), Some(channel));

        let removed = registry.remove(main);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].peer(), channel);
    }

    #[test]
    fn detach_ignores_replaced_channel() {
        let registry = SessionRegistry::new();
        let (main, _c1) = register(&registry);
        let (old, _c2) = register(&registry);
        let (new, _c3) = register(&registry);
        registry.set_datapath(main, 0x2);
        registry.attach_auxiliary(old, 0x2, 1);
        registry.attach_auxiliary(new, 0x2, 1);

        assert!(registry.detach_auxiliary(main, old, 1).is_none());
        assert_eq!(registry.auxiliary(main, 1).map(|h| h.peer()), Some(new));
        assert!(registry.detach_auxiliary(main, new, 1).is_some());
        assert!(registry.take_auxiliaries(main).is_empty());
    }
}
