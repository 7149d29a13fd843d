use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rangehost_primitives::{ClientId, Timestamp};
use tracing::{debug, trace, warn};

use crate::{Client, ClientSnapshot};

pub const DEFAULT_MAX_CLIENTS: usize = 32;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Upper bound on tracked clients. New ids beyond it are refused.
    pub max_clients: usize,
    /// Longest wait for the registry lock before giving up on a call.
    pub lock_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The lock was contended past the timeout. Retry next cycle.
    #[error("client registry lock timed out")]
    LockTimeout,
    #[error("client registry full ({capacity} clients)")]
    Full { capacity: usize },
    #[error("broadcast id cannot be registered")]
    BroadcastId,
}

/// Outcome of [`ClientRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    New,
    Refreshed,
}

/// Table of known remote nodes, ordered by id.
///
/// Callbacks passed to the `with_*` methods run while the lock is held; they
/// must not call back into the registry or take any other lock.
#[derive(Debug)]
pub struct ClientRegistry {
    config: RegistryConfig,
    clients: Mutex<BTreeMap<ClientId, Client>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl ClientRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ClientId, Client>>, RegistryError> {
        self.clients
            .try_lock_for(self.config.lock_timeout)
            .ok_or(RegistryError::LockTimeout)
    }

    /// Creates or refreshes a client: marks it active, stamps `last_seen` and
    /// records its current address.
    pub fn upsert(
        &self,
        id: ClientId,
        addr: SocketAddr,
        now: Timestamp,
    ) -> Result<UpsertResult, RegistryError> {
        if id.is_broadcast() {
            return Err(RegistryError::BroadcastId);
        }

        let mut clients = self.lock()?;
        if let Some(client) = clients.get_mut(&id) {
            client.addr = addr;
            client.last_seen = now;
            client.active = true;
            trace!(client_id = %id, %addr, "client refreshed");
            return Ok(UpsertResult::Refreshed);
        }

        if clients.len() >= self.config.max_clients {
            warn!(client_id = %id, %addr, capacity = self.config.max_clients, "registry full");
            return Err(RegistryError::Full {
                capacity: self.config.max_clients,
            });
        }

        clients.insert(id, Client::new(id, addr, now));
        debug!(client_id = %id, %addr, "client registered");
        Ok(UpsertResult::New)
    }

    /// Runs `f` on one client. `Ok(None)` when the id is unknown.
    pub fn with_client<R>(
        &self,
        id: ClientId,
        f: impl FnOnce(&Client) -> R,
    ) -> Result<Option<R>, RegistryError> {
        Ok(self.lock()?.get(&id).map(f))
    }

    /// Runs `f` with exclusive access to one client. `Ok(None)` when the id
    /// is unknown.
    pub fn with_client_mut<R>(
        &self,
        id: ClientId,
        f: impl FnOnce(&mut Client) -> R,
    ) -> Result<Option<R>, RegistryError> {
        Ok(self.lock()?.get_mut(&id).map(f))
    }

    /// Runs `f` on every client in id order, collecting the `Some` results.
    pub fn filter_map_mut<R>(
        &self,
        mut f: impl FnMut(&mut Client) -> Option<R>,
    ) -> Result<Vec<R>, RegistryError> {
        Ok(self.lock()?.values_mut().filter_map(&mut f).collect())
    }

    /// Unicast address of an active client.
    pub fn resolve(&self, id: ClientId) -> Result<Option<SocketAddr>, RegistryError> {
        Ok(self
            .lock()?
            .get(&id)
            .filter(|client| client.active)
            .map(|client| client.addr))
    }

    /// Marks a client inactive so the next prune evicts it. Returns whether
    /// the client was known.
    pub fn deactivate(&self, id: ClientId) -> Result<bool, RegistryError> {
        let mut clients = self.lock()?;
        let Some(client) = clients.get_mut(&id) else {
            return Ok(false);
        };
        client.active = false;
        debug!(client_id = %id, "client deactivated");
        Ok(true)
    }

    /// Evicts every client that is inactive or unseen for longer than
    /// `timeout`. Evicting a client drops any session it was running.
    /// Returns the number of evicted clients.
    pub fn prune(&self, now: Timestamp, timeout: Duration) -> Result<usize, RegistryError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let mut clients = self.lock()?;
        let before = clients.len();
        clients.retain(|id, client| {
            let keep = client.active && !client.is_stale(now, timeout_ms);
            if !keep {
                debug!(client_id = %id, last_seen = client.last_seen, "client pruned");
            }
            keep
        });
        let pruned = before - clients.len();
        drop(clients);

        if pruned > 0 {
            metrics::counter!("registry.pruned_total").increment(pruned as u64);
        }
        Ok(pruned)
    }

    /// Consistent view of all active clients, taken in one critical section.
    pub fn snapshot(&self, now: Timestamp) -> Result<Vec<ClientSnapshot>, RegistryError> {
        Ok(self
            .lock()?
            .values()
            .filter(|client| client.active)
            .map(|client| client.snapshot(now))
            .collect())
    }

    pub fn ids(&self) -> Result<Vec<ClientId>, RegistryError> {
        Ok(self.lock()?.keys().copied().collect())
    }

    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10_000);

    fn addr(id: u8) -> SocketAddr {
        SocketAddr::from(([192, 168, 4, id], 4210))
    }

    fn registry(max_clients: usize) -> ClientRegistry {
        ClientRegistry::new(RegistryConfig {
            max_clients,
            lock_timeout: Duration::from_millis(10),
        })
    }

    #[test]
    fn test_upsert_then_get() {
        let registry = registry(4);
        let id = ClientId::new(7);
        assert_eq!(registry.upsert(id, addr(7), 100), Ok(UpsertResult::New));

        let (got_id, got_addr) = registry
            .with_client(id, |client| (client.id, client.addr))
            .unwrap()
            .unwrap();
        assert_eq!(got_id, id);
        assert_eq!(got_addr, addr(7));
    }

    #[test]
    fn test_refresh_keeps_state() {
        let registry = registry(4);
        let id = ClientId::new(1);
        registry.upsert(id, addr(1), 100).unwrap();
        registry
            .with_client_mut(id, |client| {
                client.brightness = 10;
                client.active = false;
            })
            .unwrap();

        assert_eq!(registry.upsert(id, addr(2), 500), Ok(UpsertResult::Refreshed));
        registry
            .with_client(id, |client| {
                assert_eq!(client.brightness, 10);
                assert!(client.active);
                assert_eq!(client.last_seen, 500);
                assert_eq!(client.addr, addr(2));
            })
            .unwrap();
        assert_eq!(registry.len(), Ok(1));
    }

    #[test]
    fn test_capacity_bound() {
        let registry = registry(2);
        registry.upsert(ClientId::new(1), addr(1), 0).unwrap();
        registry.upsert(ClientId::new(2), addr(2), 0).unwrap();
        assert_eq!(
            registry.upsert(ClientId::new(3), addr(3), 0),
            Err(RegistryError::Full { capacity: 2 })
        );
        // known ids can still refresh at capacity
        assert_eq!(
            registry.upsert(ClientId::new(2), addr(2), 5),
            Ok(UpsertResult::Refreshed)
        );
        assert_eq!(registry.len(), Ok(2));
    }

    #[test]
    fn test_broadcast_never_stored() {
        let registry = registry(4);
        assert_eq!(
            registry.upsert(ClientId::BROADCAST, addr(9), 0),
            Err(RegistryError::BroadcastId)
        );
        assert_eq!(registry.is_empty(), Ok(true));
    }

    #[test]
    fn test_unknown_client_is_none() {
        let registry = registry(4);
        assert_eq!(registry.with_client(ClientId::new(5), |_| ()), Ok(None));
        assert_eq!(registry.with_client_mut(ClientId::new(5), |_| ()), Ok(None));
        assert_eq!(registry.resolve(ClientId::new(5)), Ok(None));
        assert_eq!(registry.deactivate(ClientId::new(5)), Ok(false));
    }

    #[test]
    fn test_deactivate_hides_and_prunes() {
        let registry = registry(4);
        let id = ClientId::new(3);
        registry.upsert(id, addr(3), 0).unwrap();
        assert_eq!(registry.resolve(id), Ok(Some(addr(3))));

        assert_eq!(registry.deactivate(id), Ok(true));
        assert_eq!(registry.resolve(id), Ok(None));
        assert!(registry.snapshot(0).unwrap().is_empty());
        assert_eq!(registry.prune(0, TIMEOUT), Ok(1));
        assert_eq!(registry.is_empty(), Ok(true));
    }

    #[test]
    fn test_stale_client_pruned_from_snapshot() {
        let registry = registry(4);
        registry.upsert(ClientId::new(3), addr(3), 0).unwrap();
        registry.upsert(ClientId::new(4), addr(4), 9_000).unwrap();

        assert_eq!(registry.prune(12_000, TIMEOUT), Ok(1));
        let ids: Vec<_> = registry
            .snapshot(12_000)
            .unwrap()
            .into_iter()
            .map(|client| client.client_id)
            .collect();
        assert_eq!(ids, vec![ClientId::new(4)]);
    }

    #[test]
    fn test_contended_lock_times_out() {
        let registry = registry(4);
        let _guard = registry.clients.lock();
        assert_matches!(
            registry.upsert(ClientId::new(1), addr(1), 0),
            Err(RegistryError::LockTimeout)
        );
        assert_matches!(registry.snapshot(0), Err(RegistryError::LockTimeout));
    }

    #[test]
    fn test_filter_map_mut_in_id_order() {
        let registry = registry(8);
        for id in [5, 1, 3] {
            registry.upsert(ClientId::new(id), addr(id), 0).unwrap();
        }
        let ids = registry
            .filter_map_mut(|client| {
                client.brightness = 1;
                Some(client.id.get())
            })
            .unwrap();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    proptest! {
        #[test]
        fn prop_prune_removes_exactly_stale(
            seen in prop::collection::btree_map(0u8..0xFF, 0u64..=50_000, 0..32),
            now in 50_000u64..=70_000,
            timeout_ms in 0u64..=30_000,
        ) {
            let registry = registry(64);
            for (&id, &last_seen) in &seen {
                registry.upsert(ClientId::new(id), addr(id), last_seen).unwrap();
            }

            let expected: BTreeSet<_> = seen
                .iter()
                .filter(|&(_, &last_seen)| now - last_seen <= timeout_ms)
                .map(|(&id, _)| ClientId::new(id))
                .collect();

            let pruned = registry.prune(now, Duration::from_millis(timeout_ms)).unwrap();
            let remaining: BTreeSet<_> = registry.ids().unwrap().into_iter().collect();

            prop_assert_eq!(pruned, seen.len() - expected.len());
            prop_assert_eq!(remaining, expected);
        }
    }
}
