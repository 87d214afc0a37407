use acubens_common::prelude::*;
use acubens_common::{Lease, LeaseTable, RemoteHolder, RenewStatus};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::metrics::Monitors;

/// Authoritative mapping of resource code -> active lease. Owns expiry.
///
/// Every mutating operation takes an explicit `now_ms` so that expiry
/// decisions are deterministic under test; callers inject wall-clock time.
/// Mutations on one resource code are serialized through the map entry API
/// (a per-resource critical section); unrelated codes do not contend on a
/// global lock.
pub struct LeaseStore {
    leases: DashMap<InlineStr, Lease>,
    lease_ttl_ms: i64,
}

/// Outcome of an acquire attempt against the store.
#[derive(Debug)]
pub enum AcquireOutcome {
    Granted(Lease),
    Held(RemoteHolder),
}

impl LeaseStore {
    pub fn new(lease_ttl_ms: i64) -> Self {
        Self {
            leases: DashMap::new(),
            lease_ttl_ms,
        }
    }

    pub fn lease_ttl_ms(&self) -> i64 {
        self.lease_ttl_ms
    }

    /// Grants if no live lease exists for the code, or re-entrantly if the
    /// live lease already belongs to the requester (refreshes
    /// `last_renewed_at`, keeps `acquired_at`). An expired lease is replaced
    /// as if absent. First acquire wins; a denial never queues.
    pub fn try_acquire(
        &self,
        resource_code: &InlineStr,
        holder_id: &InlineStr,
        display_name: &InlineStr,
        now_ms: i64,
    ) -> AcquireOutcome {
        match self.leases.entry(resource_code.clone()) {
            Entry::Occupied(mut entry) => {
                let lease = entry.get_mut();
                if !lease.is_live(now_ms) {
                    Monitors::record_lease_expired(resource_code);
                    debug!(
                        "expired lease reclaimed on acquire, code: {}, previous holder: {}",
                        resource_code, lease.holder_id
                    );
                    let granted = Lease::grant(
                        resource_code.clone(),
                        holder_id.clone(),
                        display_name.clone(),
                        now_ms,
                        self.lease_ttl_ms,
                    );
                    *lease = granted.clone();
                    AcquireOutcome::Granted(granted)
                } else if lease.holder_id.eq(holder_id) {
                    // re-entrant acquire: never changes acquired_at
                    lease.last_renewed_at = now_ms;
                    AcquireOutcome::Granted(lease.clone())
                } else {
                    AcquireOutcome::Held(lease.owner())
                }
            }
            Entry::Vacant(entry) => {
                let granted = Lease::grant(
                    resource_code.clone(),
                    holder_id.clone(),
                    display_name.clone(),
                    now_ms,
                    self.lease_ttl_ms,
                );
                entry.insert(granted.clone());
                AcquireOutcome::Granted(granted)
            }
        }
    }

    /// Extends `last_renewed_at` for the holder's live lease. An expired
    /// lease is evicted and reported `NotFound` even to its own holder: once
    /// reclaimable it is gone for protocol purposes and must be re-acquired.
    pub fn renew(
        &self,
        resource_code: &InlineStr,
        holder_id: &InlineStr,
        now_ms: i64,
    ) -> RenewStatus {
        match self.leases.entry(resource_code.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_live(now_ms) {
                    Monitors::record_lease_expired(resource_code);
                    entry.remove();
                    RenewStatus::NotFound
                } else if !entry.get().holder_id.eq(holder_id) {
                    RenewStatus::NotOwner
                } else {
                    entry.get_mut().last_renewed_at = now_ms;
                    RenewStatus::Renewed
                }
            }
            Entry::Vacant(_) => RenewStatus::NotFound,
        }
    }

    /// Removes the lease if it is held by `holder_id`. Releasing an absent
    /// or foreign lease is a no-op, not an error.
    pub fn release(&self, resource_code: &InlineStr, holder_id: &InlineStr) -> bool {
        self.leases
            .remove_if(resource_code, |_, lease| lease.holder_id.eq(holder_id))
            .is_some()
    }

    /// Removes every lease of the holder, returning the released codes.
    /// Used by the connection-teardown sweep.
    pub fn release_all_by_holder(&self, holder_id: &InlineStr) -> Vec<InlineStr> {
        let candidates: Vec<InlineStr> = self
            .leases
            .iter()
            .filter(|entry| entry.value().holder_id.eq(holder_id))
            .map(|entry| entry.key().clone())
            .collect();

        let mut released = Vec::with_capacity(candidates.len());
        for code in candidates {
            // re-checked under the entry lock, the lease may have moved on
            if self
                .leases
                .remove_if(&code, |_, lease| lease.holder_id.eq(holder_id))
                .is_some()
            {
                released.push(code);
            }
        }
        released
    }

    /// Snapshot of all live leases. Expired entries are lazily evicted here
    /// rather than by a dedicated sweep thread, so callers must not rely on
    /// exact expiry timing beyond "at least TTL".
    pub fn live_leases(&self, now_ms: i64) -> LeaseTable {
        self.leases.retain(|code, lease| {
            let live = lease.is_live(now_ms);
            if !live {
                Monitors::record_lease_expired(code);
            }
            live
        });
        self.leases
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
