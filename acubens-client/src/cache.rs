use acubens_common::prelude::*;
use acubens_common::{LeaseTable, LockEvent, RemoteHolder};

/// The client's best-known approximation of the coordinator's lease table,
/// plus the at most one resource the client believes it holds itself.
///
/// The cache is allowed to be stale and is advisory for UI only; the
/// coordinator remains the source of truth for admission. Local ownership
/// is sticky: an echo of the client's own acquire never revokes it, only
/// an event naming a different holder (or releasing the resource) does.
pub struct ClientLockCache {
    holder_id: InlineStr,
    remote: HashMap<InlineStr, RemoteHolder>,
    owned: Option<InlineStr>,
}

/// What applying an event did to the cache.
#[derive(Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Unchanged,
    Updated,
    /// The event revoked the locally-owned resource (named a different
    /// holder for it, or released it server-side).
    OwnershipRevoked(InlineStr),
}

impl ClientLockCache {
    pub fn new(holder_id: InlineStr) -> Self {
        Self {
            holder_id,
            remote: HashMap::default(),
            owned: None,
        }
    }

    pub fn owned(&self) -> Option<&InlineStr> {
        self.owned.as_ref()
    }

    pub fn set_owned(&mut self, resource_code: InlineStr) {
        self.remote.remove(&resource_code);
        self.owned = Some(resource_code);
    }

    pub fn clear_owned(&mut self) -> Option<InlineStr> {
        self.owned.take()
    }

    pub fn note_remote(&mut self, resource_code: InlineStr, owner: RemoteHolder) {
        self.remote.insert(resource_code, owner);
    }

    pub fn remote_holder(&self, resource_code: &InlineStr) -> Option<&RemoteHolder> {
        self.remote.get(resource_code)
    }

    pub fn clear(&mut self) {
        self.remote.clear();
        self.owned = None;
    }

    pub fn is_owned(&self, resource_code: &InlineStr) -> bool {
        self.owned.as_ref() == Some(resource_code)
    }

    pub fn locked_count(&self) -> usize {
        self.remote.len() + usize::from(self.owned.is_some())
    }

    /// Seed or wholesale-replace the mirror from a lease table snapshot.
    /// Local ownership survives only if the snapshot still shows this
    /// client holding it.
    pub fn replace_from_table(&mut self, leases: &LeaseTable) -> CacheOutcome {
        let revoked = match self.owned.take() {
            Some(code) => {
                let still_ours = leases
                    .get(&code)
                    .map(|lease| lease.holder_id == self.holder_id)
                    .unwrap_or(false);
                if still_ours {
                    self.owned = Some(code);
                    None
                } else {
                    Some(code)
                }
            }
            None => None,
        };

        self.remote = leases
            .iter()
            .filter(|&(code, _)| self.owned.as_ref() != Some(code))
            .map(|(code, lease)| (code.clone(), lease.owner()))
            .collect();

        match revoked {
            Some(code) => CacheOutcome::OwnershipRevoked(code),
            None => CacheOutcome::Updated,
        }
    }

    /// Reconcile one push event into the mirror. Direct RPC replies and
    /// broadcast events can race; the rules here are last-writer-wins with
    /// the self-protection constraint described on the type.
    pub fn apply_event(&mut self, event: &LockEvent) -> CacheOutcome {
        match event {
            LockEvent::LockAcquired { lease } => {
                if self.is_owned(&lease.resource_code) {
                    if lease.holder_id == self.holder_id {
                        // echo of our own acquire; no flicker
                        return CacheOutcome::Unchanged;
                    }
                    // someone else now holds what we thought was ours
                    self.owned = None;
                    self.remote
                        .insert(lease.resource_code.clone(), lease.owner());
                    return CacheOutcome::OwnershipRevoked(lease.resource_code.clone());
                }
                self.remote
                    .insert(lease.resource_code.clone(), lease.owner());
                CacheOutcome::Updated
            }
            LockEvent::LockReleased { resource_code } => {
                if self.is_owned(resource_code) {
                    self.owned = None;
                    return CacheOutcome::OwnershipRevoked(resource_code.clone());
                }
                match self.remote.remove(resource_code) {
                    Some(_) => CacheOutcome::Updated,
                    None => CacheOutcome::Unchanged,
                }
            }
            LockEvent::LockStatusUpdate { leases } => self.replace_from_table(leases),
        }
    }
}

#[cfg(test)]
mod tests {
    use acubens_common::Lease;

    use super::*;

    fn lease(code: &str, holder: &str) -> Lease {
        Lease::grant(code.into(), holder.into(), holder.into(), 1_000, 30_000)
    }

    #[test]
    fn echo_of_own_acquire_is_ignored() {
        let mut cache = ClientLockCache::new("me".into());
        cache.set_owned("13-01".into());

        let outcome = cache.apply_event(&LockEvent::LockAcquired {
            lease: lease("13-01", "me"),
        });
        assert_eq!(outcome, CacheOutcome::Unchanged);
        assert!(cache.is_owned(&"13-01".into()));
    }

    #[test]
    fn foreign_acquire_of_owned_resource_revokes() {
        let mut cache = ClientLockCache::new("me".into());
        cache.set_owned("13-01".into());

        let outcome = cache.apply_event(&LockEvent::LockAcquired {
            lease: lease("13-01", "other"),
        });
        assert_eq!(outcome, CacheOutcome::OwnershipRevoked("13-01".into()));
        assert!(cache.owned().is_none());
        assert!(cache.remote_holder(&"13-01".into()).is_some());
    }

    #[test]
    fn release_of_owned_resource_revokes() {
        let mut cache = ClientLockCache::new("me".into());
        cache.set_owned("13-01".into());

        let outcome = cache.apply_event(&LockEvent::LockReleased {
            resource_code: "13-01".into(),
        });
        assert_eq!(outcome, CacheOutcome::OwnershipRevoked("13-01".into()));
    }

    #[test]
    fn snapshot_replaces_the_mirror_wholesale() {
        let mut cache = ClientLockCache::new("me".into());
        cache.note_remote("10-10".into(), lease("10-10", "stale").owner());
        cache.set_owned("13-01".into());

        let mut leases = LeaseTable::default();
        leases.insert("13-01".into(), lease("13-01", "me"));
        leases.insert("20-20".into(), lease("20-20", "other"));

        let outcome = cache.apply_event(&LockEvent::LockStatusUpdate { leases });
        assert_eq!(outcome, CacheOutcome::Updated);
        assert!(cache.is_owned(&"13-01".into()), "snapshot confirms ownership");
        assert!(cache.remote_holder(&"10-10".into()).is_none(), "stale entry gone");
        assert!(cache.remote_holder(&"20-20".into()).is_some());
    }

    #[test]
    fn snapshot_missing_the_owned_resource_revokes() {
        let mut cache = ClientLockCache::new("me".into());
        cache.set_owned("13-01".into());

        let outcome = cache.apply_event(&LockEvent::LockStatusUpdate {
            leases: LeaseTable::default(),
        });
        assert_eq!(outcome, CacheOutcome::OwnershipRevoked("13-01".into()));
    }
}
