use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// A time-bounded exclusive claim on a resource code. At most one live lease
/// exists per `resource_code`; a lease is live iff
/// `now - last_renewed_at < lease_ttl_ms`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub resource_code: InlineStr,
    pub holder_id: InlineStr,
    pub holder_display_name: InlineStr,
    /// Time when the lease was first granted. Never changed by renewal or
    /// re-entrant acquire.
    pub acquired_at: i64,
    /// Time of the most recent heartbeat.
    pub last_renewed_at: i64,
    /// Maximum silence interval before the lease is reclaimable.
    pub lease_ttl_ms: i64,
}

impl Lease {
    pub fn grant(
        resource_code: InlineStr,
        holder_id: InlineStr,
        holder_display_name: InlineStr,
        now_ms: i64,
        lease_ttl_ms: i64,
    ) -> Self {
        Self {
            resource_code,
            holder_id,
            holder_display_name,
            acquired_at: now_ms,
            last_renewed_at: now_ms,
            lease_ttl_ms,
        }
    }

    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms - self.last_renewed_at < self.lease_ttl_ms
    }

    pub fn owner(&self) -> RemoteHolder {
        RemoteHolder {
            holder_id: self.holder_id.clone(),
            holder_display_name: self.holder_display_name.clone(),
        }
    }
}

/// Identity of the party holding a lease, as surfaced to other clients
/// (denial replies, cache entries, "who is editing" panels).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHolder {
    pub holder_id: InlineStr,
    pub holder_display_name: InlineStr,
}

/// The `resource_code -> Lease` mapping at a point in time.
pub type LeaseTable = HashMap<InlineStr, Lease>;
