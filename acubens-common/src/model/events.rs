use serde::{Deserialize, Serialize};

use super::{Lease, LeaseTable};
use crate::prelude::*;

/// Push event fanned out to every connected observer on a lease-table
/// change. `LockStatusUpdate` replaces the observer's cache outright and is
/// sent on (re)connect and on-demand resynchronization, healing any missed
/// incremental events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LockEvent {
    LockAcquired { lease: Lease },
    LockReleased { resource_code: InlineStr },
    LockStatusUpdate { leases: LeaseTable },
}

impl LockEvent {
    /// The resource this event is about, if it names a single one.
    pub fn resource_code(&self) -> Option<&InlineStr> {
        match self {
            LockEvent::LockAcquired { lease } => Some(&lease.resource_code),
            LockEvent::LockReleased { resource_code } => Some(resource_code),
            LockEvent::LockStatusUpdate { .. } => None,
        }
    }
}
