use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

use super::{Lease, LeaseTable, RemoteHolder};
use crate::prelude::*;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub resource_code: InlineStr,
    pub holder_id: InlineStr,
    pub display_name: InlineStr,
}

/// Reply to an acquire. Granted carries the lease; denied carries the
/// current owner so the caller can render "locked by X".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcquireReply {
    pub ok: bool,
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<RemoteHolder>,
}

impl AcquireReply {
    pub fn granted(lease: Lease) -> Self {
        Self {
            ok: true,
            granted: true,
            lease: Some(lease),
            owner: None,
        }
    }

    pub fn denied(owner: RemoteHolder) -> Self {
        Self {
            ok: false,
            granted: false,
            lease: None,
            owner: Some(owner),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenewRequest {
    pub resource_code: InlineStr,
    pub holder_id: InlineStr,
    /// Client-side send time, recorded as the heartbeat instant.
    pub timestamp: i64,
}

/// `NotOwner` signals that the lease was reclaimed and reassigned or
/// released since the last renewal; the caller must stop treating the
/// resource as locally owned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenewStatus {
    Renewed,
    NotFound,
    NotOwner,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenewReply {
    pub ok: bool,
    pub status: RenewStatus,
}

impl RenewReply {
    pub fn new(status: RenewStatus) -> Self {
        Self {
            ok: status == RenewStatus::Renewed,
            status,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub resource_code: InlineStr,
    pub holder_id: InlineStr,
}

/// Release is idempotent: `released` is false when nothing matching was
/// found, which is not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseReply {
    pub ok: bool,
    pub released: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusReply {
    pub ok: bool,
    pub leases: LeaseTable,
}
