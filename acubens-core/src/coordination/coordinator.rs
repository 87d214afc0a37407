use acubens_common::prelude::*;
use acubens_common::{
    AcquireReply, AcquireRequest, LockEvent, ReleaseReply, ReleaseRequest, RenewReply,
    RenewRequest, RenewStatus, StatusReply,
};
use chrono::Utc;

use super::{AcquireOutcome, EventPublisher, LeaseStore};
use crate::config::Properties;
use crate::metrics::Monitors;

/// The authoritative lock coordinator: validates requests, serializes
/// mutations through the lease store and publishes change events to all
/// observers. Events are published after the store mutation is applied and
/// before the reply is returned, so other clients observe a change no later
/// than the caller does.
pub struct LockCoordinator {
    store: LeaseStore,
    events: EventPublisher,
}

impl LockCoordinator {
    pub fn new(properties: &Properties) -> Self {
        Self {
            store: LeaseStore::new(properties.lease_ttl_ms),
            events: EventPublisher::new(properties.event_channel_capacity),
        }
    }

    pub fn acquire(&self, request: AcquireRequest) -> AcuResult<AcquireReply> {
        Self::validate(&request.resource_code, &request.holder_id)?;

        let now_ms = Utc::now().timestamp_millis();
        match self.store.try_acquire(
            &request.resource_code,
            &request.holder_id,
            &request.display_name,
            now_ms,
        ) {
            AcquireOutcome::Granted(lease) => {
                debug!(
                    "lock granted, code: {}, holder: {}",
                    request.resource_code, request.holder_id
                );
                Monitors::record_lock_granted(&request.resource_code);
                self.events.publish(LockEvent::LockAcquired {
                    lease: lease.clone(),
                });
                Ok(AcquireReply::granted(lease))
            }
            AcquireOutcome::Held(owner) => {
                debug!(
                    "lock denied, code: {}, requester: {}, held by: {}",
                    request.resource_code, request.holder_id, owner.holder_id
                );
                Monitors::record_lock_denied(&request.resource_code);
                Ok(AcquireReply::denied(owner))
            }
        }
    }

    /// Renewals are high-frequency and not interesting to other observers,
    /// so a successful renew is never re-broadcast.
    pub fn renew(&self, request: RenewRequest) -> AcuResult<RenewReply> {
        Self::validate(&request.resource_code, &request.holder_id)?;

        let now_ms = Utc::now().timestamp_millis();
        let skew_ms = now_ms - request.timestamp;
        if skew_ms.abs() > self.store.lease_ttl_ms() {
            warn!(
                "renewal clock skew exceeds lease ttl, code: {}, holder: {}, skew: {}ms",
                request.resource_code, request.holder_id, skew_ms
            );
        }

        let status = self
            .store
            .renew(&request.resource_code, &request.holder_id, now_ms);
        if status != RenewStatus::Renewed {
            info!(
                "renewal rejected, code: {}, holder: {}, status: {}",
                request.resource_code,
                request.holder_id,
                status.as_ref()
            );
            Monitors::record_renew_rejected(&request.resource_code, status.as_ref());
        }
        Ok(RenewReply::new(status))
    }

    pub fn release(&self, request: ReleaseRequest) -> AcuResult<ReleaseReply> {
        Self::validate(&request.resource_code, &request.holder_id)?;

        let released = self
            .store
            .release(&request.resource_code, &request.holder_id);
        if released {
            debug!(
                "lock released, code: {}, holder: {}",
                request.resource_code, request.holder_id
            );
            Monitors::record_lock_released(&request.resource_code);
            self.events.publish(LockEvent::LockReleased {
                resource_code: request.resource_code,
            });
        }
        Ok(ReleaseReply { ok: true, released })
    }

    /// Full lease table of live leases, lazily evicting the expired.
    pub fn status(&self) -> StatusReply {
        let now_ms = Utc::now().timestamp_millis();
        StatusReply {
            ok: true,
            leases: self.store.live_leases(now_ms),
        }
    }

    /// Resynchronization event letting clients replace their cache outright
    /// rather than apply incremental diffs. Pushed on observer (re)connect.
    pub fn full_snapshot(&self) -> LockEvent {
        let now_ms = Utc::now().timestamp_millis();
        LockEvent::LockStatusUpdate {
            leases: self.store.live_leases(now_ms),
        }
    }

    /// Connection-teardown sweep: releases every lease of the holder and
    /// broadcasts each removal.
    pub fn release_all_by_holder(&self, holder_id: &InlineStr) -> Vec<InlineStr> {
        let released = self.store.release_all_by_holder(holder_id);
        if !released.is_empty() {
            info!(
                "holder sweep released {} leases, holder: {}",
                released.len(),
                holder_id
            );
            Monitors::record_holder_sweep(holder_id, released.len());
            for code in &released {
                self.events.publish(LockEvent::LockReleased {
                    resource_code: code.clone(),
                });
            }
        }
        released
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LockEvent> {
        self.events.subscribe()
    }

    fn validate(resource_code: &InlineStr, holder_id: &InlineStr) -> AcuResult<()> {
        if resource_code.is_empty() {
            return str_err!(IllegalArgument, "resource_code must not be empty");
        }
        if holder_id.is_empty() {
            return str_err!(IllegalArgument, "holder_id must not be empty");
        }
        Ok(())
    }
}
