use acubens_common::prelude::*;

/// Recording points for coordinator activity. Kept as a log-only facade; a
/// metrics backend can be wired in here without touching the call sites.
pub struct Monitors;

impl Monitors {
    pub fn record_lock_granted(resource_code: &str) {
        trace!("monitor: lock_granted, code: {}", resource_code);
    }

    pub fn record_lock_denied(resource_code: &str) {
        trace!("monitor: lock_denied, code: {}", resource_code);
    }

    pub fn record_lock_released(resource_code: &str) {
        trace!("monitor: lock_released, code: {}", resource_code);
    }

    pub fn record_lease_expired(resource_code: &str) {
        trace!("monitor: lease_expired, code: {}", resource_code);
    }

    pub fn record_renew_rejected(resource_code: &str, status: &str) {
        trace!(
            "monitor: renew_rejected, code: {}, status: {}",
            resource_code,
            status
        );
    }

    pub fn record_holder_sweep(holder_id: &str, count: usize) {
        trace!(
            "monitor: holder_sweep, holder: {}, count: {}",
            holder_id,
            count
        );
    }
}
