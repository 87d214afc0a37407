use acubens_common::prelude::*;
use acubens_common::EnvUtils;

pub struct ClientProperties {
    /// Fixed interval between heartbeats for the locally-held lease.
    /// MILLISECONDS
    pub heartbeat_interval_ms: i64,
    /// Consecutive renewal transport failures tolerated before local
    /// ownership is downgraded. An explicit not_owner downgrades at once.
    pub renew_failure_threshold: u32,
}

impl ClientProperties {
    pub fn from_env() -> Self {
        let defaults = ClientProperties::default();
        Self {
            heartbeat_interval_ms: EnvUtils::i64_var(
                "ACU_HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval_ms,
            ),
            renew_failure_threshold: EnvUtils::i64_var(
                "ACU_RENEW_FAILURE_THRESHOLD",
                defaults.renew_failure_threshold as i64,
            ) as u32,
        }
    }
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30 * 1000, // 30s
            renew_failure_threshold: 3,
        }
    }
}
