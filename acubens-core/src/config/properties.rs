use acubens_common::prelude::*;
use acubens_common::EnvUtils;

pub struct Properties {
    /// Address the RPC and event surface binds to.
    pub bind_addr: InlineStr,
    /// The silence interval after which a lease is reclaimable, absent
    /// renewal. Three missed heartbeats at the default client interval.
    /// MILLISECONDS
    pub lease_ttl_ms: i64,
    /// Capacity of the event fan-out channel. An observer lagging past this
    /// many events misses them and is healed by the next snapshot push.
    pub event_channel_capacity: usize,
}

impl Properties {
    pub fn from_env() -> Self {
        let defaults = Properties::default();
        Self {
            bind_addr: EnvUtils::str_var("ACU_BIND_ADDR", &defaults.bind_addr),
            lease_ttl_ms: EnvUtils::i64_var("ACU_LEASE_TTL_MS", defaults.lease_ttl_ms),
            event_channel_capacity: EnvUtils::i64_var(
                "ACU_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity as i64,
            ) as usize,
        }
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            lease_ttl_ms: 90 * 1000, // 90s
            event_channel_capacity: 256,
        }
    }
}
