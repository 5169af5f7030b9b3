//! Named per-channel throughput gates.
//!
//! The provider has a sustainable requests/second ceiling; every
//! dispatch unit waits on its channel's gate before the provider call
//! rather than trusting caller-side pacing.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, RwLock},
};

type Gate = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub struct ChannelLimiter {
    gates: RwLock<HashMap<&'static str, Arc<Gate>>>,
    rates: HashMap<&'static str, u32>,
    default_per_second: u32,
}

impl ChannelLimiter {
    pub fn new(rates: HashMap<&'static str, u32>, default_per_second: u32) -> Self {
        Self {
            gates: RwLock::new(HashMap::new()),
            rates,
            default_per_second: default_per_second.max(1),
        }
    }

    fn get_or_create(&self, channel: &'static str) -> Arc<Gate> {
        {
            let gates = self.gates.read().unwrap();
            if let Some(gate) = gates.get(channel) {
                return gate.clone();
            }
        }

        let mut gates = self.gates.write().unwrap();
        // Double-check in case another task created it
        if let Some(gate) = gates.get(channel) {
            return gate.clone();
        }

        let per_second = *self.rates.get(channel).unwrap_or(&self.default_per_second);
        let quota = Quota::per_second(
            NonZeroU32::new(per_second).unwrap_or_else(|| NonZeroU32::new(1).unwrap()),
        );
        let gate = Arc::new(RateLimiter::direct(quota));
        gates.insert(channel, gate.clone());
        gate
    }

    /// Wait until the channel's gate admits one more call.
    pub async fn acquire(&self, channel: &'static str) {
        self.get_or_create(channel).until_ready().await;
    }
}

impl std::fmt::Debug for ChannelLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelLimiter")
            .field("default_per_second", &self.default_per_second)
            .field("active_gates", &self.gates.read().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_acquire_is_immediate_under_quota() {
        let limiter = ChannelLimiter::new(HashMap::from([("sms", 100)]), 10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("sms").await;
        }
        assert!(start.elapsed().as_millis() < 200);
    }

    #[tokio::test]
    async fn test_unknown_channel_uses_default_rate() {
        let limiter = ChannelLimiter::new(HashMap::new(), 50);
        limiter.acquire("email").await;
        assert_eq!(limiter.gates.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gate_throttles_beyond_burst() {
        // 2/s quota admits a burst of 2, then the third waits.
        let limiter = ChannelLimiter::new(HashMap::from([("sms", 2)]), 2);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire("sms").await;
        }
        assert!(start.elapsed().as_millis() >= 300);
    }
}
