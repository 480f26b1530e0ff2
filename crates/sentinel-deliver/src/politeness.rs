use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;

/// Per-host FIFO pacing: a `Mutex` guards the read/update/sleep critical
/// section so two concurrent targets on the same host queue strictly in
/// arrival order. Each host's mutex lives behind its own `Arc` so the
/// `DashMap` shard guard never has to be held across an `.await`.
pub struct PolitenessGate {
    next_allowed_at: DashMap<String, Arc<Mutex<Instant>>>,
}

impl Default for PolitenessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PolitenessGate {
    pub fn new() -> Self {
        PolitenessGate {
            next_allowed_at: DashMap::new(),
        }
    }

    /// `waitForPoliteness(url, delay, jitter)`. With `delay == 0` returns
    /// immediately without touching the host's entry.
    pub async fn wait(&self, host: &str, delay: Duration, jitter: Duration) {
        if delay.is_zero() {
            return;
        }

        let mutex = {
            let entry = self
                .next_allowed_at
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Instant::now())));
            entry.value().clone()
        };
        let mut next_allowed = mutex.lock().await;

        let now = Instant::now();
        if *next_allowed > now {
            tokio::time::sleep(*next_allowed - now).await;
        }

        let jitter_ms = if jitter.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter.as_millis() as u64)
        };
        *next_allowed = Instant::now() + delay + Duration::from_millis(jitter_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_does_not_block() {
        let gate = PolitenessGate::new();
        let start = Instant::now();
        gate.wait("example.com", Duration::ZERO, Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn consecutive_waits_are_spaced_by_delay() {
        let gate = PolitenessGate::new();
        let delay = Duration::from_millis(100);
        gate.wait("example.com", delay, Duration::ZERO).await;
        let start = Instant::now();
        gate.wait("example.com", delay, Duration::ZERO).await;
        assert!(start.elapsed() >= delay - Duration::from_millis(5));
    }

    #[tokio::test]
    async fn different_hosts_do_not_serialize() {
        let gate = PolitenessGate::new();
        let delay = Duration::from_millis(200);
        gate.wait("a.example.com", delay, Duration::ZERO).await;
        let start = Instant::now();
        gate.wait("b.example.com", delay, Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
