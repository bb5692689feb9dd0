//! Per-source rate-limit cooldown tracking.
//!
//! No background timers: expiry is a pure time comparison checked lazily
//! on the next call attempt.

use crate::models::SourceId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks which sources are cooling down after a throttling signal.
///
/// Fetchers must consult `is_limited` before issuing any network call and
/// short-circuit with a "rate limited" quote while a cooldown is active.
#[derive(Debug)]
pub struct RateLimitTracker {
    cooldown: Duration,
    cooldown_until: Mutex<HashMap<SourceId, Instant>>,
}

impl RateLimitTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            cooldown_until: Mutex::new(HashMap::new()),
        }
    }

    /// Record a throttling signal; the source stays limited for the full
    /// cooldown window from now.
    pub fn record_limited(&self, source: SourceId) {
        let until = Instant::now() + self.cooldown;
        self.cooldown_until.lock().unwrap().insert(source, until);
        log::warn!(
            "{} rate limited, cooling down for {}s",
            source,
            self.cooldown.as_secs()
        );
    }

    /// True while the source is inside its cooldown window. Expired
    /// entries are cleared on the way out.
    pub fn is_limited(&self, source: SourceId) -> bool {
        let mut map = self.cooldown_until.lock().unwrap();
        match map.get(&source) {
            Some(until) if Instant::now() < *until => true,
            Some(_) => {
                map.remove(&source);
                log::info!("{} cooldown expired, calls resume", source);
                false
            }
            None => false,
        }
    }

    /// Time left in the source's cooldown window, if any.
    pub fn remaining(&self, source: SourceId) -> Option<Duration> {
        let map = self.cooldown_until.lock().unwrap();
        map.get(&source)
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlimited() {
        let tracker = RateLimitTracker::new(Duration::from_secs(3600));
        for source in SourceId::ALL {
            assert!(!tracker.is_limited(source));
            assert!(tracker.remaining(source).is_none());
        }
    }

    #[test]
    fn limited_after_signal_then_recovers() {
        let tracker = RateLimitTracker::new(Duration::from_millis(40));
        tracker.record_limited(SourceId::PokemonTcg);

        assert!(tracker.is_limited(SourceId::PokemonTcg));
        assert!(tracker.remaining(SourceId::PokemonTcg).is_some());
        // other sources unaffected
        assert!(!tracker.is_limited(SourceId::Ebay));

        std::thread::sleep(Duration::from_millis(60));
        assert!(!tracker.is_limited(SourceId::PokemonTcg));
        // expired entry was cleared
        assert!(tracker.remaining(SourceId::PokemonTcg).is_none());
    }

    #[test]
    fn repeated_signal_extends_cooldown() {
        let tracker = RateLimitTracker::new(Duration::from_millis(50));
        tracker.record_limited(SourceId::JustTcg);
        std::thread::sleep(Duration::from_millis(30));
        tracker.record_limited(SourceId::JustTcg);
        std::thread::sleep(Duration::from_millis(30));
        // second signal restarted the window
        assert!(tracker.is_limited(SourceId::JustTcg));
    }
}
