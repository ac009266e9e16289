//! Single-flight coordination: at most one concurrent acquisition per
//! cache key.
//!
//! The first requester to register under a key becomes the leader and does
//! the fetch; followers wait on the leader's completion signal with a
//! bounded timeout, then re-read the cache. The leader's guard completes
//! the signal and removes the entry on every exit path, including panics,
//! so a failed leader can never strand its followers; a follower that
//! wakes to a cache miss re-enters the election, and exactly one of the
//! waiters takes over the vacated key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

/// Role handed to a requester that missed the cache.
pub enum FlightRole {
    /// This requester performs the acquisition; completion is signaled
    /// when the guard drops.
    Leader(FlightGuard),

    /// Another requester is already acquiring; wait on the receiver.
    Follower(watch::Receiver<bool>),
}

/// RAII handle held by the leader for the duration of one acquisition.
pub struct FlightGuard {
    key: String,
    map: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let sender = {
            let mut map = self.map.lock().expect("inflight map lock poisoned");
            map.remove(&self.key)
        };
        if let Some(sender) = sender {
            let _ = sender.send(true);
        }
    }
}

/// One in-flight map, keyed by cache key.
#[derive(Clone, Default)]
pub struct SingleFlight {
    entries: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `key`. Exactly one concurrent caller per key becomes
    /// the leader.
    pub fn join(&self, key: &str) -> FlightRole {
        let mut map = self.entries.lock().expect("inflight map lock poisoned");
        if let Some(sender) = map.get(key) {
            return FlightRole::Follower(sender.subscribe());
        }

        let (tx, _rx) = watch::channel(false);
        map.insert(key.to_string(), tx);
        FlightRole::Leader(FlightGuard {
            key: key.to_string(),
            map: Arc::clone(&self.entries),
        })
    }

    /// Number of acquisitions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.entries.lock().expect("inflight map lock poisoned").len()
    }
}

/// Wait for the leader to finish, up to `wait`. Returns `true` when the
/// leader completed within the window.
pub async fn wait_for_leader(mut rx: watch::Receiver<bool>, wait: Duration) -> bool {
    tokio::time::timeout(wait, rx.wait_for(|done| *done))
        .await
        .map(|res| res.is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_join_is_leader_followers_after() {
        let flights = SingleFlight::new();
        let first = flights.join("key");
        assert!(matches!(first, FlightRole::Leader(_)));

        let second = flights.join("key");
        assert!(matches!(second, FlightRole::Follower(_)));
        assert_eq!(flights.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_leaders() {
        let flights = SingleFlight::new();
        assert!(matches!(flights.join("a"), FlightRole::Leader(_)));
        assert!(matches!(flights.join("b"), FlightRole::Leader(_)));
        assert_eq!(flights.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_leader_completion_wakes_follower() {
        let flights = SingleFlight::new();
        let FlightRole::Leader(guard) = flights.join("key") else {
            panic!("expected leader");
        };
        let FlightRole::Follower(rx) = flights.join("key") else {
            panic!("expected follower");
        };

        let waiter = tokio::spawn(wait_for_leader(rx, Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(guard);

        assert!(waiter.await.unwrap());
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_follower_times_out_when_leader_hangs() {
        let flights = SingleFlight::new();
        let FlightRole::Leader(_guard) = flights.join("key") else {
            panic!("expected leader");
        };
        let FlightRole::Follower(rx) = flights.join("key") else {
            panic!("expected follower");
        };

        assert!(!wait_for_leader(rx, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_entry_removed_when_leader_panics() {
        let flights = SingleFlight::new();
        let flights2 = flights.clone();

        let handle = tokio::spawn(async move {
            let _guard = match flights2.join("key") {
                FlightRole::Leader(guard) => guard,
                FlightRole::Follower(_) => panic!("expected leader"),
            };
            panic!("leader died");
        });
        assert!(handle.await.is_err());

        // No zombie entry: the next requester can lead again.
        assert_eq!(flights.in_flight(), 0);
        assert!(matches!(flights.join("key"), FlightRole::Leader(_)));
    }
}
