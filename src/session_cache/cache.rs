use crate::domain_port::Clock;
use crate::logger::*;
use crate::session_cache::SessionCacheConfig;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSession<I, S> {
    pub identity: I,
    pub session: S,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<I, S> CachedSession<I, S> {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Holds at most one [`CachedSession`]. Writes replace, expired reads evict.
pub struct SessionCache<I, S> {
    slot: Mutex<Option<CachedSession<I, S>>>,
    validity_window: chrono::Duration,
    config: SessionCacheConfig,
    clock: Arc<dyn Clock>,
}

impl<I, S> SessionCache<I, S>
where
    I: Clone,
    S: Clone,
{
    pub fn new(config: SessionCacheConfig, clock: Arc<dyn Clock>) -> Self {
        // Windows beyond chrono's range never expire in practice.
        let validity_window =
            chrono::Duration::from_std(config.validity_window).unwrap_or(chrono::Duration::MAX);
        Self {
            slot: Mutex::new(None),
            validity_window,
            config,
            clock,
        }
    }

    pub fn validity_window(&self) -> Duration {
        self.config.validity_window
    }

    pub fn set(&self, identity: I, session: S) {
        let captured_at = self.clock.now();
        let expires_at = captured_at
            .checked_add_signed(self.validity_window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut slot = self.lock();
        if slot.is_some() {
            trace!("session cache entry replaced");
        }
        *slot = Some(CachedSession {
            identity,
            session,
            captured_at,
            expires_at,
        });
        debug!(%expires_at, "session cached");
    }

    pub fn get(&self) -> Option<CachedSession<I, S>> {
        let now = self.clock.now();
        let mut slot = self.lock();
        let entry = Self::read_fresh(&mut slot, now).cloned();
        if entry.is_some() {
            trace!("session cache hit");
        }
        entry
    }

    pub fn clear(&self) {
        if self.lock().take().is_some() {
            debug!("session cache cleared");
        }
    }

    /// Same answer as `get().is_some()`, including eviction of an expired entry.
    pub fn is_valid(&self) -> bool {
        let now = self.clock.now();
        let mut slot = self.lock();
        Self::read_fresh(&mut slot, now).is_some()
    }

    /// Evicts the entry if it is stale at `now`, then returns what is left.
    fn read_fresh(
        slot: &mut Option<CachedSession<I, S>>,
        now: DateTime<Utc>,
    ) -> Option<&CachedSession<I, S>> {
        if let Some(entry) = slot.as_ref() {
            if !entry.is_fresh_at(now) {
                debug!(expired_at = %entry.expires_at, "session cache entry expired, evicting");
                *slot = None;
            }
        }
        slot.as_ref()
    }

    // The slot holds plain data, so a panic elsewhere cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, Option<CachedSession<I, S>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_port::ManualClock;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Identity {
        id: &'static str,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Token {
        token: &'static str,
    }

    fn fixture() -> (Arc<ManualClock>, SessionCache<Identity, Token>) {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let cache = SessionCache::new(SessionCacheConfig::default(), clock.clone());
        (clock, cache)
    }

    fn u1() -> (Identity, Token) {
        (Identity { id: "u1" }, Token { token: "t1" })
    }

    fn u2() -> (Identity, Token) {
        (Identity { id: "u2" }, Token { token: "t2" })
    }

    #[test]
    fn starts_empty() {
        let (_, cache) = fixture();
        assert!(cache.get().is_none());
        assert!(!cache.is_valid());
    }

    #[test]
    fn entry_is_served_just_before_window_ends() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity.clone(), token.clone());

        clock.advance(Duration::from_millis(299_999));
        let entry = cache.get().expect("entry should still be fresh");
        assert_eq!(entry.identity, identity);
        assert_eq!(entry.session, token);
    }

    #[test]
    fn entry_is_served_at_exact_expiry() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity, token);

        clock.advance(Duration::from_millis(300_000));
        assert!(cache.get().is_some());
    }

    #[test]
    fn entry_expires_after_window_and_is_evicted() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity, token);

        clock.advance(Duration::from_millis(300_001));
        assert!(cache.get().is_none());
        assert!(cache.is_empty());

        // Rewinding the clock does not resurrect an evicted entry.
        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert!(cache.get().is_none());
    }

    #[test]
    fn later_set_replaces_earlier_one() {
        let (_, cache) = fixture();
        let (i1, s1) = u1();
        let (i2, s2) = u2();
        cache.set(i1, s1);
        cache.set(i2.clone(), s2.clone());

        let entry = cache.get().expect("entry");
        assert_eq!(entry.identity, i2);
        assert_eq!(entry.session, s2);
    }

    #[test]
    fn set_restarts_the_window() {
        let (clock, cache) = fixture();
        let (i1, s1) = u1();
        let (i2, s2) = u2();
        cache.set(i1, s1);
        clock.advance(Duration::from_secs(200));
        cache.set(i2.clone(), s2);
        clock.advance(Duration::from_secs(200));

        let entry = cache.get().expect("second entry should still be fresh");
        assert_eq!(entry.identity, i2);
        assert_eq!(
            entry.expires_at,
            DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(500)
        );
    }

    #[test]
    fn clear_drops_entry_regardless_of_age() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity, token);
        cache.clear();

        clock.advance(Duration::from_millis(1));
        assert!(cache.get().is_none());
        assert!(!cache.is_valid());
    }

    #[test]
    fn repeated_misses_leave_cache_empty() {
        let (_, cache) = fixture();
        assert!(cache.get().is_none());
        assert!(cache.get().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn is_valid_agrees_with_get_and_evicts() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity, token);
        assert!(cache.is_valid());
        assert!(!cache.is_empty());

        clock.advance(Duration::from_millis(300_001));
        assert!(!cache.is_valid());
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_read_through_is_valid_evicts_for_get_too() {
        let (clock, cache) = fixture();
        let (identity, token) = u1();
        cache.set(identity, token);

        clock.advance(Duration::from_millis(300_001));
        assert!(!cache.is_valid());

        // Back inside the old window: the entry is already gone.
        clock.set(DateTime::<Utc>::UNIX_EPOCH);
        assert!(cache.get().is_none());
    }

    #[test]
    fn window_comes_from_config() {
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let cache: SessionCache<Identity, Token> =
            SessionCache::new(SessionCacheConfig::from_millis(1_000), clock.clone());
        assert_eq!(cache.validity_window(), Duration::from_secs(1));

        let (identity, token) = u1();
        cache.set(identity, token);
        clock.advance(Duration::from_millis(1_000));
        assert!(cache.is_valid());
        clock.advance(Duration::from_millis(1));
        assert!(!cache.is_valid());
    }

    #[test]
    fn captured_at_records_set_time() {
        let (clock, cache) = fixture();
        clock.advance(Duration::from_secs(42));
        let (identity, token) = u1();
        cache.set(identity, token);

        let entry = cache.get().expect("entry");
        assert_eq!(
            entry.captured_at,
            DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::seconds(42)
        );
        assert_eq!(entry.expires_at - entry.captured_at, chrono::Duration::minutes(5));
    }

    #[test]
    fn shared_across_threads() {
        let (_, cache) = fixture();
        let cache = Arc::new(cache);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let (identity, token) = u1();
                    cache.set(identity, token);
                    cache.get().is_some()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("thread panicked"));
        }
        assert_eq!(cache.get().map(|e| e.identity), Some(Identity { id: "u1" }));
    }
}
