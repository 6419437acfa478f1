//! Thread-safe engine handle.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::MatchEngine;

/// Cloneable handle to one engine. Every call holds the lock for its full
/// duration, so a style mutation is never observed half-applied.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine(Arc<Mutex<MatchEngine>>);

impl SharedEngine {
    pub fn new(engine: MatchEngine) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut MatchEngine) -> R) -> R {
        f(&mut self.lock())
    }

    /// A panic inside a caller's closure or a host hook can leave the cache
    /// behind the index. On recovery the cache is dropped and rebuilt on
    /// demand; the index and injection order are kept.
    fn lock(&self) -> MutexGuard<'_, MatchEngine> {
        self.0.lock().unwrap_or_else(|poisoned| {
            let mut engine = poisoned.into_inner();
            log::warn!("Engine lock was poisoned; clearing the match cache");
            engine.invalidate_all();
            self.0.clear_poison();
            engine
        })
    }
}

impl From<MatchEngine> for SharedEngine {
    fn from(engine: MatchEngine) -> Self {
        Self::new(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Section, Style};
    use std::thread;

    #[test]
    fn test_concurrent_queries() {
        let shared = SharedEngine::default();
        shared
            .with(|engine| engine.on_style_created(Style::new(1, "all").with_section(Section::global("x{}"))))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let url = format!("https://t{t}.example/{i}");
                        let result = shared.with(|engine| engine.get_matches(&url));
                        assert!(result.sections.contains_key(&1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.with(|engine| engine.stats().misses), 200);
    }

    #[test]
    fn test_poisoned_lock_recovers() {
        let shared = SharedEngine::default();
        let clone = shared.clone();
        let _ = thread::spawn(move || {
            clone.with(|_| panic!("boom"));
        })
        .join();
        assert_eq!(shared.with(|engine| engine.stats().styles), 0);
    }

    #[test]
    fn test_poison_recovery_drops_stale_cache() {
        let shared = SharedEngine::default();
        shared.with(|engine| engine.get_matches("https://a.com/"));

        let clone = shared.clone();
        let _ = thread::spawn(move || {
            clone.with(|engine| {
                engine
                    .on_style_created(Style::new(1, "all").with_section(Section::global("x{}")))
                    .unwrap();
                engine.get_matches("https://b.com/");
                panic!("hook failed mid-update");
            });
        })
        .join();

        assert_eq!(shared.with(|engine| engine.stats().cached_urls), 0);
        let result = shared.with(|engine| engine.get_matches("https://a.com/"));
        assert!(result.sections.contains_key(&1));
        assert_eq!(shared.with(|engine| engine.stats()).styles, 1);
    }
}
