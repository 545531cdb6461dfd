//! Storage port for in-flight session state.
//!
//! Sessions are plain values. Callers that change a session go through
//! `update`, which holds the session exclusively for the whole step, so two
//! answers to the same session are applied one after the other. Dropping a
//! session is just `remove`. The engine never reaches for storage on its own.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

/// Load/save contract for session state keyed by session id.
pub trait SessionStore<S>: Send + Sync {
    fn load(&self, id: Uuid) -> Option<S>;
    fn save(&self, id: Uuid, session: S);
    fn remove(&self, id: Uuid) -> Option<S>;

    /// Run `f` on the stored session with exclusive access.
    ///
    /// Returns `None` when no session is stored under `id`.
    fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut S) -> R) -> Option<R>
    where
        Self: Sized;
}

/// Process-local store backed by a hash map.
#[derive(Debug)]
pub struct MemorySessionStore<S> {
    sessions: RwLock<HashMap<Uuid, S>>,
}

impl<S> MemorySessionStore<S> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Collect `f` over every stored session.
    pub fn filter_map<R>(&self, mut f: impl FnMut(Uuid, &S) -> Option<R>) -> Vec<R> {
        self.sessions
            .read()
            .iter()
            .filter_map(|(&id, session)| f(id, session))
            .collect()
    }

    /// Drop every session that matches `predicate`, returning how many went.
    pub fn evict(&self, mut predicate: impl FnMut(&S) -> bool) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !predicate(session));
        before - sessions.len()
    }
}

impl<S> Default for MemorySessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Send + Sync> SessionStore<S> for MemorySessionStore<S> {
    fn load(&self, id: Uuid) -> Option<S> {
        self.sessions.read().get(&id).cloned()
    }

    fn save(&self, id: Uuid, session: S) {
        self.sessions.write().insert(id, session);
    }

    fn remove(&self, id: Uuid) -> Option<S> {
        self.sessions.write().remove(&id)
    }

    fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.sessions.write().get_mut(&id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_save_remove() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.load(id), None);

        store.save(id, 1u32);
        store.save(id, 2u32);
        assert_eq!(store.load(id), Some(2));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(id), Some(2));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict() {
        let store = MemorySessionStore::new();
        for i in 0..10u32 {
            store.save(Uuid::new_v4(), i);
        }
        assert_eq!(store.evict(|n| n % 2 == 0), 5);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_update_in_place() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.update(id, |n: &mut u32| *n), None);

        store.save(id, 1u32);
        assert_eq!(store.update(id, |n| std::mem::replace(n, 5)), Some(1));
        assert_eq!(store.load(id), Some(5));
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let store = std::sync::Arc::new(MemorySessionStore::new());
        let id = Uuid::new_v4();
        store.save(id, Vec::<u32>::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.update(id, |v| v.push(t * 100 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load(id).map(|v| v.len()), Some(800));
    }

    #[test]
    fn test_filter_map() {
        let store = MemorySessionStore::new();
        let even = Uuid::new_v4();
        store.save(even, 2u32);
        store.save(Uuid::new_v4(), 3u32);
        assert_eq!(store.filter_map(|id, n| (n % 2 == 0).then_some(id)), vec![even]);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let store: Box<dyn SessionStore<String>> = Box::new(MemorySessionStore::new());
        let id = Uuid::new_v4();
        store.save(id, "session".to_string());
        assert_eq!(store.load(id).as_deref(), Some("session"));
    }
}
