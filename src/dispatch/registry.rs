//! Filter registry and frame publication.
//!
//! Filters run synchronously, in registration order, on the reader's thread.
//! Each one receives the frame as left by the previous filter and returns
//! either a frame for the next filter or `None` to stop the chain.
//!
//! `publish` holds the registry lock for the whole chain, so registration and
//! iteration never interleave. A filter must therefore not block, and must not
//! register or unregister filters itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::protocol::Frame;

/// Trait for frame filters.
pub trait Filter: Send + Sync + 'static {
    /// Inspect a frame; return it (possibly rewritten) or `None` to veto it.
    fn filter(&self, frame: Frame) -> Option<Frame>;
}

impl<F> Filter for F
where
    F: Fn(Frame) -> Option<Frame> + Send + Sync + 'static,
{
    fn filter(&self, frame: Frame) -> Option<Frame> {
        self(frame)
    }
}

/// Identifier handed out at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u64);

/// Entry for a registered filter.
struct FilterEntry {
    id: FilterId,
    filter: Box<dyn Filter>,
}

struct Inner {
    /// Filters in registration order.
    filters: Mutex<Vec<FilterEntry>>,
    /// Next filter ID to assign.
    next_id: AtomicU64,
}

/// Ordered, thread-safe set of frame filters.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                filters: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn filters(&self) -> MutexGuard<'_, Vec<FilterEntry>> {
        // A panicking filter must not take frame delivery down with it.
        self.inner
            .filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a filter to the end of the chain.
    pub fn register<F: Filter>(&self, filter: F) -> FilterId {
        let id = FilterId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.filters().push(FilterEntry {
            id,
            filter: Box::new(filter),
        });
        tracing::trace!("Registered filter {:?}", id);
        id
    }

    /// Register a filter that is removed again when the guard drops.
    pub fn register_scoped<F: Filter>(&self, filter: F) -> FilterGuard {
        FilterGuard {
            dispatcher: self.clone(),
            id: Some(self.register(filter)),
        }
    }

    /// Remove a filter. Returns `false` if it was not registered.
    pub fn unregister(&self, id: FilterId) -> bool {
        let mut filters = self.filters();
        let before = filters.len();
        filters.retain(|entry| entry.id != id);
        let removed = filters.len() != before;
        if removed {
            tracing::trace!("Unregistered filter {:?}", id);
        }
        removed
    }

    /// Run `frame` through every filter in registration order.
    ///
    /// Returns what came out of the last filter, or `None` if one vetoed it.
    pub fn publish(&self, frame: Frame) -> Option<Frame> {
        let filters = self.filters();
        let mut frame = frame;
        for entry in filters.iter() {
            frame = entry.filter.filter(frame)?;
        }
        Some(frame)
    }

    /// Number of registered filters.
    pub fn len(&self) -> usize {
        self.filters().len()
    }

    /// Check if no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.filters().is_empty()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that unregisters its filter on drop.
///
/// Ensures a filter scoped to one exchange is removed on every exit path,
/// including early returns and panics.
pub struct FilterGuard {
    dispatcher: Dispatcher,
    id: Option<FilterId>,
}

impl FilterGuard {
    /// The guarded filter's ID.
    pub fn id(&self) -> Option<FilterId> {
        self.id
    }

    /// Unregister now instead of at drop.
    pub fn release(mut self) {
        if let Some(id) = self.id.take() {
            self.dispatcher.unregister(id);
        }
    }
}

impl Drop for FilterGuard {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.dispatcher.unregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_slice(bytes)
    }

    fn recorder(log: &Arc<StdMutex<Vec<&'static str>>>, name: &'static str) -> impl Filter {
        let log = log.clone();
        move |f: Frame| {
            log.lock().unwrap().push(name);
            Some(f)
        }
    }

    #[test]
    fn test_filters_run_in_registration_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        dispatcher.register(recorder(&log, "f1"));
        dispatcher.register(recorder(&log, "f2"));
        dispatcher.register(recorder(&log, "f3"));

        assert!(dispatcher.publish(frame(&[0x02, 0x45, 0x06])).is_some());
        assert_eq!(*log.lock().unwrap(), vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn test_veto_stops_chain() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        dispatcher.register(|_f: Frame| -> Option<Frame> { None });
        dispatcher.register(recorder(&log, "f2"));

        assert!(dispatcher.publish(frame(&[0x02, 0x45, 0x06])).is_none());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_filter_can_rewrite_frame() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(StdMutex::new(None));

        dispatcher.register(|f: Frame| {
            let mut bytes = f.as_bytes().to_vec();
            bytes[2] = 0xff;
            Some(Frame::from_slice(&bytes))
        });
        let seen_clone = seen.clone();
        dispatcher.register(move |f: Frame| {
            *seen_clone.lock().unwrap() = Some(f.clone());
            Some(f)
        });

        dispatcher.publish(frame(&[0x02, 0x45, 0x06]));
        assert_eq!(
            seen.lock().unwrap().as_ref().unwrap().as_bytes(),
            &[0x02, 0x45, 0xff]
        );
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let id = dispatcher.register(recorder(&log, "f1"));
        dispatcher.publish(frame(&[0x02, 0x45, 0x06]));
        assert!(dispatcher.unregister(id));
        dispatcher.publish(frame(&[0x02, 0x45, 0x06]));

        assert_eq!(*log.lock().unwrap(), vec!["f1"]);
        assert!(!dispatcher.unregister(id));
    }

    #[test]
    fn test_guard_unregisters_on_drop() {
        let dispatcher = Dispatcher::new();
        {
            let guard = dispatcher.register_scoped(|f: Frame| Some(f));
            assert!(guard.id().is_some());
            assert_eq!(dispatcher.len(), 1);
        }
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn test_guard_manual_release() {
        let dispatcher = Dispatcher::new();
        let guard = dispatcher.register_scoped(|f: Frame| Some(f));
        dispatcher.register(|f: Frame| Some(f));

        guard.release();
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_publish_without_filters_passes_through() {
        let dispatcher = Dispatcher::default();
        let out = dispatcher.publish(frame(&[0x02, 0x45, 0x06])).unwrap();
        assert_eq!(out.as_bytes(), &[0x02, 0x45, 0x06]);
    }

    #[test]
    fn test_clone_shares_registry() {
        let d1 = Dispatcher::new();
        let d2 = d1.clone();
        d1.register(|f: Frame| Some(f));
        assert_eq!(d2.len(), 1);
    }
}
