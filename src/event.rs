//! Observer registration decoupled from any engine's component lifecycle:
//! `subscribe` hands back a handle, `unsubscribe` takes it away. Dispatch is
//! synchronous; a slow observer delays only the current tick.

use std::sync::{Arc, Mutex};

/// Token returned by [`EventHub::subscribe`]; pass it back to
/// [`EventHub::unsubscribe`] to stop delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

type Listener<T> = Box<dyn FnMut(&T) + Send>;

struct HubInner<T> {
    listeners: Vec<(u64, Listener<T>)>,
    next_id: u64,
}

/// A synchronous observer list. Cloning shares the listener set, so a
/// background thread can hold a handle to the same hub the consumer
/// subscribes on.
pub struct EventHub<T> {
    inner: Arc<Mutex<HubInner<T>>>,
}

impl<T> Clone for EventHub<T> {
    fn clone(&self) -> Self {
        EventHub {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHub<T> {
    pub fn new() -> Self {
        EventHub {
            inner: Arc::new(Mutex::new(HubInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&T) + Send + 'static) -> SubscriptionHandle {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Box::new(listener)));
        SubscriptionHandle(id)
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().unwrap();
        inner.listeners.retain(|(id, _)| *id != handle.0);
    }

    /// Calls every registered listener with `value`, in subscription order.
    /// Listeners must not subscribe/unsubscribe reentrantly.
    pub fn emit(&self, value: &T) {
        let mut inner = self.inner.lock().unwrap();
        for (_, listener) in inner.listeners.iter_mut() {
            listener(value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_all_subscribers() {
        let hub: EventHub<u32> = EventHub::new();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let seen = seen.clone();
            hub.subscribe(move |v| {
                seen.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }

        hub.emit(&5);
        assert_eq!(seen.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub: EventHub<()> = EventHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let handle = hub.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(&());
        hub.unsubscribe(handle);
        hub.emit(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn unsubscribe_with_stale_handle_is_a_no_op() {
        let hub: EventHub<()> = EventHub::new();
        let handle = hub.subscribe(|_| {});
        hub.unsubscribe(handle);
        hub.unsubscribe(handle);
        assert_eq!(hub.listener_count(), 0);
    }
}
