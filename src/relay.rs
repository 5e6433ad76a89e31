//! Task queue owned by the consumer-thread tick loop. The acquisition
//! thread posts closures here instead of calling listeners directly, which
//! keeps lifecycle notifications off the background thread.

use crossbeam_channel::{Receiver, Sender, unbounded};

type Task = Box<dyn FnOnce() + Send>;

/// Sending half of a [`TickRelay`], handed to background threads.
#[derive(Clone)]
pub struct RelayPoster {
    tx: Sender<Task>,
}

impl RelayPoster {
    /// Queues `task` to run on the next tick. Dropped silently if the
    /// owning relay is gone.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.tx.send(Box::new(task));
    }
}

/// The receiving side, drained once per tick on the consumer thread.
pub struct TickRelay {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for TickRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl TickRelay {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        TickRelay { tx, rx }
    }

    pub fn poster(&self) -> RelayPoster {
        RelayPoster {
            tx: self.tx.clone(),
        }
    }

    /// Runs every task posted so far. Tasks posted while draining run on
    /// this same call.
    pub fn drain(&self) {
        while let Ok(task) = self.rx.try_recv() {
            task();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn drain_runs_posted_tasks_in_order() {
        let relay = TickRelay::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            relay.poster().post(move || log.lock().unwrap().push(i));
        }

        relay.drain();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_posted_from_another_thread_run_on_the_draining_thread() {
        let relay = TickRelay::new();
        let poster = relay.poster();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        let handle = std::thread::spawn(move || {
            poster.post(move || {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            });
        });
        handle.join().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        relay.drain();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drain_on_empty_relay_is_fine() {
        TickRelay::new().drain();
    }
}
