//! Single-slot command handoff between the player API and the worker.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Wakes the worker when any mailbox receives a command.
#[derive(Debug, Default)]
pub(crate) struct Doorbell {
    rung: Mutex<bool>,
    cond: Condvar,
}

impl Doorbell {
    pub(crate) fn ring(&self) {
        *self.rung.lock().unwrap() = true;
        self.cond.notify_all();
    }

    /// Block until rung or `timeout` elapses, then clear.
    pub(crate) fn wait(&self, timeout: Duration) {
        let rung = self.rung.lock().unwrap();
        let (mut rung, _) = self
            .cond
            .wait_timeout_while(rung, timeout, |rung| !*rung)
            .unwrap();
        *rung = false;
    }
}

/// Holds at most one pending command; posting again replaces it.
#[derive(Debug)]
pub(crate) struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T> Mailbox<T> {
    /// Store `value`, returning the command it displaced.
    pub(crate) fn post(&self, value: T) -> Option<T> {
        self.slot.lock().unwrap().replace(value)
    }

    pub(crate) fn take(&self) -> Option<T> {
        self.slot.lock().unwrap().take()
    }

    pub(crate) fn clear(&self) {
        self.slot.lock().unwrap().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn latest_post_wins() {
        let mailbox = Mailbox::default();
        assert_eq!(mailbox.post(1), None);
        assert_eq!(mailbox.post(2), Some(1));
        assert_eq!(mailbox.take(), Some(2));
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn doorbell_wakes_waiter() {
        let bell = Arc::new(Doorbell::default());
        let ringer = bell.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            ringer.ring();
        });
        bell.wait(Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();

        let idle = Instant::now();
        bell.wait(Duration::from_millis(10));
        assert!(idle.elapsed() >= Duration::from_millis(10));
    }
}
