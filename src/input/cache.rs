//! Process-wide cache that keeps an idle virtual controller alive across
//! device loop restarts, so the host does not see it disconnect.
//!
//! While cached, a keepalive thread ticks the controller at
//! [UPDATE_PERIOD]. It is closed for good after [CACHE_TIMEOUT].
use std::{
    fmt::Debug,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::VirtualController;

pub const CACHE_TIMEOUT: Duration = Duration::from_secs(20);
pub const UPDATE_PERIOD: Duration = Duration::from_millis(40);

/// A virtual controller that can be parked in a [ControllerCache]
pub trait Cacheable: VirtualController + Send + 'static {
    type Key: PartialEq + Debug;

    /// Identity of the emulated device. A cached controller is only reused
    /// by a loop asking for the same key.
    fn cache_key(&self) -> Self::Key;

    /// Feed the host while nobody drives the controller
    fn keepalive(&mut self, elapsed: Duration);

    /// Destroy the device
    fn close_cached(&mut self);
}

struct Slot<T> {
    cached: Option<T>,
    generation: u64,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    cond: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Holds at most one controller
pub struct ControllerCache<T: Cacheable> {
    shared: Arc<Shared<T>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl<T: Cacheable> Default for ControllerCache<T> {
    fn default() -> Self {
        Self::new(CACHE_TIMEOUT)
    }
}

impl<T: Cacheable> ControllerCache<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    cached: None,
                    generation: 0,
                }),
                cond: Condvar::new(),
            }),
            thread: Mutex::new(None),
            timeout,
        }
    }

    fn join(&self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Controller cache thread panicked");
            }
        }
    }

    /// Take the cached controller out, stopping its keepalive thread
    fn take(&self) -> Option<T> {
        let cached = {
            let mut slot = self.shared.lock();
            slot.generation += 1;
            self.shared.cond.notify_all();
            slot.cached.take()
        };
        self.join();
        cached
    }

    /// Park a controller, replacing and closing the previous one
    pub fn add(&self, controller: T) {
        if let Some(mut old) = self.take() {
            old.close_cached();
        }

        log::debug!("Caching controller {:?}", controller.cache_key());
        let generation = {
            let mut slot = self.shared.lock();
            slot.cached = Some(controller);
            slot.generation
        };

        let shared = self.shared.clone();
        let timeout = self.timeout;
        let handle = thread::spawn(move || keepalive(shared, generation, timeout));
        match self.thread.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    /// Return the cached controller if it matches `key`. A mismatching
    /// controller is closed.
    pub fn get(&self, key: &T::Key) -> Option<T> {
        let mut cached = self.take()?;
        if cached.cache_key() == *key {
            log::debug!("Reusing cached controller {key:?}");
            return Some(cached);
        }
        log::debug!(
            "Cached controller {:?} does not match {key:?}, closing it",
            cached.cache_key()
        );
        cached.close_cached();
        None
    }

    /// Close the cached controller now
    pub fn close(&self) {
        if let Some(mut cached) = self.take() {
            cached.close_cached();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().cached.is_none()
    }
}

fn keepalive<T: Cacheable>(shared: Arc<Shared<T>>, generation: u64, timeout: Duration) {
    let start = Instant::now();
    let mut last = start;
    let mut slot = shared.lock();
    while start.elapsed() < timeout {
        slot = match shared.cond.wait_timeout(slot, UPDATE_PERIOD) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        };
        if slot.generation != generation {
            return;
        }
        let Some(cached) = slot.cached.as_mut() else {
            return;
        };
        cached.keepalive(last.elapsed());
        last = Instant::now();
    }

    if let Some(mut cached) = slot.cached.take() {
        log::info!("Closing cached controller {:?}", cached.cache_key());
        cached.close_cached();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        os::fd::RawFd,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::input::{event::Event, Consumer, DeviceError, Producer};

    struct Fake {
        key: u8,
        ticks: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    impl Producer for Fake {
        fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
            Ok(vec![])
        }

        fn produce(&mut self, _: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
            Ok(vec![])
        }

        fn close(&mut self, _: bool) -> bool {
            true
        }
    }

    impl Consumer for Fake {
        fn consume(&mut self, _: &[Event]) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    impl Cacheable for Fake {
        type Key = u8;

        fn cache_key(&self) -> u8 {
            self.key
        }

        fn keepalive(&mut self, _: Duration) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn close_cached(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fake(key: u8) -> (Fake, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let fake = Fake {
            key,
            ticks: ticks.clone(),
            closed: closed.clone(),
        };
        (fake, ticks, closed)
    }

    #[test]
    fn reuses_matching_controller() {
        let cache = ControllerCache::new(Duration::from_secs(5));
        let (c, ticks, closed) = fake(1);
        cache.add(c);
        thread::sleep(Duration::from_millis(150));
        let c = cache.get(&1).unwrap();
        assert_eq!(c.key, 1);
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn mismatch_closes_controller() {
        let cache = ControllerCache::new(Duration::from_secs(5));
        let (c, _, closed) = fake(1);
        cache.add(c);
        assert!(cache.get(&2).is_none());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closes_after_timeout() {
        let cache = ControllerCache::new(Duration::from_millis(100));
        let (c, _, closed) = fake(1);
        cache.add(c);
        thread::sleep(Duration::from_millis(400));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(cache.get(&1).is_none());
    }
}
