//! In-process event dispatcher
//!
//! Used by the simulator and by tests in place of the host's dispatcher.
//!
//! Dispatch holds the registry's read guard for the whole delivery; releasing a subscription
//! takes the write guard. A release therefore either happens before a dispatch starts or waits
//! for it to finish, and no callback is observed after `Subscription::release` returns.
//! Consequence: a listener must not release its own subscription from inside its callback.

use std::sync::{Arc, RwLock, Weak};

use crate::host::{
    EventDispatcher, FrameListener, HostEvent, Subscription, TextureId, UpdateListener,
};

struct Entry<L: ?Sized> {
    id: u64,
    order: i32,
    name: String,
    listener: Arc<L>,
}

struct FrameEntry {
    texture: TextureId,
    entry: Entry<dyn FrameListener>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    update: Vec<Entry<dyn UpdateListener>>,
    frame: Vec<FrameEntry>,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Serial, in-process `EventDispatcher`.
#[derive(Default, Clone)]
pub struct LocalDispatcher {
    inner: Arc<RwLock<Registry>>,
}

impl LocalDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every post-update listener. Returns how many were called.
    pub fn dispatch_update(&self, event: &HostEvent) -> usize {
        let Ok(reg) = self.inner.read() else {
            return 0;
        };
        for e in &reg.update {
            e.listener.on_update(event);
        }
        reg.update.len()
    }

    /// Deliver `event` to every listener observing `texture`. Returns how many were called.
    pub fn dispatch_frame(&self, texture: TextureId, event: &HostEvent) -> usize {
        let Ok(reg) = self.inner.read() else {
            return 0;
        };
        let mut n = 0;
        for fe in reg.frame.iter().filter(|fe| fe.texture == texture) {
            fe.entry.listener.on_frame_event(event);
            n += 1;
        }
        n
    }

    pub fn update_listener_count(&self) -> usize {
        self.inner.read().map(|r| r.update.len()).unwrap_or(0)
    }

    pub fn frame_listener_count(&self) -> usize {
        self.inner.read().map(|r| r.frame.len()).unwrap_or(0)
    }

    /// Names of the live subscriptions, in delivery order (updates first).
    pub fn subscription_names(&self) -> Vec<String> {
        let Ok(reg) = self.inner.read() else {
            return Vec::new();
        };
        reg.update
            .iter()
            .map(|e| e.name.clone())
            .chain(reg.frame.iter().map(|fe| fe.entry.name.clone()))
            .collect()
    }

    fn unsubscribe_hook(&self, id: u64) -> impl FnOnce() + Send + 'static {
        let weak: Weak<RwLock<Registry>> = Arc::downgrade(&self.inner);
        move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // A poisoned lock means a listener panicked mid-dispatch; still drop the entry.
            let mut reg = match inner.write() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            reg.update.retain(|e| e.id != id);
            reg.frame.retain(|fe| fe.entry.id != id);
        }
    }
}

impl EventDispatcher for LocalDispatcher {
    fn observe_post_update(
        &self,
        name: &str,
        order: i32,
        listener: Arc<dyn UpdateListener>,
    ) -> Subscription {
        let Ok(mut reg) = self.inner.write() else {
            return Subscription::inert(name);
        };
        let id = reg.next_id();
        reg.update.push(Entry {
            id,
            order,
            name: name.to_string(),
            listener,
        });
        // Stable sort keeps subscription order within one priority.
        reg.update.sort_by_key(|e| e.order);
        drop(reg);
        Subscription::new(name, self.unsubscribe_hook(id))
    }

    fn observe_drawable_changed(
        &self,
        name: &str,
        order: i32,
        texture: TextureId,
        listener: Arc<dyn FrameListener>,
    ) -> Subscription {
        let Ok(mut reg) = self.inner.write() else {
            return Subscription::inert(name);
        };
        let id = reg.next_id();
        reg.frame.push(FrameEntry {
            texture,
            entry: Entry {
                id,
                order,
                name: name.to_string(),
                listener,
            },
        });
        reg.frame.sort_by_key(|fe| fe.entry.order);
        drop(reg);
        Subscription::new(name, self.unsubscribe_hook(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DEFAULT_ORDER;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl UpdateListener for Recorder {
        fn on_update(&self, _event: &HostEvent) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    impl FrameListener for Recorder {
        fn on_frame_event(&self, _event: &HostEvent) {
            self.log.lock().unwrap().push(self.tag);
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Recorder> {
        Arc::new(Recorder { tag, log: log.clone() })
    }

    #[test]
    fn updates_are_delivered_by_order_then_sequence() {
        let bus = LocalDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = bus.observe_post_update("a", DEFAULT_ORDER, recorder("a", &log));
        let _b = bus.observe_post_update("b", -10, recorder("b", &log));
        let _c = bus.observe_post_update("c", DEFAULT_ORDER, recorder("c", &log));

        assert_eq!(bus.dispatch_update(&HostEvent::post_update()), 3);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn frame_events_only_reach_the_matching_texture() {
        let bus = LocalDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let one = recorder("one", &log);
        let two = recorder("two", &log);
        let _one = bus.observe_drawable_changed("one", DEFAULT_ORDER, TextureId(1), one);
        let _two = bus.observe_drawable_changed("two", DEFAULT_ORDER, TextureId(2), two);

        assert_eq!(bus.dispatch_frame(TextureId(2), &HostEvent::drawable_changed(9)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["two"]);
    }

    #[test]
    fn released_subscription_receives_nothing() {
        let bus = LocalDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = bus.observe_post_update("a", DEFAULT_ORDER, recorder("a", &log));
        assert_eq!(bus.update_listener_count(), 1);

        sub.release();
        assert_eq!(bus.update_listener_count(), 0);
        assert_eq!(bus.dispatch_update(&HostEvent::post_update()), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn subscription_outliving_the_bus_is_harmless() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = {
            let bus = LocalDispatcher::new();
            bus.observe_post_update("a", DEFAULT_ORDER, recorder("a", &log))
        };
        drop(sub);
    }

    /// Blocks inside its callback until the test lets it go.
    struct Gate {
        entered: Sender<()>,
        proceed: Receiver<()>,
        calls: AtomicUsize,
        finished: AtomicBool,
    }

    impl UpdateListener for Gate {
        fn on_update(&self, _event: &HostEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.entered.send(());
            let _ = self.proceed.recv();
            self.finished.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_waits_for_an_in_flight_dispatch() {
        let bus = LocalDispatcher::new();
        let (entered_tx, entered_rx) = bounded(1);
        let (proceed_tx, proceed_rx) = bounded(1);
        let gate = Arc::new(Gate {
            entered: entered_tx,
            proceed: proceed_rx,
            calls: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        });
        let sub = bus.observe_post_update("gate", DEFAULT_ORDER, gate.clone());

        let dispatcher = {
            let bus = bus.clone();
            thread::spawn(move || bus.dispatch_update(&HostEvent::post_update()))
        };
        entered_rx.recv().unwrap();

        let released = Arc::new(AtomicBool::new(false));
        let releaser = {
            let released = released.clone();
            let gate = gate.clone();
            thread::spawn(move || {
                sub.release();
                released.store(true, Ordering::SeqCst);
                // Observed from the releasing thread, right after release returned.
                gate.finished.load(Ordering::SeqCst)
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!released.load(Ordering::SeqCst), "release returned mid-callback");

        proceed_tx.send(()).unwrap();
        assert_eq!(dispatcher.join().unwrap(), 1);
        assert!(releaser.join().unwrap(), "callback still running after release");

        assert_eq!(bus.dispatch_update(&HostEvent::post_update()), 0);
        assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    }
}
