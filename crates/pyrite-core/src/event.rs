//! A minimal synchronous event bus. Subscribers run on the notifying thread,
//! after the mutation that triggered them has been committed and its locks
//! released.

use std::sync::Mutex;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

pub type SubscriptionId = u64;

pub struct Event<T> {
    inner: Mutex<Subscribers<T>>,
}

struct Subscribers<T> {
    next_id: SubscriptionId,
    callbacks: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Subscribers {
                next_id: 0,
                callbacks: Vec::new(),
            }),
        }
    }
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.callbacks.retain(|(sub_id, _)| *sub_id != id);
    }

    pub fn notify(&self, value: &T) {
        let inner = self.inner.lock().expect("event bus lock poisoned");
        for (_, callback) in &inner.callbacks {
            callback(value);
        }
    }
}
