use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use parking_lot::Mutex;
use serde_json::Value;

use crate::event::{is_stop, HandlerId};
use crate::plugin_system::error::Result;

pub type EventCallback = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
pub type PromiseCallback = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Sync(EventCallback),
    Promise(PromiseCallback),
}

#[derive(Clone)]
struct Registration {
    id: HandlerId,
    once: bool,
    handler: Handler,
}

/// Per-instance event handlers.
///
/// Handlers run in registration order. A synchronous handler returning
/// `false` stops the remaining handlers of that trigger.
pub struct LocalEvents {
    handlers: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for LocalEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count: usize = self.handlers.lock().values().map(Vec::len).sum();
        f.debug_struct("LocalEvents").field("handler_count", &count).finish()
    }
}

impl LocalEvents {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn add(&self, event: &str, once: bool, handler: Handler) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, once, handler });
        id
    }

    pub fn on<F>(&self, event: &str, f: F) -> HandlerId
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.add(event, false, Handler::Sync(Arc::new(f)))
    }

    /// Like [`on`](Self::on), removed after its first call.
    pub fn once<F>(&self, event: &str, f: F) -> HandlerId
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.add(event, true, Handler::Sync(Arc::new(f)))
    }

    /// Register a handler that only takes part in promise events.
    pub fn on_promise<F>(&self, event: &str, f: F) -> HandlerId
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        self.add(event, false, Handler::Promise(Arc::new(f)))
    }

    pub fn off(&self, id: HandlerId) -> bool {
        let mut found = false;
        self.handlers.lock().values_mut().for_each(|handlers| {
            let len_before = handlers.len();
            handlers.retain(|registration| registration.id != id);
            if handlers.len() < len_before {
                found = true;
            }
        });
        found
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.handlers
            .lock()
            .get(event)
            .map(|handlers| !handlers.is_empty())
            .unwrap_or(false)
    }

    fn snapshot(&self, event: &str) -> Vec<Registration> {
        self.handlers.lock().get(event).cloned().unwrap_or_default()
    }

    /// Run the synchronous handlers. Returns `false` if one of them stopped
    /// the event.
    pub fn trigger(&self, event: &str, args: &[Value]) -> bool {
        for registration in self.snapshot(event) {
            let Handler::Sync(callback) = &registration.handler else {
                continue;
            };
            if registration.once {
                self.off(registration.id);
            }
            if is_stop(&callback(args)) {
                log::debug!("Local event \"{}\" stopped by handler {}", event, registration.id);
                return false;
            }
        }
        true
    }

    /// Run every handler and wait for all of them. The first failure rejects.
    pub async fn trigger_promise(&self, event: &str, args: Vec<Value>) -> Result<()> {
        let mut pending: Vec<BoxFuture<'static, Result<Value>>> = Vec::new();
        for registration in self.snapshot(event) {
            if registration.once {
                self.off(registration.id);
            }
            match &registration.handler {
                Handler::Sync(callback) => {
                    let value = callback(&args);
                    pending.push(Box::pin(future::ready(Ok(value))));
                }
                Handler::Promise(callback) => pending.push(callback(args.clone())),
            }
        }
        future::try_join_all(pending).await?;
        Ok(())
    }
}

impl Default for LocalEvents {
    fn default() -> Self {
        Self::new()
    }
}
