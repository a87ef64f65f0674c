use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::event::{global_name, LocalEvents};
use crate::plugin_system::class::PluginClass;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::mediator::InnerMediator;
use crate::plugin_system::member::{Listener, Member, Method};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Called with the instance id when an instance detaches from its loader.
pub(crate) type DetachHook = Box<dyn Fn(u64) + Send + Sync>;

struct MemberState {
    members: HashMap<String, Member>,
    /// Originals displaced by mocks. `None` records that nothing was there.
    displaced: HashMap<String, Option<Member>>,
}

/// A live plugin object produced by a loader.
pub struct PluginInstance {
    id: u64,
    plugin: String,
    class: Arc<PluginClass>,
    state: RwLock<MemberState>,
    listens: RwLock<Vec<(String, Listener)>>,
    destructed: AtomicBool,
    /// Claimed by the one `destructor` call allowed to run `destruct`.
    destructing: AtomicBool,
    detach_hook: Mutex<Option<DetachHook>>,
    registry: InnerMediator,
    events: LocalEvents,
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.id)
            .field("plugin", &self.plugin)
            .field("class", &self.class.name())
            .field("members", &self.member_names())
            .field("destructed", &self.is_destructed())
            .finish()
    }
}

impl PluginInstance {
    pub(crate) fn new(plugin: &str, class: Arc<PluginClass>, registry: InnerMediator) -> Arc<Self> {
        let members = class.collect_members();
        let listens = class.collect_listens();
        Arc::new(Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::SeqCst),
            plugin: plugin.to_string(),
            class,
            state: RwLock::new(MemberState {
                members,
                displaced: HashMap::new(),
            }),
            listens: RwLock::new(listens),
            destructed: AtomicBool::new(false),
            destructing: AtomicBool::new(false),
            detach_hook: Mutex::new(None),
            registry,
            events: LocalEvents::new(),
        })
    }

    /// Unique, process-wide identity of this instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Registered name of the plugin this instance belongs to.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    pub fn class(&self) -> &Arc<PluginClass> {
        &self.class
    }

    /// This instance's view of the registry.
    pub fn registry(&self) -> &InnerMediator {
        &self.registry
    }

    pub fn events(&self) -> &LocalEvents {
        &self.events
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.state.read().members.contains_key(name)
    }

    pub fn member(&self, name: &str) -> Option<Member> {
        self.state.read().members.get(name).cloned()
    }

    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().members.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.member(name).map(|m| m.is_callable()).unwrap_or(false)
    }

    /// Read a property. Methods and missing members read as `None`.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.state.read().members.get(name).and_then(|m| m.as_property().cloned())
    }

    /// Define or overwrite a property on this instance.
    pub fn set(&self, name: &str, value: Value) {
        self.state
            .write()
            .members
            .insert(name.to_string(), Member::Property(value));
    }

    /// Snapshot of every property currently on the instance.
    pub fn properties(&self) -> Map<String, Value> {
        let state = self.state.read();
        let mut names: Vec<&String> = state.members.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| {
                state.members[name]
                    .as_property()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// Write `member` unless something with that name already exists.
    pub(crate) fn define_if_absent(&self, name: &str, member: Member) -> bool {
        let mut state = self.state.write();
        if state.members.contains_key(name) {
            return false;
        }
        state.members.insert(name.to_string(), member);
        true
    }

    fn unknown_method(&self, name: &str) -> PluginSystemError {
        PluginSystemError::UnknownMethod {
            plugin: self.plugin.clone(),
            method: name.to_string(),
        }
    }

    /// Invoke a synchronous method.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.member(name) {
            Some(Member::Method(method)) => method(self, args),
            Some(Member::AsyncMethod(_)) => Err(PluginSystemError::operation(
                self.plugin.clone(),
                format!("method \"{}\" is asynchronous and must be awaited", name),
            )),
            _ => Err(self.unknown_method(name)),
        }
    }

    /// Invoke any method, awaiting asynchronous ones.
    pub async fn call_async(self: &Arc<Self>, name: &str, args: Vec<Value>) -> Result<Value> {
        match self.member(name) {
            Some(Member::AsyncMethod(method)) => method(self.clone(), args).await,
            Some(Member::Method(method)) => method(self, &args),
            _ => Err(self.unknown_method(name)),
        }
    }

    fn call_hook(&self, hook: &str, args: &[Value]) -> Result<()> {
        match self.member(hook) {
            Some(Member::Method(method)) => method(self, args).map(|_| ()),
            Some(Member::AsyncMethod(_)) => Err(PluginSystemError::operation(
                self.plugin.clone(),
                format!("lifecycle hook \"{}\" cannot be asynchronous", hook),
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn construct(&self, args: &[Value]) -> Result<()> {
        self.call_hook("construct", args)
    }

    pub(crate) fn init(&self) -> Result<()> {
        self.call_hook("init", &[])
    }

    /// Tear the instance down: run `destruct`, detach from the loader and
    /// mark the instance destructed. Calling it again, including from inside
    /// `destruct` or from another thread while it runs, does nothing. A failed
    /// `destruct` releases the claim so the call can be retried.
    pub fn destructor(&self) -> Result<()> {
        if self.destructing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.call_hook("destruct", &[]) {
            self.destructing.store(false, Ordering::SeqCst);
            return Err(e);
        }
        self.detach();
        self.destructed.store(true, Ordering::SeqCst);
        log::debug!("Destructed instance {} of \"{}\"", self.id, self.plugin);
        Ok(())
    }

    /// Remove this instance from its loader's live set. Safe to call more
    /// than once and independent of destruction.
    pub fn detach(&self) {
        if let Some(hook) = self.detach_hook.lock().as_ref() {
            hook(self.id);
        }
    }

    pub fn is_destructed(&self) -> bool {
        self.destructed.load(Ordering::SeqCst)
    }

    pub(crate) fn set_detach_hook(&self, hook: DetachHook) {
        *self.detach_hook.lock() = Some(hook);
    }

    /// Restore every displaced original, then layer `mocks` on top. Runs
    /// under a single write lock.
    pub(crate) fn apply_mocks(&self, mocks: &[(String, Method)]) {
        let mut guard = self.state.write();
        let MemberState { members, displaced } = &mut *guard;
        for (name, original) in displaced.drain() {
            match original {
                Some(member) => members.insert(name, member),
                None => members.remove(&name),
            };
        }
        for (name, mock) in mocks {
            displaced.insert(name.clone(), members.get(name).cloned());
            members.insert(name.clone(), Member::Method(mock.clone()));
        }
    }

    pub(crate) fn restore_member(&self, name: &str) {
        let mut guard = self.state.write();
        let MemberState { members, displaced } = &mut *guard;
        if let Some(original) = displaced.remove(name) {
            match original {
                Some(member) => members.insert(name.to_string(), member),
                None => members.remove(name),
            };
        }
    }

    pub(crate) fn add_listener_if_absent(&self, event: &str, listener: Listener) -> bool {
        let mut listens = self.listens.write();
        if listens.iter().any(|(name, _)| name == event) {
            return false;
        }
        listens.push((event.to_string(), listener));
        true
    }

    pub fn listener_for(&self, event: &str) -> Option<Listener> {
        self.listens
            .read()
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.listener_for(event).is_some()
    }

    pub(crate) fn handle_global_event(&self, event: &str, args: &[Value]) -> Result<Value> {
        match self.listener_for(event) {
            Some(Listener::Method(method)) => self.call(&method, args),
            Some(Listener::Callback(callback)) => callback(self, args),
            None => Ok(Value::Null),
        }
    }

    pub(crate) fn handle_global_promise_event(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value>> {
        let outcome = match self.listener_for(event) {
            Some(Listener::Method(method)) => match self.member(&method) {
                Some(Member::AsyncMethod(f)) => return f(self.clone(), args),
                Some(Member::Method(f)) => f(self, &args),
                _ => Err(self.unknown_method(&method)),
            },
            Some(Listener::Callback(callback)) => callback(self, &args),
            None => Ok(Value::Null),
        };
        Box::pin(future::ready(outcome))
    }

    /// Prefix used when forwarding local events globally. An `event_prefix`
    /// property overrides the class declaration.
    pub fn event_prefix(&self) -> Option<String> {
        self.get("event_prefix")
            .and_then(|value| value.as_str().map(str::to_string))
            .or_else(|| self.class.event_prefix().map(str::to_string))
    }

    /// Run local handlers, then forward to the global bus unless stopped.
    pub fn trigger_event(&self, event: &str, args: &[Value]) -> bool {
        if !self.events.trigger(event, args) {
            return false;
        }
        match self.event_prefix() {
            Some(prefix) => self.registry.global_event(&global_name(&prefix, event), args),
            None => true,
        }
    }

    /// Wait for every local handler, then forward to the global bus. A
    /// rejected local handler suppresses the forward.
    pub async fn trigger_promise_event(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.events.trigger_promise(event, args.clone()).await?;
        if let Some(prefix) = self.event_prefix() {
            self.registry
                .global_promise_event(&global_name(&prefix, event), args)
                .await?;
        }
        Ok(())
    }
}
