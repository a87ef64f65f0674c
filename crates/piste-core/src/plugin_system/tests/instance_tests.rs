// crates/piste-core/src/plugin_system/tests/instance_tests.rs
#![cfg(test)]

use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};

use super::common::{counting_class, Counter};
use crate::plugin_system::class::PluginClass;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::member::{Listener, Member};
use crate::plugin_system::registry::Registry;

#[test]
fn test_destructor_runs_once_and_detaches() {
    let registry = Registry::new();
    let destructs = Counter::new();
    let class = PluginClass::builder("Toast")
        .destruct({
            let destructs = destructs.clone();
            move |_this, _args| {
                destructs.bump();
                Ok(Value::Null)
            }
        })
        .build();
    registry.register_plugin("toast", class).unwrap();
    let loader = registry.get_plugin("toast").unwrap();
    let instance = loader.get_instance(&[]).unwrap();
    assert_eq!(loader.instance_count(), 1);

    instance.destructor().unwrap();
    assert!(instance.is_destructed());
    assert_eq!(loader.instance_count(), 0);
    assert_eq!(destructs.get(), 1);

    instance.destructor().unwrap();
    assert_eq!(destructs.get(), 1, "second destructor call is a no-op");
}

#[test]
fn test_failed_destruct_keeps_instance_live() {
    let registry = Registry::new();
    let class = PluginClass::builder("Sticky")
        .destruct(|this, _args| Err(PluginSystemError::operation(this.plugin_name(), "busy")))
        .build();
    registry.register_plugin("sticky", class).unwrap();
    let loader = registry.get_plugin("sticky").unwrap();
    let instance = loader.get_instance(&[]).unwrap();

    assert!(instance.destructor().is_err());
    assert!(!instance.is_destructed());
    assert_eq!(loader.instance_count(), 1);
}

#[test]
fn test_destructor_claims_teardown_once() {
    let registry = Registry::new();
    let destructs = Counter::new();
    let class = PluginClass::builder("Drawer")
        .destruct({
            let destructs = destructs.clone();
            move |this, _args| {
                destructs.bump();
                // A nested teardown request must not run the hook again.
                this.destructor()?;
                std::thread::sleep(std::time::Duration::from_millis(20));
                Ok(Value::Null)
            }
        })
        .build();
    registry.register_plugin("drawer", class).unwrap();
    let instance = registry.get_plugin("drawer").unwrap().get_instance(&[]).unwrap();

    let barrier = std::sync::Barrier::new(4);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                barrier.wait();
                instance.destructor().unwrap();
            });
        }
    });

    assert_eq!(destructs.get(), 1);
    assert!(instance.is_destructed());
}

#[test]
fn test_failed_destruct_can_be_retried() {
    let registry = Registry::new();
    let attempts = Counter::new();
    let class = PluginClass::builder("Flaky")
        .destruct({
            let attempts = attempts.clone();
            move |this, _args| {
                attempts.bump();
                if attempts.get() == 1 {
                    return Err(PluginSystemError::operation(this.plugin_name(), "busy"));
                }
                Ok(Value::Null)
            }
        })
        .build();
    registry.register_plugin("flaky", class).unwrap();
    let instance = registry.get_plugin("flaky").unwrap().get_instance(&[]).unwrap();

    assert!(instance.destructor().is_err());
    assert!(!instance.is_destructed());
    instance.destructor().unwrap();
    assert!(instance.is_destructed());
    assert_eq!(attempts.get(), 2);
}

#[test]
fn test_property_get_and_set() {
    let registry = Registry::new();
    let class = PluginClass::builder("Counter")
        .property("count", json!(0))
        .method("increment", |this, _args| {
            let next = this.get("count").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
            this.set("count", json!(next));
            Ok(json!(next))
        })
        .build();
    registry.register_plugin("counter", class).unwrap();
    let instance = registry.get_plugin("counter").unwrap().get_instance(&[]).unwrap();

    assert_eq!(instance.get("count"), Some(json!(0)));
    assert_eq!(instance.call("increment", &[]).unwrap(), json!(1));
    assert_eq!(instance.call("increment", &[]).unwrap(), json!(2));
    assert_eq!(instance.get("count"), Some(json!(2)));
    assert_eq!(instance.get("increment"), None, "methods do not read as properties");
    assert_eq!(instance.get("missing"), None);

    instance.set("label", json!("clicks"));
    let properties = instance.properties();
    assert_eq!(properties.get("count"), Some(&json!(2)));
    assert_eq!(properties.get("label"), Some(&json!("clicks")));
    assert!(!properties.contains_key("increment"));
}

#[test]
fn test_instances_do_not_share_state() {
    let registry = Registry::new();
    registry
        .register_plugin("toast", PluginClass::builder("Toast").property("shown", json!(false)).build())
        .unwrap();
    let loader = registry.get_plugin("toast").unwrap();
    let first = loader.get_instance(&[]).unwrap();
    let second = loader.get_instance(&[]).unwrap();

    first.set("shown", json!(true));
    assert_eq!(second.get("shown"), Some(json!(false)));
}

#[test]
fn test_call_unknown_method() {
    let registry = Registry::new();
    registry
        .register_plugin("toast", counting_class("Toast", false, &Counter::new(), &Counter::new()))
        .unwrap();
    let instance = registry.get_plugin("toast").unwrap().get_instance(&[]).unwrap();

    assert!(instance.has_method("greet"));
    assert!(!instance.has_method("vanish"));
    match instance.call("vanish", &[]) {
        Err(PluginSystemError::UnknownMethod { plugin, method }) => {
            assert_eq!(plugin, "toast");
            assert_eq!(method, "vanish");
        }
        other => panic!("Expected UnknownMethod, got {:?}", other),
    }
}

#[test]
fn test_inherited_methods_are_overridable() {
    let registry = Registry::new();
    let base = Arc::new(
        PluginClass::builder("Base")
            .singleton(true)
            .method("greet", |_this, _args| Ok(json!("base")))
            .method("farewell", |_this, _args| Ok(json!("bye")))
            .build(),
    );
    let child = PluginClass::builder("Child")
        .extends(base)
        .method("greet", |_this, _args| Ok(json!("child")))
        .build();
    assert!(child.is_singleton(), "singleton flag is inherited");
    registry.register_plugin("child", child).unwrap();

    let instance = registry.get_plugin("child").unwrap().get_instance(&[]).unwrap();
    assert_eq!(instance.call("greet", &[]).unwrap(), json!("child"));
    assert_eq!(instance.call("farewell", &[]).unwrap(), json!("bye"));
}

#[tokio::test]
async fn test_call_async_awaits_async_methods() {
    let registry = Registry::new();
    let class = PluginClass::builder("Loader")
        .member(
            "fetch",
            Member::async_method(|this, args| {
                async move {
                    let key = args.first().cloned().unwrap_or(Value::Null);
                    Ok(json!({ "plugin": this.plugin_name(), "key": key }))
                }
                .boxed()
            }),
        )
        .method("sync", |_this, _args| Ok(json!("now")))
        .build();
    registry.register_plugin("loader", class).unwrap();
    let instance = registry.get_plugin("loader").unwrap().get_instance(&[]).unwrap();

    let fetched = instance.call_async("fetch", vec![json!("users")]).await.unwrap();
    assert_eq!(fetched, json!({ "plugin": "loader", "key": "users" }));
    assert_eq!(instance.call_async("sync", vec![]).await.unwrap(), json!("now"));
    assert!(instance.call("fetch", &[]).is_err(), "async methods must be awaited");
}

#[test]
fn test_global_event_stop_value_halts_dispatch() {
    let registry = Registry::new();
    let heard = Counter::new();
    for name in ["alpha", "beta"] {
        let heard = heard.clone();
        let class = PluginClass::builder(name)
            .listens(
                "save",
                Listener::callback(move |_this, _args| {
                    heard.bump();
                    Ok(Value::Bool(false))
                }),
            )
            .build();
        registry.register_plugin(name, class).unwrap();
        registry.get_plugin(name).unwrap().get_instance(&[]).unwrap();
    }

    assert!(!registry.global_event("save", &[]));
    assert_eq!(heard.get(), 1, "dispatch stops at the first stop value");
}

#[test]
fn test_global_event_skips_plugins_without_instances() {
    let registry = Registry::new();
    let heard = Counter::new();
    let class = PluginClass::builder("Idle")
        .listens("save", {
            let heard = heard.clone();
            Listener::callback(move |_this, _args| {
                heard.bump();
                Ok(Value::Null)
            })
        })
        .build();
    registry.register_plugin("idle", class).unwrap();

    assert!(registry.global_event("save", &[]));
    assert_eq!(heard.get(), 0);
}

#[test]
fn test_local_event_forwarded_with_prefix() {
    let registry = Registry::new();
    let heard: Arc<parking_lot::Mutex<Vec<Value>>> = Arc::default();
    let emitter = PluginClass::builder("Uploader").event_prefix("uploader").build();
    let listener = PluginClass::builder("Progress")
        .listens("uploader.done", {
            let heard = heard.clone();
            Listener::callback(move |_this, args| {
                heard.lock().extend(args.iter().cloned());
                Ok(Value::Null)
            })
        })
        .build();
    registry.register_plugin("uploader", emitter).unwrap();
    registry.register_plugin("progress", listener).unwrap();
    registry.get_plugin("progress").unwrap().get_instance(&[]).unwrap();
    let uploader = registry.get_plugin("uploader").unwrap().get_instance(&[]).unwrap();

    assert_eq!(uploader.event_prefix(), Some("uploader".to_string()));
    assert!(uploader.trigger_event("done", &[json!("file.txt")]));
    assert_eq!(*heard.lock(), vec![json!("file.txt")]);

    // A local stop suppresses the global forward
    uploader.events().on("done", |_args| Value::Bool(false));
    assert!(!uploader.trigger_event("done", &[json!("other.txt")]));
    assert_eq!(heard.lock().len(), 1);
}

#[test]
fn test_event_prefix_property_overrides_class() {
    let registry = Registry::new();
    registry
        .register_plugin("uploader", PluginClass::builder("Uploader").event_prefix("uploader").build())
        .unwrap();
    let instance = registry.get_plugin("uploader").unwrap().get_instance(&[]).unwrap();

    instance.set("event_prefix", json!("files"));
    assert_eq!(instance.event_prefix(), Some("files".to_string()));
}

#[tokio::test]
async fn test_trigger_promise_event_forwards_after_local_handlers() {
    let registry = Registry::new();
    let heard = Counter::new();
    let listener = PluginClass::builder("Progress")
        .member(
            "on_done",
            Member::async_method({
                let heard = heard.clone();
                move |_this, _args| {
                    let heard = heard.clone();
                    async move {
                        heard.bump();
                        Ok(Value::Null)
                    }
                    .boxed()
                }
            }),
        )
        .listens("uploader.done", "on_done")
        .build();
    registry.register_plugin("progress", listener).unwrap();
    registry
        .register_plugin("uploader", PluginClass::builder("Uploader").event_prefix("uploader").build())
        .unwrap();
    registry.get_plugin("progress").unwrap().get_instance(&[]).unwrap();
    let uploader = registry.get_plugin("uploader").unwrap().get_instance(&[]).unwrap();

    uploader.trigger_promise_event("done", vec![]).await.unwrap();
    assert_eq!(heard.get(), 1);

    uploader.events().on_promise("done", |_args| {
        async { Err(PluginSystemError::operation("uploader", "disk full")) }.boxed()
    });
    assert!(uploader.trigger_promise_event("done", vec![]).await.is_err());
    assert_eq!(heard.get(), 1, "a rejected local handler suppresses the forward");
}

#[tokio::test]
async fn test_global_promise_event_rejects_on_listener_failure() {
    let registry = Registry::new();
    let class = PluginClass::builder("Saver")
        .member(
            "on_save",
            Member::async_method(|this, _args| {
                async move { Err(PluginSystemError::operation(this.plugin_name(), "write failed")) }.boxed()
            }),
        )
        .listens("save", "on_save")
        .build();
    registry.register_plugin("saver", class).unwrap();
    registry.get_plugin("saver").unwrap().get_instance(&[]).unwrap();

    match registry.global_promise_event("save", vec![]).await {
        Err(PluginSystemError::ListenerFailed { event, plugin, source }) => {
            assert_eq!(event, "save");
            assert_eq!(plugin, "saver");
            assert!(matches!(*source, PluginSystemError::OperationError { .. }));
        }
        other => panic!("Expected ListenerFailed, got {:?}", other),
    }

    // No listeners resolves immediately
    registry.global_promise_event("nothing", vec![]).await.unwrap();
}
