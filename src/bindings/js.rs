//! JavaScript binding adapter using rquickjs
//!
//! Exposes the metadata façade to QuickJS. Values cross the boundary as
//! JSON: the bootstrap stringifies script values per key (a failed
//! stringify is the "failed argument" case and the key is skipped) and
//! the native side converts through [`MetaValue::from_json`]. Arity and
//! value-category checks run before any store mutation.
//!
//! The script surface mirrors the engine's entity class:
//!
//! ```js
//! const ent = VirtualEntity.getByID(3);
//! ent.streamSyncedMeta.hp = 50;            // dynamic property setter
//! delete ent.streamSyncedMeta.hp;          // deleter, yields bool
//! ent.setMultipleSyncedMetaData({ a: 1 }); // bulk entry point
//! ```

use super::class::ClassRegistry;
use super::protocol::{BindingAdapter, BindingEvent};
use crate::config::BindingConfig;
use crate::core::error::{BindingError, BindingResult};
use crate::entity::MetaTier;
use crate::facade::MetaFacade;
use crate::value::MetaValue;
use rquickjs::context::EvalOptions;
use rquickjs::{Context, Function, Object, Runtime};

/// Standard global-script semantics: rquickjs defaults to forcing strict
/// mode, which turns a proxy deleter returning `false` into a TypeError
/// instead of yielding `false` from `delete`.
fn eval_options() -> EvalOptions {
    EvalOptions {
        strict: false,
        ..EvalOptions::default()
    }
}

/// Glue evaluated once at init. Builds the user-facing `VirtualEntity`
/// surface from the exported class template; dynamic property namespaces
/// are Proxy-backed so property writes and deletes route through the
/// interception table.
const BOOTSTRAP: &str = r#"
globalThis.__veBulkSet = function (id, tier, argc, values) {
    if (argc !== 1) return;
    if (typeof values !== "object" || values === null || Array.isArray(values)) return;
    const clean = {};
    for (const key of Object.keys(values)) {
        try {
            if (JSON.stringify(values[key]) !== undefined) clean[key] = values[key];
        } catch (_e) {
            // not representable, skipped
        }
    }
    __veNative.setMultipleMeta(id, tier, JSON.stringify(clean));
};

globalThis.__veMakeProxy = function (id, prop) {
    return new Proxy({}, {
        get(_target, key) {
            if (!prop.getter || typeof key !== "string") return undefined;
            const json = __veNative.getMeta(id, prop.tier, key);
            return json === undefined || json === null ? undefined : JSON.parse(json);
        },
        set(_target, key, value) {
            if (!prop.setter || typeof key !== "string") return true;
            let json;
            try {
                json = JSON.stringify(value);
            } catch (_e) {
                return true;
            }
            if (json === undefined) return true;
            __veNative.setMeta(id, prop.tier, key, json);
            return true;
        },
        deleteProperty(_target, key) {
            if (!prop.deleter || typeof key !== "string") return false;
            return __veNative.deleteMeta(id, prop.tier, key) === true;
        },
        has(_target, key) {
            if (!prop.getter || typeof key !== "string") return false;
            return __veNative.hasMeta(id, prop.tier, key);
        },
    });
};

globalThis.VirtualEntity = {
    getByID(id) {
        id = Number(id);
        if (!__veNative.isValid(id)) return null;
        const ent = { id };
        ent.setMultipleSyncedMetaData = function (values) {
            __veBulkSet(id, "synced", arguments.length, values);
        };
        ent.setMultipleStreamSyncedMetaData = function (values) {
            __veBulkSet(id, "streamSynced", arguments.length, values);
        };
        for (const prop of JSON.parse(__veNative.classTemplate())) {
            ent[prop.name] = __veMakeProxy(id, prop);
        }
        return ent;
    },
};
"#;

pub struct JsBindingAdapter {
    #[allow(dead_code)]
    runtime: Runtime,
    context: Context,
    facade: MetaFacade,
    class_registry: ClassRegistry,
    initialized: bool,
}

impl JsBindingAdapter {
    pub fn new(facade: MetaFacade, config: &BindingConfig) -> BindingResult<Self> {
        let runtime = Runtime::new().map_err(|e| BindingError::Script(format!("{:?}", e)))?;
        let context =
            Context::full(&runtime).map_err(|e| BindingError::Script(format!("{:?}", e)))?;
        Ok(Self {
            runtime,
            context,
            facade,
            class_registry: ClassRegistry::from_config(config),
            initialized: false,
        })
    }

    pub fn class_registry(&self) -> &ClassRegistry {
        &self.class_registry
    }

    /// Run a script for its side effects
    pub fn execute_script(&self, code: &str) -> BindingResult<()> {
        self.context.with(|ctx| {
            ctx.eval_with_options::<(), _>(code, eval_options())
                .map_err(|e| BindingError::Script(format!("{:?}", e)))
        })
    }

    /// Evaluate an expression and return it JSON-encoded. `None` when the
    /// expression evaluates to something JSON cannot carry (undefined).
    pub fn eval_to_json(&self, expr: &str) -> BindingResult<Option<String>> {
        let code = format!("JSON.stringify(({}))", expr);
        self.context.with(|ctx| {
            ctx.eval_with_options::<Option<String>, _>(code, eval_options())
                .map_err(|e| BindingError::Script(format!("{:?}", e)))
        })
    }

    fn bind_native_api(&self) -> BindingResult<()> {
        let template_json = self
            .class_registry
            .export_json()
            .map_err(BindingError::EventEncode)?;
        let facade = self.facade.clone();

        self.context
            .with(|ctx| -> rquickjs::Result<()> {
                let global = ctx.globals();
                let native = Object::new(ctx.clone())?;

                native.set(
                    "classTemplate",
                    Function::new(ctx.clone(), move || -> String { template_json.clone() })?,
                )?;

                let f = facade.clone();
                native.set(
                    "isValid",
                    Function::new(ctx.clone(), move |id: u64| -> bool { f.is_valid(id) })?,
                )?;

                let f = facade.clone();
                native.set(
                    "hasMeta",
                    Function::new(
                        ctx.clone(),
                        move |id: u64, tier: String, key: String| -> bool {
                            parse_tier(&tier)
                                .map(|tier| f.has(id, tier, &key))
                                .unwrap_or(false)
                        },
                    )?,
                )?;

                let f = facade.clone();
                native.set(
                    "getMeta",
                    Function::new(
                        ctx.clone(),
                        move |id: u64, tier: String, key: String| -> Option<String> {
                            let tier = parse_tier(&tier)?;
                            let value = f.get(id, tier, &key)?;
                            serde_json::to_string(&value.to_json()).ok()
                        },
                    )?,
                )?;

                let f = facade.clone();
                native.set(
                    "setMeta",
                    Function::new(
                        ctx.clone(),
                        move |id: u64, tier: String, key: String, json: String| {
                            let Some(tier) = parse_tier(&tier) else {
                                return;
                            };
                            match decode_value(&json) {
                                Some(value) => f.set(id, tier, &key, value),
                                None => tracing::debug!(
                                    target: "bindings",
                                    "rejected value for {}.{} on entity {}",
                                    tier.as_str(),
                                    key,
                                    id
                                ),
                            }
                        },
                    )?,
                )?;

                let f = facade.clone();
                native.set(
                    "deleteMeta",
                    Function::new(
                        ctx.clone(),
                        move |id: u64, tier: String, key: String| -> Option<bool> {
                            let tier = parse_tier(&tier)?;
                            f.delete(id, tier, &key)
                        },
                    )?,
                )?;

                let f = facade.clone();
                native.set(
                    "setMultipleMeta",
                    Function::new(
                        ctx.clone(),
                        move |id: u64, tier: String, entries_json: String| {
                            let Some(tier) = parse_tier(&tier) else {
                                return;
                            };
                            let Ok(serde_json::Value::Object(map)) =
                                serde_json::from_str(&entries_json)
                            else {
                                tracing::debug!(
                                    target: "bindings",
                                    "bulk set on entity {} rejected: not a mapping",
                                    id
                                );
                                return;
                            };
                            let entries = map.iter().map(|(key, value)| {
                                (key.clone(), MetaValue::from_json(value).ok())
                            });
                            f.set_multiple(id, tier, entries);
                        },
                    )?,
                )?;

                global.set("__veNative", native)?;
                Ok(())
            })
            .map_err(|e| BindingError::Script(format!("{:?}", e)))
    }
}

impl BindingAdapter for JsBindingAdapter {
    fn init(&mut self) -> BindingResult<()> {
        self.bind_native_api()?;
        self.execute_script(BOOTSTRAP)?;
        self.initialized = true;
        tracing::info!(
            target: "bindings",
            "js adapter initialized with {} dynamic properties",
            self.class_registry.properties().len()
        );
        Ok(())
    }

    fn dispatch_event(&mut self, event: &BindingEvent) -> BindingResult<()> {
        if !self.initialized {
            return Err(BindingError::NotInitialized);
        }
        let event_json = serde_json::to_string(event).map_err(BindingError::EventEncode)?;
        let code = format!(
            "if (typeof __onEntityEvent === 'function') __onEntityEvent({});",
            event_json
        );
        self.execute_script(&code)
    }

    fn shutdown(&mut self) {
        // QuickJS cleanup is automatic via Drop; only the template needs
        // explicit teardown.
        self.class_registry.teardown();
        self.initialized = false;
    }
}

fn parse_tier(name: &str) -> Option<MetaTier> {
    let tier = MetaTier::from_name(name);
    if tier.is_none() {
        tracing::warn!(target: "bindings", "unknown metadata tier '{}'", name);
    }
    tier
}

fn decode_value(json: &str) -> Option<MetaValue> {
    let parsed: serde_json::Value = serde_json::from_str(json).ok()?;
    MetaValue::from_json(&parsed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityRegistry};
    use glam::Vec3;
    use std::sync::{Arc, Mutex};

    fn adapter_with_entity(config: BindingConfig) -> (JsBindingAdapter, MetaFacade, EntityId) {
        let registry = Arc::new(Mutex::new(EntityRegistry::new()));
        let id = registry.lock().unwrap().spawn(Vec3::ZERO, 100.0);
        let (facade, _rx) = MetaFacade::new(registry);
        let mut adapter = JsBindingAdapter::new(facade.clone(), &config).unwrap();
        adapter.init().unwrap();
        (adapter, facade, id)
    }

    #[test]
    fn test_get_by_id_validity() {
        let (adapter, _facade, id) = adapter_with_entity(BindingConfig::default());
        let json = adapter
            .eval_to_json(&format!("VirtualEntity.getByID({}).id", id))
            .unwrap();
        assert_eq!(json.as_deref(), Some(id.to_string().as_str()));
        let json = adapter.eval_to_json("VirtualEntity.getByID(9999)").unwrap();
        assert_eq!(json.as_deref(), Some("null"));
    }

    #[test]
    fn test_stream_synced_property_setter() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        adapter
            .execute_script(&format!(
                "const e = VirtualEntity.getByID({}); e.streamSyncedMeta.hp = 50;",
                id
            ))
            .unwrap();
        assert_eq!(
            facade.get(id, MetaTier::StreamSynced, "hp"),
            Some(MetaValue::Number(50.0))
        );
        assert_eq!(facade.get(id, MetaTier::Synced, "hp"), None);
    }

    #[test]
    fn test_property_deleter_yields_bool() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(1.0));
        let code = format!(
            "[delete VirtualEntity.getByID({id}).streamSyncedMeta.hp, \
              delete VirtualEntity.getByID({id}).streamSyncedMeta.hp]",
            id = id
        );
        let json = adapter.eval_to_json(&code).unwrap();
        assert_eq!(json.as_deref(), Some("[true,false]"));
        assert!(!facade.has(id, MetaTier::StreamSynced, "hp"));
    }

    #[test]
    fn test_unrepresentable_value_is_skipped() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        adapter
            .execute_script(&format!(
                "const e = VirtualEntity.getByID({}); \
                 e.streamSyncedMeta.cb = function() {{}}; \
                 e.streamSyncedMeta.ok = 'fine';",
                id
            ))
            .unwrap();
        assert!(!facade.has(id, MetaTier::StreamSynced, "cb"));
        assert_eq!(
            facade.get(id, MetaTier::StreamSynced, "ok"),
            Some(MetaValue::String("fine".into()))
        );
    }

    #[test]
    fn test_bulk_set_partial_application() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        adapter
            .execute_script(&format!(
                "VirtualEntity.getByID({}).setMultipleSyncedMetaData({{ \
                     a: 1, b: undefined, c: {{ nested: true }} }});",
                id
            ))
            .unwrap();
        assert_eq!(
            facade.get(id, MetaTier::Synced, "a"),
            Some(MetaValue::Number(1.0))
        );
        assert!(!facade.has(id, MetaTier::Synced, "b"));
        assert!(facade.has(id, MetaTier::Synced, "c"));
    }

    #[test]
    fn test_bulk_set_rejects_bad_arguments() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        adapter
            .execute_script(&format!(
                "const e = VirtualEntity.getByID({}); \
                 e.setMultipleSyncedMetaData(); \
                 e.setMultipleSyncedMetaData('nope'); \
                 e.setMultipleSyncedMetaData([1, 2]); \
                 e.setMultipleStreamSyncedMetaData(null);",
                id
            ))
            .unwrap();
        let registry = facade.registry_handle();
        let registry = registry.lock().unwrap();
        let entity = registry.get(id).unwrap();
        assert!(entity.store(MetaTier::Synced).is_empty());
        assert!(entity.store(MetaTier::StreamSynced).is_empty());
    }

    #[test]
    fn test_synced_property_is_gated_off_by_default() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        let result = adapter.execute_script(&format!(
            "VirtualEntity.getByID({}).syncedMeta.x = 1;",
            id
        ));
        assert!(result.is_err());
        assert!(!facade.has(id, MetaTier::Synced, "x"));
        // The bulk entry point for the same tier still works.
        adapter
            .execute_script(&format!(
                "VirtualEntity.getByID({}).setMultipleSyncedMetaData({{ x: 1 }});",
                id
            ))
            .unwrap();
        assert!(facade.has(id, MetaTier::Synced, "x"));
    }

    #[test]
    fn test_in_operator_follows_getter_flag() {
        let (adapter, facade, id) = adapter_with_entity(BindingConfig::default());
        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(1.0));
        // Write-only surface: existence reads stay closed too.
        let json = adapter
            .eval_to_json(&format!(
                "'hp' in VirtualEntity.getByID({}).streamSyncedMeta",
                id
            ))
            .unwrap();
        assert_eq!(json.as_deref(), Some("false"));

        let config = BindingConfig {
            expose_property_getters: true,
            ..Default::default()
        };
        let (adapter, facade, id) = adapter_with_entity(config);
        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(1.0));
        let json = adapter
            .eval_to_json(&format!(
                "['hp' in VirtualEntity.getByID({id}).streamSyncedMeta, \
                  'mp' in VirtualEntity.getByID({id}).streamSyncedMeta]",
                id = id
            ))
            .unwrap();
        assert_eq!(json.as_deref(), Some("[true,false]"));
    }

    #[test]
    fn test_getter_round_trip_when_enabled() {
        let config = BindingConfig {
            expose_property_getters: true,
            ..Default::default()
        };
        let (adapter, _facade, id) = adapter_with_entity(config);
        adapter
            .execute_script(&format!(
                "const e = VirtualEntity.getByID({}); \
                 e.streamSyncedMeta.pos = {{ x: 1.5, tags: ['a'] }};",
                id
            ))
            .unwrap();
        let json = adapter
            .eval_to_json(&format!(
                "VirtualEntity.getByID({}).streamSyncedMeta.pos",
                id
            ))
            .unwrap()
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serde_json::json!({ "x": 1.5, "tags": ["a"] }));
        // Unset keys read back as the absent sentinel.
        let absent = adapter
            .eval_to_json(&format!(
                "VirtualEntity.getByID({}).streamSyncedMeta.missing",
                id
            ))
            .unwrap();
        assert_eq!(absent, None);
    }

    #[test]
    fn test_event_dispatch() {
        let (mut adapter, _facade, id) = adapter_with_entity(BindingConfig::default());
        adapter
            .execute_script(
                "globalThis.seen = []; \
                 globalThis.__onEntityEvent = function (ev) { seen.push(ev); };",
            )
            .unwrap();
        let event = BindingEvent::StreamSyncedMetaChange {
            entity: id,
            key: "hp".into(),
            value: serde_json::json!(20.0),
            deleted: false,
        };
        adapter.dispatch_event(&event).unwrap();
        let json = adapter
            .eval_to_json("seen[0].StreamSyncedMetaChange.key")
            .unwrap();
        assert_eq!(json.as_deref(), Some("\"hp\""));
    }

    #[test]
    fn test_dispatch_requires_init() {
        let registry = Arc::new(Mutex::new(EntityRegistry::new()));
        let (facade, _rx) = MetaFacade::new(registry);
        let mut adapter = JsBindingAdapter::new(facade, &BindingConfig::default()).unwrap();
        let result = adapter.dispatch_event(&BindingEvent::EntityDestroyed { entity: 1 });
        assert!(matches!(result, Err(BindingError::NotInitialized)));
    }
}
