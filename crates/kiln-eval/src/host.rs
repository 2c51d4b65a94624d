//! Host capabilities: the values bare specifiers such as `react` resolve to.
//!
//! Hooks are static. A preview renders each component once, so state
//! setters and effects are inert and `useState` simply returns its initial
//! value.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::value::*;

/// Version string reported by the host `react` object.
pub const REACT_VERSION: &str = "18.3.1";

/// Allowlisted capability names and the values handed out so far.
pub(crate) struct Capabilities {
    allow: Vec<String>,
    cache: HashMap<String, Value>,
}

impl Capabilities {
    pub(crate) fn new(allow: Vec<String>) -> Self {
        Self {
            allow,
            cache: HashMap::new(),
        }
    }

    /// The longest allowlisted name `specifier` is, or lives under.
    pub(crate) fn matching(&self, specifier: &str) -> Option<&str> {
        self.allow
            .iter()
            .filter(|name| {
                specifier == name.as_str()
                    || specifier
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|name| name.len())
            .map(String::as_str)
    }
}

impl Evaluator {
    /// The value a bare specifier resolves to: a host capability when
    /// allowlisted, otherwise an empty stub object. Repeated requests get
    /// the same value.
    pub fn capability(&mut self, specifier: &str) -> Value {
        let matched = self.capabilities.matching(specifier).map(str::to_string);
        let key = matched.clone().unwrap_or_else(|| specifier.to_string());
        if let Some(value) = self.capabilities.cache.get(&key) {
            return value.clone();
        }
        let value = match matched.as_deref() {
            Some("react") => react(),
            Some("react-dom") => react_dom(),
            Some(_) | None => {
                tracing::debug!(specifier, "bare specifier served by an empty stub");
                Value::object(PropertyMap::new())
            }
        };
        self.capabilities.cache.insert(key, value.clone());
        value
    }

    /// The value of the nearest enclosing provider of `provider`'s context.
    pub(crate) fn context_value(&self, provider: &ObjectRef) -> Value {
        self.contexts
            .iter()
            .rev()
            .find(|(p, _)| p.ptr_eq(provider))
            .map(|(_, value)| value.clone())
            .or_else(|| provider.get("_defaultValue"))
            .unwrap_or(Value::Undefined)
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn entries<const N: usize>(items: [(&str, Value); N]) -> PropertyMap {
    items.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// react
// ══════════════════════════════════════════════════════════════════════════════

fn react() -> Value {
    let ids = Rc::new(Cell::new(0u32));
    let children = Value::object(entries([
        ("toArray", Value::native("toArray", |_, _, args| {
            Ok(Value::array(children_list(&arg(&args, 0))))
        })),
        ("count", Value::native("count", |_, _, args| {
            Ok(Value::Number(children_list(&arg(&args, 0)).len() as f64))
        })),
        ("map", Value::native("map", |ev, _, args| {
            let callback = arg(&args, 1);
            let mut out = Vec::new();
            for (i, child) in children_list(&arg(&args, 0)).into_iter().enumerate() {
                out.push(ev.call(&callback, Value::Undefined, vec![child, Value::Number(i as f64)])?);
            }
            Ok(Value::array(out))
        })),
        ("forEach", Value::native("forEach", |ev, _, args| {
            let callback = arg(&args, 1);
            for (i, child) in children_list(&arg(&args, 0)).into_iter().enumerate() {
                ev.call(&callback, Value::Undefined, vec![child, Value::Number(i as f64)])?;
            }
            Ok(Value::Undefined)
        })),
        ("only", Value::native("only", |_, _, args| match children_list(&arg(&args, 0)).as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(EvalError::type_error(
                "React.Children.only expected to receive a single React element child.",
            )),
        })),
    ]));

    Value::object(entries([
        ("version", Value::string(REACT_VERSION)),
        ("createElement", Value::native("createElement", |_, _, args| Ok(create_element(args)))),
        ("cloneElement", Value::native("cloneElement", |_, _, args| clone_element(args))),
        ("isValidElement", Value::native("isValidElement", |_, _, args| {
            Ok(Value::Bool(is_element(&arg(&args, 0))))
        })),
        ("Fragment", marker(ObjectClass::Fragment)),
        ("StrictMode", marker(ObjectClass::StrictMode)),
        ("Suspense", marker(ObjectClass::Fragment)),
        ("Profiler", marker(ObjectClass::Fragment)),
        ("Children", children),
        ("createContext", Value::native("createContext", |_, _, args| Ok(create_context(arg(&args, 0))))),
        ("memo", Value::native("memo", |_, _, args| Ok(arg(&args, 0)))),
        ("forwardRef", Value::native("forwardRef", |_, _, args| {
            let render = arg(&args, 0);
            Ok(Value::native("ForwardRef", move |ev, _, args| {
                ev.call(&render, Value::Undefined, vec![arg(&args, 0), Value::Null])
            }))
        })),
        ("useState", Value::native("useState", |ev, _, args| {
            let state = match arg(&args, 0) {
                init @ Value::Function(_) => ev.call(&init, Value::Undefined, Vec::new())?,
                init => init,
            };
            Ok(Value::array(vec![state, noop("setState")]))
        })),
        ("useReducer", Value::native("useReducer", |ev, _, args| {
            let state = match arg(&args, 2) {
                init @ Value::Function(_) => ev.call(&init, Value::Undefined, vec![arg(&args, 1)])?,
                _ => arg(&args, 1),
            };
            Ok(Value::array(vec![state, noop("dispatch")]))
        })),
        ("useEffect", noop("useEffect")),
        ("useLayoutEffect", noop("useLayoutEffect")),
        ("useInsertionEffect", noop("useInsertionEffect")),
        ("useImperativeHandle", noop("useImperativeHandle")),
        ("useDebugValue", noop("useDebugValue")),
        ("useMemo", Value::native("useMemo", |ev, _, args| {
            ev.call(&arg(&args, 0), Value::Undefined, Vec::new())
        })),
        ("useCallback", Value::native("useCallback", |_, _, args| Ok(arg(&args, 0)))),
        ("useRef", Value::native("useRef", |_, _, args| {
            Ok(Value::object(entries([("current", arg(&args, 0))])))
        })),
        ("useContext", Value::native("useContext", |ev, _, args| {
            match arg(&args, 0).own_property("Provider") {
                Some(Value::Object(provider)) => Ok(ev.context_value(&provider)),
                _ => Err(EvalError::type_error("useContext expects a context object")),
            }
        })),
        ("useId", Value::native("useId", move |_, _, _| {
            let id = ids.get();
            ids.set(id + 1);
            Ok(Value::string(format!(":r{id}:")))
        })),
        ("useTransition", Value::native("useTransition", |_, _, _| {
            let start = Value::native("startTransition", |ev, _, args| {
                ev.call(&arg(&args, 0), Value::Undefined, Vec::new())
            });
            Ok(Value::array(vec![Value::Bool(false), start]))
        })),
        ("useDeferredValue", Value::native("useDeferredValue", |_, _, args| Ok(arg(&args, 0)))),
        ("useSyncExternalStore", Value::native("useSyncExternalStore", |ev, _, args| {
            ev.call(&arg(&args, 1), Value::Undefined, Vec::new())
        })),
    ]))
}

fn noop(name: &str) -> Value {
    Value::native(name, |_, _, _| Ok(Value::Undefined))
}

fn marker(class: ObjectClass) -> Value {
    Value::object_of(class, PropertyMap::new())
}

pub fn is_element(value: &Value) -> bool {
    matches!(value, Value::Object(obj) if obj.class() == ObjectClass::Element)
}

/// `createElement(type, config, ...children)`
pub fn create_element(args: Vec<Value>) -> Value {
    let mut args = args.into_iter();
    let element_type = args.next().unwrap_or(Value::Undefined);
    let config = args.next().unwrap_or(Value::Null);
    let children: Vec<Value> = args.collect();

    let mut props = PropertyMap::new();
    let mut key = Value::Null;
    if let Value::Object(config) = &config {
        for (name, value) in config.entries() {
            match name.as_str() {
                "key" if !value.is_nullish() => key = Value::string(value.to_display()),
                "key" | "ref" => {}
                _ => {
                    props.insert(name, value);
                }
            }
        }
    }
    set_children(&mut props, children);
    if let Some(Value::Object(defaults)) = element_type.own_property("defaultProps") {
        for (name, value) in defaults.entries() {
            if props.get(&name).map_or(true, |v| matches!(v, Value::Undefined)) {
                props.insert(name, value);
            }
        }
    }
    element(element_type, props, key)
}

fn set_children(props: &mut PropertyMap, mut children: Vec<Value>) {
    match children.len() {
        0 => {}
        1 => {
            props.insert("children".into(), children.remove(0));
        }
        _ => {
            props.insert("children".into(), Value::array(children));
        }
    }
}

fn element(element_type: Value, props: PropertyMap, key: Value) -> Value {
    Value::object_of(
        ObjectClass::Element,
        entries([
            ("type", element_type),
            ("props", Value::object(props)),
            ("key", key),
        ]),
    )
}

fn clone_element(args: Vec<Value>) -> EvalResult<Value> {
    let mut args = args.into_iter();
    let original = args.next().unwrap_or(Value::Undefined);
    let Value::Object(original) = original else {
        return Err(EvalError::type_error(
            "React.cloneElement(...): The argument must be a React element.",
        ));
    };
    let mut props = match original.get("props") {
        Some(Value::Object(props)) => props.entries().into_iter().collect(),
        _ => PropertyMap::new(),
    };
    let mut key = original.get("key").unwrap_or(Value::Null);
    if let Some(Value::Object(overrides)) = args.next() {
        for (name, value) in overrides.entries() {
            match name.as_str() {
                "key" => key = Value::string(value.to_display()),
                "ref" => {}
                _ => {
                    props.insert(name, value);
                }
            }
        }
    }
    set_children(&mut props, args.collect());
    Ok(element(
        original.get("type").unwrap_or(Value::Undefined),
        props,
        key,
    ))
}

fn create_context(default: Value) -> Value {
    let provider = Value::object_of(
        ObjectClass::Provider,
        entries([("_defaultValue", default.clone())]),
    );
    let consumer = Value::object_of(
        ObjectClass::Consumer,
        entries([("_provider", provider.clone())]),
    );
    Value::object_of(
        ObjectClass::Context,
        entries([
            ("Provider", provider),
            ("Consumer", consumer),
            ("_currentValue", default),
        ]),
    )
}

/// Flattened children with holes (`null`, booleans) removed.
fn children_list(children: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    collect_children(children, &mut out);
    out
}

fn collect_children(children: &Value, out: &mut Vec<Value>) {
    match children {
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        Value::Array(items) => {
            for item in items.snapshot() {
                collect_children(&item, out);
            }
        }
        other => out.push(other.clone()),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// react-dom
// ══════════════════════════════════════════════════════════════════════════════

fn react_dom() -> Value {
    let render_root = |name: &str| {
        Value::native(name, |ev, _, args| {
            ev.rendered_root = Some(arg(&args, 0));
            Ok(Value::Undefined)
        })
    };
    Value::object(entries([
        ("version", Value::string(REACT_VERSION)),
        ("createRoot", Value::native("createRoot", move |_, _, _| {
            Ok(Value::object(entries([
                ("render", Value::native("render", |ev, _, args| {
                    ev.rendered_root = Some(arg(&args, 0));
                    Ok(Value::Undefined)
                })),
                ("unmount", noop("unmount")),
            ])))
        })),
        ("hydrateRoot", Value::native("hydrateRoot", |ev, _, args| {
            ev.rendered_root = Some(arg(&args, 1));
            Ok(Value::object(entries([("unmount", noop("unmount"))])))
        })),
        ("render", render_root("render")),
        ("hydrate", render_root("hydrate")),
        ("createPortal", Value::native("createPortal", |_, _, args| Ok(arg(&args, 0)))),
        ("flushSync", Value::native("flushSync", |ev, _, args| {
            ev.call(&arg(&args, 0), Value::Undefined, Vec::new())
        })),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_matching_is_longest_prefix() {
        let caps = Capabilities::new(vec!["react".into(), "react-dom".into()]);
        assert_eq!(caps.matching("react"), Some("react"));
        assert_eq!(caps.matching("react/jsx-runtime"), Some("react"));
        assert_eq!(caps.matching("react-dom/client"), Some("react-dom"));
        assert_eq!(caps.matching("react-router"), None);
        assert_eq!(caps.matching("lodash"), None);
    }

    #[test]
    fn test_create_element_props() {
        let mut config = PropertyMap::new();
        config.insert("key".into(), Value::Number(1.0));
        config.insert("id".into(), Value::string("x"));
        let el = create_element(vec![
            Value::string("li"),
            Value::object(config),
            Value::string("a"),
            Value::string("b"),
        ]);
        assert!(is_element(&el));
        let props = el.own_property("props").unwrap();
        assert!(props.own_property("key").is_none());
        assert_eq!(el.own_property("key").unwrap().to_display(), "1");
        assert!(matches!(props.own_property("children"), Some(Value::Array(c)) if c.len() == 2));
    }

    #[test]
    fn test_single_child_is_not_wrapped() {
        let el = create_element(vec![Value::string("p"), Value::Null, Value::string("only")]);
        let props = el.own_property("props").unwrap();
        assert!(matches!(props.own_property("children"), Some(Value::String(s)) if &*s == "only"));
    }

    #[test]
    fn test_stub_and_capability_identity() {
        let mut ev = Evaluator::default();
        let a = ev.capability("react");
        let b = ev.capability("react/jsx-runtime");
        assert!(a.strict_eq(&b));
        let stub = ev.capability("lucide-react");
        assert!(matches!(&stub, Value::Object(obj) if obj.keys().is_empty()));
        assert!(stub.strict_eq(&ev.capability("lucide-react")));
    }
}
