//! Promises without an event loop.
//!
//! An async function runs to completion when called and hands back an
//! already settled promise. `then` callbacks run as soon as they are
//! attached to a settled promise. A promise nothing resolves stays pending
//! forever; awaiting one unwinds to the nearest async call, whose own
//! promise is then pending too.

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::globals::{first, props, with_statics};
use crate::value::*;

pub(crate) const STATE_SLOT: &str = "[[PromiseState]]";
pub(crate) const RESULT_SLOT: &str = "[[PromiseResult]]";

pub(crate) const PROMISE_METHODS: &[&str] = &["catch", "finally", "then"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

impl PromiseState {
    fn as_str(self) -> &'static str {
        match self {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled => "fulfilled",
            PromiseState::Rejected => "rejected",
        }
    }

    fn parse(text: &str) -> Self {
        match text {
            "fulfilled" => PromiseState::Fulfilled,
            "rejected" => PromiseState::Rejected,
            _ => PromiseState::Pending,
        }
    }
}

fn promise_object(state: PromiseState, result: Value) -> ObjectRef {
    let mut props = PropertyMap::new();
    props.insert(STATE_SLOT.into(), Value::string(state.as_str()));
    props.insert(RESULT_SLOT.into(), result);
    ObjectRef::new(ObjectClass::Promise, props)
}

pub(crate) fn new_promise(state: PromiseState, result: Value) -> Value {
    Value::Object(promise_object(state, result))
}

pub(crate) fn as_promise(value: &Value) -> Option<&ObjectRef> {
    match value {
        Value::Object(obj) if obj.class() == ObjectClass::Promise => Some(obj),
        _ => None,
    }
}

pub(crate) fn state_of(obj: &ObjectRef) -> (PromiseState, Value) {
    let state = obj
        .get(STATE_SLOT)
        .map_or(PromiseState::Pending, |s| PromiseState::parse(&s.to_display()));
    (state, obj.get(RESULT_SLOT).unwrap_or(Value::Undefined))
}

/// Settle `obj` unless it already is. Resolving with a settled promise
/// adopts its outcome; with a pending one leaves `obj` pending.
fn settle(obj: &ObjectRef, state: PromiseState, value: Value) {
    if state_of(obj).0 != PromiseState::Pending {
        return;
    }
    let (state, value) = match (state, as_promise(&value)) {
        (PromiseState::Fulfilled, Some(inner)) => state_of(inner),
        _ => (state, value),
    };
    if state != PromiseState::Pending {
        obj.set(STATE_SLOT, Value::string(state.as_str()));
        obj.set(RESULT_SLOT, value);
    }
}

impl Evaluator {
    /// The promise an async call hands back for its body's outcome.
    /// Resource limits still abort the realm.
    pub(crate) fn promise_from(&mut self, outcome: EvalResult<Value>) -> EvalResult<Value> {
        match outcome {
            Ok(value) => Ok(resolved(value)),
            Err(EvalError::Suspended) => Ok(new_promise(PromiseState::Pending, Value::Undefined)),
            Err(err) if err.is_catchable() => {
                Ok(new_promise(PromiseState::Rejected, self.error_to_value(err)))
            }
            Err(err) => Err(err),
        }
    }

    /// `await value`
    pub(crate) fn await_value(&mut self, value: Value) -> EvalResult<Value> {
        let Some(obj) = as_promise(&value) else {
            return Ok(value);
        };
        match state_of(obj) {
            (PromiseState::Fulfilled, result) => Ok(result),
            (PromiseState::Rejected, reason) => Err(EvalError::Thrown(reason)),
            (PromiseState::Pending, _) => Err(EvalError::Suspended),
        }
    }
}

/// `Promise.resolve(value)`: promises pass through unchanged.
fn resolved(value: Value) -> Value {
    match as_promise(&value) {
        Some(_) => value,
        None => new_promise(PromiseState::Fulfilled, value),
    }
}

pub(crate) fn promise_method(ev: &mut Evaluator, obj: &ObjectRef, name: &str, args: &[Value]) -> EvalResult<Value> {
    let handler = |i: usize| match args.get(i) {
        Some(f @ Value::Function(_)) => Some(f.clone()),
        _ => None,
    };
    let (state, result) = state_of(obj);
    if state == PromiseState::Pending {
        return Ok(new_promise(PromiseState::Pending, Value::Undefined));
    }
    match name {
        "finally" => {
            if let Some(callback) = handler(0) {
                if let Err(err) = ev.call(&callback, Value::Undefined, Vec::new()) {
                    return ev.promise_from(Err(err));
                }
            }
            Ok(new_promise(state, result))
        }
        _ => {
            let (on_fulfilled, on_rejected) = if name == "then" {
                (handler(0), handler(1))
            } else {
                (None, handler(0))
            };
            let callback = if state == PromiseState::Fulfilled { on_fulfilled } else { on_rejected };
            match callback {
                Some(callback) => {
                    let outcome = ev.call(&callback, Value::Undefined, vec![result]);
                    ev.promise_from(outcome)
                }
                None => Ok(new_promise(state, result)),
            }
        }
    }
}

/// Console rendering: `Promise { 1 }`, `Promise { <pending> }`.
pub(crate) fn inspect_promise(obj: &ObjectRef, inspect: impl Fn(&Value) -> String) -> String {
    match state_of(obj) {
        (PromiseState::Pending, _) => "Promise { <pending> }".into(),
        (PromiseState::Fulfilled, value) => format!("Promise {{ {} }}", inspect(&value)),
        (PromiseState::Rejected, reason) => format!("Promise {{ <rejected> {} }}", inspect(&reason)),
    }
}

fn settle_fn(name: &str, promise: &ObjectRef, state: PromiseState) -> Value {
    let promise = promise.clone();
    Value::native(name, move |_, _, args| {
        settle(&promise, state, first(&args));
        Ok(Value::Undefined)
    })
}

/// `new Promise(executor)` and its statics.
pub(crate) fn promise_constructor() -> Value {
    let constructor = Value::constructor("Promise", |ev, _, args| {
        let executor = match args.first() {
            Some(f @ Value::Function(_)) => f.clone(),
            other => {
                return Err(EvalError::type_error(format!(
                    "Promise resolver {} is not a function",
                    other.map_or_else(|| "undefined".to_string(), Value::to_display)
                )))
            }
        };
        let promise = promise_object(PromiseState::Pending, Value::Undefined);
        let resolve = settle_fn("resolve", &promise, PromiseState::Fulfilled);
        let reject = settle_fn("reject", &promise, PromiseState::Rejected);
        if let Err(err) = ev.call(&executor, Value::Undefined, vec![resolve, reject]) {
            if !err.is_catchable() {
                return Err(err);
            }
            settle(&promise, PromiseState::Rejected, ev.error_to_value(err));
        }
        Ok(Value::Object(promise))
    });
    with_statics(constructor, [
        ("resolve", Value::native("resolve", |_, _, args| Ok(resolved(first(&args))))),
        ("reject", Value::native("reject", |_, _, args| {
            Ok(new_promise(PromiseState::Rejected, first(&args)))
        })),
        ("all", Value::native("all", |ev, _, args| {
            let mut values = Vec::new();
            let mut pending = false;
            for item in ev.iterate(&first(&args))? {
                match as_promise(&item).map(state_of) {
                    Some((PromiseState::Rejected, reason)) => {
                        return Ok(new_promise(PromiseState::Rejected, reason))
                    }
                    Some((PromiseState::Pending, _)) => pending = true,
                    Some((PromiseState::Fulfilled, value)) => values.push(value),
                    None => values.push(item),
                }
            }
            Ok(if pending {
                new_promise(PromiseState::Pending, Value::Undefined)
            } else {
                new_promise(PromiseState::Fulfilled, Value::array(values))
            })
        })),
        ("allSettled", Value::native("allSettled", |ev, _, args| {
            let mut outcomes = Vec::new();
            for item in ev.iterate(&first(&args))? {
                let outcome = match as_promise(&item).map(state_of) {
                    Some((PromiseState::Pending, _)) => {
                        return Ok(new_promise(PromiseState::Pending, Value::Undefined))
                    }
                    Some((PromiseState::Rejected, reason)) => {
                        props([("status", Value::string("rejected")), ("reason", reason)])
                    }
                    Some((PromiseState::Fulfilled, value)) => {
                        props([("status", Value::string("fulfilled")), ("value", value)])
                    }
                    None => props([("status", Value::string("fulfilled")), ("value", item)]),
                };
                outcomes.push(Value::object(outcome));
            }
            Ok(new_promise(PromiseState::Fulfilled, Value::array(outcomes)))
        })),
        ("race", Value::native("race", |ev, _, args| {
            for item in ev.iterate(&first(&args))? {
                match as_promise(&item).map(state_of) {
                    Some((PromiseState::Pending, _)) => {}
                    Some((state, value)) => return Ok(new_promise(state, value)),
                    None => return Ok(new_promise(PromiseState::Fulfilled, item)),
                }
            }
            Ok(new_promise(PromiseState::Pending, Value::Undefined))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvalOptions;

    #[test]
    fn test_outcomes_become_promises() {
        let mut ev = Evaluator::new(EvalOptions::default());
        let done = ev.promise_from(Ok(Value::Number(1.0))).unwrap();
        assert_eq!(ev.await_value(done).unwrap().to_number(), 1.0);

        let failed = ev.promise_from(Err(EvalError::type_error("nope"))).unwrap();
        assert!(matches!(ev.await_value(failed), Err(EvalError::Thrown(_))));

        let pending = ev.promise_from(Err(EvalError::Suspended)).unwrap();
        assert!(matches!(ev.await_value(pending), Err(EvalError::Suspended)));

        assert!(ev.promise_from(Err(EvalError::GasExhausted(1))).is_err());
    }

    #[test]
    fn test_settle_happens_once() {
        let promise = promise_object(PromiseState::Pending, Value::Undefined);
        settle(&promise, PromiseState::Fulfilled, Value::Number(1.0));
        settle(&promise, PromiseState::Rejected, Value::Number(2.0));
        let (state, value) = state_of(&promise);
        assert_eq!(state, PromiseState::Fulfilled);
        assert_eq!(value.to_number(), 1.0);
    }
}
