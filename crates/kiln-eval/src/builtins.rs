//! Built-in properties and methods of arrays, strings, numbers, functions,
//! plain objects and dates. `RegExp` and `Promise` methods live in their
//! own modules and are dispatched from here.

use std::cmp::Ordering;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::{property_key, Evaluator};
use crate::promise::{promise_method, PROMISE_METHODS};
use crate::regexp::{self, as_regexp, regexp_method, regexp_property, PATTERN_METHODS, REGEXP_METHODS};
use crate::value::*;

const ARRAY_METHODS: &[&str] = &[
    "at", "concat", "every", "fill", "filter", "find", "findIndex", "findLast", "flat", "flatMap",
    "forEach", "includes", "indexOf", "join", "lastIndexOf", "map", "pop", "push", "reduce",
    "reverse", "shift", "slice", "some", "sort", "splice", "toString", "unshift",
];

const STRING_METHODS: &[&str] = &[
    "at", "charAt", "charCodeAt", "concat", "endsWith", "includes", "indexOf", "lastIndexOf",
    "localeCompare", "match", "matchAll", "padEnd", "padStart", "repeat", "replace", "replaceAll",
    "search", "slice", "split", "startsWith", "substring", "toLowerCase", "toString", "toUpperCase", "trim", "trimEnd",
    "trimStart",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toLocaleString", "toString"];
const FUNCTION_METHODS: &[&str] = &["apply", "bind", "call"];
const OBJECT_METHODS: &[&str] = &["hasOwnProperty", "toString"];

const DATE_METHODS: &[&str] = &[
    "getDate", "getDay", "getFullYear", "getHours", "getMinutes", "getMonth", "getSeconds",
    "getTime", "toISOString", "toLocaleDateString", "toLocaleTimeString",
];

/// Hidden slot holding a date's epoch milliseconds.
pub(crate) const DATE_SLOT: &str = "[[DateValue]]";

/// Nesting `flat` follows before giving up on a self-containing array.
const MAX_FLAT_DEPTH: usize = 64;

pub(crate) fn has_method(receiver: &Value, name: &str) -> bool {
    match receiver {
        Value::Array(_) => ARRAY_METHODS.contains(&name),
        Value::String(_) => STRING_METHODS.contains(&name),
        Value::Number(_) => NUMBER_METHODS.contains(&name),
        Value::Bool(_) => name == "toString",
        Value::Function(_) => FUNCTION_METHODS.contains(&name),
        Value::Object(obj) => {
            OBJECT_METHODS.contains(&name)
                || match obj.class() {
                    ObjectClass::Date => DATE_METHODS.contains(&name),
                    ObjectClass::RegExp => REGEXP_METHODS.contains(&name),
                    ObjectClass::Promise => PROMISE_METHODS.contains(&name),
                    _ => false,
                }
        }
        Value::Undefined | Value::Null => false,
    }
}

/// Built-in property read; methods come back bound to `object`.
pub(crate) fn get_builtin(object: &Value, key: &str) -> Option<Value> {
    match object {
        Value::Array(items) => {
            if key == "length" {
                return Some(Value::Number(items.len() as f64));
            }
            if let Ok(index) = key.parse::<usize>() {
                return Some(items.get(index));
            }
        }
        Value::String(s) => {
            if key == "length" {
                return Some(Value::Number(s.chars().count() as f64));
            }
            if let Ok(index) = key.parse::<usize>() {
                return Some(
                    s.chars()
                        .nth(index)
                        .map(|c| Value::string(c.to_string()))
                        .unwrap_or(Value::Undefined),
                );
            }
        }
        Value::Function(func) if key == "name" => return Some(Value::string(func.name())),
        Value::Object(obj) if obj.class() == ObjectClass::RegExp => {
            if let Some(value) = regexp_property(obj, key) {
                return Some(value);
            }
        }
        _ => {}
    }
    if !has_method(object, key) {
        return None;
    }
    let receiver = object.clone();
    let name = key.to_string();
    Some(Value::native(key, move |ev, _this, args| {
        Ok(call_method(ev, &receiver, &name, args)?.unwrap_or(Value::Undefined))
    }))
}

/// Call a built-in method; `None` if `receiver` has no method `name`.
pub(crate) fn call_method(ev: &mut Evaluator, receiver: &Value, name: &str, args: Vec<Value>) -> EvalResult<Option<Value>> {
    if !has_method(receiver, name) {
        return Ok(None);
    }
    let value = match receiver {
        Value::Array(items) => array_method(ev, items, name, args)?,
        Value::String(s) => string_method(ev, s, name, args)?,
        Value::Number(n) => number_method(*n, name, &args),
        Value::Bool(b) => Value::string(b.to_string()),
        Value::Function(_) => function_method(ev, receiver, name, args)?,
        Value::Object(obj) => match obj.class() {
            ObjectClass::RegExp if REGEXP_METHODS.contains(&name) => regexp_method(ev, obj, name, &args)?,
            ObjectClass::Promise if PROMISE_METHODS.contains(&name) => promise_method(ev, obj, name, &args)?,
            _ => object_method(obj, name, &args),
        },
        Value::Undefined | Value::Null => return Ok(None),
    };
    Ok(Some(value))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

/// Resolve a possibly negative index argument against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_eq(b),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Arrays
// ══════════════════════════════════════════════════════════════════════════════

fn array_method(ev: &mut Evaluator, array: &ArrayRef, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let this = Value::Array(array.clone());
    let len = array.len();
    ev.charge(len as u64 / 16)?;
    match name {
        "push" => {
            ev.array_length((len + args.len()) as f64, len)?;
            let mut items = array.borrow_mut();
            items.extend(args);
            Ok(Value::Number(items.len() as f64))
        }
        "pop" => Ok(array.borrow_mut().pop().unwrap_or(Value::Undefined)),
        "shift" => {
            let mut items = array.borrow_mut();
            Ok(if items.is_empty() { Value::Undefined } else { items.remove(0) })
        }
        "unshift" => {
            ev.array_length((len + args.len()) as f64, len)?;
            let mut items = array.borrow_mut();
            items.splice(0..0, args);
            Ok(Value::Number(items.len() as f64))
        }
        "slice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len).max(start);
            Ok(Value::array(array.snapshot()[start..end].to_vec()))
        }
        "splice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let count = match args.get(1) {
                None => len - start,
                Some(n) => (n.to_number().max(0.0) as usize).min(len - start),
            };
            let inserted: Vec<Value> = args.into_iter().skip(2).collect();
            ev.array_length((len - count + inserted.len()) as f64, len)?;
            let removed: Vec<Value> = array.borrow_mut().splice(start..start + count, inserted).collect();
            Ok(Value::array(removed))
        }
        "concat" => {
            let added: usize = args
                .iter()
                .map(|v| match v {
                    Value::Array(other) => other.len(),
                    _ => 1,
                })
                .sum();
            ev.array_length((len + added) as f64, 0)?;
            let mut items = array.snapshot();
            for value in args {
                match value {
                    Value::Array(other) => items.extend(other.snapshot()),
                    other => items.push(other),
                }
            }
            Ok(Value::array(items))
        }
        "join" | "toString" => {
            let separator = match args.first() {
                Some(sep) if name == "join" && !matches!(sep, Value::Undefined) => ev.display(sep)?,
                _ => ",".to_string(),
            };
            let joined = join_within(array, &separator, MAX_STRING_LENGTH)
                .ok_or_else(|| EvalError::range_error("Invalid string length"))?;
            ev.charge(joined.len() as u64 / 64)?;
            Ok(Value::string(joined))
        }
        "includes" => {
            let needle = arg(&args, 0);
            Ok(Value::Bool(array.snapshot().iter().any(|v| same_value_zero(v, &needle))))
        }
        "indexOf" | "lastIndexOf" => {
            let needle = arg(&args, 0);
            let items = array.snapshot();
            let found = if name == "indexOf" {
                items.iter().position(|v| v.strict_eq(&needle))
            } else {
                items.iter().rposition(|v| v.strict_eq(&needle))
            };
            Ok(Value::Number(found.map_or(-1.0, |i| i as f64)))
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            Ok(if index < 0.0 { Value::Undefined } else { array.get(index as usize) })
        }
        "fill" => {
            let value = arg(&args, 0);
            for slot in array.borrow_mut().iter_mut() {
                *slot = value.clone();
            }
            Ok(this)
        }
        "reverse" => {
            array.borrow_mut().reverse();
            Ok(this)
        }
        "sort" => {
            let sorted = sort_values(ev, array.snapshot(), &arg(&args, 0))?;
            *array.borrow_mut() = sorted;
            Ok(this)
        }
        "flat" => {
            let depth = match arg(&args, 0) {
                Value::Undefined => 1.0,
                d => d.to_number(),
            };
            let mut out = Vec::new();
            flatten_into(ev, &mut out, array.snapshot(), depth, 0)?;
            Ok(Value::array(out))
        }
        "reduce" => {
            let callback = callable(&arg(&args, 0))?;
            let mut items = array.snapshot().into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match items.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(EvalError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for (i, item) in items {
                acc = ev.call(&callback, Value::Undefined, vec![acc, item, Value::Number(i as f64), this.clone()])?;
            }
            Ok(acc)
        }
        _ => iterate_with_callback(ev, array, name, &args, this),
    }
}

fn callable(value: &Value) -> EvalResult<Value> {
    match value {
        Value::Function(_) => Ok(value.clone()),
        other => Err(EvalError::type_error(format!(
            "{} is not a function",
            other.to_display()
        ))),
    }
}

/// `map`, `filter`, `forEach` and the other callback-per-element methods.
fn iterate_with_callback(ev: &mut Evaluator, array: &ArrayRef, name: &str, args: &[Value], this: Value) -> EvalResult<Value> {
    let callback = callable(&arg(args, 0))?;
    let items = array.snapshot();
    let visit = |ev: &mut Evaluator, i: usize, item: &Value| {
        ev.call(
            &callback,
            Value::Undefined,
            vec![item.clone(), Value::Number(i as f64), this.clone()],
        )
    };
    match name {
        "map" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(visit(ev, i, item)?);
            }
            Ok(Value::array(out))
        }
        "flatMap" => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match visit(ev, i, item)? {
                    Value::Array(inner) => out.extend(inner.snapshot()),
                    other => out.push(other),
                }
            }
            Ok(Value::array(out))
        }
        "filter" => {
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if visit(ev, i, item)?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::array(out))
        }
        "forEach" => {
            for (i, item) in items.iter().enumerate() {
                visit(ev, i, item)?;
            }
            Ok(Value::Undefined)
        }
        "find" | "findIndex" => {
            for (i, item) in items.iter().enumerate() {
                if visit(ev, i, item)?.is_truthy() {
                    return Ok(if name == "find" { item.clone() } else { Value::Number(i as f64) });
                }
            }
            Ok(if name == "find" { Value::Undefined } else { Value::Number(-1.0) })
        }
        "findLast" => {
            for (i, item) in items.iter().enumerate().rev() {
                if visit(ev, i, item)?.is_truthy() {
                    return Ok(item.clone());
                }
            }
            Ok(Value::Undefined)
        }
        "some" => {
            for (i, item) in items.iter().enumerate() {
                if visit(ev, i, item)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "every" => {
            for (i, item) in items.iter().enumerate() {
                if !visit(ev, i, item)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        _ => Ok(Value::Undefined),
    }
}

fn flatten_into(ev: &mut Evaluator, out: &mut Vec<Value>, items: Vec<Value>, depth: f64, level: usize) -> EvalResult<()> {
    if level > MAX_FLAT_DEPTH {
        return Err(EvalError::range_error("Maximum call stack size exceeded"));
    }
    ev.charge(items.len() as u64)?;
    for item in items {
        match item {
            Value::Array(inner) if depth >= 1.0 => {
                flatten_into(ev, out, inner.snapshot(), depth - 1.0, level + 1)?;
            }
            other => out.push(other),
        }
    }
    Ok(())
}

/// Stable merge sort that tolerates inconsistent comparators and
/// propagates comparator errors.
fn sort_values(ev: &mut Evaluator, mut items: Vec<Value>, comparator: &Value) -> EvalResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = sort_values(ev, items, comparator)?;
    let right = sort_values(ev, right, comparator)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let take_right = sort_compare(ev, l, r, comparator)? == Ordering::Greater;
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn sort_compare(ev: &mut Evaluator, a: &Value, b: &Value, comparator: &Value) -> EvalResult<Ordering> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => return Ok(Ordering::Equal),
        (Value::Undefined, _) => return Ok(Ordering::Greater),
        (_, Value::Undefined) => return Ok(Ordering::Less),
        _ => {}
    }
    if let Value::Function(_) = comparator {
        let n = ev
            .call(comparator, Value::Undefined, vec![a.clone(), b.clone()])?
            .to_number();
        return Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal));
    }
    Ok(a.to_display().cmp(&b.to_display()))
}

// ══════════════════════════════════════════════════════════════════════════════
// Strings
// ══════════════════════════════════════════════════════════════════════════════

fn char_index(s: &str, byte: usize) -> f64 {
    s[..byte].chars().count() as f64
}

fn string_method(ev: &mut Evaluator, s: &str, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    ev.charge(s.len() as u64 / 64)?;
    if PATTERN_METHODS.contains(&name) {
        if let Some(value) = pattern_method(ev, s, name, &args)? {
            return Ok(value);
        }
    }
    let text = |i: usize| arg(&args, i).to_display();
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let value = match name {
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "trim" => Value::string(s.trim()),
        "trimStart" => Value::string(s.trim_start()),
        "trimEnd" => Value::string(s.trim_end()),
        "toString" => Value::string(s),
        "includes" => Value::Bool(s.contains(text(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text(0).as_str())),
        "indexOf" => Value::Number(s.find(text(0).as_str()).map_or(-1.0, |b| char_index(s, b))),
        "lastIndexOf" => Value::Number(s.rfind(text(0).as_str()).map_or(-1.0, |b| char_index(s, b))),
        "slice" => {
            let start = relative_index(&arg(&args, 0), len, 0);
            let end = relative_index(&arg(&args, 1), len, len).max(start);
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                v => {
                    let n = v.to_number();
                    if n.is_nan() { 0 } else { n.clamp(0.0, len as f64) as usize }
                }
            };
            let a = clamp(arg(&args, 0), 0);
            let b = clamp(arg(&args, 1), len);
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "charAt" => {
            let i = arg(&args, 0).to_number();
            let c = if i.is_nan() { chars.first() } else { chars.get(i as usize) };
            Value::string(c.map(|c| c.to_string()).unwrap_or_default())
        }
        "charCodeAt" => {
            let i = arg(&args, 0).to_number();
            let i = if i.is_nan() { 0 } else { i as usize };
            Value::Number(chars.get(i).map_or(f64::NAN, |c| f64::from(u32::from(*c))))
        }
        "at" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            let index = if n < 0.0 { len as f64 + n } else { n };
            match chars.get(index as usize) {
                Some(c) if index >= 0.0 => Value::string(c.to_string()),
                _ => Value::Undefined,
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in &args {
                out.push_str(&ev.display(value)?);
                ev.check_string_length(out.len() as f64)?;
            }
            Value::string(out)
        }
        "repeat" => {
            let n = arg(&args, 0).to_number();
            let n = if n.is_nan() { 0.0 } else { n };
            if n < 0.0 || n.is_infinite() {
                return Err(EvalError::range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(n)
                )));
            }
            ev.check_string_length(s.len() as f64 * n.trunc())?;
            Value::string(s.repeat(n as usize))
        }
        "padStart" | "padEnd" => {
            let target = arg(&args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.clamp(0.0, MAX_ARRAY_LENGTH) as usize };
            let fill = match arg(&args, 1) {
                Value::Undefined => " ".to_string(),
                f => f.to_display(),
            };
            if target <= len || fill.is_empty() {
                Value::string(s)
            } else {
                let cycles = ((target - len) as f64 / fill.chars().count() as f64).ceil();
                ev.check_string_length(s.len() as f64 + cycles * fill.len() as f64)?;
                let padding: String = fill.chars().cycle().take(target - len).collect();
                if name == "padStart" {
                    Value::string(format!("{padding}{s}"))
                } else {
                    Value::string(format!("{s}{padding}"))
                }
            }
        }
        "split" => {
            let parts: Vec<Value> = match arg(&args, 0) {
                Value::Undefined => vec![Value::string(s)],
                sep => {
                    let sep = sep.to_display();
                    if sep.is_empty() {
                        ev.charge(len as u64)?;
                        chars.iter().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        ev.charge(s.matches(sep.as_str()).count() as u64)?;
                        s.split(sep.as_str()).map(Value::string).collect()
                    }
                }
            };
            match arg(&args, 1) {
                Value::Undefined => Value::array(parts),
                limit => Value::array(parts.into_iter().take(limit.to_number().max(0.0) as usize).collect()),
            }
        }
        "replace" | "replaceAll" => {
            let pattern = text(0);
            let replacement = arg(&args, 1);
            let mut out = String::with_capacity(s.len());
            let mut rest = s;
            loop {
                let Some(found) = rest.find(pattern.as_str()) else { break };
                out.push_str(&rest[..found]);
                let with = match &replacement {
                    Value::Function(_) => ev
                        .call(&replacement, Value::Undefined, vec![Value::string(&pattern)])?
                        .to_display(),
                    other => other.to_display(),
                };
                out.push_str(&with);
                if out.len() + rest.len() > MAX_STRING_LENGTH {
                    return Err(EvalError::range_error("Invalid string length"));
                }
                rest = &rest[found + pattern.len()..];
                if name == "replace" {
                    break;
                }
                if pattern.is_empty() {
                    let mut it = rest.chars();
                    match it.next() {
                        Some(c) => out.push(c),
                        None => break,
                    }
                    rest = it.as_str();
                }
            }
            out.push_str(rest);
            Value::string(out)
        }
        "match" | "matchAll" | "search" => {
            // A string argument is a pattern source, as with `new RegExp(text)`.
            let source = match arg(&args, 0) {
                Value::Undefined => "(?:)".to_string(),
                other => ev.display(&other)?,
            };
            let pattern = regexp::new_regexp(ev, &source, if name == "matchAll" { "g" } else { "" })?;
            match pattern_method(ev, s, name, &[pattern])? {
                Some(value) => value,
                None => Value::Null,
            }
        }
        "localeCompare" => Value::Number(match s.cmp(text(0).as_str()) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),
        _ => Value::Undefined,
    };
    Ok(value)
}

/// String methods given a `RegExp`; `None` when the argument is not one.
fn pattern_method(ev: &mut Evaluator, s: &str, name: &str, args: &[Value]) -> EvalResult<Option<Value>> {
    let Some(pattern) = args.first().and_then(as_regexp) else {
        return Ok(None);
    };
    let value = match name {
        "match" => regexp::string_match(ev, s, pattern)?,
        "matchAll" => regexp::string_match_all(ev, s, pattern)?,
        "search" => regexp::string_search(ev, s, pattern)?,
        "split" => {
            let limit = match arg(args, 1) {
                Value::Undefined => None,
                limit => Some(limit.to_number().max(0.0) as usize),
            };
            regexp::string_split(ev, s, pattern, limit)?
        }
        _ => regexp::string_replace(ev, s, pattern, &arg(args, 1), name == "replaceAll")?,
    };
    Ok(Some(value))
}

// ══════════════════════════════════════════════════════════════════════════════
// Numbers
// ══════════════════════════════════════════════════════════════════════════════

fn number_method(n: f64, name: &str, args: &[Value]) -> Value {
    match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 20.0) as usize };
            Value::string(to_fixed(n, digits))
        }
        "toLocaleString" => Value::string(to_locale_string(n)),
        _ => match arg(args, 0) {
            Value::Undefined => Value::string(number_to_string(n)),
            radix => Value::string(to_radix(n, radix.to_number() as u32)),
        },
    }
}

pub(crate) fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let scale = 10f64.powi(digits as i32);
    let rounded = (n.abs() * scale).round() / scale;
    let sign = if n < 0.0 && rounded != 0.0 { "-" } else { "" };
    format!("{sign}{rounded:.digits$}")
}

/// `en-US` grouping with at most three fraction digits.
pub(crate) fn to_locale_string(n: f64) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let rounded = (n.abs() * 1000.0).round() / 1000.0;
    let text = number_to_string(rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 && rounded != 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !(2..=36).contains(&radix) || n.fract() != 0.0 || !n.is_finite() {
        return number_to_string(n);
    }
    let mut value = n.abs() as u64;
    if value == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(std::char::from_digit((value % u64::from(radix)) as u32, radix).unwrap_or('0'));
        value /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions & Objects
// ══════════════════════════════════════════════════════════════════════════════

fn function_method(ev: &mut Evaluator, target: &Value, name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let mut args = args.into_iter();
    let this = args.next().unwrap_or(Value::Undefined);
    match name {
        "call" => ev.call(target, this, args.collect()),
        "apply" => {
            let list = match args.next() {
                Some(Value::Array(items)) => items.snapshot(),
                _ => Vec::new(),
            };
            ev.call(target, this, list)
        }
        _ => {
            let bound: Vec<Value> = args.collect();
            let target = target.clone();
            let label = match &target {
                Value::Function(f) => format!("bound {}", f.name()),
                _ => "bound".into(),
            };
            Ok(Value::native(label, move |ev, _this, rest| {
                let mut all = bound.clone();
                all.extend(rest);
                ev.call(&target, this.clone(), all)
            }))
        }
    }
}

fn object_method(obj: &ObjectRef, name: &str, args: &[Value]) -> Value {
    match name {
        "hasOwnProperty" => Value::Bool(obj.has(&property_key(&arg(args, 0)))),
        "toString" => Value::string(Value::Object(obj.clone()).to_display()),
        _ => date_method(obj, name),
    }
}

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DateParts {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub weekday: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millis: u32,
}

pub(crate) fn date_parts(epoch_ms: f64) -> DateParts {
    let ms = epoch_ms as i64;
    let days = ms.div_euclid(86_400_000);
    let in_day = ms.rem_euclid(86_400_000);

    // Civil date from day count (proleptic Gregorian).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);

    DateParts {
        year,
        month,
        day,
        weekday: (days + 4).rem_euclid(7) as u32,
        hour: (in_day / 3_600_000) as u32,
        minute: (in_day / 60_000 % 60) as u32,
        second: (in_day / 1000 % 60) as u32,
        millis: (in_day % 1000) as u32,
    }
}

/// Days since the epoch for a proleptic Gregorian date.
pub(crate) fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year.rem_euclid(400);
    let mp = (i64::from(month) + 9) % 12;
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn date_method(obj: &ObjectRef, name: &str) -> Value {
    let time = obj.get(DATE_SLOT).map_or(f64::NAN, |t| t.to_number());
    if time.is_nan() {
        return match name {
            "toISOString" | "toLocaleDateString" | "toLocaleTimeString" => Value::string("Invalid Date"),
            _ => Value::Number(f64::NAN),
        };
    }
    let p = date_parts(time);
    match name {
        "getTime" => Value::Number(time),
        "getFullYear" => Value::Number(p.year as f64),
        "getMonth" => Value::Number(f64::from(p.month - 1)),
        "getDate" => Value::Number(f64::from(p.day)),
        "getDay" => Value::Number(f64::from(p.weekday)),
        "getHours" => Value::Number(f64::from(p.hour)),
        "getMinutes" => Value::Number(f64::from(p.minute)),
        "getSeconds" => Value::Number(f64::from(p.second)),
        "toISOString" => Value::string(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            p.year, p.month, p.day, p.hour, p.minute, p.second, p.millis
        )),
        "toLocaleDateString" => Value::string(format!("{}/{}/{}", p.month, p.day, p.year)),
        "toLocaleTimeString" => {
            let (hour, suffix) = match p.hour {
                0 => (12, "AM"),
                h if h < 12 => (h, "AM"),
                12 => (12, "PM"),
                h => (h - 12, "PM"),
            };
            Value::string(format!("{hour}:{:02}:{:02} {suffix}", p.minute, p.second))
        }
        _ => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(1.005, 2), "1.00");
        assert_eq!(to_fixed(-0.001, 2), "0.00");
        assert_eq!(to_fixed(12.0, 2), "12.00");
    }

    #[test]
    fn test_to_locale_string() {
        assert_eq!(to_locale_string(1234567.891), "1,234,567.891");
        assert_eq!(to_locale_string(999.0), "999");
        assert_eq!(to_locale_string(-1000.5), "-1,000.5");
    }

    #[test]
    fn test_radix() {
        assert_eq!(to_radix(255.0, 16), "ff");
        assert_eq!(to_radix(-5.0, 2), "-101");
    }

    #[test]
    fn test_date_parts() {
        // 2024-02-29T13:45:30.250Z, a Thursday.
        let p = date_parts(1_709_214_330_250.0);
        assert_eq!((p.year, p.month, p.day), (2024, 2, 29));
        assert_eq!((p.hour, p.minute, p.second, p.millis), (13, 45, 30, 250));
        assert_eq!(p.weekday, 4);
        let epoch = date_parts(0.0);
        assert_eq!((epoch.year, epoch.month, epoch.day, epoch.weekday), (1970, 1, 1, 4));
        assert_eq!(days_from_civil(2024, 2, 29), 1_709_214_330_250 / 86_400_000);
        assert_eq!(days_from_civil(1969, 12, 31), -1);
    }

    #[test]
    fn test_builtin_lookup() {
        let arr = Value::array(vec![Value::Number(1.0)]);
        assert!(has_method(&arr, "map"));
        assert!(!has_method(&arr, "toUpperCase"));
        assert_eq!(get_builtin(&arr, "length").map(|v| v.to_number()), Some(1.0));
        assert!(matches!(get_builtin(&Value::string("abc"), "1"), Some(Value::String(s)) if &*s == "b"));
    }

    fn range_error_message(result: EvalResult<Value>) -> String {
        match result {
            Err(EvalError::Native { kind: crate::error::ErrorKind::Range, message }) => message,
            other => panic!("expected a RangeError, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_strings_are_range_errors() {
        let mut ev = Evaluator::default();
        let repeat = string_method(&mut ev, "ab", "repeat", vec![Value::Number(1e18)]);
        assert_eq!(range_error_message(repeat), "Invalid string length");
        let pad = string_method(&mut ev, "x", "padStart", vec![Value::Number(1e12), Value::string("-")]);
        assert_eq!(range_error_message(pad), "Invalid string length");
        let ok = string_method(&mut ev, "x", "padEnd", vec![Value::Number(3.0), Value::string("ab")]).unwrap();
        assert_eq!(ok.to_display(), "xab");
    }

    #[test]
    fn test_flat_stops_on_self_containing_array() {
        let mut ev = Evaluator::default();
        let Value::Array(items) = Value::array(vec![Value::Number(1.0)]) else {
            unreachable!()
        };
        items.borrow_mut().push(Value::Array(items.clone()));
        let flat = array_method(&mut ev, &items, "flat", vec![Value::Number(f64::INFINITY)]);
        assert!(range_error_message(flat).contains("call stack"));
    }

    #[test]
    fn test_string_match_with_plain_pattern() {
        let mut ev = Evaluator::default();
        let found = string_method(&mut ev, "a1b22", "match", vec![Value::string("\\d+")]).unwrap();
        assert_eq!(found.to_display(), "1");
        let index = string_method(&mut ev, "a1b22", "search", vec![Value::string("b")]).unwrap();
        assert_eq!(index.to_number(), 2.0);
    }
}
