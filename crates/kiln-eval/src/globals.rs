//! The global object of a realm: `console`, `Math`, `JSON`, the standard
//! constructors and inert browser stubs (`document`, `window`, timers,
//! `localStorage`).

use serde::Serialize;
use std::fmt::Write as _;

use crate::builtins::{date_parts, days_from_civil, DATE_SLOT};
use crate::env::Scope;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::promise::{inspect_promise, promise_constructor};
use crate::regexp::{regexp_constructor, regexp_text};
use crate::value::*;

/// Longest console rendering of one value, in bytes.
const MAX_INSPECT_LENGTH: usize = 8192;

/// Array items and object entries shown before the rest is elided.
const MAX_INSPECT_ITEMS: usize = 100;

/// Longest captured console line, in bytes.
const MAX_CONSOLE_LENGTH: usize = 8192;

/// Severity of a captured console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// One `console.*` call made by script code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub message: String,
}

pub(crate) fn install(globals: &Scope) {
    let define = |name: &str, value: Value| globals.declare(name, value, true);

    define("undefined", Value::Undefined);
    define("NaN", Value::Number(f64::NAN));
    define("Infinity", Value::Number(f64::INFINITY));
    define("console", console());
    define("Math", math());
    define("JSON", json());

    define("Object", object_constructor());
    define("Array", array_constructor());
    define("String", Value::native("String", |ev, _, args| match args.first() {
        Some(value) => Ok(Value::string(ev.display(value)?)),
        None => Ok(Value::string("")),
    }));
    define("Number", number_constructor());
    define("Boolean", Value::native("Boolean", |_, _, args| {
        Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
    }));
    define("parseInt", Value::native("parseInt", |_, _, args| {
        Ok(Value::Number(parse_int(&first_text(&args), args.get(1))))
    }));
    define("parseFloat", Value::native("parseFloat", |_, _, args| {
        Ok(Value::Number(parse_float(&first_text(&args))))
    }));
    define("isNaN", Value::native("isNaN", |_, _, args| {
        Ok(Value::Bool(first(&args).to_number().is_nan()))
    }));
    define("isFinite", Value::native("isFinite", |_, _, args| {
        Ok(Value::Bool(first(&args).to_number().is_finite()))
    }));

    for name in ["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"] {
        define(name, error_constructor(name));
    }
    define("Date", date_constructor());
    define("RegExp", regexp_constructor());
    define("Promise", promise_constructor());

    for name in [
        "setTimeout",
        "setInterval",
        "clearTimeout",
        "clearInterval",
        "requestAnimationFrame",
        "cancelAnimationFrame",
        "queueMicrotask",
    ] {
        define(name, Value::native(name, |_, _, _| Ok(Value::Number(0.0))));
    }

    let storage = local_storage();
    let document = document();
    define("localStorage", storage.clone());
    define("window", window(document.clone(), storage));
    define("document", document);
}

pub(crate) fn first(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or(Value::Undefined)
}

fn first_text(args: &[Value]) -> String {
    first(args).to_display()
}

pub(crate) fn props<const N: usize>(entries: [(&str, Value); N]) -> PropertyMap {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub(crate) fn with_statics<const N: usize>(function: Value, statics: [(&str, Value); N]) -> Value {
    if let Value::Function(f) = &function {
        for (key, value) in statics {
            f.set(key, value);
        }
    }
    function
}

fn noop(name: &str) -> Value {
    Value::native(name, |_, _, _| Ok(Value::Undefined))
}

// ══════════════════════════════════════════════════════════════════════════════
// console
// ══════════════════════════════════════════════════════════════════════════════

fn console() -> Value {
    let method = |name: &str, level: ConsoleLevel| {
        (
            name.to_string(),
            Value::native(name, move |ev, _, args| {
                ev.write_console(level, &args)?;
                Ok(Value::Undefined)
            }),
        )
    };
    Value::object(PropertyMap::from_iter([
        method("log", ConsoleLevel::Log),
        method("info", ConsoleLevel::Info),
        method("warn", ConsoleLevel::Warn),
        method("error", ConsoleLevel::Error),
        method("debug", ConsoleLevel::Debug),
    ]))
}

impl Evaluator {
    /// Capture a console line and mirror it to the `kiln::console` target.
    /// Long lines are cut at [`MAX_CONSOLE_LENGTH`] bytes.
    pub(crate) fn write_console(&mut self, level: ConsoleLevel, args: &[Value]) -> EvalResult<()> {
        let mut message = String::new();
        for (i, value) in args.iter().enumerate() {
            if i > 0 {
                push_within(&mut message, " ", MAX_CONSOLE_LENGTH);
            }
            match value {
                Value::String(s) => push_within(&mut message, s, MAX_CONSOLE_LENGTH),
                other => push_within(&mut message, &inspect(other, 0), MAX_CONSOLE_LENGTH),
            }
        }
        self.charge(1 + message.len() as u64 / 64)?;
        match level {
            ConsoleLevel::Error => tracing::error!(target: "kiln::console", "{message}"),
            ConsoleLevel::Warn => tracing::warn!(target: "kiln::console", "{message}"),
            ConsoleLevel::Debug => tracing::debug!(target: "kiln::console", "{message}"),
            ConsoleLevel::Log | ConsoleLevel::Info => tracing::info!(target: "kiln::console", "{message}"),
        }
        self.console.push(ConsoleLine { level, message });
        Ok(())
    }
}

/// Append as much of `s` as fits in `limit` bytes, on a char boundary.
fn push_within(out: &mut String, s: &str, limit: usize) {
    let room = limit.saturating_sub(out.len());
    if s.len() <= room {
        out.push_str(s);
        return;
    }
    let mut end = room;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    out.push_str(&s[..end]);
}

/// Console rendering of a value: `{ a: 1, b: 'x' }`, `[ 1, 2 ]`. Nesting
/// past two levels collapses, and the text stops near
/// [`MAX_INSPECT_LENGTH`] bytes.
pub fn inspect(value: &Value, depth: usize) -> String {
    let mut out = String::new();
    inspect_into(value, depth, &mut out);
    if out.len() > MAX_INSPECT_LENGTH {
        let mut end = MAX_INSPECT_LENGTH;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
        out.push_str("...");
    }
    out
}

fn inspect_into(value: &Value, depth: usize, out: &mut String) {
    let limit = MAX_INSPECT_LENGTH + 1;
    if out.len() >= limit {
        return;
    }
    match value {
        Value::String(s) if depth > 0 => {
            out.push('\'');
            push_within(out, s, limit);
            out.push('\'');
        }
        Value::Array(items) => {
            if depth > 2 {
                out.push_str("[Array]");
                return;
            }
            let len = items.len();
            if len == 0 {
                out.push_str("[]");
                return;
            }
            out.push_str("[ ");
            for i in 0..len.min(MAX_INSPECT_ITEMS) {
                if i > 0 {
                    out.push_str(", ");
                }
                inspect_into(&items.get(i), depth + 1, out);
                if out.len() >= limit {
                    return;
                }
            }
            if len > MAX_INSPECT_ITEMS {
                let _ = write!(out, ", ... {} more items", len - MAX_INSPECT_ITEMS);
            }
            out.push_str(" ]");
        }
        Value::Object(obj) => match obj.class() {
            ObjectClass::Error => push_within(out, &error_text(obj), limit),
            ObjectClass::RegExp => push_within(out, &regexp_text(obj), limit),
            ObjectClass::Promise => {
                let text = inspect_promise(obj, |v| inspect(v, depth + 1));
                push_within(out, &text, limit);
            }
            ObjectClass::Accessor => out.push_str(match (obj.has("get"), obj.has("set")) {
                (true, true) => "[Getter/Setter]",
                (false, true) => "[Setter]",
                _ => "[Getter]",
            }),
            _ => {
                if depth > 2 {
                    out.push_str("[Object]");
                    return;
                }
                let entries = obj.entries();
                if entries.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (i, (key, item)) in entries.iter().take(MAX_INSPECT_ITEMS).enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    push_within(out, key, limit);
                    out.push_str(": ");
                    inspect_into(item, depth + 1, out);
                    if out.len() >= limit {
                        return;
                    }
                }
                if entries.len() > MAX_INSPECT_ITEMS {
                    let _ = write!(out, ", ... {} more items", entries.len() - MAX_INSPECT_ITEMS);
                }
                out.push_str(" }");
            }
        },
        Value::Function(f) if f.name().is_empty() => out.push_str("[Function (anonymous)]"),
        Value::Function(f) => {
            let _ = write!(out, "[Function: {}]", f.name());
        }
        Value::String(s) => push_within(out, s, limit),
        other => out.push_str(&other.to_display()),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Math
// ══════════════════════════════════════════════════════════════════════════════

fn math() -> Value {
    fn unary(name: &'static str, f: fn(f64) -> f64) -> (String, Value) {
        (
            name.to_string(),
            Value::native(name, move |_, _, args| Ok(Value::Number(f(first(&args).to_number())))),
        )
    }
    let mut map = PropertyMap::from_iter([
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", |x| (x + 0.5).floor()),
        unary("trunc", f64::trunc),
        unary("sign", |x| if x == 0.0 || x.is_nan() { x } else { x.signum() }),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("log", f64::ln),
        unary("log10", f64::log10),
        unary("log2", f64::log2),
        unary("exp", f64::exp),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("atan", f64::atan),
    ]);
    map.extend(props([
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        (
            "pow",
            Value::native("pow", |_, _, args| {
                let base = first(&args).to_number();
                let exp = args.get(1).map_or(f64::NAN, Value::to_number);
                Ok(Value::Number(base.powf(exp)))
            }),
        ),
        (
            "atan2",
            Value::native("atan2", |_, _, args| {
                let y = first(&args).to_number();
                let x = args.get(1).map_or(f64::NAN, Value::to_number);
                Ok(Value::Number(y.atan2(x)))
            }),
        ),
        ("min", Value::native("min", |_, _, args| Ok(Value::Number(fold_extreme(&args, f64::INFINITY, f64::min))))),
        ("max", Value::native("max", |_, _, args| Ok(Value::Number(fold_extreme(&args, f64::NEG_INFINITY, f64::max))))),
        ("random", Value::native("random", |ev, _, _| Ok(Value::Number(ev.next_random())))),
    ]));
    Value::object(map)
}

fn fold_extreme(args: &[Value], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

impl Evaluator {
    /// Deterministic per-realm sequence in `[0, 1)` (xorshift64*).
    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.random_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.random_state = x;
        let bits = x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// JSON
// ══════════════════════════════════════════════════════════════════════════════

fn json() -> Value {
    Value::object(props([
        (
            "stringify",
            Value::native("stringify", |ev, _, args| {
                let Some(json) = to_json(ev, &first(&args), 0)? else {
                    return Ok(Value::Undefined);
                };
                let indent = match args.get(2) {
                    Some(Value::Number(n)) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
                    Some(Value::String(s)) => s.chars().take(10).collect(),
                    _ => String::new(),
                };
                let text = write_json(&json, &indent)?;
                ev.check_string_length(text.len() as f64)?;
                Ok(Value::string(text))
            }),
        ),
        (
            "parse",
            Value::native("parse", |_, _, args| {
                let text = first_text(&args);
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|e| EvalError::syntax_error(format!("JSON.parse: {e}")))?;
                Ok(from_json(&json))
            }),
        ),
    ]))
}

fn write_json(json: &serde_json::Value, indent: &str) -> EvalResult<String> {
    if indent.is_empty() {
        return serde_json::to_string(json).map_err(|e| EvalError::type_error(e.to_string()));
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    json.serialize(&mut serializer)
        .map_err(|e| EvalError::type_error(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| EvalError::type_error(e.to_string()))
}

const MAX_JSON_DEPTH: usize = 64;

/// `None` for values JSON omits (`undefined`, functions). Getters run;
/// every node pays gas.
pub fn to_json(ev: &mut Evaluator, value: &Value, depth: usize) -> EvalResult<Option<serde_json::Value>> {
    if depth > MAX_JSON_DEPTH {
        return Err(EvalError::type_error("Converting circular structure to JSON"));
    }
    ev.tick()?;
    Ok(Some(match value {
        Value::Undefined | Value::Function(_) => return Ok(None),
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => {
            ev.charge(s.len() as u64 / 64)?;
            serde_json::Value::String(s.to_string())
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items.snapshot() {
                out.push(to_json(ev, &item, depth + 1)?.unwrap_or(serde_json::Value::Null));
            }
            serde_json::Value::Array(out)
        }
        Value::Object(obj) if obj.class() == ObjectClass::Date => {
            let time = obj.get(DATE_SLOT).map_or(f64::NAN, |t| t.to_number());
            if time.is_nan() {
                serde_json::Value::Null
            } else {
                serde_json::Value::String(iso_string(time))
            }
        }
        Value::Object(_) => {
            let mut map = serde_json::Map::new();
            for (key, item) in ev.own_entries(value)? {
                if let Some(json) = to_json(ev, &item, depth + 1)? {
                    map.insert(key, json);
                }
            }
            serde_json::Value::Object(map)
        }
    }))
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Constructors
// ══════════════════════════════════════════════════════════════════════════════

fn object_constructor() -> Value {
    let constructor = Value::constructor("Object", |_, _, args| match first(&args) {
        value @ (Value::Object(_) | Value::Array(_) | Value::Function(_)) => Ok(value),
        _ => Ok(Value::object(PropertyMap::new())),
    });
    with_statics(constructor, [
        ("keys", Value::native("keys", |ev, _, args| {
            let keys = match first(&args) {
                Value::Object(obj) => obj.keys(),
                other => ev.own_entries(&other)?.into_iter().map(|(k, _)| k).collect(),
            };
            Ok(Value::array(keys.into_iter().map(Value::string).collect()))
        })),
        ("values", Value::native("values", |ev, _, args| {
            Ok(Value::array(ev.own_entries(&first(&args))?.into_iter().map(|(_, v)| v).collect()))
        })),
        ("entries", Value::native("entries", |ev, _, args| {
            Ok(Value::array(
                ev.own_entries(&first(&args))?
                    .into_iter()
                    .map(|(k, v)| Value::array(vec![Value::string(k), v]))
                    .collect(),
            ))
        })),
        ("assign", Value::native("assign", |ev, _, args| {
            let target = first(&args);
            if target.is_nullish() {
                return Err(EvalError::type_error("Cannot convert undefined or null to object"));
            }
            for source in args.iter().skip(1) {
                for (key, value) in ev.own_entries(source)? {
                    ev.set_member(&target, &key, value)?;
                }
            }
            Ok(target)
        })),
        ("freeze", Value::native("freeze", |_, _, args| Ok(first(&args)))),
        ("fromEntries", Value::native("fromEntries", |ev, _, args| {
            let mut map = PropertyMap::new();
            for pair in ev.iterate(&first(&args))? {
                let key = ev.get_member(&pair, "0")?;
                let value = ev.get_member(&pair, "1")?;
                map.insert(crate::evaluator::property_key(&key), value);
            }
            Ok(Value::object(map))
        })),
    ])
}

fn array_constructor() -> Value {
    let constructor = Value::constructor("Array", |ev, _, args| match args.as_slice() {
        [Value::Number(n)] => {
            let len = ev.array_length(*n, 0)?;
            Ok(Value::array(vec![Value::Undefined; len]))
        }
        _ => Ok(Value::array(args)),
    });
    with_statics(constructor, [
        ("isArray", Value::native("isArray", |_, _, args| {
            Ok(Value::Bool(matches!(first(&args), Value::Array(_))))
        })),
        ("of", Value::native("of", |_, _, args| Ok(Value::array(args)))),
        ("from", Value::native("from", |ev, _, args| {
            let source = first(&args);
            let items = match &source {
                Value::Array(_) | Value::String(_) => ev.iterate(&source)?,
                Value::Object(obj) => {
                    let len = obj.get("length").map_or(0.0, |l| l.to_number());
                    let len = ev.array_length(if len.is_nan() { 0.0 } else { len.max(0.0).trunc() }, 0)?;
                    (0..len).map(|i| obj.get(&i.to_string()).unwrap_or(Value::Undefined)).collect()
                }
                _ => Vec::new(),
            };
            match args.get(1) {
                Some(map @ Value::Function(_)) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        out.push(ev.call(map, Value::Undefined, vec![item, Value::Number(i as f64)])?);
                    }
                    Ok(Value::array(out))
                }
                _ => Ok(Value::array(items)),
            }
        })),
    ])
}

fn number_constructor() -> Value {
    let constructor = Value::native("Number", |_, _, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    with_statics(constructor, [
        ("isInteger", Value::native("isInteger", |_, _, args| {
            Ok(Value::Bool(matches!(first(&args), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
        })),
        ("isFinite", Value::native("isFinite", |_, _, args| {
            Ok(Value::Bool(matches!(first(&args), Value::Number(n) if n.is_finite())))
        })),
        ("isNaN", Value::native("isNaN", |_, _, args| {
            Ok(Value::Bool(matches!(first(&args), Value::Number(n) if n.is_nan())))
        })),
        ("parseFloat", Value::native("parseFloat", |_, _, args| {
            Ok(Value::Number(parse_float(&first_text(&args))))
        })),
        ("parseInt", Value::native("parseInt", |_, _, args| {
            Ok(Value::Number(parse_int(&first_text(&args), args.get(1))))
        })),
        ("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0)),
        ("EPSILON", Value::Number(f64::EPSILON)),
    ])
}

fn error_constructor(name: &'static str) -> Value {
    Value::constructor(name, move |ev, _, args| {
        let message = match first(&args) {
            Value::Undefined => String::new(),
            other => other.to_display(),
        };
        Ok(ev.error_value(name, &message))
    })
}

pub(crate) fn parse_int(text: &str, radix: Option<&Value>) -> f64 {
    let mut s = text.trim_start();
    let negative = s.starts_with('-');
    s = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut radix = match radix.map(Value::to_number) {
        Some(r) if r.is_finite() && r != 0.0 => r as u32,
        _ => 10,
    };
    if (radix == 16 || radix == 10) && (s.starts_with("0x") || s.starts_with("0X")) {
        s = &s[2..];
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative { -value } else { value }
}

pub(crate) fn parse_float(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

// ── Date ──────────────────────────────────────────────────────────────────────

fn date_constructor() -> Value {
    let constructor = Value::constructor("Date", |ev, _, args| {
        let time = match args.as_slice() {
            [] => ev.now_ms(),
            [Value::Number(n)] => *n,
            [Value::String(s)] => parse_iso(s).unwrap_or(f64::NAN),
            [Value::Object(obj)] if obj.class() == ObjectClass::Date => {
                obj.get(DATE_SLOT).map_or(f64::NAN, |t| t.to_number())
            }
            parts => {
                let field = |i: usize, default: f64| parts.get(i).map_or(default, Value::to_number);
                let (year, month) = (field(0, f64::NAN), field(1, 0.0));
                if year.is_nan() || month.is_nan() {
                    f64::NAN
                } else {
                    let month = month as i64;
                    let days = days_from_civil(
                        year as i64 + month.div_euclid(12),
                        (month.rem_euclid(12) + 1) as u32,
                        1,
                    );
                    (days as f64 + field(2, 1.0) - 1.0) * 86_400_000.0
                        + field(3, 0.0) * 3_600_000.0
                        + field(4, 0.0) * 60_000.0
                        + field(5, 0.0) * 1000.0
                        + field(6, 0.0)
                }
            }
        };
        Ok(Value::object_of(
            ObjectClass::Date,
            props([(DATE_SLOT, Value::Number(time))]),
        ))
    });
    with_statics(constructor, [(
        "now",
        Value::native("now", |ev, _, _| Ok(Value::Number(ev.now_ms()))),
    )])
}

/// `YYYY-MM-DD` with an optional `THH:MM[:SS[.mmm]][Z]` time, read as UTC.
fn parse_iso(text: &str) -> Option<f64> {
    let text = text.trim().trim_end_matches('Z');
    let (date, time) = match text.split_once(['T', ' ']) {
        Some((d, t)) => (d, Some(t)),
        None => (text, None),
    };
    let mut fields = date.split('-').map(|p| p.parse::<i64>().ok());
    let year = fields.next()??;
    let month = fields.next().unwrap_or(Some(1))?;
    let day = fields.next().unwrap_or(Some(1))?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    let mut ms = days_from_civil(year, month as u32, day as u32) as f64 * 86_400_000.0;
    if let Some(time) = time {
        let mut parts = time.split(':');
        let hours: f64 = parts.next()?.parse().ok()?;
        let minutes: f64 = parts.next().unwrap_or("0").parse().ok()?;
        let seconds: f64 = parts.next().unwrap_or("0").parse().ok()?;
        ms += hours * 3_600_000.0 + minutes * 60_000.0 + (seconds * 1000.0).round();
    }
    Some(ms)
}

pub(crate) fn iso_string(time: f64) -> String {
    let p = date_parts(time);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        p.year, p.month, p.day, p.hour, p.minute, p.second, p.millis
    )
}

impl Evaluator {
    /// Current wall-clock time in epoch milliseconds.
    pub(crate) fn now_ms(&self) -> f64 {
        self.clock_ms.unwrap_or_else(system_now_ms)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn system_now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0.0, |d| d.as_millis() as f64)
}

#[cfg(target_arch = "wasm32")]
fn system_now_ms() -> f64 {
    0.0
}

// ══════════════════════════════════════════════════════════════════════════════
// Browser Stubs
// ══════════════════════════════════════════════════════════════════════════════

/// Placeholder DOM node handed out by `document` lookups.
fn host_node(id: &str, tag: &str) -> Value {
    Value::object(props([
        ("id", Value::string(id)),
        ("nodeName", Value::string(tag.to_uppercase())),
        ("nodeType", Value::Number(1.0)),
        ("addEventListener", noop("addEventListener")),
        ("removeEventListener", noop("removeEventListener")),
        ("appendChild", Value::native("appendChild", |_, _, args| Ok(first(&args)))),
    ]))
}

fn document() -> Value {
    Value::object(props([
        ("title", Value::string("")),
        ("body", host_node("", "body")),
        ("documentElement", host_node("", "html")),
        ("getElementById", Value::native("getElementById", |_, _, args| {
            Ok(host_node(&first_text(&args), "div"))
        })),
        ("querySelector", Value::native("querySelector", |_, _, args| {
            let selector = first_text(&args);
            Ok(host_node(selector.trim_start_matches('#'), "div"))
        })),
        ("querySelectorAll", Value::native("querySelectorAll", |_, _, _| Ok(Value::array(Vec::new())))),
        ("createElement", Value::native("createElement", |_, _, args| {
            Ok(host_node("", &first_text(&args)))
        })),
        ("addEventListener", noop("addEventListener")),
        ("removeEventListener", noop("removeEventListener")),
    ]))
}

fn local_storage() -> Value {
    let store = ObjectRef::new(ObjectClass::Plain, PropertyMap::new());
    let get = store.clone();
    let set = store.clone();
    let remove = store.clone();
    Value::object(props([
        ("getItem", Value::native("getItem", move |_, _, args| {
            Ok(get.get(&first_text(&args)).unwrap_or(Value::Null))
        })),
        ("setItem", Value::native("setItem", move |_, _, args| {
            let value = args.get(1).map(Value::to_display).unwrap_or_else(|| "undefined".into());
            set.set(first_text(&args), Value::string(value));
            Ok(Value::Undefined)
        })),
        ("removeItem", Value::native("removeItem", move |_, _, args| {
            remove.remove(&first_text(&args));
            Ok(Value::Undefined)
        })),
        ("clear", Value::native("clear", move |_, _, _| {
            for key in store.keys() {
                store.remove(&key);
            }
            Ok(Value::Undefined)
        })),
    ]))
}

fn window(document: Value, storage: Value) -> Value {
    let media_query = Value::native("matchMedia", |_, _, args| {
        Ok(Value::object(props([
            ("matches", Value::Bool(false)),
            ("media", Value::string(first_text(&args))),
            ("addEventListener", noop("addEventListener")),
            ("removeEventListener", noop("removeEventListener")),
            ("addListener", noop("addListener")),
            ("removeListener", noop("removeListener")),
        ])))
    });
    Value::object(props([
        ("document", document),
        ("localStorage", storage),
        ("innerWidth", Value::Number(1280.0)),
        ("innerHeight", Value::Number(800.0)),
        ("location", Value::object(props([
            ("href", Value::string("about:blank")),
            ("pathname", Value::string("/")),
            ("search", Value::string("")),
            ("hash", Value::string("")),
        ]))),
        ("matchMedia", media_query),
        ("addEventListener", noop("addEventListener")),
        ("removeEventListener", noop("removeEventListener")),
        ("scrollTo", noop("scrollTo")),
        ("alert", noop("alert")),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -7", None), -7.0);
        assert_eq!(parse_int("0x1f", None), 31.0);
        assert_eq!(parse_int("101", Some(&Value::Number(2.0))), 5.0);
        assert!(parse_int("px", None).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.5rem"), 3.5);
        assert_eq!(parse_float("-1e3x"), -1000.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert!(parse_float("abc").is_nan());
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse_iso("1970-01-02"), Some(86_400_000.0));
        assert_eq!(parse_iso("2024-02-29T13:45:30.250Z"), Some(1_709_214_330_250.0));
        assert_eq!(parse_iso("not a date"), None);
    }

    #[test]
    fn test_inspect() {
        let mut map = PropertyMap::new();
        map.insert("a".into(), Value::Number(1.0));
        map.insert("b".into(), Value::array(vec![Value::string("x")]));
        assert_eq!(inspect(&Value::object(map), 0), "{ a: 1, b: [ 'x' ] }");
        assert_eq!(inspect(&Value::object(PropertyMap::new()), 0), "{}");
    }

    #[test]
    fn test_inspect_is_bounded() {
        let many = Value::array((0..150).map(|i| Value::Number(f64::from(i))).collect());
        assert!(inspect(&many, 0).ends_with(", ... 50 more items ]"));

        let Value::Array(items) = Value::array(Vec::new()) else {
            unreachable!()
        };
        items.borrow_mut().push(Value::Array(items.clone()));
        assert_eq!(inspect(&Value::Array(items), 0), "[ [ [ [Array] ] ] ]");

        let long = Value::array(vec![Value::string("x".repeat(MAX_INSPECT_LENGTH)); 3]);
        let text = inspect(&long, 0);
        assert!(text.len() <= MAX_INSPECT_LENGTH + 3);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_console_lines_are_truncated() {
        let mut ev = Evaluator::default();
        let long = Value::string("y".repeat(MAX_CONSOLE_LENGTH * 2));
        ev.write_console(ConsoleLevel::Log, &[long]).unwrap();
        assert_eq!(ev.console()[0].message.len(), MAX_CONSOLE_LENGTH);
    }

    #[test]
    fn test_json_numbers_and_omissions() {
        let mut map = PropertyMap::new();
        map.insert("n".into(), Value::Number(2.0));
        map.insert("f".into(), Value::Number(0.5));
        map.insert("skip".into(), Value::Undefined);
        let mut ev = Evaluator::default();
        let json = to_json(&mut ev, &Value::object(map), 0).unwrap().unwrap();
        assert_eq!(serde_json::to_string(&json).unwrap(), r#"{"n":2,"f":0.5}"#);
    }
}
