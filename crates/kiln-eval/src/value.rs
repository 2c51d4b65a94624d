//! Runtime values.
//!
//! Objects, arrays and functions are reference types: cloning a [`Value`]
//! clones the handle, and strict equality compares identity.

use indexmap::IndexMap;
use kiln_types::ast::Function;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::env::Scope;
use crate::error::EvalResult;
use crate::evaluator::Evaluator;

pub type PropertyMap = IndexMap<String, Value>;

/// Native function body: `(evaluator, this, args)`.
pub type NativeFn = Rc<dyn Fn(&mut Evaluator, Value, Vec<Value>) -> EvalResult<Value>>;

/// Property the compiled module marks itself with; hidden from enumeration.
pub const ES_MODULE_FLAG: &str = "__esModule";

/// Longest string script code may build, in bytes.
pub const MAX_STRING_LENGTH: usize = 1 << 26;

/// Largest array length, `2^32 - 1`.
pub const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;

/// Internal slots are stored as `[[Name]]` properties and never enumerate.
pub fn is_internal_slot(key: &str) -> bool {
    key == ES_MODULE_FLAG || (key.starts_with("[[") && key.ends_with("]]"))
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

// ══════════════════════════════════════════════════════════════════════════════
// Reference Types
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Value {
        self.0.borrow().get(index).cloned().unwrap_or(Value::Undefined)
    }

    /// Copy of the current elements; callbacks may mutate the array while
    /// a method iterates.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// What kind of object a handle refers to. Most are `Plain`; the rest are
/// recognised by the mount and by `instanceof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Plain,
    Error,
    /// Result of `createElement`: `type`, `props`, `key`.
    Element,
    Fragment,
    StrictMode,
    /// `createContext(default)`
    Context,
    Provider,
    Consumer,
    Date,
    /// Regular expression; pattern and flags live in internal slots.
    RegExp,
    /// Settled or pending promise; see `promise.rs`.
    Promise,
    /// Property slot holding a `get`/`set` pair, never a script value.
    Accessor,
}

pub struct Object {
    pub class: ObjectClass,
    pub props: PropertyMap,
}

#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    pub fn new(class: ObjectClass, props: PropertyMap) -> Self {
        Self(Rc::new(RefCell::new(Object { class, props })))
    }

    pub fn class(&self) -> ObjectClass {
        self.0.borrow().class
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().props.get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.borrow().props.contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.borrow_mut().props.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().props.shift_remove(key)
    }

    /// Enumerable own keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .borrow()
            .props
            .keys()
            .filter(|k| !is_internal_slot(k))
            .cloned()
            .collect()
    }

    /// Enumerable own entries in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .props
            .iter()
            .filter(|(k, _)| !is_internal_slot(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

pub enum FunctionKind {
    /// A function or arrow defined in source, closed over its scope.
    Closure { func: Arc<Function>, scope: Scope },
    Native(NativeFn),
}

pub struct FunctionObject {
    pub name: String,
    pub kind: FunctionKind,
    /// Callable with `new`.
    pub constructor: bool,
    pub props: RefCell<PropertyMap>,
}

#[derive(Clone)]
pub struct FunctionRef(Rc<FunctionObject>);

impl FunctionRef {
    pub fn new(name: impl Into<String>, kind: FunctionKind, constructor: bool) -> Self {
        Self(Rc::new(FunctionObject {
            name: name.into(),
            kind,
            constructor,
            props: RefCell::new(PropertyMap::new()),
        }))
    }

    pub fn object(&self) -> &FunctionObject {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.props.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.props.borrow_mut().insert(key.into(), value);
    }

    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Constructors & Conversions
// ══════════════════════════════════════════════════════════════════════════════

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    pub fn object(props: PropertyMap) -> Self {
        Value::Object(ObjectRef::new(ObjectClass::Plain, props))
    }

    pub fn object_of(class: ObjectClass, props: PropertyMap) -> Self {
        Value::Object(ObjectRef::new(class, props))
    }

    pub fn native(
        name: impl Into<String>,
        f: impl Fn(&mut Evaluator, Value, Vec<Value>) -> EvalResult<Value> + 'static,
    ) -> Self {
        Value::Function(FunctionRef::new(name, FunctionKind::Native(Rc::new(f)), false))
    }

    pub fn constructor(
        name: impl Into<String>,
        f: impl Fn(&mut Evaluator, Value, Vec<Value>) -> EvalResult<Value> + 'static,
    ) -> Self {
        Value::Function(FunctionRef::new(name, FunctionKind::Native(Rc::new(f)), true))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_display()),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion as template literals and `+` perform it. A cyclic
    /// array renders as the empty string at the point it repeats; text past
    /// [`MAX_STRING_LENGTH`] is cut off.
    pub fn to_display(&self) -> String {
        let mut out = DisplayBuf::new(MAX_STRING_LENGTH);
        self.write_display(&mut out, &mut Vec::new());
        out.text
    }

    /// Like [`Value::to_display`], but `None` when the text would exceed
    /// `limit` bytes.
    pub fn to_display_within(&self, limit: usize) -> Option<String> {
        let mut out = DisplayBuf::new(limit);
        self.write_display(&mut out, &mut Vec::new());
        out.finish()
    }

    fn write_display(&self, out: &mut DisplayBuf, open: &mut Vec<ArrayRef>) {
        match self {
            Value::Undefined => out.push("undefined"),
            Value::Null => out.push("null"),
            Value::Bool(b) => out.push(if *b { "true" } else { "false" }),
            Value::Number(n) => out.push(&number_to_string(*n)),
            Value::String(s) => out.push(s),
            Value::Array(items) => write_joined(items, ",", out, open),
            Value::Object(obj) => match obj.class() {
                ObjectClass::Error => write_error(obj, out, open),
                ObjectClass::RegExp => out.push(&crate::regexp::regexp_text(obj)),
                ObjectClass::Promise => out.push("[object Promise]"),
                _ => out.push("[object Object]"),
            },
            Value::Function(f) => out.push(&format!("function {}() {{ [native code] }}", f.name())),
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_eq(other),
        }
    }

    /// Own property read without any built-in methods.
    pub fn own_property(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.get(key),
            Value::Function(f) => f.get(key),
            _ => None,
        }
    }
}

/// `Name: message` for error objects.
pub fn error_text(obj: &ObjectRef) -> String {
    let mut out = DisplayBuf::new(MAX_STRING_LENGTH);
    write_error(obj, &mut out, &mut Vec::new());
    out.text
}

/// `array.join(separator)`; `None` past `limit` bytes.
pub fn join_within(items: &ArrayRef, separator: &str, limit: usize) -> Option<String> {
    let mut out = DisplayBuf::new(limit);
    write_joined(items, separator, &mut out, &mut Vec::new());
    out.finish()
}

/// Output buffer that stops growing at its byte limit.
struct DisplayBuf {
    text: String,
    limit: usize,
    overflowed: bool,
}

impl DisplayBuf {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            overflowed: false,
        }
    }

    fn push(&mut self, s: &str) {
        if self.overflowed {
            return;
        }
        let room = self.limit - self.text.len();
        if s.len() <= room {
            self.text.push_str(s);
            return;
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&s[..end]);
        self.overflowed = true;
    }

    fn finish(self) -> Option<String> {
        (!self.overflowed).then_some(self.text)
    }
}

fn write_joined(items: &ArrayRef, separator: &str, out: &mut DisplayBuf, open: &mut Vec<ArrayRef>) {
    if open.iter().any(|a| a.ptr_eq(items)) {
        return;
    }
    open.push(items.clone());
    for i in 0..items.len() {
        if out.overflowed {
            break;
        }
        if i > 0 {
            out.push(separator);
        }
        let item = items.get(i);
        if !item.is_nullish() {
            item.write_display(out, open);
        }
    }
    open.pop();
}

fn write_error(obj: &ObjectRef, out: &mut DisplayBuf, open: &mut Vec<ArrayRef>) {
    match obj.get("name") {
        Some(name) => name.write_display(out, open),
        None => out.push("Error"),
    }
    if let Some(message) = obj.get("message") {
        let mut text = DisplayBuf::new(out.limit - out.text.len());
        message.write_display(&mut text, open);
        if !text.text.is_empty() {
            out.push(": ");
            out.push(&text.text);
            out.overflowed |= text.overflowed;
        }
    }
}

/// Number to string the way script code prints numbers: `3`, `0.5`, `NaN`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        "0".into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            other => f.write_str(&crate::globals::inspect(other, 0)),
        }
    }
}
