//! Core statement and expression evaluator.

use fancy_regex::Regex;
use kiln_types::ast::*;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::builtins;
use crate::env::{AssignError, Scope, ScopeData};
use crate::error::{EvalError, EvalResult};
use crate::globals::{self, ConsoleLine};
use crate::host::Capabilities;
use crate::regexp::{self, LAST_INDEX_SLOT};
use crate::value::*;

/// Limits and host capabilities for one realm.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Maximum evaluation steps before the realm is aborted.
    pub gas_limit: u64,
    /// Maximum nesting of function calls.
    pub max_call_depth: usize,
    /// Maximum nesting of `require` calls; counted apart from call depth.
    pub max_module_depth: usize,
    /// Bare specifiers served by host capabilities, matched by prefix.
    pub capabilities: Vec<String>,
    /// Fixed reading for `Date`, in epoch milliseconds; the system clock
    /// when unset.
    pub clock_ms: Option<f64>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            gas_limit: 1_000_000,
            max_call_depth: 64,
            max_module_depth: 128,
            capabilities: vec!["react".into(), "react-dom".into()],
            clock_ms: None,
        }
    }
}

/// How a statement finished.
#[derive(Debug, Clone)]
pub enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Assignable location, resolved once for compound assignment and update.
enum Place {
    Binding(String),
    Property(Value, String),
}

/// The tree-walking evaluator. One instance is one realm: its globals,
/// host capabilities and console are shared by every module it runs.
pub struct Evaluator {
    globals: Scope,
    /// Steps consumed so far.
    gas: u64,
    gas_limit: u64,
    depth: usize,
    pub(crate) max_call_depth: usize,
    module_depth: usize,
    max_module_depth: usize,
    pub(crate) console: Vec<ConsoleLine>,
    pub(crate) capabilities: Capabilities,
    /// Context values provided by enclosing providers during a mount.
    pub(crate) contexts: Vec<(ObjectRef, Value)>,
    /// Element handed to a host root's `render`.
    pub(crate) rendered_root: Option<Value>,
    pub(crate) random_state: u64,
    pub(crate) clock_ms: Option<f64>,
    /// Compiled patterns keyed by `/source/flags`.
    pub(crate) regex_cache: HashMap<String, Rc<Regex>>,
    scopes: Vec<Weak<ScopeData>>,
    prune_at: usize,
}

impl Evaluator {
    pub fn new(options: EvalOptions) -> Self {
        let globals = Scope::root();
        let evaluator = Self {
            globals: globals.clone(),
            gas: 0,
            gas_limit: options.gas_limit,
            depth: 0,
            max_call_depth: options.max_call_depth,
            module_depth: 0,
            max_module_depth: options.max_module_depth,
            console: Vec::new(),
            capabilities: Capabilities::new(options.capabilities),
            contexts: Vec::new(),
            rendered_root: None,
            random_state: 0x2545_f491_4f6c_dd1d,
            clock_ms: options.clock_ms,
            regex_cache: HashMap::new(),
            scopes: vec![globals.downgrade()],
            prune_at: 1024,
        };
        globals::install(&globals);
        evaluator
    }

    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn gas_used(&self) -> u64 {
        self.gas
    }

    pub fn console(&self) -> &[ConsoleLine] {
        &self.console
    }

    pub fn take_console(&mut self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.console)
    }

    /// The element last passed to a host root's `render`, if any.
    pub fn rendered_root(&self) -> Option<&Value> {
        self.rendered_root.as_ref()
    }

    /// Consume one unit of gas.
    pub(crate) fn tick(&mut self) -> EvalResult<()> {
        self.charge(1)
    }

    /// Consume `units` of gas; bulk work pays in proportion to its size.
    pub(crate) fn charge(&mut self, units: u64) -> EvalResult<()> {
        self.gas = self.gas.saturating_add(units);
        if self.gas > self.gas_limit {
            Err(EvalError::GasExhausted(self.gas_limit))
        } else {
            Ok(())
        }
    }

    /// String conversion for values about to become part of a new string.
    pub(crate) fn display(&mut self, value: &Value) -> EvalResult<String> {
        let text = match value {
            Value::String(s) => s.to_string(),
            other => other
                .to_display_within(MAX_STRING_LENGTH)
                .ok_or_else(|| EvalError::range_error("Invalid string length"))?,
        };
        self.charge(text.len() as u64 / 64)?;
        Ok(text)
    }

    /// Fail with `RangeError` once a string under construction outgrows
    /// [`MAX_STRING_LENGTH`]; otherwise pay for its size.
    pub(crate) fn check_string_length(&mut self, bytes: f64) -> EvalResult<()> {
        if bytes > MAX_STRING_LENGTH as f64 {
            return Err(EvalError::range_error("Invalid string length"));
        }
        self.charge(bytes as u64 / 64)
    }

    /// Validate a new array length and pay for the elements it adds.
    pub(crate) fn array_length(&mut self, requested: f64, current: usize) -> EvalResult<usize> {
        if !(0.0..=MAX_ARRAY_LENGTH).contains(&requested) || requested.fract() != 0.0 {
            return Err(EvalError::range_error("Invalid array length"));
        }
        let len = requested as usize;
        self.charge(len.saturating_sub(current) as u64)?;
        Ok(len)
    }

    /// Run a module load requested from inside the `require` native. The
    /// load counts against the module nesting limit, and the native's own
    /// call frame is handed back so long import chains leave the call
    /// depth alone.
    pub(crate) fn nested_module<T>(&mut self, load: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        if self.module_depth >= self.max_module_depth {
            return Err(EvalError::ModuleDepthExceeded(self.max_module_depth));
        }
        let call_depth = self.depth;
        self.depth = call_depth.saturating_sub(1);
        self.module_depth += 1;
        let result = load(self);
        self.module_depth -= 1;
        self.depth = call_depth;
        result
    }

    pub(crate) fn new_scope(&mut self, parent: &Scope) -> Scope {
        let scope = parent.child();
        if self.scopes.len() >= self.prune_at {
            self.scopes.retain(|weak| weak.strong_count() > 0);
            self.prune_at = (self.scopes.len() * 2).max(1024);
        }
        self.scopes.push(scope.downgrade());
        scope
    }

    /// An error object as script code sees it.
    pub fn error_value(&self, name: &str, message: &str) -> Value {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::string(name));
        props.insert("message".into(), Value::string(message));
        Value::object_of(ObjectClass::Error, props)
    }

    /// The value a `catch` clause binds for `error`.
    pub fn error_to_value(&self, error: EvalError) -> Value {
        match error {
            EvalError::Thrown(value) => value,
            EvalError::Native { kind, message } => self.error_value(kind.class_name(), &message),
            EvalError::InModule { error, .. } => self.error_to_value(*error),
            other => self.error_value("Error", &other.to_string()),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Functions
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn make_closure(&mut self, func: &Arc<Function>, scope: &Scope, name_hint: Option<&str>) -> Value {
        let name = func
            .name
            .as_ref()
            .map(|n| n.name.as_str())
            .or(name_hint)
            .unwrap_or_default()
            .to_string();
        let kind = |scope: Scope| FunctionKind::Closure {
            func: Arc::clone(func),
            scope,
        };
        match (&func.name, func.is_arrow) {
            // A named function expression sees its own name.
            (Some(own), false) => {
                let inner = self.new_scope(scope);
                let value = Value::Function(FunctionRef::new(name, kind(inner.clone()), !func.is_async));
                inner.declare(&own.name, value.clone(), false);
                value
            }
            (_, is_arrow) => Value::Function(FunctionRef::new(
                name,
                kind(scope.clone()),
                !is_arrow && !func.is_async,
            )),
        }
    }

    /// Call `callee` with an explicit `this`.
    pub fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        let Value::Function(func) = callee else {
            return Err(EvalError::type_error(format!(
                "{} is not a function",
                callee.to_display()
            )));
        };
        if self.depth >= self.max_call_depth {
            return Err(EvalError::CallDepthExceeded(self.max_call_depth));
        }
        self.depth += 1;
        let result = match &func.object().kind {
            FunctionKind::Native(native) => native(self, this, args),
            FunctionKind::Closure { func, scope } => self.call_closure(func, scope, this, args),
        };
        self.depth -= 1;
        match &func.object().kind {
            FunctionKind::Closure { func, .. } if func.is_async => self.promise_from(result),
            _ => result,
        }
    }

    fn call_closure(&mut self, def: &Function, parent: &Scope, this: Value, args: Vec<Value>) -> EvalResult<Value> {
        let scope = self.new_scope(parent);
        if !def.is_arrow {
            scope.declare("this", this, false);
        }

        let mut args = args.into_iter();
        for param in &def.params {
            let value = if param.rest {
                Value::array(args.by_ref().collect())
            } else {
                args.next().unwrap_or(Value::Undefined)
            };
            let value = match (&param.default, value) {
                (Some(default), Value::Undefined) => self.eval_expr(default, &scope)?,
                (_, value) => value,
            };
            self.bind_pattern(&param.pattern, value, &scope, true)?;
        }

        match &def.body {
            FunctionBody::Expr(expr) => self.eval_expr(expr, &scope),
            FunctionBody::Block(block) => match self.exec_stmts(&block.stmts, &scope)? {
                Completion::Return(value) => Ok(value),
                _ => Ok(Value::Undefined),
            },
        }
    }

    fn construct(&mut self, callee: &Value, args: Vec<Value>, name: &str) -> EvalResult<Value> {
        let Value::Function(func) = callee else {
            return Err(EvalError::type_error(format!("{name} is not a constructor")));
        };
        if !func.object().constructor {
            return Err(EvalError::type_error(format!("{name} is not a constructor")));
        }
        match &func.object().kind {
            FunctionKind::Native(_) => self.call(callee, Value::Undefined, args),
            FunctionKind::Closure { .. } => {
                let instance = Value::object(PropertyMap::new());
                let result = self.call(callee, instance.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) | Value::Function(_) => result,
                    _ => instance,
                })
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════

    /// Run a statement list in `scope`, hoisting its function declarations.
    pub fn exec_stmts(&mut self, stmts: &[Stmt], scope: &Scope) -> EvalResult<Completion> {
        for stmt in stmts {
            if let Stmt::Function(decl) = stmt {
                let func = self.make_closure(&decl.func, scope, Some(&decl.name.name));
                scope.declare(&decl.name.name, func, true);
            }
        }
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> EvalResult<Completion> {
        self.tick()?;
        match stmt {
            Stmt::Var(decl) => {
                self.exec_var(decl, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty(_) => Ok(Completion::Normal),
            Stmt::Return(ret) => {
                let value = match &ret.value {
                    Some(expr) => self.eval_expr(expr, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If(stmt) => self.exec_if(stmt, scope),
            Stmt::For(stmt) => self.exec_for(stmt, scope),
            Stmt::ForOf(stmt) => self.exec_for_of(stmt, scope),
            Stmt::ForIn(stmt) => self.exec_for_in(stmt, scope),
            Stmt::While(stmt) => self.exec_while(stmt, scope, false),
            Stmt::DoWhile(stmt) => self.exec_while(stmt, scope, true),
            Stmt::Switch(stmt) => self.exec_switch(stmt, scope),
            Stmt::Break(_) => Ok(Completion::Break),
            Stmt::Continue(_) => Ok(Completion::Continue),
            Stmt::Throw(stmt) => Err(EvalError::Thrown(self.eval_expr(&stmt.value, scope)?)),
            Stmt::Try(stmt) => self.exec_try(stmt, scope),
            Stmt::Block(block) => self.exec_block(block, scope),
            Stmt::Expr(stmt) => {
                self.eval_expr(&stmt.expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::BindImport(binding) => {
                let module = scope.lookup(&binding.module.name).unwrap_or(Value::Undefined);
                scope.declare_import(&binding.local.name, module, binding.import.clone());
                Ok(Completion::Normal)
            }
            Stmt::ExportAll(module) => {
                self.exec_export_all(module, scope)?;
                Ok(Completion::Normal)
            }
        }
    }

    fn exec_block(&mut self, block: &Block, scope: &Scope) -> EvalResult<Completion> {
        let inner = self.new_scope(scope);
        self.exec_stmts(&block.stmts, &inner)
    }

    fn exec_var(&mut self, decl: &VarDecl, scope: &Scope) -> EvalResult<()> {
        let mutable = decl.kind != VarKind::Const;
        for declarator in &decl.declarators {
            let value = match (&declarator.init, &declarator.pattern) {
                (Some(Expr { kind: ExprKind::Function(func), .. }), Pattern::Ident(name)) => {
                    self.make_closure(func, scope, Some(&name.name))
                }
                (Some(init), _) => self.eval_expr(init, scope)?,
                (None, _) => Value::Undefined,
            };
            self.bind_pattern(&declarator.pattern, value, scope, mutable)?;
        }
        Ok(())
    }

    fn exec_if(&mut self, stmt: &IfStmt, scope: &Scope) -> EvalResult<Completion> {
        if self.eval_expr(&stmt.condition, scope)?.is_truthy() {
            self.exec_stmt(&stmt.then_branch, scope)
        } else if let Some(else_branch) = &stmt.else_branch {
            self.exec_stmt(else_branch, scope)
        } else {
            Ok(Completion::Normal)
        }
    }

    fn exec_for(&mut self, stmt: &ForStmt, scope: &Scope) -> EvalResult<Completion> {
        let loop_scope = self.new_scope(scope);
        match &stmt.init {
            Some(ForInit::Var(decl)) => self.exec_var(decl, &loop_scope)?,
            Some(ForInit::Expr(expr)) => {
                self.eval_expr(expr, &loop_scope)?;
            }
            None => {}
        }
        loop {
            self.tick()?;
            if let Some(test) = &stmt.test {
                if !self.eval_expr(test, &loop_scope)?.is_truthy() {
                    break;
                }
            }
            match self.exec_stmt(&stmt.body, &loop_scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
            if let Some(update) = &stmt.update {
                self.eval_expr(update, &loop_scope)?;
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_for_of(&mut self, stmt: &ForOfStmt, scope: &Scope) -> EvalResult<Completion> {
        let iterable = self.eval_expr(&stmt.iterable, scope)?;
        for item in self.iterate(&iterable)? {
            self.tick()?;
            let iteration = self.new_scope(scope);
            self.bind_pattern(&stmt.pattern, item, &iteration, stmt.kind != VarKind::Const)?;
            match self.exec_stmt(&stmt.body, &iteration)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    /// Keys a `for…in` visits: own enumerable keys, or indices of arrays
    /// and strings. Nullish objects visit nothing.
    fn exec_for_in(&mut self, stmt: &ForInStmt, scope: &Scope) -> EvalResult<Completion> {
        let object = self.eval_expr(&stmt.object, scope)?;
        let keys: Vec<String> = match &object {
            Value::Object(obj) => obj.keys(),
            Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            Value::Function(func) => func.object().props.borrow().keys().cloned().collect(),
            _ => Vec::new(),
        };
        self.charge(keys.len() as u64)?;
        for key in keys {
            self.tick()?;
            let iteration = self.new_scope(scope);
            self.bind_pattern(&stmt.pattern, Value::string(key), &iteration, stmt.kind != VarKind::Const)?;
            match self.exec_stmt(&stmt.body, &iteration)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    /// `while`, or `do…while` when `body_first`.
    fn exec_while(&mut self, stmt: &WhileStmt, scope: &Scope, body_first: bool) -> EvalResult<Completion> {
        let mut first = body_first;
        loop {
            self.tick()?;
            if !std::mem::take(&mut first) && !self.eval_expr(&stmt.condition, scope)?.is_truthy() {
                break;
            }
            match self.exec_stmt(&stmt.body, scope)? {
                Completion::Break => break,
                Completion::Return(value) => return Ok(Completion::Return(value)),
                Completion::Normal | Completion::Continue => {}
            }
        }
        Ok(Completion::Normal)
    }

    /// Cases compare with `===`; control falls through until a `break`.
    fn exec_switch(&mut self, stmt: &SwitchStmt, scope: &Scope) -> EvalResult<Completion> {
        let discriminant = self.eval_expr(&stmt.discriminant, scope)?;
        let mut start = None;
        for (i, case) in stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval_expr(test, scope)?.strict_eq(&discriminant) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| stmt.cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };
        let inner = self.new_scope(scope);
        for decl in stmt.cases.iter().flat_map(|case| &case.body) {
            if let Stmt::Function(decl) = decl {
                let func = self.make_closure(&decl.func, &inner, Some(&decl.name.name));
                inner.declare(&decl.name.name, func, true);
            }
        }
        for body in stmt.cases[start..].iter().flat_map(|case| &case.body) {
            match self.exec_stmt(body, &inner)? {
                Completion::Normal => {}
                Completion::Break => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_try(&mut self, stmt: &TryStmt, scope: &Scope) -> EvalResult<Completion> {
        let result = match (self.exec_block(&stmt.block, scope), &stmt.handler) {
            (Err(error), Some(handler)) if error.is_catchable() => {
                let thrown = self.error_to_value(error);
                let catch_scope = self.new_scope(scope);
                match &stmt.param {
                    Some(param) => self
                        .bind_pattern(param, thrown, &catch_scope, true)
                        .and_then(|()| self.exec_stmts(&handler.stmts, &catch_scope)),
                    None => self.exec_stmts(&handler.stmts, &catch_scope),
                }
            }
            (result, _) => result,
        };
        if let Err(error) = &result {
            if !error.is_catchable() {
                return result;
            }
        }
        if let Some(finalizer) = &stmt.finalizer {
            match self.exec_block(finalizer, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    /// Copy every named export of `module` onto this module's exports.
    fn exec_export_all(&mut self, module: &Ident, scope: &Scope) -> EvalResult<()> {
        let source = scope.lookup(&module.name).unwrap_or(Value::Undefined);
        let exports = scope.lookup("exports").unwrap_or(Value::Undefined);
        let (Value::Object(source), Value::Object(exports)) = (source, exports) else {
            return Ok(());
        };
        for (key, value) in source.entries() {
            if key != "default" && !exports.has(&key) {
                exports.set(key, value);
            }
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Patterns
    // ══════════════════════════════════════════════════════════════════════

    pub(crate) fn bind_pattern(&mut self, pattern: &Pattern, value: Value, scope: &Scope, mutable: bool) -> EvalResult<()> {
        match pattern {
            Pattern::Ident(ident) => {
                scope.declare(&ident.name, value, mutable);
                Ok(())
            }
            Pattern::Object { props, rest, .. } => {
                if value.is_nullish() {
                    return Err(EvalError::type_error(format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_display(),
                        value.to_display()
                    )));
                }
                for prop in props {
                    let mut item = self.get_member(&value, &prop.key)?;
                    if let (Value::Undefined, Some(default)) = (&item, &prop.default) {
                        item = self.eval_expr(default, scope)?;
                    }
                    self.bind_pattern(&prop.value, item, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let used: HashSet<&str> = props.iter().map(|p| p.key.as_str()).collect();
                    let mut remaining = PropertyMap::new();
                    if let Value::Object(obj) = &value {
                        for (key, item) in obj.entries() {
                            if !used.contains(key.as_str()) {
                                remaining.insert(key, item);
                            }
                        }
                    }
                    scope.declare(&rest.name, Value::object(remaining), mutable);
                }
                Ok(())
            }
            Pattern::Array { elems, rest, .. } => {
                let items = self.iterate(&value)?;
                for (i, elem) in elems.iter().enumerate() {
                    let Some(elem) = elem else { continue };
                    let mut item = items.get(i).cloned().unwrap_or(Value::Undefined);
                    if let (Value::Undefined, Some(default)) = (&item, &elem.default) {
                        item = self.eval_expr(default, scope)?;
                    }
                    self.bind_pattern(&elem.pattern, item, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let tail = items.get(elems.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    scope.declare(&rest.name, Value::array(tail), mutable);
                }
                Ok(())
            }
        }
    }

    /// Values produced by iterating `value` (arrays and strings). Pays one
    /// unit of gas per item.
    pub(crate) fn iterate(&mut self, value: &Value) -> EvalResult<Vec<Value>> {
        match value {
            Value::Array(items) => {
                self.charge(items.len() as u64)?;
                Ok(items.snapshot())
            }
            Value::String(s) => {
                self.charge(s.len() as u64)?;
                Ok(s.chars().map(|c| Value::string(c.to_string())).collect())
            }
            other => Err(EvalError::type_error(format!(
                "{} is not iterable",
                other.to_display()
            ))),
        }
    }

    /// Own enumerable `(key, value)` pairs of objects, arrays and strings,
    /// with accessor properties read through their getters.
    pub(crate) fn own_entries(&mut self, value: &Value) -> EvalResult<Vec<(String, Value)>> {
        match value {
            Value::Object(obj) => {
                let entries = obj.entries();
                self.charge(entries.len() as u64)?;
                let mut out = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let item = self.resolve_accessor(value, item)?;
                    out.push((key, item));
                }
                Ok(out)
            }
            Value::Array(_) | Value::String(_) => Ok(self
                .iterate(value)?
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// A stored property value as a read sees it: accessor slots run
    /// their getter against `receiver`.
    fn resolve_accessor(&mut self, receiver: &Value, stored: Value) -> EvalResult<Value> {
        match &stored {
            Value::Object(slot) if slot.class() == ObjectClass::Accessor => match slot.get("get") {
                Some(getter @ Value::Function(_)) => self.call(&getter, receiver.clone(), Vec::new()),
                _ => Ok(Value::Undefined),
            },
            _ => Ok(stored),
        }
    }

    /// Own property read that runs getters.
    fn read_own(&mut self, object: &Value, key: &str) -> EvalResult<Option<Value>> {
        match object.own_property(key) {
            Some(stored) => self.resolve_accessor(object, stored).map(Some),
            None => Ok(None),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════

    pub fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::String(s) => Ok(Value::string(s)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Template(parts) => self.eval_template(parts, scope),
            ExprKind::Ident(name) => self.eval_ident(name, scope),
            ExprKind::This => Ok(scope.lookup("this").unwrap_or(Value::Undefined)),

            ExprKind::Array(elems) => self.eval_array(elems, scope),
            ExprKind::Object(defs) => self.eval_object(defs, scope),
            ExprKind::Function(func) => Ok(self.make_closure(func, scope, None)),

            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target, scope),
            ExprKind::Binary { left, op, right } => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                self.binary(*op, &left, &right)
            }
            ExprKind::Await(operand) => {
                let value = self.eval_expr(operand, scope)?;
                self.await_value(value)
            }
            ExprKind::Regex { pattern, flags } => regexp::new_regexp(self, pattern, flags),
            ExprKind::Logical { left, op, right } => self.eval_logical(left, *op, right, scope),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval_expr(test, scope)?.is_truthy() {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            ExprKind::Assign { target, op, value } => self.eval_assign(target, *op, value, scope),

            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined))
            }
            ExprKind::New { callee, args } => {
                let constructor = self.eval_expr(callee, scope)?;
                let args = self.eval_args(args, scope)?;
                self.construct(&constructor, args, &callee_name(callee))
            }

            ExprKind::Markup(_) => Err(EvalError::syntax_error("markup must be lowered before evaluation")),
        }
    }

    // ── Literals & Names ──────────────────────────────────────────────────

    fn eval_ident(&mut self, name: &str, scope: &Scope) -> EvalResult<Value> {
        match scope.lookup(name) {
            Some(value) => Ok(value),
            None => Err(EvalError::reference_error(format!("{name} is not defined"))),
        }
    }

    fn eval_template(&mut self, parts: &[TemplatePart], scope: &Scope) -> EvalResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Expr(expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    out.push_str(&self.display(&value)?);
                }
            }
            self.check_string_length(out.len() as f64)?;
        }
        Ok(Value::string(out))
    }

    fn eval_array(&mut self, elems: &[ArrayElem], scope: &Scope) -> EvalResult<Value> {
        let mut items = Vec::with_capacity(elems.len());
        for elem in elems {
            match elem {
                ArrayElem::Expr(expr) => items.push(self.eval_expr(expr, scope)?),
                ArrayElem::Spread(expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    items.extend(self.iterate(&value)?);
                }
                ArrayElem::Hole => items.push(Value::Undefined),
            }
        }
        Ok(Value::array(items))
    }

    fn eval_object(&mut self, defs: &[PropDef], scope: &Scope) -> EvalResult<Value> {
        let mut props = PropertyMap::new();
        for def in defs {
            match def {
                PropDef::KeyValue(key, value) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let value = match &value.kind {
                        ExprKind::Function(func) => self.make_closure(func, scope, Some(&key)),
                        _ => self.eval_expr(value, scope)?,
                    };
                    props.insert(key, value);
                }
                PropDef::Shorthand(ident) => {
                    let value = self.eval_ident(&ident.name, scope)?;
                    props.insert(ident.name.clone(), value);
                }
                PropDef::Method(key, func) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let method = self.make_closure(func, scope, Some(&key));
                    props.insert(key, method);
                }
                PropDef::Getter(key, func) | PropDef::Setter(key, func) => {
                    let key = self.eval_prop_key(key, scope)?;
                    let half = if matches!(def, PropDef::Getter(..)) { "get" } else { "set" };
                    let function = self.make_closure(func, scope, Some(&key));
                    let existing = match props.get(&key) {
                        Some(Value::Object(slot)) if slot.class() == ObjectClass::Accessor => Some(slot.clone()),
                        _ => None,
                    };
                    match existing {
                        Some(slot) => slot.set(half, function),
                        None => {
                            let pair = PropertyMap::from_iter([(half.to_string(), function)]);
                            props.insert(key, Value::object_of(ObjectClass::Accessor, pair));
                        }
                    }
                }
                PropDef::Spread(expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    props.extend(self.own_entries(&value)?);
                }
            }
        }
        Ok(Value::object(props))
    }

    fn eval_prop_key(&mut self, key: &PropKey, scope: &Scope) -> EvalResult<String> {
        match key {
            PropKey::Named(name) => Ok(name.clone()),
            PropKey::Computed(expr) => Ok(property_key(&self.eval_expr(expr, scope)?)),
        }
    }

    fn eval_args(&mut self, args: &[Argument], scope: &Scope) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Expr(expr) => values.push(self.eval_expr(expr, scope)?),
                Argument::Spread(expr) => {
                    let value = self.eval_expr(expr, scope)?;
                    values.extend(self.iterate(&value)?);
                }
            }
        }
        Ok(values)
    }

    // ── Operators ─────────────────────────────────────────────────────────

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &Scope) -> EvalResult<Value> {
        if let (UnaryOp::TypeOf, ExprKind::Ident(name)) = (op, &operand.kind) {
            let value = scope.lookup(name).unwrap_or(Value::Undefined);
            return Ok(Value::string(value.type_of()));
        }
        let value = self.eval_expr(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.is_truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::string(value.type_of()),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::BitNot => Value::Number(f64::from(!to_int32(value.to_number()))),
        })
    }

    fn eval_logical(&mut self, left: &Expr, op: LogicalOp, right: &Expr, scope: &Scope) -> EvalResult<Value> {
        let left = self.eval_expr(left, scope)?;
        let short_circuit = match op {
            LogicalOp::And => !left.is_truthy(),
            LogicalOp::Or => left.is_truthy(),
            LogicalOp::Nullish => !left.is_nullish(),
        };
        if short_circuit {
            Ok(left)
        } else {
            self.eval_expr(right, scope)
        }
    }

    fn eval_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr, scope: &Scope) -> EvalResult<Value> {
        let place = self.resolve_place(target, scope)?;
        let value = match op {
            AssignOp::Assign => match (&value.kind, &place) {
                (ExprKind::Function(func), Place::Binding(name)) => self.make_closure(func, scope, Some(name)),
                _ => self.eval_expr(value, scope)?,
            },
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
                let current = self.read_place(&place, scope)?;
                let keep = match op {
                    AssignOp::And => !current.is_truthy(),
                    AssignOp::Or => current.is_truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval_expr(value, scope)?
            }
            compound => {
                let current = self.read_place(&place, scope)?;
                let rhs = self.eval_expr(value, scope)?;
                match compound.binary() {
                    Some(bin) => self.binary(bin, &current, &rhs)?,
                    None => rhs,
                }
            }
        };
        self.write_place(&place, value.clone(), scope)?;
        Ok(value)
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, target: &Expr, scope: &Scope) -> EvalResult<Value> {
        let place = self.resolve_place(target, scope)?;
        let old = self.read_place(&place, scope)?.to_number();
        let new = match op {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        self.write_place(&place, Value::Number(new), scope)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn resolve_place(&mut self, target: &Expr, scope: &Scope) -> EvalResult<Place> {
        match &target.kind {
            ExprKind::Ident(name) => Ok(Place::Binding(name.clone())),
            ExprKind::Member { object, property, .. } => {
                Ok(Place::Property(self.eval_expr(object, scope)?, property.clone()))
            }
            ExprKind::Index { object, index, .. } => {
                let object = self.eval_expr(object, scope)?;
                let key = property_key(&self.eval_expr(index, scope)?);
                Ok(Place::Property(object, key))
            }
            _ => Err(EvalError::syntax_error("Invalid left-hand side in assignment")),
        }
    }

    fn read_place(&mut self, place: &Place, scope: &Scope) -> EvalResult<Value> {
        match place {
            Place::Binding(name) => self.eval_ident(name, scope),
            Place::Property(object, key) => self.get_member(object, key),
        }
    }

    fn write_place(&mut self, place: &Place, value: Value, scope: &Scope) -> EvalResult<()> {
        match place {
            Place::Binding(name) => match scope.assign(name, value) {
                Ok(()) => Ok(()),
                Err(AssignError::Undeclared) => {
                    Err(EvalError::reference_error(format!("{name} is not defined")))
                }
                Err(AssignError::Constant) => {
                    Err(EvalError::type_error("Assignment to constant variable."))
                }
                Err(AssignError::Import) => Err(EvalError::type_error(format!(
                    "Assignment to imported binding '{name}'."
                ))),
            },
            Place::Property(object, key) => self.set_member(object, key, value),
        }
    }

    // ── Member Access & Calls ─────────────────────────────────────────────

    /// Evaluate a member/index/call chain; `None` when an optional link
    /// short-circuited the rest of the chain.
    fn eval_chain(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                self.get_member(&object, property).map(Some)
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                let Some(object) = self.eval_chain_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(&self.eval_expr(index, scope)?);
                self.get_member(&object, &key).map(Some)
            }
            ExprKind::Call {
                callee,
                args,
                optional,
            } => self.eval_call(callee, args, *optional, scope),
            _ => self.eval_expr(expr, scope).map(Some),
        }
    }

    fn eval_chain_link(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Call { .. } => {
                self.tick()?;
                self.eval_chain(expr, scope)
            }
            _ => self.eval_expr(expr, scope).map(Some),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Argument], optional: bool, scope: &Scope) -> EvalResult<Option<Value>> {
        // Method calls keep their receiver as `this`.
        let receiver_and_key = match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional: optional_member,
            } => {
                let Some(receiver) = self.eval_chain_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional_member && receiver.is_nullish() {
                    return Ok(None);
                }
                Some((receiver, property.clone()))
            }
            ExprKind::Index {
                object,
                index,
                optional: optional_member,
            } => {
                let Some(receiver) = self.eval_chain_link(object, scope)? else {
                    return Ok(None);
                };
                if *optional_member && receiver.is_nullish() {
                    return Ok(None);
                }
                let key = property_key(&self.eval_expr(index, scope)?);
                Some((receiver, key))
            }
            _ => None,
        };

        match receiver_and_key {
            Some((receiver, key)) => {
                let own = self.read_own(&receiver, &key)?;
                if optional && own.as_ref().map_or(true, Value::is_nullish) && !builtins::has_method(&receiver, &key) {
                    return Ok(None);
                }
                let args = self.eval_args(args, scope)?;
                match own {
                    Some(method) if !method.is_nullish() => {
                        self.ensure_callable(&method, callee)?;
                        self.call(&method, receiver, args).map(Some)
                    }
                    _ => match builtins::call_method(self, &receiver, &key, args)? {
                        Some(value) => Ok(Some(value)),
                        None if receiver.is_nullish() => Err(EvalError::type_error(format!(
                            "Cannot read properties of {} (reading '{key}')",
                            receiver.to_display()
                        ))),
                        None => Err(EvalError::type_error(format!(
                            "{} is not a function",
                            callee_name(callee)
                        ))),
                    },
                }
            }
            None => {
                let Some(function) = self.eval_chain_link(callee, scope)? else {
                    return Ok(None);
                };
                if optional && function.is_nullish() {
                    return Ok(None);
                }
                self.ensure_callable(&function, callee)?;
                let args = self.eval_args(args, scope)?;
                self.call(&function, Value::Undefined, args).map(Some)
            }
        }
    }

    fn ensure_callable(&self, value: &Value, callee: &Expr) -> EvalResult<()> {
        match value {
            Value::Function(_) => Ok(()),
            _ => Err(EvalError::type_error(format!(
                "{} is not a function",
                callee_name(callee)
            ))),
        }
    }

    /// Property read, including built-in properties and methods.
    pub fn get_member(&mut self, object: &Value, key: &str) -> EvalResult<Value> {
        if object.is_nullish() {
            return Err(EvalError::type_error(format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_display()
            )));
        }
        if let Some(value) = self.read_own(object, key)? {
            return Ok(value);
        }
        Ok(builtins::get_builtin(object, key).unwrap_or(Value::Undefined))
    }

    /// [`binary_op`], plus the string length limit for concatenation.
    fn binary(&mut self, op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
        let value = binary_op(op, left, right)?;
        if let (BinOp::Add, Value::String(s)) = (op, &value) {
            self.charge(s.len() as u64 / 64)?;
        }
        Ok(value)
    }

    pub fn set_member(&mut self, object: &Value, key: &str, value: Value) -> EvalResult<()> {
        match object {
            Value::Undefined | Value::Null => Err(EvalError::type_error(format!(
                "Cannot set properties of {} (setting '{key}')",
                object.to_display()
            ))),
            Value::Object(obj) => {
                if obj.class() == ObjectClass::RegExp && key == "lastIndex" {
                    obj.set(LAST_INDEX_SLOT, value);
                    return Ok(());
                }
                match obj.get(key) {
                    Some(Value::Object(slot)) if slot.class() == ObjectClass::Accessor => {
                        let Some(setter @ Value::Function(_)) = slot.get("set") else {
                            return Err(EvalError::type_error(format!(
                                "Cannot set property {key} of #<Object> which has only a getter"
                            )));
                        };
                        self.call(&setter, object.clone(), vec![value])?;
                    }
                    _ => obj.set(key, value),
                }
                Ok(())
            }
            Value::Function(func) => {
                func.set(key, value);
                Ok(())
            }
            Value::Array(items) => {
                if key == "length" {
                    let len = self.array_length(value.to_number(), items.len())?;
                    items.borrow_mut().resize(len, Value::Undefined);
                } else if let Some(index) = array_index(key)? {
                    let len = self.array_length(index as f64 + 1.0, items.len())?;
                    let mut items = items.borrow_mut();
                    if len > items.len() {
                        items.resize(len, Value::Undefined);
                    }
                    items[index] = value;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvalOptions::default())
    }
}

impl Drop for Evaluator {
    fn drop(&mut self) {
        for weak in self.scopes.drain(..) {
            if let Some(scope) = weak.upgrade() {
                scope.clear();
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Property key for a computed access: `a[1]` and `a["1"]` are the same key.
pub fn property_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => other.to_display(),
    }
}

/// Array index named by `key`; `None` for keys that are not indices.
/// Indices from `2^32 - 1` up are out of range for any array.
fn array_index(key: &str) -> EvalResult<Option<usize>> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match key.parse::<f64>() {
        Ok(n) if n < MAX_ARRAY_LENGTH => Ok(Some(n as usize)),
        _ => Err(EvalError::range_error("Invalid array length")),
    }
}

/// `ToInt32`: wrap a number into the signed 32-bit range.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32 as i32
}

fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

/// Source-like name of a callee for error messages: `user.save`.
fn callee_name(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::This => "this".into(),
        ExprKind::Member { object, property, .. } => format!("{}.{property}", callee_name(object)),
        ExprKind::Index { object, .. } => format!("{}[...]", callee_name(object)),
        ExprKind::Call { callee, .. } => format!("{}(...)", callee_name(callee)),
        _ => "expression".into(),
    }
}

pub(crate) fn binary_op(op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    Ok(match op {
        BinOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (l, r) if is_stringish(l) || is_stringish(r) => {
                let too_long = || EvalError::range_error("Invalid string length");
                let l = l.to_display_within(MAX_STRING_LENGTH).ok_or_else(too_long)?;
                let r = r.to_display_within(MAX_STRING_LENGTH - l.len()).ok_or_else(too_long)?;
                Value::string(l + &r)
            }
            _ => num(|a, b| a + b),
        },
        BinOp::Sub => num(|a, b| a - b),
        BinOp::Mul => num(|a, b| a * b),
        BinOp::Div => num(|a, b| a / b),
        BinOp::Mod => num(|a, b| a % b),
        BinOp::Pow => num(f64::powf),
        BinOp::BitAnd => Value::Number(f64::from(to_int32(left.to_number()) & to_int32(right.to_number()))),
        BinOp::BitOr => Value::Number(f64::from(to_int32(left.to_number()) | to_int32(right.to_number()))),
        BinOp::BitXor => Value::Number(f64::from(to_int32(left.to_number()) ^ to_int32(right.to_number()))),
        BinOp::Shl => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_int32(left.to_number()).wrapping_shl(shift)))
        }
        BinOp::Shr => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_int32(left.to_number()) >> shift))
        }
        BinOp::UShr => {
            let shift = to_uint32(right.to_number()) & 31;
            Value::Number(f64::from(to_uint32(left.to_number()) >> shift))
        }
        BinOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
        BinOp::LooseEq => Value::Bool(left.loose_eq(right)),
        BinOp::LooseNotEq => Value::Bool(!left.loose_eq(right)),
        BinOp::Less => Value::Bool(compare(left, right).is_some_and(|o| o.is_lt())),
        BinOp::Greater => Value::Bool(compare(left, right).is_some_and(|o| o.is_gt())),
        BinOp::LessEq => Value::Bool(compare(left, right).is_some_and(|o| o.is_le())),
        BinOp::GreaterEq => Value::Bool(compare(left, right).is_some_and(|o| o.is_ge())),
        BinOp::In => {
            let key = property_key(left);
            match right {
                Value::Object(obj) => Value::Bool(obj.has(&key)),
                Value::Function(func) => Value::Bool(func.get(&key).is_some()),
                Value::Array(items) => Value::Bool(
                    key == "length" || key.parse::<usize>().is_ok_and(|i| i < items.len()),
                ),
                other => {
                    return Err(EvalError::type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        other.to_display()
                    )))
                }
            }
        }
        BinOp::InstanceOf => Value::Bool(instance_of(left, right)?),
    })
}

fn is_stringish(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn instance_of(left: &Value, right: &Value) -> EvalResult<bool> {
    let Value::Function(constructor) = right else {
        return Err(EvalError::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ));
    };
    Ok(match (constructor.name(), left) {
        ("Array", Value::Array(_)) => true,
        ("Object", Value::Object(_) | Value::Array(_) | Value::Function(_)) => true,
        ("Function", Value::Function(_)) => true,
        ("Date", Value::Object(obj)) => obj.class() == ObjectClass::Date,
        ("RegExp", Value::Object(obj)) => obj.class() == ObjectClass::RegExp,
        ("Promise", Value::Object(obj)) => obj.class() == ObjectClass::Promise,
        ("Error", Value::Object(obj)) => obj.class() == ObjectClass::Error,
        (name, Value::Object(obj)) if obj.class() == ObjectClass::Error => {
            obj.get("name").is_some_and(|n| n.to_display() == name)
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_coerces_to_string() {
        let v = binary_op(BinOp::Add, &Value::string("n="), &Value::Number(2.0)).unwrap();
        assert_eq!(v.to_display(), "n=2");
        let v = binary_op(BinOp::Add, &Value::Number(1.0), &Value::Bool(true)).unwrap();
        assert_eq!(v.to_number(), 2.0);
    }

    #[test]
    fn test_comparison_with_nan_is_false() {
        let nan = Value::Number(f64::NAN);
        assert!(!binary_op(BinOp::Less, &nan, &Value::Number(1.0)).unwrap().is_truthy());
        assert!(!binary_op(BinOp::GreaterEq, &nan, &nan).unwrap().is_truthy());
        assert!(binary_op(BinOp::Less, &Value::string("a"), &Value::string("b"))
            .unwrap()
            .is_truthy());
    }

    #[test]
    fn test_bitwise_operators_wrap_to_32_bits() {
        let n = |v: f64| Value::Number(v);
        let run = |op, l: f64, r: f64| binary_op(op, &n(l), &n(r)).unwrap().to_number();
        assert_eq!(run(BinOp::BitOr, 4_294_967_297.0, 0.0), 1.0);
        assert_eq!(run(BinOp::Shl, 1.0, 31.0), -2_147_483_648.0);
        assert_eq!(run(BinOp::Shl, 1.0, 33.0), 2.0);
        assert_eq!(run(BinOp::Shr, -8.0, 1.0), -4.0);
        assert_eq!(run(BinOp::UShr, -1.0, 0.0), 4_294_967_295.0);
        assert_eq!(run(BinOp::BitXor, 5.0, 3.0), 6.0);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(-1.5), -1);
    }

    #[test]
    fn test_array_index_range() {
        assert_eq!(array_index("7").unwrap(), Some(7));
        assert_eq!(array_index("x").unwrap(), None);
        assert_eq!(array_index("-1").unwrap(), None);
        assert!(array_index("4294967295").is_err());
        assert!(array_index("100000000000000000").is_err());
    }

    #[test]
    fn test_array_length_is_charged() {
        let mut evaluator = Evaluator::new(EvalOptions {
            gas_limit: 100,
            ..EvalOptions::default()
        });
        assert_eq!(evaluator.array_length(50.0, 10).unwrap(), 50);
        assert!(evaluator.array_length(-1.0, 0).is_err());
        assert!(evaluator.array_length(1.5, 0).is_err());
        assert!(matches!(evaluator.array_length(1000.0, 0), Err(EvalError::GasExhausted(100))));
    }

    #[test]
    fn test_property_key() {
        assert_eq!(property_key(&Value::Number(1.0)), "1");
        assert_eq!(property_key(&Value::string("x")), "x");
    }

    #[test]
    fn test_gas_limit() {
        let mut evaluator = Evaluator::new(EvalOptions {
            gas_limit: 3,
            ..EvalOptions::default()
        });
        assert!(evaluator.tick().is_ok());
        assert!(evaluator.tick().is_ok());
        assert!(evaluator.tick().is_ok());
        assert!(matches!(evaluator.tick(), Err(EvalError::GasExhausted(3))));
    }
}
