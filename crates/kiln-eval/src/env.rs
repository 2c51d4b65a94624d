//! Lexical scopes.
//!
//! A [`Scope`] is a shared handle to one level of bindings plus its parent.
//! Closures hold on to the scope they were created in, so scopes are
//! reference counted rather than pushed and popped.

use kiln_types::ast::ImportedName;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::value::{Value, ES_MODULE_FLAG};

#[derive(Clone)]
pub enum Binding {
    Value { value: Value, mutable: bool },
    /// Live view of another module's export.
    Import { module: Value, import: ImportedName },
}

pub(crate) struct ScopeData {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Scope>,
}

#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

/// Why an assignment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undeclared,
    Constant,
    Import,
}

impl Scope {
    pub fn root() -> Self {
        Self(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Self(Rc::new(ScopeData {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeData> {
        Rc::downgrade(&self.0)
    }

    /// Bind `name` in this scope, shadowing outer bindings.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0
            .vars
            .borrow_mut()
            .insert(name.to_string(), Binding::Value { value, mutable });
    }

    pub fn declare_import(&self, name: &str, module: Value, import: ImportedName) {
        self.0
            .vars
            .borrow_mut()
            .insert(name.to_string(), Binding::Import { module, import });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(binding) = current.0.vars.borrow().get(name) {
                return Some(match binding {
                    Binding::Value { value, .. } => value.clone(),
                    Binding::Import { module, import } => read_import(module, import),
                });
            }
            scope = current.0.parent.as_ref();
        }
        None
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            let mut vars = current.0.vars.borrow_mut();
            if let Some(binding) = vars.get_mut(name) {
                return match binding {
                    Binding::Value { mutable: false, .. } => Err(AssignError::Constant),
                    Binding::Value { value: slot, .. } => {
                        *slot = value;
                        Ok(())
                    }
                    Binding::Import { .. } => Err(AssignError::Import),
                };
            }
            drop(vars);
            scope = current.0.parent.as_ref();
        }
        Err(AssignError::Undeclared)
    }
}

impl ScopeData {
    /// Drop every binding; breaks closure/scope reference cycles.
    pub(crate) fn clear(&self) {
        let vars = std::mem::take(&mut *self.vars.borrow_mut());
        drop(vars);
    }
}

/// Read an imported binding at the time of use.
///
/// Compiled modules mark their exports object with `__esModule`, so a
/// default import reads `exports.default`; anything else (host
/// capabilities, stubs) is its own default.
pub fn read_import(module: &Value, import: &ImportedName) -> Value {
    match import {
        ImportedName::Namespace => module.clone(),
        ImportedName::Named(name) => module.own_property(name).unwrap_or(Value::Undefined),
        ImportedName::Default => {
            let is_es_module = module
                .own_property(ES_MODULE_FLAG)
                .is_some_and(|flag| flag.is_truthy());
            if is_es_module {
                module.own_property("default").unwrap_or(Value::Undefined)
            } else {
                module.clone()
            }
        }
    }
}
