//! Running compiled module factories inside a realm.

use std::rc::Rc;

use kiln_types::ast::Stmt;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::value::*;

/// Resolves and executes `require` calls made by a running factory.
///
/// The loader implements this: it owns the module records, so it alone
/// decides whether a specifier yields a host capability, a cached
/// exports object, a partially populated one (cycles) or an error.
pub trait ModuleHost {
    fn require(&self, eval: &mut Evaluator, from_path: &str, specifier: &str) -> EvalResult<Value>;
}

/// The `module`/`exports` pair handed to one factory invocation.
#[derive(Clone)]
pub struct ModuleFrame {
    path: String,
    module: ObjectRef,
}

impl ModuleFrame {
    pub fn new(path: impl Into<String>) -> Self {
        let module = ObjectRef::new(ObjectClass::Plain, PropertyMap::new());
        module.set("exports", Value::object(PropertyMap::new()));
        Self {
            path: path.into(),
            module,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The current `module.exports`. A factory may replace it wholesale,
    /// so this is read fresh every time.
    pub fn exports(&self) -> Value {
        self.module.get("exports").unwrap_or(Value::Undefined)
    }
}

impl std::fmt::Debug for ModuleFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFrame").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Invoke a compiled factory body with its own `require`, `module` and
    /// `exports`. Errors are tagged with the frame's path unless they
    /// already carry an inner module's path.
    pub fn run_factory(&mut self, frame: &ModuleFrame, body: &[Stmt], host: Rc<dyn ModuleHost>) -> EvalResult<()> {
        tracing::trace!(path = frame.path(), "running module factory");
        let globals = self.globals().clone();
        let scope = self.new_scope(&globals);

        let from_path = frame.path().to_string();
        let require = Value::native("require", move |eval, _, args| {
            match args.first() {
                Some(Value::String(specifier)) => {
                    eval.nested_module(|eval| host.require(eval, &from_path, specifier))
                }
                _ => Err(EvalError::type_error("require expects a string specifier")),
            }
        });
        scope.declare("require", require, false);
        scope.declare("module", Value::Object(frame.module.clone()), false);
        scope.declare("exports", frame.exports(), false);
        let react = self.capability("react");
        scope.declare("React", react, false);
        let react_dom = self.capability("react-dom");
        scope.declare("ReactDOM", react_dom, false);

        self.exec_stmts(body, &scope)
            .map(|_| ())
            .map_err(|err| err.in_module(frame.path()))
    }
}
