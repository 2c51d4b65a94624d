//! Kiln tree-walking evaluator.
//!
//! Executes compiled module factories (see `kiln-compiler`) inside a
//! realm: one [`Evaluator`] holding the globals, host capabilities
//! (`react`, `react-dom`), captured console output and resource limits.
//! Module resolution is delegated to a [`ModuleHost`], so the evaluator
//! never touches the source registry itself.
//!
//! # Example
//!
//! ```ignore
//! let mut eval = Evaluator::new(EvalOptions::default());
//! let frame = ModuleFrame::new("/App.tsx");
//! eval.run_factory(&frame, &unit.factory.body(), host)?;
//! let surface = eval.mount_component(&frame.exports().own_property("default").unwrap())?;
//! println!("{}", kiln_eval::to_html(&surface));
//! ```

pub mod builtins;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod globals;
pub mod host;
pub mod mount;
mod promise;
pub mod realm;
mod regexp;
pub mod value;

pub use env::Scope;
pub use error::{ErrorKind, EvalError, EvalResult};
pub use evaluator::{Completion, EvalOptions, Evaluator};
pub use globals::{inspect, ConsoleLevel, ConsoleLine};
pub use host::{is_element, REACT_VERSION};
pub use mount::{to_html, SurfaceNode};
pub use realm::{ModuleFrame, ModuleHost};
pub use value::{ObjectClass, ObjectRef, Value};
