//! Kiln sandbox host.
//!
//! Turns a flat set of path-addressed source files into a rendered preview:
//!
//! ```text
//! VirtualFile[] → Registry → Compiler (every file) → Loader (on demand) → Surface
//! ```
//!
//! Compile failures are collected per file; resolution and runtime failures
//! abort only the current cycle. Either way the caller gets a
//! [`RenderReport`], never an error or a panic.
//!
//! ```ignore
//! let report = kiln_sandbox::render_preview(files, None);
//! println!("{}", report.html());
//! ```

pub mod config;
pub mod entry;
pub mod loader;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod sandbox;
pub mod session;
pub mod snapshot;

pub use config::SandboxConfig;
pub use entry::select_entry;
pub use loader::{Loader, LoaderEvent, ModuleState};
pub use registry::{normalize_path, Registry, RegistryError};
pub use report::{Diagnostic, RenderOutcome, RenderReport, DIAGNOSTIC_TITLE, EMPTY_MESSAGE};
pub use resolver::{resolve, Resolution};
pub use sandbox::Sandbox;
pub use session::PreviewSession;
pub use snapshot::Snapshot;

use kiln_types::VirtualFile;

/// Render `files` once with the default configuration.
pub fn render_preview(files: Vec<VirtualFile>, entry: Option<&str>) -> RenderReport {
    let snapshot = Snapshot::new(files, entry.map(str::to_string));
    Sandbox::default().render(&snapshot)
}
