//! Kiln preview engine as a WASM module for browser environments.
//!
//! The host page hands over the generated file set and gets back a render
//! report; the page never runs generated code itself.
//!
//! # Usage (JavaScript)
//!
//! ```js
//! import init, { render_preview } from 'kiln-wasm';
//!
//! await init();
//!
//! const files = [{ path: "App.tsx", code: "export default () => <h1>Hi</h1>" }];
//! const report = JSON.parse(render_preview(JSON.stringify(files), null));
//! frame.srcdoc = report.outcome.html;
//! // { cycle: "9f2c…", entry: "App.tsx", outcome: { status: "mounted", html: "<h1>Hi</h1>", … }, … }
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use kiln_sandbox::{
    Diagnostic, RenderOutcome, RenderReport, Sandbox, SandboxConfig, Snapshot,
};
use kiln_types::Stage;

/// Render a file set.
///
/// `files_json` is either an array of `{ path, code | sourceText }` objects
/// or `{ files, entry }`. `entry` overrides the snapshot's entry when set.
///
/// Returns a JSON `RenderReport`. Malformed input yields a report with a
/// diagnostic outcome; this function never throws.
#[wasm_bindgen]
pub fn render_preview(files_json: &str, entry: Option<String>) -> String {
    render_with(SandboxConfig::default(), files_json, entry)
}

/// Like [`render_preview`], with a `SandboxConfig` JSON object
/// (`gas_limit`, `max_call_depth`, `max_module_depth`, `clock_ms`,
/// `entry_names`, `capabilities`).
#[wasm_bindgen]
pub fn render_preview_with_config(files_json: &str, entry: Option<String>, config_json: &str) -> String {
    match SandboxConfig::from_json(config_json) {
        Ok(config) => render_with(config, files_json, entry),
        Err(e) => invalid_input(format!("Invalid sandbox configuration: {e}")),
    }
}

fn render_with(config: SandboxConfig, files_json: &str, entry: Option<String>) -> String {
    let mut snapshot = match Snapshot::from_json(files_json) {
        Ok(snapshot) => snapshot,
        Err(e) => return invalid_input(format!("Invalid file set: {e}")),
    };
    if entry.is_some() {
        snapshot.entry = entry;
    }
    Sandbox::new(config).render(&snapshot).to_json()
}

/// Render a file set passed as a JS array, returning the report as a JS
/// object.
#[wasm_bindgen]
pub fn render_preview_value(files: JsValue, entry: Option<String>) -> Result<JsValue, JsValue> {
    let files: Vec<kiln_types::VirtualFile> = serde_wasm_bindgen::from_value(files)?;
    let report = Sandbox::default().render(&Snapshot::new(files, entry));
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    Ok(report.serialize(&serializer)?)
}

/// Resolve `specifier` from `from_path` against a file set.
///
/// Returns `{"kind":"file","target":"src/Button.tsx"}`,
/// `{"kind":"capability","target":"react"}` or `{"kind":"unresolved"}`.
#[wasm_bindgen]
pub fn resolve(from_path: &str, specifier: &str, files_json: &str) -> String {
    let resolution = match Snapshot::from_json(files_json) {
        Ok(snapshot) => kiln_sandbox::resolve(&snapshot.registry(), from_path, specifier),
        Err(_) => kiln_sandbox::Resolution::Unresolved,
    };
    serde_json::to_string(&resolution).unwrap_or_else(|e| {
        format!(r#"{{"kind":"unresolved","error":"Serialization error: {}"}}"#, e)
    })
}

/// Compile one file without running it.
///
/// Returns the structured diagnostics as JSON; `total_errors` is `0` when
/// the file compiles. Useful for editor integration.
#[wasm_bindgen]
pub fn check(source: &str, filename: &str) -> String {
    let errors = match kiln_compiler::compile_source(filename, source) {
        Ok(_) => kiln_types::CompileErrors::empty(),
        Err(failure) => failure.errors,
    };
    serde_json::to_string(&errors).unwrap_or_else(|e| {
        format!(
            r#"{{"errors":[{{"message":"Serialization error: {}"}}],"warnings":[],"total_errors":1,"total_warnings":0}}"#,
            e
        )
    })
}

/// Return the engine version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn invalid_input(message: String) -> String {
    let report = RenderReport {
        cycle: String::new(),
        entry: None,
        outcome: RenderOutcome::diagnostic(Diagnostic::new(Stage::Select, None, message)),
        compile_failures: Vec::new(),
        events: Vec::new(),
        console: Vec::new(),
    };
    report.to_json()
}
