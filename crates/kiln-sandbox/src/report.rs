//! The observable output of one preview cycle.

use indexmap::IndexMap;
use serde::Serialize;

use kiln_eval::{to_html, ConsoleLine, SurfaceNode};
use kiln_types::{PreviewError, Stage};

use crate::loader::LoaderEvent;

/// Heading of the diagnostic panel.
pub const DIAGNOSTIC_TITLE: &str = "Preview Error";
/// Text of the empty state shown when there are no files.
pub const EMPTY_MESSAGE: &str = "No code generated yet.";

/// A contained failure, shown inside the sandbox in place of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub title: String,
    pub stage: Stage,
    pub path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, path: Option<String>, message: impl Into<String>) -> Self {
        Self {
            title: DIAGNOSTIC_TITLE.to_string(),
            stage,
            path,
            message: message.into(),
        }
    }

    pub fn from_error(error: &PreviewError) -> Self {
        Self::new(error.stage(), error.path().map(str::to_string), error.to_string())
    }

    /// The diagnostic panel as a surface tree.
    pub fn surface(&self) -> Vec<SurfaceNode> {
        let mut children = vec![SurfaceNode::element(
            "h2",
            IndexMap::new(),
            vec![SurfaceNode::text(self.title.clone())],
        )];
        let location = match &self.path {
            Some(path) => format!("{} failed in {path}", capitalize(&self.stage.to_string())),
            None => format!("{} failed", capitalize(&self.stage.to_string())),
        };
        children.push(SurfaceNode::element(
            "p",
            IndexMap::new(),
            vec![SurfaceNode::text(location)],
        ));
        children.push(SurfaceNode::element(
            "pre",
            IndexMap::new(),
            vec![SurfaceNode::text(self.message.clone())],
        ));
        vec![SurfaceNode::element("div", panel_attributes("kiln-preview-error"), children)]
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn panel_attributes(class: &str) -> IndexMap<String, String> {
    let mut attributes = IndexMap::new();
    attributes.insert("class".to_string(), class.to_string());
    attributes
}

/// What ended up on the surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// The program rendered.
    Mounted { surface: Vec<SurfaceNode>, html: String },
    /// A stage failed; the diagnostic panel is shown instead.
    Diagnostic { diagnostic: Diagnostic, html: String },
    /// No files: the empty state.
    Empty { message: String, html: String },
}

impl RenderOutcome {
    pub fn mounted(surface: Vec<SurfaceNode>) -> Self {
        let html = to_html(&surface);
        RenderOutcome::Mounted { surface, html }
    }

    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        let html = to_html(&diagnostic.surface());
        RenderOutcome::Diagnostic { diagnostic, html }
    }

    pub fn empty() -> Self {
        let panel = SurfaceNode::element(
            "div",
            panel_attributes("kiln-preview-empty"),
            vec![SurfaceNode::text(EMPTY_MESSAGE)],
        );
        RenderOutcome::Empty {
            message: EMPTY_MESSAGE.to_string(),
            html: panel.to_html(),
        }
    }

    pub fn html(&self) -> &str {
        match self {
            RenderOutcome::Mounted { html, .. }
            | RenderOutcome::Diagnostic { html, .. }
            | RenderOutcome::Empty { html, .. } => html,
        }
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self, RenderOutcome::Mounted { .. })
    }

    pub fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            RenderOutcome::Diagnostic { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

/// Everything one preview cycle produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Short fingerprint of the input snapshot.
    pub cycle: String,
    pub entry: Option<String>,
    pub outcome: RenderOutcome,
    /// Per-file compile failures, including files never reached.
    pub compile_failures: Vec<PreviewError>,
    pub events: Vec<LoaderEvent>,
    pub console: Vec<ConsoleLine>,
}

impl RenderReport {
    pub fn html(&self) -> &str {
        self.outcome.html()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
