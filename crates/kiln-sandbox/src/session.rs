//! Preview sessions: the latest inputs and the report of the current cycle.

use kiln_types::VirtualFile;

use crate::config::SandboxConfig;
use crate::report::RenderReport;
use crate::sandbox::Sandbox;
use crate::snapshot::Snapshot;

/// Tracks the producer's latest file set and entry selection.
///
/// Changing either input discards the previous cycle wholesale; the next
/// [`PreviewSession::render`] starts from scratch. Rendering twice without
/// a change returns the same report.
#[derive(Debug, Default)]
pub struct PreviewSession {
    sandbox: Sandbox,
    snapshot: Snapshot,
    report: Option<RenderReport>,
    cycles: usize,
}

impl PreviewSession {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            sandbox: Sandbox::new(config),
            ..Self::default()
        }
    }

    pub fn set_files(&mut self, files: Vec<VirtualFile>) {
        self.snapshot.files = files;
        self.report = None;
    }

    pub fn select_entry(&mut self, entry: Option<String>) {
        if self.snapshot.entry != entry {
            self.snapshot.entry = entry;
            self.report = None;
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Cycles run so far.
    pub fn cycles(&self) -> usize {
        self.cycles
    }

    pub fn render(&mut self) -> &RenderReport {
        let (sandbox, snapshot, cycles) = (&self.sandbox, &self.snapshot, &mut self.cycles);
        self.report.get_or_insert_with(|| {
            *cycles += 1;
            sandbox.render(snapshot)
        })
    }
}
