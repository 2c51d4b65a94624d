//! The serialized file map handed into the sandbox, and its fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use kiln_types::VirtualFile;

use crate::registry::Registry;

/// Length of the short cycle id derived from the fingerprint.
const CYCLE_ID_LEN: usize = 12;

/// An ordered file set plus an optional explicit entry. This is the only
/// input a preview cycle receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: Vec<VirtualFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

impl Snapshot {
    pub fn new(files: Vec<VirtualFile>, entry: Option<String>) -> Self {
        Self { files, entry }
    }

    /// Build from `(path, source)` pairs without an explicit entry.
    pub fn from_pairs<P, S>(pairs: impl IntoIterator<Item = (P, S)>) -> Self
    where
        P: Into<String>,
        S: Into<String>,
    {
        Self {
            files: pairs
                .into_iter()
                .map(|(p, s)| VirtualFile::new(p, s))
                .collect(),
            entry: None,
        }
    }

    /// Accepts either a snapshot object or a bare file array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Input {
            Snapshot(Snapshot),
            Files(Vec<VirtualFile>),
        }
        Ok(match serde_json::from_str(json)? {
            Input::Snapshot(snapshot) => snapshot,
            Input::Files(files) => Snapshot::new(files, None),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    pub fn registry(&self) -> Registry {
        Registry::from_files(self.files.iter().cloned())
    }

    /// SHA-256 over the normalized registry contents and the entry
    /// selection, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, source) in self.registry().files() {
            hasher.update((path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update((source.len() as u64).to_le_bytes());
            hasher.update(source.as_bytes());
        }
        if let Some(entry) = &self.entry {
            hasher.update([1u8]);
            hasher.update(entry.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Short form of [`Snapshot::fingerprint`] used as the cycle id.
    pub fn cycle_id(&self) -> String {
        let mut id = self.fingerprint();
        id.truncate(CYCLE_ID_LEN);
        id
    }
}
