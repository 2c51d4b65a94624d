use serde::{Deserialize, Serialize};

/// One generated source file as handed over by the producer.
///
/// `path` is whatever the producer supplied; the registry normalizes it on
/// the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub path: String,
    #[serde(rename = "sourceText", alias = "source_text", alias = "code")]
    pub source_text: String,
}

impl VirtualFile {
    pub fn new(path: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source_text: source_text.into(),
        }
    }
}
