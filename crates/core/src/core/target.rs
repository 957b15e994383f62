use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Kind of artifact a target holds. Engines declare which kinds they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    McpConfig,
    ModelFile,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::McpConfig => write!(f, "mcp-config"),
            Self::ModelFile => write!(f, "model-file"),
        }
    }
}

impl TargetKind {
    /// Infer a kind from a file extension. Model formats are matched
    /// explicitly; everything else is treated as an MCP configuration.
    pub fn infer(path: &str) -> Self {
        let ext = path.rsplit('.').next().unwrap_or("");
        match ext.to_ascii_lowercase().as_str() {
            "pkl" | "pt" | "pth" | "bin" | "h5" | "onnx" | "safetensors" | "gguf" | "pb" => {
                Self::ModelFile
            }
            _ => Self::McpConfig,
        }
    }
}

/// One unit of scan work: a byte-addressable artifact with a stable identity.
///
/// Created by the target loader at scan start, immutable afterwards.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub identity: String,
    pub kind: TargetKind,
    pub content: Vec<u8>,
    pub content_hash: String,
}

impl ScanTarget {
    pub fn new(identity: impl Into<String>, kind: TargetKind, content: Vec<u8>) -> Self {
        let content_hash = sha256_hex(&content);
        Self {
            identity: identity.into(),
            kind,
            content,
            content_hash,
        }
    }

    pub fn content_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
