//! Core data model shared across the orchestrator, validator, rule store, backup
//! manager, and logger: `SourceArtifact`, `LayerResult`, `Finding`, `Rule`, and the
//! persisted log/backup record types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file's recognized source language, determining which parser path and which
/// per-layer rule bodies apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ts,
    Tsx,
    Js,
    Jsx,
    Json,
    Yaml,
    Lock,
}

impl Language {
    /// Infers a language from a file extension; returns `None` for unrecognized
    /// extensions so callers can skip the file with a diagnostic rather than guess.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "ts" | "mts" | "cts" => Some(Self::Ts),
            "tsx" => Some(Self::Tsx),
            "js" | "mjs" | "cjs" => Some(Self::Js),
            "jsx" => Some(Self::Jsx),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "lock" => Some(Self::Lock),
            _ => None,
        }
    }

    pub fn is_jsx(&self) -> bool {
        matches!(self, Self::Tsx | Self::Jsx)
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self, Self::Ts | Self::Tsx)
    }
}

/// An immutable snapshot of a source file's content. A new artifact is produced per
/// mutation rather than modifying one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceArtifact {
    pub path: PathBuf,
    pub language: Language,
    pub bytes: Vec<u8>,
    pub sha256: String,
}

impl SourceArtifact {
    pub fn new(path: impl Into<PathBuf>, language: Language, bytes: Vec<u8>) -> Self {
        let sha256 = crate::backup::sha256_hex(&bytes);
        Self {
            path: path.into(),
            language,
            bytes,
            sha256,
        }
    }

    pub fn as_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

/// Identifies a transformation layer. Ordering is total and meaningful: later layers
/// may depend on earlier layers' outputs within the same file.
pub type LayerId = u32;

pub const LAYER_CONFIG: LayerId = 1;
pub const LAYER_PATTERN: LayerId = 2;
pub const LAYER_COMPONENT_HYGIENE: LayerId = 3;
pub const LAYER_SSR_GUARD: LayerId = 4;
pub const LAYER_FRAMEWORK_MIGRATION: LayerId = 5;
pub const LAYER_TEST_SCAFFOLDING: LayerId = 6;
pub const LAYER_ADAPTIVE: LayerId = 7;
pub const LAYER_SIGNATURE_SCANNER: LayerId = 8;

/// A single diagnostic emitted alongside a `LayerResult`, independent of the
/// mutation outcome (e.g. a `Bounded` degraded-scan notice).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub category: String,
}

/// Severity scale shared by findings, diagnostics, and the run's `fail_on` threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// A non-mutating observation produced by a scanner layer, consumed by the adaptive
/// layer as a candidate-rule source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub signature_id: String,
    pub severity: Severity,
    pub category: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub matched_text: String,
    pub confidence: f32,
    pub remediation: Option<String>,
}

/// The outcome of running one layer against one file. Produced exactly once per
/// (file, layer) pair by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerResult {
    pub layer_id: LayerId,
    pub success: bool,
    pub change_count: u32,
    pub original_code: String,
    pub code: String,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<String>,
}

impl LayerResult {
    /// A no-op result: the layer made no change and raised no findings.
    pub fn unchanged(layer_id: LayerId, code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            layer_id,
            success: true,
            change_count: 0,
            original_code: code.clone(),
            code,
            findings: Vec::new(),
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn changed(layer_id: LayerId, original_code: impl Into<String>, code: impl Into<String>, change_count: u32) -> Self {
        Self {
            layer_id,
            success: true,
            change_count,
            original_code: original_code.into(),
            code: code.into(),
            findings: Vec::new(),
            diagnostics: Vec::new(),
            error: None,
        }
    }

    pub fn rejected(layer_id: LayerId, original_code: impl Into<String>, error: impl Into<String>) -> Self {
        let original_code = original_code.into();
        Self {
            layer_id,
            success: false,
            change_count: 0,
            code: original_code.clone(),
            original_code,
            findings: Vec::new(),
            diagnostics: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn with_findings(layer_id: LayerId, code: impl Into<String>, findings: Vec<Finding>) -> Self {
        let code = code.into();
        Self {
            layer_id,
            success: true,
            change_count: 0,
            original_code: code.clone(),
            code,
            findings,
            diagnostics: Vec::new(),
            error: None,
        }
    }
}

/// A bounded, data-driven match/transform specification for a `Rule`. Never
/// arbitrary code: either a regex-and-replacement pair, or a structural pattern over
/// stable AST node kinds with named captures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Regex { pattern: String, replacement: String },
    Structural { node_kind: String, captures: Vec<String> },
}

/// A learned or seeded transformation pattern maintained by the Rule Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub description: String,
    pub match_spec: RuleSpec,
    pub transform_spec: RuleSpec,
    pub confidence: f32,
    pub frequency: u32,
    pub category: String,
    pub source_layer: LayerId,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
    pub security_related: bool,
}

/// Durable record of one accepted (file, layer) mutation, appended to the
/// Transformation Logger and consulted by the adaptive layer for cross-session
/// learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationLogEntry {
    pub session_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub file: PathBuf,
    pub layer_id: LayerId,
    pub before_sha: String,
    pub after_sha: String,
    pub before_snippet: String,
    pub after_snippet: String,
    /// True when the entry was produced by a `--dry-run` invocation and therefore
    /// does not reflect a write that actually happened on disk.
    pub simulated: bool,
}

/// One file captured within a `BackupEntry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackedUpFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
    pub cipher_meta: Option<CipherMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherMeta {
    pub algorithm: String,
    pub iv: String,
}

/// Metadata for one snapshot created by the Backup Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub backup_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub files: Vec<BackedUpFile>,
    pub compression: String,
    pub algorithm: Option<String>,
}

/// The persisted key record used to derive the Backup Manager's AES-256-GCM key.
/// `passphrase` is wrapped so it is never accidentally logged or serialized in
/// plaintext via `Debug`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptionKeyRecord {
    pub passphrase: SecretString,
    pub salt: [u8; 32],
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub algorithm: String,
    pub version: u32,
    pub previous_rotation: Option<chrono::DateTime<chrono::Utc>>,
}

impl std::fmt::Debug for EncryptionKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyRecord")
            .field("passphrase", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .field("previous_rotation", &self.previous_rotation)
            .finish()
    }
}

/// A passphrase that never prints its contents via `Debug`/`Display`.
#[derive(Clone, Serialize, Deserialize, zeroize::Zeroize)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension(Path::new("a.tsx")), Some(Language::Tsx));
        assert_eq!(Language::from_extension(Path::new("a.unknown")), None);
    }

    #[test]
    fn secret_string_never_prints_contents() {
        let s = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", s), "<redacted>");
        assert_eq!(s.expose(), "hunter2");
    }
}
