// crates/form-rules-config/src/store.rs
// ============================================================================
// Module: Config Store
// Description: Hot-reloading, fail-soft rule document store.
// Purpose: Serve the current rule document, re-reading only on change.
// Dependencies: form-rules-core, sha2, crate::settings
// ============================================================================

//! ## Overview
//! [`ConfigStore`] serves the rule document parsed from a single file. Every
//! load compares the file's version marker (modification time and length)
//! with the cached one and only re-reads on mismatch. A re-read whose bytes
//! hash to the cached content adopts the new marker without reparsing.
//!
//! Failures never reach the caller:
//! - a missing source serves an empty document,
//! - a broken source keeps the last good document (or an empty one),
//! - every absorbed failure is reported once per source version, and a
//!   missing or uninspectable source once per transition into that state.
//!
//! Security posture: the source is untrusted input; reads are size-limited
//! and must be UTF-8.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockWriteGuard;
use std::time::SystemTime;

use form_rules_core::DiagnosticKind;
use form_rules_core::DiagnosticSink;
use form_rules_core::EngineDiagnostic;
use form_rules_core::FormRuleConfig;
use form_rules_core::RuleDocument;
use form_rules_core::RuleSource;
use form_rules_core::StderrDiagnosticSink;
use sha2::Digest;
use sha2::Sha256;

use crate::settings::ConfigError;
use crate::settings::SourceFormat;
use crate::settings::StoreSettings;

// ============================================================================
// SECTION: Version Marker
// ============================================================================

/// Change-detection marker for the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceVersion {
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
    /// File length in bytes.
    pub len: u64,
}

impl SourceVersion {
    /// Marker for the given metadata.
    fn of(metadata: &Metadata) -> Self {
        Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        }
    }
}

/// What a metadata check observed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observation {
    /// The source does not exist.
    Absent,
    /// The source exists with this marker.
    Present(SourceVersion),
    /// The source could not be inspected.
    Unreadable(String),
}

// ============================================================================
// SECTION: Cache State
// ============================================================================

/// Parsed document together with the source it came from.
#[derive(Debug)]
struct CachedConfig {
    /// Parsed document.
    document: Arc<RuleDocument>,
    /// Marker observed when the document was read.
    version: SourceVersion,
    /// SHA-256 of the source bytes.
    content_hash: [u8; 32],
}

/// Mutable store state behind one lock.
#[derive(Debug, Default)]
struct StoreState {
    /// Last good document, if any.
    cached: Option<CachedConfig>,
    /// Bumped whenever the served document changes.
    generation: u64,
    /// Marker of a source version that failed to load.
    failed: Option<SourceVersion>,
    /// True once a missing source has been reported.
    absent_reported: bool,
    /// True once an uninspectable source has been reported.
    unreadable_reported: bool,
}

impl StoreState {
    /// Document served right now.
    fn document(&self) -> Arc<RuleDocument> {
        self.cached
            .as_ref()
            .map_or_else(|| Arc::new(RuleDocument::empty()), |cached| Arc::clone(&cached.document))
    }

    /// Returns the served document when `observed` needs no re-read.
    fn fresh(&self, observed: &Observation) -> Option<Arc<RuleDocument>> {
        if self.unreadable_reported && !matches!(observed, Observation::Unreadable(_)) {
            return None;
        }
        match observed {
            Observation::Unreadable(_) if self.unreadable_reported => Some(self.document()),
            Observation::Absent if self.cached.is_none() && self.absent_reported => {
                Some(Arc::new(RuleDocument::empty()))
            }
            Observation::Present(version) => {
                if self.cached.as_ref().is_some_and(|cached| cached.version == *version)
                    || self.failed == Some(*version)
                {
                    Some(self.document())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Replaces the served document.
    fn bump(&mut self, cached: Option<CachedConfig>) {
        self.cached = cached;
        self.generation = self.generation.saturating_add(1);
    }
}

// ============================================================================
// SECTION: Config Store
// ============================================================================

/// Hot-reloading rule configuration store.
pub struct ConfigStore {
    /// Resolved source path.
    path: PathBuf,
    /// Source format picked from the extension.
    format: SourceFormat,
    /// Maximum source size in bytes.
    max_bytes: usize,
    /// Cached document, generation, and failure markers.
    state: RwLock<StoreState>,
    /// Destination for absorbed failures and reload events.
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("max_bytes", &self.max_bytes)
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Creates a store for the resolved settings. Nothing is read yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the settings or resolved path
    /// are out of bounds.
    pub fn new(settings: &StoreSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let path = settings.resolve_path()?;
        Ok(Self {
            format: SourceFormat::for_path(&path),
            path,
            max_bytes: settings.max_bytes,
            state: RwLock::new(StoreState::default()),
            sink: Arc::new(StderrDiagnosticSink),
        })
    }

    /// Creates a store for an explicit source path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the path exceeds limits.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::new(&StoreSettings::at(path))
    }

    /// Routes diagnostics to `sink` instead of stderr.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Resolved source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current document, re-reading the source if it changed.
    #[must_use]
    pub fn load(&self) -> Arc<RuleDocument> {
        self.snapshot().0
    }

    /// Rules for one form; empty when the form has none.
    #[must_use]
    pub fn get_form_config(&self, form_id: &str) -> Arc<FormRuleConfig> {
        self.load().form_config(form_id)
    }

    /// Re-reads the source regardless of its version marker.
    pub fn reload(&self) -> Arc<RuleDocument> {
        let mut state = self.write_state();
        let observed = self.observe();
        self.refresh(&mut state, &observed, true)
    }

    /// Generation of the served document. Starts at 0 and increases by one
    /// every time the served document changes.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Marker of the cached source version, if a document is cached.
    #[must_use]
    pub fn source_version(&self) -> Option<SourceVersion> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.cached.as_ref().map(|cached| cached.version)
    }

    /// Lowercase hex SHA-256 of the cached source bytes.
    #[must_use]
    pub fn content_hash(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.cached.as_ref().map(|cached| hex_encode(&cached.content_hash))
    }

    /// Current document and its generation, read atomically.
    fn snapshot(&self) -> (Arc<RuleDocument>, u64) {
        let observed = self.observe();
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(document) = state.fresh(&observed) {
                return (document, state.generation);
            }
        }
        let mut state = self.write_state();
        // Another loader may have refreshed while we waited for the lock.
        let observed = self.observe();
        let document = self.refresh(&mut state, &observed, false);
        (document, state.generation)
    }

    /// Brings the cache in line with `observed` and returns the served document.
    fn refresh(
        &self,
        state: &mut StoreState,
        observed: &Observation,
        force: bool,
    ) -> Arc<RuleDocument> {
        if !matches!(observed, Observation::Unreadable(_)) {
            state.unreadable_reported = false;
        }
        if !force && let Some(document) = state.fresh(observed) {
            return document;
        }
        match observed {
            Observation::Absent => {
                if state.cached.is_some() {
                    state.bump(None);
                }
                state.failed = None;
                if !state.absent_reported {
                    state.absent_reported = true;
                    self.report(
                        DiagnosticKind::ConfigSourceError,
                        format!("config source {} not found; no rules apply", self.path.display()),
                    );
                }
                Arc::new(RuleDocument::empty())
            }
            Observation::Unreadable(message) => {
                if !state.unreadable_reported {
                    state.unreadable_reported = true;
                    self.report(DiagnosticKind::ConfigSourceError, message.clone());
                }
                state.document()
            }
            Observation::Present(version) => {
                state.absent_reported = false;
                match self.read_source(*version) {
                    Ok((bytes, hash)) => self.adopt(state, *version, &bytes, hash),
                    Err(err) => self.reject(state, *version, &err),
                }
            }
        }
    }

    /// Installs freshly read bytes, reparsing only when the content changed.
    fn adopt(
        &self,
        state: &mut StoreState,
        version: SourceVersion,
        bytes: &[u8],
        content_hash: [u8; 32],
    ) -> Arc<RuleDocument> {
        if let Some(cached) = state.cached.as_mut()
            && cached.content_hash == content_hash
        {
            cached.version = version;
            state.failed = None;
            return Arc::clone(&cached.document);
        }
        let document = match self.parse(bytes) {
            Ok(document) => Arc::new(document),
            Err(err) => return self.reject(state, version, &err),
        };
        state.bump(Some(CachedConfig {
            document: Arc::clone(&document),
            version,
            content_hash,
        }));
        state.failed = None;
        self.report(
            DiagnosticKind::ConfigLoaded,
            format!(
                "loaded {} form(s) from {} (generation {}, sha256 {})",
                document.len(),
                self.path.display(),
                state.generation,
                hex_encode(&content_hash)
            ),
        );
        for issue in document.lint() {
            let event = EngineDiagnostic::new(DiagnosticKind::ConfigLint, issue.to_string())
                .with_form(issue.form_id.clone())
                .with_rule(issue.group.clone(), issue.rule_index);
            self.sink.record(&event);
        }
        document
    }

    /// Records a failed version and keeps serving the previous document.
    fn reject(
        &self,
        state: &mut StoreState,
        version: SourceVersion,
        err: &ConfigError,
    ) -> Arc<RuleDocument> {
        state.failed = Some(version);
        let fallback = if state.cached.is_some() {
            "keeping previous rules"
        } else {
            "no rules apply"
        };
        self.report(
            DiagnosticKind::ConfigSourceError,
            format!("{} ({}): {err}; {fallback}", self.path.display(), version.len),
        );
        state.document()
    }

    /// Reads the source bytes and hashes them.
    fn read_source(&self, version: SourceVersion) -> Result<(Vec<u8>, [u8; 32]), ConfigError> {
        if usize::try_from(version.len).ok().is_none_or(|len| len > self.max_bytes) {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let bytes = fs::read(&self.path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let hash = content_hash(&bytes);
        Ok((bytes, hash))
    }

    /// Parses source bytes into a document.
    fn parse(&self, bytes: &[u8]) -> Result<RuleDocument, ConfigError> {
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        self.format.parse(content)
    }

    /// Inspects the source's metadata.
    fn observe(&self) -> Observation {
        match fs::metadata(&self.path) {
            Ok(metadata) if metadata.is_file() => Observation::Present(SourceVersion::of(&metadata)),
            Ok(_) => Observation::Unreadable(format!(
                "config source {} is not a file",
                self.path.display()
            )),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Observation::Absent,
            Err(err) => Observation::Unreadable(
                ConfigError::Io(format!("{}: {err}", self.path.display())).to_string(),
            ),
        }
    }

    /// Acquires the state write lock, recovering from poisoning.
    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emits a store-level diagnostic.
    fn report(&self, kind: DiagnosticKind, message: String) {
        self.sink.record(&EngineDiagnostic::new(kind, message));
    }
}

impl RuleSource for ConfigStore {
    fn form_config(&self, form_id: &str) -> Arc<FormRuleConfig> {
        self.get_form_config(form_id)
    }

    fn generation(&self) -> u64 {
        self.snapshot().1
    }

    fn form_config_at_generation(&self, form_id: &str) -> (Arc<FormRuleConfig>, u64) {
        let (document, generation) = self.snapshot();
        (document.form_config(form_id), generation)
    }
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// SHA-256 digest of the source bytes.
fn content_hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
