// crates/form-rules-core/src/diagnostics.rs
// ============================================================================
// Module: Engine Diagnostics
// Description: Structured diagnostic events and sinks for the rule engine.
// Purpose: Report absorbed failures without letting them reach the host.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Failures inside the engine are absorbed (a broken source becomes an empty
//! document, a broken rule does not fire), so they are reported here instead.
//! Events are JSON-serializable and routed through a [`DiagnosticSink`];
//! deployments pick stderr, an append-only file, or nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Diagnostic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Configuration source could not be read or parsed.
    ConfigSourceError,
    /// Configuration document was (re)loaded.
    ConfigLoaded,
    /// Advisory problem found while linting a loaded document.
    ConfigLint,
    /// Condition failed to parse.
    ExpressionError,
    /// Rule could not run (missing keys, unknown field).
    RuleExecutionError,
}

/// Diagnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineDiagnostic {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Diagnostic classification.
    pub kind: DiagnosticKind,
    /// Form identifier when applicable.
    pub form_id: Option<String>,
    /// Rule group key when applicable.
    pub rule_group: Option<String>,
    /// Rule position within its group when applicable.
    pub rule_index: Option<usize>,
    /// Human-readable detail.
    pub message: String,
}

impl EngineDiagnostic {
    /// Creates a diagnostic with a consistent timestamp.
    #[must_use]
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "form_rules_diagnostic",
            timestamp_ms,
            kind,
            form_id: None,
            rule_group: None,
            rule_index: None,
            message: message.into(),
        }
    }

    /// Attaches a form identifier.
    #[must_use]
    pub fn with_form(mut self, form_id: impl Into<String>) -> Self {
        self.form_id = Some(form_id.into());
        self
    }

    /// Attaches a rule group and optional rule index.
    #[must_use]
    pub fn with_rule(mut self, rule_group: impl Into<String>, rule_index: Option<usize>) -> Self {
        self.rule_group = Some(rule_group.into());
        self.rule_index = rule_index;
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Destination for engine diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Record a diagnostic.
    fn record(&self, diagnostic: &EngineDiagnostic);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrDiagnosticSink;

impl DiagnosticSink for StderrDiagnosticSink {
    fn record(&self, diagnostic: &EngineDiagnostic) {
        if let Ok(payload) = serde_json::to_string(diagnostic) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that logs JSON lines to a file.
pub struct FileDiagnosticSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileDiagnosticSink {
    /// Opens the diagnostic log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DiagnosticSink for FileDiagnosticSink {
    fn record(&self, diagnostic: &EngineDiagnostic) {
        if let Ok(payload) = serde_json::to_string(diagnostic)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op diagnostic sink.
pub struct NoopDiagnosticSink;

impl DiagnosticSink for NoopDiagnosticSink {
    fn record(&self, _diagnostic: &EngineDiagnostic) {}
}

/// Sink that keeps diagnostics in memory for inspection.
#[derive(Default)]
pub struct MemoryDiagnosticSink {
    /// Recorded diagnostics in arrival order.
    events: Mutex<Vec<EngineDiagnostic>>,
}

impl MemoryDiagnosticSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded diagnostics.
    #[must_use]
    pub fn events(&self) -> Vec<EngineDiagnostic> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded diagnostics of `kind`.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }

    /// Discards recorded diagnostics.
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl DiagnosticSink for MemoryDiagnosticSink {
    fn record(&self, diagnostic: &EngineDiagnostic) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(diagnostic.clone());
    }
}
