// crates/form-rules-config/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Result helpers and temp-file fixtures for store tests.
// ============================================================================
//! ## Overview
//! Shared helpers: `TestResult`/`ensure` plus [`SourceDir`], a temporary
//! directory whose files can be rewritten with explicit modification times.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every suite uses every helper."
)]

use std::error::Error;
use std::fmt;
use std::fs;
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use tempfile::TempDir;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across store integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Lightweight error type for test assertions.
#[derive(Debug)]
struct TestError {
    /// Human-readable failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Source Fixtures
// ========================================================================

/// Contact form rules in JSON.
pub const CONTACT_JSON: &str = r#"{
  "ContactForm": {
    "clean_email": [
      {"condition": "value.endswith('@banned.com')", "error": "Banned domain"}
    ],
    "clean": [
      {"condition": "cleaned_data.get('subject') == ''", "field": "subject", "error": "Subject required"}
    ]
  }
}"#;

/// Contact form rules with a different email rule.
pub const CONTACT_JSON_V2: &str = r#"{
  "ContactForm": {
    "clean_email": [
      {"condition": "value.endswith('@spam.example')", "error": "Spam domain"}
    ]
  }
}"#;

/// Temporary directory holding rule sources.
pub struct SourceDir {
    /// Owned temp directory, removed on drop.
    dir: TempDir,
}

impl SourceDir {
    /// Creates an empty directory.
    pub fn new() -> TestResult<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Path of `name` inside the directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `content` to `name` and stamps it with `stamp` seconds past
    /// a fixed epoch, so consecutive writes never share a marker.
    pub fn write(&self, name: &str, content: impl AsRef<[u8]>, stamp: u64) -> TestResult<PathBuf> {
        let path = self.path(name);
        fs::write(&path, content)?;
        set_modified(&path, stamp_time(stamp))?;
        Ok(path)
    }

    /// Replaces `name` atomically by writing a sibling file and renaming it
    /// over the original, so readers never see partial content.
    pub fn replace(&self, name: &str, content: impl AsRef<[u8]>, stamp: u64) -> TestResult<PathBuf> {
        let staging = self.write(&format!("{name}.staging"), content, stamp)?;
        let path = self.path(name);
        fs::rename(staging, &path)?;
        Ok(path)
    }

    /// Removes `name`.
    pub fn remove(&self, name: &str) -> TestResult {
        fs::remove_file(self.path(name))?;
        Ok(())
    }
}

/// Modification time for a stamp.
pub fn stamp_time(stamp: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000 + stamp)
}

/// Overrides a file's modification time.
pub fn set_modified(path: &PathBuf, time: SystemTime) -> TestResult {
    File::options().write(true).open(path)?.set_modified(time)?;
    Ok(())
}
