// crates/form-rules-config/src/lib.rs
// ============================================================================
// Module: Form Rules Config Root
// Description: Public API for locating and hot-reloading rule documents.
// Purpose: Expose store settings and the config store.
// Dependencies: crate::{settings, store}
// ============================================================================

//! ## Overview
//! `form-rules-config` reads the rule document (`{ form_id: { group: [rule,
//! ...] } }`) from a JSON or TOML file and keeps it current: the file is
//! re-read only when its modification time or length changes, and any read
//! or parse failure degrades to the last good document instead of an error.
//!
//! [`ConfigStore`] implements [`form_rules_core::RuleSource`], so it plugs
//! straight into [`form_rules_core::BehaviorInjector`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod settings;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use settings::CONFIG_ENV_VAR;
pub use settings::ConfigError;
pub use settings::DEFAULT_MAX_BYTES;
pub use settings::DEFAULT_RELATIVE_PATH;
pub use settings::MAX_SOURCE_BYTES;
pub use settings::SourceFormat;
pub use settings::StoreSettings;
pub use store::ConfigStore;
pub use store::SourceVersion;
