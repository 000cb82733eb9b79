// crates/form-engine-config/src/lib.rs
// ============================================================================
// Module: Form Engine Config Library
// Description: Configuration model for form-engine.toml.
// Purpose: Single source of truth for engine limits and logging settings.
// Dependencies: form-engine-core, serde, toml
// ============================================================================

//! ## Overview
//! `form-engine-config` loads `form-engine.toml`, validates it fail-closed,
//! and maps it onto the core [`form_engine_core::EngineConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::FormEngineConfig;
pub use config::LimitsConfig;
pub use config::LogSink;
pub use config::LoggingConfig;
