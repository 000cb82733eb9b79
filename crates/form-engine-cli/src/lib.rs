// crates/form-engine-cli/src/lib.rs
// ============================================================================
// Module: Form Engine CLI Library
// Description: Shared helpers for the form-engine command-line interface.
// Purpose: Provide the message catalog used by the CLI binary and tests.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! Houses the CLI message catalog. The binary entry point (`src/main.rs`)
//! routes every user-facing string through [`t!`] so output stays
//! consistent.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and formatting helpers.
pub mod i18n;
