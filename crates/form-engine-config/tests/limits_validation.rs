// crates/form-engine-config/tests/limits_validation.rs
// =============================================================================
// Module: Limits Validation Tests
// Description: Range checks for limits and logging settings.
// Purpose: Ensure out-of-range values fail closed.
// =============================================================================

//! ## Overview
//! Every limit must be nonzero and under its ceiling; the file sink needs a
//! path and other sinks must not carry one.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::TestResult;
use common::assert_invalid;
use common::config_from_toml;
use form_engine_config::FormEngineConfig;
use form_engine_config::LogSink;

// ============================================================================
// SECTION: Limits
// ============================================================================

#[test]
fn zero_limits_rejected() -> TestResult {
    for key in [
        "max_expression_bytes",
        "max_expression_nesting",
        "max_nodes",
        "max_repeat_instances",
        "max_choices",
    ] {
        let toml = format!("[limits]\n{key} = 0\n");
        assert_invalid(FormEngineConfig::from_toml_str(&toml), key)?;
    }
    Ok(())
}

#[test]
fn limits_above_ceiling_rejected() -> TestResult {
    assert_invalid(
        FormEngineConfig::from_toml_str("[limits]\nmax_expression_nesting = 257\n"),
        "between 1 and 256",
    )?;
    assert_invalid(
        FormEngineConfig::from_toml_str("[limits]\nmax_repeat_instances = 10001\n"),
        "max_repeat_instances",
    )
}

#[test]
fn limits_at_ceiling_accepted() -> TestResult {
    let config = config_from_toml(
        "[limits]\nmax_expression_bytes = 1048576\nmax_expression_nesting = 256\nmax_nodes = \
         1000000\nmax_repeat_instances = 10000\nmax_choices = 100000\n",
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Logging
// ============================================================================

#[test]
fn file_sink_requires_path() -> TestResult {
    assert_invalid(FormEngineConfig::from_toml_str("[logging]\nsink = \"file\"\n"), "logging.path")
}

#[test]
fn path_without_file_sink_rejected() -> TestResult {
    assert_invalid(
        FormEngineConfig::from_toml_str("[logging]\nsink = \"stderr\"\npath = \"x.jsonl\"\n"),
        "only valid with the file sink",
    )
}

#[test]
fn empty_file_sink_path_rejected() -> TestResult {
    assert_invalid(
        FormEngineConfig::from_toml_str("[logging]\nsink = \"file\"\npath = \"  \"\n"),
        "non-empty",
    )
}

#[test]
fn stderr_sink_accepted() -> TestResult {
    let config = FormEngineConfig::from_toml_str("[logging]\nsink = \"stderr\"\n")
        .map_err(|err| err.to_string())?;
    if config.logging.sink == LogSink::Stderr {
        Ok(())
    } else {
        Err(format!("sink: {:?}", config.logging.sink))
    }
}
