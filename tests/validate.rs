//! Integration tests for the `validate` command.
mod common;
use common::get_demo_dir;
use sitelayout::cli::handle_validate_command;
use sitelayout::settings::Settings;
use std::fs;
use tempfile::tempdir;

/// An integration test for the `validate` command.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("SITELAYOUT_LOG_LEVEL", "off") };

    for name in ["flat_square", "hillside"] {
        handle_validate_command(&get_demo_dir(name), Some(Settings::default())).unwrap();
    }

    // An override of an unknown rule type is rejected
    let dir = tempdir().unwrap();
    let demo_dir = get_demo_dir("flat_square");
    fs::copy(demo_dir.join("site.toml"), dir.path().join("site.toml")).unwrap();
    fs::write(
        dir.path().join("generation.toml"),
        "target_capacity_kw = 100.0\n[[rule_override]]\nrule_type = \"noise_limit\"\nthreshold = 3.0\n",
    )
    .unwrap();
    assert!(handle_validate_command(dir.path(), Some(Settings::default())).is_err());
}
