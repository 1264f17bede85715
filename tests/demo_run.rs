//! Integration tests for the `demo run` command.
use sitelayout::cli::OutputOpts;
use sitelayout::cli::demo::handle_demo_run_command;
use sitelayout::settings::Settings;
use sitelayout::strategy::Strategy;
use tempfile::tempdir;

/// An integration test for the `demo run` command.
#[test]
fn test_handle_demo_run_command() {
    unsafe { std::env::set_var("SITELAYOUT_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = OutputOpts {
        output_dir: Some(tempdir.path().join("flat_square")),
        overwrite: false,
    };
    handle_demo_run_command(
        "flat_square",
        Strategy::MinimizeRoadLength,
        &opts,
        Some(Settings::default()),
    )
    .unwrap();
    assert!(tempdir.path().join("flat_square/layouts.csv").is_file());
}
