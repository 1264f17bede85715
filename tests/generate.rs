//! Integration tests for the `generate` command.
mod common;
use common::{get_demo_dir, read_column};
use sitelayout::cli::{OutputOpts, handle_generate_command};
use sitelayout::settings::Settings;
use sitelayout::strategy::Strategy;
use tempfile::tempdir;

/// An integration test for the `generate` command.
#[test]
fn test_handle_generate_command() {
    unsafe { std::env::set_var("SITELAYOUT_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = OutputOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: false,
    };
    handle_generate_command(
        &get_demo_dir("hillside"),
        Strategy::Balanced,
        &opts,
        Some(Settings::default()),
    )
    .unwrap();

    for file_name in [
        "layouts.csv",
        "assets.csv",
        "roads.csv",
        "violations.csv",
        "metadata.toml",
        "run.log",
        "problems.log",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    let layouts_path = output_dir.join("layouts.csv");
    assert_eq!(read_column(&layouts_path, "layout_id"), ["hillside_v1"]);
    assert_eq!(read_column(&layouts_path, "status"), ["completed"]);
    assert_eq!(read_column(&layouts_path, "strategy"), ["balanced"]);

    // Every asset is connected by exactly one road segment
    let assets = read_column(&output_dir.join("assets.csv"), "asset_id");
    let roads = read_column(&output_dir.join("roads.csv"), "road_id");
    assert!(!assets.is_empty());
    assert_eq!(assets.len(), roads.len());
    assert!(
        read_column(&output_dir.join("assets.csv"), "geometry")
            .iter()
            .all(|wkt| wkt.starts_with("POLYGON (("))
    );

    // Running again into the same folder needs --overwrite
    assert!(
        handle_generate_command(
            &get_demo_dir("hillside"),
            Strategy::Balanced,
            &opts,
            Some(Settings::default()),
        )
        .is_err()
    );
    let opts = OutputOpts {
        output_dir: Some(output_dir.clone()),
        overwrite: true,
    };
    handle_generate_command(
        &get_demo_dir("flat_square"),
        Strategy::MaximizeCapacity,
        &opts,
        Some(Settings::default()),
    )
    .unwrap();

    // No jurisdiction is configured for this demo
    assert!(!output_dir.join("violations.csv").exists());
    assert_eq!(
        read_column(&output_dir.join("layouts.csv"), "strategy"),
        ["maximize_capacity"]
    );
}
