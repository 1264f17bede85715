//! Integration tests for the `variants` command.
mod common;
use common::{get_demo_dir, read_column};
use sitelayout::cli::{OutputOpts, handle_variants_command};
use sitelayout::settings::Settings;
use tempfile::tempdir;

/// An integration test for the `variants` command.
#[test]
fn test_handle_variants_command() {
    unsafe { std::env::set_var("SITELAYOUT_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = OutputOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        overwrite: false,
    };
    let settings = Settings {
        workers: 2,
        ..Settings::default()
    };
    handle_variants_command(&get_demo_dir("flat_square"), &opts, Some(settings)).unwrap();

    let comparison_path = tempdir.path().join("variant_comparison.csv");
    assert_eq!(
        read_column(&comparison_path, "layout_id"),
        [
            "flat_square-balanced",
            "flat_square-maximize_capacity",
            "flat_square-minimize_road_length"
        ]
    );
    assert!(
        read_column(&comparison_path, "status")
            .iter()
            .all(|status| status == "completed")
    );

    // Exactly one variant is flagged best for each metric
    for flag in ["best_capacity", "best_earthwork", "best_road_network"] {
        let flags = read_column(&comparison_path, flag);
        assert_eq!(flags.iter().filter(|f| *f == "true").count(), 1, "{flag}");
    }

    assert_eq!(
        read_column(&tempdir.path().join("layouts.csv"), "layout_id").len(),
        3
    );
}
