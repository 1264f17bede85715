//! Helpers shared by the integration tests.
//!
//! Each test file only uses some of these, so unused warnings are suppressed manually.
use std::path::{Path, PathBuf};

#[allow(dead_code)]
/// Get the path to a bundled demo project
pub fn get_demo_dir(name: &str) -> PathBuf {
    PathBuf::from("demos").join(name)
}

#[allow(dead_code)]
/// Read one column of a CSV file as strings
pub fn read_column(file_path: &Path, column: &str) -> Vec<String> {
    let mut reader = csv::Reader::from_path(file_path).unwrap();
    let idx = reader
        .headers()
        .unwrap()
        .iter()
        .position(|h| h == column)
        .unwrap();

    reader
        .records()
        .map(|record| record.unwrap()[idx].to_string())
        .collect()
}
