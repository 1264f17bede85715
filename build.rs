//! Build script for gathering information about the build environment.

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");
}
