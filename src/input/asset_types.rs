//! Code for reading the asset catalogue from `asset_types.toml`.
use super::{input_err_msg, read_optional_toml};
use crate::asset::{AssetCatalogue, AssetTypeSpec};
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;

const ASSET_TYPES_FILE_NAME: &str = "asset_types.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssetTypesFile {
    #[serde(rename = "asset_type")]
    asset_types: Vec<AssetTypeSpec>,
}

/// Read the asset catalogue for a project.
///
/// If the project has no `asset_types.toml`, the built-in catalogue is used. Otherwise the file
/// replaces it entirely, so only the kinds it lists can be placed.
pub fn read_asset_types(project_dir: &Path) -> Result<AssetCatalogue> {
    let file_path = project_dir.join(ASSET_TYPES_FILE_NAME);
    let Some(raw) = read_optional_toml::<AssetTypesFile>(&file_path)? else {
        return Ok(AssetCatalogue::default());
    };

    let catalogue =
        AssetCatalogue::from_specs(raw.asset_types).with_context(|| input_err_msg(&file_path))?;
    info!(
        "Read {} asset types from {}",
        catalogue.iter().count(),
        file_path.display()
    );

    Ok(catalogue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKind;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const SOLAR: &str = "[[asset_type]]
kind = \"solar\"
min_capacity_kw = 100.0
max_capacity_kw = 400.0
length_m = 80.0
width_m = 40.0
max_slope_deg = 12.0
preferred_aspect_deg = 180.0
same_type_spacing_m = 6.0
cross_type_spacing_m = 12.0
";

    fn write_asset_types(dir: &Path, contents: &str) {
        let mut file = File::create(dir.join(ASSET_TYPES_FILE_NAME)).unwrap();
        write!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_read_asset_types_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            read_asset_types(dir.path()).unwrap(),
            AssetCatalogue::default()
        );
    }

    #[test]
    fn test_read_asset_types() {
        let dir = tempdir().unwrap();
        write_asset_types(dir.path(), SOLAR);
        let catalogue = read_asset_types(dir.path()).unwrap();
        assert_eq!(catalogue.iter().count(), 1);
        let solar = catalogue.get(AssetKind::Solar).unwrap();
        assert_eq!(solar.max_capacity_kw.value(), 400.0);
        assert!(catalogue.get(AssetKind::Battery).is_none());
    }

    #[test]
    fn test_read_asset_types_duplicate() {
        let dir = tempdir().unwrap();
        write_asset_types(dir.path(), &format!("{SOLAR}\n{SOLAR}"));
        let result = read_asset_types(dir.path());
        assert_error!(
            result,
            format!("Error reading {}", dir.path().join(ASSET_TYPES_FILE_NAME).display())
        );
    }
}
