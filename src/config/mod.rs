pub mod schema;
pub mod user;

use std::path::{Path, PathBuf};

use crate::error::{Result, StencilError};
use crate::template::TemplateFolders;

pub use schema::{CatalogConfig, CatalogFile, CatalogMetadata, TypeSlot};
pub use user::{load_user_config, UserConfig};

pub const CATALOG_FILE: &str = "stencil.toml";

/// A validated catalog and the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub root: PathBuf,
    pub config: CatalogConfig,
}

impl Catalog {
    /// Template folders in search order, resolved against the catalog root.
    pub fn template_folders(&self) -> TemplateFolders {
        TemplateFolders::new(
            self.config
                .catalog
                .templates
                .iter()
                .map(|folder| self.root.join(folder))
                .collect(),
        )
    }
}

/// Load and validate a catalog from a `stencil.toml` file or its directory.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let config_path = if path.ends_with(CATALOG_FILE) {
        path.to_path_buf()
    } else {
        path.join(CATALOG_FILE)
    };

    if !config_path.exists() {
        return Err(StencilError::CatalogNotFound { path: config_path });
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| StencilError::Io {
        context: format!("reading {}", config_path.display()),
        source: e,
    })?;

    let config: CatalogConfig =
        toml::from_str(&content).map_err(|e| StencilError::CatalogParse { source: e })?;

    config.validate()?;

    let root = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    tracing::debug!(
        catalog = %config.catalog.name,
        files = config.files.len(),
        "loaded catalog"
    );
    Ok(Catalog { root, config })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_catalog_from_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CATALOG_FILE),
            "[catalog]\nname = \"demo\"\ntemplates = [\"custom\", \"base\"]\n",
        )
        .unwrap();

        let from_dir = load_catalog(dir.path()).unwrap();
        let from_file = load_catalog(&dir.path().join(CATALOG_FILE)).unwrap();
        assert_eq!(from_dir.config.catalog.name, "demo");
        assert_eq!(from_dir.root, from_file.root);

        let folders = from_dir.template_folders();
        assert_eq!(
            folders.folders(),
            &[dir.path().join("custom"), dir.path().join("base")]
        );
    }

    #[test]
    fn test_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_catalog(dir.path()),
            Err(StencilError::CatalogNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_catalog() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CATALOG_FILE), "[catalog\nname=").unwrap();
        assert!(matches!(
            load_catalog(dir.path()),
            Err(StencilError::CatalogParse { .. })
        ));
    }
}
