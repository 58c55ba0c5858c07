use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StencilError};
use crate::model::is_identifier;
use crate::plan::{OverwritePolicy, DEFAULT_LAYOUT_FILE};
use crate::render::check_bool_expr;

/// Contents of a `stencil.toml` catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    pub catalog: CatalogMetadata,

    /// Model values used when neither a model file nor `--data` sets them.
    #[serde(default)]
    pub defaults: BTreeMap<String, toml::Value>,

    #[serde(default)]
    pub types: Vec<TypeSlot>,

    #[serde(default)]
    pub files: Vec<CatalogFile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogMetadata {
    pub name: String,
    pub description: Option<String>,

    #[serde(default = "default_layout_file")]
    pub layout_file: String,

    /// Template folders relative to the catalog, searched in order.
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,

    /// Namespace for generated types that are not qualified.
    pub default_namespace: Option<String>,
}

fn default_layout_file() -> String {
    DEFAULT_LAYOUT_FILE.to_string()
}

fn default_templates() -> Vec<String> {
    vec!["templates".to_string()]
}

/// A type the templates refer to, reused if the project already has it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeSlot {
    /// Model field the resolved type is bound to.
    pub key: String,
    /// Type name used when the command line gives none.
    pub default: Option<String>,
    pub default_namespace: Option<String>,
    /// Full name an existing type must be or derive from to be reused.
    pub base_type: Option<String>,
}

/// A candidate output file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CatalogFile {
    pub name: String,
    /// Output path; may contain `{{ }}` placeholders.
    #[serde(default)]
    pub path: String,
    pub template: String,
    #[serde(default)]
    pub overwrite: OverwritePolicy,
    /// Tera expression; if false the file is not generated.
    pub when: Option<String>,
    /// The shared layout page, generated only when the project has none.
    #[serde(default)]
    pub layout: bool,
    /// Kept even when `--files` selects a subset.
    #[serde(default)]
    pub always_include: bool,
    pub description: Option<String>,
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, reason: &str| StencilError::CatalogInvalid {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let mut seen = std::collections::BTreeSet::new();
        let mut layout_entries = 0;
        for file in &self.files {
            if !seen.insert(file.name.as_str()) {
                return Err(invalid(&file.name, "file names must be unique"));
            }
            if file.template.trim().is_empty() {
                return Err(invalid(&file.name, "'template' must not be empty"));
            }
            if file.layout {
                layout_entries += 1;
                if layout_entries > 1 {
                    return Err(invalid(&file.name, "only one file may set 'layout = true'"));
                }
            } else if file.path.trim().is_empty() {
                return Err(invalid(&file.name, "'path' must not be empty"));
            }
            if let Some(expr) = &file.when {
                check_bool_expr(expr).map_err(|e| StencilError::WhenEvaluation {
                    name: file.name.clone(),
                    source: e,
                })?;
            }
        }

        for key in self.defaults.keys() {
            if !is_identifier(key) {
                return Err(StencilError::InvalidModelField { name: key.clone() });
            }
        }
        for slot in &self.types {
            if !is_identifier(&slot.key) {
                return Err(invalid(&slot.key, "type keys must be identifiers"));
            }
        }

        Ok(())
    }
}
