use std::collections::BTreeSet;
use std::path::Path;

use crate::compile::CompileContext;
use crate::config::load_catalog;
use crate::error::{Result, StencilError};
use crate::render::{check_template, CheckReport};

/// Result of validating a catalog and every template it references.
pub struct CatalogCheck {
    pub catalog_name: String,
    pub file_count: usize,
    pub templates: Vec<CheckReport>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl CatalogCheck {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse and compile every template a catalog references, without rendering.
pub fn check_catalog(path: &Path, ctx: &CompileContext) -> Result<CatalogCheck> {
    let catalog = load_catalog(path)?;
    let config = &catalog.config;
    let folders = catalog.template_folders();

    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    for folder in folders.folders() {
        if !folder.is_dir() {
            warnings.push(format!("Template folder not found: {}", folder.display()));
        }
    }

    for file in &config.files {
        if file.path.contains("{{") || file.path.contains("{%") {
            let mut tera = tera::Tera::default();
            if let Err(e) = tera.add_raw_template("__path__", &file.path) {
                errors.push(format!("Invalid path template for '{}': {e}", file.name));
            }
        }
    }

    let mut templates = Vec::new();
    let ids: BTreeSet<&str> = config.files.iter().map(|f| f.template.as_str()).collect();
    for id in ids {
        let text = match folders.load(id) {
            Ok(text) => text,
            Err(e @ (StencilError::TemplateNotFound { .. } | StencilError::BinaryTemplate { .. })) => {
                errors.push(e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        let report = check_template(ctx, id, &text);
        warnings.extend(report.warnings.iter().map(ToString::to_string));
        errors.extend(report.errors.iter().map(ToString::to_string));
        templates.push(report);
    }

    tracing::debug!(
        catalog = %config.catalog.name,
        errors = errors.len(),
        warnings = warnings.len(),
        "checked catalog"
    );

    Ok(CatalogCheck {
        catalog_name: config.catalog.name.clone(),
        file_count: config.files.len(),
        templates,
        warnings,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_catalog(dir: &Path, files: &str) {
        fs::write(
            dir.join("stencil.toml"),
            format!("[catalog]\nname = \"demo\"\n{files}"),
        )
        .unwrap();
        fs::create_dir_all(dir.join("templates")).unwrap();
    }

    #[test]
    fn test_valid_catalog() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(
            dir.path(),
            "[[files]]\nname = \"A\"\npath = \"a.txt\"\ntemplate = \"a.tpl\"\n",
        );
        fs::write(dir.path().join("templates/a.tpl"), "Hi <%= model.name %>").unwrap();

        let result = check_catalog(dir.path(), &CompileContext::default()).unwrap();
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.catalog_name, "demo");
        assert_eq!(result.templates.len(), 1);
    }

    #[test]
    fn test_reports_every_problem() {
        let dir = tempfile::tempdir().unwrap();
        write_catalog(
            dir.path(),
            r#"
[[files]]
name = "Broken"
path = "{{ oops"
template = "broken.tpl"

[[files]]
name = "Missing"
path = "m.txt"
template = "missing.tpl"
"#,
        );
        fs::write(dir.path().join("templates/broken.tpl"), "<%= 1 + %>\n<% let = 1; %>").unwrap();

        let result = check_catalog(dir.path(), &CompileContext::default()).unwrap();
        assert!(!result.is_ok());
        assert!(result.errors.iter().any(|e| e.contains("Invalid path template")));
        assert!(result.errors.iter().any(|e| e.contains("missing.tpl")));
        assert!(result.errors.iter().filter(|e| e.contains("broken.tpl")).count() >= 2);
    }

    #[test]
    fn test_missing_template_folder_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stencil.toml"),
            "[catalog]\nname = \"demo\"\ntemplates = [\"nowhere\"]\n",
        )
        .unwrap();
        let result = check_catalog(dir.path(), &CompileContext::default()).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }
}
