#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::plan::PlanError;

#[derive(Debug, Error, Diagnostic)]
pub enum StencilError {
    #[error("Catalog not found at {path}")]
    #[diagnostic(help("Ensure the template root contains a stencil.toml file"))]
    CatalogNotFound { path: PathBuf },

    #[error("Failed to parse stencil.toml")]
    #[diagnostic(help("Check the TOML syntax in your stencil.toml file"))]
    CatalogParse {
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid catalog entry '{name}': {reason}")]
    CatalogInvalid { name: String, reason: String },

    #[error("Failed to parse user config {path}")]
    #[diagnostic(help("Check the TOML syntax in your user config file"))]
    UserConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read model file {path}: {reason}")]
    #[diagnostic(help("Model files must be JSON or TOML with a top-level table"))]
    ModelFile { path: PathBuf, reason: String },

    #[error("Invalid model field name '{name}'")]
    #[diagnostic(help("Field names must start with a letter or '_' and contain only letters, digits and '_'"))]
    InvalidModelField { name: String },

    #[error("Invalid type name '{name}'")]
    #[diagnostic(help("Type names are dot-separated identifiers, e.g. App.Data.AppUser"))]
    InvalidTypeName { name: String },

    #[error("Existing types cannot be reused: {}", types.join("; "))]
    #[diagnostic(help("Choose a type that derives from the required base, or a new name to generate one"))]
    IncompatibleTypes { types: Vec<String> },

    #[error("Failed to read type catalog {path}: {reason}")]
    TypeCatalog { path: PathBuf, reason: String },

    #[error("Template '{id}' not found (searched: {})", searched.join(", "))]
    #[diagnostic(help("Check the template id and the catalog's `templates` folders, or add a folder to `template_overrides` in the user config"))]
    TemplateNotFound { id: String, searched: Vec<String> },

    #[error("Template '{id}' is not a UTF-8 text file")]
    BinaryTemplate { id: String },

    #[error("Invalid 'when' expression for '{name}'")]
    WhenEvaluation {
        name: String,
        #[source]
        source: tera::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Plan(#[from] PlanError),

    #[error("{failed} of {total} files failed to render")]
    #[diagnostic(help("Fix the reported template or model problems and run again"))]
    RenderFailed { failed: usize, total: usize },

    #[error("Refused to write {}", paths.join(", "))]
    #[diagnostic(help("Files appeared after planning; re-run, or use --force where allowed"))]
    WriteRefused { paths: Vec<String> },

    #[error("Rendering did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("{missing} render job(s) stopped without reporting a result")]
    WorkerLost { missing: usize },

    #[error("Failed to start render worker pool")]
    WorkerPool {
        #[source]
        source: rayon::ThreadPoolBuildError,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, StencilError>;
