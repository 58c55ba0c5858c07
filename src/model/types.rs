//! Lookup of types that already exist in the target project.
//!
//! Discovering types from a compiled project is an external concern; the
//! scaffolder only consumes it through [`TypeCatalog`].

use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StencilError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub base_types: Vec<String>,
}

impl TypeDescriptor {
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Whether any base type's full name starts with `prefix`.
    pub fn derives_from(&self, prefix: &str) -> bool {
        self.base_types.iter().any(|b| b.starts_with(prefix))
    }

    /// The type is `base` itself or derives from it.
    pub fn is_assignable_to(&self, base: &str) -> bool {
        self.full_name() == base || self.derives_from(base)
    }
}

pub trait TypeCatalog {
    /// Find a type by full name, or by simple name when no namespace is given.
    fn find_type(&self, name: &str) -> Option<TypeDescriptor>;
}

/// A type catalog read from a JSON or TOML description of the project.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StaticTypeCatalog {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl StaticTypeCatalog {
    pub fn new(types: Vec<TypeDescriptor>) -> Self {
        Self { types }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StencilError::Io {
            context: format!("reading type catalog {}", path.display()),
            source: e,
        })?;
        let reason = |e: &dyn std::fmt::Display| StencilError::TypeCatalog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| reason(&e)),
            _ => toml::from_str(&content).map_err(|e| reason(&e)),
        }
    }
}

impl TypeCatalog for StaticTypeCatalog {
    fn find_type(&self, name: &str) -> Option<TypeDescriptor> {
        if name.contains('.') {
            self.types.iter().find(|t| t.full_name() == name).cloned()
        } else {
            self.types.iter().find(|t| t.name == name).cloned()
        }
    }
}

/// How a requested type name ends up in generated code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeBinding {
    pub class_name: String,
    pub namespace: String,
    pub full_name: String,
    /// True when the type already exists and should be reused, not generated.
    pub exists: bool,
}

/// Resolve `requested` against the catalog.
///
/// An existing type keeps its own name and namespace. Otherwise the class
/// name is the last dotted segment and the namespace is everything before
/// it, or `default_namespace` for an unqualified name.
pub fn resolve_type(
    catalog: &dyn TypeCatalog,
    requested: &str,
    default_namespace: &str,
) -> Result<TypeBinding> {
    if !is_valid_type_name(requested) {
        return Err(StencilError::InvalidTypeName {
            name: requested.to_string(),
        });
    }

    if let Some(existing) = catalog.find_type(requested) {
        tracing::debug!(requested, found = %existing.full_name(), "reusing existing type");
        let namespace = existing.namespace.clone().unwrap_or_default();
        return Ok(TypeBinding {
            full_name: existing.full_name(),
            class_name: existing.name,
            namespace,
            exists: true,
        });
    }

    let (namespace, class_name) = match requested.rsplit_once('.') {
        Some((ns, class)) => (ns.to_string(), class.to_string()),
        None => (default_namespace.to_string(), requested.to_string()),
    };
    let full_name = if namespace.is_empty() {
        class_name.clone()
    } else {
        format!("{namespace}.{class_name}")
    };
    Ok(TypeBinding {
        class_name,
        namespace,
        full_name,
        exists: false,
    })
}

fn type_name_regex() -> &'static regex_lite::Regex {
    static REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        regex_lite::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
            .expect("Invalid regex")
    })
}

/// Dot-separated identifiers, e.g. `App.Data.AppUser`.
pub fn is_valid_type_name(name: &str) -> bool {
    type_name_regex().is_match(name)
}
