//! The data a template renders against.
//!
//! A [`Model`] is assembled once through [`ModelBinder`] and never changes
//! afterwards; every template in a run sees the same values.

pub mod types;
pub mod value;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use rhai::{Dynamic, Map};
use tera::Value;

use crate::error::{Result, StencilError};

pub use types::{resolve_type, StaticTypeCatalog, TypeBinding, TypeCatalog, TypeDescriptor};
pub use value::{infer_scalar, to_dynamic, toml_to_value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    fields: BTreeMap<String, Value>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A fresh script-side copy; templates may modify it without touching `self`.
    pub fn to_dynamic(&self) -> Dynamic {
        let mut map = Map::new();
        for (key, value) in &self.fields {
            map.insert(key.as_str().into(), to_dynamic(value));
        }
        Dynamic::from_map(map)
    }
}

/// Collects named values into a [`Model`]. Later bindings replace earlier
/// ones with the same name.
#[derive(Debug, Clone, Default)]
pub struct ModelBinder {
    fields: BTreeMap<String, Value>,
}

impl ModelBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing model, e.g. to add planner variables.
    pub fn from_model(model: &Model) -> Self {
        Self {
            fields: model.fields.clone(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Bind `key=value` strings from the command line, typing scalars.
    pub fn bind_pairs(mut self, pairs: &[(String, String)]) -> Self {
        for (key, raw) in pairs {
            self.fields.insert(key.clone(), infer_scalar(raw));
        }
        self
    }

    /// Bind every top-level entry of a JSON or TOML file.
    pub fn bind_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StencilError::ModelFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let fail = |reason: String| StencilError::ModelFile {
            path: path.to_path_buf(),
            reason,
        };

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Value>(&content).map_err(|e| fail(e.to_string()))?
            }
            _ => {
                let table: toml::Value =
                    toml::from_str(&content).map_err(|e| fail(e.to_string()))?;
                toml_to_value(&table)
            }
        };

        let Value::Object(entries) = parsed else {
            return Err(fail("top level is not a table".to_string()));
        };
        tracing::debug!(path = %path.display(), fields = entries.len(), "loaded model file");
        self.fields.extend(entries);
        Ok(self)
    }

    /// Bind a resolved type as `{class_name, namespace, full_name, exists}`.
    pub fn bind_type(self, name: impl Into<String>, binding: &TypeBinding) -> Self {
        let value = serde_json::json!({
            "class_name": binding.class_name,
            "namespace": binding.namespace,
            "full_name": binding.full_name,
            "exists": binding.exists,
        });
        self.bind(name, value)
    }

    pub fn extend<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in entries {
            self.fields.insert(key.into(), value);
        }
        self
    }

    /// Freeze the bindings. Every top-level name must be a script identifier.
    pub fn build(self) -> Result<Model> {
        if let Some(bad) = self.fields.keys().find(|k| !is_identifier(k)) {
            return Err(StencilError::InvalidModelField { name: bad.clone() });
        }
        Ok(Model {
            fields: self.fields,
        })
    }
}

fn identifier_regex() -> &'static regex_lite::Regex {
    static REGEX: OnceLock<regex_lite::Regex> = OnceLock::new();
    REGEX.get_or_init(|| regex_lite::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex"))
}

pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}
