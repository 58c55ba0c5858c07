use std::path::{Path, PathBuf};

use crate::error::{Result, StencilError};

/// Ordered template search path. The first folder holding a template wins.
#[derive(Debug, Clone, Default)]
pub struct TemplateFolders {
    folders: Vec<PathBuf>,
}

impl TemplateFolders {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self { folders }
    }

    /// Put `folder` ahead of every folder already registered.
    pub fn prepend(&mut self, folder: PathBuf) {
        self.folders.insert(0, folder);
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    pub fn find(&self, id: &str) -> Option<PathBuf> {
        self.folders
            .iter()
            .map(|folder| folder.join(id))
            .find(|candidate| candidate.is_file())
    }

    /// Read a template as UTF-8 text.
    pub fn load(&self, id: &str) -> Result<String> {
        let path = self.find(id).ok_or_else(|| StencilError::TemplateNotFound {
            id: id.to_string(),
            searched: self
                .folders
                .iter()
                .map(|f| f.display().to_string())
                .collect(),
        })?;
        tracing::debug!(template = %id, path = %path.display(), "loading template");
        read_template(id, &path)
    }
}

fn read_template(id: &str, path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| StencilError::Io {
        context: format!("reading template {}", path.display()),
        source: e,
    })?;

    if !content_inspector::inspect(&bytes).is_text() {
        return Err(StencilError::BinaryTemplate { id: id.to_string() });
    }

    String::from_utf8(bytes).map_err(|_| StencilError::BinaryTemplate { id: id.to_string() })
}
