use std::path::{Path, PathBuf};

use miette::Result;

use stencil::compile::CompileContext;
use stencil::config::load_user_config;
use stencil::error::StencilError;
use stencil::model::ModelBinder;
use stencil::render::render_template;

use super::parse_pairs;

pub fn run(template: String, data: Vec<String>, model: Vec<String>) -> Result<()> {
    let path = Path::new(&template);
    let text = std::fs::read_to_string(path).map_err(|e| StencilError::Io {
        context: format!("reading template {}", path.display()),
        source: e,
    })?;

    let mut binder = ModelBinder::new();
    for file in model {
        binder = binder.bind_file(&PathBuf::from(file))?;
    }
    let model = binder.bind_pairs(&parse_pairs(data, "--data")?).build()?;

    let limits = load_user_config()?.unwrap_or_default().engine;
    let ctx = CompileContext::new(limits);

    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| template.clone());
    let output = render_template(&ctx, &id, &text, &model)?;
    print!("{output}");
    Ok(())
}
