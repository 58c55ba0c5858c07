pub mod check;
pub mod compile;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod execute;
pub mod model;
pub mod plan;
pub mod render;
pub mod template;
pub mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use console::style;

use crate::compile::CompileContext;
use crate::config::{load_catalog, load_user_config, Catalog, UserConfig};
use crate::error::{Result, StencilError};
use crate::model::{
    resolve_type, toml_to_value, Model, ModelBinder, StaticTypeCatalog, TypeCatalog,
};
use crate::plan::{Plan, PlanOptions, ProbeSnapshot};
use crate::render::{render_plan, BatchOptions, BatchOutcome};
use crate::template::TemplateFolders;
use crate::write::{write_outputs, WriteReport};

pub struct ScaffoldOptions {
    /// Catalog directory or `stencil.toml` path.
    pub catalog: PathBuf,
    /// Project root; defaults to the current directory.
    pub project: Option<PathBuf>,
    pub data: Vec<(String, String)>,
    pub model_files: Vec<PathBuf>,
    /// `key=TypeName` choices for the catalog's type slots.
    pub types: Vec<(String, String)>,
    pub type_catalog: Option<PathBuf>,
    pub layout: Option<String>,
    pub files: Option<String>,
    pub force: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<Duration>,
    /// Use this instead of reading `~/.config/stencil/config.toml`.
    pub user_config: Option<UserConfig>,
}

impl ScaffoldOptions {
    pub fn new(catalog: impl Into<PathBuf>) -> Self {
        Self {
            catalog: catalog.into(),
            project: None,
            data: Vec::new(),
            model_files: Vec::new(),
            types: Vec::new(),
            type_catalog: None,
            layout: None,
            files: None,
            force: false,
            jobs: None,
            timeout: None,
            user_config: None,
        }
    }
}

/// Everything needed to render and write a scaffold that has been planned.
pub struct ScaffoldPlan {
    pub catalog: Catalog,
    pub plan: Plan,
    /// The bound model plus the planner's variables.
    pub model: Arc<Model>,
    pub folders: TemplateFolders,
    pub context: Arc<CompileContext>,
    pub batch: BatchOptions,
}

/// Outcome of a scaffold that rendered and wrote files.
pub struct ScaffoldResult {
    pub outcome: BatchOutcome,
    pub report: WriteReport,
}

/// Plan a scaffold: load the catalog, bind the model, snapshot the project
/// and decide the output files. Nothing is rendered or written.
pub fn plan_scaffold(mut options: ScaffoldOptions) -> Result<ScaffoldPlan> {
    let user = match options.user_config.take() {
        Some(user) => user,
        None => load_user_config()?.unwrap_or_default(),
    };
    let catalog = load_catalog(&options.catalog)?;

    let root = match &options.project {
        Some(project) => project.clone(),
        None => std::env::current_dir().map_err(|e| StencilError::Io {
            context: "getting current directory".into(),
            source: e,
        })?,
    };

    let base_model = bind_model(&catalog, &root, &options)?;

    let snapshot = ProbeSnapshot::capture(&root);
    let plan_options = PlanOptions {
        root: root.clone(),
        force: options.force,
        layout: options.layout.clone(),
        files: options.files.clone(),
        layout_file: catalog.config.catalog.layout_file.clone(),
    };
    let plan = plan::plan(&catalog.config.files, &snapshot, &base_model, &plan_options)?;

    let model = ModelBinder::from_model(&base_model)
        .extend(plan.variables.entries())
        .build()?;

    let mut folders = catalog.template_folders();
    for folder in user.template_overrides.iter().rev() {
        folders.prepend(folder.clone());
    }

    let batch = BatchOptions {
        jobs: options.jobs.or(user.jobs),
        timeout: options
            .timeout
            .or(user.timeout_secs.map(Duration::from_secs)),
    };

    Ok(ScaffoldPlan {
        catalog,
        plan,
        model: Arc::new(model),
        folders,
        context: Arc::new(CompileContext::new(user.engine)),
        batch,
    })
}

/// Catalog defaults, then the project name, model files, `--data` pairs and
/// resolved types; later sources win.
fn bind_model(catalog: &Catalog, root: &Path, options: &ScaffoldOptions) -> Result<Model> {
    let mut binder = ModelBinder::new();
    for (key, value) in &catalog.config.defaults {
        binder = binder.bind(key.clone(), toml_to_value(value));
    }
    if let Some(name) = root.file_name() {
        binder = binder.bind("project_name", name.to_string_lossy().into_owned());
    }
    for path in &options.model_files {
        binder = binder.bind_file(path)?;
    }
    binder = binder.bind_pairs(&options.data);

    let type_catalog = match &options.type_catalog {
        Some(path) => StaticTypeCatalog::load(path)?,
        None => StaticTypeCatalog::default(),
    };
    if let Some((key, _)) = options
        .types
        .iter()
        .find(|(key, _)| !catalog.config.types.iter().any(|slot| &slot.key == key))
    {
        return Err(StencilError::CatalogInvalid {
            name: key.clone(),
            reason: "the catalog declares no type with this key".into(),
        });
    }
    let mut incompatible = Vec::new();
    for slot in &catalog.config.types {
        let requested = options
            .types
            .iter()
            .rev()
            .find(|(key, _)| key == &slot.key)
            .map(|(_, name)| name.as_str())
            .or(slot.default.as_deref());
        let Some(requested) = requested else {
            continue;
        };
        let namespace = slot
            .default_namespace
            .as_deref()
            .or(catalog.config.catalog.default_namespace.as_deref())
            .unwrap_or_default();
        let binding = resolve_type(&type_catalog, requested, namespace)?;
        if let (true, Some(base)) = (binding.exists, slot.base_type.as_deref()) {
            if let Some(existing) = type_catalog.find_type(requested) {
                if !existing.is_assignable_to(base) {
                    incompatible.push(format!(
                        "'{}' for '{}' does not derive from {base}",
                        existing.full_name(),
                        slot.key
                    ));
                }
            }
        }
        binder = binder.bind_type(slot.key.clone(), &binding);
    }
    if !incompatible.is_empty() {
        return Err(StencilError::IncompatibleTypes {
            types: incompatible,
        });
    }

    binder.build()
}

/// Render every planned file.
pub fn render_scaffold(plan: &ScaffoldPlan) -> Result<BatchOutcome> {
    render_plan(
        Arc::clone(&plan.context),
        &plan.plan,
        Arc::clone(&plan.model),
        &plan.folders,
        &plan.batch,
    )
}

/// Render and write a planned scaffold.
///
/// Files that fail to render are reported and left unwritten; the others
/// are still written. Any failure or refusal makes the result an error.
pub fn execute_scaffold(plan: ScaffoldPlan) -> Result<ScaffoldResult> {
    let outcome = render_scaffold(&plan)?;
    report_failures(&outcome);

    let report = write_outputs(&plan.plan, &outcome)?;

    for skipped in &plan.plan.skipped {
        println!(
            "  {} {} ({})",
            style("skip").yellow(),
            skipped.file.path,
            skipped.reason
        );
    }
    for written in &report.written {
        let action = if written.overwritten { "overwrite" } else { "create" };
        println!("  {} {}", style(action).green(), written.path);
    }
    for refused in &report.refused {
        eprintln!(
            "  {} {}: {}",
            style("refused").red(),
            refused.path,
            refused.reason
        );
    }

    let total = outcome.files.len();
    let failed = outcome.failed_count();
    if failed > 0 {
        return Err(StencilError::RenderFailed { failed, total });
    }
    if !report.refused.is_empty() {
        return Err(StencilError::WriteRefused {
            paths: report.refused.iter().map(|r| r.path.clone()).collect(),
        });
    }

    println!(
        "\n{} Scaffolded {} file(s) into {}",
        style("✓").green().bold(),
        report.written.len(),
        style(plan.plan.root.display()).cyan()
    );

    Ok(ScaffoldResult { outcome, report })
}

/// Print every render failure with its template diagnostics.
pub fn report_failures(outcome: &BatchOutcome) {
    for (file, err) in outcome.failures() {
        eprintln!(
            "{} {} could not be rendered: {}",
            style("error:").red().bold(),
            file.file.path,
            err
        );
        for diagnostic in err.diagnostics() {
            eprintln!("    {diagnostic}");
        }
    }
}

/// Plan, render and write in one step.
pub fn scaffold(options: ScaffoldOptions) -> Result<ScaffoldResult> {
    let plan = plan_scaffold(options)?;
    execute_scaffold(plan)
}
