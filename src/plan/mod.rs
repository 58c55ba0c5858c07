//! Decides which files a scaffold writes, where, and whether each one may
//! replace an existing file.
//!
//! Planning is a pure function of the catalog, the model, the options and a
//! [`ProjectProbe`] snapshot. It either returns a complete [`Plan`] or a
//! [`PlanError`] listing every problem found; nothing is written until a
//! plan exists.

#![allow(unused_assignments)]

pub mod layout;
pub mod policy;
pub mod probe;

use std::collections::BTreeMap;
use std::path::PathBuf;

use globset::{Glob, GlobMatcher};
use miette::Diagnostic;
use serde::Serialize;
use tera::{Context, Value};
use thiserror::Error;

use crate::config::schema::CatalogFile;
use crate::model::Model;
use crate::render::{build_context, eval_bool_expr, render_path_component};

pub use layout::{resolve_support_layout, SupportLayout, DEFAULT_LAYOUT_FILE};
pub use policy::{Decision, OverwritePolicy};
pub use probe::{ProbeSnapshot, ProjectProbe};

/// A file that survived selection, with its final relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFile {
    pub name: String,
    /// Relative to the project root, forward slashes.
    pub path: String,
    pub template: String,
    pub overwrite: OverwritePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub file: GenerationFile,
    pub absolute_path: PathBuf,
    pub exists: bool,
    pub requires_force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub file: GenerationFile,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub root: PathBuf,
    pub force: bool,
    /// Explicit layout page, e.g. `~/Views/Shared/_Main.cshtml`.
    pub layout: Option<String>,
    /// `;`-separated file names or globs; `None` selects everything.
    pub files: Option<String>,
    pub layout_file: String,
}

impl PlanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            force: false,
            layout: None,
            files: None,
            layout_file: DEFAULT_LAYOUT_FILE.to_string(),
        }
    }
}

/// Values the planner derives for templates and path placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanVariables {
    pub support_location: String,
    pub layout_path: String,
    pub layout_page: String,
    pub generate_layout: bool,
    pub has_existing_layout: bool,
    pub wwwroot_has_files: bool,
}

impl PlanVariables {
    fn new(layout: &SupportLayout, probe: &dyn ProjectProbe) -> Self {
        Self {
            support_location: layout.support_location.clone(),
            layout_path: layout.layout_path.clone(),
            layout_page: layout.layout_page().to_string(),
            generate_layout: !layout.had_existing_layout,
            has_existing_layout: layout.had_existing_layout,
            wwwroot_has_files: probe.dir_exists("wwwroot") && probe.has_files_under("wwwroot"),
        }
    }

    pub fn entries(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("support_location", Value::from(self.support_location.as_str())),
            ("layout_path", Value::from(self.layout_path.as_str())),
            ("layout_page", Value::from(self.layout_page.as_str())),
            ("generate_layout", Value::from(self.generate_layout)),
            ("has_existing_layout", Value::from(self.has_existing_layout)),
            ("wwwroot_has_files", Value::from(self.wwwroot_has_files)),
        ]
    }
}

/// The definitive, conflict-free list of files for one scaffold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub root: PathBuf,
    pub force: bool,
    pub files: Vec<PlannedFile>,
    pub skipped: Vec<SkippedFile>,
    pub layout: SupportLayout,
    pub variables: PlanVariables,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum PlanProblem {
    #[error("'{path}' would be generated by more than one file: {}", names.join(", "))]
    #[diagnostic(help("Give each catalog entry a distinct output path"))]
    PathConflict { path: String, names: Vec<String> },

    #[error("These files already exist: {}", paths.join(", "))]
    #[diagnostic(help("Use --force to overwrite them"))]
    ForceRequired { paths: Vec<String> },

    #[error("No catalog entry matches: {}", patterns.join(", "))]
    #[diagnostic(help("Run 'stencil list' to see the available file names"))]
    UnknownFiles { patterns: Vec<String> },

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidFilePattern { pattern: String, reason: String },

    #[error("Invalid output path '{path}' for '{name}': {reason}")]
    InvalidPath {
        name: String,
        path: String,
        reason: String,
    },

    #[error("Failed to render output path for '{name}': {reason}")]
    PathTemplate { name: String, reason: String },

    #[error("Invalid 'when' expression for '{name}': {reason}")]
    When { name: String, reason: String },
}

/// Every problem that keeps a plan from being produced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("generation plan is invalid ({} problem(s))", problems.len())]
#[diagnostic(code(stencil::plan))]
pub struct PlanError {
    #[related]
    pub problems: Vec<PlanProblem>,
}

/// Produce the plan for `candidates` against a project snapshot.
pub fn plan(
    candidates: &[CatalogFile],
    probe: &dyn ProjectProbe,
    model: &Model,
    options: &PlanOptions,
) -> Result<Plan, PlanError> {
    let mut problems = Vec::new();

    let layout = resolve_support_layout(options.layout.as_deref(), &options.layout_file, probe);
    let variables = PlanVariables::new(&layout, probe);

    let mut context = build_context(model);
    for (key, value) in variables.entries() {
        context.insert(key, &value);
    }

    let selected = select(candidates, options.files.as_deref(), &mut problems);

    let mut files = Vec::new();
    for candidate in selected {
        if let Some(file) = resolve_candidate(candidate, &layout, &context, &mut problems) {
            files.push(file);
        }
    }

    let files = dedupe(files, &mut problems);

    let mut planned = Vec::new();
    let mut skipped = Vec::new();
    let mut needs_force = Vec::new();
    for file in files {
        let exists = probe.file_exists(&file.path);
        match file.overwrite.decide(exists, options.force) {
            Decision::Write { requires_force } => planned.push(PlannedFile {
                absolute_path: options.root.join(&file.path),
                file,
                exists,
                requires_force,
            }),
            Decision::DropSilently => {
                tracing::debug!(path = %file.path, "keeping existing file");
            }
            Decision::Skip => skipped.push(SkippedFile {
                reason: format!("{} already exists and is never overwritten", file.path),
                file,
            }),
            Decision::NeedsForce => needs_force.push(file.path),
        }
    }
    if !needs_force.is_empty() {
        problems.push(PlanProblem::ForceRequired { paths: needs_force });
    }

    if !problems.is_empty() {
        tracing::debug!(problems = problems.len(), "plan rejected");
        return Err(PlanError { problems });
    }

    tracing::info!(
        files = planned.len(),
        skipped = skipped.len(),
        support_location = %layout.support_location,
        "planned generation"
    );
    Ok(Plan {
        root: options.root.clone(),
        force: options.force,
        files: planned,
        skipped,
        layout,
        variables,
    })
}

fn select<'a>(
    candidates: &'a [CatalogFile],
    files: Option<&str>,
    problems: &mut Vec<PlanProblem>,
) -> Vec<&'a CatalogFile> {
    let Some(files) = files else {
        return candidates.iter().collect();
    };

    let mut matchers: Vec<(String, GlobMatcher)> = Vec::new();
    for pattern in files.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match Glob::new(pattern) {
            Ok(glob) => matchers.push((pattern.to_string(), glob.compile_matcher())),
            Err(e) => problems.push(PlanProblem::InvalidFilePattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            }),
        }
    }

    let unknown: Vec<String> = matchers
        .iter()
        .filter(|(_, m)| !candidates.iter().any(|c| m.is_match(&c.name)))
        .map(|(pattern, _)| pattern.clone())
        .collect();
    if !unknown.is_empty() {
        problems.push(PlanProblem::UnknownFiles { patterns: unknown });
    }

    candidates
        .iter()
        .filter(|c| c.always_include || matchers.iter().any(|(_, m)| m.is_match(&c.name)))
        .collect()
}

fn resolve_candidate(
    candidate: &CatalogFile,
    layout: &SupportLayout,
    context: &Context,
    problems: &mut Vec<PlanProblem>,
) -> Option<GenerationFile> {
    if candidate.layout && layout.had_existing_layout {
        return None;
    }

    if let Some(expr) = &candidate.when {
        match eval_bool_expr(expr, context) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(name = %candidate.name, when = %expr, "excluded by condition");
                return None;
            }
            Err(e) => {
                problems.push(PlanProblem::When {
                    name: candidate.name.clone(),
                    reason: error_chain(&e),
                });
                return None;
            }
        }
    }

    let raw_path = if candidate.layout {
        layout.layout_path.clone()
    } else {
        match render_path_component(&candidate.path, context) {
            Ok(path) => path,
            Err(e) => {
                problems.push(PlanProblem::PathTemplate {
                    name: candidate.name.clone(),
                    reason: error_chain(&e),
                });
                return None;
            }
        }
    };

    match normalize_relative_path(&raw_path) {
        Ok(path) => Some(GenerationFile {
            name: candidate.name.clone(),
            path,
            template: candidate.template.clone(),
            overwrite: candidate.overwrite,
        }),
        Err(reason) => {
            problems.push(PlanProblem::InvalidPath {
                name: candidate.name.clone(),
                path: raw_path,
                reason: reason.to_string(),
            });
            None
        }
    }
}

/// Collapse identical entries; report different entries sharing a path.
fn dedupe(files: Vec<GenerationFile>, problems: &mut Vec<PlanProblem>) -> Vec<GenerationFile> {
    let mut unique: Vec<GenerationFile> = Vec::new();
    let mut conflicts: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for file in files {
        match unique.iter().find(|u| u.path == file.path) {
            Some(existing) if *existing == file => {}
            Some(existing) => {
                let names = conflicts
                    .entry(file.path.clone())
                    .or_insert_with(|| vec![existing.name.clone()]);
                if !names.contains(&file.name) {
                    names.push(file.name);
                }
            }
            None => unique.push(file),
        }
    }

    for (path, names) in conflicts {
        problems.push(PlanProblem::PathConflict { path, names });
    }
    unique
}

/// Forward slashes, no `.` segments, nothing outside the project root.
pub fn normalize_relative_path(raw: &str) -> Result<String, &'static str> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') || unified.chars().nth(1) == Some(':') {
        return Err("path must be relative to the project root");
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err("path must not leave the project root");
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err("path is empty");
    }
    Ok(segments.join("/"))
}

fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
