use std::path::PathBuf;
use std::time::Duration;

use console::style;
use miette::Result;
use stencil::write::{preview_outputs, PreviewAction};
use stencil::ScaffoldOptions;

use super::parse_pairs;

pub struct NewArgs {
    pub catalog: String,
    pub project: Option<String>,
    pub data: Vec<String>,
    pub model: Vec<String>,
    pub types: Vec<String>,
    pub type_catalog: Option<String>,
    pub layout: Option<String>,
    pub files: Option<String>,
    pub force: bool,
    pub dry_run: bool,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub verbose: bool,
}

pub fn run(args: NewArgs) -> Result<()> {
    let options = ScaffoldOptions {
        catalog: PathBuf::from(&args.catalog),
        project: args.project.map(PathBuf::from),
        data: parse_pairs(args.data, "--data")?,
        model_files: args.model.into_iter().map(PathBuf::from).collect(),
        types: parse_pairs(args.types, "--type")?,
        type_catalog: args.type_catalog.map(PathBuf::from),
        layout: args.layout,
        files: args.files,
        force: args.force,
        jobs: args.jobs,
        timeout: args.timeout.map(Duration::from_secs),
        user_config: None,
    };

    let plan = stencil::plan_scaffold(options)?;

    if !args.dry_run {
        stencil::execute_scaffold(plan)?;
        return Ok(());
    }

    let outcome = stencil::render_scaffold(&plan)?;
    stencil::report_failures(&outcome);

    println!(
        "\n{} Dry run: files that would be written in {}:",
        style("==>").cyan().bold(),
        style(plan.plan.root.display()).cyan()
    );

    let entries = preview_outputs(&outcome)?;
    for entry in &entries {
        let action = match &entry.action {
            PreviewAction::Create => style("create   ").green(),
            PreviewAction::Overwrite { .. } => style("overwrite").yellow(),
            PreviewAction::Unchanged => style("unchanged").dim(),
            PreviewAction::Failed => style("failed   ").red(),
        };
        println!("  {} {}", action, entry.path);

        if args.verbose {
            if let PreviewAction::Overwrite { diff } = &entry.action {
                for line in diff.lines() {
                    let styled = if line.starts_with('+') {
                        style(line).green()
                    } else if line.starts_with('-') {
                        style(line).red()
                    } else {
                        style(line).dim()
                    };
                    println!("    {styled}");
                }
            }
        }
    }
    for skipped in &plan.plan.skipped {
        println!(
            "  {} {} ({})",
            style("skip     ").yellow(),
            skipped.file.path,
            skipped.reason
        );
    }

    println!(
        "\n{} Dry run: no files written.",
        style("\u{2139}").blue().bold()
    );

    let failed = outcome.failed_count();
    if failed > 0 {
        return Err(stencil::error::StencilError::RenderFailed {
            failed,
            total: outcome.files.len(),
        }
        .into());
    }
    Ok(())
}
