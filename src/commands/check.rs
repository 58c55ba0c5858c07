use std::path::Path;

use console::style;
use miette::Result;

use stencil::check::check_catalog;
use stencil::compile::CompileContext;
use stencil::config::load_user_config;

pub fn run(path: String) -> Result<()> {
    let catalog_dir = Path::new(&path);

    println!(
        "{} {}",
        style("Checking catalog at").bold(),
        style(catalog_dir.display()).cyan()
    );

    let limits = load_user_config()?.unwrap_or_default().engine;
    let result = check_catalog(catalog_dir, &CompileContext::new(limits))?;

    println!("  Name: {}", result.catalog_name);
    println!("  Files: {}", result.file_count);
    println!("  Templates: {}", result.templates.len());

    if !result.warnings.is_empty() {
        println!("\n{}", style("Warnings:").yellow().bold());
        for w in &result.warnings {
            println!("  {} {}", style("⚠").yellow(), w);
        }
    }

    if !result.errors.is_empty() {
        println!("\n{}", style("Errors:").red().bold());
        for e in &result.errors {
            println!("  {} {}", style("✗").red(), e);
        }
        println!(
            "\n{} Catalog has {} error(s)",
            style("✗").red().bold(),
            result.errors.len()
        );
        std::process::exit(1);
    } else {
        println!("\n{} Catalog is valid!", style("✓").green().bold());
    }

    Ok(())
}
