use std::path::Path;

use console::style;
use miette::Result;

use stencil::config::{load_catalog, CatalogFile};

pub fn run(path: String) -> Result<()> {
    let catalog = load_catalog(Path::new(&path))?;
    let files = &catalog.config.files;

    println!(
        "{} ({} file{})\n",
        style(&catalog.config.catalog.name).bold(),
        files.len(),
        if files.len() == 1 { "" } else { "s" }
    );

    for file in files {
        print_entry(file);
    }

    Ok(())
}

fn print_entry(file: &CatalogFile) {
    let path = if file.layout {
        "<layout page>"
    } else {
        file.path.as_str()
    };
    println!("  {} {}", style(&file.name).cyan(), style(path).dim());
    if let Some(description) = &file.description {
        println!("    {description}");
    }

    let mut notes = vec![format!("overwrite: {}", file.overwrite)];
    if let Some(when) = &file.when {
        notes.push(format!("when: {when}"));
    }
    if file.always_include {
        notes.push("always included".to_string());
    }
    println!("    {}", style(notes.join(", ")).dim());
}
