mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::prelude::*;

fn init_logging(verbose: bool) {
    let default = if verbose { "stencil=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::New {
            catalog,
            project,
            data,
            model,
            types,
            type_catalog,
            layout,
            files,
            force,
            dry_run,
            jobs,
            timeout,
        } => commands::new::run(commands::new::NewArgs {
            catalog,
            project,
            data,
            model,
            types,
            type_catalog,
            layout,
            files,
            force,
            dry_run,
            jobs,
            timeout,
            verbose: cli.verbose,
        }),
        Commands::Check { path } => commands::check::run(path),
        Commands::Render {
            template,
            data,
            model,
        } => commands::render::run(template, data, model),
        Commands::List { path } => commands::list::run(path),
    }
}
