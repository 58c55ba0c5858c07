use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stencil",
    about = "Scaffold source files into an existing project from templates",
    version
)]
pub struct Cli {
    /// Show debug logging and full diffs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold the files of a catalog into a project
    New {
        /// Catalog directory (containing stencil.toml)
        catalog: String,

        /// Project root (default: current directory)
        #[arg(short, long)]
        project: Option<String>,

        /// Set model values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Read model values from a JSON or TOML file (can be repeated)
        #[arg(short, long = "model", value_name = "FILE")]
        model: Vec<String>,

        /// Choose a type for a catalog type slot (can be repeated: -t user=App.Data.AppUser)
        #[arg(short, long = "type", value_name = "KEY=TYPE")]
        types: Vec<String>,

        /// Description of the project's existing types (JSON or TOML)
        #[arg(long, value_name = "FILE")]
        type_catalog: Option<String>,

        /// Use this layout page instead of detecting one (e.g. ~/Views/Shared/_Main.cshtml)
        #[arg(long)]
        layout: Option<String>,

        /// Only generate these files: ';'-separated names or globs
        #[arg(long)]
        files: Option<String>,

        /// Overwrite existing files that allow it
        #[arg(short, long)]
        force: bool,

        /// Show what would be written without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Render worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Give up waiting for renders after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Validate a catalog and compile all of its templates
    Check {
        /// Catalog directory (default: current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Render a single template file to stdout
    Render {
        /// Template file
        template: String,

        /// Set model values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Read model values from a JSON or TOML file (can be repeated)
        #[arg(short, long = "model", value_name = "FILE")]
        model: Vec<String>,
    },

    /// List the files a catalog can generate
    List {
        /// Catalog directory (default: current directory)
        #[arg(default_value = ".")]
        path: String,
    },
}
