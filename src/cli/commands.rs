use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use crate::renderer::TemplateSet;
use crate::router::{load_routes, parse_method, SUPPORTED_METHODS};

/// Command-line interface for brrtmvc
///
/// Inspection tools for the files an application is configured from.
#[derive(Parser, Debug)]
#[command(name = "brrtmvc")]
#[command(about = "brrtmvc route and template inspector", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a routes file and list its routes, or resolve one request
    Routes {
        /// Path to the routes file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Method of the request to resolve (requires --path)
        #[arg(short, long, requires = "path")]
        method: Option<String>,

        /// Path of the request to resolve
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Compile a template directory and list the template names
    Templates {
        /// Root of the views directory
        #[arg(short, long)]
        dir: PathBuf,
    },
}

/// Parse the process arguments and run the command against stdout
///
/// # Errors
///
/// Returns an error if a file cannot be loaded or a request does not resolve.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}

/// Run a parsed command, writing its report to `out`
///
/// # Errors
///
/// Returns an error if a file cannot be loaded, a method is unsupported or a
/// request does not resolve.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Commands::Routes { file, method, path } => {
            let table = load_routes(file)?;
            if let Some(path) = path {
                let method = parse_method(method.as_deref().unwrap_or("get"))?;
                let m = table
                    .route(&method, path)
                    .with_context(|| format!("No route for {method} {path}"))?;
                writeln!(out, "{method} {path} -> {} ({})", m.target, m.pattern)?;
                for (name, value) in &m.params {
                    writeln!(out, "  {name} = {value}")?;
                }
            } else {
                for method in &SUPPORTED_METHODS {
                    for entry in table.entries(method) {
                        writeln!(
                            out,
                            "{:<7} {:<32} {}",
                            method.as_str(),
                            entry.pattern.as_str(),
                            entry.target
                        )?;
                    }
                }
                writeln!(out, "{} routes", table.len())?;
            }
            Ok(())
        }
        Commands::Templates { dir } => {
            let mut templates = TemplateSet::new();
            let count = templates.load_dir(dir)?;
            for name in templates.names() {
                writeln!(out, "{name}")?;
            }
            writeln!(out, "{count} templates")?;
            Ok(())
        }
    }
}
