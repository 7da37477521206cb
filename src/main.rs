mod config;
mod folding;
mod io;
mod logging;
mod project;
mod symbol;
mod token;

#[cfg(test)]
mod test_utils;

use clap::{Parser, Subcommand};
use config::ResolverConfig;
use io::RealFileSystem;
use logging::{LogConfig, init_logging};
use lsp_types::DocumentSymbol;
use project::{ScanOptions, SolutionManager, scan_solutions};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use symbol::{ClarionDocumentSymbolProvider, SymbolIterator};
use thiserror::Error;
use token::Token;
use tracing::{debug, info};

/// Outline, folding and solution resolution for Clarion sources
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log file path (overrides CLARION_LOG_FILE env var)
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Write logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// JSON resolver config file (replaces the CLARION_* env vars)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Build configuration whose redirection section is honoured
    #[arg(long, value_name = "NAME", global = true)]
    configuration: Option<String>,

    /// Directory holding the global redirection file
    #[arg(long, value_name = "DIR", global = true)]
    clarion_bin: Option<PathBuf>,

    /// Redirection file name
    #[arg(long, value_name = "FILE", global = true)]
    red_file: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the document outline from a tokens JSON file ("-" for stdin)
    Outline {
        tokens: PathBuf,
        /// Document name used in logs
        #[arg(long)]
        document: Option<String>,
        /// Emit LSP DocumentSymbol objects instead of the full symbol tree
        #[arg(long, conflicts_with = "flat")]
        lsp: bool,
        /// Print one `path<TAB>kind` line per symbol
        #[arg(long)]
        flat: bool,
    },
    /// Compute folding ranges from a tokens JSON file ("-" for stdin)
    Folding { tokens: PathBuf },
    /// Print the search paths for an extension
    SearchPaths {
        solution: PathBuf,
        #[arg(long, default_value = ".clw")]
        extension: String,
        /// Restrict to one project (all projects otherwise)
        #[arg(long)]
        project: Option<String>,
    },
    /// Locate a file across the solution
    Resolve {
        solution: PathBuf,
        file: String,
        /// Only search this project's redirection entries and search paths
        #[arg(long)]
        project: Option<String>,
    },
    /// Find class definitions across the solution
    FindClass { solution: PathBuf, name: String },
    /// Find .sln files under a directory
    Discover {
        /// Defaults to the current directory
        root: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        depth: usize,
        #[arg(long)]
        include_hidden: bool,
    },
}

#[derive(Error, Debug)]
enum TokenInputError {
    #[error("Failed to read tokens from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid token JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a JSON token array from a file, or stdin for `-`
fn load_tokens(path: &Path) -> Result<Vec<Token>, TokenInputError> {
    let label = path.display().to_string();
    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|source| TokenInputError::Io {
                path: label.clone(),
                source,
            })?;
        buffer
    } else {
        std::fs::read_to_string(path).map_err(|source| TokenInputError::Io {
            path: label.clone(),
            source,
        })?
    };
    let tokens: Vec<Token> =
        serde_json::from_str(&content).map_err(|source| TokenInputError::Json {
            path: label,
            source,
        })?;
    debug!(count = tokens.len(), "Loaded tokens");
    Ok(tokens)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolver_config(args: &Args) -> Result<ResolverConfig, config::ConfigError> {
    let base = match &args.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::from_env(),
    };
    Ok(base.with_overrides(
        args.configuration.clone(),
        args.clarion_bin.clone(),
        args.red_file.clone(),
    ))
}

async fn open_solution(
    args: &Args,
    solution: &Path,
) -> Result<SolutionManager<RealFileSystem>, Box<dyn std::error::Error>> {
    let manager = SolutionManager::new(RealFileSystem, resolver_config(args)?)?;
    manager.initialize(solution).await?;
    Ok(manager)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_config = LogConfig::from_env().with_overrides(
        args.log_level.clone(),
        args.log_file.clone(),
        args.log_json,
    );
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    match &args.command {
        Command::Outline {
            tokens,
            document,
            lsp,
            flat,
        } => {
            let tokens = load_tokens(tokens)?;
            let document = document.clone().unwrap_or_else(|| "stdin".to_string());
            let symbols =
                ClarionDocumentSymbolProvider::new().provide_document_symbols(&tokens, &document);
            if *lsp {
                let lsp_symbols: Vec<DocumentSymbol> =
                    symbols.iter().map(DocumentSymbol::from).collect();
                print_json(&lsp_symbols)?;
            } else if *flat {
                for (symbol, path) in SymbolIterator::new(&symbols) {
                    let mut full = path.join(" / ");
                    if !full.is_empty() {
                        full.push_str(" / ");
                    }
                    full.push_str(&symbol.name);
                    println!("{full}\t{:?}", symbol.kind);
                }
            } else {
                print_json(&symbols)?;
            }
        }
        Command::Folding { tokens } => {
            let tokens = load_tokens(tokens)?;
            print_json(&folding::compute_folding_ranges(&tokens))?;
        }
        Command::SearchPaths {
            solution,
            extension,
            project,
        } => {
            let manager = open_solution(&args, solution).await?;
            let (extension, paths) = manager
                .describe_search_paths(project.as_deref(), extension)
                .await?;
            info!(extension = %extension, count = paths.len(), "Search paths");
            print_json(&paths)?;
        }
        Command::Resolve {
            solution,
            file,
            project,
        } => {
            let manager = open_solution(&args, solution).await?;
            let lookup = match project {
                Some(project) => manager.find_file_in_project(project, file).await?,
                None => manager.find_file_with_extension(file).await,
            };
            print_json(&lookup)?;
            if lookup.is_none() {
                std::process::exit(2);
            }
        }
        Command::FindClass { solution, name } => {
            let manager = open_solution(&args, solution).await?;
            print_json(&manager.find_class(name).await?)?;
        }
        Command::Discover {
            root,
            depth,
            include_hidden,
        } => {
            let root = match root {
                Some(root) => root.clone(),
                None => std::env::current_dir()?,
            };
            let options = ScanOptions {
                skip_hidden: !include_hidden,
                ..ScanOptions::default()
            };
            let solutions = scan_solutions(&root, *depth, Some(options))?;
            if solutions.is_empty() {
                print_json(&solutions)?;
                return Ok(());
            }
            let manager = SolutionManager::new(RealFileSystem, resolver_config(&args)?)?;
            let mut summaries = Vec::new();
            for path in &solutions {
                match manager.initialize(path).await {
                    Ok(solution) => summaries.push(solution.summary()),
                    Err(e) => eprintln!("Skipping {}: {e}", path.display()),
                }
            }
            print_json(&summaries)?;
        }
    }

    Ok(())
}
