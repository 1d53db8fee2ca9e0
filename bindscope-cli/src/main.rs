//! Bindscope CLI - find nodes bound to a definition in a document snapshot

use bindscope_core::config::DEFAULT_CONFIG;
use bindscope_core::{
    spawn_search, BindscopeError, Config, Document, SearchEvent, SearchMode, SearchOutcome,
    SearchRequest,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bindscope")]
#[command(about = "Find every node bound to a design-token definition", long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (TOML)
    #[arg(long, global = true, env = "BINDSCOPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a document snapshot for bindings of one definition
    Search {
        /// Document snapshot (JSON)
        document: PathBuf,

        /// Definition id to search for
        #[arg(short, long)]
        definition: String,

        /// direct or representative-only (default from config)
        #[arg(short, long)]
        mode: Option<String>,

        /// Only search this container
        #[arg(short, long)]
        scope: Option<String>,

        /// No progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the default configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search {
            document,
            definition,
            mode,
            scope,
            quiet,
        } => cmd_search(
            cli.config.as_deref(),
            &document,
            definition,
            mode.as_deref(),
            scope,
            quiet || cli.json,
            cli.json,
        ),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        if cli.json {
            let error_json = serde_json::json!({ "code": error_code(&e), "message": e.to_string() });
            eprintln!("{error_json:#}");
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn error_code(e: &BindscopeError) -> &'static str {
    match e {
        BindscopeError::Io(_) => "io",
        BindscopeError::FileNotFound(_) => "file_not_found",
        BindscopeError::Json(_) => "invalid_document",
        BindscopeError::ConfigParse(_) => "invalid_config",
        BindscopeError::DuplicateNode(_)
        | BindscopeError::DuplicateDefinition(_)
        | BindscopeError::DocumentTooLarge(_) => "invalid_document",
        BindscopeError::UnknownMode(_) => "unknown_mode",
        BindscopeError::Task(_) => "task_failed",
    }
}

fn load_config(path: Option<&Path>) -> bindscope_core::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

/// Log to stderr; stdout carries results
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn cmd_search(
    config_path: Option<&Path>,
    document: &Path,
    definition: String,
    mode: Option<&str>,
    scope: Option<String>,
    quiet: bool,
    json: bool,
) -> bindscope_core::Result<()> {
    let config = load_config(config_path)?;
    init_logging(&config);

    let mode = match mode {
        Some(mode) => mode.parse::<SearchMode>()?,
        None => config.search.default_mode,
    };
    let mut request = SearchRequest::new(definition).with_mode(mode);
    if let Some(scope) = scope {
        request = request.with_scope(scope);
    }

    let document = Document::load(document)?;
    tracing::debug!(nodes = document.len(), "document loaded");

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(run_search(document, config, request, quiet))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

async fn run_search(
    document: Document,
    config: Config,
    request: SearchRequest,
    quiet: bool,
) -> bindscope_core::Result<SearchOutcome> {
    use colored::Colorize;

    let mut handle = spawn_search(Arc::new(document), config.search, request);

    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut progress_shown = false;
    while let Some(event) = handle.events.recv().await {
        if quiet {
            continue;
        }
        if let SearchEvent::Progress(p) = event {
            eprint!(
                "\r{} {}/{} ({}%), {} match(es)",
                "Scanning".cyan(),
                p.visited,
                p.total,
                p.percentage,
                p.matches_so_far
            );
            progress_shown = true;
        }
    }
    if progress_shown {
        eprintln!();
    }

    handle.finish().await
}

fn print_outcome(outcome: &SearchOutcome) {
    use colored::Colorize;

    for diag in &outcome.diagnostics {
        eprintln!("{}: {}", "Warning".yellow(), diag);
    }

    let Some(definition) = &outcome.definition else {
        return;
    };

    println!(
        "{}: {} ({}), {} mode",
        "Definition".blue(),
        definition.name,
        definition.id,
        outcome.mode
    );
    if outcome.cancelled {
        println!(
            "{}: partial results after {}/{} nodes",
            "Cancelled".yellow(),
            outcome.visited,
            outcome.total
        );
    }

    if outcome.records.is_empty() {
        println!("No bound nodes found");
        return;
    }

    println!("{}: {} node(s)", "Found".green(), outcome.records.len());
    for record in &outcome.records {
        println!(
            "  {} [{}] {}",
            record.path_string,
            record.node_type,
            record.matched_property_paths.join(", ").dimmed()
        );
    }

    let by_type: Vec<String> = outcome
        .summary
        .by_node_type
        .iter()
        .map(|(node_type, count)| format!("{node_type} {count}"))
        .collect();
    let by_category: Vec<String> = outcome
        .summary
        .by_category
        .iter()
        .map(|(category, count)| format!("{} {count}", category.as_str()))
        .collect();
    println!("{}: {}", "By type".blue(), by_type.join(", "));
    println!("{}: {}", "By property".blue(), by_category.join(", "));
}

fn cmd_config() -> bindscope_core::Result<()> {
    print!("{DEFAULT_CONFIG}");
    Ok(())
}
